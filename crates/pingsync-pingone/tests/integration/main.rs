//! Integration tests for pingsync-pingone
//!
//! Uses wiremock to simulate the PingOne token endpoint and management API
//! and verifies end-to-end behavior of the token cache, the user client
//! and the shared 429 backoff.

mod common;

mod test_retry;
mod test_token_cache;
mod test_users;
