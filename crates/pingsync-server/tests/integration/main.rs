//! End-to-end tests: the HTTP server against a mocked PingOne

mod common;
mod test_credentials;
mod test_jobs;
