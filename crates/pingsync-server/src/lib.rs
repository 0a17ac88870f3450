//! pingsync server - HTTP front end for batch user jobs
//!
//! Accepts CSV uploads, runs them through the batch engine on background
//! tasks and streams progress back as NDJSON. Also exposes the token and
//! environment lookups used by the upload UI.
//!
//! ## Modules
//!
//! - [`server`] - Listener loop, cache sweeps and signal handling
//! - [`routes`] - Route table and handlers
//! - [`multipart`] - Upload form decoding
//! - [`rate_limit`] - Per-client request limits
//! - [`http`] - Response helpers and [`http::ApiError`]
//! - [`state`] - Shared services
//! - [`logging`] - Subscriber setup

pub mod http;
pub mod logging;
pub mod multipart;
pub mod rate_limit;
pub mod routes;
pub mod server;
pub mod state;

pub use server::{shutdown_signal, HttpServer};
pub use state::{AppState, Services};
