//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are interfaces that the batch engine depends on, but whose
//! implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IUserDirectory`] - User lookup, create, patch and delete
//! - [`ITokenProvider`] - Cached client-credentials access tokens

pub mod directory;
pub mod token_provider;

pub use directory::{DirectoryError, DirectorySession, IUserDirectory};
pub use token_provider::ITokenProvider;
