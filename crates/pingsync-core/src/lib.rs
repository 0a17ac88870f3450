//! pingsync Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `Credentials`, `InputRow`, `UserAttributes`, `RemoteRecord`,
//!   `BatchJobState`
//! - **AttributeDiffer** - `compute_update` with its allowlist and attribute mode
//! - **Port definitions** - Traits for adapters: `IUserDirectory`, `ITokenProvider`
//! - **Configuration** - YAML-backed `Config` with validation
//!
//! # Architecture
//!
//! The domain module contains pure business logic with no I/O.
//! Ports define trait interfaces that adapter crates implement.

pub mod config;
pub mod domain;
pub mod ports;
