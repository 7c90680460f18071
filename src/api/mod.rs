//! REST API client module for the trips backend.
//!
//! This module provides the `BackendClient` for reading trips and
//! expenses and downloading receipt photos. The backend enforces
//! per-user data isolation through row-level security; this client
//! just presents the credentials it was configured with.

pub mod client;
pub mod error;

pub use client::BackendClient;
pub use error::ApiError;
