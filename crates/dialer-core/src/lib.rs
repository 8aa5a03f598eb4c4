//! Core types and trait definitions for the AI dialer bridge.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! The storage backend, the voice-provider client and the call-center client
//! all implement traits defined here; the engine depends only on those traits.

pub mod call;
pub mod campaign;
pub mod error;
pub mod gateway;
pub mod store;

pub use error::{Error, Result};
