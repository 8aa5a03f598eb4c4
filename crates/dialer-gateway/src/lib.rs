//! HTTP clients for the two external systems the dialer bridges.
//!
//! - [`VoiceClient`] implements [`dialer_core::gateway::VoiceProvider`] for
//!   the supported AI voice services.
//! - [`VicidialClient`] implements [`dialer_core::gateway::CallCenter`] over
//!   the call-center agent API.
//!
//! Neither client retries. Every non-2xx response is surfaced with the
//! operation name, status code and body so callers can log it.

mod http;

pub mod error;
pub mod vicidial;
pub mod voice;

pub use error::{CallCenterError, VoiceError};
pub use vicidial::VicidialClient;
pub use voice::{VoiceClient, VoiceService};
