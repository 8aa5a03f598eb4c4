//! Campaign orchestration for the dialer.
//!
//! - [`Dispatcher`] turns ready call-center leads into AI calls while
//!   respecting a concurrency cap.
//! - [`Reconciler`] applies provider webhook events to stored call records
//!   and reflects final outcomes back onto the call-center leads.
//!
//! Both are generic over the seam traits in [`dialer_core`] and receive their
//! collaborators at construction.

pub mod dispatch;
pub mod error;
pub mod reconcile;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use dispatch::{DispatchReport, Dispatcher};
pub use error::{DispatchError, ReconcileError};
pub use reconcile::{ReconcileOutcome, Reconciler};
