//! `inflight` caps the number of requests a shared HTTP client has in flight.
//!
//! Requests beyond the limit are queued in submission order and sent as
//! earlier ones complete, successfully or not. The gate is attached to a
//! [`Client`] through its interceptors, so callers keep issuing requests as
//! usual:
//!
//! ```no_run
//! use inflight_lib::{ClientBuilder, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!   let client = ClientBuilder::default().client()?;
//!   let handle = inflight_lib::attach(&client, 10)?;
//!   let response = client.get("https://example.com").await?;
//!   assert!(response.status().is_success());
//!   handle.detach();
//!   Ok(())
//! }
//! ```
//!
//! The gate itself, [`AdmissionGate`], does not know about HTTP and can be
//! used on its own to bound any kind of work.
#![warn(missing_docs)]

mod client;
mod manager;
mod types;

pub mod gate;
pub mod interceptor;

pub use client::{Client, ClientBuilder, DEFAULT_MAX_REDIRECTS, DEFAULT_USER_AGENT};
pub use gate::{Admission, AdmissionGate, Admitted, EntryToken, GateConfig, GateStats};
pub use manager::{GateHandle, attach};
pub use types::{ErrorKind, Result};
