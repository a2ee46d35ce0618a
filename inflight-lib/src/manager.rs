//! Attaches an [`AdmissionGate`] to a [`Client`].
//!
//! The gate hooks into the client as a request interceptor, which holds every
//! request back until the gate admits it, and a response interceptor, which
//! releases the slot once the request completed. Callers keep using the client
//! as before.
//!
//! ```no_run
//! use inflight_lib::{ClientBuilder, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = ClientBuilder::default().client()?;
//!     let handle = inflight_lib::attach(&client, 5)?;
//!
//!     // At most 5 of these are on the wire at any time
//!     let _responses = futures::future::join_all(
//!         (0..40).map(|_| client.get("https://example.com")),
//!     )
//!     .await;
//!
//!     handle.detach();
//!     Ok(())
//! }
//! ```
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use reqwest::{Request, Response};

use crate::gate::{AdmissionGate, EntryToken, GateConfig, GateStats};
use crate::interceptor::{Exchange, InterceptorId, RequestInterceptor, ResponseInterceptor};
use crate::{Client, ErrorKind, Result};

/// Attach a gate admitting at most `max_concurrent` requests at a time
///
/// # Errors
///
/// Returns [`ErrorKind::Configuration`] if `max_concurrent` is zero. Nothing
/// is registered on the client in that case.
pub fn attach(client: &Client, max_concurrent: usize) -> Result<GateHandle> {
    GateHandle::attach(client, &GateConfig::new(max_concurrent))
}

/// Links an admitted request to the release of its slot.
///
/// Released on the completion hook, or when the exchange is dropped without
/// completing (cancelled request, hook ejected in the meantime).
#[derive(Debug)]
struct AdmissionTicket {
    gate: Arc<AdmissionGate<Request>>,
    token: EntryToken,
    released: AtomicBool,
}

impl AdmissionTicket {
    fn release(&self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            self.gate.release(self.token);
        }
    }
}

impl Drop for AdmissionTicket {
    fn drop(&mut self) {
        self.release();
    }
}

/// Tickets of every gate an exchange went through
#[derive(Debug, Clone, Default)]
struct Tickets(Vec<Arc<AdmissionTicket>>);

/// Binds a gate to the before-send and after-complete hooks of a client
#[derive(Debug, Clone)]
struct GateInterceptor {
    gate: Arc<AdmissionGate<Request>>,
}

impl GateInterceptor {
    fn keep_ticket(&self, exchange: &mut Exchange, token: EntryToken) {
        let ticket = Arc::new(AdmissionTicket {
            gate: Arc::clone(&self.gate),
            token,
            released: AtomicBool::new(false),
        });
        let extensions = exchange.extensions_mut();
        match extensions.get_mut::<Tickets>() {
            Some(tickets) => tickets.0.push(ticket),
            None => {
                extensions.insert(Tickets(vec![ticket]));
            }
        }
    }

    /// Release the slot held by this exchange, if it went through this gate
    fn release(&self, exchange: &mut Exchange) {
        let ticket = exchange
            .extensions_mut()
            .get_mut::<Tickets>()
            .and_then(|tickets| {
                let position = tickets
                    .0
                    .iter()
                    .position(|ticket| Arc::ptr_eq(&ticket.gate, &self.gate))?;
                Some(tickets.0.swap_remove(position))
            });

        match ticket {
            Some(ticket) => ticket.release(),
            None => log::trace!(
                "{} {} completed without passing the gate",
                exchange.method(),
                exchange.url()
            ),
        }
    }
}

#[async_trait]
impl RequestInterceptor for GateInterceptor {
    async fn on_request(&self, request: Request, exchange: &mut Exchange) -> Result<Request> {
        let (request, token) = self.gate.enqueue(request).await?.into_parts();
        self.keep_ticket(exchange, token);
        Ok(request)
    }
}

#[async_trait]
impl ResponseInterceptor for GateInterceptor {
    async fn on_response(&self, response: Response, exchange: &mut Exchange) -> Result<Response> {
        self.release(exchange);
        Ok(response)
    }

    async fn on_error(&self, error: ErrorKind, exchange: &mut Exchange) -> ErrorKind {
        self.release(exchange);
        error
    }
}

/// A gate attached to a client.
///
/// Dropping the handle leaves the gate attached; call [`GateHandle::detach`]
/// to remove it.
#[derive(Debug)]
pub struct GateHandle {
    client: Client,
    gate: Arc<AdmissionGate<Request>>,
    request_interceptor: InterceptorId,
    response_interceptor: InterceptorId,
    detached: AtomicBool,
}

impl GateHandle {
    /// Create a gate from `config` and register its hooks on `client`
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Configuration`] if the configured capacity is
    /// zero. Nothing is registered on the client in that case.
    pub fn attach(client: &Client, config: &GateConfig) -> Result<Self> {
        let gate = Arc::new(AdmissionGate::from_config(config)?);
        let interceptor = GateInterceptor {
            gate: Arc::clone(&gate),
        };

        let interceptors = client.interceptors();
        let request_interceptor = interceptors.use_request(interceptor.clone());
        let response_interceptor = interceptors.use_response(interceptor);
        log::debug!(
            "Attached admission gate with capacity {} ({request_interceptor}, {response_interceptor})",
            gate.capacity()
        );

        Ok(Self {
            client: client.clone(),
            gate,
            request_interceptor,
            response_interceptor,
            detached: AtomicBool::new(false),
        })
    }

    /// Id of the before-send hook
    #[must_use]
    pub const fn request_interceptor(&self) -> InterceptorId {
        self.request_interceptor
    }

    /// Id of the after-complete hook
    #[must_use]
    pub const fn response_interceptor(&self) -> InterceptorId {
        self.response_interceptor
    }

    /// Current queue and in-flight counts of the gate
    #[must_use]
    pub fn stats(&self) -> GateStats {
        self.gate.stats()
    }

    /// `true` once [`GateHandle::detach`] was called
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    /// Unregister both hooks. Requests started afterwards bypass the gate.
    ///
    /// Requests already queued or in flight are not flushed: they are still
    /// admitted in order as the requests ahead of them complete. Calling this
    /// more than once has no further effect.
    pub fn detach(&self) {
        if self.detached.swap(true, Ordering::AcqRel) {
            return;
        }
        let interceptors = self.client.interceptors();
        interceptors.eject_request(self.request_interceptor);
        interceptors.eject_response(self.response_interceptor);

        let stats = self.gate.stats();
        log::debug!(
            "Detached admission gate ({} in flight, {} queued)",
            stats.in_flight,
            stats.queued
        );
    }
}
