//! Hooks around every request sent through a [`Client`](crate::Client).
//!
//! Request interceptors see the outgoing [`Request`] before it reaches the
//! transport and may hold it back by not returning yet. Response interceptors
//! observe the completion of the same exchange, through
//! [`ResponseInterceptor::on_response`] on success or
//! [`ResponseInterceptor::on_error`] on failure.
//!
//! Both kinds are registered on an [`Interceptors`] registry, which hands out
//! an [`InterceptorId`] for ejecting them later. Per-request state is carried
//! from one hook to the other in the [`Exchange`].

mod chain;
mod exchange;

use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use reqwest::{Request, Response};

pub(crate) use chain::{RequestChain, ResponseChain};
pub use exchange::Exchange;

use crate::{ErrorKind, Result};

/// Hook run before a request is handed to the transport
#[async_trait]
pub trait RequestInterceptor: Debug + Send + Sync {
    /// Inspect, modify or delay `request`.
    ///
    /// Returning an error aborts the request; the error is passed to the
    /// failure branch of the response interceptors.
    async fn on_request(&self, request: Request, exchange: &mut Exchange) -> Result<Request>;
}

/// Hook run after a request completed, successfully or not
#[async_trait]
pub trait ResponseInterceptor: Debug + Send + Sync {
    /// Observe a successful response
    async fn on_response(&self, response: Response, _exchange: &mut Exchange) -> Result<Response> {
        Ok(response)
    }

    /// Observe a failed exchange. The returned error is what the caller
    /// (or the next interceptor) gets.
    async fn on_error(&self, error: ErrorKind, _exchange: &mut Exchange) -> ErrorKind {
        error
    }
}

/// Identifies a registered interceptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterceptorId(u64);

impl fmt::Display for InterceptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "interceptor-{}", self.0)
    }
}

/// Registry of the interceptors of a client.
///
/// Interceptors run in registration order. Registering or ejecting one only
/// affects requests which start afterwards.
#[derive(Debug, Default)]
pub struct Interceptors {
    next_id: AtomicU64,
    request: Registry<dyn RequestInterceptor>,
    response: Registry<dyn ResponseInterceptor>,
}

impl Interceptors {
    /// Register a request interceptor
    pub fn use_request(&self, interceptor: impl RequestInterceptor + 'static) -> InterceptorId {
        let id = self.next_id();
        self.request.push(id, Arc::new(interceptor));
        id
    }

    /// Register a response interceptor
    pub fn use_response(&self, interceptor: impl ResponseInterceptor + 'static) -> InterceptorId {
        let id = self.next_id();
        self.response.push(id, Arc::new(interceptor));
        id
    }

    /// Remove a request interceptor. Returns `false` if it was not registered.
    pub fn eject_request(&self, id: InterceptorId) -> bool {
        self.request.eject(id)
    }

    /// Remove a response interceptor. Returns `false` if it was not registered.
    pub fn eject_response(&self, id: InterceptorId) -> bool {
        self.response.eject(id)
    }

    /// Number of registered request interceptors
    #[must_use]
    pub fn request_len(&self) -> usize {
        self.request.lock().len()
    }

    /// Number of registered response interceptors
    #[must_use]
    pub fn response_len(&self) -> usize {
        self.response.lock().len()
    }

    pub(crate) fn request_chain(&self) -> RequestChain {
        RequestChain::new(self.request.snapshot())
    }

    pub(crate) fn response_chain(&self) -> ResponseChain {
        ResponseChain::new(self.response.snapshot())
    }

    fn next_id(&self) -> InterceptorId {
        InterceptorId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

/// Interceptors of one kind, in registration order
#[derive(Debug)]
struct Registry<I: ?Sized>(Mutex<Vec<(InterceptorId, Arc<I>)>>);

impl<I: ?Sized> Default for Registry<I> {
    fn default() -> Self {
        Self(Mutex::new(Vec::new()))
    }
}

impl<I: ?Sized> Registry<I> {
    fn lock(&self) -> MutexGuard<'_, Vec<(InterceptorId, Arc<I>)>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, id: InterceptorId, interceptor: Arc<I>) {
        self.lock().push((id, interceptor));
    }

    fn eject(&self, id: InterceptorId) -> bool {
        let mut interceptors = self.lock();
        let before = interceptors.len();
        interceptors.retain(|(registered, _)| *registered != id);
        interceptors.len() != before
    }

    /// Clones the current list so no lock is held while the hooks run
    fn snapshot(&self) -> Vec<Arc<I>> {
        self.lock()
            .iter()
            .map(|(_, interceptor)| Arc::clone(interceptor))
            .collect()
    }
}
