use http::{Extensions, Method};
use url::Url;

/// State of a single request as it travels through the interceptors.
///
/// A request interceptor can leave data in the [`Extensions`] for the
/// response interceptors of the same exchange to pick up. This is how
/// completions are matched to their request even when responses arrive in a
/// different order than the requests went out.
#[derive(Debug)]
pub struct Exchange {
    method: Method,
    url: Url,
    extensions: Extensions,
}

impl Exchange {
    pub(crate) fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            extensions: Extensions::new(),
        }
    }

    /// Method of the request as it was submitted
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// URL of the request as it was submitted
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Data attached to this exchange by interceptors
    #[must_use]
    pub const fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Mutable access to the data attached to this exchange
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}
