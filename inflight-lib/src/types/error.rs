use std::path::PathBuf;

use http::StatusCode;
use thiserror::Error;
use url::Url;

/// Possible errors when sending requests through an `inflight_lib` client
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The gate was configured with values it cannot work with,
    /// e.g. a capacity of zero
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The configuration file could not be read
    #[error("Failed to read configuration from `{path}`: {err}", path = .0.display(), err = .1)]
    ReadConfig(PathBuf, std::io::Error),

    /// The configuration file is not valid TOML or has unknown fields
    #[error("Cannot parse configuration: {0}")]
    InvalidConfigFile(#[from] toml::de::Error),

    /// The underlying reqwest client could not be built
    #[error("Failed to build HTTP client: {0}")]
    BuildClient(#[source] reqwest::Error),

    /// Network error while sending the request or reading the response
    #[error("Network error while sending request: {0}")]
    NetworkRequest(#[source] reqwest::Error),

    /// The server answered with a status code outside of the 2xx range
    #[error("Rejected status code {status} for {url}")]
    RejectedStatusCode {
        /// Status code returned by the server
        status: StatusCode,
        /// URL of the final response
        url: Url,
    },

    /// The given string can not be parsed into a valid URL
    #[error("Cannot parse URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The gate dropped a queued entry before admitting it.
    ///
    /// An [`Admission`](crate::Admission) keeps its gate alive, so a gate
    /// never produces this on its own. Interceptors may return it to reject a
    /// request.
    #[error("Admission gate was closed before the request was admitted")]
    GateClosed,
}

impl ErrorKind {
    /// Returns the status code of a rejected response, if this error
    /// was caused by one.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::RejectedStatusCode { status, .. } => Some(*status),
            Self::NetworkRequest(e) => e.status(),
            _ => None,
        }
    }

    /// Returns `true` if the error originates from the transport rather
    /// than from configuration or the gate itself.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::NetworkRequest(_) | Self::RejectedStatusCode { .. }
        )
    }
}
