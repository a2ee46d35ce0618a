mod error;

pub use error::ErrorKind;

/// The `inflight` `Result` type, aliased to avoid conflicts with `std::result::Result`.
pub type Result<T> = std::result::Result<T, crate::ErrorKind>;
