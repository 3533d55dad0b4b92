// Error kinds surfaced by the failure-detection core

use thiserror::Error;

pub type WrapperResult<T> = Result<T, WrapperError>;

/// Errors produced by the wrapper core or by the external collaborators it
/// drives. Probe-level failures never surface through this type; they are
/// folded into the monitor's host-status verdict.
#[derive(Debug, Error)]
pub enum WrapperError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("no connection is available to execute {0}")]
    NoConnection(String),

    #[error("no host information is available to execute {0}")]
    NoHostInfo(String),

    #[error("the driver dialect could not be determined")]
    NoDialect,

    #[error("host {0} is unavailable")]
    UnavailableHost(String),

    #[error("network failure: {0}")]
    Network(String),

    #[error("login failed: {0}")]
    Login(String),

    #[error("connection attempt failed: {0}")]
    Connect(String),

    #[error("{0}")]
    Internal(String),
}

/// Classifies driver errors for retry and failover decisions. A dialect
/// exposes its own handler; `DefaultExceptionHandler` matches on the wrapper
/// error variants.
pub trait ExceptionHandler: Send + Sync {
    /// Whether the error indicates a transient network condition. Network
    /// failures are iterable: failover moves on to the next candidate host.
    fn is_network_exception(&self, error: &WrapperError) -> bool;

    /// Whether the error indicates a rejected login. Login failures are
    /// terminal: no amount of retrying will fix bad credentials.
    fn is_login_exception(&self, error: &WrapperError) -> bool;
}

#[derive(Debug, Default)]
pub struct DefaultExceptionHandler;

impl ExceptionHandler for DefaultExceptionHandler {
    fn is_network_exception(&self, error: &WrapperError) -> bool {
        matches!(error, WrapperError::Network(_))
    }

    fn is_login_exception(&self, error: &WrapperError) -> bool {
        matches!(error, WrapperError::Login(_))
    }
}
