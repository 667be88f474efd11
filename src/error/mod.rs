use thiserror::Error;

/// Startup failures raised by the binary before the server is serving
#[derive(Error, Debug)]
pub enum AppError {
    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
