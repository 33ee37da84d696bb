use thiserror::Error;

#[derive(Error, Debug)]
pub enum SaltmineError {
    /// Owner or pattern specification rejected by the constraint compiler.
    #[error("specification error: {0}")]
    Spec(String),

    /// Hasher self-test failure or a reported hit that does not re-derive.
    #[error("hash verification error: {0}")]
    Hash(String),

    /// Compute-device failure propagated from the OpenCL runtime.
    #[error("device error: {0}")]
    Device(String),

    /// Invalid launch or runtime configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Propagated I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch all for unexpected internal problems.
    #[error("internal error: {0}")]
    Internal(String),
}
