//! Streaming client core for the Rust MR image-reconstruction platform.
//!
//! The modules mirror the remote pipeline-engine workflow: `data` holds
//! acquisition and image containers, `model` the coil-weighted Fourier
//! encoding operator, `pipeline` the remote chain description, `client`
//! the wire protocol and session, and `processors` the end-to-end
//! orchestration wrappers.

pub mod client;
pub mod data;
pub mod math;
pub mod model;
pub mod pipeline;
pub mod prelude;
pub mod processors;

/// Common error type for the streaming core.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The remote engine could not be reached or refused the session.
    #[error("connection failed: {0}")]
    Connection(String),
    /// Malformed or unexpected traffic on an established session.
    #[error("protocol violation: {0}")]
    Protocol(String),
    /// The session terminated abnormally mid-stream.
    #[error("stream aborted: {0}")]
    Stream(String),
    /// A pipeline chain or session was assembled incorrectly.
    #[error("invalid configuration: {0}")]
    Configuration(String),
    /// Array shapes disagree with the encoding parameters.
    #[error("dimension mismatch: {0}")]
    Dimension(String),
    /// Container persistence failure outside any session.
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
