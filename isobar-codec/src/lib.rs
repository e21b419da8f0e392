//! # isobar-codec
//!
//! Error-bound enforcement for approximate grid reconstructions.
//!
//! Given an original grid, an approximation of it and a bound ε, the
//! [`ErrorBoundCodec`] stores the residual so that `approx + decoded residual`
//! is within ε of the original for every cell:
//! - residuals are quantized with step `q ≤ 2ε` (`bin = round(r / q)`)
//! - cells are split into blocks; each block picks the smallest bit-width for
//!   its codes, with code `0` reserved as the escape marker
//! - a cell whose bin overflows 32-bit codes, whose residual is not finite, or
//!   whose reconstruction would miss ε (including every cell when ε = 0) is
//!   escaped and its raw value stored verbatim
//!
//! Decoding is a pure function of the approximation and the stream.

mod bitpack;
pub mod block;
pub mod error_bounded;

pub use block::{EncodedBlock, MAX_BIT_WIDTH};
pub use error_bounded::{default_quantum, CodecStats, ErrorBoundCodec, ResidualStream};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    #[error("Invalid codec parameters: {0}")]
    InvalidParameters(String),
    #[error("Escape encoding cannot fit the format: {0}")]
    BoundViolation(String),
    #[error("Malformed block {block}: {reason}")]
    MalformedBlock { block: usize, reason: String },
    #[error("Malformed residual stream: {0}")]
    MalformedStream(String),
    #[error("Buffer overflow: attempted to read {attempted} bits, only {available} available")]
    BufferOverflow { attempted: usize, available: usize },
    #[error("Bit width {0} exceeds maximum of 32")]
    BitWidthExceeded(usize),
    #[error("Grid error: {0}")]
    Grid(#[from] isobar_grid::GridError),
}

/// Convenience type alias for results with [`CodecError`].
pub type Result<T> = std::result::Result<T, CodecError>;
