//! # isobar-container
//!
//! The single persisted artifact of an isobar compression: header, opaque
//! latent blob and residual bitstream, each section length-prefixed.
//!
//! ```text
//! magic "ISBR" | version u16 | ndim u8 | dims ndim×u32
//! dtype_tag u8 | bound_eps f64 | quantum f64
//! latent_len u64 | latent bytes
//! num_blocks u32
//!   block_id u32 | bit_width u8 | escape_count u16 | code_len u32 | code bytes
//! ```
//!
//! All integers little endian. Readers fail closed: unknown magic or version,
//! bad dtype tags, invalid shapes, truncated sections and trailing bytes are
//! all [`ContainerError::ContainerFormat`].

pub mod format;

pub use format::{CompressedContainer, Header, FORMAT_VERSION, MAGIC};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("Container format error: {0}")]
    ContainerFormat(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContainerError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        ContainerError::ContainerFormat(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, ContainerError>;
