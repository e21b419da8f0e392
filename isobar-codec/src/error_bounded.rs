use crate::block::{decode_block, encode_block, EncodedBlock};
use crate::CodecError;
use isobar_grid::{DType, Grid, GridError};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default number of cells per block.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Fraction of `2ε` used as the default quantization step. Staying just below
/// `2ε` keeps cells that round onto a bin edge from escaping.
const QUANTUM_HEADROOM: f64 = 0.999;

/// Default quantization step for bound `error_bound`: `0` for lossless,
/// otherwise slightly below `2ε`.
pub fn default_quantum(error_bound: f64) -> f64 {
    if error_bound == 0.0 {
        0.0
    } else {
        2.0 * error_bound * QUANTUM_HEADROOM
    }
}

/// Encoded residual of a whole grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidualStream {
    pub error_bound: f64,
    pub quantum: f64,
    pub blocks: Vec<EncodedBlock>,
}

/// Summary of a residual stream.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CodecStats {
    pub blocks: usize,
    pub escapes: usize,
    pub mean_bit_width: f64,
    pub payload_bytes: usize,
}

impl ResidualStream {
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn stats(&self) -> CodecStats {
        let blocks = self.blocks.len();
        let escapes = self.blocks.iter().map(|b| b.escape_count as usize).sum();
        let payload_bytes = self.blocks.iter().map(|b| b.payload.len()).sum();
        let mean_bit_width = if blocks == 0 {
            0.0
        } else {
            self.blocks.iter().map(|b| b.bit_width as f64).sum::<f64>() / blocks as f64
        };
        CodecStats {
            blocks,
            escapes,
            mean_bit_width,
            payload_bytes,
        }
    }
}

/// Cells per block when `cells` are split into `num_blocks` balanced blocks.
///
/// Encoders split into `ceil(cells / block_size)` blocks of this length, so a
/// decoder recovers the partition from the cell count and the block count
/// alone.
pub(crate) fn block_len(cells: usize, num_blocks: usize) -> usize {
    cells.div_ceil(num_blocks)
}

fn validate_params(error_bound: f64, quantum: f64) -> Result<(), CodecError> {
    if !error_bound.is_finite() || error_bound < 0.0 {
        return Err(CodecError::InvalidParameters(format!(
            "error bound must be finite and >= 0, got {}",
            error_bound
        )));
    }
    if error_bound == 0.0 {
        if quantum != 0.0 {
            return Err(CodecError::InvalidParameters(format!(
                "lossless compression takes quantum 0, got {}",
                quantum
            )));
        }
        return Ok(());
    }
    if !quantum.is_finite() || quantum <= 0.0 || quantum > 2.0 * error_bound {
        return Err(CodecError::InvalidParameters(format!(
            "quantum must satisfy 0 < q <= 2ε = {}, got {}",
            2.0 * error_bound,
            quantum
        )));
    }
    Ok(())
}

/// Certifies an approximate reconstruction against a point-wise bound.
///
/// # Guarantee
/// For every cell, `|decompress(approx, compress(original, approx, ε, q)) − original| ≤ ε`,
/// or the cell was escaped and is bit-exact.
#[derive(Debug, Clone)]
pub struct ErrorBoundCodec {
    block_size: usize,
}

impl Default for ErrorBoundCodec {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl ErrorBoundCodec {
    /// Codec with `block_size` cells per block. The per-block escape count is
    /// a `u16`, so blocks hold at most 65535 cells.
    pub fn new(block_size: usize) -> Result<Self, CodecError> {
        if block_size == 0 || block_size > u16::MAX as usize {
            return Err(CodecError::InvalidParameters(format!(
                "block size must be in 1..={}, got {}",
                u16::MAX,
                block_size
            )));
        }
        Ok(Self { block_size })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Quantize and pack `original − approx`.
    ///
    /// # Errors
    /// - [`CodecError::InvalidParameters`] for a negative/non-finite ε or a
    ///   quantum outside `(0, 2ε]` (`0` is required when ε = 0)
    /// - [`CodecError::Grid`] if the grids differ in shape or dtype
    /// - [`CodecError::BoundViolation`] if escapes cannot be represented
    pub fn compress(
        &self,
        original: &Grid,
        approx: &Grid,
        error_bound: f64,
        quantum: f64,
    ) -> Result<ResidualStream, CodecError> {
        validate_params(error_bound, quantum)?;
        if original.dims() != approx.dims() {
            return Err(GridError::ShapeMismatch(original.dims().to_vec(), approx.dims().to_vec()).into());
        }
        if original.dtype() != approx.dtype() {
            return Err(GridError::DTypeMismatch(original.dtype(), approx.dtype()).into());
        }

        let cells = original.len();
        let num_blocks = cells.div_ceil(self.block_size);
        if u32::try_from(num_blocks).is_err() {
            return Err(CodecError::BoundViolation(format!(
                "{} blocks exceed the u32 block count",
                num_blocks
            )));
        }
        let len = block_len(cells, num_blocks);
        let dtype = original.dtype();

        let blocks: Vec<EncodedBlock> = original
            .values()
            .par_chunks(len)
            .zip(approx.values().par_chunks(len))
            .enumerate()
            .map(|(i, (o, a))| encode_block(i as u32, o, a, error_bound, quantum, dtype))
            .collect::<Result<_, _>>()?;

        let stream = ResidualStream {
            error_bound,
            quantum,
            blocks,
        };
        let stats = stream.stats();
        debug!(
            cells,
            blocks = stats.blocks,
            escapes = stats.escapes,
            mean_bit_width = stats.mean_bit_width,
            payload_bytes = stats.payload_bytes,
            "encoded residual"
        );
        Ok(stream)
    }

    /// Apply `stream` to `approx`, producing the certified grid.
    ///
    /// # Errors
    /// [`CodecError::MalformedStream`] / [`CodecError::MalformedBlock`] if the
    /// stream does not describe exactly the cells of `approx`.
    pub fn decompress(&self, approx: &Grid, stream: &ResidualStream) -> Result<Grid, CodecError> {
        validate_params(stream.error_bound, stream.quantum)?;
        decompress_stream(approx, stream)
    }
}

/// Decoding needs no codec configuration: the partition is implied by the
/// stream's block count.
pub(crate) fn decompress_stream(approx: &Grid, stream: &ResidualStream) -> Result<Grid, CodecError> {
    let cells = approx.len();
    let num_blocks = stream.blocks.len();
    if num_blocks == 0 {
        return Err(CodecError::MalformedStream(format!(
            "no blocks for {} cells",
            cells
        )));
    }
    let len = block_len(cells, num_blocks);
    if cells.div_ceil(len) != num_blocks {
        return Err(CodecError::MalformedStream(format!(
            "{} blocks cannot partition {} cells",
            num_blocks, cells
        )));
    }

    let dtype: DType = approx.dtype();
    let mut out = vec![0.0f64; cells];
    out.par_chunks_mut(len)
        .zip(approx.values().par_chunks(len))
        .zip(stream.blocks.par_iter())
        .enumerate()
        .try_for_each(|(i, ((dst, a), block))| decode_block(i, block, a, stream.quantum, dtype, dst))?;

    Ok(Grid::from_values(approx.shape().clone(), dtype, out)?)
}
