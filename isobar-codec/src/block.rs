//! One block of residual codes.
//!
//! Payload layout (`code_bytes` in the container):
//! `[ceil(len · bit_width / 8) bytes of LSB-first codes][escape_count raw values]`
//!
//! Codes are `zigzag(bin) + 1`; code `0` marks an escaped cell whose raw value
//! (dtype width, little endian) follows the packed codes in cell order.

use crate::bitpack::{BitReader, BitWriter, MAX_BITS};
use crate::CodecError;
use isobar_grid::DType;
use serde::{Deserialize, Serialize};

/// Largest code width a block may use.
pub const MAX_BIT_WIDTH: u8 = MAX_BITS as u8;

/// Largest |bin| that still has a non-escape code: `zigzag(bin) + 1` must fit
/// in 32 bits.
const MAX_BIN: i64 = i32::MAX as i64;

const ESCAPE: u32 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedBlock {
    pub block_id: u32,
    pub bit_width: u8,
    pub escape_count: u16,
    pub payload: Vec<u8>,
}

impl EncodedBlock {
    /// Bytes of packed codes for a block of `len` cells.
    pub fn code_bytes(len: usize, bit_width: u8) -> usize {
        (len * bit_width as usize).div_ceil(8)
    }
}

#[inline]
fn zigzag(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

#[inline]
fn unzigzag(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

/// Value the decoder produces for a non-escaped cell.
#[inline]
pub(crate) fn dequantize(approx: f64, bin: i64, quantum: f64, dtype: DType) -> f64 {
    dtype.round(approx + bin as f64 * quantum)
}

/// Quantization bin for one cell, or `None` if the cell has to be escaped.
///
/// The check runs the decoder's exact arithmetic, so a `Some` bin is
/// guaranteed to reconstruct within `error_bound`.
#[inline]
fn quantize_cell(original: f64, approx: f64, error_bound: f64, quantum: f64, dtype: DType) -> Option<i64> {
    if quantum == 0.0 {
        return None;
    }
    let residual = original - approx;
    if !residual.is_finite() {
        return None;
    }
    let bin = (residual / quantum).round();
    if !(bin.abs() <= MAX_BIN as f64) {
        return None;
    }
    let bin = bin as i64;
    let recon = dequantize(approx, bin, quantum, dtype);
    let err = (original - recon).abs();
    if err <= error_bound {
        Some(bin)
    } else {
        None
    }
}

/// Minimal bits to hold `max_code` (0 when every code is the escape marker).
#[inline]
fn bit_width_for(max_code: u32) -> u8 {
    (32 - max_code.leading_zeros()) as u8
}

pub(crate) fn encode_block(
    block_id: u32,
    original: &[f64],
    approx: &[f64],
    error_bound: f64,
    quantum: f64,
    dtype: DType,
) -> Result<EncodedBlock, CodecError> {
    debug_assert_eq!(original.len(), approx.len());

    let mut codes = Vec::with_capacity(original.len());
    let mut escapes = 0usize;
    let mut max_code = 0u32;
    for (&o, &a) in original.iter().zip(approx) {
        let code = match quantize_cell(o, a, error_bound, quantum, dtype) {
            // |bin| <= i32::MAX keeps zigzag(bin) + 1 within u32.
            Some(bin) => (zigzag(bin) + 1) as u32,
            None => {
                escapes += 1;
                ESCAPE
            }
        };
        max_code = max_code.max(code);
        codes.push(code);
    }

    let escape_count = u16::try_from(escapes).map_err(|_| {
        CodecError::BoundViolation(format!(
            "block {} needs {} escapes, format allows {}",
            block_id,
            escapes,
            u16::MAX
        ))
    })?;

    let bit_width = bit_width_for(max_code);
    let code_bytes = EncodedBlock::code_bytes(codes.len(), bit_width);
    let mut writer = BitWriter::with_capacity(code_bytes + escapes * dtype.width());
    for &code in &codes {
        writer.write(code, bit_width as usize)?;
    }
    let mut payload = writer.finish();
    debug_assert_eq!(payload.len(), code_bytes);

    for (&code, &o) in codes.iter().zip(original) {
        if code == ESCAPE {
            dtype.write_raw(o, &mut payload);
        }
    }

    if u32::try_from(payload.len()).is_err() {
        return Err(CodecError::BoundViolation(format!(
            "block {} payload of {} bytes exceeds u32 length prefix",
            block_id,
            payload.len()
        )));
    }

    Ok(EncodedBlock {
        block_id,
        bit_width,
        escape_count,
        payload,
    })
}

/// Decode `block` on top of `approx`, writing into `out`.
pub(crate) fn decode_block(
    index: usize,
    block: &EncodedBlock,
    approx: &[f64],
    quantum: f64,
    dtype: DType,
    out: &mut [f64],
) -> Result<(), CodecError> {
    let malformed = |reason: String| CodecError::MalformedBlock { block: index, reason };

    if block.block_id as usize != index {
        return Err(malformed(format!("block id {} out of sequence", block.block_id)));
    }
    if block.bit_width > MAX_BIT_WIDTH {
        return Err(malformed(format!("bit width {} exceeds {}", block.bit_width, MAX_BIT_WIDTH)));
    }

    let len = approx.len();
    let code_bytes = EncodedBlock::code_bytes(len, block.bit_width);
    let escape_count = block.escape_count as usize;
    let expected = code_bytes + escape_count * dtype.width();
    if block.payload.len() != expected {
        return Err(malformed(format!(
            "payload is {} bytes, expected {}",
            block.payload.len(),
            expected
        )));
    }
    if block.bit_width == 0 && escape_count != len {
        return Err(malformed(format!(
            "zero-width block must escape all {} cells, has {}",
            len, escape_count
        )));
    }

    let (packed, raw) = block.payload.split_at(code_bytes);
    let mut raw_values = raw.chunks_exact(dtype.width());
    let mut reader = BitReader::new(packed);
    let mut seen_escapes = 0usize;

    for (slot, &a) in out.iter_mut().zip(approx) {
        let code = reader.read(block.bit_width as usize)?;
        *slot = if code == ESCAPE {
            seen_escapes += 1;
            let bytes = raw_values
                .next()
                .ok_or_else(|| malformed(format!("more than {} escaped cells", escape_count)))?;
            dtype
                .read_raw(bytes)
                .ok_or_else(|| malformed("truncated raw value".into()))?
        } else {
            let bin = unzigzag((code - 1) as u64);
            dequantize(a, bin, quantum, dtype)
        };
    }

    if seen_escapes != escape_count {
        return Err(malformed(format!(
            "header declares {} escapes, codes mark {}",
            escape_count, seen_escapes
        )));
    }
    Ok(())
}
