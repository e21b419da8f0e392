//! LSB-first packing of fixed-width codes into bytes.

use crate::CodecError;

/// Maximum number of bits in a single code.
pub const MAX_BITS: usize = 32;

const BYTE_BITS: usize = 8;

/// Appends codes of up to 32 bits to a growable buffer.
#[derive(Debug, Default)]
pub struct BitWriter {
    buff: Vec<u8>,
    acc: u64,
    pending: usize,
}

impl BitWriter {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buff: Vec::with_capacity(capacity),
            acc: 0,
            pending: 0,
        }
    }

    /// Write the low `bits` bits of `value`.
    #[inline]
    pub fn write(&mut self, value: u32, bits: usize) -> Result<(), CodecError> {
        if bits > MAX_BITS {
            return Err(CodecError::BitWidthExceeded(bits));
        }
        if bits == 0 {
            return Ok(());
        }
        let masked = (value as u64) & ((1u64 << bits) - 1);
        self.acc |= masked << self.pending;
        self.pending += bits;
        while self.pending >= BYTE_BITS {
            self.buff.push(self.acc as u8);
            self.acc >>= BYTE_BITS;
            self.pending -= BYTE_BITS;
        }
        Ok(())
    }

    /// Flush the partial byte (zero padded) and return the buffer.
    pub fn finish(mut self) -> Vec<u8> {
        if self.pending > 0 {
            self.buff.push(self.acc as u8);
        }
        self.buff
    }
}

/// Reads codes written by [`BitWriter`].
#[derive(Debug)]
pub struct BitReader<'a> {
    buff: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(buff: &'a [u8]) -> Self {
        Self { buff, pos: 0 }
    }

    fn available(&self) -> usize {
        self.buff.len() * BYTE_BITS - self.pos
    }

    /// Read `bits` bits as an unsigned value.
    #[inline]
    pub fn read(&mut self, bits: usize) -> Result<u32, CodecError> {
        if bits > MAX_BITS {
            return Err(CodecError::BitWidthExceeded(bits));
        }
        if bits > self.available() {
            return Err(CodecError::BufferOverflow {
                attempted: bits,
                available: self.available(),
            });
        }
        if bits == 0 {
            return Ok(0);
        }

        let mut out = 0u64;
        let mut got = 0usize;
        while got < bits {
            let byte = self.buff[self.pos / BYTE_BITS] as u64;
            let offset = self.pos % BYTE_BITS;
            let take = (BYTE_BITS - offset).min(bits - got);
            let chunk = (byte >> offset) & ((1u64 << take) - 1);
            out |= chunk << got;
            got += take;
            self.pos += take;
        }
        Ok(out as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_roundtrip() {
        let mut w = BitWriter::with_capacity(8);
        w.write(10, 4).unwrap();
        w.write(1021, 10).unwrap();
        w.write(3, 2).unwrap();
        w.write(u32::MAX, 32).unwrap();
        let bytes = w.finish();
        assert_eq!(bytes.len(), 6);

        let mut r = BitReader::new(&bytes);
        assert_eq!(r.read(4).unwrap(), 10);
        assert_eq!(r.read(10).unwrap(), 1021);
        assert_eq!(r.read(2).unwrap(), 3);
        assert_eq!(r.read(32).unwrap(), u32::MAX);
    }

    #[test]
    fn test_value_is_masked() {
        let mut w = BitWriter::default();
        w.write(0b1111, 2).unwrap();
        w.write(0, 6).unwrap();
        assert_eq!(w.finish(), vec![0b11]);
    }

    #[test]
    fn test_zero_width_writes_nothing() {
        let mut w = BitWriter::default();
        w.write(123, 0).unwrap();
        assert!(w.finish().is_empty());
        assert_eq!(BitReader::new(&[]).read(0).unwrap(), 0);
    }

    #[test]
    fn test_read_past_end() {
        let bytes = [0xffu8];
        let mut r = BitReader::new(&bytes);
        assert_eq!(r.read(5).unwrap(), 0b11111);
        let err = r.read(4).unwrap_err();
        assert_eq!(err, CodecError::BufferOverflow { attempted: 4, available: 3 });
    }

    #[test]
    fn test_bit_width_exceeded() {
        let mut w = BitWriter::default();
        assert!(matches!(w.write(0, 33), Err(CodecError::BitWidthExceeded(33))));
    }
}
