//! Bit-packed buffer
//!
//! Append-only buffer that packs values most-significant-bit first, used to
//! assemble the linearization hint tables. Sequences inside a hint table are
//! byte-aligned between each other with [`BitWriter::pad`].

use bytes::{BufMut, Bytes, BytesMut};

/// Accumulates bit-packed values into a byte buffer.
pub struct BitWriter {
    buf: BytesMut,
    // partial byte, bits packed from the high end
    acc: u8,
    used: u32,
}

impl BitWriter {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(256),
            acc: 0,
            used: 0,
        }
    }

    /// Append the low `nbits` bits of `value`, most significant first.
    pub fn write_bits(&mut self, value: u64, nbits: u32) {
        debug_assert!(nbits <= 64);
        let mut n = nbits;
        while n > 0 {
            let room = 8 - self.used;
            let take = room.min(n);
            let shift = n - take;
            let bits = ((value >> shift) & ((1u64 << take) - 1)) as u8;
            self.acc |= bits << (room - take);
            self.used += take;
            n -= take;
            if self.used == 8 {
                self.buf.put_u8(self.acc);
                self.acc = 0;
                self.used = 0;
            }
        }
    }

    /// Pad with zero bits up to the next byte boundary.
    pub fn pad(&mut self) {
        if self.used > 0 {
            self.buf.put_u8(self.acc);
            self.acc = 0;
            self.used = 0;
        }
    }

    /// Number of whole bytes emitted so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty() && self.used == 0
    }

    /// Pad and freeze into the final byte sequence.
    pub fn into_bytes(mut self) -> Bytes {
        self.pad();
        self.buf.freeze()
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_bits() {
        let mut w = BitWriter::new();
        w.write_bits(1, 1);
        w.write_bits(0, 1);
        w.write_bits(1, 1);
        w.pad();
        assert_eq!(w.into_bytes().as_ref(), &[0b1010_0000]);
    }

    #[test]
    fn test_byte_aligned_values() {
        let mut w = BitWriter::new();
        w.write_bits(0x12345678, 32);
        w.write_bits(0xABCD, 16);
        assert_eq!(
            w.into_bytes().as_ref(),
            &[0x12, 0x34, 0x56, 0x78, 0xAB, 0xCD]
        );
    }

    #[test]
    fn test_spanning_values() {
        let mut w = BitWriter::new();
        // 3 + 13 bits = 2 bytes exactly
        w.write_bits(0b101, 3);
        w.write_bits(0b1_0000_0000_1111, 13);
        assert_eq!(w.into_bytes().as_ref(), &[0b1011_0000, 0b0000_1111]);
    }

    #[test]
    fn test_pad_between_sequences() {
        let mut w = BitWriter::new();
        w.write_bits(0b11, 2);
        w.pad();
        w.write_bits(0b1, 1);
        w.pad();
        assert_eq!(w.into_bytes().as_ref(), &[0b1100_0000, 0b1000_0000]);
    }

    #[test]
    fn test_pad_on_boundary_is_noop() {
        let mut w = BitWriter::new();
        w.write_bits(0xFF, 8);
        w.pad();
        w.pad();
        assert_eq!(w.len(), 1);
        assert_eq!(w.into_bytes().as_ref(), &[0xFF]);
    }

    #[test]
    fn test_zero_width_write() {
        let mut w = BitWriter::new();
        w.write_bits(0, 0);
        assert!(w.is_empty());
    }

    #[test]
    fn test_len_counts_whole_bytes() {
        let mut w = BitWriter::new();
        w.write_bits(0b1, 1);
        assert_eq!(w.len(), 0);
        w.write_bits(0, 7);
        assert_eq!(w.len(), 1);
    }
}
