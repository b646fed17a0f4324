use crate::{AmqResult, amq_error::malformed};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

// Packed bit buffer that precedes a tight-encoded command body.
//
// The writer records presence bits during the sizing pass; the emission pass
// and the decoder consume them again through the read cursor. On the wire the
// bitmap is preceded by its byte count in a compact form: one byte below 64,
// a 0xC0 marker plus one byte below 256, a 0x80 marker plus a short above.
#[derive(Debug, Default)]
pub(crate) struct BooleanStream {
    data: Vec<u8>,
    write_bit: u8,
    read_pos: usize,
}

impl BooleanStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_bool(&mut self, value: bool) {
        if self.write_bit == 0 {
            self.data.push(0);
        }
        if value {
            let last = self.data.len() - 1;
            self.data[last] |= 1 << self.write_bit;
        }
        self.write_bit = (self.write_bit + 1) % 8;
    }

    pub fn read_bool(&mut self) -> AmqResult<bool> {
        let byte = self
            .data
            .get(self.read_pos / 8)
            .ok_or_else(|| malformed!("boolean stream exhausted at bit {}", self.read_pos))?;
        let value = (byte >> (self.read_pos % 8)) & 1 == 1;
        self.read_pos += 1;
        Ok(value)
    }

    // Bytes the marshalled form will occupy, including the length prefix
    pub fn marshalled_size(&self) -> usize {
        let len = self.data.len();
        if len < 64 {
            1 + len
        } else if len < 256 {
            2 + len
        } else {
            3 + len
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn marshal(&mut self, w: &mut dyn std::io::Write) -> AmqResult<()> {
        let len = self.data.len();
        if len < 64 {
            w.write_u8(len as u8)?;
        } else if len < 256 {
            w.write_u8(0xC0)?;
            w.write_u8(len as u8)?;
        } else {
            w.write_u8(0x80)?;
            w.write_u16::<BigEndian>(len as u16)?;
        }
        w.write_all(&self.data)?;
        // the emission pass replays the recorded bits from the start
        self.read_pos = 0;
        Ok(())
    }

    pub fn unmarshal(r: &mut dyn std::io::Read) -> AmqResult<Self> {
        let first = r.read_u8()?;
        let len = match first {
            0xC0 => usize::from(r.read_u8()?),
            0x80 => usize::from(r.read_u16::<BigEndian>()?),
            n => usize::from(n),
        };
        let data = super::parse_bytes(len, r)?;
        Ok(Self {
            data,
            write_bit: 0,
            read_pos: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(bits: &[bool]) {
        let mut bs = BooleanStream::new();
        for b in bits {
            bs.write_bool(*b);
        }
        let mut buf = Vec::new();
        bs.marshal(&mut buf).unwrap();
        let mut restored = BooleanStream::unmarshal(&mut &buf[..]).unwrap();
        for b in bits {
            assert_eq!(*b, restored.read_bool().unwrap());
        }
    }

    #[test]
    fn roundtrips_across_length_prefix_forms() {
        roundtrip(&[]);
        roundtrip(&[true]);
        roundtrip(&[true, false, true, true, false, false, true, false, true]);
        // 64 bytes of bitmap needs the 0xC0 form, 256 the 0x80 form
        roundtrip(&vec![true; 64 * 8]);
        roundtrip(&vec![false; 300 * 8]);
    }

    #[test]
    fn marshal_resets_the_read_cursor() {
        let mut bs = BooleanStream::new();
        bs.write_bool(true);
        bs.write_bool(false);
        let mut buf = Vec::new();
        bs.marshal(&mut buf).unwrap();
        assert!(bs.read_bool().unwrap());
        assert!(!bs.read_bool().unwrap());
        assert!(bs.read_bool().is_err());
    }

    #[test]
    fn compact_length_boundaries() {
        let mut bs = BooleanStream::new();
        for _ in 0..63 * 8 {
            bs.write_bool(false);
        }
        assert_eq!(bs.marshalled_size(), 1 + 63);
        bs.write_bool(false);
        assert_eq!(bs.marshalled_size(), 2 + 64);
    }
}
