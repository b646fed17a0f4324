use crate::{AmqError, AmqResult, amq_error::malformed};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

// Read n bytes, return as Vec<u8>
pub(crate) fn parse_bytes(len: usize, rdr: &mut dyn std::io::Read) -> AmqResult<Vec<u8>> {
    let mut vec = vec![0_u8; len];
    rdr.read_exact(&mut vec)?;
    Ok(vec)
}

// Consumes the modified-UTF-8 bytes, returns a String with minimal allocation
pub(crate) fn string_from_modified_utf8(bytes: Vec<u8>) -> AmqResult<String> {
    // a naked NUL (must be C0 80) and four-byte sequences (must be surrogate
    // pairs) are not valid modified UTF-8, even though they are valid UTF-8
    if bytes.iter().any(|b| *b == 0 || *b >= 0xF0) {
        return Err(AmqError::Cesu8);
    }
    String::from_utf8(bytes).or_else(|e| {
        Ok(cesu8::from_java_cesu8(e.as_bytes())
            .map_err(|_| AmqError::Cesu8)?
            .to_string())
    })
}

// modified UTF-8 is identical to utf-8, except for high code points
// (4 utf-8 bytes -> 6) and U+0000 (1 byte -> 2)
pub(crate) fn modified_utf8_length(s: &str) -> usize {
    let mut len = s.len();
    for b in s.as_bytes() {
        if *b >= 240_u8 {
            len += 2;
        } else if *b == 0 {
            len += 1;
        }
    }
    len
}

#[allow(clippy::cast_possible_truncation)]
pub(crate) fn write_utf8(s: &str, w: &mut dyn std::io::Write) -> AmqResult<()> {
    let bytes = cesu8::to_java_cesu8(s);
    if bytes.len() > usize::from(u16::MAX) {
        return Err(AmqError::Invalid("string too long for a short UTF field"));
    }
    w.write_u16::<BigEndian>(bytes.len() as u16)?; // U2: length of value
    w.write_all(&bytes)?; // B (varying)
    Ok(())
}

pub(crate) fn read_utf8(rdr: &mut dyn std::io::Read) -> AmqResult<String> {
    let len = rdr.read_u16::<BigEndian>()? as usize; // U2: length of value
    string_from_modified_utf8(parse_bytes(len, rdr)?)
}

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_possible_wrap)]
pub(crate) fn write_big_utf8(s: &str, w: &mut dyn std::io::Write) -> AmqResult<()> {
    let bytes = cesu8::to_java_cesu8(s);
    if bytes.len() > i32::MAX as usize {
        return Err(AmqError::Invalid("string too long for a long UTF field"));
    }
    w.write_i32::<BigEndian>(bytes.len() as i32)?; // I4: length of value
    w.write_all(&bytes)?;
    Ok(())
}

#[allow(clippy::cast_sign_loss)]
pub(crate) fn read_big_utf8(rdr: &mut dyn std::io::Read) -> AmqResult<String> {
    let len = rdr.read_i32::<BigEndian>()?; // I4: length of value
    if len < 0 {
        return Err(malformed!("negative UTF length {len}"));
    }
    string_from_modified_utf8(parse_bytes(len as usize, rdr)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(s: &str) {
        let mut buf = Vec::new();
        write_utf8(s, &mut buf).unwrap();
        let restored = read_utf8(&mut &buf[..]).unwrap();
        assert_eq!(s, restored);
    }

    #[test]
    fn utf8_roundtrip() {
        roundtrip("");
        roundtrip("plain ascii");
        roundtrip("überläßt: 表題は必要");
        roundtrip("mixed \u{0000} with embedded NUL");
        roundtrip("\u{0000}");
        roundtrip("boundary \u{ffff}\u{0001}");
    }

    #[test]
    fn embedded_nul_uses_the_overlong_form() {
        let mut buf = Vec::new();
        write_utf8("a\u{0000}b", &mut buf).unwrap();
        assert_eq!(buf, [0, 4, b'a', 0xC0, 0x80, b'b']);
    }

    #[test]
    fn naked_nul_is_rejected() {
        assert!(string_from_modified_utf8(vec![b'a', 0x00]).is_err());
    }

    #[test]
    fn truncated_trail_bytes_are_rejected() {
        // 0xE8 opens a three-byte sequence
        assert!(string_from_modified_utf8(vec![0xE8, 0x80]).is_err());
        assert!(string_from_modified_utf8(vec![0xC3]).is_err());
    }

    #[test]
    fn length_accounts_for_overlongs() {
        assert_eq!(modified_utf8_length("abc"), 3);
        assert_eq!(modified_utf8_length("a\u{0000}"), 3);
        // U+1F4A9 is four utf-8 bytes but six in modified UTF-8
        assert_eq!(modified_utf8_length("\u{1F4A9}"), 6);
    }
}
