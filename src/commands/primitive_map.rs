use crate::{AmqError, AmqResult, amq_error::malformed, codec};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

// wire type tags
const NULL: u8 = 0;
const BOOLEAN: u8 = 1;
const BYTE: u8 = 2;
const CHAR: u8 = 3;
const SHORT: u8 = 4;
const INTEGER: u8 = 5;
const LONG: u8 = 6;
const DOUBLE: u8 = 7;
const FLOAT: u8 = 8;
const STRING: u8 = 9;
const BYTE_ARRAY: u8 = 10;
const MAP: u8 = 11;
const LIST: u8 = 12;
const BIG_STRING: u8 = 13;

// strings whose modified-UTF-8 form exceeds this are tagged BIG_STRING
const BIG_STRING_LIMIT: usize = 8191;

/// A typed primitive as it appears in message properties, map bodies and
/// the negotiation property set.
#[derive(Clone, Debug, PartialEq)]
pub enum PrimitiveValue {
    Null,
    Boolean(bool),
    Byte(i8),
    Char(char),
    Short(i16),
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
    List(Vec<PrimitiveValue>),
    Map(PrimitiveMap),
}

impl PrimitiveValue {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Byte(_) => "byte",
            Self::Char(_) => "char",
            Self::Short(_) => "short",
            Self::Integer(_) => "int",
            Self::Long(_) => "long",
            Self::Float(_) => "float",
            Self::Double(_) => "double",
            Self::Text(_) => "string",
            Self::Bytes(_) => "byte[]",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    fn conversion_error(&self, target: &str) -> AmqError {
        AmqError::MessageFormat(format!("cannot read a {} as {target}", self.type_name()))
    }

    fn parse_text<T: std::str::FromStr>(&self, s: &str, target: &str) -> AmqResult<T> {
        s.parse()
            .map_err(|_| AmqError::MessageFormat(format!("cannot parse {s:?} as {target}")))
    }

    // The permitted conversions follow the usual property lattice: numeric
    // widening plus lexical conversion through strings.

    pub fn to_bool(&self) -> AmqResult<bool> {
        match self {
            Self::Boolean(v) => Ok(*v),
            Self::Text(s) => self.parse_text(s, "boolean"),
            _ => Err(self.conversion_error("boolean")),
        }
    }

    pub fn to_i8(&self) -> AmqResult<i8> {
        match self {
            Self::Byte(v) => Ok(*v),
            Self::Text(s) => self.parse_text(s, "byte"),
            _ => Err(self.conversion_error("byte")),
        }
    }

    pub fn to_i16(&self) -> AmqResult<i16> {
        match self {
            Self::Byte(v) => Ok(i16::from(*v)),
            Self::Short(v) => Ok(*v),
            Self::Text(s) => self.parse_text(s, "short"),
            _ => Err(self.conversion_error("short")),
        }
    }

    pub fn to_i32(&self) -> AmqResult<i32> {
        match self {
            Self::Byte(v) => Ok(i32::from(*v)),
            Self::Short(v) => Ok(i32::from(*v)),
            Self::Integer(v) => Ok(*v),
            Self::Text(s) => self.parse_text(s, "int"),
            _ => Err(self.conversion_error("int")),
        }
    }

    pub fn to_i64(&self) -> AmqResult<i64> {
        match self {
            Self::Byte(v) => Ok(i64::from(*v)),
            Self::Short(v) => Ok(i64::from(*v)),
            Self::Integer(v) => Ok(i64::from(*v)),
            Self::Long(v) => Ok(*v),
            Self::Text(s) => self.parse_text(s, "long"),
            _ => Err(self.conversion_error("long")),
        }
    }

    pub fn to_f32(&self) -> AmqResult<f32> {
        match self {
            Self::Float(v) => Ok(*v),
            Self::Text(s) => self.parse_text(s, "float"),
            _ => Err(self.conversion_error("float")),
        }
    }

    pub fn to_f64(&self) -> AmqResult<f64> {
        match self {
            Self::Float(v) => Ok(f64::from(*v)),
            Self::Double(v) => Ok(*v),
            Self::Text(s) => self.parse_text(s, "double"),
            _ => Err(self.conversion_error("double")),
        }
    }

    pub fn to_char(&self) -> AmqResult<char> {
        match self {
            Self::Char(v) => Ok(*v),
            _ => Err(self.conversion_error("char")),
        }
    }

    pub fn to_text(&self) -> AmqResult<String> {
        match self {
            Self::Boolean(v) => Ok(v.to_string()),
            Self::Byte(v) => Ok(v.to_string()),
            Self::Char(v) => Ok(v.to_string()),
            Self::Short(v) => Ok(v.to_string()),
            Self::Integer(v) => Ok(v.to_string()),
            Self::Long(v) => Ok(v.to_string()),
            Self::Float(v) => Ok(v.to_string()),
            Self::Double(v) => Ok(v.to_string()),
            Self::Text(s) => Ok(s.clone()),
            _ => Err(self.conversion_error("string")),
        }
    }

    pub fn to_bytes(&self) -> AmqResult<Vec<u8>> {
        match self {
            Self::Bytes(v) => Ok(v.clone()),
            _ => Err(self.conversion_error("byte[]")),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_possible_wrap)]
    pub(crate) fn emit(&self, w: &mut dyn std::io::Write) -> AmqResult<()> {
        match self {
            Self::Null => w.write_u8(NULL)?,
            Self::Boolean(v) => {
                w.write_u8(BOOLEAN)?;
                w.write_u8((*v).into())?;
            }
            Self::Byte(v) => {
                w.write_u8(BYTE)?;
                w.write_i8(*v)?;
            }
            Self::Char(v) => {
                if *v as u32 > 0xFFFF {
                    return Err(AmqError::Invalid("char values are limited to the BMP"));
                }
                w.write_u8(CHAR)?;
                w.write_u16::<BigEndian>(*v as u16)?; // one UTF-16 code unit
            }
            Self::Short(v) => {
                w.write_u8(SHORT)?;
                w.write_i16::<BigEndian>(*v)?;
            }
            Self::Integer(v) => {
                w.write_u8(INTEGER)?;
                w.write_i32::<BigEndian>(*v)?;
            }
            Self::Long(v) => {
                w.write_u8(LONG)?;
                w.write_i64::<BigEndian>(*v)?;
            }
            Self::Float(v) => {
                w.write_u8(FLOAT)?;
                w.write_f32::<BigEndian>(*v)?;
            }
            Self::Double(v) => {
                w.write_u8(DOUBLE)?;
                w.write_f64::<BigEndian>(*v)?;
            }
            Self::Text(s) => {
                if codec::modified_utf8_length(s) > BIG_STRING_LIMIT {
                    w.write_u8(BIG_STRING)?;
                    codec::write_big_utf8(s, w)?;
                } else {
                    w.write_u8(STRING)?;
                    codec::write_utf8(s, w)?;
                }
            }
            Self::Bytes(v) => {
                w.write_u8(BYTE_ARRAY)?;
                w.write_i32::<BigEndian>(v.len() as i32)?;
                w.write_all(v)?;
            }
            Self::List(elements) => {
                w.write_u8(LIST)?;
                w.write_i32::<BigEndian>(elements.len() as i32)?;
                for element in elements {
                    element.emit(w)?;
                }
            }
            Self::Map(map) => {
                w.write_u8(MAP)?;
                map.emit(w)?;
            }
        }
        Ok(())
    }

    #[allow(clippy::cast_sign_loss)]
    pub(crate) fn parse(rdr: &mut dyn std::io::Read) -> AmqResult<Self> {
        let tag = rdr.read_u8()?;
        Ok(match tag {
            NULL => Self::Null,
            BOOLEAN => Self::Boolean(rdr.read_u8()? > 0),
            BYTE => Self::Byte(rdr.read_i8()?),
            CHAR => {
                let unit = rdr.read_u16::<BigEndian>()?;
                Self::Char(
                    char::from_u32(u32::from(unit))
                        .ok_or_else(|| malformed!("unpaired surrogate {unit:#06x} in char"))?,
                )
            }
            SHORT => Self::Short(rdr.read_i16::<BigEndian>()?),
            INTEGER => Self::Integer(rdr.read_i32::<BigEndian>()?),
            LONG => Self::Long(rdr.read_i64::<BigEndian>()?),
            DOUBLE => Self::Double(rdr.read_f64::<BigEndian>()?),
            FLOAT => Self::Float(rdr.read_f32::<BigEndian>()?),
            STRING => Self::Text(codec::read_utf8(rdr)?),
            BIG_STRING => Self::Text(codec::read_big_utf8(rdr)?),
            BYTE_ARRAY => {
                let len = rdr.read_i32::<BigEndian>()?;
                if len < 0 {
                    return Err(malformed!("negative byte array length {len}"));
                }
                Self::Bytes(codec::parse_bytes(len as usize, rdr)?)
            }
            LIST => {
                let count = rdr.read_i32::<BigEndian>()?;
                if count < 0 {
                    return Err(malformed!("negative list length {count}"));
                }
                let mut elements = Vec::with_capacity(count.min(1024) as usize);
                for _ in 0..count {
                    elements.push(Self::parse(rdr)?);
                }
                Self::List(elements)
            }
            MAP => Self::Map(PrimitiveMap::parse(rdr)?),
            _ => return Err(malformed!("unknown primitive type tag {tag}")),
        })
    }
}

impl From<bool> for PrimitiveValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}
impl From<i8> for PrimitiveValue {
    fn from(v: i8) -> Self {
        Self::Byte(v)
    }
}
impl From<i16> for PrimitiveValue {
    fn from(v: i16) -> Self {
        Self::Short(v)
    }
}
impl From<i32> for PrimitiveValue {
    fn from(v: i32) -> Self {
        Self::Integer(v)
    }
}
impl From<i64> for PrimitiveValue {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}
impl From<f32> for PrimitiveValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}
impl From<f64> for PrimitiveValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}
impl From<&str> for PrimitiveValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}
impl From<String> for PrimitiveValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}
impl From<Vec<u8>> for PrimitiveValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl std::fmt::Display for PrimitiveValue {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Byte(v) => write!(f, "{v}"),
            Self::Char(v) => write!(f, "{v}"),
            Self::Short(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Long(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
            Self::Bytes(v) => write!(f, "{v:?}"),
            Self::List(v) => write!(f, "{v:?}"),
            Self::Map(v) => write!(f, "{v:?}"),
        }
    }
}

/// An insertion-ordered map of named [`PrimitiveValue`]s.
///
/// Insertion order is preserved because it is visible on the wire, both in
/// the marshalled form and in the order of STOMP headers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PrimitiveMap {
    entries: Vec<(String, PrimitiveValue)>,
}

impl PrimitiveMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn get(&self, key: &str) -> Option<&PrimitiveValue> {
        self.entries
            .iter()
            .find_map(|(k, v)| (k == key).then_some(v))
    }

    /// Inserts or replaces a value. Empty keys are rejected.
    pub fn put<V: Into<PrimitiveValue>>(&mut self, key: &str, value: V) -> AmqResult<()> {
        if key.is_empty() {
            return Err(AmqError::Invalid("property name must not be empty"));
        }
        let value = value.into();
        if let Some(slot) = self
            .entries
            .iter_mut()
            .find_map(|(k, v)| (k == key).then_some(v))
        {
            *slot = value;
        } else {
            self.entries.push((key.to_string(), value));
        }
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<PrimitiveValue> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PrimitiveValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_possible_wrap)]
    pub(crate) fn emit(&self, w: &mut dyn std::io::Write) -> AmqResult<()> {
        w.write_i32::<BigEndian>(self.entries.len() as i32)?; // I4: entry count
        for (key, value) in &self.entries {
            codec::write_utf8(key, w)?;
            value.emit(w)?;
        }
        Ok(())
    }

    pub(crate) fn parse(rdr: &mut dyn std::io::Read) -> AmqResult<Self> {
        let count = rdr.read_i32::<BigEndian>()?;
        let mut map = Self::new();
        // a negative count is the marshalled form of "no map"
        for _ in 0..count.max(0) {
            let key = codec::read_utf8(rdr)?;
            let value = PrimitiveValue::parse(rdr)?;
            if key.is_empty() {
                return Err(malformed!("empty property name in marshalled map"));
            }
            map.entries.push((key, value));
        }
        Ok(map)
    }

    pub(crate) fn to_marshalled_bytes(&self) -> AmqResult<Vec<u8>> {
        let mut buf = Vec::new();
        self.emit(&mut buf)?;
        Ok(buf)
    }

    pub(crate) fn from_marshalled_bytes(bytes: &[u8]) -> AmqResult<Self> {
        Self::parse(&mut &bytes[..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_map() -> PrimitiveMap {
        let mut map = PrimitiveMap::new();
        map.put("on", true).unwrap();
        map.put("b", -3_i8).unwrap();
        map.put("s", 300_i16).unwrap();
        map.put("i", 70_000_i32).unwrap();
        map.put("l", 1_i64 << 40).unwrap();
        map.put("f", 1.5_f32).unwrap();
        map.put("d", -2.25_f64).unwrap();
        map.put("t", "text").unwrap();
        map.put("raw", vec![1_u8, 2, 3]).unwrap();
        map.put(
            "nested",
            PrimitiveValue::List(vec![PrimitiveValue::Integer(1), PrimitiveValue::Null]),
        )
        .unwrap();
        map
    }

    #[test]
    fn map_roundtrip() {
        let map = sample_map();
        let bytes = map.to_marshalled_bytes().unwrap();
        let restored = PrimitiveMap::from_marshalled_bytes(&bytes).unwrap();
        assert_eq!(map, restored);
    }

    #[test]
    fn reference_byte_layout_per_tag() {
        fn emitted(value: PrimitiveValue) -> Vec<u8> {
            let mut buf = Vec::new();
            value.emit(&mut buf).unwrap();
            buf
        }
        assert_eq!(emitted(PrimitiveValue::Null), [0]);
        assert_eq!(emitted(PrimitiveValue::Boolean(true)), [1, 1]);
        assert_eq!(emitted(PrimitiveValue::Byte(-1)), [2, 0xFF]);
        assert_eq!(emitted(PrimitiveValue::Char('A')), [3, 0, 65]);
        assert_eq!(emitted(PrimitiveValue::Short(258)), [4, 1, 2]);
        assert_eq!(emitted(PrimitiveValue::Integer(66051)), [5, 0, 1, 2, 3]);
        assert_eq!(
            emitted(PrimitiveValue::Long(1)),
            [6, 0, 0, 0, 0, 0, 0, 0, 1]
        );
        assert_eq!(
            emitted(PrimitiveValue::Double(1.0)),
            [7, 0x3F, 0xF0, 0, 0, 0, 0, 0, 0]
        );
        assert_eq!(emitted(PrimitiveValue::Float(1.0)), [8, 0x3F, 0x80, 0, 0]);
        assert_eq!(
            emitted(PrimitiveValue::Text("ab".to_string())),
            [9, 0, 2, b'a', b'b']
        );
        assert_eq!(
            emitted(PrimitiveValue::Bytes(vec![7, 8])),
            [10, 0, 0, 0, 2, 7, 8]
        );
    }

    #[test]
    fn long_strings_switch_to_the_big_tag() {
        let long = "x".repeat(8192);
        let mut buf = Vec::new();
        PrimitiveValue::Text(long.clone()).emit(&mut buf).unwrap();
        assert_eq!(buf[0], 13);
        let restored = PrimitiveValue::parse(&mut &buf[..]).unwrap();
        assert_eq!(restored, PrimitiveValue::Text(long));
    }

    #[test]
    fn empty_keys_are_rejected() {
        let mut map = PrimitiveMap::new();
        assert!(matches!(
            map.put("", 1_i32),
            Err(crate::AmqError::Invalid(_))
        ));
    }

    #[test]
    fn conversion_lattice() {
        let v = PrimitiveValue::Byte(5);
        assert_eq!(v.to_i16().unwrap(), 5);
        assert_eq!(v.to_i32().unwrap(), 5);
        assert_eq!(v.to_i64().unwrap(), 5);
        assert!(v.to_f64().is_err());

        let v = PrimitiveValue::Float(1.5);
        assert_eq!(v.to_f64().unwrap(), 1.5);
        assert!(v.to_i32().is_err());

        let v = PrimitiveValue::Text("42".to_string());
        assert_eq!(v.to_i32().unwrap(), 42);
        assert_eq!(v.to_i64().unwrap(), 42);
        assert!(v.to_bool().is_err());

        let v = PrimitiveValue::Long(1);
        assert!(v.to_i32().is_err()); // no narrowing
        assert_eq!(v.to_text().unwrap(), "1");

        assert!(PrimitiveValue::Bytes(vec![1]).to_text().is_err());
    }
}
