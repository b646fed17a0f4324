use crate::{
    AmqResult,
    commands::{PrimitiveMap, PrimitiveValue},
};

/// The handshake command each peer sends first; carries the magic, the
/// highest supported wire version and the negotiable option set.
#[derive(Clone, Debug, PartialEq)]
pub struct WireFormatInfo {
    pub magic: [u8; 8],
    pub version: i32,
    pub properties: PrimitiveMap,
}

pub(crate) const OPENWIRE_MAGIC: [u8; 8] = *b"ActiveMQ";

// negotiable option keys; the misspelled initial-delay key is what the
// protocol actually uses
pub(crate) const TIGHT_ENCODING_ENABLED: &str = "TightEncodingEnabled";
pub(crate) const SIZE_PREFIX_DISABLED: &str = "SizePrefixDisabled";
pub(crate) const CACHE_ENABLED: &str = "CacheEnabled";
pub(crate) const CACHE_SIZE: &str = "CacheSize";
pub(crate) const STACK_TRACE_ENABLED: &str = "StackTraceEnabled";
pub(crate) const MAX_INACTIVITY_DURATION: &str = "MaxInactivityDuration";
pub(crate) const MAX_INACTIVITY_DURATION_INITAL_DELAY: &str = "MaxInactivityDurationInitalDelay";
pub(crate) const MAX_FRAME_SIZE: &str = "MaxFrameSize";
pub(crate) const TCP_NO_DELAY_ENABLED: &str = "TcpNoDelayEnabled";

impl Default for WireFormatInfo {
    fn default() -> Self {
        Self {
            magic: OPENWIRE_MAGIC,
            version: 0,
            properties: PrimitiveMap::new(),
        }
    }
}

impl WireFormatInfo {
    pub fn new(version: i32) -> Self {
        Self {
            version,
            ..Self::default()
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == OPENWIRE_MAGIC
    }

    fn bool_property(&self, key: &str) -> bool {
        self.properties
            .get(key)
            .and_then(|v| v.to_bool().ok())
            .unwrap_or(false)
    }

    fn long_property(&self, key: &str, default: i64) -> i64 {
        self.properties
            .get(key)
            .and_then(|v| v.to_i64().ok())
            .unwrap_or(default)
    }

    pub fn tight_encoding_enabled(&self) -> bool {
        self.bool_property(TIGHT_ENCODING_ENABLED)
    }

    pub fn size_prefix_disabled(&self) -> bool {
        self.bool_property(SIZE_PREFIX_DISABLED)
    }

    pub fn cache_enabled(&self) -> bool {
        self.bool_property(CACHE_ENABLED)
    }

    pub fn stack_trace_enabled(&self) -> bool {
        self.bool_property(STACK_TRACE_ENABLED)
    }

    pub fn tcp_no_delay_enabled(&self) -> bool {
        self.bool_property(TCP_NO_DELAY_ENABLED)
    }

    pub fn cache_size(&self) -> i32 {
        self.properties
            .get(CACHE_SIZE)
            .and_then(|v| v.to_i32().ok())
            .unwrap_or(0)
    }

    pub fn max_inactivity_duration(&self) -> i64 {
        self.long_property(MAX_INACTIVITY_DURATION, 0)
    }

    pub fn max_inactivity_duration_initial_delay(&self) -> i64 {
        self.long_property(MAX_INACTIVITY_DURATION_INITAL_DELAY, 0)
    }

    pub fn max_frame_size(&self) -> i64 {
        self.long_property(MAX_FRAME_SIZE, i64::MAX)
    }

    pub fn set_bool_property(&mut self, key: &str, value: bool) -> AmqResult<()> {
        self.properties.put(key, PrimitiveValue::Boolean(value))
    }

    pub fn set_int_property(&mut self, key: &str, value: i32) -> AmqResult<()> {
        self.properties.put(key, PrimitiveValue::Integer(value))
    }

    pub fn set_long_property(&mut self, key: &str, value: i64) -> AmqResult<()> {
        self.properties.put(key, PrimitiveValue::Long(value))
    }
}
