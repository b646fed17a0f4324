use crate::{
    AmqError, AmqResult,
    amq_error::malformed,
    codec,
    commands::{
        BrokerId, ConsumerId, Destination, MessageId, PrimitiveMap, PrimitiveValue, ProducerId,
        TransactionId, data_structure::DataStructure,
    },
};
use debug_ignore::DebugIgnore;

/// The typed body of a [`Message`].
///
/// The broker distinguishes the flavors by the command type code; the body
/// bytes on the wire are the flavor-specific encoding produced by
/// [`Message::marshalled_content`].
#[derive(Clone, Debug, PartialEq)]
pub enum MessagePayload {
    /// A message without a body.
    Plain,
    /// A UTF-8 text body.
    Text(Option<String>),
    /// An uninterpreted byte body.
    Bytes(DebugIgnore<Vec<u8>>),
    /// A map of named primitive values.
    Map(PrimitiveMap),
    /// A sequence of primitive values read back one at a time.
    Stream(Vec<PrimitiveValue>),
    /// An opaque serialized object.
    Object(DebugIgnore<Vec<u8>>),
}

/// A message as it travels between client and broker.
///
/// This is one record for all message flavors; the flavor lives in
/// [`MessagePayload`]. Header mutation is unrestricted, body and property
/// mutation honor the read-only facets.
#[derive(Clone, Debug, Default)]
pub struct Message {
    pub producer_id: Option<ProducerId>,
    pub destination: Option<Destination>,
    pub transaction_id: Option<TransactionId>,
    pub original_destination: Option<Destination>,
    pub message_id: Option<MessageId>,
    pub original_transaction_id: Option<TransactionId>,
    pub group_id: Option<String>,
    pub group_sequence: i32,
    pub correlation_id: Option<String>,
    pub persistent: bool,
    pub expiration: i64,
    pub priority: i8,
    pub reply_to: Option<Destination>,
    pub timestamp: i64,
    pub message_type: Option<String>,
    pub data_structure: Option<Box<DataStructure>>,
    pub target_consumer_id: Option<ConsumerId>,
    pub compressed: bool,
    pub redelivery_counter: i32,
    pub broker_path: Vec<BrokerId>,
    pub arrival: i64,
    pub user_id: Option<String>,
    pub received_by_df_bridge: bool,
    pub droppable: bool,
    pub cluster: Vec<BrokerId>,
    pub broker_in_time: i64,
    pub broker_out_time: i64,
    pub group_first_for_consumer: bool,
    payload: MessagePayload,
    properties: PrimitiveMap,
    read_only_body: bool,
    read_only_properties: bool,
    cursor: usize,
}

pub const DEFAULT_PRIORITY: i8 = 4;

impl Default for MessagePayload {
    fn default() -> Self {
        Self::Plain
    }
}

impl Message {
    pub fn new(payload: MessagePayload) -> Self {
        Self {
            priority: DEFAULT_PRIORITY,
            payload,
            ..Self::default()
        }
    }

    pub fn plain() -> Self {
        Self::new(MessagePayload::Plain)
    }

    pub fn text<S: Into<String>>(body: S) -> Self {
        Self::new(MessagePayload::Text(Some(body.into())))
    }

    pub fn bytes(body: Vec<u8>) -> Self {
        Self::new(MessagePayload::Bytes(DebugIgnore(body)))
    }

    pub fn map(body: PrimitiveMap) -> Self {
        Self::new(MessagePayload::Map(body))
    }

    pub fn stream() -> Self {
        Self::new(MessagePayload::Stream(Vec::new()))
    }

    pub fn object(serialized_form: Vec<u8>) -> Self {
        Self::new(MessagePayload::Object(DebugIgnore(serialized_form)))
    }

    pub fn payload(&self) -> &MessagePayload {
        &self.payload
    }

    // --- facets ---------------------------------------------------------

    pub fn is_read_only_body(&self) -> bool {
        self.read_only_body
    }

    pub fn is_read_only_properties(&self) -> bool {
        self.read_only_properties
    }

    /// Called by a producer when the message goes out; freezes both facets.
    pub fn on_send(&mut self) {
        self.read_only_body = true;
        self.read_only_properties = true;
    }

    pub(crate) fn set_read_only(&mut self, read_only: bool) {
        self.read_only_body = read_only;
        self.read_only_properties = read_only;
    }

    fn writable_body(&self) -> AmqResult<()> {
        if self.read_only_body {
            Err(AmqError::MessageNotWritable)
        } else {
            Ok(())
        }
    }

    /// Clears the body and makes it writable again.
    pub fn clear_body(&mut self) {
        self.read_only_body = false;
        self.cursor = 0;
        self.payload = match &self.payload {
            MessagePayload::Plain => MessagePayload::Plain,
            MessagePayload::Text(_) => MessagePayload::Text(None),
            MessagePayload::Bytes(_) => MessagePayload::Bytes(DebugIgnore(Vec::new())),
            MessagePayload::Map(_) => MessagePayload::Map(PrimitiveMap::new()),
            MessagePayload::Stream(_) => MessagePayload::Stream(Vec::new()),
            MessagePayload::Object(_) => MessagePayload::Object(DebugIgnore(Vec::new())),
        };
    }

    // --- text body ------------------------------------------------------

    pub fn body_text(&self) -> AmqResult<Option<&str>> {
        match &self.payload {
            MessagePayload::Text(text) => Ok(text.as_deref()),
            _ => Err(AmqError::MessageFormat("not a text message".to_string())),
        }
    }

    pub fn set_body_text<S: Into<String>>(&mut self, text: S) -> AmqResult<()> {
        self.writable_body()?;
        match &mut self.payload {
            MessagePayload::Text(slot) => {
                *slot = Some(text.into());
                Ok(())
            }
            _ => Err(AmqError::MessageFormat("not a text message".to_string())),
        }
    }

    // --- bytes body -----------------------------------------------------

    pub fn body_bytes(&self) -> AmqResult<&[u8]> {
        match &self.payload {
            MessagePayload::Bytes(data) | MessagePayload::Object(data) => Ok(data.as_slice()),
            _ => Err(AmqError::MessageFormat("not a bytes message".to_string())),
        }
    }

    pub fn write_body_bytes(&mut self, chunk: &[u8]) -> AmqResult<()> {
        self.writable_body()?;
        match &mut self.payload {
            MessagePayload::Bytes(data) => {
                data.extend_from_slice(chunk);
                Ok(())
            }
            _ => Err(AmqError::MessageFormat("not a bytes message".to_string())),
        }
    }

    /// Reads the next chunk of a bytes body; returns the number of bytes read,
    /// zero at the end.
    pub fn read_body_bytes(&mut self, buf: &mut [u8]) -> AmqResult<usize> {
        if !self.read_only_body {
            return Err(AmqError::MessageNotReadable);
        }
        match &self.payload {
            MessagePayload::Bytes(data) => {
                let remaining = &data[self.cursor.min(data.len())..];
                let n = remaining.len().min(buf.len());
                buf[..n].copy_from_slice(&remaining[..n]);
                self.cursor += n;
                Ok(n)
            }
            _ => Err(AmqError::MessageFormat("not a bytes message".to_string())),
        }
    }

    /// Rewinds the body cursor to the start. The read/write mode is not
    /// changed by a reset.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    // --- map body -------------------------------------------------------

    pub fn body_map(&self) -> AmqResult<&PrimitiveMap> {
        match &self.payload {
            MessagePayload::Map(map) => Ok(map),
            _ => Err(AmqError::MessageFormat("not a map message".to_string())),
        }
    }

    pub fn body_map_mut(&mut self) -> AmqResult<&mut PrimitiveMap> {
        self.writable_body()?;
        match &mut self.payload {
            MessagePayload::Map(map) => Ok(map),
            _ => Err(AmqError::MessageFormat("not a map message".to_string())),
        }
    }

    // --- stream body ----------------------------------------------------

    pub fn write_stream_value<V: Into<PrimitiveValue>>(&mut self, value: V) -> AmqResult<()> {
        self.writable_body()?;
        match &mut self.payload {
            MessagePayload::Stream(values) => {
                values.push(value.into());
                Ok(())
            }
            _ => Err(AmqError::MessageFormat("not a stream message".to_string())),
        }
    }

    pub fn read_stream_value(&mut self) -> AmqResult<Option<PrimitiveValue>> {
        if !self.read_only_body {
            return Err(AmqError::MessageNotReadable);
        }
        match &self.payload {
            MessagePayload::Stream(values) => {
                let value = values.get(self.cursor).cloned();
                if value.is_some() {
                    self.cursor += 1;
                }
                Ok(value)
            }
            _ => Err(AmqError::MessageFormat("not a stream message".to_string())),
        }
    }

    // --- properties -----------------------------------------------------

    pub fn properties(&self) -> &PrimitiveMap {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PrimitiveValue> {
        self.properties.get(name)
    }

    pub fn set_property<V: Into<PrimitiveValue>>(&mut self, name: &str, value: V) -> AmqResult<()> {
        if self.read_only_properties {
            return Err(AmqError::MessageNotWritable);
        }
        self.properties.put(name, value)
    }

    /// Clears the properties and makes them writable again.
    pub fn clear_properties(&mut self) {
        self.read_only_properties = false;
        self.properties.clear();
    }

    pub(crate) fn set_properties(&mut self, properties: PrimitiveMap) {
        self.properties = properties;
    }

    // --- wire body encoding --------------------------------------------

    /// The command type code for this message flavor.
    pub fn data_structure_type(&self) -> u8 {
        match self.payload {
            MessagePayload::Plain => 23,
            MessagePayload::Bytes(_) => 24,
            MessagePayload::Map(_) => 25,
            MessagePayload::Object(_) => 26,
            MessagePayload::Stream(_) => 27,
            MessagePayload::Text(_) => 28,
        }
    }

    // The `content` byte vector as it goes on the wire.
    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_possible_wrap)]
    pub(crate) fn marshalled_content(&self) -> AmqResult<Option<Vec<u8>>> {
        Ok(match &self.payload {
            MessagePayload::Plain | MessagePayload::Text(None) => None,
            MessagePayload::Text(Some(text)) => {
                let mut buf = Vec::with_capacity(text.len() + 4);
                codec::write_big_utf8(text, &mut buf)?;
                Some(buf)
            }
            MessagePayload::Bytes(data) | MessagePayload::Object(data) => {
                if data.is_empty() {
                    None
                } else {
                    Some(data.0.clone())
                }
            }
            MessagePayload::Map(map) => {
                if map.is_empty() {
                    None
                } else {
                    Some(map.to_marshalled_bytes()?)
                }
            }
            MessagePayload::Stream(values) => {
                if values.is_empty() {
                    None
                } else {
                    let mut buf = Vec::new();
                    for value in values {
                        value.emit(&mut buf)?;
                    }
                    Some(buf)
                }
            }
        })
    }

    pub(crate) fn payload_from_content(
        type_code: u8,
        compressed: bool,
        content: Option<Vec<u8>>,
    ) -> AmqResult<MessagePayload> {
        if compressed {
            return Err(malformed!(
                "compressed message bodies are not supported by this client"
            ));
        }
        Ok(match (type_code, content) {
            (23, _) => MessagePayload::Plain,
            (28, None) => MessagePayload::Text(None),
            (28, Some(bytes)) => {
                MessagePayload::Text(Some(codec::read_big_utf8(&mut &bytes[..])?))
            }
            (24, content) => MessagePayload::Bytes(DebugIgnore(content.unwrap_or_default())),
            (26, content) => MessagePayload::Object(DebugIgnore(content.unwrap_or_default())),
            (25, None) => MessagePayload::Map(PrimitiveMap::new()),
            (25, Some(bytes)) => MessagePayload::Map(PrimitiveMap::from_marshalled_bytes(&bytes)?),
            (27, None) => MessagePayload::Stream(Vec::new()),
            (27, Some(bytes)) => {
                let mut rdr = &bytes[..];
                let mut values = Vec::new();
                while !rdr.is_empty() {
                    values.push(PrimitiveValue::parse(&mut rdr)?);
                }
                MessagePayload::Stream(values)
            }
            (code, _) => return Err(malformed!("unknown message type code {code}")),
        })
    }

    // The marshalled properties byte vector, None when there are none.
    pub(crate) fn marshalled_properties(&self) -> AmqResult<Option<Vec<u8>>> {
        if self.properties.is_empty() {
            Ok(None)
        } else {
            Ok(Some(self.properties.to_marshalled_bytes()?))
        }
    }
}

// Structural equality over the wire-visible fields; the body cursor and the
// read-only facets are local bookkeeping.
impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.producer_id == other.producer_id
            && self.destination == other.destination
            && self.transaction_id == other.transaction_id
            && self.original_destination == other.original_destination
            && self.message_id == other.message_id
            && self.original_transaction_id == other.original_transaction_id
            && self.group_id == other.group_id
            && self.group_sequence == other.group_sequence
            && self.correlation_id == other.correlation_id
            && self.persistent == other.persistent
            && self.expiration == other.expiration
            && self.priority == other.priority
            && self.reply_to == other.reply_to
            && self.timestamp == other.timestamp
            && self.message_type == other.message_type
            && self.data_structure == other.data_structure
            && self.target_consumer_id == other.target_consumer_id
            && self.compressed == other.compressed
            && self.redelivery_counter == other.redelivery_counter
            && self.broker_path == other.broker_path
            && self.arrival == other.arrival
            && self.user_id == other.user_id
            && self.received_by_df_bridge == other.received_by_df_bridge
            && self.droppable == other.droppable
            && self.cluster == other.cluster
            && self.broker_in_time == other.broker_in_time
            && self.broker_out_time == other.broker_out_time
            && self.group_first_for_consumer == other.group_first_for_consumer
            && self.payload == other.payload
            && self.properties == other.properties
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_send_freezes_both_facets() {
        let mut message = Message::text("body");
        message.set_property("count", 1_i32).unwrap();
        message.on_send();
        assert!(matches!(
            message.set_body_text("other"),
            Err(AmqError::MessageNotWritable)
        ));
        assert!(matches!(
            message.set_property("count", 2_i32),
            Err(AmqError::MessageNotWritable)
        ));
        assert_eq!(message.body_text().unwrap(), Some("body"));
    }

    #[test]
    fn clear_body_reopens_the_body_only() {
        let mut message = Message::text("body");
        message.on_send();
        message.clear_body();
        message.set_body_text("other").unwrap();
        assert!(message.is_read_only_properties());
    }

    #[test]
    fn bytes_cursor_and_reset() {
        let mut message = Message::bytes(vec![1, 2, 3, 4, 5]);
        assert!(matches!(
            message.read_body_bytes(&mut [0; 2]),
            Err(AmqError::MessageNotReadable)
        ));
        message.on_send();
        let mut buf = [0_u8; 2];
        assert_eq!(message.read_body_bytes(&mut buf).unwrap(), 2);
        assert_eq!(buf, [1, 2]);
        // reset rewinds without changing the mode
        message.reset();
        assert_eq!(message.read_body_bytes(&mut buf).unwrap(), 2);
        assert_eq!(buf, [1, 2]);
        assert!(message.is_read_only_body());
    }

    #[test]
    fn text_content_roundtrip() {
        let message = Message::text("TEST");
        let content = message.marshalled_content().unwrap().unwrap();
        assert_eq!(content, [0, 0, 0, 4, b'T', b'E', b'S', b'T']);
        let payload = Message::payload_from_content(28, false, Some(content)).unwrap();
        assert_eq!(payload, MessagePayload::Text(Some("TEST".to_string())));
    }

    #[test]
    fn stream_body_roundtrip() {
        let mut message = Message::stream();
        message.write_stream_value(1_i32).unwrap();
        message.write_stream_value("two").unwrap();
        message.write_stream_value(true).unwrap();
        let content = message.marshalled_content().unwrap().unwrap();
        let payload = Message::payload_from_content(27, false, Some(content)).unwrap();
        assert_eq!(
            payload,
            MessagePayload::Stream(vec![
                PrimitiveValue::Integer(1),
                PrimitiveValue::Text("two".to_string()),
                PrimitiveValue::Boolean(true),
            ])
        );
    }
}
