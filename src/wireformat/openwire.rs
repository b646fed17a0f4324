//! The OpenWire binary codec: frames, tight and loose encodings, the
//! cached-object tables and the version/option negotiation.

pub(crate) mod cache;
pub(crate) mod marshal;
pub(crate) mod unmarshal;

use crate::{
    AmqError, AmqResult,
    amq_error::malformed,
    codec::{self, BooleanStream},
    commands::{Command, CommandBody, WireFormatInfo, wire_format_info},
    wireformat::WireFormat,
};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use cache::{MarshalCache, UnmarshalCache};
use marshal::{LooseWriter, TightSizer, TightWriter, walk_command};
use std::sync::Mutex;
use unmarshal::{LooseSource, TightSource, parse_command};

/// Highest wire version this client speaks.
pub const DEFAULT_WIRE_FORMAT_VERSION: i32 = 12;

/// Default byte cap for one frame.
pub const DEFAULT_MAX_FRAME_SIZE: i64 = 104_857_600;

/// Default cached-object table capacity.
pub const DEFAULT_CACHE_SIZE: i32 = 1024;

/// Default read-inactivity window in ms.
pub const DEFAULT_MAX_INACTIVITY_DURATION: i64 = 30_000;

/// Default delay before inactivity checking starts, in ms.
pub const DEFAULT_MAX_INACTIVITY_INITIAL_DELAY: i64 = 10_000;

pub(crate) const MAX_MARSHAL_DEPTH: usize = 100;

/// The negotiable OpenWire options.
///
/// One instance describes the local preferences, a second instance holds the
/// values actually negotiated with the peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WireFormatOptions {
    pub version: i32,
    pub tight_encoding_enabled: bool,
    pub size_prefix_disabled: bool,
    pub cache_enabled: bool,
    pub cache_size: i32,
    pub stack_trace_enabled: bool,
    pub tcp_no_delay_enabled: bool,
    pub max_inactivity_duration: i64,
    pub max_inactivity_duration_initial_delay: i64,
    pub max_frame_size: i64,
}

impl Default for WireFormatOptions {
    fn default() -> Self {
        Self {
            version: DEFAULT_WIRE_FORMAT_VERSION,
            tight_encoding_enabled: true,
            size_prefix_disabled: false,
            cache_enabled: true,
            cache_size: DEFAULT_CACHE_SIZE,
            stack_trace_enabled: true,
            tcp_no_delay_enabled: true,
            max_inactivity_duration: DEFAULT_MAX_INACTIVITY_DURATION,
            max_inactivity_duration_initial_delay: DEFAULT_MAX_INACTIVITY_INITIAL_DELAY,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl WireFormatOptions {
    #[must_use]
    pub fn with_version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    #[must_use]
    pub fn with_tight_encoding(mut self, enabled: bool) -> Self {
        self.tight_encoding_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_size_prefix_disabled(mut self, disabled: bool) -> Self {
        self.size_prefix_disabled = disabled;
        self
    }

    #[must_use]
    pub fn with_stack_traces(mut self, enabled: bool) -> Self {
        self.stack_trace_enabled = enabled;
        self
    }

    /// Reads the `wireFormat.*` options of a broker URI over these defaults.
    #[must_use]
    pub fn from_uri(uri: &crate::conn::BrokerUri) -> Self {
        let d = Self::default();
        Self {
            version: uri.i32_option("wireFormat.version", d.version),
            tight_encoding_enabled: uri
                .bool_option("wireFormat.tightEncodingEnabled", d.tight_encoding_enabled),
            size_prefix_disabled: uri
                .bool_option("wireFormat.sizePrefixDisabled", d.size_prefix_disabled),
            cache_enabled: uri.bool_option("wireFormat.cacheEnabled", d.cache_enabled),
            cache_size: uri.i32_option("wireFormat.cacheSize", d.cache_size),
            stack_trace_enabled: uri
                .bool_option("wireFormat.stackTraceEnabled", d.stack_trace_enabled),
            tcp_no_delay_enabled: uri
                .bool_option("wireFormat.tcpNoDelayEnabled", d.tcp_no_delay_enabled),
            max_inactivity_duration: uri
                .i64_option("wireFormat.maxInactivityDuration", d.max_inactivity_duration),
            max_inactivity_duration_initial_delay: uri.i64_option(
                "wireFormat.maxInactivityDurationInitalDelay",
                d.max_inactivity_duration_initial_delay,
            ),
            max_frame_size: uri.i64_option("wireFormat.maxFrameSize", d.max_frame_size),
        }
    }
}

#[derive(Debug, Default)]
struct MarshalSide {
    cache: MarshalCache,
}

#[derive(Debug, Default)]
struct UnmarshalSide {
    cache: UnmarshalCache,
}

/// The OpenWire wire format.
///
/// Until the negotiator has run, the format stays at the un-negotiated
/// defaults every peer understands: loose encoding, no caching, size
/// prefixes on. The preferences only take effect once [`renegotiate`]
/// computed the common ground with the peer.
///
/// [`renegotiate`]: WireFormat::renegotiate
#[derive(Debug)]
pub struct OpenWireFormat {
    preferred: WireFormatOptions,
    current: Mutex<WireFormatOptions>,
    marshal_side: Mutex<MarshalSide>,
    unmarshal_side: Mutex<UnmarshalSide>,
}

impl OpenWireFormat {
    pub fn new(preferred: WireFormatOptions) -> Self {
        let current = WireFormatOptions {
            version: preferred.version,
            tight_encoding_enabled: false,
            size_prefix_disabled: false,
            cache_enabled: false,
            cache_size: 0,
            stack_trace_enabled: false,
            tcp_no_delay_enabled: false,
            max_inactivity_duration: 0,
            max_inactivity_duration_initial_delay: 0,
            max_frame_size: preferred.max_frame_size,
        };
        Self {
            preferred,
            current: Mutex::new(current),
            marshal_side: Mutex::new(MarshalSide::default()),
            unmarshal_side: Mutex::new(UnmarshalSide::default()),
        }
    }

    pub fn preferred(&self) -> &WireFormatOptions {
        &self.preferred
    }

    pub fn current(&self) -> AmqResult<WireFormatOptions> {
        Ok(self.current.lock()?.clone())
    }

    // Installs a negotiated (or test-fixed) option set and resets both
    // cached-object tables.
    pub(crate) fn apply_options(&self, options: WireFormatOptions) -> AmqResult<()> {
        let capacity = if options.cache_enabled {
            usize::try_from(options.cache_size.max(1)).unwrap_or(1)
        } else {
            0
        };
        *self.current.lock()? = options;
        self.marshal_side.lock()?.cache.resize(capacity);
        self.unmarshal_side.lock()?.cache.clear();
        Ok(())
    }

    fn decode(
        opts: &WireFormatOptions,
        side: &mut UnmarshalSide,
        r: &mut dyn std::io::Read,
    ) -> AmqResult<Command> {
        let type_code = r.read_u8()?;
        if opts.tight_encoding_enabled && type_code != 0 {
            let bs = BooleanStream::unmarshal(r)?;
            let mut src = TightSource::new(opts, bs, &mut side.cache);
            parse_command(type_code, &mut src, r)
        } else if type_code == 0 {
            Err(malformed!("null command on the wire"))
        } else {
            let mut src = LooseSource::new(opts, &mut side.cache);
            parse_command(type_code, &mut src, r)
        }
    }
}

impl WireFormat for OpenWireFormat {
    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_possible_wrap)]
    fn marshal(
        &self,
        command: &Command,
        w: &mut dyn std::io::Write,
    ) -> AmqResult<Option<Command>> {
        let opts = self.current.lock()?.clone();
        let mut side = self.marshal_side.lock()?;
        let type_code = command.data_structure_type();
        trace!(
            "marshalling type {type_code} (tight={}, cached={})",
            opts.tight_encoding_enabled, opts.cache_enabled
        );

        if opts.tight_encoding_enabled {
            let mut bs = BooleanStream::new();
            let body_size = {
                let mut sizer = TightSizer::new(&opts, &mut bs, &mut side.cache);
                walk_command(command, &mut sizer)?;
                sizer.size
            };
            let frame_size = 1 + bs.marshalled_size() + body_size;
            if !opts.size_prefix_disabled {
                if frame_size as i64 > opts.max_frame_size {
                    return Err(AmqError::FrameTooLarge {
                        size: frame_size as u64,
                        max: opts.max_frame_size as u64,
                    });
                }
                w.write_i32::<BigEndian>(frame_size as i32)?;
            }
            w.write_u8(type_code)?;
            bs.marshal(w)?;
            let mut writer = TightWriter {
                opts: &opts,
                bs: &mut bs,
                cache: &side.cache,
                w,
            };
            walk_command(command, &mut writer)?;
        } else if opts.size_prefix_disabled {
            w.write_u8(type_code)?;
            let mut writer = LooseWriter::new(&opts, &mut side.cache, w);
            walk_command(command, &mut writer)?;
        } else {
            // loose with a size prefix needs the frame materialized first
            let mut frame = Vec::with_capacity(64);
            frame.write_u8(type_code)?;
            {
                let mut writer = LooseWriter::new(&opts, &mut side.cache, &mut frame);
                walk_command(command, &mut writer)?;
            }
            if frame.len() as i64 > opts.max_frame_size {
                return Err(AmqError::FrameTooLarge {
                    size: frame.len() as u64,
                    max: opts.max_frame_size as u64,
                });
            }
            w.write_i32::<BigEndian>(frame.len() as i32)?;
            w.write_all(&frame)?;
        }
        w.flush()?;
        Ok(None)
    }

    #[allow(clippy::cast_sign_loss)]
    fn unmarshal(&self, r: &mut dyn std::io::Read) -> AmqResult<Command> {
        let opts = self.current.lock()?.clone();
        let mut side = self.unmarshal_side.lock()?;
        if opts.size_prefix_disabled {
            Self::decode(&opts, &mut side, r)
        } else {
            let size = r.read_i32::<BigEndian>()?;
            if size < 1 {
                return Err(malformed!("invalid frame size {size}"));
            }
            if i64::from(size) > opts.max_frame_size {
                return Err(AmqError::FrameTooLarge {
                    size: size as u64,
                    max: opts.max_frame_size as u64,
                });
            }
            let frame = codec::parse_bytes(size as usize, r)?;
            let mut frame_reader: &[u8] = &frame;
            let command = Self::decode(&opts, &mut side, &mut frame_reader)?;
            if !frame_reader.is_empty() {
                return Err(malformed!(
                    "{} trailing bytes after a type {} frame",
                    frame_reader.len(),
                    command.data_structure_type()
                ));
            }
            Ok(command)
        }
    }

    fn has_negotiator(&self) -> bool {
        true
    }

    fn preferred_wire_format_info(&self) -> Option<Command> {
        let p = &self.preferred;
        let mut info = WireFormatInfo::new(p.version);
        // the property set mirrors the negotiable options
        info.set_bool_property(wire_format_info::TIGHT_ENCODING_ENABLED, p.tight_encoding_enabled)
            .ok()?;
        info.set_bool_property(wire_format_info::SIZE_PREFIX_DISABLED, p.size_prefix_disabled)
            .ok()?;
        info.set_bool_property(wire_format_info::CACHE_ENABLED, p.cache_enabled)
            .ok()?;
        info.set_int_property(wire_format_info::CACHE_SIZE, p.cache_size)
            .ok()?;
        info.set_bool_property(wire_format_info::STACK_TRACE_ENABLED, p.stack_trace_enabled)
            .ok()?;
        info.set_long_property(
            wire_format_info::MAX_INACTIVITY_DURATION,
            p.max_inactivity_duration,
        )
        .ok()?;
        info.set_long_property(
            wire_format_info::MAX_INACTIVITY_DURATION_INITAL_DELAY,
            p.max_inactivity_duration_initial_delay,
        )
        .ok()?;
        info.set_long_property(wire_format_info::MAX_FRAME_SIZE, p.max_frame_size)
            .ok()?;
        info.set_bool_property(wire_format_info::TCP_NO_DELAY_ENABLED, p.tcp_no_delay_enabled)
            .ok()?;
        Some(Command::new(CommandBody::WireFormatInfo(info)))
    }

    fn renegotiate(&self, remote: &WireFormatInfo) -> AmqResult<()> {
        if !remote.is_valid() {
            return Err(malformed!("wire format info carries a bad magic"));
        }
        let p = &self.preferred;
        let cache_enabled = p.cache_enabled && remote.cache_enabled();
        let remote_cache_size = if remote.cache_size() > 0 {
            remote.cache_size()
        } else {
            p.cache_size
        };
        let negotiated = WireFormatOptions {
            version: p.version.min(remote.version),
            tight_encoding_enabled: p.tight_encoding_enabled && remote.tight_encoding_enabled(),
            size_prefix_disabled: p.size_prefix_disabled || remote.size_prefix_disabled(),
            cache_enabled,
            cache_size: if cache_enabled {
                p.cache_size.min(remote_cache_size)
            } else {
                0
            },
            stack_trace_enabled: p.stack_trace_enabled && remote.stack_trace_enabled(),
            tcp_no_delay_enabled: p.tcp_no_delay_enabled && remote.tcp_no_delay_enabled(),
            max_inactivity_duration: if p.max_inactivity_duration == 0
                || remote.max_inactivity_duration() == 0
            {
                0
            } else {
                p.max_inactivity_duration
                    .min(remote.max_inactivity_duration())
            },
            max_inactivity_duration_initial_delay: p
                .max_inactivity_duration_initial_delay
                .min(remote.max_inactivity_duration_initial_delay()),
            max_frame_size: p.max_frame_size.min(remote.max_frame_size()),
        };
        debug!("negotiated wire format: {negotiated:?}");
        self.apply_options(negotiated)
    }

    fn max_inactivity_duration(&self) -> i64 {
        self.current
            .lock()
            .map(|c| c.max_inactivity_duration)
            .unwrap_or(0)
    }

    fn max_inactivity_initial_delay(&self) -> i64 {
        self.current
            .lock()
            .map(|c| c.max_inactivity_duration_initial_delay)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{
        BrokerError, BrokerId, ConnectionControl, ConnectionId, ConnectionInfo, ConsumerId,
        ConsumerInfo, ControlCommand, Destination, ExceptionResponse,
        LocalTransactionId, Message, MessageAck, MessageDispatch, MessageId, MessagePull,
        PrimitiveMap, ProducerId, ProducerInfo, RemoveInfo, Response, SessionId, SessionInfo,
        StackTraceElement, TransactionId, TransactionInfo, XaTransactionId,
    };

    fn consumer_id() -> ConsumerId {
        ConsumerId {
            connection_id: "ID:host-1234-1".to_string(),
            session_id: 1,
            value: 3,
        }
    }

    fn producer_id() -> ProducerId {
        ProducerId {
            connection_id: "ID:host-1234-1".to_string(),
            session_id: 1,
            value: 9,
        }
    }

    fn message_id(seq: i64) -> MessageId {
        MessageId {
            producer_id: producer_id(),
            producer_sequence_id: seq,
            broker_sequence_id: 0,
        }
    }

    fn sample_message() -> Message {
        let mut message = Message::text("the payload");
        message.producer_id = Some(producer_id());
        message.destination = Some(Destination::queue("TEST.QUEUE"));
        message.message_id = Some(message_id(7));
        message.correlation_id = Some("corr-1".to_string());
        message.persistent = true;
        message.timestamp = 1_234_567_890_123;
        message.expiration = 60_000;
        message.group_id = Some("group".to_string());
        message.reply_to = Some(Destination::temp_queue("REPLY"));
        message.set_property("count", 42_i32).unwrap();
        message.set_property("flag", true).unwrap();
        message
    }

    fn corpus() -> Vec<Command> {
        let connection_id = ConnectionId::new("ID:host-1234-1");
        let wire_format_info = OpenWireFormat::new(WireFormatOptions::default())
            .preferred_wire_format_info()
            .unwrap();
        let mut commands = vec![
            wire_format_info,
            Command::new(CommandBody::KeepAliveInfo),
            Command::new(CommandBody::ShutdownInfo),
            Command::new(CommandBody::FlushCommand),
            Command::new(CommandBody::ConnectionInfo(ConnectionInfo {
                connection_id: connection_id.clone(),
                client_id: Some("client-1".to_string()),
                user_name: Some("user".to_string()),
                password: Some("secret".to_string()),
                broker_path: vec![BrokerId {
                    value: "broker-a".to_string(),
                }],
                ..ConnectionInfo::default()
            })),
            Command::new(CommandBody::SessionInfo(SessionInfo {
                session_id: SessionId {
                    connection_id: connection_id.value.clone(),
                    value: 1,
                },
            })),
            Command::new(CommandBody::ConsumerInfo(Box::new(ConsumerInfo {
                selector: Some("count > 1".to_string()),
                subscription_name: Some("durable-1".to_string()),
                no_local: true,
                priority: 5,
                ..ConsumerInfo::new(consumer_id(), Destination::topic("TEST.TOPIC"))
            }))),
            Command::new(CommandBody::ProducerInfo(ProducerInfo {
                producer_id: producer_id(),
                destination: Some(Destination::queue("TEST.QUEUE")),
                window_size: 65536,
                ..ProducerInfo::default()
            })),
            Command::new(CommandBody::TransactionInfo(TransactionInfo::new(
                connection_id.clone(),
                TransactionId::local(&connection_id.value, 5),
                TransactionInfo::BEGIN,
            ))),
            Command::new(CommandBody::TransactionInfo(TransactionInfo::new(
                connection_id.clone(),
                TransactionId::Xa(XaTransactionId::new(0x1234, vec![1, 2, 3], vec![4, 5]).unwrap()),
                TransactionInfo::PREPARE,
            ))),
            Command::new(CommandBody::RemoveInfo(RemoveInfo::for_consumer(
                consumer_id(),
            ))),
            Command::new(CommandBody::ControlCommand(ControlCommand {
                command: "shutdown".to_string(),
            })),
            Command::new(CommandBody::ConnectionControl(ConnectionControl {
                rebalance_connection: true,
                reconnect_to: Some("tcp://other:61616".to_string()),
                ..ConnectionControl::default()
            })),
            Command::new(CommandBody::MessagePull(MessagePull {
                consumer_id: consumer_id(),
                destination: Some(Destination::queue("TEST.QUEUE")),
                timeout: 1500,
                ..MessagePull::default()
            })),
            Command::message(sample_message()),
            Command::new(CommandBody::MessageDispatch(Box::new(MessageDispatch {
                consumer_id: consumer_id(),
                destination: Some(Destination::queue("TEST.QUEUE")),
                message: Some(sample_message()),
                redelivery_counter: 2,
            }))),
            Command::new(CommandBody::MessageAck(MessageAck {
                destination: Some(Destination::queue("TEST.QUEUE")),
                consumer_id: consumer_id(),
                ack_type: MessageAck::STANDARD_ACK_TYPE,
                first_message_id: Some(message_id(1)),
                last_message_id: Some(message_id(7)),
                message_count: 7,
                transaction_id: Some(TransactionId::Local(LocalTransactionId {
                    connection_id: connection_id.value.clone(),
                    value: 5,
                })),
                ..MessageAck::default()
            })),
            Command::new(CommandBody::Response(Response { correlation_id: 11 })),
            Command::new(CommandBody::ExceptionResponse(ExceptionResponse {
                correlation_id: 12,
                exception: Some(BrokerError {
                    exception_class: "org.example.BrokerException".to_string(),
                    message: "boom".to_string(),
                    stack_trace: vec![StackTraceElement {
                        class_name: "org.example.Broker".to_string(),
                        method_name: "dispatch".to_string(),
                        file_name: "Broker.java".to_string(),
                        line_number: 42,
                    }],
                    cause: Some(Box::new(BrokerError::new("java.io.IOException", "pipe"))),
                }),
            })),
        ];
        // a bytes message and a map message round out the flavors
        let mut bytes_message = Message::bytes(vec![0, 1, 2, 253, 254, 255]);
        bytes_message.destination = Some(Destination::queue("BYTES"));
        commands.push(Command::message(bytes_message));
        let mut map = PrimitiveMap::new();
        map.put("k", "v").unwrap();
        map.put("n", 17_i64).unwrap();
        let mut map_message = Message::map(map);
        map_message.destination = Some(Destination::topic("MAPS"));
        commands.push(Command::message(map_message));
        commands
    }

    fn format_with(options: WireFormatOptions) -> OpenWireFormat {
        let format = OpenWireFormat::new(options.clone());
        format.apply_options(options).unwrap();
        format
    }

    fn roundtrip_corpus(options: &WireFormatOptions) {
        let format = format_with(options.clone());
        for command in corpus() {
            let mut buf = Vec::new();
            format.marshal(&command, &mut buf).unwrap();
            let restored = format.unmarshal(&mut &buf[..]).unwrap();
            assert_eq!(command, restored, "under options {options:?}");
        }
    }

    #[test]
    fn tight_roundtrip() {
        roundtrip_corpus(&WireFormatOptions::default().with_cache(false));
    }

    #[test]
    fn tight_roundtrip_with_caching() {
        roundtrip_corpus(&WireFormatOptions::default());
    }

    #[test]
    fn loose_roundtrip() {
        roundtrip_corpus(
            &WireFormatOptions::default()
                .with_tight_encoding(false)
                .with_cache(false),
        );
    }

    #[test]
    fn loose_roundtrip_with_caching() {
        roundtrip_corpus(&WireFormatOptions::default().with_tight_encoding(false));
    }

    #[test]
    fn roundtrip_across_versions() {
        // the full corpus uses fields of every schema generation up to 6
        for version in [6, 9, 10, 12] {
            roundtrip_corpus(&WireFormatOptions::default().with_version(version));
            roundtrip_corpus(
                &WireFormatOptions::default()
                    .with_version(version)
                    .with_tight_encoding(false),
            );
        }
    }

    #[test]
    fn old_versions_roundtrip_their_own_schema() {
        // commands restricted to fields the early generations carry
        let basics = || {
            vec![
                Command::new(CommandBody::KeepAliveInfo),
                Command::new(CommandBody::ConnectionInfo(ConnectionInfo {
                    connection_id: ConnectionId::new("ID:old-1"),
                    client_id: Some("client".to_string()),
                    ..ConnectionInfo::default()
                })),
                Command::message(sample_message()),
                Command::new(CommandBody::Response(Response { correlation_id: 1 })),
            ]
        };
        for version in [1, 2, 3, 5] {
            for tight in [true, false] {
                let options = WireFormatOptions::default()
                    .with_version(version)
                    .with_tight_encoding(tight);
                let format = format_with(options);
                for command in basics() {
                    let mut buf = Vec::new();
                    format.marshal(&command, &mut buf).unwrap();
                    let restored = format.unmarshal(&mut &buf[..]).unwrap();
                    assert_eq!(command, restored, "version {version}, tight {tight}");
                }
            }
        }
    }

    #[test]
    fn roundtrip_without_size_prefix() {
        roundtrip_corpus(&WireFormatOptions::default().with_size_prefix_disabled(true));
    }

    #[test]
    fn keep_alive_reference_bytes() {
        // length 7 = type byte + 2 bitmap bytes + 4 id bytes
        let format = format_with(WireFormatOptions::default());
        let mut buf = Vec::new();
        format
            .marshal(&Command::new(CommandBody::KeepAliveInfo), &mut buf)
            .unwrap();
        assert_eq!(buf, [0, 0, 0, 7, 10, 1, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn caching_shrinks_repeated_frames() {
        let format = format_with(WireFormatOptions::default());
        let command = Command::message(sample_message());
        let mut first = Vec::new();
        format.marshal(&command, &mut first).unwrap();
        let mut second = Vec::new();
        format.marshal(&command, &mut second).unwrap();
        assert!(
            second.len() < first.len(),
            "second frame {} should be smaller than first {}",
            second.len(),
            first.len()
        );
        // and both still decode
        format.unmarshal(&mut &first[..]).unwrap();
        assert_eq!(format.unmarshal(&mut &second[..]).unwrap(), command);
    }

    #[test]
    fn oversized_frame_is_rejected_on_read() {
        let options = WireFormatOptions {
            max_frame_size: 64,
            ..WireFormatOptions::default()
        };
        let format = format_with(options);
        let mut buf = Vec::new();
        buf.extend_from_slice(&1_000_000_i32.to_be_bytes());
        buf.extend_from_slice(&[0; 32]);
        assert!(matches!(
            format.unmarshal(&mut &buf[..]),
            Err(AmqError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn negotiation_meets_in_the_middle() {
        let format = OpenWireFormat::new(WireFormatOptions::default());
        let mut remote = WireFormatInfo::new(9);
        remote
            .set_bool_property(wire_format_info::TIGHT_ENCODING_ENABLED, true)
            .unwrap();
        remote
            .set_bool_property(wire_format_info::CACHE_ENABLED, false)
            .unwrap();
        remote
            .set_bool_property(wire_format_info::STACK_TRACE_ENABLED, true)
            .unwrap();
        remote
            .set_long_property(wire_format_info::MAX_INACTIVITY_DURATION, 10_000)
            .unwrap();
        remote
            .set_long_property(wire_format_info::MAX_FRAME_SIZE, 1_000_000)
            .unwrap();
        format.renegotiate(&remote).unwrap();
        let current = format.current().unwrap();
        assert_eq!(current.version, 9);
        assert!(current.tight_encoding_enabled);
        assert!(!current.cache_enabled);
        assert!(current.stack_trace_enabled);
        assert_eq!(current.max_inactivity_duration, 10_000);
        assert_eq!(current.max_frame_size, 1_000_000);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let format = OpenWireFormat::new(WireFormatOptions::default());
        let remote = WireFormatInfo {
            magic: *b"NotAMQxx",
            version: 12,
            properties: PrimitiveMap::new(),
        };
        assert!(format.renegotiate(&remote).is_err());
    }

    #[test]
    fn pre_negotiation_format_is_loose_and_uncached() {
        let format = OpenWireFormat::new(WireFormatOptions::default());
        let current = format.current().unwrap();
        assert!(!current.tight_encoding_enabled);
        assert!(!current.cache_enabled);
        assert!(!current.size_prefix_disabled);
    }
}
