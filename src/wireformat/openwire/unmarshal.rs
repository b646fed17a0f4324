//! Unmarshal-side field walking, mirroring the field order in `marshal.rs`.
//!
//! A [`FieldSource`] hides where the variable-form values come from: the
//! tight source consumes the frame's boolean stream, the loose source reads
//! the self-describing booleans inline.

use crate::{
    AmqResult,
    amq_error::malformed,
    codec::{self, BooleanStream},
    commands::{
        BrokerError, BrokerId, BrokerInfo, Command, CommandBody, ConnectionControl,
        ConnectionError, ConnectionId, ConnectionInfo, ConsumerControl, ConsumerId, ConsumerInfo,
        ControlCommand, DataArrayResponse, DataResponse, Destination, DestinationInfo,
        DiscoveryEvent, ExceptionResponse, IntegerResponse, LocalTransactionId, Message,
        MessageAck, MessageDispatch, MessageId, MessagePull, PrimitiveMap, ProducerAck,
        ProducerId, ProducerInfo, RemoveInfo, RemoveSubscriptionInfo, Response, SessionId,
        SessionInfo, StackTraceElement, TransactionInfo, WireFormatInfo, XaTransactionId,
        data_structure::{
            CachedValue, DataStructure, destination_kind_for, types,
        },
    },
    wireformat::openwire::{
        MAX_MARSHAL_DEPTH, WireFormatOptions, cache::UnmarshalCache, marshal::is_marshall_aware,
    },
};
use byteorder::{BigEndian, ReadBytesExt};

type Reader<'a> = &'a mut dyn std::io::Read;

/// The decoder role a command parse runs against.
pub(crate) trait FieldSource {
    fn version(&self) -> i32;
    fn bool_field(&mut self, r: Reader) -> AmqResult<bool>;
    fn long_field(&mut self, r: Reader) -> AmqResult<i64>;
    fn string_field(&mut self, r: Reader) -> AmqResult<Option<String>>;
    fn bytes_field(&mut self, r: Reader) -> AmqResult<Option<Vec<u8>>>;
    fn cached_field(&mut self, r: Reader) -> AmqResult<Option<CachedValue>>;
    fn nested_field(&mut self, r: Reader) -> AmqResult<Option<DataStructure>>;
    fn array_field(&mut self, r: Reader) -> AmqResult<Vec<DataStructure>>;
    fn throwable_field(&mut self, r: Reader) -> AmqResult<Option<BrokerError>>;
}

fn cached_from_ds(value: Option<DataStructure>) -> AmqResult<Option<CachedValue>> {
    Ok(match value {
        None => None,
        Some(DataStructure::ConnectionId(v)) => Some(CachedValue::ConnectionId(v)),
        Some(DataStructure::SessionId(v)) => Some(CachedValue::SessionId(v)),
        Some(DataStructure::ConsumerId(v)) => Some(CachedValue::ConsumerId(v)),
        Some(DataStructure::ProducerId(v)) => Some(CachedValue::ProducerId(v)),
        Some(DataStructure::MessageId(v)) => Some(CachedValue::MessageId(v)),
        Some(DataStructure::TransactionId(v)) => Some(CachedValue::TransactionId(v)),
        Some(DataStructure::BrokerId(v)) => Some(CachedValue::BrokerId(v)),
        Some(DataStructure::Destination(v)) => Some(CachedValue::Destination(v)),
        Some(other) => {
            return Err(malformed!(
                "type code {} is not cacheable",
                other.data_structure_type()
            ));
        }
    })
}

// ---------------------------------------------------------------------------
// tight source
// ---------------------------------------------------------------------------

pub(crate) struct TightSource<'a> {
    pub opts: &'a WireFormatOptions,
    pub bs: BooleanStream,
    pub cache: &'a mut UnmarshalCache,
    depth: usize,
}

impl<'a> TightSource<'a> {
    pub fn new(
        opts: &'a WireFormatOptions,
        bs: BooleanStream,
        cache: &'a mut UnmarshalCache,
    ) -> Self {
        Self {
            opts,
            bs,
            cache,
            depth: 0,
        }
    }

    fn enter(&mut self) -> AmqResult<()> {
        self.depth += 1;
        if self.depth > MAX_MARSHAL_DEPTH {
            return Err(crate::AmqError::FramingDepthExceeded(MAX_MARSHAL_DEPTH));
        }
        Ok(())
    }
}

impl FieldSource for TightSource<'_> {
    fn version(&self) -> i32 {
        self.opts.version
    }

    fn bool_field(&mut self, _r: Reader) -> AmqResult<bool> {
        self.bs.read_bool()
    }

    fn long_field(&mut self, r: Reader) -> AmqResult<i64> {
        if self.bs.read_bool()? {
            if self.bs.read_bool()? {
                Ok(r.read_i64::<BigEndian>()?)
            } else {
                Ok(i64::from(r.read_u32::<BigEndian>()?))
            }
        } else if self.bs.read_bool()? {
            Ok(i64::from(r.read_u16::<BigEndian>()?))
        } else {
            Ok(0)
        }
    }

    fn string_field(&mut self, r: Reader) -> AmqResult<Option<String>> {
        if self.bs.read_bool()? {
            self.bs.read_bool()?; // ascii hint, same byte form either way
            Ok(Some(codec::read_utf8(r)?))
        } else {
            Ok(None)
        }
    }

    fn bytes_field(&mut self, r: Reader) -> AmqResult<Option<Vec<u8>>> {
        if self.bs.read_bool()? {
            let len = r.read_i32::<BigEndian>()?;
            if len < 0 {
                return Err(malformed!("negative byte array length {len}"));
            }
            Ok(Some(codec::parse_bytes(len as usize, r)?))
        } else {
            Ok(None)
        }
    }

    fn cached_field(&mut self, r: Reader) -> AmqResult<Option<CachedValue>> {
        if !self.opts.cache_enabled {
            return cached_from_ds(self.nested_field(r)?);
        }
        if self.bs.read_bool()? {
            let slot = r.read_i16::<BigEndian>()?;
            let value = cached_from_ds(self.nested_field(r)?)?;
            self.cache.store(slot, value.clone());
            Ok(value)
        } else {
            let slot = r.read_i16::<BigEndian>()?;
            self.cache.load(slot)
        }
    }

    fn nested_field(&mut self, r: Reader) -> AmqResult<Option<DataStructure>> {
        if !self.bs.read_bool()? {
            return Ok(None);
        }
        self.enter()?;
        let type_code = r.read_u8()?;
        let value = if is_marshall_aware(type_code) && self.bs.read_bool()? {
            // a retained marshalled form: prefixed with its size, type code
            // and its own boolean stream
            let _size = r.read_i32::<BigEndian>()?;
            let _type_again = r.read_u8()?;
            let bs = BooleanStream::unmarshal(r)?;
            let mut sub = TightSource::new(self.opts, bs, &mut *self.cache);
            sub.depth = self.depth;
            parse_data_structure(type_code, &mut sub, r)?
        } else {
            parse_data_structure(type_code, self, r)?
        };
        self.depth -= 1;
        Ok(Some(value))
    }

    fn array_field(&mut self, r: Reader) -> AmqResult<Vec<DataStructure>> {
        if !self.bs.read_bool()? {
            return Ok(Vec::new());
        }
        let count = r.read_i16::<BigEndian>()?;
        if count < 0 {
            return Err(malformed!("negative object array length {count}"));
        }
        let mut items = Vec::with_capacity(count as usize);
        for _ in 0..count {
            items.push(
                self.nested_field(r)?
                    .ok_or_else(|| malformed!("null element in object array"))?,
            );
        }
        Ok(items)
    }

    fn throwable_field(&mut self, r: Reader) -> AmqResult<Option<BrokerError>> {
        if !self.bs.read_bool()? {
            return Ok(None);
        }
        self.enter()?;
        let exception_class = self.string_field(r)?.unwrap_or_default();
        let message = self.string_field(r)?.unwrap_or_default();
        let mut error = BrokerError::new(exception_class, message);
        if self.opts.stack_trace_enabled {
            let count = r.read_i16::<BigEndian>()?;
            for _ in 0..count.max(0) {
                error.stack_trace.push(StackTraceElement {
                    class_name: self.string_field(r)?.unwrap_or_default(),
                    method_name: self.string_field(r)?.unwrap_or_default(),
                    file_name: self.string_field(r)?.unwrap_or_default(),
                    line_number: r.read_i32::<BigEndian>()?,
                });
            }
            error.cause = self.throwable_field(r)?.map(Box::new);
        }
        self.depth -= 1;
        Ok(Some(error))
    }
}

// ---------------------------------------------------------------------------
// loose source
// ---------------------------------------------------------------------------

pub(crate) struct LooseSource<'a> {
    pub opts: &'a WireFormatOptions,
    pub cache: &'a mut UnmarshalCache,
    depth: usize,
}

impl<'a> LooseSource<'a> {
    pub fn new(opts: &'a WireFormatOptions, cache: &'a mut UnmarshalCache) -> Self {
        Self {
            opts,
            cache,
            depth: 0,
        }
    }

    fn enter(&mut self) -> AmqResult<()> {
        self.depth += 1;
        if self.depth > MAX_MARSHAL_DEPTH {
            return Err(crate::AmqError::FramingDepthExceeded(MAX_MARSHAL_DEPTH));
        }
        Ok(())
    }
}

impl FieldSource for LooseSource<'_> {
    fn version(&self) -> i32 {
        self.opts.version
    }

    fn bool_field(&mut self, r: Reader) -> AmqResult<bool> {
        Ok(r.read_u8()? > 0)
    }

    fn long_field(&mut self, r: Reader) -> AmqResult<i64> {
        Ok(r.read_i64::<BigEndian>()?)
    }

    fn string_field(&mut self, r: Reader) -> AmqResult<Option<String>> {
        if r.read_u8()? > 0 {
            Ok(Some(codec::read_utf8(r)?))
        } else {
            Ok(None)
        }
    }

    fn bytes_field(&mut self, r: Reader) -> AmqResult<Option<Vec<u8>>> {
        if r.read_u8()? > 0 {
            let len = r.read_i32::<BigEndian>()?;
            if len < 0 {
                return Err(malformed!("negative byte array length {len}"));
            }
            Ok(Some(codec::parse_bytes(len as usize, r)?))
        } else {
            Ok(None)
        }
    }

    fn cached_field(&mut self, r: Reader) -> AmqResult<Option<CachedValue>> {
        if !self.opts.cache_enabled {
            return cached_from_ds(self.nested_field(r)?);
        }
        if r.read_u8()? > 0 {
            let slot = r.read_i16::<BigEndian>()?;
            let value = cached_from_ds(self.nested_field(r)?)?;
            self.cache.store(slot, value.clone());
            Ok(value)
        } else {
            let slot = r.read_i16::<BigEndian>()?;
            self.cache.load(slot)
        }
    }

    fn nested_field(&mut self, r: Reader) -> AmqResult<Option<DataStructure>> {
        if r.read_u8()? == 0 {
            return Ok(None);
        }
        self.enter()?;
        let type_code = r.read_u8()?;
        let value = parse_data_structure(type_code, self, r)?;
        self.depth -= 1;
        Ok(Some(value))
    }

    fn array_field(&mut self, r: Reader) -> AmqResult<Vec<DataStructure>> {
        if r.read_u8()? == 0 {
            return Ok(Vec::new());
        }
        let count = r.read_i16::<BigEndian>()?;
        if count < 0 {
            return Err(malformed!("negative object array length {count}"));
        }
        let mut items = Vec::with_capacity(count as usize);
        for _ in 0..count {
            items.push(
                self.nested_field(r)?
                    .ok_or_else(|| malformed!("null element in object array"))?,
            );
        }
        Ok(items)
    }

    fn throwable_field(&mut self, r: Reader) -> AmqResult<Option<BrokerError>> {
        if r.read_u8()? == 0 {
            return Ok(None);
        }
        self.enter()?;
        let exception_class = self.string_field(r)?.unwrap_or_default();
        let message = self.string_field(r)?.unwrap_or_default();
        let mut error = BrokerError::new(exception_class, message);
        if self.opts.stack_trace_enabled {
            let count = r.read_i16::<BigEndian>()?;
            for _ in 0..count.max(0) {
                error.stack_trace.push(StackTraceElement {
                    class_name: self.string_field(r)?.unwrap_or_default(),
                    method_name: self.string_field(r)?.unwrap_or_default(),
                    file_name: self.string_field(r)?.unwrap_or_default(),
                    line_number: r.read_i32::<BigEndian>()?,
                });
            }
            error.cause = self.throwable_field(r)?.map(Box::new);
        }
        self.depth -= 1;
        Ok(Some(error))
    }
}

// ---------------------------------------------------------------------------
// the parses: field order per command kind, mirroring marshal.rs
// ---------------------------------------------------------------------------

fn broker_ids(items: Vec<DataStructure>) -> AmqResult<Vec<BrokerId>> {
    items.into_iter().map(BrokerId::try_from).collect()
}

#[allow(clippy::cast_possible_wrap)]
#[allow(clippy::too_many_lines)]
pub(crate) fn parse_command(
    type_code: u8,
    src: &mut dyn FieldSource,
    r: Reader,
) -> AmqResult<Command> {
    if type_code == types::WIREFORMAT_INFO {
        let magic: [u8; 8] = codec::parse_bytes(8, r)?
            .try_into()
            .map_err(|_| malformed!("short magic"))?;
        let version = r.read_i32::<BigEndian>()?;
        let properties = match src.bytes_field(r)? {
            Some(bytes) => PrimitiveMap::from_marshalled_bytes(&bytes)?,
            None => PrimitiveMap::new(),
        };
        return Ok(Command::new(CommandBody::WireFormatInfo(WireFormatInfo {
            magic,
            version,
            properties,
        })));
    }

    let command_id = r.read_i32::<BigEndian>()?;
    let response_required = src.bool_field(r)?;

    let body = match type_code {
        types::KEEP_ALIVE_INFO => CommandBody::KeepAliveInfo,
        types::SHUTDOWN_INFO => CommandBody::ShutdownInfo,
        types::FLUSH_COMMAND => CommandBody::FlushCommand,

        types::CONNECTION_INFO => {
            let mut info = ConnectionInfo {
                connection_id: cached_or_default(src.cached_field(r)?)?,
                client_id: src.string_field(r)?,
                password: src.string_field(r)?,
                user_name: src.string_field(r)?,
                broker_path: broker_ids(src.array_field(r)?)?,
                ..ConnectionInfo::default()
            };
            if src.version() >= 2 {
                info.broker_master_connector = src.bool_field(r)?;
                info.manageable = src.bool_field(r)?;
                info.client_master = src.bool_field(r)?;
            }
            if src.version() >= 6 {
                info.fault_tolerant = src.bool_field(r)?;
                info.failover_reconnect = src.bool_field(r)?;
            }
            CommandBody::ConnectionInfo(info)
        }

        types::SESSION_INFO => CommandBody::SessionInfo(SessionInfo {
            session_id: cached_or_default(src.cached_field(r)?)?,
        }),

        types::CONSUMER_INFO => {
            let mut info = ConsumerInfo {
                consumer_id: cached_or_default(src.cached_field(r)?)?,
                browser: src.bool_field(r)?,
                destination: optional_cached(src.cached_field(r)?)?,
                prefetch_size: r.read_i32::<BigEndian>()?,
                maximum_pending_message_limit: r.read_i32::<BigEndian>()?,
                dispatch_async: src.bool_field(r)?,
                selector: src.string_field(r)?,
                subscription_name: src.string_field(r)?,
                no_local: src.bool_field(r)?,
                exclusive: src.bool_field(r)?,
                retroactive: src.bool_field(r)?,
                priority: r.read_u8()? as i8,
                broker_path: broker_ids(src.array_field(r)?)?,
                ..ConsumerInfo::default()
            };
            let _additional_predicate = src.nested_field(r)?;
            info.network_subscription = src.bool_field(r)?;
            info.optimized_acknowledge = src.bool_field(r)?;
            info.no_range_acks = src.bool_field(r)?;
            if src.version() >= 4 {
                info.network_consumer_path = src
                    .array_field(r)?
                    .into_iter()
                    .map(ConsumerId::try_from)
                    .collect::<AmqResult<_>>()?;
            }
            CommandBody::ConsumerInfo(Box::new(info))
        }

        types::PRODUCER_INFO => {
            let mut info = ProducerInfo {
                producer_id: cached_or_default(src.cached_field(r)?)?,
                destination: optional_cached(src.cached_field(r)?)?,
                broker_path: broker_ids(src.array_field(r)?)?,
                ..ProducerInfo::default()
            };
            if src.version() >= 2 {
                info.dispatch_async = src.bool_field(r)?;
            }
            if src.version() >= 3 {
                info.window_size = r.read_i32::<BigEndian>()?;
            }
            CommandBody::ProducerInfo(info)
        }

        types::TRANSACTION_INFO => CommandBody::TransactionInfo(TransactionInfo {
            connection_id: cached_or_default(src.cached_field(r)?)?,
            transaction_id: optional_cached(src.cached_field(r)?)?,
            transaction_type: r.read_u8()?,
        }),

        types::DESTINATION_INFO => CommandBody::DestinationInfo(DestinationInfo {
            connection_id: cached_or_default(src.cached_field(r)?)?,
            destination: optional_cached(src.cached_field(r)?)?,
            operation_type: r.read_u8()?,
            timeout: src.long_field(r)?,
            broker_path: broker_ids(src.array_field(r)?)?,
        }),

        types::REMOVE_SUBSCRIPTION_INFO => {
            CommandBody::RemoveSubscriptionInfo(RemoveSubscriptionInfo {
                connection_id: cached_or_default(src.cached_field(r)?)?,
                subscription_name: src.string_field(r)?.unwrap_or_default(),
                client_id: src.string_field(r)?.unwrap_or_default(),
            })
        }

        types::REMOVE_INFO => {
            let object_id = src
                .cached_field(r)?
                .map(DataStructure::from)
                .ok_or_else(|| malformed!("remove info without an object id"))?;
            let last_delivered_sequence_id = if src.version() >= 5 {
                src.long_field(r)?
            } else {
                0
            };
            CommandBody::RemoveInfo(RemoveInfo {
                object_id,
                last_delivered_sequence_id,
            })
        }

        types::CONTROL_COMMAND => CommandBody::ControlCommand(ControlCommand {
            command: src.string_field(r)?.unwrap_or_default(),
        }),

        types::CONNECTION_ERROR => CommandBody::ConnectionError(ConnectionError {
            exception: src.throwable_field(r)?,
            connection_id: match src.nested_field(r)? {
                Some(ds) => Some(ConnectionId::try_from(ds)?),
                None => None,
            },
        }),

        types::CONSUMER_CONTROL => {
            let destination = if src.version() >= 6 {
                match src.nested_field(r)? {
                    Some(ds) => Some(Destination::try_from(ds)?),
                    None => None,
                }
            } else {
                None
            };
            CommandBody::ConsumerControl(ConsumerControl {
                destination,
                close: src.bool_field(r)?,
                consumer_id: match src.nested_field(r)? {
                    Some(ds) => Some(ConsumerId::try_from(ds)?),
                    None => None,
                },
                prefetch: r.read_i32::<BigEndian>()?,
                flush: src.bool_field(r)?,
                start: src.bool_field(r)?,
                stop: src.bool_field(r)?,
            })
        }

        types::CONNECTION_CONTROL => {
            let mut info = ConnectionControl {
                close: src.bool_field(r)?,
                exit: src.bool_field(r)?,
                fault_tolerant: src.bool_field(r)?,
                resume: src.bool_field(r)?,
                suspend: src.bool_field(r)?,
                ..ConnectionControl::default()
            };
            if src.version() >= 6 {
                info.connected_brokers = src.string_field(r)?;
                info.reconnect_to = src.string_field(r)?;
                info.rebalance_connection = src.bool_field(r)?;
            }
            CommandBody::ConnectionControl(info)
        }

        types::PRODUCER_ACK => CommandBody::ProducerAck(ProducerAck {
            producer_id: match src.nested_field(r)? {
                Some(ds) => ProducerId::try_from(ds)?,
                None => ProducerId::default(),
            },
            size: r.read_i32::<BigEndian>()?,
        }),

        types::MESSAGE_PULL => {
            let mut info = MessagePull {
                consumer_id: cached_or_default(src.cached_field(r)?)?,
                destination: optional_cached(src.cached_field(r)?)?,
                timeout: src.long_field(r)?,
                ..MessagePull::default()
            };
            if src.version() >= 3 {
                info.correlation_id = src.string_field(r)?;
                info.message_id = match src.nested_field(r)? {
                    Some(ds) => Some(MessageId::try_from(ds)?),
                    None => None,
                };
            }
            CommandBody::MessagePull(info)
        }

        types::MESSAGE_DISPATCH => CommandBody::MessageDispatch(Box::new(MessageDispatch {
            consumer_id: cached_or_default(src.cached_field(r)?)?,
            destination: optional_cached(src.cached_field(r)?)?,
            message: match src.nested_field(r)? {
                Some(ds) => Some(Message::try_from(ds)?),
                None => None,
            },
            redelivery_counter: r.read_i32::<BigEndian>()?,
        })),

        types::MESSAGE_ACK => {
            let mut info = MessageAck {
                destination: optional_cached(src.cached_field(r)?)?,
                transaction_id: optional_cached(src.cached_field(r)?)?,
                consumer_id: cached_or_default(src.cached_field(r)?)?,
                ack_type: r.read_u8()?,
                ..MessageAck::default()
            };
            info.first_message_id = match src.nested_field(r)? {
                Some(ds) => Some(MessageId::try_from(ds)?),
                None => None,
            };
            info.last_message_id = match src.nested_field(r)? {
                Some(ds) => Some(MessageId::try_from(ds)?),
                None => None,
            };
            info.message_count = r.read_i32::<BigEndian>()?;
            if src.version() >= 10 {
                info.poison_cause = src.throwable_field(r)?;
            }
            CommandBody::MessageAck(info)
        }

        types::MESSAGE..=types::TEXT_MESSAGE => {
            CommandBody::Message(Box::new(parse_message(type_code, src, r)?))
        }

        types::RESPONSE => CommandBody::Response(Response {
            correlation_id: r.read_i32::<BigEndian>()?,
        }),

        types::EXCEPTION_RESPONSE => CommandBody::ExceptionResponse(ExceptionResponse {
            correlation_id: r.read_i32::<BigEndian>()?,
            exception: src.throwable_field(r)?,
        }),

        types::DATA_RESPONSE => CommandBody::DataResponse(Box::new(DataResponse {
            correlation_id: r.read_i32::<BigEndian>()?,
            data: src.nested_field(r)?,
        })),

        types::DATA_ARRAY_RESPONSE => CommandBody::DataArrayResponse(DataArrayResponse {
            correlation_id: r.read_i32::<BigEndian>()?,
            data: src.array_field(r)?,
        }),

        types::INTEGER_RESPONSE => CommandBody::IntegerResponse(IntegerResponse {
            correlation_id: r.read_i32::<BigEndian>()?,
            result: r.read_i32::<BigEndian>()?,
        }),

        types::BROKER_INFO => CommandBody::BrokerInfo(Box::new(parse_broker_info(src, r)?)),

        types::DISCOVERY_EVENT => CommandBody::DiscoveryEvent(DiscoveryEvent {
            service_name: src.string_field(r)?,
            broker_name: src.string_field(r)?,
        }),

        other => return Err(malformed!("unknown command type code {other}")),
    };

    Ok(Command {
        command_id,
        response_required,
        body,
    })
}

fn cached_or_default<T>(value: Option<CachedValue>) -> AmqResult<T>
where
    T: TryFrom<CachedValue, Error = crate::AmqError> + Default,
{
    match value {
        Some(v) => T::try_from(v),
        None => Ok(T::default()),
    }
}

fn optional_cached<T>(value: Option<CachedValue>) -> AmqResult<Option<T>>
where
    T: TryFrom<CachedValue, Error = crate::AmqError>,
{
    value.map(T::try_from).transpose()
}

#[allow(clippy::cast_possible_wrap)]
pub(crate) fn parse_message(
    type_code: u8,
    src: &mut dyn FieldSource,
    r: Reader,
) -> AmqResult<Message> {
    let mut message = Message::plain();
    message.producer_id = optional_cached(src.cached_field(r)?)?;
    message.destination = optional_cached(src.cached_field(r)?)?;
    message.transaction_id = optional_cached(src.cached_field(r)?)?;
    message.original_destination = optional_cached(src.cached_field(r)?)?;
    message.message_id = match src.nested_field(r)? {
        Some(ds) => Some(MessageId::try_from(ds)?),
        None => None,
    };
    message.original_transaction_id = optional_cached(src.cached_field(r)?)?;
    message.group_id = src.string_field(r)?;
    message.group_sequence = r.read_i32::<BigEndian>()?;
    message.correlation_id = src.string_field(r)?;
    message.persistent = src.bool_field(r)?;
    message.expiration = src.long_field(r)?;
    message.priority = r.read_u8()? as i8;
    message.reply_to = match src.nested_field(r)? {
        Some(ds) => Some(Destination::try_from(ds)?),
        None => None,
    };
    message.timestamp = src.long_field(r)?;
    message.message_type = src.string_field(r)?;
    let content = src.bytes_field(r)?;
    let marshalled_properties = src.bytes_field(r)?;
    message.data_structure = src.nested_field(r)?.map(Box::new);
    message.target_consumer_id = optional_cached(src.cached_field(r)?)?;
    message.compressed = src.bool_field(r)?;
    message.redelivery_counter = r.read_i32::<BigEndian>()?;
    message.broker_path = broker_ids(src.array_field(r)?)?;
    message.arrival = src.long_field(r)?;
    message.user_id = src.string_field(r)?;
    message.received_by_df_bridge = src.bool_field(r)?;
    if src.version() >= 2 {
        message.droppable = src.bool_field(r)?;
    }
    if src.version() >= 3 {
        message.cluster = broker_ids(src.array_field(r)?)?;
        message.broker_in_time = src.long_field(r)?;
        message.broker_out_time = src.long_field(r)?;
    }
    if src.version() >= 10 {
        message.group_first_for_consumer = src.bool_field(r)?;
    }

    let payload = Message::payload_from_content(type_code, message.compressed, content)?;
    let mut message = replace_payload(message, payload);
    if let Some(bytes) = marshalled_properties {
        message.set_properties(PrimitiveMap::from_marshalled_bytes(&bytes)?);
    }
    Ok(message)
}

// The payload flavor is not known until the type code is read, so the walk
// above fills a plain message first.
fn replace_payload(message: Message, payload: crate::commands::MessagePayload) -> Message {
    let mut flavored = Message::new(payload);
    flavored.producer_id = message.producer_id;
    flavored.destination = message.destination;
    flavored.transaction_id = message.transaction_id;
    flavored.original_destination = message.original_destination;
    flavored.message_id = message.message_id;
    flavored.original_transaction_id = message.original_transaction_id;
    flavored.group_id = message.group_id;
    flavored.group_sequence = message.group_sequence;
    flavored.correlation_id = message.correlation_id;
    flavored.persistent = message.persistent;
    flavored.expiration = message.expiration;
    flavored.priority = message.priority;
    flavored.reply_to = message.reply_to;
    flavored.timestamp = message.timestamp;
    flavored.message_type = message.message_type;
    flavored.data_structure = message.data_structure;
    flavored.target_consumer_id = message.target_consumer_id;
    flavored.compressed = message.compressed;
    flavored.redelivery_counter = message.redelivery_counter;
    flavored.broker_path = message.broker_path;
    flavored.arrival = message.arrival;
    flavored.user_id = message.user_id;
    flavored.received_by_df_bridge = message.received_by_df_bridge;
    flavored.droppable = message.droppable;
    flavored.cluster = message.cluster;
    flavored.broker_in_time = message.broker_in_time;
    flavored.broker_out_time = message.broker_out_time;
    flavored.group_first_for_consumer = message.group_first_for_consumer;
    flavored
}

pub(crate) fn parse_broker_info(src: &mut dyn FieldSource, r: Reader) -> AmqResult<BrokerInfo> {
    let mut info = BrokerInfo {
        broker_id: optional_cached(src.cached_field(r)?)?,
        broker_url: src.string_field(r)?,
        peer_broker_infos: src
            .array_field(r)?
            .into_iter()
            .map(BrokerInfo::try_from)
            .collect::<AmqResult<_>>()?,
        broker_name: src.string_field(r)?,
        slave_broker: src.bool_field(r)?,
        master_broker: src.bool_field(r)?,
        fault_tolerant_configuration: src.bool_field(r)?,
        ..BrokerInfo::default()
    };
    if src.version() >= 2 {
        info.duplex_connection = src.bool_field(r)?;
        info.network_connection = src.bool_field(r)?;
        info.connection_id = src.long_field(r)?;
    }
    if src.version() >= 3 {
        info.broker_upload_url = src.string_field(r)?;
        info.network_properties = src.string_field(r)?;
    }
    Ok(info)
}

#[allow(clippy::cast_possible_wrap)]
pub(crate) fn parse_data_structure(
    type_code: u8,
    src: &mut dyn FieldSource,
    r: Reader,
) -> AmqResult<DataStructure> {
    Ok(match type_code {
        types::CONNECTION_ID => DataStructure::ConnectionId(ConnectionId {
            value: src.string_field(r)?.unwrap_or_default(),
        }),
        types::SESSION_ID => DataStructure::SessionId(SessionId {
            connection_id: src.string_field(r)?.unwrap_or_default(),
            value: src.long_field(r)?,
        }),
        types::CONSUMER_ID => DataStructure::ConsumerId(ConsumerId {
            connection_id: src.string_field(r)?.unwrap_or_default(),
            session_id: src.long_field(r)?,
            value: src.long_field(r)?,
        }),
        types::PRODUCER_ID => {
            // the wire order is connection, value, session
            let connection_id = src.string_field(r)?.unwrap_or_default();
            let value = src.long_field(r)?;
            let session_id = src.long_field(r)?;
            DataStructure::ProducerId(ProducerId {
                connection_id,
                session_id,
                value,
            })
        }
        types::MESSAGE_ID => DataStructure::MessageId(MessageId {
            producer_id: cached_or_default(src.cached_field(r)?)?,
            producer_sequence_id: src.long_field(r)?,
            broker_sequence_id: src.long_field(r)?,
        }),
        types::LOCAL_TRANSACTION_ID => {
            let value = src.long_field(r)?;
            let connection_id: ConnectionId = cached_or_default(src.cached_field(r)?)?;
            DataStructure::TransactionId(crate::commands::TransactionId::Local(
                LocalTransactionId {
                    connection_id: connection_id.value,
                    value,
                },
            ))
        }
        types::XA_TRANSACTION_ID => {
            let format_id = r.read_i32::<BigEndian>()?;
            let global_transaction_id = src.bytes_field(r)?.unwrap_or_default();
            let branch_qualifier = src.bytes_field(r)?.unwrap_or_default();
            DataStructure::TransactionId(crate::commands::TransactionId::Xa(
                XaTransactionId::new(format_id, global_transaction_id, branch_qualifier)?,
            ))
        }
        types::BROKER_ID => DataStructure::BrokerId(BrokerId {
            value: src.string_field(r)?.unwrap_or_default(),
        }),
        types::QUEUE | types::TOPIC | types::TEMP_QUEUE | types::TEMP_TOPIC => {
            DataStructure::Destination(Destination {
                kind: destination_kind_for(type_code)?,
                physical_name: src.string_field(r)?.unwrap_or_default(),
            })
        }
        types::MESSAGE..=types::TEXT_MESSAGE => {
            DataStructure::Message(Box::new(parse_message(type_code, src, r)?))
        }
        types::BROKER_INFO => DataStructure::BrokerInfo(Box::new(parse_broker_info(src, r)?)),
        other => return Err(malformed!("unknown nested type code {other}")),
    })
}
