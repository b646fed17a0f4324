//! Marshal-side field walking.
//!
//! Every command kind is walked exactly once, in wire field order, against a
//! [`FieldSink`]. Three sinks realize the three encoder roles: the tight
//! sizing pass (records presence bits and byte counts), the tight emission
//! pass (replays the recorded bits and writes the packed body) and the
//! single-pass loose encoder. Keeping the field order in one walk keeps the
//! two tight passes structurally identical, which the encoding depends on.

use crate::{
    AmqResult,
    amq_error::{impl_err, malformed},
    codec::{self, BooleanStream},
    commands::{
        BrokerError, BrokerInfo, Command, CommandBody, ConnectionId, Message,
        data_structure::{CachedValue, DataStructure, types},
    },
    wireformat::openwire::{MAX_MARSHAL_DEPTH, WireFormatOptions, cache::MarshalCache},
};
use byteorder::{BigEndian, WriteBytesExt};

pub(crate) fn is_marshall_aware(type_code: u8) -> bool {
    type_code == types::WIREFORMAT_INFO || (types::MESSAGE..=types::TEXT_MESSAGE).contains(&type_code)
}

/// The encoder role a command walk runs against.
pub(crate) trait FieldSink {
    fn version(&self) -> i32;

    // fixed-width values, written raw in both encodings
    fn raw_u8(&mut self, v: u8) -> AmqResult<()>;
    fn raw_i32(&mut self, v: i32) -> AmqResult<()>;
    fn fixed_bytes(&mut self, v: &[u8]) -> AmqResult<()>;

    // values whose form differs between tight and loose
    fn bool_field(&mut self, v: bool) -> AmqResult<()>;
    fn long_field(&mut self, v: i64) -> AmqResult<()>;
    fn string_field(&mut self, v: Option<&str>) -> AmqResult<()>;
    fn bytes_field(&mut self, v: Option<&[u8]>) -> AmqResult<()>;
    fn cached_field(&mut self, v: Option<CachedValue>) -> AmqResult<()>;
    fn nested_field(&mut self, v: Option<&DataStructure>) -> AmqResult<()>;
    fn array_field(&mut self, items: &[DataStructure]) -> AmqResult<()>;
    fn throwable_field(&mut self, v: Option<&BrokerError>) -> AmqResult<()>;
}

// ---------------------------------------------------------------------------
// tight pass 1: size and presence bits
// ---------------------------------------------------------------------------

pub(crate) struct TightSizer<'a> {
    pub opts: &'a WireFormatOptions,
    pub bs: &'a mut BooleanStream,
    pub cache: &'a mut MarshalCache,
    pub size: usize,
    depth: usize,
}

impl<'a> TightSizer<'a> {
    pub fn new(
        opts: &'a WireFormatOptions,
        bs: &'a mut BooleanStream,
        cache: &'a mut MarshalCache,
    ) -> Self {
        Self {
            opts,
            bs,
            cache,
            size: 0,
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

impl FieldSink for TightSizer<'_> {
    fn version(&self) -> i32 {
        self.opts.version
    }

    fn raw_u8(&mut self, _v: u8) -> AmqResult<()> {
        self.size += 1;
        Ok(())
    }

    fn raw_i32(&mut self, _v: i32) -> AmqResult<()> {
        self.size += 4;
        Ok(())
    }

    fn fixed_bytes(&mut self, v: &[u8]) -> AmqResult<()> {
        self.size += v.len();
        Ok(())
    }

    fn bool_field(&mut self, v: bool) -> AmqResult<()> {
        self.bs.write_bool(v);
        Ok(())
    }

    #[allow(clippy::cast_sign_loss)]
    fn long_field(&mut self, v: i64) -> AmqResult<()> {
        let u = v as u64;
        if u == 0 {
            self.bs.write_bool(false);
            self.bs.write_bool(false);
        } else if u & 0xFFFF_FFFF_FFFF_0000 == 0 {
            self.bs.write_bool(false);
            self.bs.write_bool(true);
            self.size += 2;
        } else if u & 0xFFFF_FFFF_0000_0000 == 0 {
            self.bs.write_bool(true);
            self.bs.write_bool(false);
            self.size += 4;
        } else {
            self.bs.write_bool(true);
            self.bs.write_bool(true);
            self.size += 8;
        }
        Ok(())
    }

    fn string_field(&mut self, v: Option<&str>) -> AmqResult<()> {
        self.bs.write_bool(v.is_some());
        if let Some(s) = v {
            let ascii = s.bytes().all(|b| (0x01..0x80).contains(&b));
            self.bs.write_bool(ascii);
            self.size += 2 + codec::modified_utf8_length(s);
        }
        Ok(())
    }

    fn bytes_field(&mut self, v: Option<&[u8]>) -> AmqResult<()> {
        self.bs.write_bool(v.is_some());
        if let Some(bytes) = v {
            self.size += 4 + bytes.len();
        }
        Ok(())
    }

    fn cached_field(&mut self, v: Option<CachedValue>) -> AmqResult<()> {
        if !self.opts.cache_enabled {
            let ds = v.map(DataStructure::from);
            return self.nested_field(ds.as_ref());
        }
        self.size += 2;
        match self.cache.lookup(&v) {
            Some(_slot) => {
                self.bs.write_bool(false);
                Ok(())
            }
            None => {
                self.bs.write_bool(true);
                self.cache.insert(v.clone())?;
                let ds = v.map(DataStructure::from);
                self.nested_field(ds.as_ref())
            }
        }
    }

    fn nested_field(&mut self, v: Option<&DataStructure>) -> AmqResult<()> {
        self.bs.write_bool(v.is_some());
        let Some(ds) = v else { return Ok(()) };
        self.enter()?;
        let type_code = ds.data_structure_type();
        if is_marshall_aware(type_code) {
            // no retained marshalled form on the client side
            self.bs.write_bool(false);
        }
        self.size += 1; // type code byte
        walk_data_structure(ds, self)?;
        self.depth -= 1;
        Ok(())
    }

    fn array_field(&mut self, items: &[DataStructure]) -> AmqResult<()> {
        if items.is_empty() {
            self.bs.write_bool(false);
            return Ok(());
        }
        self.bs.write_bool(true);
        self.size += 2; // element count
        for item in items {
            self.nested_field(Some(item))?;
        }
        Ok(())
    }

    fn throwable_field(&mut self, v: Option<&BrokerError>) -> AmqResult<()> {
        self.bs.write_bool(v.is_some());
        let Some(error) = v else { return Ok(()) };
        self.enter()?;
        self.string_field(Some(&error.exception_class))?;
        self.string_field(Some(&error.message))?;
        if self.opts.stack_trace_enabled {
            self.size += 2; // element count
            for element in &error.stack_trace {
                self.string_field(Some(&element.class_name))?;
                self.string_field(Some(&element.method_name))?;
                self.string_field(Some(&element.file_name))?;
                self.size += 4; // line number
            }
            self.throwable_field(error.cause.as_deref())?;
        }
        self.depth -= 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// tight pass 2: emission, replaying the recorded bits
// ---------------------------------------------------------------------------

pub(crate) struct TightWriter<'a> {
    pub opts: &'a WireFormatOptions,
    pub bs: &'a mut BooleanStream,
    pub cache: &'a MarshalCache,
    pub w: &'a mut dyn std::io::Write,
}

impl FieldSink for TightWriter<'_> {
    fn version(&self) -> i32 {
        self.opts.version
    }

    fn raw_u8(&mut self, v: u8) -> AmqResult<()> {
        self.w.write_u8(v)?;
        Ok(())
    }

    fn raw_i32(&mut self, v: i32) -> AmqResult<()> {
        self.w.write_i32::<BigEndian>(v)?;
        Ok(())
    }

    fn fixed_bytes(&mut self, v: &[u8]) -> AmqResult<()> {
        self.w.write_all(v)?;
        Ok(())
    }

    fn bool_field(&mut self, _v: bool) -> AmqResult<()> {
        // the value lives in the bitmap; consume the bit to stay aligned
        self.bs.read_bool()?;
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn long_field(&mut self, v: i64) -> AmqResult<()> {
        if self.bs.read_bool()? {
            if self.bs.read_bool()? {
                self.w.write_i64::<BigEndian>(v)?;
            } else {
                self.w.write_i32::<BigEndian>(v as i32)?;
            }
        } else if self.bs.read_bool()? {
            self.w.write_i16::<BigEndian>(v as i16)?;
        }
        Ok(())
    }

    fn string_field(&mut self, v: Option<&str>) -> AmqResult<()> {
        if self.bs.read_bool()? {
            self.bs.read_bool()?; // ascii hint; the byte form is the same
            let s = v.ok_or_else(|| impl_err!("string became absent between passes"))?;
            codec::write_utf8(s, self.w)?;
        }
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_possible_wrap)]
    fn bytes_field(&mut self, v: Option<&[u8]>) -> AmqResult<()> {
        if self.bs.read_bool()? {
            let bytes = v.ok_or_else(|| impl_err!("byte array became absent between passes"))?;
            self.w.write_i32::<BigEndian>(bytes.len() as i32)?;
            self.w.write_all(bytes)?;
        }
        Ok(())
    }

    fn cached_field(&mut self, v: Option<CachedValue>) -> AmqResult<()> {
        if !self.opts.cache_enabled {
            let ds = v.map(DataStructure::from);
            return self.nested_field(ds.as_ref());
        }
        let slot = self
            .cache
            .lookup(&v)
            .ok_or_else(|| impl_err!("cache slot vanished between passes"))?;
        if self.bs.read_bool()? {
            self.w.write_i16::<BigEndian>(slot)?;
            let ds = v.map(DataStructure::from);
            self.nested_field(ds.as_ref())
        } else {
            self.w.write_i16::<BigEndian>(slot)?;
            Ok(())
        }
    }

    fn nested_field(&mut self, v: Option<&DataStructure>) -> AmqResult<()> {
        if !self.bs.read_bool()? {
            return Ok(());
        }
        let ds = v.ok_or_else(|| impl_err!("nested object became absent between passes"))?;
        let type_code = ds.data_structure_type();
        self.w.write_u8(type_code)?;
        if is_marshall_aware(type_code) {
            self.bs.read_bool()?;
        }
        walk_data_structure(ds, self)
    }

    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_possible_wrap)]
    fn array_field(&mut self, items: &[DataStructure]) -> AmqResult<()> {
        if self.bs.read_bool()? {
            self.w.write_i16::<BigEndian>(items.len() as i16)?;
            for item in items {
                self.nested_field(Some(item))?;
            }
        }
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_possible_wrap)]
    fn throwable_field(&mut self, v: Option<&BrokerError>) -> AmqResult<()> {
        if !self.bs.read_bool()? {
            return Ok(());
        }
        let error = v.ok_or_else(|| impl_err!("throwable became absent between passes"))?;
        self.string_field(Some(&error.exception_class))?;
        self.string_field(Some(&error.message))?;
        if self.opts.stack_trace_enabled {
            self.w
                .write_i16::<BigEndian>(error.stack_trace.len() as i16)?;
            for element in &error.stack_trace {
                self.string_field(Some(&element.class_name))?;
                self.string_field(Some(&element.method_name))?;
                self.string_field(Some(&element.file_name))?;
                self.w.write_i32::<BigEndian>(element.line_number)?;
            }
            self.throwable_field(error.cause.as_deref())?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// loose: single-pass, self-describing
// ---------------------------------------------------------------------------

pub(crate) struct LooseWriter<'a> {
    pub opts: &'a WireFormatOptions,
    pub cache: &'a mut MarshalCache,
    pub w: &'a mut dyn std::io::Write,
    depth: usize,
}

impl<'a> LooseWriter<'a> {
    pub fn new(
        opts: &'a WireFormatOptions,
        cache: &'a mut MarshalCache,
        w: &'a mut dyn std::io::Write,
    ) -> Self {
        Self {
            opts,
            cache,
            w,
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

impl FieldSink for LooseWriter<'_> {
    fn version(&self) -> i32 {
        self.opts.version
    }

    fn raw_u8(&mut self, v: u8) -> AmqResult<()> {
        self.w.write_u8(v)?;
        Ok(())
    }

    fn raw_i32(&mut self, v: i32) -> AmqResult<()> {
        self.w.write_i32::<BigEndian>(v)?;
        Ok(())
    }

    fn fixed_bytes(&mut self, v: &[u8]) -> AmqResult<()> {
        self.w.write_all(v)?;
        Ok(())
    }

    fn bool_field(&mut self, v: bool) -> AmqResult<()> {
        self.w.write_u8(v.into())?;
        Ok(())
    }

    fn long_field(&mut self, v: i64) -> AmqResult<()> {
        self.w.write_i64::<BigEndian>(v)?;
        Ok(())
    }

    fn string_field(&mut self, v: Option<&str>) -> AmqResult<()> {
        self.w.write_u8(v.is_some().into())?;
        if let Some(s) = v {
            codec::write_utf8(s, self.w)?;
        }
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_possible_wrap)]
    fn bytes_field(&mut self, v: Option<&[u8]>) -> AmqResult<()> {
        self.w.write_u8(v.is_some().into())?;
        if let Some(bytes) = v {
            self.w.write_i32::<BigEndian>(bytes.len() as i32)?;
            self.w.write_all(bytes)?;
        }
        Ok(())
    }

    fn cached_field(&mut self, v: Option<CachedValue>) -> AmqResult<()> {
        if !self.opts.cache_enabled {
            let ds = v.map(DataStructure::from);
            return self.nested_field(ds.as_ref());
        }
        match self.cache.lookup(&v) {
            Some(slot) => {
                self.w.write_u8(0)?;
                self.w.write_i16::<BigEndian>(slot)?;
                Ok(())
            }
            None => {
                let slot = self.cache.insert(v.clone())?;
                self.w.write_u8(1)?;
                self.w.write_i16::<BigEndian>(slot)?;
                let ds = v.map(DataStructure::from);
                self.nested_field(ds.as_ref())
            }
        }
    }

    fn nested_field(&mut self, v: Option<&DataStructure>) -> AmqResult<()> {
        self.w.write_u8(v.is_some().into())?;
        let Some(ds) = v else { return Ok(()) };
        self.enter()?;
        self.w.write_u8(ds.data_structure_type())?;
        walk_data_structure(ds, self)?;
        self.depth -= 1;
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_possible_wrap)]
    fn array_field(&mut self, items: &[DataStructure]) -> AmqResult<()> {
        self.w.write_u8((!items.is_empty()).into())?;
        if !items.is_empty() {
            self.w.write_i16::<BigEndian>(items.len() as i16)?;
            for item in items {
                self.nested_field(Some(item))?;
            }
        }
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_possible_wrap)]
    fn throwable_field(&mut self, v: Option<&BrokerError>) -> AmqResult<()> {
        self.w.write_u8(v.is_some().into())?;
        let Some(error) = v else { return Ok(()) };
        self.enter()?;
        self.string_field(Some(&error.exception_class))?;
        self.string_field(Some(&error.message))?;
        if self.opts.stack_trace_enabled {
            self.w
                .write_i16::<BigEndian>(error.stack_trace.len() as i16)?;
            for element in &error.stack_trace {
                self.string_field(Some(&element.class_name))?;
                self.string_field(Some(&element.method_name))?;
                self.string_field(Some(&element.file_name))?;
                self.w.write_i32::<BigEndian>(element.line_number)?;
            }
            self.throwable_field(error.cause.as_deref())?;
        }
        self.depth -= 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// the walks: field order per command kind
// ---------------------------------------------------------------------------

fn broker_ids(ids: &[crate::commands::BrokerId]) -> Vec<DataStructure> {
    ids.iter()
        .map(|id| DataStructure::BrokerId(id.clone()))
        .collect()
}

#[allow(clippy::cast_sign_loss)]
#[allow(clippy::too_many_lines)]
pub(crate) fn walk_command(command: &Command, sink: &mut dyn FieldSink) -> AmqResult<()> {
    if let CommandBody::WireFormatInfo(info) = &command.body {
        // WireFormatInfo is not a BaseCommand: no id fields
        sink.fixed_bytes(&info.magic)?;
        sink.raw_i32(info.version)?;
        let props = if info.properties.is_empty() {
            None
        } else {
            Some(info.properties.to_marshalled_bytes()?)
        };
        return sink.bytes_field(props.as_deref());
    }

    sink.raw_i32(command.command_id)?;
    sink.bool_field(command.response_required)?;

    match &command.body {
        CommandBody::WireFormatInfo(_) => unreachable!("handled above"),
        CommandBody::KeepAliveInfo | CommandBody::ShutdownInfo | CommandBody::FlushCommand => {}

        CommandBody::ConnectionInfo(info) => {
            sink.cached_field(Some(CachedValue::ConnectionId(info.connection_id.clone())))?;
            sink.string_field(info.client_id.as_deref())?;
            sink.string_field(info.password.as_deref())?;
            sink.string_field(info.user_name.as_deref())?;
            sink.array_field(&broker_ids(&info.broker_path))?;
            if sink.version() >= 2 {
                sink.bool_field(info.broker_master_connector)?;
                sink.bool_field(info.manageable)?;
                sink.bool_field(info.client_master)?;
            }
            if sink.version() >= 6 {
                sink.bool_field(info.fault_tolerant)?;
                sink.bool_field(info.failover_reconnect)?;
            }
        }

        CommandBody::SessionInfo(info) => {
            sink.cached_field(Some(CachedValue::SessionId(info.session_id.clone())))?;
        }

        CommandBody::ConsumerInfo(info) => {
            sink.cached_field(Some(CachedValue::ConsumerId(info.consumer_id.clone())))?;
            sink.bool_field(info.browser)?;
            sink.cached_field(info.destination.clone().map(CachedValue::Destination))?;
            sink.raw_i32(info.prefetch_size)?;
            sink.raw_i32(info.maximum_pending_message_limit)?;
            sink.bool_field(info.dispatch_async)?;
            sink.string_field(info.selector.as_deref())?;
            sink.string_field(info.subscription_name.as_deref())?;
            sink.bool_field(info.no_local)?;
            sink.bool_field(info.exclusive)?;
            sink.bool_field(info.retroactive)?;
            sink.raw_u8(info.priority as u8)?;
            sink.array_field(&broker_ids(&info.broker_path))?;
            // additional predicate, never set by this client
            sink.nested_field(None)?;
            sink.bool_field(info.network_subscription)?;
            sink.bool_field(info.optimized_acknowledge)?;
            sink.bool_field(info.no_range_acks)?;
            if sink.version() >= 4 {
                let path: Vec<DataStructure> = info
                    .network_consumer_path
                    .iter()
                    .map(|id| DataStructure::ConsumerId(id.clone()))
                    .collect();
                sink.array_field(&path)?;
            }
        }

        CommandBody::ProducerInfo(info) => {
            sink.cached_field(Some(CachedValue::ProducerId(info.producer_id.clone())))?;
            sink.cached_field(info.destination.clone().map(CachedValue::Destination))?;
            sink.array_field(&broker_ids(&info.broker_path))?;
            if sink.version() >= 2 {
                sink.bool_field(info.dispatch_async)?;
            }
            if sink.version() >= 3 {
                sink.raw_i32(info.window_size)?;
            }
        }

        CommandBody::TransactionInfo(info) => {
            sink.cached_field(Some(CachedValue::ConnectionId(info.connection_id.clone())))?;
            sink.cached_field(info.transaction_id.clone().map(CachedValue::TransactionId))?;
            sink.raw_u8(info.transaction_type)?;
        }

        CommandBody::DestinationInfo(info) => {
            sink.cached_field(Some(CachedValue::ConnectionId(info.connection_id.clone())))?;
            sink.cached_field(info.destination.clone().map(CachedValue::Destination))?;
            sink.raw_u8(info.operation_type)?;
            sink.long_field(info.timeout)?;
            sink.array_field(&broker_ids(&info.broker_path))?;
        }

        CommandBody::RemoveSubscriptionInfo(info) => {
            sink.cached_field(Some(CachedValue::ConnectionId(info.connection_id.clone())))?;
            sink.string_field(Some(&info.subscription_name))?;
            sink.string_field(Some(&info.client_id))?;
        }

        CommandBody::RemoveInfo(info) => {
            sink.cached_field(Some(cached_from_object_id(&info.object_id)?))?;
            if sink.version() >= 5 {
                sink.long_field(info.last_delivered_sequence_id)?;
            }
        }

        CommandBody::ControlCommand(info) => {
            sink.string_field(Some(&info.command))?;
        }

        CommandBody::ConnectionError(info) => {
            sink.throwable_field(info.exception.as_ref())?;
            let connection_id = info
                .connection_id
                .clone()
                .map(DataStructure::ConnectionId);
            sink.nested_field(connection_id.as_ref())?;
        }

        CommandBody::ConsumerControl(info) => {
            if sink.version() >= 6 {
                let destination = info.destination.clone().map(DataStructure::Destination);
                sink.nested_field(destination.as_ref())?;
            }
            sink.bool_field(info.close)?;
            let consumer_id = info.consumer_id.clone().map(DataStructure::ConsumerId);
            sink.nested_field(consumer_id.as_ref())?;
            sink.raw_i32(info.prefetch)?;
            sink.bool_field(info.flush)?;
            sink.bool_field(info.start)?;
            sink.bool_field(info.stop)?;
        }

        CommandBody::ConnectionControl(info) => {
            sink.bool_field(info.close)?;
            sink.bool_field(info.exit)?;
            sink.bool_field(info.fault_tolerant)?;
            sink.bool_field(info.resume)?;
            sink.bool_field(info.suspend)?;
            if sink.version() >= 6 {
                sink.string_field(info.connected_brokers.as_deref())?;
                sink.string_field(info.reconnect_to.as_deref())?;
                sink.bool_field(info.rebalance_connection)?;
            }
        }

        CommandBody::ProducerAck(info) => {
            let producer_id = DataStructure::ProducerId(info.producer_id.clone());
            sink.nested_field(Some(&producer_id))?;
            sink.raw_i32(info.size)?;
        }

        CommandBody::MessagePull(info) => {
            sink.cached_field(Some(CachedValue::ConsumerId(info.consumer_id.clone())))?;
            sink.cached_field(info.destination.clone().map(CachedValue::Destination))?;
            sink.long_field(info.timeout)?;
            if sink.version() >= 3 {
                sink.string_field(info.correlation_id.as_deref())?;
                let message_id = info.message_id.clone().map(DataStructure::MessageId);
                sink.nested_field(message_id.as_ref())?;
            }
        }

        CommandBody::MessageDispatch(info) => {
            sink.cached_field(Some(CachedValue::ConsumerId(info.consumer_id.clone())))?;
            sink.cached_field(info.destination.clone().map(CachedValue::Destination))?;
            let message = info
                .message
                .clone()
                .map(|m| DataStructure::Message(Box::new(m)));
            sink.nested_field(message.as_ref())?;
            sink.raw_i32(info.redelivery_counter)?;
        }

        CommandBody::MessageAck(info) => {
            sink.cached_field(info.destination.clone().map(CachedValue::Destination))?;
            sink.cached_field(info.transaction_id.clone().map(CachedValue::TransactionId))?;
            sink.cached_field(Some(CachedValue::ConsumerId(info.consumer_id.clone())))?;
            sink.raw_u8(info.ack_type)?;
            let first = info.first_message_id.clone().map(DataStructure::MessageId);
            sink.nested_field(first.as_ref())?;
            let last = info.last_message_id.clone().map(DataStructure::MessageId);
            sink.nested_field(last.as_ref())?;
            sink.raw_i32(info.message_count)?;
            if sink.version() >= 10 {
                sink.throwable_field(info.poison_cause.as_ref())?;
            }
        }

        CommandBody::Message(message) => {
            walk_message(message, sink)?;
        }

        CommandBody::Response(info) => {
            sink.raw_i32(info.correlation_id)?;
        }

        CommandBody::ExceptionResponse(info) => {
            sink.raw_i32(info.correlation_id)?;
            sink.throwable_field(info.exception.as_ref())?;
        }

        CommandBody::DataResponse(info) => {
            sink.raw_i32(info.correlation_id)?;
            sink.nested_field(info.data.as_ref())?;
        }

        CommandBody::DataArrayResponse(info) => {
            sink.raw_i32(info.correlation_id)?;
            sink.array_field(&info.data)?;
        }

        CommandBody::IntegerResponse(info) => {
            sink.raw_i32(info.correlation_id)?;
            sink.raw_i32(info.result)?;
        }

        CommandBody::BrokerInfo(info) => {
            walk_broker_info(info, sink)?;
        }

        CommandBody::DiscoveryEvent(info) => {
            sink.string_field(info.service_name.as_deref())?;
            sink.string_field(info.broker_name.as_deref())?;
        }
    }
    Ok(())
}

#[allow(clippy::cast_sign_loss)]
pub(crate) fn walk_message(message: &Message, sink: &mut dyn FieldSink) -> AmqResult<()> {
    sink.cached_field(message.producer_id.clone().map(CachedValue::ProducerId))?;
    sink.cached_field(message.destination.clone().map(CachedValue::Destination))?;
    sink.cached_field(message.transaction_id.clone().map(CachedValue::TransactionId))?;
    sink.cached_field(
        message
            .original_destination
            .clone()
            .map(CachedValue::Destination),
    )?;
    let message_id = message.message_id.clone().map(DataStructure::MessageId);
    sink.nested_field(message_id.as_ref())?;
    sink.cached_field(
        message
            .original_transaction_id
            .clone()
            .map(CachedValue::TransactionId),
    )?;
    sink.string_field(message.group_id.as_deref())?;
    sink.raw_i32(message.group_sequence)?;
    sink.string_field(message.correlation_id.as_deref())?;
    sink.bool_field(message.persistent)?;
    sink.long_field(message.expiration)?;
    sink.raw_u8(message.priority as u8)?;
    let reply_to = message.reply_to.clone().map(DataStructure::Destination);
    sink.nested_field(reply_to.as_ref())?;
    sink.long_field(message.timestamp)?;
    sink.string_field(message.message_type.as_deref())?;
    let content = message.marshalled_content()?;
    sink.bytes_field(content.as_deref())?;
    let properties = message.marshalled_properties()?;
    sink.bytes_field(properties.as_deref())?;
    sink.nested_field(message.data_structure.as_deref())?;
    sink.cached_field(
        message
            .target_consumer_id
            .clone()
            .map(CachedValue::ConsumerId),
    )?;
    sink.bool_field(message.compressed)?;
    sink.raw_i32(message.redelivery_counter)?;
    sink.array_field(&broker_ids(&message.broker_path))?;
    sink.long_field(message.arrival)?;
    sink.string_field(message.user_id.as_deref())?;
    sink.bool_field(message.received_by_df_bridge)?;
    if sink.version() >= 2 {
        sink.bool_field(message.droppable)?;
    }
    if sink.version() >= 3 {
        sink.array_field(&broker_ids(&message.cluster))?;
        sink.long_field(message.broker_in_time)?;
        sink.long_field(message.broker_out_time)?;
    }
    if sink.version() >= 10 {
        sink.bool_field(message.group_first_for_consumer)?;
    }
    Ok(())
}

pub(crate) fn walk_broker_info(info: &BrokerInfo, sink: &mut dyn FieldSink) -> AmqResult<()> {
    sink.cached_field(info.broker_id.clone().map(CachedValue::BrokerId))?;
    sink.string_field(info.broker_url.as_deref())?;
    let peers: Vec<DataStructure> = info
        .peer_broker_infos
        .iter()
        .map(|peer| DataStructure::BrokerInfo(Box::new(peer.clone())))
        .collect();
    sink.array_field(&peers)?;
    sink.string_field(info.broker_name.as_deref())?;
    sink.bool_field(info.slave_broker)?;
    sink.bool_field(info.master_broker)?;
    sink.bool_field(info.fault_tolerant_configuration)?;
    if sink.version() >= 2 {
        sink.bool_field(info.duplex_connection)?;
        sink.bool_field(info.network_connection)?;
        sink.long_field(info.connection_id)?;
    }
    if sink.version() >= 3 {
        sink.string_field(info.broker_upload_url.as_deref())?;
        sink.string_field(info.network_properties.as_deref())?;
    }
    Ok(())
}

pub(crate) fn walk_data_structure(ds: &DataStructure, sink: &mut dyn FieldSink) -> AmqResult<()> {
    match ds {
        DataStructure::ConnectionId(id) => sink.string_field(Some(&id.value)),
        DataStructure::SessionId(id) => {
            sink.string_field(Some(&id.connection_id))?;
            sink.long_field(id.value)
        }
        DataStructure::ConsumerId(id) => {
            sink.string_field(Some(&id.connection_id))?;
            sink.long_field(id.session_id)?;
            sink.long_field(id.value)
        }
        DataStructure::ProducerId(id) => {
            // the wire order is connection, value, session
            sink.string_field(Some(&id.connection_id))?;
            sink.long_field(id.value)?;
            sink.long_field(id.session_id)
        }
        DataStructure::MessageId(id) => {
            sink.cached_field(Some(CachedValue::ProducerId(id.producer_id.clone())))?;
            sink.long_field(id.producer_sequence_id)?;
            sink.long_field(id.broker_sequence_id)
        }
        DataStructure::TransactionId(crate::commands::TransactionId::Local(id)) => {
            sink.long_field(id.value)?;
            sink.cached_field(Some(CachedValue::ConnectionId(ConnectionId::new(
                id.connection_id.clone(),
            ))))
        }
        DataStructure::TransactionId(crate::commands::TransactionId::Xa(id)) => {
            sink.raw_i32(id.format_id())?;
            sink.bytes_field(Some(id.global_transaction_id()))?;
            sink.bytes_field(Some(id.branch_qualifier()))
        }
        DataStructure::BrokerId(id) => sink.string_field(Some(&id.value)),
        DataStructure::Destination(destination) => {
            sink.string_field(Some(&destination.physical_name))
        }
        DataStructure::Message(message) => walk_message(message, sink),
        DataStructure::BrokerInfo(info) => walk_broker_info(info, sink),
        DataStructure::BrokerError(_) => Err(malformed!(
            "broker errors are marshalled through the throwable path only"
        )),
    }
}

fn cached_from_object_id(object_id: &DataStructure) -> AmqResult<CachedValue> {
    Ok(match object_id {
        DataStructure::ConnectionId(id) => CachedValue::ConnectionId(id.clone()),
        DataStructure::SessionId(id) => CachedValue::SessionId(id.clone()),
        DataStructure::ConsumerId(id) => CachedValue::ConsumerId(id.clone()),
        DataStructure::ProducerId(id) => CachedValue::ProducerId(id.clone()),
        DataStructure::Destination(d) => CachedValue::Destination(d.clone()),
        other => {
            return Err(impl_err!(
                "remove info cannot reference type code {}",
                other.data_structure_type()
            ));
        }
    })
}
