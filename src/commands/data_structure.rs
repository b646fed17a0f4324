use crate::{
    AmqError, AmqResult,
    amq_error::malformed,
    commands::{
        BrokerError, BrokerId, BrokerInfo, ConnectionId, ConsumerId, Destination, DestinationKind,
        LocalTransactionId, Message, MessageId, ProducerId, SessionId, TransactionId,
        XaTransactionId,
    },
};

/// A marshallable object that appears nested inside commands.
#[derive(Clone, Debug, PartialEq)]
pub enum DataStructure {
    ConnectionId(ConnectionId),
    SessionId(SessionId),
    ConsumerId(ConsumerId),
    ProducerId(ProducerId),
    MessageId(MessageId),
    TransactionId(TransactionId),
    BrokerId(BrokerId),
    Destination(Destination),
    Message(Box<Message>),
    BrokerError(Box<BrokerError>),
    BrokerInfo(Box<BrokerInfo>),
}

// stable data structure type codes
pub(crate) mod types {
    pub const WIREFORMAT_INFO: u8 = 1;
    pub const BROKER_INFO: u8 = 2;
    pub const CONNECTION_INFO: u8 = 3;
    pub const SESSION_INFO: u8 = 4;
    pub const CONSUMER_INFO: u8 = 5;
    pub const PRODUCER_INFO: u8 = 6;
    pub const TRANSACTION_INFO: u8 = 7;
    pub const DESTINATION_INFO: u8 = 8;
    pub const REMOVE_SUBSCRIPTION_INFO: u8 = 9;
    pub const KEEP_ALIVE_INFO: u8 = 10;
    pub const SHUTDOWN_INFO: u8 = 11;
    pub const REMOVE_INFO: u8 = 12;
    pub const CONTROL_COMMAND: u8 = 14;
    pub const FLUSH_COMMAND: u8 = 15;
    pub const CONNECTION_ERROR: u8 = 16;
    pub const CONSUMER_CONTROL: u8 = 17;
    pub const CONNECTION_CONTROL: u8 = 18;
    pub const PRODUCER_ACK: u8 = 19;
    pub const MESSAGE_PULL: u8 = 20;
    pub const MESSAGE_DISPATCH: u8 = 21;
    pub const MESSAGE_ACK: u8 = 22;
    pub const MESSAGE: u8 = 23;
    pub const BYTES_MESSAGE: u8 = 24;
    pub const MAP_MESSAGE: u8 = 25;
    pub const OBJECT_MESSAGE: u8 = 26;
    pub const STREAM_MESSAGE: u8 = 27;
    pub const TEXT_MESSAGE: u8 = 28;
    pub const RESPONSE: u8 = 30;
    pub const EXCEPTION_RESPONSE: u8 = 31;
    pub const DATA_RESPONSE: u8 = 32;
    pub const DATA_ARRAY_RESPONSE: u8 = 33;
    pub const INTEGER_RESPONSE: u8 = 34;
    pub const DISCOVERY_EVENT: u8 = 40;
    pub const QUEUE: u8 = 100;
    pub const TOPIC: u8 = 101;
    pub const TEMP_QUEUE: u8 = 102;
    pub const TEMP_TOPIC: u8 = 103;
    pub const MESSAGE_ID: u8 = 110;
    pub const LOCAL_TRANSACTION_ID: u8 = 111;
    pub const XA_TRANSACTION_ID: u8 = 112;
    pub const CONNECTION_ID: u8 = 120;
    pub const SESSION_ID: u8 = 121;
    pub const CONSUMER_ID: u8 = 122;
    pub const PRODUCER_ID: u8 = 123;
    pub const BROKER_ID: u8 = 124;
}

pub(crate) fn destination_type_code(kind: DestinationKind) -> u8 {
    match kind {
        DestinationKind::Queue => types::QUEUE,
        DestinationKind::Topic => types::TOPIC,
        DestinationKind::TempQueue => types::TEMP_QUEUE,
        DestinationKind::TempTopic => types::TEMP_TOPIC,
    }
}

pub(crate) fn destination_kind_for(code: u8) -> AmqResult<DestinationKind> {
    Ok(match code {
        types::QUEUE => DestinationKind::Queue,
        types::TOPIC => DestinationKind::Topic,
        types::TEMP_QUEUE => DestinationKind::TempQueue,
        types::TEMP_TOPIC => DestinationKind::TempTopic,
        _ => return Err(malformed!("type code {code} is not a destination")),
    })
}

impl DataStructure {
    pub(crate) fn data_structure_type(&self) -> u8 {
        match self {
            Self::ConnectionId(_) => types::CONNECTION_ID,
            Self::SessionId(_) => types::SESSION_ID,
            Self::ConsumerId(_) => types::CONSUMER_ID,
            Self::ProducerId(_) => types::PRODUCER_ID,
            Self::MessageId(_) => types::MESSAGE_ID,
            Self::TransactionId(TransactionId::Local(_)) => types::LOCAL_TRANSACTION_ID,
            Self::TransactionId(TransactionId::Xa(_)) => types::XA_TRANSACTION_ID,
            Self::BrokerId(_) => types::BROKER_ID,
            Self::Destination(d) => destination_type_code(d.kind),
            Self::Message(m) => m.data_structure_type(),
            Self::BrokerError(_) => 0, // only ever marshalled through the throwable path
            Self::BrokerInfo(_) => types::BROKER_INFO,
        }
    }
}

/// The subset of data structures that participate in the cached-object
/// protocol: everything that names an identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum CachedValue {
    ConnectionId(ConnectionId),
    SessionId(SessionId),
    ConsumerId(ConsumerId),
    ProducerId(ProducerId),
    MessageId(MessageId),
    TransactionId(TransactionId),
    BrokerId(BrokerId),
    Destination(Destination),
}

impl CachedValue {
    pub(crate) fn data_structure_type(&self) -> u8 {
        match self {
            Self::ConnectionId(_) => types::CONNECTION_ID,
            Self::SessionId(_) => types::SESSION_ID,
            Self::ConsumerId(_) => types::CONSUMER_ID,
            Self::ProducerId(_) => types::PRODUCER_ID,
            Self::MessageId(_) => types::MESSAGE_ID,
            Self::TransactionId(TransactionId::Local(_)) => types::LOCAL_TRANSACTION_ID,
            Self::TransactionId(TransactionId::Xa(_)) => types::XA_TRANSACTION_ID,
            Self::BrokerId(_) => types::BROKER_ID,
            Self::Destination(d) => destination_type_code(d.kind),
        }
    }
}

macro_rules! cached_conversions {
    ($($variant:ident => $t:ty),* $(,)?) => {
        $(
            impl From<$t> for CachedValue {
                fn from(value: $t) -> Self {
                    Self::$variant(value)
                }
            }
            impl TryFrom<CachedValue> for $t {
                type Error = AmqError;
                fn try_from(value: CachedValue) -> AmqResult<Self> {
                    match value {
                        CachedValue::$variant(inner) => Ok(inner),
                        other => Err(malformed!(
                            "expected a {}, found cached type code {}",
                            stringify!($variant),
                            other.data_structure_type()
                        )),
                    }
                }
            }
        )*
    };
}

cached_conversions! {
    ConnectionId => ConnectionId,
    SessionId => SessionId,
    ConsumerId => ConsumerId,
    ProducerId => ProducerId,
    MessageId => MessageId,
    TransactionId => TransactionId,
    BrokerId => BrokerId,
    Destination => Destination,
}

impl From<LocalTransactionId> for CachedValue {
    fn from(value: LocalTransactionId) -> Self {
        Self::TransactionId(TransactionId::Local(value))
    }
}

impl From<XaTransactionId> for CachedValue {
    fn from(value: XaTransactionId) -> Self {
        Self::TransactionId(TransactionId::Xa(value))
    }
}

impl From<CachedValue> for DataStructure {
    fn from(value: CachedValue) -> Self {
        match value {
            CachedValue::ConnectionId(v) => Self::ConnectionId(v),
            CachedValue::SessionId(v) => Self::SessionId(v),
            CachedValue::ConsumerId(v) => Self::ConsumerId(v),
            CachedValue::ProducerId(v) => Self::ProducerId(v),
            CachedValue::MessageId(v) => Self::MessageId(v),
            CachedValue::TransactionId(v) => Self::TransactionId(v),
            CachedValue::BrokerId(v) => Self::BrokerId(v),
            CachedValue::Destination(v) => Self::Destination(v),
        }
    }
}

macro_rules! nested_conversions {
    ($($variant:ident => $t:ty),* $(,)?) => {
        $(
            impl TryFrom<DataStructure> for $t {
                type Error = AmqError;
                fn try_from(value: DataStructure) -> AmqResult<Self> {
                    match value {
                        DataStructure::$variant(inner) => Ok(inner),
                        other => Err(malformed!(
                            "expected a {}, found nested type code {}",
                            stringify!($variant),
                            other.data_structure_type()
                        )),
                    }
                }
            }
        )*
    };
}

nested_conversions! {
    ConnectionId => ConnectionId,
    SessionId => SessionId,
    ConsumerId => ConsumerId,
    ProducerId => ProducerId,
    MessageId => MessageId,
    TransactionId => TransactionId,
    BrokerId => BrokerId,
    Destination => Destination,
}

impl TryFrom<DataStructure> for Message {
    type Error = AmqError;
    fn try_from(value: DataStructure) -> AmqResult<Self> {
        match value {
            DataStructure::Message(inner) => Ok(*inner),
            other => Err(malformed!(
                "expected a message, found nested type code {}",
                other.data_structure_type()
            )),
        }
    }
}

impl TryFrom<DataStructure> for BrokerInfo {
    type Error = AmqError;
    fn try_from(value: DataStructure) -> AmqResult<Self> {
        match value {
            DataStructure::BrokerInfo(inner) => Ok(*inner),
            other => Err(malformed!(
                "expected a broker info, found nested type code {}",
                other.data_structure_type()
            )),
        }
    }
}
