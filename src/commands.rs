//! The command model: the tagged set of commands a client and a broker
//! exchange, plus the identifier, destination and message types nested
//! inside them.

mod broker_error;
mod broker_info;
mod command;
mod control;
pub(crate) mod data_structure;
mod destination;
mod dispatch;
mod ids;
mod message;
mod primitive_map;
mod response;
mod session;
mod transaction;
pub(crate) mod wire_format_info;

pub use broker_error::{BrokerError, StackTraceElement};
pub use broker_info::{BrokerInfo, DiscoveryEvent};
pub use command::{Command, CommandBody};
pub use control::{
    ConnectionControl, ConnectionError, ConsumerControl, ControlCommand, RemoveInfo,
};
pub use data_structure::DataStructure;
pub use destination::{Destination, DestinationKind};
pub use dispatch::{MessageAck, MessageDispatch, MessagePull, ProducerAck};
pub use ids::{
    BrokerId, ConnectionId, ConsumerId, LocalTransactionId, MessageId, ProducerId, SessionId,
    TransactionId, XaTransactionId,
};
pub use message::{DEFAULT_PRIORITY, Message, MessagePayload};
pub use primitive_map::{PrimitiveMap, PrimitiveValue};
pub use response::{
    DataArrayResponse, DataResponse, ExceptionResponse, IntegerResponse, Response,
};
pub use session::{
    ConnectionInfo, ConsumerInfo, DestinationInfo, ProducerInfo, RemoveSubscriptionInfo,
    SessionInfo,
};
pub use transaction::TransactionInfo;
pub use wire_format_info::WireFormatInfo;
