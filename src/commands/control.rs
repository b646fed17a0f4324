use crate::commands::{
    BrokerError, ConnectionId, ConsumerId, Destination, data_structure::DataStructure,
};

/// Removes a previously announced object (connection, session, consumer or
/// producer) on the broker.
#[derive(Clone, Debug, PartialEq)]
pub struct RemoveInfo {
    pub object_id: DataStructure,
    pub last_delivered_sequence_id: i64,
}

impl RemoveInfo {
    pub fn for_connection(id: ConnectionId) -> Self {
        Self {
            object_id: DataStructure::ConnectionId(id),
            last_delivered_sequence_id: 0,
        }
    }

    pub fn for_consumer(id: ConsumerId) -> Self {
        Self {
            object_id: DataStructure::ConsumerId(id),
            last_delivered_sequence_id: 0,
        }
    }
}

/// A broker-internal control verb transported as a plain string.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ControlCommand {
    pub command: String,
}

/// Broker-initiated connection steering, including the rebalance hints the
/// failover transport honors.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConnectionControl {
    pub close: bool,
    pub exit: bool,
    pub fault_tolerant: bool,
    pub resume: bool,
    pub suspend: bool,
    pub connected_brokers: Option<String>,
    pub reconnect_to: Option<String>,
    pub rebalance_connection: bool,
}

/// Broker-initiated consumer steering (prefetch changes, start/stop).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConsumerControl {
    pub destination: Option<Destination>,
    pub close: bool,
    pub consumer_id: Option<ConsumerId>,
    pub prefetch: i32,
    pub flush: bool,
    pub start: bool,
    pub stop: bool,
}

/// An asynchronous error the broker ties to a connection.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConnectionError {
    pub exception: Option<BrokerError>,
    pub connection_id: Option<ConnectionId>,
}
