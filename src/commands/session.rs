use crate::commands::{BrokerId, ConnectionId, ConsumerId, Destination, ProducerId, SessionId};

/// Announces a new connection to the broker.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConnectionInfo {
    pub connection_id: ConnectionId,
    pub client_id: Option<String>,
    pub password: Option<String>,
    pub user_name: Option<String>,
    pub broker_path: Vec<BrokerId>,
    pub broker_master_connector: bool,
    pub manageable: bool,
    pub client_master: bool,
    pub fault_tolerant: bool,
    pub failover_reconnect: bool,
}

impl ConnectionInfo {
    pub fn new(connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            ..Self::default()
        }
    }
}

/// Announces a new session within a connection.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionInfo {
    pub session_id: SessionId,
}

/// Announces a new consumer and its subscription parameters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConsumerInfo {
    pub consumer_id: ConsumerId,
    pub browser: bool,
    pub destination: Option<Destination>,
    pub prefetch_size: i32,
    pub maximum_pending_message_limit: i32,
    pub dispatch_async: bool,
    pub selector: Option<String>,
    pub subscription_name: Option<String>,
    pub no_local: bool,
    pub exclusive: bool,
    pub retroactive: bool,
    pub priority: i8,
    pub broker_path: Vec<BrokerId>,
    pub network_subscription: bool,
    pub optimized_acknowledge: bool,
    pub no_range_acks: bool,
    pub network_consumer_path: Vec<ConsumerId>,
}

impl ConsumerInfo {
    pub fn new(consumer_id: ConsumerId, destination: Destination) -> Self {
        Self {
            consumer_id,
            destination: Some(destination),
            prefetch_size: 1000,
            ..Self::default()
        }
    }

    pub fn is_durable(&self) -> bool {
        self.subscription_name.is_some()
    }
}

/// Announces a new producer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProducerInfo {
    pub producer_id: ProducerId,
    pub destination: Option<Destination>,
    pub broker_path: Vec<BrokerId>,
    pub dispatch_async: bool,
    pub window_size: i32,
}

/// Creates or removes a destination on the broker.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DestinationInfo {
    pub connection_id: ConnectionId,
    pub destination: Option<Destination>,
    pub operation_type: u8,
    pub timeout: i64,
    pub broker_path: Vec<BrokerId>,
}

impl DestinationInfo {
    pub const ADD_OPERATION: u8 = 0;
    pub const REMOVE_OPERATION: u8 = 1;
}

/// Drops a durable subscription by name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RemoveSubscriptionInfo {
    pub connection_id: ConnectionId,
    pub subscription_name: String,
    pub client_id: String,
}
