use crate::commands::{
    BrokerError, ConsumerId, Destination, Message, MessageId, ProducerId, TransactionId,
};

/// Carries one message from the broker to a consumer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MessageDispatch {
    pub consumer_id: ConsumerId,
    pub destination: Option<Destination>,
    pub message: Option<Message>,
    pub redelivery_counter: i32,
}

/// Acknowledges one or a range of dispatched messages.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MessageAck {
    pub destination: Option<Destination>,
    pub transaction_id: Option<TransactionId>,
    pub consumer_id: ConsumerId,
    pub ack_type: u8,
    pub first_message_id: Option<MessageId>,
    pub last_message_id: Option<MessageId>,
    pub message_count: i32,
    pub poison_cause: Option<BrokerError>,
}

impl MessageAck {
    pub const DELIVERED_ACK_TYPE: u8 = 0;
    pub const POISON_ACK_TYPE: u8 = 1;
    pub const STANDARD_ACK_TYPE: u8 = 2;
    pub const REDELIVERED_ACK_TYPE: u8 = 3;
    pub const INDIVIDUAL_ACK_TYPE: u8 = 4;
    pub const UNMATCHED_ACK_TYPE: u8 = 5;
    pub const EXPIRED_ACK_TYPE: u8 = 6;
}

/// Pulls one message for a zero-prefetch consumer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MessagePull {
    pub consumer_id: ConsumerId,
    pub destination: Option<Destination>,
    pub timeout: i64,
    pub correlation_id: Option<String>,
    pub message_id: Option<MessageId>,
}

/// Flow-control feedback for an asynchronous producer window.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProducerAck {
    pub producer_id: ProducerId,
    pub size: i32,
}
