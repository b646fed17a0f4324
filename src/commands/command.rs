use crate::commands::{
    BrokerInfo, ConnectionControl, ConnectionError, ConnectionInfo, ConsumerControl, ConsumerInfo,
    ControlCommand, DataArrayResponse, DataResponse, DestinationInfo, DiscoveryEvent,
    ExceptionResponse, IntegerResponse, Message, MessageAck, MessageDispatch, MessagePull,
    ProducerAck, ProducerInfo, RemoveInfo, RemoveSubscriptionInfo, Response, SessionInfo,
    TransactionInfo, WireFormatInfo, data_structure::types,
};

/// One unit of conversation between client and broker.
///
/// Every command carries the correlator-assigned id, the response-required
/// bit and one of the closed set of bodies.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Command {
    pub command_id: i32,
    pub response_required: bool,
    pub body: CommandBody,
}

/// The closed set of command kinds.
#[derive(Clone, Debug, PartialEq)]
pub enum CommandBody {
    WireFormatInfo(WireFormatInfo),
    BrokerInfo(Box<BrokerInfo>),
    ConnectionInfo(ConnectionInfo),
    SessionInfo(SessionInfo),
    ConsumerInfo(Box<ConsumerInfo>),
    ProducerInfo(ProducerInfo),
    TransactionInfo(TransactionInfo),
    DestinationInfo(DestinationInfo),
    RemoveSubscriptionInfo(RemoveSubscriptionInfo),
    KeepAliveInfo,
    ShutdownInfo,
    RemoveInfo(RemoveInfo),
    ControlCommand(ControlCommand),
    FlushCommand,
    ConnectionError(ConnectionError),
    ConsumerControl(ConsumerControl),
    ConnectionControl(ConnectionControl),
    ProducerAck(ProducerAck),
    MessagePull(MessagePull),
    MessageDispatch(Box<MessageDispatch>),
    MessageAck(MessageAck),
    Message(Box<Message>),
    Response(Response),
    ExceptionResponse(ExceptionResponse),
    DataResponse(Box<DataResponse>),
    DataArrayResponse(DataArrayResponse),
    IntegerResponse(IntegerResponse),
    DiscoveryEvent(DiscoveryEvent),
}

impl Default for CommandBody {
    fn default() -> Self {
        Self::KeepAliveInfo
    }
}

impl Command {
    pub fn new(body: CommandBody) -> Self {
        Self {
            command_id: 0,
            response_required: false,
            body,
        }
    }

    pub fn message(message: Message) -> Self {
        Self::new(CommandBody::Message(Box::new(message)))
    }

    /// The stable wire type code of this command.
    pub fn data_structure_type(&self) -> u8 {
        match &self.body {
            CommandBody::WireFormatInfo(_) => types::WIREFORMAT_INFO,
            CommandBody::BrokerInfo(_) => types::BROKER_INFO,
            CommandBody::ConnectionInfo(_) => types::CONNECTION_INFO,
            CommandBody::SessionInfo(_) => types::SESSION_INFO,
            CommandBody::ConsumerInfo(_) => types::CONSUMER_INFO,
            CommandBody::ProducerInfo(_) => types::PRODUCER_INFO,
            CommandBody::TransactionInfo(_) => types::TRANSACTION_INFO,
            CommandBody::DestinationInfo(_) => types::DESTINATION_INFO,
            CommandBody::RemoveSubscriptionInfo(_) => types::REMOVE_SUBSCRIPTION_INFO,
            CommandBody::KeepAliveInfo => types::KEEP_ALIVE_INFO,
            CommandBody::ShutdownInfo => types::SHUTDOWN_INFO,
            CommandBody::RemoveInfo(_) => types::REMOVE_INFO,
            CommandBody::ControlCommand(_) => types::CONTROL_COMMAND,
            CommandBody::FlushCommand => types::FLUSH_COMMAND,
            CommandBody::ConnectionError(_) => types::CONNECTION_ERROR,
            CommandBody::ConsumerControl(_) => types::CONSUMER_CONTROL,
            CommandBody::ConnectionControl(_) => types::CONNECTION_CONTROL,
            CommandBody::ProducerAck(_) => types::PRODUCER_ACK,
            CommandBody::MessagePull(_) => types::MESSAGE_PULL,
            CommandBody::MessageDispatch(_) => types::MESSAGE_DISPATCH,
            CommandBody::MessageAck(_) => types::MESSAGE_ACK,
            CommandBody::Message(m) => m.data_structure_type(),
            CommandBody::Response(_) => types::RESPONSE,
            CommandBody::ExceptionResponse(_) => types::EXCEPTION_RESPONSE,
            CommandBody::DataResponse(_) => types::DATA_RESPONSE,
            CommandBody::DataArrayResponse(_) => types::DATA_ARRAY_RESPONSE,
            CommandBody::IntegerResponse(_) => types::INTEGER_RESPONSE,
            CommandBody::DiscoveryEvent(_) => types::DISCOVERY_EVENT,
        }
    }

    // --- capability predicates, pure functions of the variant tag --------

    pub fn is_message(&self) -> bool {
        matches!(self.body, CommandBody::Message(_))
    }

    pub fn is_message_dispatch(&self) -> bool {
        matches!(self.body, CommandBody::MessageDispatch(_))
    }

    pub fn is_message_ack(&self) -> bool {
        matches!(self.body, CommandBody::MessageAck(_))
    }

    pub fn is_connection_info(&self) -> bool {
        matches!(self.body, CommandBody::ConnectionInfo(_))
    }

    pub fn is_session_info(&self) -> bool {
        matches!(self.body, CommandBody::SessionInfo(_))
    }

    pub fn is_consumer_info(&self) -> bool {
        matches!(self.body, CommandBody::ConsumerInfo(_))
    }

    pub fn is_producer_info(&self) -> bool {
        matches!(self.body, CommandBody::ProducerInfo(_))
    }

    pub fn is_transaction_info(&self) -> bool {
        matches!(self.body, CommandBody::TransactionInfo(_))
    }

    pub fn is_remove_info(&self) -> bool {
        matches!(self.body, CommandBody::RemoveInfo(_))
    }

    pub fn is_remove_subscription_info(&self) -> bool {
        matches!(self.body, CommandBody::RemoveSubscriptionInfo(_))
    }

    pub fn is_response(&self) -> bool {
        matches!(
            self.body,
            CommandBody::Response(_)
                | CommandBody::ExceptionResponse(_)
                | CommandBody::DataResponse(_)
                | CommandBody::DataArrayResponse(_)
                | CommandBody::IntegerResponse(_)
        )
    }

    pub fn is_exception_response(&self) -> bool {
        matches!(self.body, CommandBody::ExceptionResponse(_))
    }

    pub fn is_wire_format_info(&self) -> bool {
        matches!(self.body, CommandBody::WireFormatInfo(_))
    }

    pub fn is_keep_alive(&self) -> bool {
        matches!(self.body, CommandBody::KeepAliveInfo)
    }

    pub fn is_shutdown_info(&self) -> bool {
        matches!(self.body, CommandBody::ShutdownInfo)
    }

    pub fn is_broker_info(&self) -> bool {
        matches!(self.body, CommandBody::BrokerInfo(_))
    }

    pub fn is_connection_control(&self) -> bool {
        matches!(self.body, CommandBody::ConnectionControl(_))
    }

    pub fn is_connection_error(&self) -> bool {
        matches!(self.body, CommandBody::ConnectionError(_))
    }

    /// The correlation id if this command is any of the response kinds.
    pub fn correlation_id(&self) -> Option<i32> {
        match &self.body {
            CommandBody::Response(r) => Some(r.correlation_id),
            CommandBody::ExceptionResponse(r) => Some(r.correlation_id),
            CommandBody::DataResponse(r) => Some(r.correlation_id),
            CommandBody::DataArrayResponse(r) => Some(r.correlation_id),
            CommandBody::IntegerResponse(r) => Some(r.correlation_id),
            _ => None,
        }
    }
}

impl From<CommandBody> for Command {
    fn from(body: CommandBody) -> Self {
        Self::new(body)
    }
}
