use crate::{
    AmqError, AmqResult,
    amq_error::malformed,
    commands::{
        BrokerError, Command, CommandBody, ConnectionError, ConsumerId, DEFAULT_PRIORITY,
        DataStructure, Destination, DestinationKind, ExceptionResponse, Message, MessageDispatch,
        MessageId, ProducerId, Response, TransactionInfo,
    },
    wireformat::{
        WireFormat,
        stomp::frame::{self, StompFrame},
    },
};
use std::sync::Mutex;

/// The destination prefixes a STOMP broker understands; configurable per
/// connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StompPrefixes {
    pub queue: String,
    pub topic: String,
    pub temp_queue: String,
    pub temp_topic: String,
}

impl Default for StompPrefixes {
    fn default() -> Self {
        Self {
            queue: "/queue/".to_string(),
            topic: "/topic/".to_string(),
            temp_queue: "/temp-queue/".to_string(),
            temp_topic: "/temp-topic/".to_string(),
        }
    }
}

impl StompPrefixes {
    fn encode(&self, destination: &Destination) -> String {
        let prefix = match destination.kind {
            DestinationKind::Queue => &self.queue,
            DestinationKind::Topic => &self.topic,
            DestinationKind::TempQueue => &self.temp_queue,
            DestinationKind::TempTopic => &self.temp_topic,
        };
        format!("{prefix}{}", destination.physical_name)
    }

    fn decode(&self, text: &str) -> AmqResult<Destination> {
        let mapping = [
            (&self.queue, DestinationKind::Queue),
            (&self.topic, DestinationKind::Topic),
            (&self.temp_queue, DestinationKind::TempQueue),
            (&self.temp_topic, DestinationKind::TempTopic),
        ];
        for (prefix, kind) in mapping {
            if let Some(name) = text.strip_prefix(prefix.as_str()) {
                return Ok(Destination {
                    kind,
                    physical_name: name.to_string(),
                });
            }
        }
        Err(malformed!("destination {text:?} carries no known prefix"))
    }
}

#[derive(Debug, Default)]
struct StompState {
    client_id: Option<String>,
    connect_response_id: Option<i32>,
}

/// The STOMP wire format.
///
/// Commands that have no STOMP rendering marshal to nothing; when such a
/// command requires a response the format fabricates a positive local
/// `Response`, which the transport feeds back to the listener.
#[derive(Debug)]
pub struct StompFormat {
    prefixes: StompPrefixes,
    state: Mutex<StompState>,
}

impl Default for StompFormat {
    fn default() -> Self {
        Self::new(StompPrefixes::default())
    }
}

impl StompFormat {
    pub fn new(prefixes: StompPrefixes) -> Self {
        Self {
            prefixes,
            state: Mutex::new(StompState::default()),
        }
    }

    // --- marshalling ----------------------------------------------------

    fn marshal_message(&self, command: &Command, message: &Message) -> AmqResult<StompFrame> {
        let mut out = StompFrame::new(frame::SEND);
        let destination = message
            .destination
            .as_ref()
            .ok_or(AmqError::Invalid("message without a destination"))?;
        out.set_header(frame::HEADER_DESTINATION, &self.prefixes.encode(destination));
        if command.response_required {
            out.set_header(frame::HEADER_RECEIPT_REQUIRED, &command.command_id);
        }
        if let Some(correlation_id) = &message.correlation_id {
            out.set_header(frame::HEADER_CORRELATION_ID, correlation_id);
        }
        if message.expiration != 0 {
            out.set_header(frame::HEADER_EXPIRES, &message.expiration);
        }
        if message.persistent {
            out.set_header(frame::HEADER_PERSISTENT, "true");
        }
        if message.priority != DEFAULT_PRIORITY {
            out.set_header(frame::HEADER_PRIORITY, &message.priority);
        }
        if let Some(reply_to) = &message.reply_to {
            out.set_header(frame::HEADER_REPLY_TO, &self.prefixes.encode(reply_to));
        }
        if let Some(message_type) = &message.message_type {
            out.set_header(frame::HEADER_TYPE, message_type);
        }
        if let Some(transaction_id) = &message.transaction_id {
            out.set_header(frame::HEADER_TRANSACTION_ID, &transaction_id.to_string());
        }
        for (name, value) in message.properties().iter() {
            out.set_header(name, &value.to_string());
        }

        match message.body_text() {
            Ok(text) => {
                out.body = text.unwrap_or_default().as_bytes().to_vec();
            }
            Err(_) => {
                let bytes = message.body_bytes().map_err(|_| {
                    AmqError::Unsupported(
                        "only text and bytes messages can travel over STOMP".to_string(),
                    )
                })?;
                out.body = bytes.to_vec();
                let length = out.body.len();
                out.set_header(frame::HEADER_CONTENT_LENGTH, &length);
            }
        }
        Ok(out)
    }

    fn marshal_connection_info(
        &self,
        command: &Command,
        info: &crate::commands::ConnectionInfo,
    ) -> AmqResult<StompFrame> {
        let mut out = StompFrame::new(frame::CONNECT);
        if let Some(client_id) = &info.client_id {
            out.set_header(frame::HEADER_CLIENT_ID, client_id);
        }
        out.set_header(
            frame::HEADER_LOGIN,
            info.user_name.as_deref().unwrap_or_default(),
        );
        out.set_header(
            frame::HEADER_PASSCODE,
            info.password.as_deref().unwrap_or_default(),
        );
        let mut state = self.state.lock()?;
        state.connect_response_id = Some(command.command_id);
        state.client_id.clone_from(&info.client_id);
        Ok(out)
    }

    fn marshal_consumer_info(
        &self,
        command: &Command,
        info: &crate::commands::ConsumerInfo,
    ) -> AmqResult<StompFrame> {
        let mut out = StompFrame::new(frame::SUBSCRIBE);
        if command.response_required {
            out.set_header(frame::HEADER_RECEIPT_REQUIRED, &command.command_id);
        }
        let destination = info
            .destination
            .as_ref()
            .ok_or(AmqError::Invalid("subscription without a destination"))?;
        out.set_header(frame::HEADER_DESTINATION, &self.prefixes.encode(destination));
        // this id comes back in the MESSAGE frames as "subscription"
        out.set_header(frame::HEADER_ID, &info.consumer_id);

        if let Some(subscription_name) = &info.subscription_name {
            let state = self.state.lock()?;
            if state.client_id.as_deref() != Some(subscription_name.as_str()) {
                return Err(AmqError::Unsupported(format!(
                    "durable subscriptions require the subscription name to equal the client id \
                     (client id {:?}, subscription name {subscription_name:?})",
                    state.client_id
                )));
            }
            out.set_header(frame::HEADER_SUBSCRIPTION_NAME, subscription_name);
            // older brokers know this header only under its misspelled name
            out.set_header(frame::HEADER_OLD_SUBSCRIPTION_NAME, subscription_name);
        }
        if let Some(selector) = &info.selector {
            out.set_header(frame::HEADER_SELECTOR, selector);
        }
        out.set_header(frame::HEADER_ACK_MODE, "client");
        if info.no_local {
            out.set_header(frame::HEADER_NO_LOCAL, "true");
        }
        out.set_header(frame::HEADER_DISPATCH_ASYNC, &info.dispatch_async);
        if info.exclusive {
            out.set_header(frame::HEADER_EXCLUSIVE, "true");
        }
        out.set_header(
            frame::HEADER_MAX_PENDING_MSG_LIMIT,
            &info.maximum_pending_message_limit,
        );
        out.set_header(frame::HEADER_PREFETCH_SIZE, &info.prefetch_size);
        out.set_header(frame::HEADER_CONSUMER_PRIORITY, &info.priority);
        if info.retroactive {
            out.set_header(frame::HEADER_RETROACTIVE, "true");
        }
        Ok(out)
    }

    fn marshal_ack(
        &self,
        command: &Command,
        ack: &crate::commands::MessageAck,
    ) -> AmqResult<StompFrame> {
        let mut out = StompFrame::new(frame::ACK);
        if command.response_required {
            // a failed ack must not fail the request; answer it either way
            out.set_header(
                frame::HEADER_RECEIPT_REQUIRED,
                &format!("{}{}", frame::IGNORE_PREFIX, command.command_id),
            );
        }
        let message_id = ack
            .last_message_id
            .as_ref()
            .ok_or(AmqError::Invalid("ack without a message id"))?;
        out.set_header(frame::HEADER_MESSAGE_ID, message_id);
        if let Some(transaction_id) = &ack.transaction_id {
            out.set_header(frame::HEADER_TRANSACTION_ID, &transaction_id.to_string());
        }
        Ok(out)
    }

    fn marshal_transaction_info(
        &self,
        command: &Command,
        info: &TransactionInfo,
    ) -> AmqResult<StompFrame> {
        let command_name = match info.transaction_type {
            TransactionInfo::BEGIN => frame::BEGIN,
            TransactionInfo::COMMIT_ONE_PHASE => frame::COMMIT,
            TransactionInfo::ROLLBACK => frame::ABORT,
            other => {
                return Err(AmqError::Unsupported(format!(
                    "transaction operation {other} cannot travel over STOMP"
                )));
            }
        };
        let transaction_id = info
            .transaction_id
            .as_ref()
            .ok_or(AmqError::Invalid("transaction command without an id"))?;
        if transaction_id.is_xa() {
            return Err(AmqError::Unsupported(
                "XA transactions cannot travel over STOMP".to_string(),
            ));
        }
        let mut out = StompFrame::new(command_name);
        if command.response_required {
            out.set_header(frame::HEADER_RECEIPT_REQUIRED, &command.command_id);
        }
        out.set_header(frame::HEADER_TRANSACTION_ID, &transaction_id.to_string());
        Ok(out)
    }

    fn marshal_remove_info(
        &self,
        command: &Command,
        info: &crate::commands::RemoveInfo,
    ) -> AmqResult<Option<StompFrame>> {
        let DataStructure::ConsumerId(consumer_id) = &info.object_id else {
            // removing sessions or producers means nothing to STOMP
            return Ok(None);
        };
        let mut out = StompFrame::new(frame::UNSUBSCRIBE);
        if command.response_required {
            out.set_header(frame::HEADER_RECEIPT_REQUIRED, &command.command_id);
        }
        out.set_header(frame::HEADER_ID, consumer_id);
        Ok(Some(out))
    }

    fn marshal_remove_subscription(
        &self,
        command: &Command,
        info: &crate::commands::RemoveSubscriptionInfo,
    ) -> AmqResult<StompFrame> {
        let mut out = StompFrame::new(frame::UNSUBSCRIBE);
        if command.response_required {
            out.set_header(
                frame::HEADER_RECEIPT_REQUIRED,
                &format!("{}{}", frame::IGNORE_PREFIX, command.command_id),
            );
        }
        out.set_header(frame::HEADER_ID, &info.client_id);
        out.set_header(frame::HEADER_SUBSCRIPTION_NAME, &info.client_id);
        out.set_header(frame::HEADER_OLD_SUBSCRIPTION_NAME, &info.client_id);
        Ok(out)
    }

    // --- unmarshalling --------------------------------------------------

    fn unmarshal_message(&self, mut frame_in: StompFrame) -> AmqResult<Command> {
        let consumer_id = frame_in
            .remove_header(frame::HEADER_SUBSCRIPTION)
            .map(|s| parse_consumer_id(&s))
            .unwrap_or_default();

        let mut message = if let Some(_length) = frame_in.remove_header(frame::HEADER_CONTENT_LENGTH)
        {
            Message::bytes(std::mem::take(&mut frame_in.body))
        } else {
            let text = String::from_utf8(std::mem::take(&mut frame_in.body))
                .map_err(|_| malformed!("text body is not UTF-8"))?;
            Message::text(text)
        };

        if let Some(value) = frame_in.remove_header(frame::HEADER_DESTINATION) {
            message.destination = Some(self.prefixes.decode(&value)?);
        }
        if let Some(value) = frame_in.remove_header(frame::HEADER_MESSAGE_ID) {
            message.message_id = Some(parse_message_id(&value));
        }
        if let Some(value) = frame_in.remove_header(frame::HEADER_CORRELATION_ID) {
            message.correlation_id = Some(value);
        }
        if let Some(value) = frame_in.remove_header(frame::HEADER_EXPIRES) {
            message.expiration = value.parse().unwrap_or(0);
        }
        if let Some(value) = frame_in.remove_header(frame::HEADER_PRIORITY) {
            message.priority = value.parse().unwrap_or(DEFAULT_PRIORITY);
        }
        if let Some(value) = frame_in.remove_header(frame::HEADER_PERSISTENT) {
            message.persistent = value.parse().unwrap_or(false);
        }
        if let Some(value) = frame_in.remove_header(frame::HEADER_REDELIVERED) {
            if value.parse().unwrap_or(false) {
                message.redelivery_counter = 1;
            }
        }
        if let Some(value) = frame_in.remove_header(frame::HEADER_REPLY_TO) {
            message.reply_to = Some(self.prefixes.decode(&value)?);
        }
        if let Some(value) = frame_in.remove_header(frame::HEADER_TIMESTAMP) {
            message.timestamp = value.parse().unwrap_or(0);
        }
        if let Some(value) = frame_in.remove_header(frame::HEADER_TYPE) {
            message.message_type = Some(value);
        }
        frame_in.remove_header(frame::HEADER_TRANSACTION_ID);
        // whatever is left is a user property, string-typed
        for (name, value) in frame_in.headers() {
            message.set_property(name, value)?;
        }
        message.set_read_only(true);

        let destination = message.destination.clone();
        Ok(Command::new(CommandBody::MessageDispatch(Box::new(
            MessageDispatch {
                consumer_id,
                destination,
                redelivery_counter: message.redelivery_counter,
                message: Some(message),
            },
        ))))
    }

    fn unmarshal_receipt(frame_in: &StompFrame) -> AmqResult<Command> {
        let receipt_id = frame_in
            .header(frame::HEADER_RECEIPT_ID)
            .ok_or_else(|| malformed!("receipt without a receipt-id"))?;
        let receipt_id = receipt_id
            .strip_prefix(frame::IGNORE_PREFIX)
            .unwrap_or(receipt_id);
        Ok(Command::new(CommandBody::Response(Response {
            correlation_id: parse_correlation(receipt_id)?,
        })))
    }

    fn unmarshal_connected(&self) -> AmqResult<Command> {
        let correlation_id = self
            .state
            .lock()?
            .connect_response_id
            .ok_or_else(|| malformed!("CONNECTED without a pending CONNECT"))?;
        Ok(Command::new(CommandBody::Response(Response {
            correlation_id,
        })))
    }

    fn unmarshal_error(frame_in: &StompFrame) -> AmqResult<Command> {
        let message = frame_in
            .header(frame::HEADER_MESSAGE)
            .unwrap_or_default()
            .to_string();
        let error = BrokerError::new("Broker Error", message);

        match frame_in.header(frame::HEADER_RECEIPT_ID) {
            Some(receipt_id) => {
                // the sender asked for the outcome to be ignored: answer
                // positively in spite of the failure
                if let Some(ignored) = receipt_id.strip_prefix(frame::IGNORE_PREFIX) {
                    Ok(Command::new(CommandBody::Response(Response {
                        correlation_id: parse_correlation(ignored)?,
                    })))
                } else {
                    Ok(Command::new(CommandBody::ExceptionResponse(
                        ExceptionResponse {
                            correlation_id: parse_correlation(receipt_id)?,
                            exception: Some(error),
                        },
                    )))
                }
            }
            None => Ok(Command::new(CommandBody::ConnectionError(
                ConnectionError {
                    exception: Some(error),
                    connection_id: None,
                },
            ))),
        }
    }
}

fn parse_correlation(text: &str) -> AmqResult<i32> {
    text.parse()
        .map_err(|_| malformed!("unparseable correlation id {text:?}"))
}

// "connection:session:value"; anything else lands verbatim in the
// connection id with zeroed numeric parts.
fn parse_consumer_id(text: &str) -> ConsumerId {
    let mut parts = text.rsplitn(3, ':');
    let value = parts.next().and_then(|p| p.parse().ok());
    let session_id = parts.next().and_then(|p| p.parse().ok());
    match (parts.next(), session_id, value) {
        (Some(connection_id), Some(session_id), Some(value)) => ConsumerId {
            connection_id: connection_id.to_string(),
            session_id,
            value,
        },
        _ => ConsumerId {
            connection_id: text.to_string(),
            session_id: 0,
            value: 0,
        },
    }
}

// "connection:session:value:sequence"
fn parse_message_id(text: &str) -> MessageId {
    let mut parts = text.rsplitn(4, ':');
    let sequence = parts.next().and_then(|p| p.parse().ok());
    let value = parts.next().and_then(|p| p.parse().ok());
    let session_id = parts.next().and_then(|p| p.parse().ok());
    match (parts.next(), session_id, value, sequence) {
        (Some(connection_id), Some(session_id), Some(value), Some(sequence)) => MessageId {
            producer_id: ProducerId {
                connection_id: connection_id.to_string(),
                session_id,
                value,
            },
            producer_sequence_id: sequence,
            broker_sequence_id: 0,
        },
        _ => MessageId {
            producer_id: ProducerId {
                connection_id: text.to_string(),
                session_id: 0,
                value: 0,
            },
            producer_sequence_id: 0,
            broker_sequence_id: 0,
        },
    }
}

impl WireFormat for StompFormat {
    fn marshal(
        &self,
        command: &Command,
        w: &mut dyn std::io::Write,
    ) -> AmqResult<Option<Command>> {
        let frame_out = match &command.body {
            CommandBody::Message(message) => Some(self.marshal_message(command, message)?),
            CommandBody::RemoveInfo(info) => self.marshal_remove_info(command, info)?,
            CommandBody::ShutdownInfo => {
                let mut out = StompFrame::new(frame::DISCONNECT);
                if command.response_required {
                    out.set_header(frame::HEADER_RECEIPT_REQUIRED, &command.command_id);
                }
                Some(out)
            }
            CommandBody::MessageAck(ack) => Some(self.marshal_ack(command, ack)?),
            CommandBody::ConnectionInfo(info) => {
                Some(self.marshal_connection_info(command, info)?)
            }
            CommandBody::TransactionInfo(info) => {
                Some(self.marshal_transaction_info(command, info)?)
            }
            CommandBody::ConsumerInfo(info) => Some(self.marshal_consumer_info(command, info)?),
            CommandBody::RemoveSubscriptionInfo(info) => {
                Some(self.marshal_remove_subscription(command, info)?)
            }
            _ => None,
        };

        match frame_out {
            Some(frame_out) => {
                trace!("sending STOMP {} frame", frame_out.command);
                frame_out.to_stream(w)?;
                w.flush()?;
                Ok(None)
            }
            None => {
                // nothing to say to the broker; answer locally when the
                // caller expects a response
                if command.response_required {
                    Ok(Some(Command::new(CommandBody::Response(Response {
                        correlation_id: command.command_id,
                    }))))
                } else {
                    Ok(None)
                }
            }
        }
    }

    fn unmarshal(&self, r: &mut dyn std::io::Read) -> AmqResult<Command> {
        let frame_in = StompFrame::from_stream(r)?;
        trace!("received STOMP {} frame", frame_in.command);
        match frame_in.command.as_str() {
            frame::CONNECTED => self.unmarshal_connected(),
            frame::RECEIPT => Self::unmarshal_receipt(&frame_in),
            frame::ERROR => Self::unmarshal_error(&frame_in),
            frame::MESSAGE => self.unmarshal_message(frame_in),
            other => Err(malformed!("unexpected STOMP command {other:?}")),
        }
    }

    fn renegotiate(&self, _remote: &crate::commands::WireFormatInfo) -> AmqResult<()> {
        Err(AmqError::Unsupported(
            "STOMP has no wire format negotiation".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{ConnectionId, TransactionId};

    fn text_message(body: &str, destination: Destination) -> Message {
        let mut message = Message::text(body);
        message.destination = Some(destination);
        message
    }

    #[test]
    fn send_frame_matches_the_grammar() {
        let format = StompFormat::default();
        let mut message = text_message("hello", Destination::queue("Q"));
        message.set_property("count", 42_i32).unwrap();
        let mut buf = Vec::new();
        let fed_back = format
            .marshal(&Command::message(message), &mut buf)
            .unwrap();
        assert!(fed_back.is_none());
        assert_eq!(buf, b"SEND\ndestination:/queue/Q\ncount:42\n\nhello\0");
    }

    #[test]
    fn inbound_message_becomes_a_dispatch() {
        let format = StompFormat::default();
        let bytes: &[u8] = b"MESSAGE\nsubscription:1\ndestination:/queue/Q\nmessage-id:ID:x\ncount:42\n\nhello\0";
        let command = format.unmarshal(&mut &bytes[..]).unwrap();
        let CommandBody::MessageDispatch(dispatch) = &command.body else {
            panic!("expected a dispatch, got {command:?}");
        };
        // "1" is not one of our triple-encoded ids; it survives verbatim
        assert_eq!(dispatch.consumer_id.connection_id, "1");
        let message = dispatch.message.as_ref().unwrap();
        assert_eq!(
            message.destination,
            Some(Destination::queue("Q"))
        );
        assert_eq!(message.body_text().unwrap(), Some("hello"));
        assert_eq!(message.property("count").unwrap().to_i32().unwrap(), 42);
    }

    #[test]
    fn connect_connected_correlation() {
        let format = StompFormat::default();
        let mut command = Command::new(CommandBody::ConnectionInfo(
            crate::commands::ConnectionInfo {
                connection_id: ConnectionId::new("c1"),
                client_id: Some("client".to_string()),
                user_name: Some("user".to_string()),
                password: Some("pass".to_string()),
                ..crate::commands::ConnectionInfo::default()
            },
        ));
        command.command_id = 17;
        command.response_required = true;
        let mut buf = Vec::new();
        format.marshal(&command, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("CONNECT\n"));
        assert!(text.contains("client-id:client\n"));
        assert!(text.contains("login:user\n"));
        assert!(text.contains("passcode:pass\n"));

        let connected: &[u8] = b"CONNECTED\nsession:session-1\n\n\0";
        let response = format.unmarshal(&mut &connected[..]).unwrap();
        assert_eq!(response.correlation_id(), Some(17));
    }

    #[test]
    fn receipt_and_ignored_error() {
        let format = StompFormat::default();
        let receipt: &[u8] = b"RECEIPT\nreceipt-id:5\n\n\0";
        let response = format.unmarshal(&mut &receipt[..]).unwrap();
        assert_eq!(response.correlation_id(), Some(5));
        assert!(!response.is_exception_response());

        let ignored: &[u8] = b"ERROR\nreceipt-id:ignore:6\nmessage:nope\n\n\0";
        let response = format.unmarshal(&mut &ignored[..]).unwrap();
        assert_eq!(response.correlation_id(), Some(6));
        assert!(!response.is_exception_response());

        let hard: &[u8] = b"ERROR\nreceipt-id:7\nmessage:denied\n\n\0";
        let response = format.unmarshal(&mut &hard[..]).unwrap();
        assert_eq!(response.correlation_id(), Some(7));
        assert!(response.is_exception_response());
    }

    #[test]
    fn unmappable_command_with_receipt_is_answered_locally() {
        let format = StompFormat::default();
        let mut command = Command::new(CommandBody::SessionInfo(crate::commands::SessionInfo {
            session_id: crate::commands::SessionId {
                connection_id: "c1".to_string(),
                value: 1,
            },
        }));
        command.command_id = 9;
        command.response_required = true;
        let mut buf = Vec::new();
        let fed_back = format.marshal(&command, &mut buf).unwrap().unwrap();
        assert!(buf.is_empty());
        assert_eq!(fed_back.correlation_id(), Some(9));
    }

    #[test]
    fn durable_subscription_requires_matching_client_id() {
        let format = StompFormat::default();
        // connect as "client"
        let connect = Command::new(CommandBody::ConnectionInfo(
            crate::commands::ConnectionInfo {
                connection_id: ConnectionId::new("c1"),
                client_id: Some("client".to_string()),
                ..crate::commands::ConnectionInfo::default()
            },
        ));
        format.marshal(&connect, &mut Vec::new()).unwrap();

        let consumer_id = ConsumerId {
            connection_id: "c1".to_string(),
            session_id: 1,
            value: 1,
        };
        let mut info =
            crate::commands::ConsumerInfo::new(consumer_id, Destination::topic("T"));
        info.subscription_name = Some("other-name".to_string());
        let subscribe = Command::new(CommandBody::ConsumerInfo(Box::new(info)));
        assert!(matches!(
            format.marshal(&subscribe, &mut Vec::new()),
            Err(AmqError::Unsupported(_))
        ));
    }

    #[test]
    fn consumer_and_message_ids_roundtrip() {
        let id = ConsumerId {
            connection_id: "ID:conn-1".to_string(),
            session_id: 2,
            value: 3,
        };
        assert_eq!(parse_consumer_id(&id.to_string()), id);

        let message_id = MessageId {
            producer_id: ProducerId {
                connection_id: "ID:conn-1".to_string(),
                session_id: 2,
                value: 3,
            },
            producer_sequence_id: 99,
            broker_sequence_id: 0,
        };
        assert_eq!(parse_message_id(&message_id.to_string()), message_id);
    }

    #[test]
    fn bytes_messages_carry_content_length() {
        let format = StompFormat::default();
        let mut message = Message::bytes(vec![1, 0, 2]);
        message.destination = Some(Destination::queue("B"));
        let mut buf = Vec::new();
        format.marshal(&Command::message(message), &mut buf).unwrap();
        let text = String::from_utf8_lossy(&buf);
        assert!(text.contains("content-length:3\n"));

        // and an inbound sized frame comes back as a bytes message
        let inbound: &[u8] = b"MESSAGE\nsubscription:1\ndestination:/queue/B\ncontent-length:3\n\n\x01\x00\x02\0";
        let command = format.unmarshal(&mut &inbound[..]).unwrap();
        let CommandBody::MessageDispatch(dispatch) = &command.body else {
            panic!("expected dispatch");
        };
        assert_eq!(
            dispatch.message.as_ref().unwrap().body_bytes().unwrap(),
            &[1, 0, 2]
        );
    }

    #[test]
    fn transactions_map_to_begin_commit_abort() {
        let format = StompFormat::default();
        let tx = TransactionId::local("c1", 4);
        for (tx_type, expected) in [
            (TransactionInfo::BEGIN, "BEGIN"),
            (TransactionInfo::COMMIT_ONE_PHASE, "COMMIT"),
            (TransactionInfo::ROLLBACK, "ABORT"),
        ] {
            let command = Command::new(CommandBody::TransactionInfo(TransactionInfo::new(
                ConnectionId::new("c1"),
                tx.clone(),
                tx_type,
            )));
            let mut buf = Vec::new();
            format.marshal(&command, &mut buf).unwrap();
            let text = String::from_utf8(buf).unwrap();
            assert!(text.starts_with(expected));
            assert!(text.contains("transaction:TX:c1:4\n"));
        }
        // two-phase operations cannot be expressed
        let command = Command::new(CommandBody::TransactionInfo(TransactionInfo::new(
            ConnectionId::new("c1"),
            tx,
            TransactionInfo::PREPARE,
        )));
        assert!(matches!(
            format.marshal(&command, &mut Vec::new()),
            Err(AmqError::Unsupported(_))
        ));
    }
}
