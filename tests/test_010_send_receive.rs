mod test_utils;

use amqconnect::{
    Transport,
    commands::{Command, CommandBody, Destination, Message, MessageDispatch, MessageId, ProducerId},
    transport::mock,
};
use std::{sync::Arc, time::Duration};
use test_utils::CapturingListener;

#[test]
fn test_010_send_and_receive_a_text_message() {
    let _log_handle = test_utils::init_logger();

    let transport = amqconnect::create("mock://localhost:61616?name=s1").unwrap();
    let listener = Arc::new(CapturingListener::default());
    transport.set_listener(Some(listener.clone()));
    transport.start().unwrap();

    // send
    let mut message = Message::text("TEST");
    message.destination = Some(Destination::temp_queue("RECEIVE.ME"));
    message.on_send();
    transport.one_way(Command::message(message)).unwrap();

    let broker = mock::get("s1").unwrap();
    let sent = broker.outgoing();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].is_message());
    assert!(sent[0].command_id > 0, "the correlator assigns ids");

    // the broker dispatches it back to a consumer
    let mut delivered = Message::text("TEST");
    delivered.destination = Some(Destination::temp_queue("RECEIVE.ME"));
    delivered.message_id = Some(MessageId {
        producer_id: ProducerId {
            connection_id: "ID:broker-1".to_string(),
            session_id: 1,
            value: 1,
        },
        producer_sequence_id: 1,
        broker_sequence_id: 1,
    });
    broker.inject(Command::new(CommandBody::MessageDispatch(Box::new(
        MessageDispatch {
            consumer_id: Default::default(),
            destination: delivered.destination.clone(),
            message: Some(delivered),
            redelivery_counter: 0,
        },
    ))));

    assert!(test_utils::wait_until(Duration::from_secs(5), || {
        listener.command_count() == 1
    }));
    let received = listener.commands();
    let CommandBody::MessageDispatch(dispatch) = &received[0].body else {
        panic!("expected a dispatch, got {:?}", received[0]);
    };
    let message = dispatch.message.as_ref().unwrap();
    assert_eq!(message.body_text().unwrap(), Some("TEST"));
    assert!(message.message_id.is_some());

    transport.close().unwrap();
}
