mod test_utils;

use amqconnect::{
    Transport,
    commands::{Command, CommandBody, Message},
    transport::mock,
};
use std::{sync::Arc, time::Duration};

// Within one sender's sequence, frames reach the wire in submission order,
// even with several senders hammering the same stack.
#[test]
fn test_080_per_sender_order_is_preserved() {
    let _log_handle = test_utils::init_logger();

    let transport = amqconnect::create("mock://localhost:61616?name=s8").unwrap();
    transport.set_listener(Some(Arc::new(amqconnect::DefaultTransportListener)));
    transport.start().unwrap();

    const SENDERS: usize = 4;
    const PER_SENDER: i32 = 100;

    let mut workers = Vec::new();
    for sender in 0..SENDERS {
        let transport = Arc::clone(&transport);
        workers.push(std::thread::spawn(move || {
            for sequence in 0..PER_SENDER {
                let mut message = Message::text("ordered");
                message.group_id = Some(format!("sender-{sender}"));
                message.group_sequence = sequence;
                transport.one_way(Command::message(message)).unwrap();
            }
        }));
    }
    for worker in workers {
        worker.join().unwrap();
    }

    let broker = mock::get("s8").unwrap();
    assert!(test_utils::wait_until(Duration::from_secs(5), || {
        broker.outgoing().len() == SENDERS * PER_SENDER as usize
    }));

    // per sender, the observed group sequences must be strictly increasing
    let mut last_seen = vec![-1_i32; SENDERS];
    for command in broker.outgoing() {
        let CommandBody::Message(message) = &command.body else {
            panic!("unexpected command {command:?}");
        };
        let sender: usize = message
            .group_id
            .as_ref()
            .and_then(|g| g.strip_prefix("sender-"))
            .and_then(|s| s.parse().ok())
            .unwrap();
        assert!(
            message.group_sequence > last_seen[sender],
            "sender {sender} went backwards"
        );
        last_seen[sender] = message.group_sequence;
    }

    transport.close().unwrap();
}
