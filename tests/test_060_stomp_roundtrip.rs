mod test_utils;

use amqconnect::{
    Transport,
    commands::{Command, CommandBody, Destination, Message},
};
use std::{
    io::{Read, Write},
    net::TcpListener,
    sync::Arc,
    time::Duration,
};
use test_utils::CapturingListener;

// An in-process peer that speaks just enough STOMP for the scenario: it
// asserts the SEND frame byte for byte, then delivers a MESSAGE frame.
fn spawn_stomp_peer(listener: TcpListener) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut frame = Vec::new();
        let mut byte = [0_u8; 1];
        loop {
            stream.read_exact(&mut byte).unwrap();
            frame.push(byte[0]);
            if byte[0] == 0 {
                break;
            }
        }
        assert_eq!(
            frame,
            b"SEND\ndestination:/queue/Q\ncount:42\n\nhello\0",
            "frame was {:?}",
            String::from_utf8_lossy(&frame)
        );

        stream
            .write_all(
                b"MESSAGE\nsubscription:1\ndestination:/queue/Q\n\
                  message-id:ID:x:1:1:1\ncount:42\n\nhello\0",
            )
            .unwrap();
        stream.flush().unwrap();
        // wait for the client to hang up
        let _ = stream.read(&mut [0_u8; 16]);
    })
}

#[test]
fn test_060_stomp_text_message_roundtrip_over_tcp() {
    let _log_handle = test_utils::init_logger();

    let socket = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = socket.local_addr().unwrap().port();
    let peer = spawn_stomp_peer(socket);

    let transport =
        amqconnect::create(&format!("tcp://127.0.0.1:{port}?wireFormat=stomp")).unwrap();
    let listener = Arc::new(CapturingListener::default());
    transport.set_listener(Some(listener.clone()));
    transport.start().unwrap();

    let mut message = Message::text("hello");
    message.destination = Some(Destination::queue("Q"));
    message.set_property("count", 42_i32).unwrap();
    transport.one_way(Command::message(message)).unwrap();

    assert!(test_utils::wait_until(Duration::from_secs(10), || {
        listener.command_count() == 1
    }));
    let received = listener.commands();
    let CommandBody::MessageDispatch(dispatch) = &received[0].body else {
        panic!("expected a dispatch, got {:?}", received[0]);
    };
    assert_eq!(dispatch.consumer_id.connection_id, "1");
    let message = dispatch.message.as_ref().unwrap();
    assert_eq!(message.destination, Some(Destination::queue("Q")));
    assert_eq!(message.body_text().unwrap(), Some("hello"));
    assert_eq!(message.property("count").unwrap().to_i32().unwrap(), 42);
    assert!(message.message_id.is_some());

    transport.close().unwrap();
    peer.join().unwrap();
}
