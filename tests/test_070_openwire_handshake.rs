mod test_utils;

use amqconnect::{
    Transport,
    commands::{Command, CommandBody, Response},
    wireformat::{
        WireFormat,
        openwire::{OpenWireFormat, WireFormatOptions},
    },
};
use std::{
    io::{BufReader, Read},
    net::TcpListener,
    sync::Arc,
    time::Duration,
};
use test_utils::CapturingListener;

// An in-process peer running the real codec on the broker side: it performs
// the handshake, then answers the first request.
fn spawn_openwire_peer(listener: TcpListener) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let format = OpenWireFormat::new(WireFormatOptions::default());
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut writer = stream.try_clone().unwrap();

        // exchange wire format infos and negotiate
        let own_info = format.preferred_wire_format_info().unwrap();
        format.marshal(&own_info, &mut writer).unwrap();
        let client_info = format.unmarshal(&mut reader).unwrap();
        let CommandBody::WireFormatInfo(remote) = &client_info.body else {
            panic!("expected the handshake first, got {client_info:?}");
        };
        assert!(remote.is_valid());
        format.renegotiate(remote).unwrap();
        assert!(
            format.current().unwrap().tight_encoding_enabled,
            "both sides prefer tight encoding"
        );

        // first real command: the connection announcement, answered
        let request = format.unmarshal(&mut reader).unwrap();
        assert!(request.is_connection_info());
        assert!(request.response_required);
        format
            .marshal(
                &Command::new(CommandBody::Response(Response {
                    correlation_id: request.command_id,
                })),
                &mut writer,
            )
            .unwrap();

        // wait for the client to hang up
        let _ = stream.try_clone().unwrap().read(&mut [0_u8; 16]);
    })
}

#[test]
fn test_070_openwire_handshake_and_request() {
    let _log_handle = test_utils::init_logger();

    let socket = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = socket.local_addr().unwrap().port();
    let peer = spawn_openwire_peer(socket);

    let transport = amqconnect::create(&format!("tcp://127.0.0.1:{port}")).unwrap();
    let listener = Arc::new(CapturingListener::default());
    transport.set_listener(Some(listener.clone()));
    transport.start().unwrap();

    // the negotiator buffers this until the handshake is through
    let response = transport
        .request(
            test_utils::connection_info("ID:handshake-test"),
            Some(Duration::from_secs(10)),
        )
        .unwrap();
    assert!(response.is_response());
    assert!(!response.is_exception_response());

    transport.close().unwrap();
    peer.join().unwrap();
}
