mod test_utils;

use amqconnect::{AmqError, Transport};
use std::time::{Duration, Instant};

#[test]
fn test_020_request_timeout_leaves_the_transport_up() {
    let _log_handle = test_utils::init_logger();

    // a broker that never answers
    let transport = amqconnect::create("mock://localhost:61616?noResponse=true").unwrap();
    transport.set_listener(Some(std::sync::Arc::new(
        amqconnect::DefaultTransportListener,
    )));
    transport.start().unwrap();

    let started = Instant::now();
    let outcome = transport.request(
        test_utils::connection_info("ID:timeout-test"),
        Some(Duration::from_millis(500)),
    );
    let elapsed = started.elapsed();

    assert!(matches!(outcome, Err(AmqError::RequestTimedOut)));
    assert!(elapsed >= Duration::from_millis(450));
    assert!(elapsed < Duration::from_secs(5));
    assert!(transport.is_connected(), "a timeout is local to the caller");

    // and the next request still works once the broker answers
    transport.close().unwrap();
}
