mod test_utils;

use amqconnect::{
    BrokerUri, CompositeUri, Transport,
    commands::{Command, CommandBody, ConnectionControl},
    transport::{failover::FailoverTransport, mock},
};
use std::{sync::Arc, time::Duration};
use test_utils::CapturingListener;

#[test]
fn test_050_broker_initiated_rebalance() {
    let _log_handle = test_utils::init_logger();

    let composite = CompositeUri::parse(
        "failover://(mock://s5a:1?failOnCreate=true,mock://s5b:2?name=s5b)\
         ?randomize=false&initialReconnectDelay=50",
    )
    .unwrap();
    let failover = FailoverTransport::from_composite(&composite).unwrap();
    assert!(failover.config().update_uris_supported);
    let listener = Arc::new(CapturingListener::default());
    failover.set_listener(Some(listener.clone()));
    failover.start().unwrap();

    assert!(test_utils::wait_until(Duration::from_secs(10), || {
        failover.is_connected()
    }));
    assert_eq!(failover.connected_uri().unwrap().host(), "s5b");

    // the broker pushes a new pool and asks for a rebalance
    let active = mock::get("s5b").unwrap();
    active.inject(Command::new(CommandBody::ConnectionControl(
        ConnectionControl {
            rebalance_connection: true,
            reconnect_to: Some("mock://s5c:3?name=Reconnect".to_string()),
            ..ConnectionControl::default()
        },
    )));
    failover
        .remove_uris(true, &[BrokerUri::parse("mock://s5b:2").unwrap()])
        .unwrap();

    assert!(test_utils::wait_until(Duration::from_secs(20), || {
        failover
            .connected_uri()
            .is_some_and(|uri| uri.host() == "s5c")
    }));
    let reconnected = mock::get("Reconnect").unwrap();
    assert!(reconnected.is_connected());

    // the control command itself also reached the listener
    assert!(test_utils::wait_until(Duration::from_secs(5), || {
        listener
            .commands()
            .iter()
            .any(Command::is_connection_control)
    }));

    failover.close().unwrap();
}
