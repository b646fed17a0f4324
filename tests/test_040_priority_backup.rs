mod test_utils;

use amqconnect::{
    CompositeUri, Transport,
    transport::{failover::FailoverTransport, mock},
};
use std::{sync::Arc, time::Duration};
use test_utils::CapturingListener;

#[test]
fn test_040_priority_backup_migrates_when_the_preferred_broker_returns() {
    let _log_handle = test_utils::init_logger();

    // only the secondary is reachable at first
    mock::set_available("s4primary", false);

    let composite = CompositeUri::parse(
        "failover://(mock://s4secondary?name=s4sec,mock://s4primary?name=s4pri)\
         ?randomize=false&priorityBackup=true&priorityURIs=mock://s4primary\
         &initialReconnectDelay=50",
    )
    .unwrap();
    let failover = FailoverTransport::from_composite(&composite).unwrap();
    assert!(failover.config().priority_backup);
    failover.set_listener(Some(Arc::new(CapturingListener::default())));
    failover.start().unwrap();

    assert!(test_utils::wait_until(Duration::from_secs(10), || {
        failover.is_connected()
    }));
    assert!(!failover.is_connected_to_priority());
    assert_eq!(failover.connected_uri().unwrap().host(), "s4secondary");

    // the preferred broker comes back; one maintenance cycle later the
    // transport has migrated
    mock::set_available("s4primary", true);
    assert!(test_utils::wait_until(Duration::from_secs(10), || {
        failover.is_connected_to_priority()
    }));
    assert_eq!(failover.connected_uri().unwrap().host(), "s4primary");
    assert!(mock::get("s4pri").is_some());

    failover.close().unwrap();
    mock::set_available("s4primary", true);
}
