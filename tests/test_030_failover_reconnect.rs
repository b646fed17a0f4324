mod test_utils;

use amqconnect::{
    AmqError, CompositeUri, Transport,
    commands::{Command, CommandBody, Message, ProducerId, ProducerInfo},
    transport::{failover::FailoverTransport, mock},
};
use std::{sync::Arc, time::Duration};
use test_utils::CapturingListener;

#[test]
fn test_030_failover() {
    let _log_handle = test_utils::init_logger();
    reconnect_replays_tracked_commands();
    fail_on_create_gives_up_after_max_attempts();
    oneway_counts_through_failover();
}

// The scenario: connect past a dead broker, announce state, lose the
// connection, and watch the tracked state replay in order on the survivor.
fn reconnect_replays_tracked_commands() {
    let composite = CompositeUri::parse(
        "failover://(mock://s3a:1?failOnCreate=true,mock://s3b:2?name=s3b)\
         ?randomize=false&maxReconnectAttempts=20&initialReconnectDelay=50",
    )
    .unwrap();
    let failover = FailoverTransport::from_composite(&composite).unwrap();
    assert!(!failover.config().randomize);
    let listener = Arc::new(CapturingListener::default());
    failover.set_listener(Some(listener.clone()));
    failover.start().unwrap();

    assert!(test_utils::wait_until(Duration::from_secs(10), || {
        failover.is_connected()
    }));

    let announced = vec![
        test_utils::connection_info("ID:c1"),
        test_utils::session_info("ID:c1", 1),
        test_utils::session_info("ID:c1", 2),
        test_utils::session_info("ID:c1", 3),
        test_utils::consumer_info("ID:c1", 1, "QUEUE.A"),
        test_utils::consumer_info("ID:c1", 2, "QUEUE.B"),
    ];
    for command in &announced {
        failover.one_way(command.clone()).unwrap();
    }

    let first = mock::get("s3b").unwrap();
    assert!(test_utils::wait_until(Duration::from_secs(5), || {
        first.outgoing().len() == 6
    }));
    assert_bodies_match(&first.outgoing(), &announced);

    // kill the connection; the pool reconnects to the same survivor
    first.simulate_failure();
    assert!(test_utils::wait_until(Duration::from_secs(10), || {
        mock::get("s3b").is_some_and(|now| !Arc::ptr_eq(&now, &first)) && failover.is_connected()
    }));

    let second = mock::get("s3b").unwrap();
    assert!(test_utils::wait_until(Duration::from_secs(5), || {
        second.outgoing().len() >= 6
    }));
    // the six tracked commands replay first, in their submitted order
    assert_bodies_match(&second.outgoing()[..6], &announced);

    // post-reconnect traffic follows the replay
    failover
        .one_way(Command::new(CommandBody::ProducerInfo(ProducerInfo {
            producer_id: ProducerId {
                connection_id: "ID:c1".to_string(),
                session_id: 1,
                value: 1,
            },
            ..ProducerInfo::default()
        })))
        .unwrap();
    assert!(test_utils::wait_until(Duration::from_secs(5), || {
        second.outgoing().len() == 7
    }));
    assert!(second.outgoing()[6].is_producer_info());

    assert!(listener.interruptions() >= 1);
    assert!(listener.resumptions() >= 2);
    failover.close().unwrap();
}

fn fail_on_create_gives_up_after_max_attempts() {
    let composite = CompositeUri::parse(
        "failover://(mock://s3dead:1?failOnCreate=true)\
         ?useExponentialBackOff=false&maxReconnectAttempts=3&initialReconnectDelay=50",
    )
    .unwrap();
    let failover = FailoverTransport::from_composite(&composite).unwrap();
    assert_eq!(failover.config().max_reconnect_attempts, 3);
    let listener = Arc::new(CapturingListener::default());
    failover.set_listener(Some(listener.clone()));
    failover.start().unwrap();

    assert!(test_utils::wait_until(Duration::from_secs(10), || {
        listener.has_error(|e| matches!(e, AmqError::NoMoreBrokers))
    }));
    assert!(!failover.is_connected());

    // an untracked send now fails instead of blocking forever
    let outcome = failover.one_way(Command::message(Message::text("too late")));
    assert!(matches!(outcome, Err(AmqError::NoMoreBrokers)));

    failover.close().unwrap();
}

fn oneway_counts_through_failover() {
    let composite =
        CompositeUri::parse("failover://(mock://s3count:1?name=s3count)?randomize=false").unwrap();
    let failover = FailoverTransport::from_composite(&composite).unwrap();
    failover.set_listener(Some(Arc::new(CapturingListener::default())));
    failover.start().unwrap();
    assert!(test_utils::wait_until(Duration::from_secs(10), || {
        failover.is_connected()
    }));

    let broker = mock::get("s3count").unwrap();
    for _ in 0..100 {
        failover
            .one_way(Command::message(Message::text("ping")))
            .unwrap();
    }
    assert!(test_utils::wait_until(Duration::from_secs(5), || {
        broker.outgoing().len() == 100
    }));
    failover.close().unwrap();
}

fn assert_bodies_match(sent: &[Command], expected: &[Command]) {
    assert_eq!(sent.len(), expected.len());
    for (sent, expected) in sent.iter().zip(expected) {
        assert_eq!(sent.body, expected.body);
    }
}
