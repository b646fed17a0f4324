// advisable because not all test modules use all functions of this module:
#![allow(dead_code)]

use amqconnect::{
    AmqError, TransportListener,
    commands::{
        Command, CommandBody, ConnectionId, ConnectionInfo, ConsumerId, ConsumerInfo, Destination,
        SessionId, SessionInfo,
    },
};
use flexi_logger::{Logger, LoggerHandle, opt_format};
use std::{
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

// Returns a logger that prints out all info, warn and error messages.
pub fn init_logger() -> LoggerHandle {
    Logger::try_with_env_or_str("info")
        .unwrap()
        .format(opt_format)
        .start()
        .unwrap_or_else(|e| panic!("Logger initialization failed with {e}"))
}

// Polls a condition until it holds or the timeout passes.
pub fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() > deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

pub fn connection_info(connection: &str) -> Command {
    Command::new(CommandBody::ConnectionInfo(ConnectionInfo::new(
        ConnectionId::new(connection),
    )))
}

pub fn session_info(connection: &str, value: i64) -> Command {
    Command::new(CommandBody::SessionInfo(SessionInfo {
        session_id: SessionId {
            connection_id: connection.to_string(),
            value,
        },
    }))
}

pub fn consumer_info(connection: &str, value: i64, destination: &str) -> Command {
    Command::new(CommandBody::ConsumerInfo(Box::new(ConsumerInfo::new(
        ConsumerId {
            connection_id: connection.to_string(),
            session_id: 1,
            value,
        },
        Destination::queue(destination),
    ))))
}

/// Collects everything a transport hands to its listener.
#[derive(Debug, Default)]
pub struct CapturingListener {
    commands: Mutex<Vec<Command>>,
    errors: Mutex<Vec<AmqError>>,
    interruptions: AtomicUsize,
    resumptions: AtomicUsize,
}

impl CapturingListener {
    pub fn commands(&self) -> Vec<Command> {
        self.commands.lock().unwrap().clone()
    }

    pub fn command_count(&self) -> usize {
        self.commands.lock().unwrap().len()
    }

    pub fn error_count(&self) -> usize {
        self.errors.lock().unwrap().len()
    }

    pub fn has_error<F: Fn(&AmqError) -> bool>(&self, predicate: F) -> bool {
        self.errors.lock().unwrap().iter().any(predicate)
    }

    pub fn interruptions(&self) -> usize {
        self.interruptions.load(Ordering::Acquire)
    }

    pub fn resumptions(&self) -> usize {
        self.resumptions.load(Ordering::Acquire)
    }
}

impl TransportListener for CapturingListener {
    fn on_command(&self, command: Command) {
        self.commands.lock().unwrap().push(command);
    }

    fn on_exception(&self, error: AmqError) {
        log::info!("listener observed: {error}");
        self.errors.lock().unwrap().push(error);
    }

    fn transport_interrupted(&self) {
        self.interruptions.fetch_add(1, Ordering::AcqRel);
    }

    fn transport_resumed(&self) {
        self.resumptions.fetch_add(1, Ordering::AcqRel);
    }
}
