//! The transport pipeline: the socket-owning I/O transport at the bottom,
//! composable filters above it, and the reconnecting failover transport on
//! top.

pub mod failover;
mod inactivity_monitor;
mod io_transport;
mod logging_transport;
pub mod mock;
mod mutex_transport;
mod response_correlator;
mod tcp;
mod wireformat_negotiator;

pub mod factory;

pub use inactivity_monitor::InactivityMonitor;
pub use io_transport::IoTransport;
pub use logging_transport::LoggingTransport;
pub use mutex_transport::MutexTransport;
pub use response_correlator::ResponseCorrelator;
pub use wireformat_negotiator::WireFormatNegotiator;

use crate::{AmqError, AmqResult, commands::Command};
use std::{sync::Arc, time::Duration};

/// One layer of the transport stack.
///
/// Filters wrap an inner transport behind the same interface and register
/// themselves as the inner transport's listener, so inbound commands climb
/// the stack one filter at a time.
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Fire-and-forget: writes one frame and returns once it is flushed.
    fn one_way(&self, command: Command) -> AmqResult<()>;

    /// Sends a command that requires a response and waits for it.
    ///
    /// Only the response correlator implements this; every other layer
    /// leaves the default in place.
    fn request(&self, _command: Command, _timeout: Option<Duration>) -> AmqResult<Command> {
        Err(AmqError::Unsupported(
            "request needs a response correlator in the stack".to_string(),
        ))
    }

    /// Starts the layer (and everything below it). Idempotent.
    fn start(&self) -> AmqResult<()>;

    /// Pauses inbound dispatch without closing anything.
    fn stop(&self) -> AmqResult<()>;

    /// Tears the stack down. Idempotent; pending requests fail once.
    fn close(&self) -> AmqResult<()>;

    /// Installs the listener receiving inbound commands and exceptions.
    fn set_listener(&self, listener: Option<Arc<dyn TransportListener>>);

    fn is_connected(&self) -> bool;

    fn is_closed(&self) -> bool;

    /// Descriptive peer address for logging.
    fn remote_address(&self) -> String;
}

/// Receives what a transport produces: inbound commands, failures, and the
/// failover transport's interrupted/resumed notifications.
///
/// Implementations must absorb their own errors; a listener callback has
/// nobody left to report to.
pub trait TransportListener: Send + Sync + std::fmt::Debug {
    fn on_command(&self, command: Command);

    fn on_exception(&self, error: AmqError);

    /// The failover transport lost its connection and is reconnecting.
    fn transport_interrupted(&self) {}

    /// The failover transport is connected again.
    fn transport_resumed(&self) {}
}

/// A listener that ignores everything; useful as a default and in tests.
#[derive(Debug, Default)]
pub struct DefaultTransportListener;

impl TransportListener for DefaultTransportListener {
    fn on_command(&self, _command: Command) {}

    fn on_exception(&self, error: AmqError) {
        debug!("unhandled transport exception: {error}");
    }
}
