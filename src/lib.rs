//! A client library for ActiveMQ-compatible message brokers.
//!
//! The crate implements the conversation between application code and a
//! broker as an exchange of [`Command`](commands::Command)s over a layered
//! transport stack:
//!
//! * the OpenWire binary codec with its tight and loose encodings, the
//!   cached-object protocol and version negotiation
//!   ([`wireformat::openwire`]),
//! * the STOMP text codec ([`wireformat::stomp`]),
//! * a transport pipeline of composable filters — keep-alive supervision,
//!   handshake negotiation, write serialization, request/response
//!   correlation — over a socket-owning I/O transport ([`transport`]),
//! * a reconnecting failover transport multiplexing over a pool of broker
//!   URIs, with backoff, backups, priority preference and tracked-state
//!   replay ([`transport::failover`]).
//!
//! The entry point is [`transport::factory::create`], which turns a broker
//! URI like `tcp://broker:61616` or
//! `failover://(tcp://a:61616,tcp://b:61616)?randomize=false` into a ready
//! transport stack.

#![deny(missing_debug_implementations)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[macro_use]
extern crate log;

mod amq_error;
mod codec;
pub mod commands;
pub mod conn;
pub mod transport;
pub mod wireformat;

pub use crate::amq_error::{AmqError, AmqResult};
pub use crate::conn::{BrokerUri, CompositeUri};
pub use crate::transport::{
    DefaultTransportListener, Transport, TransportListener, factory::create,
};

/// Default port of an OpenWire broker endpoint.
pub const DEFAULT_BROKER_PORT: u16 = 61_616;

/// Default port of a STOMP broker endpoint.
pub const DEFAULT_STOMP_PORT: u16 = 61_613;
