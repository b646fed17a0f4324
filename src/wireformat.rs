//! Wire formats translate between [`Command`]s and framed bytes: the binary
//! OpenWire codec with its tight and loose encodings, and the textual STOMP
//! codec.

pub mod openwire;
pub mod stomp;

use crate::{AmqResult, commands::Command, commands::WireFormatInfo};

/// A codec between the command model and a byte stream.
///
/// Implementations carry per-direction state (cached-object tables, pending
/// correlation ids) behind their own locks, so one instance serves the
/// writer side and the reader thread concurrently.
pub trait WireFormat: Send + Sync + std::fmt::Debug {
    /// Writes one command as one frame and flushes.
    ///
    /// A format that cannot express the command may fabricate a local
    /// response instead; the transport delivers it to the listener as if it
    /// had arrived from the broker.
    fn marshal(&self, command: &Command, w: &mut dyn std::io::Write)
        -> AmqResult<Option<Command>>;

    /// Reads one frame and decodes it.
    fn unmarshal(&self, r: &mut dyn std::io::Read) -> AmqResult<Command>;

    /// True if this format requires the handshake the
    /// `WireFormatNegotiator` filter drives.
    fn has_negotiator(&self) -> bool {
        false
    }

    /// The handshake command advertising the local preferences.
    fn preferred_wire_format_info(&self) -> Option<Command> {
        None
    }

    /// Applies the option set negotiated against the peer's handshake.
    fn renegotiate(&self, remote: &WireFormatInfo) -> AmqResult<()>;

    /// Negotiated read-inactivity window in ms, 0 when disabled.
    fn max_inactivity_duration(&self) -> i64 {
        0
    }

    /// Negotiated delay before inactivity checking starts, in ms.
    fn max_inactivity_initial_delay(&self) -> i64 {
        0
    }
}
