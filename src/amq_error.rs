use crate::commands::BrokerError;
use thiserror::Error;

/// A list specifying categories of [`AmqError`](crate::AmqError).
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AmqError {
    /// A frame could not be decoded from the wire.
    #[error("Malformed frame: {}", _0)]
    MalformedFrame(String),

    /// A frame exceeded the negotiated maximum frame size.
    #[error("Frame of {size} bytes exceeds the maximum of {max} bytes")]
    FrameTooLarge { size: u64, max: u64 },

    /// Nested-object marshalling exceeded the recursion limit.
    #[error("Marshalling recursion depth exceeds the limit of {}", _0)]
    FramingDepthExceeded(usize),

    /// Some error occured while decoding modified UTF-8.
    #[error("Some error occured while decoding modified UTF-8")]
    Cesu8,

    /// The wire format handshake did not complete in time.
    #[error("Wire format negotiation did not complete in time")]
    HandshakeTimeout,

    /// The peer went silent for longer than the negotiated inactivity window.
    #[error("Connection was inactive for too long")]
    InactivityTimeout,

    /// A request did not receive its response within the given timeout.
    #[error("Request timed out before a response arrived")]
    RequestTimedOut,

    /// An operation was attempted on a closed transport.
    #[error("Transport is closed")]
    Closed,

    /// A pending request was abandoned because the transport closed underneath it.
    #[error("Transport was closed while the request was pending")]
    TransportClosed,

    /// The failover transport ran out of reconnect attempts.
    #[error("No more brokers available to connect to")]
    NoMoreBrokers,

    /// A mutating operation was attempted on a read-only message body.
    #[error("Message body is in read-only mode")]
    MessageNotWritable,

    /// A reading operation was attempted on a write-only message body.
    #[error("Message body is in write-only mode")]
    MessageNotReadable,

    /// A message property could not be converted to the requested type.
    #[error("Invalid message property conversion: {}", _0)]
    MessageFormat(String),

    /// Error caused by an invalid argument.
    #[error("Invalid argument: {}", _0)]
    Invalid(&'static str),

    /// The requested operation is not supported by this wire format.
    #[error("Unsupported operation: {}", _0)]
    Unsupported(String),

    /// Erroneous broker URI.
    #[error("Erroneous broker URI")]
    Uri {
        /// The causing Error.
        #[from]
        source: url::ParseError,
    },

    /// Erroneous broker URI.
    #[error("Erroneous broker URI: {}", _0)]
    UriDetailed(String),

    /// The broker responded with an error.
    #[error("Broker responded with an error")]
    Broker {
        /// The causing Error.
        #[from]
        source: BrokerError,
    },

    /// TLS setup failed because the server name was not valid.
    #[error("TLS setup failed because the server name was not valid")]
    TlsInvalidDnsName {
        /// The causing Error.
        #[from]
        source: rustls::pki_types::InvalidDnsNameError,
    },

    /// TLS protocol error.
    #[error("TLS setup failed after establishing the TCP connection")]
    TlsProtocol {
        /// The causing Error.
        #[from]
        source: rustls::Error,
    },

    /// Error occured in communication with the broker.
    #[error(transparent)]
    Io {
        /// The causing Error.
        #[from]
        source: std::io::Error,
    },

    /// Error occured in thread synchronization.
    #[error("Error occured in thread synchronization")]
    Poison,

    /// Implementation error.
    #[error("Implementation error: {}", _0)]
    Impl(&'static str),

    /// Implementation error.
    #[error("Implementation error: {}", _0)]
    ImplDetailed(String),

    /// Error caused by wrong usage.
    #[error("Wrong usage: {}", _0)]
    Usage(&'static str),
}

/// Abbreviation of `Result<T, AmqError>`.
pub type AmqResult<T> = std::result::Result<T, AmqError>;

impl AmqError {
    /// Returns the contained `BrokerError`, if any.
    #[must_use]
    pub fn broker_error(&self) -> Option<&BrokerError> {
        match self {
            Self::Broker { source } => Some(source),
            _ => None,
        }
    }

    /// True if the error is fatal for the transport it occured on.
    ///
    /// Caller-level errors (timeouts, usage errors) leave the transport up;
    /// everything wire- or socket-related tears it down.
    #[must_use]
    pub fn is_fatal_to_transport(&self) -> bool {
        matches!(
            self,
            Self::Io { .. }
                | Self::MalformedFrame(_)
                | Self::FrameTooLarge { .. }
                | Self::FramingDepthExceeded(_)
                | Self::Cesu8
                | Self::HandshakeTimeout
                | Self::InactivityTimeout
        )
    }
}

impl<G> From<std::sync::PoisonError<G>> for AmqError {
    fn from(_error: std::sync::PoisonError<G>) -> Self {
        Self::Poison
    }
}

impl Clone for AmqError {
    // Listener fan-out hands the same failure to several observers; io::Error
    // is not Clone, so its kind and text are preserved instead.
    fn clone(&self) -> Self {
        match self {
            Self::MalformedFrame(s) => Self::MalformedFrame(s.clone()),
            Self::FrameTooLarge { size, max } => Self::FrameTooLarge {
                size: *size,
                max: *max,
            },
            Self::FramingDepthExceeded(d) => Self::FramingDepthExceeded(*d),
            Self::Cesu8 => Self::Cesu8,
            Self::HandshakeTimeout => Self::HandshakeTimeout,
            Self::InactivityTimeout => Self::InactivityTimeout,
            Self::RequestTimedOut => Self::RequestTimedOut,
            Self::Closed => Self::Closed,
            Self::TransportClosed => Self::TransportClosed,
            Self::NoMoreBrokers => Self::NoMoreBrokers,
            Self::MessageNotWritable => Self::MessageNotWritable,
            Self::MessageNotReadable => Self::MessageNotReadable,
            Self::MessageFormat(s) => Self::MessageFormat(s.clone()),
            Self::Invalid(s) => Self::Invalid(*s),
            Self::Unsupported(s) => Self::Unsupported(s.clone()),
            Self::Uri { source } => Self::Uri { source: *source },
            Self::UriDetailed(s) => Self::UriDetailed(s.clone()),
            Self::Broker { source } => Self::Broker {
                source: source.clone(),
            },
            Self::TlsInvalidDnsName { source: _ } => Self::TlsInvalidDnsName {
                source: rustls::pki_types::InvalidDnsNameError,
            },
            Self::TlsProtocol { source } => Self::TlsProtocol {
                source: source.clone(),
            },
            Self::Io { source } => Self::Io {
                source: std::io::Error::new(source.kind(), source.to_string()),
            },
            Self::Poison => Self::Poison,
            Self::Impl(s) => Self::Impl(*s),
            Self::ImplDetailed(s) => Self::ImplDetailed(s.clone()),
            Self::Usage(s) => Self::Usage(*s),
        }
    }
}

macro_rules! impl_err {
    ($($arg:tt)*) => {
        $crate::AmqError::ImplDetailed(format!($($arg)*))
    };
}
pub(crate) use impl_err;

macro_rules! malformed {
    ($($arg:tt)*) => {
        $crate::AmqError::MalformedFrame(format!($($arg)*))
    };
}
pub(crate) use malformed;
