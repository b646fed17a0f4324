//! The STOMP text codec: frame grammar plus the mapping between frames and
//! the internal command model.

pub(crate) mod frame;
mod stomp_format;

pub use stomp_format::{StompFormat, StompPrefixes};
