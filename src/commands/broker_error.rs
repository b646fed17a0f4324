use thiserror::Error;

/// An error reported by the broker, with the remote exception class, message
/// and (when stack traces are negotiated) the remote stack and cause chain.
#[derive(Clone, Debug, Default, PartialEq, Error)]
#[error("{exception_class}: {message}")]
pub struct BrokerError {
    pub exception_class: String,
    pub message: String,
    pub stack_trace: Vec<StackTraceElement>,
    pub cause: Option<Box<BrokerError>>,
}

impl BrokerError {
    pub fn new<C: Into<String>, M: Into<String>>(exception_class: C, message: M) -> Self {
        Self {
            exception_class: exception_class.into(),
            message: message.into(),
            stack_trace: Vec::new(),
            cause: None,
        }
    }
}

/// One frame of a remote stack trace.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StackTraceElement {
    pub class_name: String,
    pub method_name: String,
    pub file_name: String,
    pub line_number: i32,
}
