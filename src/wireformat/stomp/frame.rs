use crate::{AmqResult, amq_error::malformed};
use std::io::{Read, Write};

// frame commands
pub(crate) const CONNECT: &str = "CONNECT";
pub(crate) const SEND: &str = "SEND";
pub(crate) const SUBSCRIBE: &str = "SUBSCRIBE";
pub(crate) const UNSUBSCRIBE: &str = "UNSUBSCRIBE";
pub(crate) const BEGIN: &str = "BEGIN";
pub(crate) const COMMIT: &str = "COMMIT";
pub(crate) const ABORT: &str = "ABORT";
pub(crate) const ACK: &str = "ACK";
pub(crate) const DISCONNECT: &str = "DISCONNECT";
pub(crate) const CONNECTED: &str = "CONNECTED";
pub(crate) const MESSAGE: &str = "MESSAGE";
pub(crate) const RECEIPT: &str = "RECEIPT";
pub(crate) const ERROR: &str = "ERROR";

// header names
pub(crate) const HEADER_DESTINATION: &str = "destination";
pub(crate) const HEADER_CLIENT_ID: &str = "client-id";
pub(crate) const HEADER_LOGIN: &str = "login";
pub(crate) const HEADER_PASSCODE: &str = "passcode";
pub(crate) const HEADER_RECEIPT_REQUIRED: &str = "receipt";
pub(crate) const HEADER_RECEIPT_ID: &str = "receipt-id";
pub(crate) const HEADER_MESSAGE_ID: &str = "message-id";
pub(crate) const HEADER_CONTENT_LENGTH: &str = "content-length";
pub(crate) const HEADER_SUBSCRIPTION: &str = "subscription";
pub(crate) const HEADER_TRANSACTION_ID: &str = "transaction";
pub(crate) const HEADER_ID: &str = "id";
pub(crate) const HEADER_ACK_MODE: &str = "ack";
pub(crate) const HEADER_SELECTOR: &str = "selector";
pub(crate) const HEADER_NO_LOCAL: &str = "no-local";
pub(crate) const HEADER_EXCLUSIVE: &str = "activemq.exclusive";
pub(crate) const HEADER_PREFETCH_SIZE: &str = "activemq.prefetchSize";
pub(crate) const HEADER_CONSUMER_PRIORITY: &str = "activemq.priority";
pub(crate) const HEADER_RETROACTIVE: &str = "activemq.retroactive";
pub(crate) const HEADER_SUBSCRIPTION_NAME: &str = "activemq.subscriptionName";
pub(crate) const HEADER_OLD_SUBSCRIPTION_NAME: &str = "activemq.subcriptionName";
pub(crate) const HEADER_DISPATCH_ASYNC: &str = "activemq.dispatchAsync";
pub(crate) const HEADER_MAX_PENDING_MSG_LIMIT: &str = "activemq.maximumPendingMessageLimit";
pub(crate) const HEADER_CORRELATION_ID: &str = "correlation-id";
pub(crate) const HEADER_EXPIRES: &str = "expires";
pub(crate) const HEADER_PERSISTENT: &str = "persistent";
pub(crate) const HEADER_PRIORITY: &str = "priority";
pub(crate) const HEADER_REPLY_TO: &str = "reply-to";
pub(crate) const HEADER_TYPE: &str = "type";
pub(crate) const HEADER_TIMESTAMP: &str = "timestamp";
pub(crate) const HEADER_REDELIVERED: &str = "redelivered";
pub(crate) const HEADER_MESSAGE: &str = "message";

// Receipt ids carrying this prefix answer positively even when the broker
// reports a failure.
pub(crate) const IGNORE_PREFIX: &str = "ignore:";

/// One textual STOMP frame: command line, header lines, byte body.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct StompFrame {
    pub command: String,
    headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl StompFrame {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn set_header<V: ToString + ?Sized>(&mut self, name: &str, value: &V) {
        let value = value.to_string();
        if let Some(slot) = self
            .headers
            .iter_mut()
            .find_map(|(k, v)| (k == name).then_some(v))
        {
            *slot = value;
        } else {
            self.headers.push((name.to_string(), value));
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find_map(|(k, v)| (k == name).then_some(v.as_str()))
    }

    pub fn remove_header(&mut self, name: &str) -> Option<String> {
        let index = self.headers.iter().position(|(k, _)| k == name)?;
        Some(self.headers.remove(index).1)
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Writes `COMMAND LF (HEADER LF)* LF BODY NUL`.
    pub fn to_stream(&self, w: &mut dyn Write) -> AmqResult<()> {
        w.write_all(self.command.as_bytes())?;
        w.write_all(b"\n")?;
        for (name, value) in &self.headers {
            w.write_all(name.as_bytes())?;
            w.write_all(b":")?;
            w.write_all(value.as_bytes())?;
            w.write_all(b"\n")?;
        }
        w.write_all(b"\n")?;
        w.write_all(&self.body)?;
        w.write_all(b"\0")?;
        Ok(())
    }

    /// Reads one frame. Blank lines before the command line (heart-beats,
    /// the optional LF after a previous frame's NUL) are skipped; CR-LF line
    /// endings are accepted.
    pub fn from_stream(r: &mut dyn Read) -> AmqResult<Self> {
        let mut command = read_line(r)?;
        while command.is_empty() {
            command = read_line(r)?;
        }

        let mut frame = StompFrame::new(&command);
        loop {
            let line = read_line(r)?;
            if line.is_empty() {
                break;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| malformed!("header line without a colon: {line:?}"))?;
            frame.headers.push((name.to_string(), value.to_string()));
        }

        if let Some(length) = frame.header(HEADER_CONTENT_LENGTH) {
            let length: usize = length
                .parse()
                .map_err(|_| malformed!("unparseable content-length {length:?}"))?;
            let mut body = vec![0_u8; length];
            r.read_exact(&mut body)?;
            let nul = read_byte(r)?;
            if nul != 0 {
                return Err(malformed!("missing NUL after a sized body"));
            }
            frame.body = body;
        } else {
            let mut body = Vec::new();
            loop {
                let byte = read_byte(r)?;
                if byte == 0 {
                    break;
                }
                body.push(byte);
            }
            frame.body = body;
        }
        Ok(frame)
    }
}

fn read_byte(r: &mut dyn Read) -> AmqResult<u8> {
    let mut buf = [0_u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

// Reads up to LF, strips LF and an optional preceding CR.
fn read_line(r: &mut dyn Read) -> AmqResult<String> {
    let mut line = Vec::new();
    loop {
        let byte = read_byte(r)?;
        if byte == b'\n' {
            break;
        }
        line.push(byte);
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    String::from_utf8(line).map_err(|_| malformed!("frame line is not UTF-8"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_the_grammar() {
        let mut frame = StompFrame::new(SEND);
        frame.set_header(HEADER_DESTINATION, "/queue/Q");
        frame.set_header("count", "42");
        frame.body = b"hello".to_vec();
        let mut buf = Vec::new();
        frame.to_stream(&mut buf).unwrap();
        assert_eq!(buf, b"SEND\ndestination:/queue/Q\ncount:42\n\nhello\0");
    }

    #[test]
    fn roundtrip() {
        let mut frame = StompFrame::new(MESSAGE);
        frame.set_header(HEADER_DESTINATION, "/topic/T");
        frame.set_header(HEADER_MESSAGE_ID, "ID:x:1:1:1");
        frame.body = b"payload".to_vec();
        let mut buf = Vec::new();
        frame.to_stream(&mut buf).unwrap();
        let restored = StompFrame::from_stream(&mut &buf[..]).unwrap();
        assert_eq!(frame, restored);
    }

    #[test]
    fn skips_leading_blank_lines_and_accepts_crlf() {
        let bytes = b"\n\r\nRECEIPT\r\nreceipt-id:7\r\n\r\n\0";
        let frame = StompFrame::from_stream(&mut &bytes[..]).unwrap();
        assert_eq!(frame.command, RECEIPT);
        assert_eq!(frame.header(HEADER_RECEIPT_ID), Some("7"));
        assert!(frame.body.is_empty());
    }

    #[test]
    fn content_length_body_may_contain_nul() {
        let mut frame = StompFrame::new(SEND);
        frame.set_header(HEADER_CONTENT_LENGTH, "3");
        frame.body = vec![1, 0, 2];
        let mut buf = Vec::new();
        frame.to_stream(&mut buf).unwrap();
        let restored = StompFrame::from_stream(&mut &buf[..]).unwrap();
        assert_eq!(restored.body, vec![1, 0, 2]);
    }

    #[test]
    fn trailing_lf_after_nul_is_discarded_by_the_next_read() {
        let bytes = b"RECEIPT\nreceipt-id:1\n\n\0\nRECEIPT\nreceipt-id:2\n\n\0";
        let mut reader: &[u8] = bytes;
        let first = StompFrame::from_stream(&mut reader).unwrap();
        let second = StompFrame::from_stream(&mut reader).unwrap();
        assert_eq!(first.header(HEADER_RECEIPT_ID), Some("1"));
        assert_eq!(second.header(HEADER_RECEIPT_ID), Some("2"));
    }
}
