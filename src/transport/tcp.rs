//! Blocking TCP byte streams, plain or TLS, split into a reader half for the
//! read loop and a writer half for callers.

use crate::{AmqResult, conn::BrokerUri};
use rustls::{ClientConnection, pki_types::ServerName};
use std::{
    io::{Read, Write},
    net::{Shutdown, TcpStream},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

pub(crate) struct TcpConnection {
    reader: Option<Box<dyn Read + Send>>,
    writer: Box<dyn Write + Send>,
    control: TcpStream,
    remote: String,
}

impl std::fmt::Debug for TcpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "TcpConnection {{ remote: {:?}, .. }}", self.remote)
    }
}

impl TcpConnection {
    // A buffered plain tcp connection.
    pub fn connect(uri: &BrokerUri) -> AmqResult<Self> {
        let start = Instant::now();
        trace!("connecting to {}", uri.addr());
        let stream = connect_stream(uri)?;
        let connection = Self {
            reader: Some(Box::new(std::io::BufReader::new(stream.try_clone()?))),
            writer: Box::new(std::io::BufWriter::new(stream.try_clone()?)),
            control: stream,
            remote: uri.to_string(),
        };
        trace!(
            "plain connection to {} is initialized ({} µs)",
            uri.addr(),
            Instant::now().duration_since(start).as_micros(),
        );
        Ok(connection)
    }

    // A tcp connection with TLS layered on top.
    //
    // One rustls session serves both directions. The reader half pulls raw
    // bytes from its own socket clone without holding the session lock, and
    // only takes it to feed the records in; the writer half takes it for the
    // duration of one write. That keeps a blocked socket read from ever
    // starving writers.
    pub fn connect_ssl(uri: &BrokerUri) -> AmqResult<Self> {
        trace!("connecting with TLS to {}", uri.addr());
        let stream = connect_stream(uri)?;
        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let config = rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();
        let server_name = ServerName::try_from(uri.host().to_string())?;
        let session = Arc::new(Mutex::new(ClientConnection::new(
            Arc::new(config),
            server_name,
        )?));

        Ok(Self {
            reader: Some(Box::new(SslReader {
                session: Arc::clone(&session),
                socket: stream.try_clone()?,
                plaintext: Vec::new(),
                pos: 0,
            })),
            writer: Box::new(SslWriter {
                session,
                socket: stream.try_clone()?,
            }),
            control: stream,
            remote: uri.to_string(),
        })
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    // Hands the reader half to the read loop; can be taken once.
    pub fn take_reader(&mut self) -> Option<Box<dyn Read + Send>> {
        self.reader.take()
    }

    pub fn writer(&mut self) -> &mut (dyn Write + Send) {
        &mut *self.writer
    }

    // Unblocks a reader stuck in a blocking read.
    pub fn shutdown_input(&self) -> std::io::Result<()> {
        self.control.shutdown(Shutdown::Read)
    }

    pub fn shutdown_output(&self) -> std::io::Result<()> {
        self.control.shutdown(Shutdown::Write)
    }
}

fn connect_stream(uri: &BrokerUri) -> AmqResult<TcpStream> {
    let connect_timeout = uri.i64_option("connectionTimeout", 30_000);
    let addrs: Vec<_> = {
        use std::net::ToSocketAddrs;
        uri.addr().to_socket_addrs()?.collect()
    };
    let addr = addrs
        .first()
        .ok_or_else(|| crate::AmqError::UriDetailed(format!("{} does not resolve", uri.addr())))?;
    let stream = if connect_timeout > 0 {
        TcpStream::connect_timeout(addr, Duration::from_millis(connect_timeout.unsigned_abs()))?
    } else {
        TcpStream::connect(addr)?
    };
    stream.set_nodelay(uri.bool_option("tcpNoDelay", true))?;
    let so_timeout = uri.i64_option("soTimeout", 0);
    if so_timeout > 0 {
        stream.set_read_timeout(Some(Duration::from_millis(so_timeout.unsigned_abs())))?;
    }
    Ok(stream)
}

struct SslReader {
    session: Arc<Mutex<ClientConnection>>,
    socket: TcpStream,
    plaintext: Vec<u8>,
    pos: usize,
}

impl Read for SslReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        loop {
            if self.pos < self.plaintext.len() {
                let n = (self.plaintext.len() - self.pos).min(buf.len());
                buf[..n].copy_from_slice(&self.plaintext[self.pos..self.pos + n]);
                self.pos += n;
                if self.pos == self.plaintext.len() {
                    self.plaintext.clear();
                    self.pos = 0;
                }
                return Ok(n);
            }

            // raw socket read happens without the session lock
            let mut raw = [0_u8; 16 * 1024];
            let n = self.socket.read(&mut raw)?;
            if n == 0 {
                return Ok(0);
            }
            let mut session = self
                .session
                .lock()
                .map_err(|_| std::io::Error::other("TLS session lock poisoned"))?;
            let mut record_reader: &[u8] = &raw[..n];
            while !record_reader.is_empty() {
                session.read_tls(&mut record_reader)?;
                let state = session
                    .process_new_packets()
                    .map_err(std::io::Error::other)?;
                let available = state.plaintext_bytes_to_read();
                if available > 0 {
                    let start = self.plaintext.len();
                    self.plaintext.resize(start + available, 0);
                    session.reader().read_exact(&mut self.plaintext[start..])?;
                }
                // the handshake may want to answer immediately
                while session.wants_write() {
                    session.write_tls(&mut self.socket)?;
                }
            }
        }
    }
}

struct SslWriter {
    session: Arc<Mutex<ClientConnection>>,
    socket: TcpStream,
}

impl Write for SslWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| std::io::Error::other("TLS session lock poisoned"))?;
        let n = session.writer().write(buf)?;
        while session.wants_write() {
            session.write_tls(&mut self.socket)?;
        }
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| std::io::Error::other("TLS session lock poisoned"))?;
        session.writer().flush()?;
        while session.wants_write() {
            session.write_tls(&mut self.socket)?;
        }
        self.socket.flush()
    }
}
