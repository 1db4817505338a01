use dnsreplay_domain::{DomainError, Query, Transport};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::fmt;
use std::io::{self, Read};
use std::net::{Shutdown, SocketAddr};
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;

const LENGTH_PREFIX: usize = 2;
const RECV_BUFFER: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Sending,
    Receiving,
    Closing,
    Success,
    Failed,
    ErrnoError,
    Aborted,
    Closed,
}

impl ConnectionState {
    /// States that wait on socket readiness.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting
                | ConnectionState::Sending
                | ConnectionState::Receiving
                | ConnectionState::Closing
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConnectionState::Success
                | ConnectionState::Failed
                | ConnectionState::ErrnoError
                | ConnectionState::Aborted
                | ConnectionState::Closed
        )
    }

    pub fn interest(&self) -> Option<Readiness> {
        match self {
            ConnectionState::Connecting | ConnectionState::Sending => Some(Readiness::Writable),
            ConnectionState::Receiving | ConnectionState::Closing => Some(Readiness::Readable),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::New => "new",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Sending => "sending",
            ConnectionState::Receiving => "receiving",
            ConnectionState::Closing => "closing",
            ConnectionState::Success => "success",
            ConnectionState::Failed => "failed",
            ConnectionState::ErrnoError => "errno",
            ConnectionState::Aborted => "aborted",
            ConnectionState::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Readable,
    Writable,
}

/// Result of driving a connection synchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Blocked until the socket reports this readiness.
    Pending(Readiness),
    /// The state needs attention from the engine.
    Ready,
}

/// What an I/O error means for the connection that hit it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoVerdict {
    WouldBlock,
    Interrupted,
    /// Refused or unreachable: the target said no.
    Failed,
    Errno(i32),
}

pub fn classify_error(err: &io::Error) -> IoVerdict {
    match err.kind() {
        io::ErrorKind::WouldBlock => return IoVerdict::WouldBlock,
        io::ErrorKind::Interrupted => return IoVerdict::Interrupted,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset => {
            return IoVerdict::Failed
        }
        _ => {}
    }
    match err.raw_os_error() {
        Some(code) if code == libc::EAGAIN || code == libc::EWOULDBLOCK => IoVerdict::WouldBlock,
        Some(code) if code == libc::ENETUNREACH || code == libc::EHOSTUNREACH => IoVerdict::Failed,
        Some(code) => IoVerdict::Errno(code),
        None => IoVerdict::Errno(libc::EIO),
    }
}

struct Core {
    query: Query,
    transport: Transport,
    peer: Option<SockAddr>,
    state: ConnectionState,
    skip_reply: bool,
    established: bool,
    prefix: [u8; LENGTH_PREFIX],
    prefix_sent: usize,
    sent: usize,
    bytes_sent: u64,
    bytes_received: u64,
    errno: Option<i32>,
    uses: u32,
}

impl Core {
    /// Applies a non-retryable error.
    fn fail(&mut self, err: &io::Error) {
        match classify_error(err) {
            IoVerdict::Failed => self.state = ConnectionState::Failed,
            IoVerdict::Errno(code) => self.set_errno(code),
            IoVerdict::WouldBlock | IoVerdict::Interrupted => {
                self.set_errno(err.raw_os_error().unwrap_or(libc::EAGAIN))
            }
        }
    }

    fn set_errno(&mut self, code: i32) {
        self.errno = Some(code);
        self.state = ConnectionState::ErrnoError;
    }

    /// Maps an error from a read or write. Only `WouldBlock` is returned to
    /// the caller, everything else settles the state.
    fn io_error(&mut self, err: io::Error) -> io::Result<()> {
        if classify_error(&err) == IoVerdict::WouldBlock {
            return Err(err);
        }
        self.fail(&err);
        Ok(())
    }

    fn on_writable(&mut self, socket: &Socket) -> io::Result<()> {
        match self.state {
            ConnectionState::Connecting => self.finish_connect(socket),
            ConnectionState::Sending => self.flush(socket),
            _ => Ok(()),
        }
    }

    fn on_readable(&mut self, socket: &Socket) -> io::Result<()> {
        match self.state {
            ConnectionState::Receiving => self.receive(socket),
            ConnectionState::Closing => self.drain(socket),
            _ => Ok(()),
        }
    }

    fn finish_connect(&mut self, socket: &Socket) -> io::Result<()> {
        match socket.take_error() {
            Ok(Some(err)) | Err(err) => {
                self.fail(&err);
                Ok(())
            }
            Ok(None) => match socket.peer_addr() {
                Ok(_) => {
                    self.established = true;
                    self.state = ConnectionState::Connected;
                    Ok(())
                }
                // woken before the handshake finished
                Err(e) if e.raw_os_error() == Some(libc::ENOTCONN) => {
                    Err(io::ErrorKind::WouldBlock.into())
                }
                Err(e) => {
                    self.fail(&e);
                    Ok(())
                }
            },
        }
    }

    fn begin_send(&mut self) {
        self.prefix = (self.query.len() as u16).to_be_bytes();
        self.prefix_sent = if self.transport.is_stream() {
            0
        } else {
            LENGTH_PREFIX
        };
        self.sent = 0;
        self.state = ConnectionState::Sending;
    }

    fn flush(&mut self, socket: &Socket) -> io::Result<()> {
        while self.prefix_sent < LENGTH_PREFIX {
            match socket.send(&self.prefix[self.prefix_sent..]) {
                Ok(0) => return self.io_error(io::ErrorKind::WriteZero.into()),
                Ok(n) => {
                    self.prefix_sent += n;
                    self.bytes_sent += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return self.io_error(e),
            }
        }

        let total = self.query.len();
        while self.sent < total {
            let buf = &self.query.bytes()[self.sent..];
            let result = match (&self.peer, self.transport) {
                (Some(peer), Transport::Udp) => socket.send_to(buf, peer),
                _ => socket.send(buf),
            };
            match result {
                Ok(0) => return self.io_error(io::ErrorKind::WriteZero.into()),
                Ok(n) => {
                    // datagrams go out whole or not at all
                    self.sent = if self.transport.is_stream() {
                        self.sent + n
                    } else {
                        total
                    };
                    self.bytes_sent += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return self.io_error(e),
            }
        }

        self.state = if self.skip_reply {
            ConnectionState::Success
        } else {
            ConnectionState::Receiving
        };
        Ok(())
    }

    fn receive(&mut self, socket: &Socket) -> io::Result<()> {
        let mut buf = [0u8; RECV_BUFFER];
        let mut reader = socket;
        loop {
            match reader.read(&mut buf) {
                Ok(n) => {
                    self.bytes_received += n as u64;
                    self.state = ConnectionState::Success;
                    return Ok(());
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return self.io_error(e),
            }
        }
    }

    /// Reads until the peer closes its side.
    fn drain(&mut self, socket: &Socket) -> io::Result<()> {
        let mut buf = [0u8; 4096];
        let mut reader = socket;
        loop {
            match reader.read(&mut buf) {
                Ok(0) => {
                    self.state = ConnectionState::Closed;
                    return Ok(());
                }
                Ok(n) => self.bytes_received += n as u64,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Err(e),
                Err(_) => {
                    self.state = ConnectionState::Closed;
                    return Ok(());
                }
            }
        }
    }
}

/// One socket carrying one query to the target.
///
/// All methods are non-blocking. Whenever a socket call would block the state
/// is left untouched and a [`Progress::Pending`] tells the caller which
/// readiness to wait for; [`Connection::drive`] does that waiting.
pub struct Connection {
    io: Option<AsyncFd<Socket>>,
    core: Core,
}

impl Connection {
    pub fn new(query: Query, transport: Transport, skip_reply: bool) -> Result<Self, DomainError> {
        if !query.has_raw() {
            return Err(DomainError::MissingPayload);
        }
        Ok(Self {
            io: None,
            core: Core {
                query,
                transport,
                peer: None,
                state: ConnectionState::New,
                skip_reply,
                established: false,
                prefix: [0; LENGTH_PREFIX],
                prefix_sent: 0,
                sent: 0,
                bytes_sent: 0,
                bytes_received: 0,
                errno: None,
                uses: 1,
            },
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.core.state
    }

    pub fn transport(&self) -> Transport {
        self.core.transport
    }

    pub fn query(&self) -> &Query {
        &self.core.query
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.core.peer.as_ref().and_then(SockAddr::as_socket)
    }

    pub fn errno(&self) -> Option<i32> {
        self.core.errno
    }

    pub fn last_error(&self) -> Option<io::Error> {
        self.core.errno.map(io::Error::from_raw_os_error)
    }

    pub fn bytes_sent(&self) -> u64 {
        self.core.bytes_sent
    }

    pub fn bytes_received(&self) -> u64 {
        self.core.bytes_received
    }

    /// Returns the byte counters and resets them to zero.
    pub fn take_io_counters(&mut self) -> (u64, u64) {
        let counters = (self.core.bytes_sent, self.core.bytes_received);
        self.core.bytes_sent = 0;
        self.core.bytes_received = 0;
        counters
    }

    /// Number of queries this socket has carried.
    pub fn uses(&self) -> u32 {
        self.core.uses
    }

    pub fn is_reusable(&self) -> bool {
        self.core.state == ConnectionState::Success
            && !self.core.transport.is_stream()
            && self.io.is_some()
    }

    fn progress(&self) -> Progress {
        match self.core.state.interest() {
            Some(readiness) => Progress::Pending(readiness),
            None => Progress::Ready,
        }
    }

    /// Opens the socket and connects it to `target`.
    ///
    /// Datagram sockets are connected synchronously. Stream sockets usually
    /// end up `Connecting` and complete once writable.
    pub fn connect(&mut self, target: SocketAddr) -> Progress {
        if self.core.state != ConnectionState::New {
            return self.progress();
        }

        let socket = match open_socket(self.core.transport, target) {
            Ok(socket) => socket,
            Err(e) => {
                self.core.fail(&e);
                return Progress::Ready;
            }
        };

        let addr = SockAddr::from(target);
        let in_progress = match socket.connect(&addr) {
            Ok(()) => false,
            Err(e)
                if e.raw_os_error() == Some(libc::EINPROGRESS)
                    || e.kind() == io::ErrorKind::WouldBlock =>
            {
                true
            }
            Err(e) => {
                self.core.fail(&e);
                return Progress::Ready;
            }
        };

        match AsyncFd::with_interest(socket, Interest::READABLE | Interest::WRITABLE) {
            Ok(fd) => self.io = Some(fd),
            Err(e) => {
                self.core.fail(&e);
                return Progress::Ready;
            }
        }
        self.core.peer = Some(addr);

        if in_progress {
            self.core.state = ConnectionState::Connecting;
        } else {
            self.core.established = true;
            self.core.state = ConnectionState::Connected;
        }
        self.progress()
    }

    /// Starts writing the query. Only valid in `Connected`.
    pub fn send(&mut self) -> Progress {
        if self.core.state != ConnectionState::Connected {
            return self.progress();
        }
        let Some(io) = self.io.as_ref() else {
            self.core.set_errno(libc::EBADF);
            return Progress::Ready;
        };

        self.core.begin_send();
        match self.core.flush(io.get_ref()) {
            Ok(()) => self.progress(),
            Err(_) => Progress::Pending(Readiness::Writable),
        }
    }

    /// Attaches a new query to a finished datagram connection, keeping the
    /// socket. The query is handed back if the connection cannot be reused.
    pub fn reuse(&mut self, query: Query) -> Result<(), Query> {
        if !self.is_reusable() || !query.has_raw() {
            return Err(query);
        }
        self.core.query = query;
        self.core.prefix_sent = 0;
        self.core.sent = 0;
        self.core.errno = None;
        self.core.uses += 1;
        self.core.state = ConnectionState::Connected;
        Ok(())
    }

    /// Starts a graceful close.
    ///
    /// Established streams shut down their write half and wait for the peer
    /// to close; everything else closes at once.
    pub fn close(&mut self) -> Progress {
        match self.core.state {
            ConnectionState::Closed | ConnectionState::Closing => return self.progress(),
            _ => {}
        }

        let mut linger = false;
        if let Some(io) = self.io.as_ref() {
            if self.core.transport.is_stream() && self.core.established {
                match io.get_ref().shutdown(Shutdown::Write) {
                    Ok(()) => {
                        self.core.state = ConnectionState::Closing;
                        linger = self.core.drain(io.get_ref()).is_err();
                    }
                    Err(_) => self.core.state = ConnectionState::Closed,
                }
            } else {
                self.core.state = ConnectionState::Closed;
            }
        } else {
            self.core.state = ConnectionState::Closed;
        }

        if !linger {
            self.io = None;
        }
        self.progress()
    }

    /// Forcibly stops a busy connection and releases its socket.
    pub fn abort(&mut self) {
        if self.core.state.is_busy() {
            self.core.state = ConnectionState::Aborted;
            self.io = None;
        }
    }

    pub fn into_query(self) -> Query {
        self.core.query
    }

    /// Waits for readiness and advances the connection until it no longer
    /// waits on the socket.
    ///
    /// Dropping the future between readiness events leaves the connection
    /// in its last state, so a caller may race it against a timer and
    /// [`Connection::abort`] it afterwards.
    pub async fn drive(&mut self) {
        while let Some(readiness) = self.core.state.interest() {
            let Some(io) = self.io.as_ref() else {
                self.core.set_errno(libc::EBADF);
                break;
            };
            let core = &mut self.core;

            // socket errors such as a refused datagram only raise ERROR
            let interest = match readiness {
                Readiness::Writable => Interest::WRITABLE | Interest::ERROR,
                Readiness::Readable => Interest::READABLE | Interest::ERROR,
            };
            let ready = io.ready(interest).await;
            let mut guard = match ready {
                Ok(guard) => guard,
                Err(e) => {
                    core.fail(&e);
                    break;
                }
            };

            let result = guard.try_io(|fd| match readiness {
                Readiness::Writable => core.on_writable(fd.get_ref()),
                Readiness::Readable => core.on_readable(fd.get_ref()),
            });
            if let Ok(Err(e)) = result {
                core.fail(&e);
            }
        }

        if self.core.state == ConnectionState::Closed {
            self.io = None;
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("transport", &self.core.transport)
            .field("state", &self.core.state)
            .field("peer", &self.peer())
            .field("len", &self.core.query.len())
            .field("errno", &self.core.errno)
            .finish()
    }
}

fn open_socket(transport: Transport, target: SocketAddr) -> io::Result<Socket> {
    let (ty, protocol) = match transport {
        Transport::Udp => (Type::DGRAM, Protocol::UDP),
        Transport::Tcp => (Type::STREAM, Protocol::TCP),
    };
    let socket = Socket::new(Domain::for_address(target), ty, Some(protocol))?;
    socket.set_nonblocking(true)?;
    if transport.is_stream() {
        socket.set_tcp_nodelay(true)?;
    }
    Ok(socket)
}
