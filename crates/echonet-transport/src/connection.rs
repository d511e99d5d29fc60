use std::fmt;
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use echonet_frame::{CommonFrame, FrameConfig, FrameError, FrameReader, FrameWriter};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Result, SubnetError};
use crate::node::NodeInfo;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type CloseHook = Box<dyn Fn(&Connection) + Send + Sync>;

/// A bidirectional session with one remote node.
///
/// Each direction closes independently; the session is fully closed once
/// both directions are down, the remote end closes, or an I/O fault occurs.
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    id: u64,
    local: NodeInfo,
    remote: NodeInfo,
    outbound: bool,
    stream: TcpStream,
    reader: Mutex<FrameReader<TcpStream>>,
    writer: Mutex<FrameWriter<TcpStream>>,
    input_closed: AtomicBool,
    output_closed: AtomicBool,
    closed: AtomicBool,
    close_hooks: Mutex<Vec<CloseHook>>,
}

impl Connection {
    /// Wrap an established stream.
    pub fn from_stream(
        stream: TcpStream,
        local: NodeInfo,
        remote: NodeInfo,
        outbound: bool,
        config: FrameConfig,
    ) -> Result<Self> {
        stream.set_read_timeout(config.read_timeout)?;
        stream.set_write_timeout(config.write_timeout)?;
        stream.set_nodelay(true)?;
        let reader = FrameReader::with_config(stream.try_clone()?, config.clone());
        let writer = FrameWriter::with_config(stream.try_clone()?, config);

        let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
        debug!(id, %local, %remote, outbound, "session opened");

        Ok(Self {
            inner: Arc::new(ConnectionInner {
                id,
                local,
                remote,
                outbound,
                stream,
                reader: Mutex::new(reader),
                writer: Mutex::new(writer),
                input_closed: AtomicBool::new(false),
                output_closed: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                close_hooks: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Open an outbound session to `addr`.
    pub fn connect(
        addr: std::net::SocketAddr,
        local: NodeInfo,
        remote: NodeInfo,
        connect_timeout: Option<std::time::Duration>,
        config: FrameConfig,
    ) -> Result<Self> {
        let stream = match connect_timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        }
        .map_err(|source| SubnetError::Connect { addr, source })?;
        Self::from_stream(stream, local, remote, true, config)
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn local(&self) -> &NodeInfo {
        &self.inner.local
    }

    pub fn remote(&self) -> &NodeInfo {
        &self.inner.remote
    }

    /// True for sessions this side initiated.
    pub fn is_outbound(&self) -> bool {
        self.inner.outbound
    }

    /// Send one frame on the session.
    pub fn send(&self, frame: &CommonFrame) -> Result<()> {
        if self.is_output_closed() {
            return Err(SubnetError::ConnectionClosed(self.id()));
        }
        let result = self.inner.writer.lock().write_frame(frame);
        match result {
            Ok(()) => {
                debug!(id = self.id(), tid = frame.tid(), "sent frame on session");
                Ok(())
            }
            Err(err) => {
                warn!(id = self.id(), error = %err, "session write failed");
                self.close();
                Err(err.into())
            }
        }
    }

    /// Block until the next complete frame arrives on the session.
    ///
    /// End of stream, a buffer overflow or an I/O fault closes the whole
    /// session.
    pub fn receive(&self) -> Result<CommonFrame> {
        if self.is_input_closed() {
            return Err(SubnetError::ConnectionClosed(self.id()));
        }
        let result = self.inner.reader.lock().read_frame();
        match result {
            Ok(frame) => Ok(frame),
            Err(FrameError::ConnectionClosed) => {
                debug!(id = self.id(), "remote closed the session");
                self.close();
                Err(SubnetError::ConnectionClosed(self.id()))
            }
            Err(_) if self.is_input_closed() => Err(SubnetError::ConnectionClosed(self.id())),
            Err(err) => {
                warn!(id = self.id(), error = %err, "session read failed");
                self.close();
                Err(err.into())
            }
        }
    }

    /// Stop reading. Closes the session fully when output is already closed.
    pub fn close_input(&self) {
        if !self.inner.input_closed.swap(true, Ordering::SeqCst) {
            let _ = self.inner.stream.shutdown(Shutdown::Read);
            debug!(id = self.id(), "session input closed");
        }
        if self.is_output_closed() {
            self.finish_close();
        }
    }

    /// Stop writing. Closes the session fully when input is already closed.
    pub fn close_output(&self) {
        if !self.inner.output_closed.swap(true, Ordering::SeqCst) {
            let _ = self.inner.stream.shutdown(Shutdown::Write);
            debug!(id = self.id(), "session output closed");
        }
        if self.is_input_closed() {
            self.finish_close();
        }
    }

    /// Close both directions.
    pub fn close(&self) {
        self.inner.input_closed.store(true, Ordering::SeqCst);
        self.inner.output_closed.store(true, Ordering::SeqCst);
        let _ = self.inner.stream.shutdown(Shutdown::Both);
        self.finish_close();
    }

    fn finish_close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(id = self.id(), remote = %self.inner.remote, "session closed");
        let hooks = std::mem::take(&mut *self.inner.close_hooks.lock());
        for hook in hooks {
            hook(self);
        }
    }

    /// Register a callback run once when the session becomes fully closed.
    /// Runs immediately if it already is.
    pub fn on_close(&self, hook: impl Fn(&Connection) + Send + Sync + 'static) {
        if self.is_closed() {
            hook(self);
            return;
        }
        self.inner.close_hooks.lock().push(Box::new(hook));
        // A close racing with registration would have taken the hooks
        // before ours landed.
        if self.is_closed() {
            let hooks = std::mem::take(&mut *self.inner.close_hooks.lock());
            for hook in hooks {
                hook(self);
            }
        }
    }

    pub fn is_input_closed(&self) -> bool {
        self.inner.input_closed.load(Ordering::SeqCst)
    }

    pub fn is_output_closed(&self) -> bool {
        self.inner.output_closed.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// True when both handles refer to the same session.
    pub fn same_as(&self, other: &Connection) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for Connection {}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("local", &self.inner.local)
            .field("remote", &self.inner.remote)
            .field("outbound", &self.inner.outbound)
            .field("input_closed", &self.is_input_closed())
            .field("output_closed", &self.is_output_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::net::TcpListener;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    use echonet_frame::{Eoj, Esv, Property, StandardPayload};

    use super::*;

    fn pair(config: FrameConfig) -> (Connection, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let accept = thread::spawn(move || listener.accept().unwrap().0);
        let conn = Connection::connect(
            addr,
            NodeInfo::internal("local"),
            NodeInfo::Inet(addr),
            None,
            config,
        )
        .unwrap();
        (conn, accept.join().unwrap())
    }

    fn get_frame(tid: u16) -> CommonFrame {
        CommonFrame::standard(
            tid,
            StandardPayload::new(Eoj::CONTROLLER, Eoj::NODE_PROFILE, Esv::Get)
                .with_property(Property::empty(0x80)),
        )
    }

    #[test]
    fn send_and_receive_frames() {
        let (conn, peer) = pair(FrameConfig::default());
        let peer_conn = Connection::from_stream(
            peer,
            NodeInfo::internal("peer"),
            NodeInfo::internal("local"),
            false,
            FrameConfig::default(),
        )
        .unwrap();

        conn.send(&get_frame(1)).unwrap();
        conn.send(&get_frame(2)).unwrap();
        assert_eq!(peer_conn.receive().unwrap().tid(), 1);
        assert_eq!(peer_conn.receive().unwrap().tid(), 2);
        assert!(conn.is_outbound());
        assert!(!peer_conn.is_outbound());
    }

    #[test]
    fn closing_both_directions_fully_closes() {
        let (conn, _peer) = pair(FrameConfig::default());
        let closed = Arc::new(AtomicUsize::new(0));
        {
            let closed = Arc::clone(&closed);
            conn.on_close(move |_| {
                closed.fetch_add(1, Ordering::SeqCst);
            });
        }

        conn.close_output();
        assert!(conn.is_output_closed());
        assert!(!conn.is_closed());
        assert!(matches!(
            conn.send(&get_frame(1)),
            Err(SubnetError::ConnectionClosed(_))
        ));

        conn.close_input();
        assert!(conn.is_closed());
        conn.close();
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remote_eof_closes_session() {
        let (conn, peer) = pair(FrameConfig::default());
        let closed = Arc::new(AtomicBool::new(false));
        {
            let closed = Arc::clone(&closed);
            conn.on_close(move |_| closed.store(true, Ordering::SeqCst));
        }
        drop(peer);
        assert!(matches!(
            conn.receive(),
            Err(SubnetError::ConnectionClosed(_))
        ));
        assert!(conn.is_closed());
        assert!(closed.load(Ordering::SeqCst));
        assert!(matches!(
            conn.send(&get_frame(1)),
            Err(SubnetError::ConnectionClosed(_))
        ));
    }

    #[test]
    fn buffer_overflow_closes_session() {
        let config = FrameConfig {
            max_buffer_size: 128,
            ..FrameConfig::default()
        };
        let (conn, mut peer) = pair(config);
        // Valid header, then a Get request whose property carries data: it
        // decodes but never validates.
        let mut bytes = vec![
            0x10, 0x81, 0x00, 0x01, 0x05, 0xFF, 0x01, 0x0E, 0xF0, 0x01, 0x62, 0x01, 0x80, 0x01,
            0x30,
        ];
        bytes.resize(256, 0x00);
        peer.write_all(&bytes).unwrap();

        let err = conn.receive().unwrap_err();
        assert!(matches!(
            err,
            SubnetError::Frame(FrameError::BufferOverflow { max: 128, .. })
        ));
        assert!(conn.is_closed());
    }

    #[test]
    fn on_close_after_close_runs_immediately() {
        let (conn, _peer) = pair(FrameConfig::default());
        conn.close();
        let ran = Arc::new(AtomicBool::new(false));
        {
            let ran = Arc::clone(&ran);
            conn.on_close(move |_| ran.store(true, Ordering::SeqCst));
        }
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn clones_share_state() {
        let (conn, _peer) = pair(FrameConfig::default());
        let other = conn.clone();
        other.close();
        assert!(conn.is_closed());
        assert_eq!(conn, other);
    }
}
