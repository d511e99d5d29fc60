//! IP subnet: one datagram channel plus an optional stream channel.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use echonet_frame::{CommonFrame, FrameConfig};
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::connection::Connection;
use crate::error::{Result, SubnetError};
use crate::frame::Frame;
use crate::node::{Node, NodeInfo, SubnetId};
use crate::pool::TcpConnectionPool;
use crate::queue::{FrameQueue, DEFAULT_QUEUE_CAPACITY};
use crate::subnet::Subnet;
use crate::tcp;
use crate::udp::{self, UdpChannel};

/// Well-known ECHONET Lite port, for both datagrams and sessions.
pub const DEFAULT_PORT: u16 = 3610;

/// IPv4 multicast group.
pub const DEFAULT_GROUP_V4: Ipv4Addr = Ipv4Addr::new(224, 0, 23, 0);

/// IPv6 multicast group.
pub const DEFAULT_GROUP_V6: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 1);

/// How frames use stream sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPolicy {
    /// Open a fresh session per frame and close its output right after
    /// sending. The peer answers once on the same session and then closes
    /// it.
    #[default]
    OneShot,
    /// Reuse the most recently used open session to the peer, opening one
    /// only when none exists.
    Persistent,
}

/// Stream channel settings.
#[derive(Debug, Clone)]
pub struct TcpConfig {
    /// Listening port. `0` picks an ephemeral port.
    pub port: u16,
    /// Port used when connecting to peers. `None` keeps the port of the
    /// peer's node address.
    pub remote_port: Option<u16>,
    pub policy: SessionPolicy,
    /// Route unicast frames over sessions instead of datagrams.
    pub prefer_sessions: bool,
    /// Pool ceiling; the least recently used session is evicted past it.
    pub max_connections: Option<usize>,
    pub connect_timeout: Option<Duration>,
    /// How long an accepted one-shot session waits for the local answer
    /// before it is closed unanswered.
    pub reply_timeout: Duration,
    /// Reader and writer limits for every session.
    pub frame: FrameConfig,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            remote_port: Some(DEFAULT_PORT),
            policy: SessionPolicy::default(),
            prefer_sessions: false,
            max_connections: None,
            connect_timeout: Some(Duration::from_secs(3)),
            reply_timeout: Duration::from_secs(3),
            frame: FrameConfig::default(),
        }
    }
}

impl TcpConfig {
    fn one_shot_reply_timeout(&self) -> Option<Duration> {
        (self.policy == SessionPolicy::OneShot).then_some(self.reply_timeout)
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_remote_port(mut self, port: Option<u16>) -> Self {
        self.remote_port = port;
        self
    }

    pub fn with_policy(mut self, policy: SessionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_prefer_sessions(mut self, prefer: bool) -> Self {
        self.prefer_sessions = prefer;
        self
    }

    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = Some(max);
        self
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    pub fn with_frame_config(mut self, frame: FrameConfig) -> Self {
        self.frame = frame;
        self
    }
}

/// Settings for an [`InetSubnet`].
#[derive(Debug, Clone)]
pub struct InetSubnetConfig {
    /// Local address for the datagram and stream sockets.
    pub bind_addr: IpAddr,
    /// Datagram port. `0` picks an ephemeral port.
    pub port: u16,
    /// Multicast group address.
    pub group: IpAddr,
    /// Destination port for group frames.
    pub group_port: u16,
    /// Join the group on start. Without it only unicast traffic arrives.
    pub join_group: bool,
    /// Outgoing IPv4 multicast interface; unspecified leaves the OS choice.
    pub interface_v4: Ipv4Addr,
    /// IPv6 interface index for the group membership; `0` is any.
    pub interface_index_v6: u32,
    pub multicast_loop: bool,
    pub multicast_ttl: u32,
    pub queue_capacity: usize,
    /// Bounded wait used by receiver threads to notice a stop.
    pub poll_interval: Duration,
    /// Stream channel; `None` disables it.
    pub tcp: Option<TcpConfig>,
}

impl Default for InetSubnetConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            group: IpAddr::V4(DEFAULT_GROUP_V4),
            group_port: DEFAULT_PORT,
            join_group: true,
            interface_v4: Ipv4Addr::UNSPECIFIED,
            interface_index_v6: 0,
            multicast_loop: true,
            multicast_ttl: 1,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            poll_interval: Duration::from_millis(100),
            tcp: None,
        }
    }
}

impl InetSubnetConfig {
    /// IPv6 defaults: bound to `[::]`, group `ff02::1`.
    pub fn ipv6() -> Self {
        Self {
            bind_addr: IpAddr::V6(Ipv6Addr::UNSPECIFIED),
            group: IpAddr::V6(DEFAULT_GROUP_V6),
            ..Self::default()
        }
    }

    pub fn with_bind_addr(mut self, addr: IpAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_group(mut self, group: IpAddr, port: u16) -> Self {
        self.group = group;
        self.group_port = port;
        self
    }

    pub fn with_join_group(mut self, join: bool) -> Self {
        self.join_group = join;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_tcp(mut self, tcp: TcpConfig) -> Self {
        self.tcp = Some(tcp);
        self
    }
}

/// Receiver-side state shared by every receiver thread of one run.
pub(crate) struct Inbox {
    id: SubnetId,
    local: NodeInfo,
    group: NodeInfo,
    queue: FrameQueue,
    running: AtomicBool,
    poll_interval: Duration,
}

impl Inbox {
    pub(crate) fn id(&self) -> SubnetId {
        self.id
    }

    pub(crate) fn local(&self) -> &NodeInfo {
        &self.local
    }

    pub(crate) fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Queue a decoded frame unless it is addressed to another node.
    pub(crate) fn deliver(
        &self,
        sender: NodeInfo,
        receiver: NodeInfo,
        common: CommonFrame,
        connection: Option<Connection>,
    ) {
        if receiver != self.local && receiver != self.group {
            trace!(subnet = %self.id, %receiver, "discarding frame for another node");
            return;
        }
        let mut frame = Frame::new(
            Node::new(self.id, sender),
            Node::new(self.id, receiver),
            common,
        );
        frame.set_connection(connection);
        if self.queue.push(frame).is_err() {
            debug!(subnet = %self.id, "dropping frame after shutdown");
        }
    }

    /// A receiver hit an unrecoverable fault: wake consumers.
    pub(crate) fn fail(&self) {
        self.queue.close();
    }
}

/// Threads spawned for one run, pruned as they finish.
#[derive(Default)]
pub(crate) struct Workers {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Workers {
    pub(crate) fn push(&self, handle: JoinHandle<()>) {
        let mut handles = self.handles.lock();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    fn join_all(&self) {
        let current = thread::current().id();
        loop {
            let drained: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock());
            if drained.is_empty() {
                break;
            }
            for handle in drained {
                if handle.thread().id() == current {
                    continue;
                }
                if handle.join().is_err() {
                    warn!("receiver thread panicked");
                }
            }
        }
    }
}

struct Stream {
    config: TcpConfig,
    local_addr: SocketAddr,
    pool: TcpConnectionPool,
}

struct Runtime {
    inbox: Arc<Inbox>,
    udp: Arc<UdpChannel>,
    tcp: Option<Stream>,
    workers: Arc<Workers>,
}

/// A subnet over UDP/IP with optional TCP sessions.
///
/// Nothing is bound until [`InetSubnet::start`]. Stopping joins every
/// receiver thread; the subnet may be started again afterwards.
pub struct InetSubnet {
    id: SubnetId,
    config: InetSubnetConfig,
    runtime: Mutex<Option<Arc<Runtime>>>,
}

impl InetSubnet {
    pub fn new(config: InetSubnetConfig) -> Self {
        Self {
            id: SubnetId::next(),
            config,
            runtime: Mutex::new(None),
        }
    }

    /// Create and start a subnet in one step.
    pub fn bind(config: InetSubnetConfig) -> Result<Self> {
        let subnet = Self::new(config);
        subnet.start()?;
        Ok(subnet)
    }

    pub fn config(&self) -> &InetSubnetConfig {
        &self.config
    }

    /// Bind sockets and spawn receiver threads. No-op when running.
    pub fn start(&self) -> Result<()> {
        let mut slot = self.runtime.lock();
        if slot.is_some() {
            return Ok(());
        }

        let udp = Arc::new(UdpChannel::bind(&self.config)?);
        let local = NodeInfo::Inet(udp.local_addr()?);
        let inbox = Arc::new(Inbox {
            id: self.id,
            local,
            group: self.group_info(),
            queue: FrameQueue::new(self.config.queue_capacity),
            running: AtomicBool::new(true),
            poll_interval: self.config.poll_interval,
        });
        let workers = Arc::new(Workers::default());

        let tcp = match &self.config.tcp {
            Some(tcp_config) => {
                let addr = SocketAddr::new(self.config.bind_addr, tcp_config.port);
                let listener =
                    TcpListener::bind(addr).map_err(|source| SubnetError::Bind { addr, source })?;
                let local_addr = listener.local_addr()?;
                let pool = match tcp_config.max_connections {
                    Some(max) => TcpConnectionPool::with_max_connections(max),
                    None => TcpConnectionPool::new(),
                };
                let acceptor = tcp::spawn_acceptor(
                    listener,
                    Arc::clone(&inbox),
                    pool.clone(),
                    tcp_config.frame.clone(),
                    tcp_config.one_shot_reply_timeout(),
                    Arc::clone(&workers),
                )?;
                workers.push(acceptor);
                Some(Stream {
                    config: tcp_config.clone(),
                    local_addr,
                    pool,
                })
            }
            None => None,
        };

        workers.push(udp::spawn_receiver(Arc::clone(&udp), Arc::clone(&inbox))?);

        info!(
            subnet = %self.id,
            local = %inbox.local,
            tcp = ?tcp.as_ref().map(|s| s.local_addr),
            "inet subnet started"
        );
        *slot = Some(Arc::new(Runtime {
            inbox,
            udp,
            tcp,
            workers,
        }));
        Ok(())
    }

    /// Stop receivers, close every session and wake blocked callers.
    pub fn stop(&self) {
        let Some(runtime) = self.runtime.lock().take() else {
            return;
        };
        runtime.inbox.running.store(false, Ordering::SeqCst);
        if let Some(stream) = &runtime.tcp {
            stream.pool.close_all();
        }
        runtime.inbox.queue.close();
        runtime.workers.join_all();
        info!(subnet = %self.id, "inet subnet stopped");
    }

    pub fn is_running(&self) -> bool {
        self.runtime.lock().is_some()
    }

    /// Bound stream listener address, when sessions are enabled.
    pub fn tcp_local_addr(&self) -> Option<SocketAddr> {
        self.current()
            .ok()
            .and_then(|rt| rt.tcp.as_ref().map(|s| s.local_addr))
    }

    /// Session pool, when sessions are enabled and the subnet is running.
    pub fn pool(&self) -> Option<TcpConnectionPool> {
        self.current()
            .ok()
            .and_then(|rt| rt.tcp.as_ref().map(|s| s.pool.clone()))
    }

    /// Open a session to `remote` and start receiving on it.
    pub fn connect(&self, remote: &NodeInfo) -> Result<Connection> {
        let runtime = self.current()?;
        let stream = runtime
            .tcp
            .as_ref()
            .ok_or_else(|| SubnetError::UnsupportedNode(remote.clone()))?;
        open_session(&runtime, stream, remote)
    }

    fn current(&self) -> Result<Arc<Runtime>> {
        self.runtime.lock().clone().ok_or(SubnetError::NotStarted)
    }

    fn group_info(&self) -> NodeInfo {
        NodeInfo::Inet(SocketAddr::new(self.config.group, self.config.group_port))
    }

    fn send_on_session(runtime: &Runtime, stream: &Stream, frame: &Frame) -> Result<()> {
        let remote = frame.receiver().info();
        match stream.config.policy {
            SessionPolicy::Persistent => {
                if let Some(existing) = stream.pool.find(remote) {
                    stream.pool.promote(&existing);
                    match existing.send(frame.common()) {
                        Ok(()) => return Ok(()),
                        Err(err) => {
                            debug!(id = existing.id(), error = %err, "pooled session failed, reconnecting");
                        }
                    }
                }
                open_session(runtime, stream, remote)?.send(frame.common())
            }
            SessionPolicy::OneShot => {
                let connection = open_session(runtime, stream, remote)?;
                let result = connection.send(frame.common());
                connection.close_output();
                result
            }
        }
    }
}

fn open_session(runtime: &Runtime, stream: &Stream, remote: &NodeInfo) -> Result<Connection> {
    let peer = remote
        .as_socket_addr()
        .ok_or_else(|| SubnetError::UnsupportedNode(remote.clone()))?;
    let addr = match stream.config.remote_port {
        Some(port) => SocketAddr::new(peer.ip(), port),
        None => peer,
    };
    let connection = Connection::connect(
        addr,
        runtime.inbox.local.clone(),
        remote.clone(),
        stream.config.connect_timeout,
        stream.config.frame.clone(),
    )?;
    if let Some(evicted) = stream.pool.add(connection.clone()) {
        debug!(id = evicted.id(), "session evicted for new connection");
    }
    if !runtime.inbox.is_running() {
        connection.close();
        return Err(SubnetError::Shutdown);
    }
    let handle = tcp::spawn_session(connection.clone(), Arc::clone(&runtime.inbox), None)?;
    runtime.workers.push(handle);
    Ok(connection)
}

impl Drop for InetSubnet {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Subnet for InetSubnet {
    fn id(&self) -> SubnetId {
        self.id
    }

    fn send(&self, frame: Frame) -> Result<()> {
        let runtime = self.current()?;
        if !self.is_valid_node(frame.sender()) {
            return Err(SubnetError::InvalidSender(frame.sender().info().clone()));
        }
        if !self.is_valid_node(frame.receiver()) {
            return Err(SubnetError::InvalidReceiver(
                frame.receiver().info().clone(),
            ));
        }

        if let Some(connection) = frame.connection() {
            connection.send(frame.common())?;
            let one_shot = runtime
                .tcp
                .as_ref()
                .is_some_and(|s| s.config.policy == SessionPolicy::OneShot);
            // A one-shot peer expects exactly one answer on its session.
            if one_shot && !connection.is_outbound() {
                connection.close();
            }
            return Ok(());
        }

        let receiver = frame.receiver().info();
        let addr = receiver
            .as_socket_addr()
            .ok_or_else(|| SubnetError::InvalidReceiver(receiver.clone()))?;

        if *receiver == runtime.inbox.group {
            trace!(subnet = %self.id, tid = frame.tid(), "multicast send");
            return runtime.udp.send_to(frame.common(), addr);
        }

        match &runtime.tcp {
            Some(stream) if stream.config.prefer_sessions => {
                Self::send_on_session(&runtime, stream, &frame)
            }
            _ => runtime.udp.send_to(frame.common(), addr),
        }
    }

    fn receive(&self) -> Result<Frame> {
        let runtime = self.current()?;
        runtime.inbox.queue.pop()
    }

    fn receive_timeout(&self, timeout: Duration) -> Result<Option<Frame>> {
        let runtime = self.current()?;
        runtime.inbox.queue.pop_timeout(timeout)
    }

    fn local_node(&self) -> Node {
        let info = match self.current() {
            Ok(runtime) => runtime.inbox.local.clone(),
            Err(_) => NodeInfo::Inet(SocketAddr::new(self.config.bind_addr, self.config.port)),
        };
        Node::new(self.id, info)
    }

    fn group_node(&self) -> Node {
        Node::new(self.id, self.group_info())
    }

    fn remote_node(&self, info: &NodeInfo) -> Result<Node> {
        match info {
            NodeInfo::Inet(addr) if addr.is_ipv4() == self.config.bind_addr.is_ipv4() => {
                Ok(Node::new(self.id, info.clone()))
            }
            other => Err(SubnetError::UnsupportedNode(other.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use echonet_frame::{Eoj, Esv, Property, StandardPayload};

    use super::*;

    const WAIT: Duration = Duration::from_secs(2);

    fn loopback() -> InetSubnetConfig {
        InetSubnetConfig::default()
            .with_bind_addr(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .with_port(0)
            .with_join_group(false)
            .with_poll_interval(Duration::from_millis(20))
    }

    fn loopback_tcp(policy: SessionPolicy) -> InetSubnetConfig {
        loopback().with_tcp(
            TcpConfig::default()
                .with_port(0)
                .with_remote_port(None)
                .with_policy(policy)
                .with_prefer_sessions(true),
        )
    }

    fn get(tid: u16) -> CommonFrame {
        CommonFrame::standard(
            tid,
            StandardPayload::new(Eoj::CONTROLLER, Eoj::NODE_PROFILE, Esv::Get)
                .with_property(Property::empty(0x80)),
        )
    }

    fn get_res(tid: u16) -> CommonFrame {
        CommonFrame::standard(
            tid,
            StandardPayload::new(Eoj::NODE_PROFILE, Eoj::CONTROLLER, Esv::GetRes)
                .with_property(Property::with_data(0x80, vec![0x30]).unwrap()),
        )
    }

    #[test]
    fn defaults_match_well_known_values() {
        let config = InetSubnetConfig::default();
        assert_eq!(config.port, 3610);
        assert_eq!(config.group, IpAddr::V4(Ipv4Addr::new(224, 0, 23, 0)));
        assert!(config.tcp.is_none());
        assert_eq!(InetSubnetConfig::ipv6().group.to_string(), "ff02::1");
        assert_eq!(TcpConfig::default().policy, SessionPolicy::OneShot);
    }

    #[test]
    fn not_started_subnet_refuses_io() {
        let subnet = InetSubnet::new(loopback());
        assert!(!subnet.is_running());
        let frame = Frame::new(subnet.local_node(), subnet.group_node(), get(1));
        assert!(matches!(subnet.send(frame), Err(SubnetError::NotStarted)));
        assert!(matches!(subnet.receive(), Err(SubnetError::NotStarted)));
    }

    #[test]
    fn datagram_unicast_between_subnets() {
        let a = InetSubnet::bind(loopback()).expect("a should bind");
        let b = InetSubnet::bind(loopback()).expect("b should bind");

        let to_b = a.remote_node(b.local_node().info()).unwrap();
        a.send(Frame::new(a.local_node(), to_b, get(7))).unwrap();

        let got = b.receive_timeout(WAIT).unwrap().expect("b should receive");
        assert_eq!(got.tid(), 7);
        assert_eq!(got.sender().info(), a.local_node().info());
        assert_eq!(got.receiver(), &b.local_node());
        assert!(got.connection().is_none());
    }

    #[test]
    fn undecodable_datagrams_are_dropped() {
        let b = InetSubnet::bind(loopback()).expect("b should bind");
        let addr = b.local_node().info().as_socket_addr().unwrap();
        let raw = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        raw.send_to(&[0x99, 0x81, 0x00, 0x01], addr).unwrap();
        raw.send_to(&get(9).to_bytes().unwrap(), addr).unwrap();

        let got = b.receive_timeout(WAIT).unwrap().expect("valid frame should arrive");
        assert_eq!(got.tid(), 9);
    }

    #[test]
    fn foreign_nodes_are_rejected() {
        let a = InetSubnet::bind(loopback()).expect("a should bind");
        let b = InetSubnet::bind(loopback()).expect("b should bind");
        let err = a
            .send(Frame::new(b.local_node(), a.group_node(), get(1)))
            .unwrap_err();
        assert!(matches!(err, SubnetError::InvalidSender(_)));
        assert!(matches!(
            a.remote_node(&NodeInfo::internal("x")),
            Err(SubnetError::UnsupportedNode(_))
        ));
    }

    #[test]
    fn one_shot_session_carries_request_and_response() {
        let a = InetSubnet::bind(loopback_tcp(SessionPolicy::OneShot)).expect("a should bind");
        let b = InetSubnet::bind(loopback_tcp(SessionPolicy::OneShot)).expect("b should bind");
        let b_tcp = NodeInfo::Inet(b.tcp_local_addr().unwrap());

        let to_b = a.remote_node(&b_tcp).unwrap();
        a.send(Frame::new(a.local_node(), to_b, get(11))).unwrap();

        let request = b.receive_timeout(WAIT).unwrap().expect("b should receive");
        assert_eq!(request.tid(), 11);
        let session = request.connection().cloned().expect("frame should carry its session");
        assert!(!session.is_outbound());

        let reply = Frame::new(b.local_node(), request.sender().clone(), get_res(11))
            .with_connection(session);
        b.send(reply).unwrap();

        let response = a.receive_timeout(WAIT).unwrap().expect("a should receive");
        assert_eq!(response.tid(), 11);
        assert_eq!(response.sender().info(), &b_tcp);
        assert!(response.connection().is_some());
        assert!(request.connection().unwrap().is_closed());
    }

    #[test]
    fn persistent_sessions_are_reused() {
        let a = InetSubnet::bind(loopback_tcp(SessionPolicy::Persistent)).expect("a should bind");
        let b = InetSubnet::bind(loopback_tcp(SessionPolicy::Persistent)).expect("b should bind");
        let to_b = a
            .remote_node(&NodeInfo::Inet(b.tcp_local_addr().unwrap()))
            .unwrap();

        a.send(Frame::new(a.local_node(), to_b.clone(), get(1))).unwrap();
        a.send(Frame::new(a.local_node(), to_b, get(2))).unwrap();

        assert_eq!(b.receive_timeout(WAIT).unwrap().unwrap().tid(), 1);
        assert_eq!(b.receive_timeout(WAIT).unwrap().unwrap().tid(), 2);
        assert_eq!(a.pool().unwrap().len(), 1);
    }

    #[test]
    fn persistent_send_after_peer_close_opens_fresh_session() {
        let a = InetSubnet::bind(loopback_tcp(SessionPolicy::Persistent)).expect("a should bind");
        let b = InetSubnet::bind(loopback_tcp(SessionPolicy::Persistent)).expect("b should bind");
        let to_b = a
            .remote_node(&NodeInfo::Inet(b.tcp_local_addr().unwrap()))
            .unwrap();

        a.send(Frame::new(a.local_node(), to_b.clone(), get(1))).unwrap();
        let first = b.receive_timeout(WAIT).unwrap().expect("b should receive");
        let first_session = first.connection().cloned().expect("frame should carry its session");
        let pool = a.pool().unwrap();
        let stale = pool.find(to_b.info()).expect("a should pool its session");
        first_session.close();

        let deadline = std::time::Instant::now() + WAIT;
        while !pool.is_empty() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(stale.is_closed());
        assert!(pool.is_empty());

        a.send(Frame::new(a.local_node(), to_b, get(2))).unwrap();
        let second = b.receive_timeout(WAIT).unwrap().expect("b should receive again");
        assert_eq!(second.tid(), 2);
        assert!(!second.connection().unwrap().same_as(&first_session));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn unanswered_one_shot_session_is_closed_after_reply_timeout() {
        let config = loopback().with_tcp(
            TcpConfig::default()
                .with_port(0)
                .with_remote_port(None)
                .with_prefer_sessions(true)
                .with_reply_timeout(Duration::from_millis(50)),
        );
        let a = InetSubnet::bind(config.clone()).expect("a should bind");
        let b = InetSubnet::bind(config).expect("b should bind");
        let to_b = a
            .remote_node(&NodeInfo::Inet(b.tcp_local_addr().unwrap()))
            .unwrap();

        a.send(Frame::new(a.local_node(), to_b, get(3))).unwrap();
        let request = b.receive_timeout(WAIT).unwrap().expect("b should receive");
        let session = request.connection().cloned().unwrap();

        let deadline = std::time::Instant::now() + WAIT;
        while !session.is_closed() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(session.is_closed());
        assert!(b.pool().unwrap().is_empty());
    }

    #[test]
    fn stop_wakes_receivers_and_allows_restart() {
        let subnet = Arc::new(InetSubnet::bind(loopback_tcp(SessionPolicy::Persistent)).unwrap());
        let waiter = {
            let subnet = Arc::clone(&subnet);
            thread::spawn(move || subnet.receive())
        };
        thread::sleep(Duration::from_millis(50));
        subnet.stop();
        assert!(matches!(
            waiter.join().unwrap(),
            Err(SubnetError::Shutdown)
        ));
        assert!(!subnet.is_running());

        subnet.start().expect("restart should succeed");
        assert!(subnet.is_running());
        subnet.stop();
    }
}
