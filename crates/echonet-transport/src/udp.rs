use std::io;
use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use echonet_frame::CommonFrame;
use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, error, warn};

use crate::error::{Result, SubnetError};
use crate::inet::{Inbox, InetSubnetConfig};
use crate::node::NodeInfo;

/// Largest datagram the receiver accepts.
const MAX_DATAGRAM: usize = 64 * 1024;

/// Datagram socket shared by the sender path and the receiver thread.
pub(crate) struct UdpChannel {
    socket: UdpSocket,
}

impl UdpChannel {
    /// Bind with address reuse, configure multicast and optionally join the
    /// group.
    pub(crate) fn bind(config: &InetSubnetConfig) -> Result<Self> {
        let addr = SocketAddr::new(config.bind_addr, config.port);
        let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        if addr.is_ipv6() {
            socket.set_only_v6(true)?;
        }
        socket
            .bind(&addr.into())
            .map_err(|source| SubnetError::Bind { addr, source })?;

        match config.group {
            IpAddr::V4(group) => {
                socket.set_multicast_loop_v4(config.multicast_loop)?;
                socket.set_multicast_ttl_v4(config.multicast_ttl)?;
                if !config.interface_v4.is_unspecified() {
                    socket.set_multicast_if_v4(&config.interface_v4)?;
                }
                if config.join_group {
                    socket
                        .join_multicast_v4(&group, &config.interface_v4)
                        .map_err(|source| SubnetError::JoinGroup {
                            group: config.group,
                            source,
                        })?;
                }
            }
            IpAddr::V6(group) => {
                socket.set_multicast_loop_v6(config.multicast_loop)?;
                socket.set_multicast_hops_v6(config.multicast_ttl)?;
                if config.join_group {
                    socket
                        .join_multicast_v6(&group, config.interface_index_v6)
                        .map_err(|source| SubnetError::JoinGroup {
                            group: config.group,
                            source,
                        })?;
                }
            }
        }

        socket.set_read_timeout(Some(config.poll_interval))?;
        let socket: UdpSocket = socket.into();
        debug!(local = ?socket.local_addr().ok(), group = %config.group, joined = config.join_group, "datagram socket bound");
        Ok(Self { socket })
    }

    pub(crate) fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub(crate) fn send_to(&self, frame: &CommonFrame, addr: SocketAddr) -> Result<()> {
        let bytes = frame.to_bytes()?;
        let sent = self.socket.send_to(&bytes, addr)?;
        debug!(tid = frame.tid(), %addr, sent, "sent datagram");
        Ok(())
    }
}

/// Spawn the datagram receiver. It exits once the inbox stops running or
/// the socket fails.
pub(crate) fn spawn_receiver(
    channel: Arc<UdpChannel>,
    inbox: Arc<Inbox>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("echonet-udp-{}", inbox.id().get()))
        .spawn(move || receive_loop(&channel, &inbox))
}

fn receive_loop(channel: &UdpChannel, inbox: &Inbox) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    while inbox.is_running() {
        match channel.socket.recv_from(&mut buf) {
            Ok((len, from)) => match CommonFrame::decode(&buf[..len]) {
                Ok(common) => {
                    debug!(tid = common.tid(), %from, len, "received datagram");
                    inbox.deliver(NodeInfo::Inet(from), inbox.local().clone(), common, None);
                }
                Err(err) => warn!(%from, len, error = %err, "dropping undecodable datagram"),
            },
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) => {}
            Err(err) => {
                if inbox.is_running() {
                    error!(subnet = %inbox.id(), error = %err, "datagram receiver failed");
                    inbox.fail();
                }
                break;
            }
        }
    }
    debug!(subnet = %inbox.id(), "datagram receiver exiting");
}
