use std::io;
use std::net::TcpListener;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use echonet_frame::FrameConfig;
use tracing::{debug, error, info, warn};

use crate::connection::Connection;
use crate::error::SubnetError;
use crate::inet::{Inbox, Workers};
use crate::node::NodeInfo;
use crate::pool::TcpConnectionPool;

/// Spawn the session acceptor.
///
/// The listener runs non-blocking and is polled at the inbox poll interval
/// so a stop is noticed without a wake-up connection. Each accepted session
/// joins `pool` and gets its own receiver thread. With `reply_timeout` set,
/// accepted sessions are one-shot: see [`spawn_session`].
pub(crate) fn spawn_acceptor(
    listener: TcpListener,
    inbox: Arc<Inbox>,
    pool: TcpConnectionPool,
    frame_config: FrameConfig,
    reply_timeout: Option<Duration>,
    workers: Arc<Workers>,
) -> io::Result<JoinHandle<()>> {
    listener.set_nonblocking(true)?;
    thread::Builder::new()
        .name(format!("echonet-tcp-accept-{}", inbox.id().get()))
        .spawn(move || {
            accept_loop(
                &listener,
                &inbox,
                &pool,
                &frame_config,
                reply_timeout,
                &workers,
            )
        })
}

fn accept_loop(
    listener: &TcpListener,
    inbox: &Arc<Inbox>,
    pool: &TcpConnectionPool,
    frame_config: &FrameConfig,
    reply_timeout: Option<Duration>,
    workers: &Workers,
) {
    while inbox.is_running() {
        let (stream, peer) = match listener.accept() {
            Ok(accepted) => accepted,
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(inbox.poll_interval());
                continue;
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                if inbox.is_running() {
                    error!(subnet = %inbox.id(), error = %err, "session acceptor failed");
                }
                break;
            }
        };

        if let Err(err) = stream.set_nonblocking(false) {
            warn!(%peer, error = %err, "failed to set up accepted session");
            continue;
        }
        let connection = match Connection::from_stream(
            stream,
            inbox.local().clone(),
            NodeInfo::Inet(peer),
            false,
            frame_config.clone(),
        ) {
            Ok(connection) => connection,
            Err(err) => {
                warn!(%peer, error = %err, "failed to set up accepted session");
                continue;
            }
        };

        info!(id = connection.id(), %peer, "accepted session");
        pool.add(connection.clone());
        if !inbox.is_running() {
            connection.close();
            break;
        }
        match spawn_session(connection.clone(), Arc::clone(inbox), reply_timeout) {
            Ok(handle) => workers.push(handle),
            Err(err) => {
                warn!(id = connection.id(), error = %err, "failed to spawn session receiver");
                connection.close();
            }
        }
    }
    debug!(subnet = %inbox.id(), "session acceptor exiting");
}

/// Spawn a receiver for one session. Frames it reads carry the session so
/// replies can go back on it.
///
/// With `reply_timeout` set the session carries a single request: the
/// receiver stops reading after the first frame and waits for the local
/// answer to close the session, closing it itself once the timeout passes.
/// Reading on would see the requester's half-close and end the session
/// before the answer is written.
pub(crate) fn spawn_session(
    connection: Connection,
    inbox: Arc<Inbox>,
    reply_timeout: Option<Duration>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("echonet-tcp-{}", connection.id()))
        .spawn(move || session_loop(&connection, &inbox, reply_timeout))
}

fn session_loop(connection: &Connection, inbox: &Inbox, reply_timeout: Option<Duration>) {
    loop {
        match connection.receive() {
            Ok(common) => {
                debug!(id = connection.id(), tid = common.tid(), "received frame on session");
                inbox.deliver(
                    connection.remote().clone(),
                    connection.local().clone(),
                    common,
                    Some(connection.clone()),
                );
                if let Some(timeout) = reply_timeout {
                    await_reply(connection, inbox, timeout);
                    break;
                }
            }
            Err(SubnetError::ConnectionClosed(_)) => break,
            Err(err) => {
                if inbox.is_running() {
                    warn!(id = connection.id(), error = %err, "session receiver stopped");
                }
                break;
            }
        }
    }
    debug!(id = connection.id(), "session receiver exiting");
}

fn await_reply(connection: &Connection, inbox: &Inbox, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while !connection.is_closed() && inbox.is_running() {
        let now = Instant::now();
        if now >= deadline {
            debug!(id = connection.id(), "no answer on one-shot session");
            break;
        }
        thread::sleep(inbox.poll_interval().min(deadline - now));
    }
    connection.close();
}
