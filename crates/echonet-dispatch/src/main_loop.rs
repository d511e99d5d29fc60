use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use echonet_transport::{Frame, Listener, Result, Subnet, SubnetError};
use parking_lot::Mutex;
use tracing::{debug, error, info, trace};

/// How long `run` waits on the subnet before checking for a stop.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Receive pump: offers every inbound frame to the listeners in order.
///
/// Listeners see whether an earlier listener consumed the frame but are
/// offered it regardless. A stopped loop stays stopped.
pub struct MainLoop {
    subnet: Arc<dyn Subnet>,
    listeners: Mutex<Vec<Arc<dyn Listener>>>,
    stopped: AtomicBool,
    poll_interval: Duration,
}

impl MainLoop {
    pub fn new(subnet: Arc<dyn Subnet>) -> Self {
        Self {
            subnet,
            listeners: Mutex::new(Vec::new()),
            stopped: AtomicBool::new(false),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn subnet(&self) -> &Arc<dyn Subnet> {
        &self.subnet
    }

    pub fn add_listener(&self, listener: Arc<dyn Listener>) {
        self.listeners.lock().push(listener);
    }

    /// Remove a listener by identity. Returns false when it was not added.
    pub fn remove_listener(&self, listener: &Arc<dyn Listener>) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        before != listeners.len()
    }

    pub fn count_listeners(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Offer one frame to a snapshot of the listeners. Returns whether any
    /// of them consumed it.
    pub fn dispatch(&self, frame: &Frame) -> bool {
        let listeners = self.listeners.lock().clone();
        let mut processed = false;
        for listener in listeners {
            processed |= listener.process(&*self.subnet, frame, processed);
        }
        trace!(tid = frame.tid(), processed, "frame dispatched");
        processed
    }

    /// Receive and dispatch until stopped. A receive fault ends the loop
    /// and is returned.
    pub fn run(&self) -> Result<()> {
        info!(subnet = %self.subnet.id(), "main loop running");
        while !self.is_stopped() {
            match self.subnet.receive_timeout(self.poll_interval) {
                Ok(Some(frame)) => {
                    self.dispatch(&frame);
                }
                Ok(None) => {}
                Err(SubnetError::Shutdown) if self.is_stopped() => break,
                Err(err) => {
                    error!(subnet = %self.subnet.id(), error = %err, "main loop receive failed");
                    return Err(err);
                }
            }
        }
        info!(subnet = %self.subnet.id(), "main loop stopped");
        Ok(())
    }

    /// Ask `run` to return. Takes effect within one poll interval.
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            debug!(subnet = %self.subnet.id(), "main loop stop requested");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Run on a dedicated thread.
    pub fn spawn(self) -> io::Result<MainLoopHandle> {
        let main_loop = Arc::new(self);
        let runner = Arc::clone(&main_loop);
        let thread = thread::Builder::new()
            .name(format!("echonet-main-{}", main_loop.subnet.id().get()))
            .spawn(move || runner.run())?;
        Ok(MainLoopHandle {
            main_loop,
            thread: Some(thread),
        })
    }
}

/// A [`MainLoop`] running on its own thread. Dropping the handle stops the
/// loop and waits for it.
pub struct MainLoopHandle {
    main_loop: Arc<MainLoop>,
    thread: Option<JoinHandle<Result<()>>>,
}

impl MainLoopHandle {
    pub fn main_loop(&self) -> &MainLoop {
        &self.main_loop
    }

    pub fn stop(&self) {
        self.main_loop.stop();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the loop to end and return its outcome.
    pub fn join(mut self) -> Result<()> {
        self.wait()
    }

    fn wait(&mut self) -> Result<()> {
        match self.thread.take() {
            Some(thread) => thread.join().unwrap_or_else(|_| {
                error!("main loop thread panicked");
                Err(SubnetError::Shutdown)
            }),
            None => Ok(()),
        }
    }
}

impl Drop for MainLoopHandle {
    fn drop(&mut self) {
        self.main_loop.stop();
        let _ = self.wait();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use echonet_frame::{CommonFrame, Eoj, Esv, Property, StandardPayload};
    use echonet_transport::{InternalNetwork, InternalSubnet, NodeInfo};

    use super::*;

    const POLL: Duration = Duration::from_millis(10);

    fn get(tid: u16) -> CommonFrame {
        CommonFrame::standard(
            tid,
            StandardPayload::new(Eoj::CONTROLLER, Eoj::NODE_PROFILE, Esv::Get)
                .with_property(Property::empty(0x80)),
        )
    }

    struct Record {
        seen: Mutex<Vec<(u16, bool)>>,
        consume: bool,
    }

    impl Record {
        fn new(consume: bool) -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                consume,
            })
        }
    }

    impl Listener for Record {
        fn process(&self, _: &dyn Subnet, frame: &Frame, processed: bool) -> bool {
            self.seen.lock().push((frame.tid(), processed));
            self.consume
        }
    }

    #[test]
    fn dispatch_passes_accumulated_flag() {
        let network = InternalNetwork::new();
        let subnet = Arc::new(InternalSubnet::new(&network, "node").unwrap());
        let main_loop = MainLoop::new(subnet.clone());
        let first = Record::new(false);
        let second = Record::new(true);
        let third = Record::new(false);
        main_loop.add_listener(first.clone());
        main_loop.add_listener(second.clone());
        main_loop.add_listener(third.clone());

        let frame = Frame::new(subnet.local_node(), subnet.group_node(), get(5));
        assert!(main_loop.dispatch(&frame));
        assert_eq!(*first.seen.lock(), [(5, false)]);
        assert_eq!(*second.seen.lock(), [(5, false)]);
        assert_eq!(*third.seen.lock(), [(5, true)]);
    }

    #[test]
    fn spawned_loop_delivers_frames_and_stops() {
        let network = InternalNetwork::new();
        let receiver = Arc::new(InternalSubnet::new(&network, "receiver").unwrap());
        let sender = InternalSubnet::new(&network, "sender").unwrap();

        let seen = Arc::new(AtomicUsize::new(0));
        let main_loop = MainLoop::new(receiver.clone()).with_poll_interval(POLL);
        {
            let seen = Arc::clone(&seen);
            main_loop.add_listener(Arc::new(move |_: &dyn Subnet, _: &Frame, _: bool| {
                seen.fetch_add(1, Ordering::SeqCst);
                true
            }));
        }
        let handle = main_loop.spawn().unwrap();

        let to = sender.remote_node(&NodeInfo::internal("receiver")).unwrap();
        for tid in 1..=3 {
            sender
                .send(Frame::new(sender.local_node(), to.clone(), get(tid)))
                .unwrap();
        }
        for _ in 0..200 {
            if seen.load(Ordering::SeqCst) == 3 {
                break;
            }
            thread::sleep(POLL);
        }
        assert_eq!(seen.load(Ordering::SeqCst), 3);

        handle.stop();
        handle.join().unwrap();
    }

    #[test]
    fn receive_fault_ends_loop_with_error() {
        let network = InternalNetwork::new();
        let subnet = Arc::new(InternalSubnet::new(&network, "node").unwrap());
        let handle = MainLoop::new(subnet.clone())
            .with_poll_interval(POLL)
            .spawn()
            .unwrap();
        subnet.stop();
        assert!(matches!(handle.join(), Err(SubnetError::Shutdown)));
    }

    #[test]
    fn listener_may_remove_itself() {
        struct Once {
            main_loop: Arc<MainLoop>,
            me: Mutex<Option<Arc<dyn Listener>>>,
            calls: AtomicUsize,
        }

        impl Listener for Once {
            fn process(&self, _: &dyn Subnet, _: &Frame, _: bool) -> bool {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if let Some(me) = self.me.lock().take() {
                    self.main_loop.remove_listener(&me);
                }
                false
            }
        }

        let network = InternalNetwork::new();
        let subnet = Arc::new(InternalSubnet::new(&network, "node").unwrap());
        let main_loop = Arc::new(MainLoop::new(subnet.clone()));
        let once = Arc::new(Once {
            main_loop: main_loop.clone(),
            me: Mutex::new(None),
            calls: AtomicUsize::new(0),
        });
        let as_dyn: Arc<dyn Listener> = once.clone();
        *once.me.lock() = Some(as_dyn.clone());
        main_loop.add_listener(as_dyn);

        let frame = Frame::new(subnet.local_node(), subnet.group_node(), get(1));
        main_loop.dispatch(&frame);
        main_loop.dispatch(&frame);
        assert_eq!(once.calls.load(Ordering::SeqCst), 1);
        assert_eq!(main_loop.count_listeners(), 0);
    }

    #[test]
    fn stopped_loop_returns_immediately() {
        let network = InternalNetwork::new();
        let subnet = Arc::new(InternalSubnet::new(&network, "node").unwrap());
        let main_loop = MainLoop::new(subnet);
        main_loop.stop();
        assert!(main_loop.run().is_ok());
    }
}
