mod common;

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use echonet::dispatch::{MainLoop, MainLoopHandle, RequestDispatcher};
use echonet::frame::Eoj;
use echonet::transaction::{SetGetTransactionConfig, TransactionManager};
use echonet::transport::{
    InetSubnet, InetSubnetConfig, NodeInfo, SessionPolicy, Subnet, TcpConfig,
};

use common::{first_edt, Collector, Device, FinishOnFirst};

const POLL: Duration = Duration::from_millis(20);
const WAIT: Duration = Duration::from_secs(3);

fn loopback(tcp: Option<SessionPolicy>) -> InetSubnetConfig {
    let config = InetSubnetConfig::default()
        .with_bind_addr(IpAddr::V4(Ipv4Addr::LOCALHOST))
        .with_port(0)
        .with_join_group(false)
        .with_poll_interval(POLL);
    match tcp {
        Some(policy) => config.with_tcp(
            TcpConfig::default()
                .with_port(0)
                .with_remote_port(None)
                .with_policy(policy)
                .with_prefer_sessions(true),
        ),
        None => config,
    }
}

fn device(config: InetSubnetConfig, status: u8) -> (Arc<InetSubnet>, MainLoopHandle) {
    let subnet = Arc::new(InetSubnet::bind(config).expect("device binds"));
    let dispatcher = RequestDispatcher::new();
    dispatcher.add_processor(Device::new(Eoj::NODE_PROFILE, status));
    let main_loop = MainLoop::new(subnet.clone()).with_poll_interval(POLL);
    main_loop.add_listener(Arc::new(dispatcher));
    (subnet, main_loop.spawn().expect("main loop spawns"))
}

fn get_status(controller: &Arc<InetSubnet>, target: &NodeInfo) -> (usize, Option<u8>) {
    let manager = TransactionManager::new(controller.clone()).with_timeout(WAIT);
    let main_loop = MainLoop::new(controller.clone()).with_poll_interval(POLL);
    main_loop.add_listener(Arc::new(manager.clone()));
    let _main = main_loop.spawn().expect("main loop spawns");

    let receiver = controller.remote_node(target).expect("address resolves");
    let config = SetGetTransactionConfig::new(
        controller.local_node(),
        receiver,
        Eoj::CONTROLLER,
        Eoj::NODE_PROFILE,
    )
    .with_get(0x80);
    let transaction = manager.create_transaction(config);
    let collector = Arc::new(Collector::default());
    transaction.add_listener(collector.clone());
    transaction.add_listener(Arc::new(FinishOnFirst));
    transaction.execute().expect("request sends");
    transaction.join();

    let status = collector.responses.lock().first().and_then(first_edt);
    (transaction.count_responses(), status)
}

#[test]
fn datagram_get_round_trip() {
    let (device_subnet, _device_loop) = device(loopback(None), 0x30);
    let controller = Arc::new(InetSubnet::bind(loopback(None)).expect("controller binds"));

    let target = device_subnet.local_node().info().clone();
    assert_eq!(get_status(&controller, &target), (1, Some(0x30)));
}

#[test]
fn one_shot_session_get_round_trip() {
    let (device_subnet, _device_loop) = device(loopback(Some(SessionPolicy::OneShot)), 0x31);
    let controller = Arc::new(
        InetSubnet::bind(loopback(Some(SessionPolicy::OneShot))).expect("controller binds"),
    );

    let target = NodeInfo::Inet(device_subnet.tcp_local_addr().expect("sessions enabled"));
    assert_eq!(get_status(&controller, &target), (1, Some(0x31)));
}

#[test]
fn persistent_session_is_reused_across_transactions() {
    let (device_subnet, _device_loop) = device(loopback(Some(SessionPolicy::Persistent)), 0x32);
    let controller = Arc::new(
        InetSubnet::bind(loopback(Some(SessionPolicy::Persistent))).expect("controller binds"),
    );

    let target = NodeInfo::Inet(device_subnet.tcp_local_addr().expect("sessions enabled"));
    assert_eq!(get_status(&controller, &target), (1, Some(0x32)));
    assert_eq!(get_status(&controller, &target), (1, Some(0x32)));

    let pool = controller.pool().expect("sessions enabled");
    assert_eq!(pool.connections_to(&target).len(), 1);
}
