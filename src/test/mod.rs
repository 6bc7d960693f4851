mod adjacency;
mod print;
mod routing;

use crate::error::SocketError;
use crate::net::{
    AddressFamily, DeviceId, InputCallbacks, IpHeader, NodeId, Packet, Route, Topology,
};
use crate::topo::{SubnetAllocator, SubnetPlan};

/// A chain n0 - n1 - ... with one auto subnet per link.
/// Returns the nodes and, per link, the (left, right) devices.
pub(super) fn build_line<F: SubnetPlan>(
    topo: &mut Topology,
    n: usize,
) -> (Vec<NodeId>, Vec<(DeviceId, DeviceId)>) {
    let nodes: Vec<NodeId> = (0..n).map(|i| topo.add_node(format!("n{i}"))).collect();
    let mut subnets = SubnetAllocator::new();
    let links = nodes
        .windows(2)
        .map(|w| subnets.link::<F>(topo, w[0], w[1]))
        .collect();
    (nodes, links)
}

/// Address of `device`'s first interface address.
pub(super) fn addr_of<F: AddressFamily>(topo: &Topology, device: DeviceId) -> F::Addr {
    let node = topo.device(device).node;
    let stack = topo.stack::<F>(node);
    let iface = stack
        .interface_for_device(device)
        .expect("device has an interface");
    stack
        .interface(iface)
        .and_then(|i| i.first_address())
        .expect("interface has an address")
}

#[derive(Debug)]
pub(super) enum Outcome<F: AddressFamily> {
    Forward(Route<F>, Packet),
    Local(Packet, usize),
    Error(SocketError),
}

/// Records which `route_input` callback fired.
pub(super) struct Recorder<F: AddressFamily> {
    pub outcomes: Vec<Outcome<F>>,
}

impl<F: AddressFamily> Recorder<F> {
    pub fn new() -> Self {
        Self {
            outcomes: Vec::new(),
        }
    }
}

impl<F: AddressFamily> InputCallbacks<F> for Recorder<F> {
    fn unicast_forward(
        &mut self,
        _idev: DeviceId,
        route: Route<F>,
        packet: Packet,
        _header: &IpHeader<F>,
    ) {
        self.outcomes.push(Outcome::Forward(route, packet));
    }

    fn local_deliver(&mut self, packet: Packet, _header: &IpHeader<F>, iif: usize) {
        self.outcomes.push(Outcome::Local(packet, iif));
    }

    fn error(&mut self, _packet: Packet, _header: &IpHeader<F>, err: SocketError) {
        self.outcomes.push(Outcome::Error(err));
    }
}
