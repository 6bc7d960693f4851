//! Routing-protocol interface consumed by the IP layer.
//!
//! One trait serves both address families; the family is the type parameter.

use std::fmt;

use super::family::AddressFamily;
use super::id::{DeviceId, NodeId};
use super::packet::Packet;
use super::route::{IpHeader, Route};
use super::topology::Topology;
use crate::error::SocketError;

/// Callbacks handed to [`RoutingProtocol::route_input`]. Exactly one of them is
/// invoked when the protocol accepts a packet.
pub trait InputCallbacks<F: AddressFamily> {
    /// Forward `packet` along `route`. `idev` is the device it arrived on.
    fn unicast_forward(
        &mut self,
        idev: DeviceId,
        route: Route<F>,
        packet: Packet,
        header: &IpHeader<F>,
    );
    fn local_deliver(&mut self, packet: Packet, header: &IpHeader<F>, iif: usize);
    fn error(&mut self, packet: Packet, header: &IpHeader<F>, err: SocketError);
}

pub trait RoutingProtocol<F: AddressFamily> {
    /// Bind the protocol to the node whose IP stack it serves.
    fn set_stack(&mut self, node: NodeId);

    /// Route a locally originated packet. `packet` may be absent when only the
    /// route is wanted.
    fn route_output(
        &mut self,
        topo: &Topology,
        packet: Option<&mut Packet>,
        header: &IpHeader<F>,
        oif: Option<DeviceId>,
    ) -> Result<Route<F>, SocketError>;

    /// Route a received packet. `Err(packet)` hands the packet back when this
    /// protocol does not handle it.
    fn route_input(
        &mut self,
        topo: &Topology,
        packet: Packet,
        header: &IpHeader<F>,
        idev: DeviceId,
        callbacks: &mut dyn InputCallbacks<F>,
    ) -> Result<(), Packet>;

    fn notify_interface_up(&mut self, iface: usize);
    fn notify_interface_down(&mut self, iface: usize);
    fn notify_add_address(&mut self, iface: usize, address: F::Net);
    fn notify_remove_address(&mut self, iface: usize, address: F::Net);
    fn notify_add_route(&mut self, dest: F::Net, next_hop: F::Addr, iface: usize);
    fn notify_remove_route(&mut self, dest: F::Net, next_hop: F::Addr, iface: usize);

    fn print_routing_table(&mut self, topo: &Topology, out: &mut dyn fmt::Write) -> fmt::Result;
}
