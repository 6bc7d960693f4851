//! Address-family abstraction.
//!
//! The routing engine is written once against [`AddressFamily`] and instantiated
//! for [`Ipv4`] and [`Ipv6`]. A family supplies its address/prefix types, a few
//! address predicates and access to the per-node IP stack of that family.

use std::fmt;
use std::hash::Hash;
use std::net::{Ipv4Addr, Ipv6Addr};

use ipnet::{Ipv4Net, Ipv6Net};

use super::node::{IpStack, Node};
use super::route::IpHeader;
use crate::error::SocketError;

/// Outcome of the family-specific input screening that runs before any
/// nix-vector processing in `route_input`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputScreen {
    /// This protocol does not handle the packet.
    NotHandled,
    /// Destination is local; hand the packet to the local-delivery callback.
    LocalDeliver,
    /// Reject through the error callback.
    Reject(SocketError),
}

pub trait AddressFamily: Sized + Clone + fmt::Debug + 'static {
    type Addr: Copy + Eq + Ord + Hash + fmt::Debug + fmt::Display;
    type Net: Copy + Eq + fmt::Debug + fmt::Display;

    const NAME: &'static str;

    fn loopback_net() -> Self::Net;
    fn unspecified() -> Self::Addr;

    /// Interface address carried by a prefix (e.g. `10.0.0.1` of `10.0.0.1/24`).
    fn addr_of(net: &Self::Net) -> Self::Addr;
    fn net_contains(net: &Self::Net, addr: &Self::Addr) -> bool;

    fn is_loopback(addr: &Self::Addr) -> bool;
    /// Addresses in link-local scope are ignored when matching subnets.
    fn is_link_local(addr: &Self::Addr) -> bool;
    fn is_multicast(addr: &Self::Addr) -> bool;

    fn stack(node: &Node) -> &IpStack<Self>;
    fn stack_mut(node: &mut Node) -> &mut IpStack<Self>;

    fn screen_input(
        _stack: &IpStack<Self>,
        _header: &IpHeader<Self>,
        _iif: usize,
    ) -> Option<InputScreen> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ipv4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ipv6;

impl AddressFamily for Ipv4 {
    type Addr = Ipv4Addr;
    type Net = Ipv4Net;

    const NAME: &'static str = "IPv4";

    fn loopback_net() -> Ipv4Net {
        Ipv4Net::from(Ipv4Addr::LOCALHOST)
    }

    fn unspecified() -> Ipv4Addr {
        Ipv4Addr::UNSPECIFIED
    }

    fn addr_of(net: &Ipv4Net) -> Ipv4Addr {
        net.addr()
    }

    fn net_contains(net: &Ipv4Net, addr: &Ipv4Addr) -> bool {
        net.contains(addr)
    }

    fn is_loopback(addr: &Ipv4Addr) -> bool {
        addr.is_loopback()
    }

    fn is_link_local(_addr: &Ipv4Addr) -> bool {
        false
    }

    fn is_multicast(addr: &Ipv4Addr) -> bool {
        addr.is_multicast()
    }

    fn stack(node: &Node) -> &IpStack<Self> {
        &node.ipv4
    }

    fn stack_mut(node: &mut Node) -> &mut IpStack<Self> {
        &mut node.ipv4
    }
}

impl AddressFamily for Ipv6 {
    type Addr = Ipv6Addr;
    type Net = Ipv6Net;

    const NAME: &'static str = "IPv6";

    fn loopback_net() -> Ipv6Net {
        Ipv6Net::from(Ipv6Addr::LOCALHOST)
    }

    fn unspecified() -> Ipv6Addr {
        Ipv6Addr::UNSPECIFIED
    }

    fn addr_of(net: &Ipv6Net) -> Ipv6Addr {
        net.addr()
    }

    fn net_contains(net: &Ipv6Net, addr: &Ipv6Addr) -> bool {
        net.contains(addr)
    }

    fn is_loopback(addr: &Ipv6Addr) -> bool {
        addr.is_loopback()
    }

    fn is_link_local(addr: &Ipv6Addr) -> bool {
        addr.is_unicast_link_local()
    }

    fn is_multicast(addr: &Ipv6Addr) -> bool {
        addr.is_multicast()
    }

    fn stack(node: &Node) -> &IpStack<Self> {
        &node.ipv6
    }

    fn stack_mut(node: &mut Node) -> &mut IpStack<Self> {
        &mut node.ipv6
    }

    /// IPv6 handles multicast, local delivery and forwarding checks inside the
    /// routing protocol; IPv4 does this one layer up.
    fn screen_input(
        stack: &IpStack<Self>,
        header: &IpHeader<Self>,
        iif: usize,
    ) -> Option<InputScreen> {
        if header.destination.is_multicast() {
            return Some(InputScreen::NotHandled);
        }
        if stack.is_destination_address(&header.destination) {
            return Some(InputScreen::LocalDeliver);
        }
        if !stack.is_forwarding(iif) {
            return Some(InputScreen::Reject(SocketError::NoRouteToHost));
        }
        None
    }
}
