//! 逐跳转发驱动
//!
//! [`Network`] 持有拓扑、每个节点一个 nix 路由实例和它们共享的 registry。
//! 拓扑修改接口在改动拓扑的同时通知所属节点的路由实例（相当于 IP 协议栈通知
//! 路由协议）。`send` 在源节点调用 route_output，然后把包交给网关地址所在的
//! 节点：目的地址是本节点地址则本地交付，否则调用 route_input 继续转发。

use std::fmt;
use std::rc::Rc;

use tracing::{debug, info, trace, warn};

use super::family::AddressFamily;
use super::id::{DeviceId, NodeId};
use super::packet::Packet;
use super::protocol::{InputCallbacks, RoutingProtocol};
use super::route::{IpHeader, Route};
use super::stats::Stats;
use super::topology::Topology;
use crate::error::{SendError, SocketError};
use crate::nix::{NixRegistry, NixVectorRouting};

pub const DEFAULT_TTL: u8 = 64;

/// 一次成功交付
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub packet_id: u64,
    /// 经过的节点，首个为源节点，最后一个为目的节点
    pub path: Vec<NodeId>,
}

impl Delivery {
    pub fn hops(&self) -> usize {
        self.path.len().saturating_sub(1)
    }
}

pub struct Network<F: AddressFamily> {
    topo: Topology,
    registry: Rc<NixRegistry<F>>,
    routing: Vec<NixVectorRouting<F>>,
    next_pkt_id: u64,
    ttl: u8,
    pub stats: Stats,
}

impl<F: AddressFamily> fmt::Debug for Network<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Network")
            .field("family", &F::NAME)
            .field("nodes", &self.topo.node_count())
            .field("registry", &self.registry)
            .field("stats", &self.stats)
            .finish()
    }
}

impl<F: AddressFamily> Network<F> {
    /// 为拓扑中的每个节点创建并绑定一个路由实例
    pub fn new(topo: Topology) -> Self {
        let registry = Rc::new(NixRegistry::new());
        let routing = topo
            .nodes()
            .iter()
            .map(|n| {
                let mut r = NixVectorRouting::new(Rc::clone(&registry));
                r.set_stack(n.id());
                r
            })
            .collect();
        Self {
            topo,
            registry,
            routing,
            next_pkt_id: 0,
            ttl: DEFAULT_TTL,
            stats: Stats::default(),
        }
    }

    pub fn with_ttl(mut self, ttl: u8) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn topology(&self) -> &Topology {
        &self.topo
    }

    pub fn registry(&self) -> &Rc<NixRegistry<F>> {
        &self.registry
    }

    pub fn routing(&self, node: NodeId) -> &NixVectorRouting<F> {
        &self.routing[node.0]
    }

    pub fn routing_mut(&mut self, node: NodeId) -> &mut NixVectorRouting<F> {
        &mut self.routing[node.0]
    }

    /// 添加节点并为其创建路由实例
    pub fn add_node(&mut self, name: impl Into<String>) -> NodeId {
        let id = self.topo.add_node(name);
        let mut r = NixVectorRouting::new(Rc::clone(&self.registry));
        r.set_stack(id);
        self.routing.push(r);
        id
    }

    /// 点对点连接（尚未分配地址，不影响路由）
    pub fn connect(&mut self, a: NodeId, b: NodeId) -> (DeviceId, DeviceId) {
        self.topo.connect(a, b)
    }

    /// 给网卡分配地址，通知所属节点
    pub fn add_address(&mut self, device: DeviceId, net: F::Net) -> usize {
        let node = self.topo.device(device).node;
        let existed = self.topo.stack::<F>(node).interface_for_device(device).is_some();
        let iface = self.topo.assign::<F>(device, net);
        let r = &mut self.routing[node.0];
        if !existed {
            r.notify_interface_up(iface);
        }
        r.notify_add_address(iface, net);
        iface
    }

    pub fn remove_address(&mut self, node: NodeId, iface: usize, net: F::Net) -> bool {
        let removed = self.topo.remove_address::<F>(node, iface, net);
        if removed {
            self.routing[node.0].notify_remove_address(iface, net);
        }
        removed
    }

    pub fn set_interface_up(&mut self, node: NodeId, iface: usize, up: bool) {
        self.topo.set_interface_up::<F>(node, iface, up);
        let r = &mut self.routing[node.0];
        if up {
            r.notify_interface_up(iface);
        } else {
            r.notify_interface_down(iface);
        }
    }

    pub fn set_forwarding(&mut self, node: NodeId, iface: usize, on: bool) {
        self.topo.set_forwarding::<F>(node, iface, on);
    }

    /// 链路状态变化。点对点信道两端一起改变；共享信道只改这一块网卡。
    /// 对拥有接口的网卡按接口 up/down 通知
    pub fn set_link_up(&mut self, device: DeviceId, up: bool) {
        let ends = match self.topo.device(device).channel {
            Some(ch) if self.topo.channel(ch).devices.len() == 2 => {
                self.topo.channel(ch).devices.clone()
            }
            _ => vec![device],
        };
        for dev in ends {
            self.topo.set_link_up(dev, up);
            let node = self.topo.device(dev).node;
            match self.topo.stack::<F>(node).interface_for_device(dev) {
                Some(iface) if up => self.routing[node.0].notify_interface_up(iface),
                Some(iface) => self.routing[node.0].notify_interface_down(iface),
                None => self.registry.mark_dirty(),
            }
        }
    }

    pub fn add_route(&mut self, node: NodeId, dest: F::Net, next_hop: F::Addr, iface: usize) {
        self.routing[node.0].notify_add_route(dest, next_hop, iface);
    }

    pub fn remove_route(&mut self, node: NodeId, dest: F::Net, next_hop: F::Addr, iface: usize) {
        self.routing[node.0].notify_remove_route(dest, next_hop, iface);
    }

    /// 从 `src` 发送一个数据包到 `dest`，逐跳转发直到交付或被丢弃
    #[tracing::instrument(skip(self), fields(family = F::NAME, dest = %dest))]
    pub fn send(
        &mut self,
        src: NodeId,
        dest: F::Addr,
        size_bytes: u32,
    ) -> Result<Delivery, SendError> {
        let id = self.next_pkt_id;
        self.next_pkt_id = self.next_pkt_id.wrapping_add(1);
        let mut packet = Packet::new(id, size_bytes);
        let mut path = vec![src];

        if self.topo.stack::<F>(src).is_destination_address(&dest) {
            debug!("目的地址在源节点上，直接本地交付");
            return Ok(self.on_delivered(packet, path));
        }

        let mut header = IpHeader::new(F::unspecified(), dest, self.ttl);
        let output =
            self.routing[src.0].route_output(&self.topo, Some(&mut packet), &header, None);
        let route = match output {
            Ok(route) => route,
            Err(err) => {
                warn!(err = %err, "源节点没有路由");
                self.stats.no_route_pkts += 1;
                return Err(SendError::RouteOutput { node: src, err });
            }
        };
        header.source = route.source;
        info!(pkt_id = id, route = %route, "📤 从源节点发出");

        let mut hop = route;
        let mut at = src;
        loop {
            let Some(next) = self.registry.node_by_address(&self.topo, &hop.gateway) else {
                self.stats.dropped_pkts += 1;
                return Err(SendError::UnknownGateway {
                    gateway: hop.gateway.to_string(),
                    path,
                });
            };
            let idev = self
                .topo
                .device_for_address::<F>(next, &hop.gateway)
                .unwrap_or_else(|| panic!("gateway {} not on node {next}", hop.gateway));
            trace!(from = ?at, to = ?next, dev = ?hop.output_device, "传输一跳");
            packet = packet.advance();
            path.push(next);
            at = next;

            if self.topo.stack::<F>(at).is_destination_address(&dest) {
                return Ok(self.on_delivered(packet, path));
            }

            header.ttl = header.ttl.saturating_sub(1);
            if header.ttl == 0 {
                warn!(node = ?at, "TTL 耗尽，丢弃");
                self.stats.dropped_pkts += 1;
                return Err(SendError::TtlExpired { node: at, path });
            }

            let mut hop_result = HopResult::default();
            let accepted =
                self.routing[at.0].route_input(&self.topo, packet, &header, idev, &mut hop_result);
            if accepted.is_err() {
                self.stats.dropped_pkts += 1;
                return Err(SendError::NotHandled { node: at, path });
            }
            match hop_result.outcome.take() {
                Some(HopOutcome::Forward(route, p)) => {
                    hop = route;
                    packet = p;
                }
                Some(HopOutcome::Local(p)) => return Ok(self.on_delivered(p, path)),
                Some(HopOutcome::Error(err)) => {
                    self.stats.dropped_pkts += 1;
                    return Err(SendError::Rejected { node: at, err, path });
                }
                None => {
                    panic!("routing at node {at} accepted a packet without invoking a callback")
                }
            }
        }
    }

    fn on_delivered(&mut self, packet: Packet, path: Vec<NodeId>) -> Delivery {
        info!(pkt_id = packet.id, hops = packet.hops_taken, "✅ 数据包送达目的地");
        self.stats.delivered_pkts += 1;
        self.stats.delivered_bytes += packet.size_bytes as u64;
        Delivery {
            packet_id: packet.id,
            path,
        }
    }

    pub fn print_routing_table(&mut self, node: NodeId, out: &mut dyn fmt::Write) -> fmt::Result {
        self.routing[node.0].print_routing_table(&self.topo, out)
    }

    pub fn print_routing_path(
        &mut self,
        source: NodeId,
        dest: F::Addr,
        out: &mut dyn fmt::Write,
    ) -> fmt::Result {
        self.routing[source.0].print_routing_path(&self.topo, source, dest, out)
    }
}

enum HopOutcome<F: AddressFamily> {
    Forward(Route<F>, Packet),
    Local(Packet),
    Error(SocketError),
}

/// 收集 route_input 回调结果
struct HopResult<F: AddressFamily> {
    outcome: Option<HopOutcome<F>>,
}

impl<F: AddressFamily> Default for HopResult<F> {
    fn default() -> Self {
        Self { outcome: None }
    }
}

impl<F: AddressFamily> InputCallbacks<F> for HopResult<F> {
    fn unicast_forward(
        &mut self,
        _idev: DeviceId,
        route: Route<F>,
        packet: Packet,
        _header: &IpHeader<F>,
    ) {
        self.outcome = Some(HopOutcome::Forward(route, packet));
    }

    fn local_deliver(&mut self, packet: Packet, _header: &IpHeader<F>, _iif: usize) {
        self.outcome = Some(HopOutcome::Local(packet));
    }

    fn error(&mut self, _packet: Packet, _header: &IpHeader<F>, err: SocketError) {
        self.outcome = Some(HopOutcome::Error(err));
    }
}
