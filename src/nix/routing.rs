//! Nix-vector 路由协议实例
//!
//! 每个节点一个实例，持有两级缓存：
//! - NixCache：目的地址 → 已构建的 nix-vector（只读，使用时克隆工作副本）
//! - RouteCache：目的地址 → 解析好的下一跳路由
//!
//! 以及本节点邻居总数的记忆值。所有入口先检查共享 registry 的脏标记，
//! 再把本实例缓存与 registry 纪元对齐。

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, error, info, trace, warn};

use super::bfs::bfs;
use super::path::{build_nix_vector, find_net_device_for_nix_index, find_total_neighbors};
use super::registry::NixRegistry;
use super::vector::NixVector;
use crate::error::SocketError;
use crate::net::{
    AddressFamily, DeviceId, InputCallbacks, InputScreen, IpHeader, NodeId, Packet, Route,
    RoutingProtocol, Topology,
};

pub struct NixVectorRouting<F: AddressFamily> {
    node: Option<NodeId>,
    registry: Rc<NixRegistry<F>>,
    pub(crate) nix_cache: BTreeMap<F::Addr, NixVector>,
    pub(crate) route_cache: BTreeMap<F::Addr, Route<F>>,
    /// 0 表示需要重新计算
    total_neighbors: u32,
    /// 缓存内容所属的纪元
    cache_epoch: u32,
}

impl<F: AddressFamily> fmt::Debug for NixVectorRouting<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NixVectorRouting")
            .field("family", &F::NAME)
            .field("node", &self.node)
            .field("nix_cache", &self.nix_cache.len())
            .field("route_cache", &self.route_cache.len())
            .field("total_neighbors", &self.total_neighbors)
            .field("cache_epoch", &self.cache_epoch)
            .finish()
    }
}

/// 路由源地址的选择方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceSelection {
    /// 本地发出：按目的地址选择源地址
    Output,
    /// 转发：出口接口的第一个地址
    Forward,
}

impl<F: AddressFamily> NixVectorRouting<F> {
    pub fn new(registry: Rc<NixRegistry<F>>) -> Self {
        let cache_epoch = registry.epoch();
        Self {
            node: None,
            registry,
            nix_cache: BTreeMap::new(),
            route_cache: BTreeMap::new(),
            total_neighbors: 0,
            cache_epoch,
        }
    }

    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    pub fn registry(&self) -> &Rc<NixRegistry<F>> {
        &self.registry
    }

    pub(crate) fn bound_node(&self) -> NodeId {
        self.node
            .unwrap_or_else(|| panic!("{} nix routing used before set_stack", F::NAME))
    }

    pub fn nix_cache_len(&self) -> usize {
        self.nix_cache.len()
    }

    pub fn route_cache_len(&self) -> usize {
        self.route_cache.len()
    }

    pub fn cached_nix_vector(&self, dest: &F::Addr) -> Option<&NixVector> {
        self.nix_cache.get(dest)
    }

    pub fn cached_route(&self, dest: &F::Addr) -> Option<&Route<F>> {
        self.route_cache.get(dest)
    }

    /// 清空本实例的两级缓存和邻居数记忆值
    pub fn flush_caches(&mut self) {
        trace!(node = ?self.node, "清空实例缓存");
        self.nix_cache.clear();
        self.route_cache.clear();
        self.total_neighbors = 0;
    }

    pub(crate) fn check_cache_state_and_flush(&mut self) {
        self.registry.check_and_flush();
        let epoch = self.registry.epoch();
        if self.cache_epoch != epoch {
            self.flush_caches();
            self.cache_epoch = epoch;
        }
    }

    fn total_neighbors(&mut self, topo: &Topology, node: NodeId) -> u32 {
        if self.total_neighbors == 0 {
            self.total_neighbors = find_total_neighbors(topo, &self.registry, node);
        }
        self.total_neighbors
    }

    /// 计算从 `source` 到 `dest` 的 nix-vector，并打上当前纪元
    ///
    /// 目的地址未知、目的就是源节点、或不可达时返回 `None`。
    #[tracing::instrument(skip(self, topo), fields(family = F::NAME, dest = %dest))]
    pub fn get_nix_vector(
        &self,
        topo: &Topology,
        source: NodeId,
        dest: F::Addr,
        oif: Option<DeviceId>,
    ) -> Option<NixVector> {
        let Some(dest_node) = self.registry.node_by_address(topo, &dest) else {
            error!("找不到目的地址所在节点，没有路由");
            return None;
        };
        if dest_node == source {
            debug!("do not process packets to self");
            return None;
        }
        let Some(parents) = bfs(topo, &self.registry, topo.node_count(), source, dest_node, oif)
        else {
            error!(dest_node = ?dest_node, "BFS 找不到路径，没有路由");
            return None;
        };
        let mut nix = NixVector::new();
        nix.set_epoch(self.registry.epoch());
        if !build_nix_vector(topo, &self.registry, &parents, source, dest_node, oif, &mut nix) {
            error!(dest_node = ?dest_node, "无法构建 nix-vector");
            return None;
        }
        debug!(nix = %nix, bits = nix.total_bits(), "构建完成");
        Some(nix)
    }

    /// 返回缓存中 nix-vector 的工作副本；未命中时构建并缓存。
    ///
    /// 指定了 `oif` 而缓存向量的第一跳不经过它时，按 `oif` 重新构建并替换缓存。
    fn nix_vector_for(
        &mut self,
        topo: &Topology,
        node: NodeId,
        dest: F::Addr,
        oif: Option<DeviceId>,
    ) -> Option<NixVector> {
        if let Some(nix) = self.nix_cache.get(&dest) {
            if oif.is_none_or(|o| self.first_hop_device(topo, node, nix) == Some(o)) {
                trace!(dest = %dest, "NixCache 命中");
                return Some(nix.clone());
            }
            debug!(dest = %dest, "缓存的 nix-vector 不经过指定出口网卡，重新计算");
        }
        let nix = self.get_nix_vector(topo, node, dest, oif)?;
        self.nix_cache.insert(dest, nix.clone());
        Some(nix)
    }

    fn first_hop_device(
        &self,
        topo: &Topology,
        node: NodeId,
        nix: &NixVector,
    ) -> Option<DeviceId> {
        let width = NixVector::bit_count(find_total_neighbors(topo, &self.registry, node));
        if width > nix.remaining_bits() {
            return None;
        }
        let mut probe = nix.clone();
        let index = probe.extract_neighbor_index(width);
        find_net_device_for_nix_index(topo, &self.registry, node, index).map(|(dev, _)| dev)
    }

    fn build_route(
        &self,
        topo: &Topology,
        node: NodeId,
        index: u32,
        dest: F::Addr,
        oif: Option<DeviceId>,
        selection: SourceSelection,
    ) -> Option<Route<F>> {
        let Some((device, gateway)) =
            find_net_device_for_nix_index(topo, &self.registry, node, index)
        else {
            error!(node = ?node, index, "nix 编号无法解析为出口网卡");
            return None;
        };
        let output_device = oif.unwrap_or(device);
        let iface = self
            .registry
            .interface_for_device(topo, output_device)
            .unwrap_or_else(|| panic!("interface index not found for device {output_device:?}"));
        let stack = topo.stack::<F>(node);
        let source = match selection {
            SourceSelection::Output => stack.source_address_selection(iface, &dest),
            SourceSelection::Forward => stack
                .interface(iface)
                .and_then(|i| i.preferred_address()),
        }
        .unwrap_or_else(F::unspecified);
        Some(Route {
            destination: dest,
            source,
            gateway,
            output_device,
        })
    }
}

impl<F: AddressFamily> RoutingProtocol<F> for NixVectorRouting<F> {
    fn set_stack(&mut self, node: NodeId) {
        assert!(
            self.node.is_none(),
            "{} nix routing already bound to node {:?}",
            F::NAME,
            self.node
        );
        self.node = Some(node);
    }

    #[tracing::instrument(skip(self, topo, packet), fields(family = F::NAME, node = ?self.node, dest = %header.destination))]
    fn route_output(
        &mut self,
        topo: &Topology,
        packet: Option<&mut Packet>,
        header: &IpHeader<F>,
        oif: Option<DeviceId>,
    ) -> Result<Route<F>, SocketError> {
        self.check_cache_state_and_flush();
        let node = self.bound_node();
        let dest = header.destination;

        let Some(mut nix) = self.nix_vector_for(topo, node, dest, oif) else {
            error!("没有到目的地址的路径");
            return Err(SocketError::NoRouteToHost);
        };

        let total = self.total_neighbors(topo, node);
        let index = nix.extract_neighbor_index(NixVector::bit_count(total));

        let hop_device = find_net_device_for_nix_index(topo, &self.registry, node, index)
            .map(|(dev, _)| dev);
        let stale = self.route_cache.get(&dest).is_some_and(|r| {
            oif.is_some_and(|o| r.output_device != o) || Some(r.output_device) != hop_device
        });
        if stale {
            debug!("缓存路由的出口网卡与本跳不符，丢弃");
            self.route_cache.remove(&dest);
        }

        let route = match self.route_cache.get(&dest) {
            Some(route) => route.clone(),
            None => {
                let route = self
                    .build_route(topo, node, index, dest, oif, SourceSelection::Output)
                    .ok_or(SocketError::NoRouteToHost)?;
                self.route_cache.insert(dest, route.clone());
                route
            }
        };

        trace!(nix = %nix, remaining = nix.remaining_bits(), route = %route, "附加 nix-vector");
        if let Some(p) = packet {
            p.nix_vector = Some(nix);
        }
        Ok(route)
    }

    #[tracing::instrument(skip(self, topo, packet, callbacks), fields(family = F::NAME, node = ?self.node, pkt_id = packet.id, dest = %header.destination))]
    fn route_input(
        &mut self,
        topo: &Topology,
        mut packet: Packet,
        header: &IpHeader<F>,
        idev: DeviceId,
        callbacks: &mut dyn InputCallbacks<F>,
    ) -> Result<(), Packet> {
        self.check_cache_state_and_flush();
        let node = self.bound_node();
        let stack = topo.stack::<F>(node);
        let iif = stack.interface_for_device(idev).unwrap_or_else(|| {
            panic!("input device {idev:?} has no {} interface on node {node}", F::NAME)
        });

        match F::screen_input(stack, header, iif) {
            Some(InputScreen::NotHandled) => {
                debug!("不处理该数据包");
                return Err(packet);
            }
            Some(InputScreen::LocalDeliver) => {
                callbacks.local_deliver(packet, header, iif);
                return Ok(());
            }
            Some(InputScreen::Reject(err)) => {
                debug!(iif, "输入接口不转发");
                callbacks.error(packet, header, err);
                return Ok(());
            }
            None => {}
        }

        let mut nix = packet.nix_vector.take().unwrap_or_else(|| {
            panic!("packet {} arrived at node {node} without a nix-vector", packet.id)
        });
        if nix.epoch() != self.registry.epoch() {
            warn!(
                pkt_epoch = nix.epoch(),
                epoch = self.registry.epoch(),
                "nix-vector 纪元不匹配，从本节点重新计算"
            );
            match self.get_nix_vector(topo, node, header.destination, None) {
                Some(fresh) => nix = fresh,
                None => {
                    callbacks.error(packet, header, SocketError::NoRouteToHost);
                    return Ok(());
                }
            }
        }

        let total = self.total_neighbors(topo, node);
        let index = nix.extract_neighbor_index(NixVector::bit_count(total));

        let dest = header.destination;
        let Some((hop_device, _)) = find_net_device_for_nix_index(topo, &self.registry, node, index)
        else {
            error!(node = ?node, index, "nix 编号无法解析为出口网卡");
            callbacks.error(packet, header, SocketError::NoRouteToHost);
            return Ok(());
        };
        let cached = self
            .route_cache
            .get(&dest)
            .filter(|r| r.output_device == hop_device)
            .cloned();
        let route = match cached {
            Some(route) => route,
            None => {
                if self.route_cache.contains_key(&dest) {
                    debug!("缓存路由的出口网卡与 nix-vector 这一跳不符，重新构建");
                }
                let Some(route) =
                    self.build_route(topo, node, index, dest, None, SourceSelection::Forward)
                else {
                    callbacks.error(packet, header, SocketError::NoRouteToHost);
                    return Ok(());
                };
                self.route_cache.insert(dest, route.clone());
                route
            }
        };

        trace!(route = %route, remaining = nix.remaining_bits(), "转发");
        packet.nix_vector = Some(nix);
        callbacks.unicast_forward(idev, route, packet, header);
        Ok(())
    }

    fn notify_interface_up(&mut self, iface: usize) {
        info!(node = ?self.node, iface, "接口 up");
        self.registry.mark_dirty();
    }

    fn notify_interface_down(&mut self, iface: usize) {
        info!(node = ?self.node, iface, "接口 down");
        self.registry.mark_dirty();
    }

    fn notify_add_address(&mut self, iface: usize, address: F::Net) {
        info!(node = ?self.node, iface, address = %address, "添加地址");
        self.registry.mark_dirty();
    }

    fn notify_remove_address(&mut self, iface: usize, address: F::Net) {
        info!(node = ?self.node, iface, address = %address, "删除地址");
        self.registry.mark_dirty();
    }

    fn notify_add_route(&mut self, dest: F::Net, next_hop: F::Addr, iface: usize) {
        debug!(node = ?self.node, dest = %dest, next_hop = %next_hop, iface, "添加路由");
        self.registry.mark_dirty();
    }

    fn notify_remove_route(&mut self, dest: F::Net, next_hop: F::Addr, iface: usize) {
        debug!(node = ?self.node, dest = %dest, next_hop = %next_hop, iface, "删除路由");
        self.registry.mark_dirty();
    }

    fn print_routing_table(&mut self, topo: &Topology, out: &mut dyn fmt::Write) -> fmt::Result {
        self.write_routing_table(topo, out)
    }
}
