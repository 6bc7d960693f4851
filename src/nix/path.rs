//! 路径与 nix-vector 构建
//!
//! 邻居编号必须在构建端和每个转发节点上完全一致，因此构建、统计邻居总数和
//! 按编号查找出口网卡都基于同一个 [`neighbor_enumeration`]：
//! 按网卡下标遍历（跳过网桥和没有信道的网卡），每张网卡内按邻接扫描顺序。

use tracing::{debug, trace};

use super::adjacency::{adjacent_net_devices, interface_of};
use super::registry::NixRegistry;
use super::vector::NixVector;
use crate::net::{AddressFamily, DeviceId, NodeId, Topology};

/// 邻居编号表中的一项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    /// 本地出口网卡
    pub local: DeviceId,
    /// 远端网卡
    pub remote: DeviceId,
    /// 远端网卡所属节点
    pub node: NodeId,
}

pub fn neighbor_enumeration<F: AddressFamily>(
    topo: &Topology,
    registry: &NixRegistry<F>,
    node: NodeId,
) -> Vec<Neighbor> {
    let mut out = Vec::new();
    for &dev in topo.node(node).devices() {
        let device = topo.device(dev);
        if device.is_bridge() {
            continue;
        }
        let Some(channel) = device.channel else {
            continue;
        };
        out.extend(
            adjacent_net_devices(topo, registry, dev, channel)
                .into_iter()
                .map(|remote| Neighbor {
                    local: dev,
                    remote,
                    node: topo.device(remote).node,
                }),
        );
    }
    out
}

pub fn find_total_neighbors<F: AddressFamily>(
    topo: &Topology,
    registry: &NixRegistry<F>,
    node: NodeId,
) -> u32 {
    neighbor_enumeration(topo, registry, node).len() as u32
}

/// 把 nix 编号解析成本地出口网卡和网关地址（远端接口的第一个地址）
pub fn find_net_device_for_nix_index<F: AddressFamily>(
    topo: &Topology,
    registry: &NixRegistry<F>,
    node: NodeId,
    index: u32,
) -> Option<(DeviceId, F::Addr)> {
    let neighbor = neighbor_enumeration(topo, registry, node)
        .into_iter()
        .nth(index as usize)?;
    let gateway = interface_of(topo, registry, neighbor.remote)?.preferred_address()?;
    trace!(node = ?node, index, device = ?neighbor.local, gateway = %gateway, "解析 nix 编号");
    Some((neighbor.local, gateway))
}

/// 沿父指针从 `dest` 回溯到 `source`，把每一跳的邻居编号追加到 `nix`。
///
/// 两阶段：先按 目的→源 顺序收集跳，再按同样顺序追加，这样转发时
/// （LIFO 提取）在源节点最先取出的是第一跳。`oif` 限定源节点那一跳的出口。
///
/// 父链断开时返回 `false` 且不修改 `nix`；`source == dest` 返回 `true` 且不追加。
pub fn build_nix_vector<F: AddressFamily>(
    topo: &Topology,
    registry: &NixRegistry<F>,
    parents: &[Option<NodeId>],
    source: NodeId,
    dest: NodeId,
    oif: Option<DeviceId>,
    nix: &mut NixVector,
) -> bool {
    // 阶段一：收集 (parent, child)，目的→源
    let mut hops = Vec::new();
    let mut child = dest;
    while child != source {
        let Some(parent) = parents.get(child.0).copied().flatten() else {
            debug!(node = ?child, "父链断开");
            return false;
        };
        if hops.len() >= parents.len() {
            debug!("父链出现环");
            return false;
        }
        hops.push((parent, child));
        child = parent;
    }

    // 阶段二：计算编号
    let mut encoded = Vec::with_capacity(hops.len());
    for &(parent, child) in &hops {
        let neighbors = neighbor_enumeration(topo, registry, parent);
        let required = if parent == source { oif } else { None };
        let Some(index) = neighbors.iter().position(|n| {
            n.node == child
                && topo.device(n.local).link_up
                && required.is_none_or(|d| n.local == d)
        }) else {
            debug!(parent = ?parent, child = ?child, "父节点的邻居中找不到子节点");
            return false;
        };
        encoded.push((index as u32, NixVector::bit_count(neighbors.len() as u32)));
    }

    for (index, width) in encoded {
        nix.add_neighbor_index(index, width);
    }
    trace!(hops = hops.len(), bits = nix.total_bits(), "构建 nix-vector");
    true
}
