//! 广度优先搜索
//!
//! 以邻接扫描为扩展规则，在全部节点上做 BFS，得到父指针数组。

use std::collections::VecDeque;

use tracing::{debug, trace};

use super::adjacency::{adjacent_net_devices, interface_of};
use super::registry::NixRegistry;
use crate::net::{AddressFamily, ChannelId, DeviceId, NodeId, Topology};

/// `parents[i]` 是第一次发现节点 i 的节点；源节点指向自己，未到达为 `None`
pub type ParentVector = Vec<Option<NodeId>>;

/// 网卡能否用于出发：有 up 的接口且链路 up
fn device_usable<F: AddressFamily>(
    topo: &Topology,
    registry: &NixRegistry<F>,
    device: DeviceId,
) -> bool {
    interface_of(topo, registry, device).is_some_and(|i| i.up) && topo.device(device).link_up
}

/// 从 `source` 搜索到 `dest`。`oif` 给定时，从源节点出发的第一步只走该网卡。
///
/// 只有当 `dest` 成为队首时才算到达；`source == dest` 由调用方处理。
#[tracing::instrument(skip(topo, registry), fields(family = F::NAME))]
pub fn bfs<F: AddressFamily>(
    topo: &Topology,
    registry: &NixRegistry<F>,
    total_nodes: usize,
    source: NodeId,
    dest: NodeId,
    oif: Option<DeviceId>,
) -> Option<ParentVector> {
    let mut parents: ParentVector = vec![None; total_nodes];
    let mut grey = VecDeque::new();
    parents[source.0] = Some(source);
    grey.push_back(source);

    while let Some(&curr) = grey.front() {
        if curr == dest {
            debug!(node = ?curr, "到达目的节点");
            return Some(parents);
        }

        match oif {
            Some(oif) if curr == source => {
                if !device_usable(topo, registry, oif) {
                    debug!(oif = ?oif, "指定出口网卡接口或链路 down");
                    return None;
                }
                let channel = topo.device(oif).channel?;
                expand(topo, registry, curr, oif, channel, &mut parents, &mut grey);
            }
            _ => {
                for &dev in topo.node(curr).devices() {
                    if !device_usable(topo, registry, dev) {
                        continue;
                    }
                    if let Some(channel) = topo.device(dev).channel {
                        expand(topo, registry, curr, dev, channel, &mut parents, &mut grey);
                    }
                }
            }
        }

        grey.pop_front();
    }

    debug!("找不到路径");
    None
}

fn expand<F: AddressFamily>(
    topo: &Topology,
    registry: &NixRegistry<F>,
    curr: NodeId,
    local: DeviceId,
    channel: ChannelId,
    parents: &mut ParentVector,
    grey: &mut VecDeque<NodeId>,
) {
    for remote in adjacent_net_devices(topo, registry, local, channel) {
        let remote_node = topo.device(remote).node;
        if parents[remote_node.0].is_none() {
            trace!(from = ?curr, to = ?remote_node, "发现节点");
            parents[remote_node.0] = Some(curr);
            grey.push_back(remote_node);
        }
    }
}
