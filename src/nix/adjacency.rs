//! 邻接扫描
//!
//! 给定本地网卡及其信道，列出同一信道上可作为下一跳的远端网卡：
//! 远端接口必须 up 且与本地接口至少共享一个子网（IPv6 忽略 link-local）。
//! 网桥端口不算邻居：遇到网桥端口时递归扫描该网桥其它端口所在的信道，
//! 使网桥在三层上透明。

use std::collections::HashSet;

use tracing::trace;

use super::registry::NixRegistry;
use crate::net::{AddressFamily, ChannelId, DeviceId, IpInterface, Topology};

/// 网卡在所属节点上的 `F` 接口
pub(crate) fn interface_of<'t, F: AddressFamily>(
    topo: &'t Topology,
    registry: &NixRegistry<F>,
    device: DeviceId,
) -> Option<&'t IpInterface<F>> {
    let iface = registry.interface_for_device(topo, device)?;
    let node = topo.device(device).node;
    topo.stack::<F>(node).interface(iface)
}

/// 列出 `device` 经由 `channel` 可达的相邻网卡，按发现顺序
pub fn adjacent_net_devices<F: AddressFamily>(
    topo: &Topology,
    registry: &NixRegistry<F>,
    device: DeviceId,
    channel: ChannelId,
) -> Vec<DeviceId> {
    let mut out = Vec::new();
    let Some(local) = interface_of(topo, registry, device) else {
        trace!(device = ?device, "本地网卡没有 IP 接口");
        return out;
    };
    if !local.up {
        trace!(device = ?device, "本地接口 down");
        return out;
    }
    let mut visited = HashSet::new();
    scan(topo, registry, device, local, channel, &mut visited, &mut out);
    out
}

fn scan<F: AddressFamily>(
    topo: &Topology,
    registry: &NixRegistry<F>,
    device: DeviceId,
    local: &IpInterface<F>,
    channel: ChannelId,
    visited: &mut HashSet<ChannelId>,
    out: &mut Vec<DeviceId>,
) {
    if !visited.insert(channel) {
        return;
    }
    for &remote in &topo.channel(channel).devices {
        if remote == device {
            continue;
        }
        if let Some(bridge) = topo.bridge_of(remote) {
            trace!(port = ?remote, bridge = ?bridge, "穿过网桥");
            for &port in topo.device(bridge).bridge_ports() {
                if port == remote {
                    continue;
                }
                if let Some(ch) = topo.device(port).channel {
                    scan(topo, registry, device, local, ch, visited, out);
                }
            }
            continue;
        }
        let Some(remote_if) = interface_of(topo, registry, remote) else {
            continue;
        };
        if !remote_if.up || !shares_subnet(local, remote_if) {
            continue;
        }
        out.push(remote);
    }
}

fn shares_subnet<F: AddressFamily>(local: &IpInterface<F>, remote: &IpInterface<F>) -> bool {
    let routable = |n: &&F::Net| !F::is_link_local(&F::addr_of(n));
    local.addresses.iter().filter(routable).any(|ln| {
        remote
            .addresses
            .iter()
            .filter(routable)
            .any(|rn| F::net_contains(ln, &F::addr_of(rn)))
    })
}
