//! 二层网桥拓扑
//!
//! 一个网桥节点，每个主机通过独立的点对点链路接到网桥的一个端口。
//! 网桥端口没有 IP 地址；所有主机网卡位于同一子网，因此互为直接邻居。

use super::{SubnetPlan, assign_hosts};
use crate::net::{DeviceId, NodeId, Topology};

#[derive(Debug, Clone)]
pub struct BridgedLan {
    pub bridge_node: NodeId,
    pub bridge: DeviceId,
    pub hosts: Vec<NodeId>,
    /// 与 `hosts` 一一对应的主机网卡
    pub host_devices: Vec<DeviceId>,
}

/// 把已有节点 `members` 经网桥接入子网 `net`
pub fn bridge_members<F: SubnetPlan>(
    topo: &mut Topology,
    bridge_node: NodeId,
    members: &[NodeId],
    net: &F::Net,
) -> (DeviceId, Vec<DeviceId>) {
    let mut ports = Vec::with_capacity(members.len());
    let mut host_devices = Vec::with_capacity(members.len());
    for &m in members {
        let (dev, port) = topo.connect(m, bridge_node);
        host_devices.push(dev);
        ports.push(port);
    }
    let bridge = topo.add_bridge(bridge_node, &ports);
    assign_hosts::<F>(topo, net, &host_devices);
    (bridge, host_devices)
}

/// 新建 `n_hosts` 个主机 h0..hn 和网桥节点 br，使用第 0 个自动子网
pub fn build_bridged_lan<F: SubnetPlan>(topo: &mut Topology, n_hosts: usize) -> BridgedLan {
    let hosts: Vec<NodeId> = (0..n_hosts).map(|i| topo.add_node(format!("h{i}"))).collect();
    let bridge_node = topo.add_node("br");
    let net = F::auto_subnet(0);
    let (bridge, host_devices) = bridge_members::<F>(topo, bridge_node, &hosts, &net);
    BridgedLan {
        bridge_node,
        bridge,
        hosts,
        host_devices,
    }
}
