//! 网络拓扑
//!
//! 保存全部节点、网卡和信道，提供建拓扑与查询接口。路由引擎只通过这里的
//! 只读查询观察拓扑；修改拓扑后需要通知路由协议（见 [`super::Network`]）。

use tracing::{debug, trace};

use super::device::{Channel, DeviceKind, NetDevice};
use super::family::AddressFamily;
use super::id::{ChannelId, DeviceId, NodeId};
use super::node::{IpStack, Node};
use super::{Ipv4, Ipv6};

/// 网络拓扑
#[derive(Debug, Default, Clone)]
pub struct Topology {
    nodes: Vec<Node>,
    devices: Vec<NetDevice>,
    channels: Vec<Channel>,
}

impl Topology {
    /// 添加节点；自动创建 loopback 网卡和两个地址族的 loopback 接口
    pub fn add_node(&mut self, name: impl Into<String>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(id, name));
        let lo = self.push_device(id, DeviceKind::Loopback);
        self.assign_loopback::<Ipv4>(id, lo);
        self.assign_loopback::<Ipv6>(id, lo);
        trace!(node = ?id, "添加节点");
        id
    }

    fn assign_loopback<F: AddressFamily>(&mut self, node: NodeId, lo: DeviceId) {
        let stack = F::stack_mut(&mut self.nodes[node.0]);
        let iface = stack.add_interface(lo);
        if let Some(i) = stack.interface_mut(iface) {
            i.addresses.push(F::loopback_net());
            i.forwarding = false;
        }
    }

    fn push_device(&mut self, node: NodeId, kind: DeviceKind) -> DeviceId {
        let id = DeviceId(self.devices.len());
        let n = &mut self.nodes[node.0];
        self.devices.push(NetDevice {
            id,
            node,
            if_index: n.devices.len(),
            channel: None,
            link_up: true,
            kind,
        });
        n.devices.push(id);
        id
    }

    /// 添加一个（尚未接入信道的）普通网卡
    pub fn add_device(&mut self, node: NodeId) -> DeviceId {
        self.push_device(node, DeviceKind::Ethernet)
    }

    /// 创建空信道
    pub fn add_channel(&mut self) -> ChannelId {
        let id = ChannelId(self.channels.len());
        self.channels.push(Channel {
            id,
            devices: Vec::new(),
        });
        id
    }

    /// 把网卡接入信道
    pub fn attach(&mut self, device: DeviceId, channel: ChannelId) {
        let dev = &mut self.devices[device.0];
        assert!(
            dev.channel.is_none(),
            "device {device:?} is already attached to {:?}",
            dev.channel
        );
        dev.channel = Some(channel);
        self.channels[channel.0].devices.push(device);
    }

    /// 点对点连接两个节点，返回两端网卡
    pub fn connect(&mut self, a: NodeId, b: NodeId) -> (DeviceId, DeviceId) {
        let ch = self.add_channel();
        let da = self.add_device(a);
        let db = self.add_device(b);
        self.attach(da, ch);
        self.attach(db, ch);
        debug!(a = ?a, b = ?b, channel = ?ch, "点对点连接");
        (da, db)
    }

    /// 共享介质：所有成员各新增一张网卡接入同一信道
    pub fn add_lan(&mut self, members: &[NodeId]) -> (ChannelId, Vec<DeviceId>) {
        let ch = self.add_channel();
        let devs = members
            .iter()
            .map(|&n| {
                let d = self.add_device(n);
                self.attach(d, ch);
                d
            })
            .collect();
        debug!(channel = ?ch, members = members.len(), "共享信道");
        (ch, devs)
    }

    /// 在节点上创建网桥，桥接给定端口（端口必须属于同一节点）
    pub fn add_bridge(&mut self, node: NodeId, ports: &[DeviceId]) -> DeviceId {
        for p in ports {
            assert_eq!(
                self.devices[p.0].node, node,
                "bridge port {p:?} does not belong to node {node:?}"
            );
        }
        self.push_device(
            node,
            DeviceKind::Bridge {
                ports: ports.to_vec(),
            },
        )
    }

    /// 若网卡是某个网桥的端口，返回该网桥
    pub fn bridge_of(&self, device: DeviceId) -> Option<DeviceId> {
        let node = &self.nodes[self.devices[device.0].node.0];
        node.devices
            .iter()
            .copied()
            .find(|&d| self.devices[d.0].bridge_ports().contains(&device))
    }

    /// 在网卡上创建某地址族的接口（已存在则复用），返回接口下标
    pub fn add_interface<F: AddressFamily>(&mut self, device: DeviceId) -> usize {
        let node = self.devices[device.0].node;
        let stack = F::stack_mut(&mut self.nodes[node.0]);
        match stack.interface_for_device(device) {
            Some(i) => i,
            None => stack.add_interface(device),
        }
    }

    /// 给网卡分配地址；必要时创建接口。返回接口下标
    pub fn assign<F: AddressFamily>(&mut self, device: DeviceId, net: F::Net) -> usize {
        let iface = self.add_interface::<F>(device);
        let node = self.devices[device.0].node;
        self.add_address::<F>(node, iface, net);
        iface
    }

    pub fn add_address<F: AddressFamily>(&mut self, node: NodeId, iface: usize, net: F::Net) {
        let stack = F::stack_mut(&mut self.nodes[node.0]);
        let i = stack
            .interface_mut(iface)
            .unwrap_or_else(|| panic!("node {node:?} has no {} interface {iface}", F::NAME));
        i.addresses.push(net);
        trace!(node = ?node, iface, address = %net, "添加地址");
    }

    /// 删除地址；地址不存在时返回 false
    pub fn remove_address<F: AddressFamily>(
        &mut self,
        node: NodeId,
        iface: usize,
        net: F::Net,
    ) -> bool {
        let stack = F::stack_mut(&mut self.nodes[node.0]);
        let Some(i) = stack.interface_mut(iface) else {
            return false;
        };
        let before = i.addresses.len();
        i.addresses.retain(|n| *n != net);
        before != i.addresses.len()
    }

    pub fn set_interface_up<F: AddressFamily>(&mut self, node: NodeId, iface: usize, up: bool) {
        if let Some(i) = F::stack_mut(&mut self.nodes[node.0]).interface_mut(iface) {
            i.up = up;
        }
    }

    pub fn set_forwarding<F: AddressFamily>(&mut self, node: NodeId, iface: usize, on: bool) {
        if let Some(i) = F::stack_mut(&mut self.nodes[node.0]).interface_mut(iface) {
            i.forwarding = on;
        }
    }

    pub fn set_link_up(&mut self, device: DeviceId, up: bool) {
        self.devices[device.0].link_up = up;
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().find(|n| n.name == name).map(|n| n.id)
    }

    pub fn device(&self, id: DeviceId) -> &NetDevice {
        &self.devices[id.0]
    }

    pub fn channel(&self, id: ChannelId) -> &Channel {
        &self.channels[id.0]
    }

    pub fn stack<F: AddressFamily>(&self, node: NodeId) -> &IpStack<F> {
        F::stack(&self.nodes[node.0])
    }

    /// 节点上持有该地址的网卡
    pub fn device_for_address<F: AddressFamily>(
        &self,
        node: NodeId,
        addr: &F::Addr,
    ) -> Option<DeviceId> {
        let stack = self.stack::<F>(node);
        let iface = stack.interface_for_address(addr)?;
        stack.interface(iface).map(|i| i.device)
    }

    /// 节点第一个非 loopback、非 link-local 的地址
    pub fn primary_address<F: AddressFamily>(&self, node: NodeId) -> Option<F::Addr> {
        self.stack::<F>(node)
            .interfaces()
            .iter()
            .flat_map(|i| i.addresses.iter())
            .map(F::addr_of)
            .find(|a| !F::is_loopback(a) && !F::is_link_local(a))
    }
}
