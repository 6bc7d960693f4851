//! 节点与 IP 协议栈
//!
//! 每个节点持有一组网卡（按 if_index 排列）以及 IPv4 / IPv6 两个协议栈。
//! 协议栈的接口 0 总是绑定在 loopback 网卡上。

use super::family::{AddressFamily, Ipv4, Ipv6};
use super::id::{DeviceId, NodeId};

/// 网络节点
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    /// 按 if_index 排列的网卡
    pub(crate) devices: Vec<DeviceId>,
    pub(crate) ipv4: IpStack<Ipv4>,
    pub(crate) ipv6: IpStack<Ipv6>,
}

impl Node {
    pub(crate) fn new(id: NodeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            devices: Vec::new(),
            ipv4: IpStack::default(),
            ipv6: IpStack::default(),
        }
    }

    /// 获取节点标识符
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// 获取节点名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 节点上的网卡，按 if_index 顺序
    pub fn devices(&self) -> &[DeviceId] {
        &self.devices
    }

    pub fn n_devices(&self) -> usize {
        self.devices.len()
    }

    pub fn stack<F: AddressFamily>(&self) -> &IpStack<F> {
        F::stack(self)
    }
}

/// 某个地址族的 IP 接口
#[derive(Debug, Clone)]
pub struct IpInterface<F: AddressFamily> {
    pub device: DeviceId,
    /// 接口地址（带前缀长度），按添加顺序
    pub addresses: Vec<F::Net>,
    pub up: bool,
    pub forwarding: bool,
}

impl<F: AddressFamily> IpInterface<F> {
    fn new(device: DeviceId) -> Self {
        Self {
            device,
            addresses: Vec::new(),
            up: true,
            forwarding: true,
        }
    }

    /// 第一个接口地址，按添加顺序
    pub fn first_address(&self) -> Option<F::Addr> {
        self.addresses.first().map(F::addr_of)
    }

    /// 用作网关 / 转发源地址：第一个非 link-local 地址，没有则取第一个地址
    pub fn preferred_address(&self) -> Option<F::Addr> {
        self.addresses
            .iter()
            .map(F::addr_of)
            .find(|a| !F::is_link_local(a))
            .or_else(|| self.first_address())
    }
}

/// 某个地址族的协议栈：接口列表
#[derive(Debug, Clone)]
pub struct IpStack<F: AddressFamily> {
    interfaces: Vec<IpInterface<F>>,
}

impl<F: AddressFamily> Default for IpStack<F> {
    fn default() -> Self {
        Self {
            interfaces: Vec::new(),
        }
    }
}

impl<F: AddressFamily> IpStack<F> {
    pub fn interfaces(&self) -> &[IpInterface<F>] {
        &self.interfaces
    }

    pub fn interface(&self, index: usize) -> Option<&IpInterface<F>> {
        self.interfaces.get(index)
    }

    pub(crate) fn interface_mut(&mut self, index: usize) -> Option<&mut IpInterface<F>> {
        self.interfaces.get_mut(index)
    }

    pub fn n_interfaces(&self) -> usize {
        self.interfaces.len()
    }

    pub fn interface_for_device(&self, device: DeviceId) -> Option<usize> {
        self.interfaces.iter().position(|i| i.device == device)
    }

    pub fn is_up(&self, index: usize) -> bool {
        self.interfaces.get(index).is_some_and(|i| i.up)
    }

    pub fn is_forwarding(&self, index: usize) -> bool {
        self.interfaces.get(index).is_some_and(|i| i.forwarding)
    }

    /// 地址是否属于本协议栈的任一接口
    pub fn is_destination_address(&self, addr: &F::Addr) -> bool {
        self.interfaces
            .iter()
            .flat_map(|i| i.addresses.iter())
            .any(|n| F::addr_of(n) == *addr)
    }

    /// 找到持有给定地址的接口
    pub fn interface_for_address(&self, addr: &F::Addr) -> Option<usize> {
        self.interfaces
            .iter()
            .position(|i| i.addresses.iter().any(|n| F::addr_of(n) == *addr))
    }

    /// 发包源地址选择：优先与目的同子网的地址，其次第一个非 link-local 地址。
    pub fn source_address_selection(&self, index: usize, dest: &F::Addr) -> Option<F::Addr> {
        let iface = self.interfaces.get(index)?;
        iface
            .addresses
            .iter()
            .find(|n| F::net_contains(n, dest))
            .or_else(|| {
                iface
                    .addresses
                    .iter()
                    .find(|n| !F::is_link_local(&F::addr_of(n)))
            })
            .or_else(|| iface.addresses.first())
            .map(F::addr_of)
    }

    pub(crate) fn add_interface(&mut self, device: DeviceId) -> usize {
        self.interfaces.push(IpInterface::new(device));
        self.interfaces.len() - 1
    }
}
