//! 拓扑构建
//!
//! 构建函数只修改 [`Topology`]；用构建好的拓扑创建 [`crate::net::Network`]
//! 即可开始路由。每条链路分配一个独立子网，两端分别取第 1、2 个主机地址。

pub mod bridged_lan;
pub mod dumbbell;
pub mod fat_tree;
pub mod spec;

use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use ipnet::{Ipv4Net, Ipv6Net};

use crate::net::{AddressFamily, DeviceId, Ipv4, Ipv6, NodeId, Topology};

/// 地址族的子网编址规则
pub trait SubnetPlan: AddressFamily {
    /// 第 `subnet` 个自动分配子网
    fn auto_subnet(subnet: u32) -> Self::Net;

    /// 子网中第 `n` 个主机地址（n 从 0 开始，跳过网络地址），保留前缀长度
    fn nth_host(net: &Self::Net, n: u32) -> Option<Self::Net>;

    fn parse_net(s: &str) -> Option<Self::Net>;
}

impl SubnetPlan for Ipv4 {
    /// 10.x.y.0/24
    fn auto_subnet(subnet: u32) -> Ipv4Net {
        let addr = Ipv4Addr::new(10, (subnet >> 8) as u8, subnet as u8, 0);
        Ipv4Net::new(addr, 24).unwrap_or_else(|e| unreachable!("{e}"))
    }

    fn nth_host(net: &Ipv4Net, n: u32) -> Option<Ipv4Net> {
        let base = u32::from(net.network());
        let addr = Ipv4Addr::from(base.checked_add(n)?.checked_add(1)?);
        let is_broadcast = net.prefix_len() < 31 && addr == net.broadcast();
        if !net.contains(&addr) || is_broadcast {
            return None;
        }
        Ipv4Net::new(addr, net.prefix_len()).ok()
    }

    fn parse_net(s: &str) -> Option<Ipv4Net> {
        Ipv4Net::from_str(s).ok()
    }
}

impl SubnetPlan for Ipv6 {
    /// 2001:db8:0:x::/64
    fn auto_subnet(subnet: u32) -> Ipv6Net {
        let addr = Ipv6Addr::new(0x2001, 0xdb8, (subnet >> 16) as u16, subnet as u16, 0, 0, 0, 0);
        Ipv6Net::new(addr, 64).unwrap_or_else(|e| unreachable!("{e}"))
    }

    fn nth_host(net: &Ipv6Net, n: u32) -> Option<Ipv6Net> {
        let base = u128::from(net.network());
        let addr = Ipv6Addr::from(base.checked_add(u128::from(n) + 1)?);
        if !net.contains(&addr) {
            return None;
        }
        Ipv6Net::new(addr, net.prefix_len()).ok()
    }

    fn parse_net(s: &str) -> Option<Ipv6Net> {
        Ipv6Net::from_str(s).ok()
    }
}

/// 顺序分配自动子网
#[derive(Debug, Default, Clone)]
pub struct SubnetAllocator {
    next: u32,
}

impl SubnetAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_subnet<F: SubnetPlan>(&mut self) -> F::Net {
        let net = F::auto_subnet(self.next);
        self.next += 1;
        net
    }

    /// 点对点连接并编址，返回两端网卡
    pub fn link<F: SubnetPlan>(
        &mut self,
        topo: &mut Topology,
        a: NodeId,
        b: NodeId,
    ) -> (DeviceId, DeviceId) {
        let net = self.next_subnet::<F>();
        let (da, db) = topo.connect(a, b);
        assign_hosts::<F>(topo, &net, &[da, db]);
        (da, db)
    }
}

/// 按顺序给网卡分配子网中的主机地址
///
/// # Panics
/// 子网放不下这么多主机
pub fn assign_hosts<F: SubnetPlan>(topo: &mut Topology, net: &F::Net, devices: &[DeviceId]) {
    for (n, &dev) in devices.iter().enumerate() {
        let host = F::nth_host(net, n as u32)
            .unwrap_or_else(|| panic!("subnet {net} has no room for host #{n}"));
        topo.assign::<F>(dev, host);
    }
}
