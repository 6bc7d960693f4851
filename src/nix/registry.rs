//! 全局索引与脏标记
//!
//! 同一地址族的所有 nix 路由实例共享一个 [`NixRegistry`]：
//! - 地址 → 节点 的全局索引
//! - 网卡 → 接口下标 的全局索引
//! - 拓扑脏标记与纪元（epoch）
//!
//! 任何拓扑变化通知只置脏标记；下一次任意实例的路由调用发现脏标记后执行一次
//! 全局 flush：清空两个索引并推进纪元。各实例发现自己的缓存纪元落后时清空
//! 自己的缓存，所以 flush 之后所有实例都会重新计算。
//!
//! 仿真是单线程的，这里用 `Cell` / `RefCell` 做内部可变性。

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use tracing::{debug, trace};

use crate::net::{AddressFamily, DeviceId, NodeId, Topology};

pub struct NixRegistry<F: AddressFamily> {
    dirty: Cell<bool>,
    epoch: Cell<u32>,
    address_to_node: RefCell<HashMap<F::Addr, NodeId>>,
    device_to_interface: RefCell<HashMap<DeviceId, usize>>,
}

impl<F: AddressFamily> Default for NixRegistry<F> {
    fn default() -> Self {
        Self {
            dirty: Cell::new(false),
            epoch: Cell::new(0),
            address_to_node: RefCell::new(HashMap::new()),
            device_to_interface: RefCell::new(HashMap::new()),
        }
    }
}

impl<F: AddressFamily> std::fmt::Debug for NixRegistry<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NixRegistry")
            .field("family", &F::NAME)
            .field("dirty", &self.dirty.get())
            .field("epoch", &self.epoch.get())
            .field("addresses", &self.address_to_node.borrow().len())
            .field("devices", &self.device_to_interface.borrow().len())
            .finish()
    }
}

impl<F: AddressFamily> NixRegistry<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 拓扑发生变化
    pub fn mark_dirty(&self) {
        trace!(family = F::NAME, "标记路由缓存为脏");
        self.dirty.set(true);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// 当前纪元；每次 flush 加一
    pub fn epoch(&self) -> u32 {
        self.epoch.get()
    }

    /// 若脏则 flush，返回是否执行了 flush
    pub fn check_and_flush(&self) -> bool {
        if self.dirty.get() {
            self.flush();
            true
        } else {
            false
        }
    }

    /// 全局 flush：清空索引、推进纪元、清除脏标记
    pub fn flush(&self) {
        self.address_to_node.borrow_mut().clear();
        self.device_to_interface.borrow_mut().clear();
        self.epoch.set(self.epoch.get().wrapping_add(1));
        self.dirty.set(false);
        debug!(family = F::NAME, epoch = self.epoch.get(), "🧹 全局 flush nix 路由缓存");
    }

    /// 地址索引当前条目数（0 表示尚未构建或刚被 flush）
    pub fn address_index_len(&self) -> usize {
        self.address_to_node.borrow().len()
    }

    /// 根据地址找到所属节点（惰性构建索引）
    ///
    /// # Panics
    /// 同一地址出现在两个节点上
    pub fn node_by_address(&self, topo: &Topology, addr: &F::Addr) -> Option<NodeId> {
        self.check_and_flush();
        let mut map = self.address_to_node.borrow_mut();
        if map.is_empty() {
            build_address_index::<F>(topo, &mut map);
        }
        let node = map.get(addr).copied();
        if node.is_none() {
            debug!(address = %addr, "找不到持有该地址的节点");
        }
        node
    }

    /// 根据网卡找到其在所属节点上的接口下标（惰性构建索引）
    pub fn interface_for_device(&self, topo: &Topology, device: DeviceId) -> Option<usize> {
        self.check_and_flush();
        let mut map = self.device_to_interface.borrow_mut();
        if map.is_empty() {
            for node in topo.nodes() {
                for (i, iface) in F::stack(node).interfaces().iter().enumerate() {
                    map.insert(iface.device, i);
                }
            }
            trace!(entries = map.len(), "构建网卡→接口索引");
        }
        map.get(&device).copied()
    }
}

fn build_address_index<F: AddressFamily>(topo: &Topology, map: &mut HashMap<F::Addr, NodeId>) {
    for node in topo.nodes() {
        for iface in F::stack(node).interfaces() {
            for net in &iface.addresses {
                let addr = F::addr_of(net);
                if F::is_loopback(&addr) {
                    continue;
                }
                if let Some(prev) = map.insert(addr, node.id()) {
                    if prev != node.id() {
                        panic!(
                            "duplicate {} address {addr} on node {prev} and node {}",
                            F::NAME,
                            node.id()
                        );
                    }
                }
            }
        }
    }
    trace!(entries = map.len(), "构建地址→节点索引");
}
