//! 网卡与信道
//!
//! 网卡挂在节点上，可选地接入一个信道；同一信道上的网卡互相可达。
//! 网桥（Bridge）是一个没有信道的逻辑网卡，把若干端口网卡桥接在一起。

use super::id::{ChannelId, DeviceId, NodeId};

/// 网卡类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceKind {
    Loopback,
    /// 普通网卡（点对点或共享介质）
    Ethernet,
    /// 网桥，`ports` 为被桥接的端口网卡
    Bridge { ports: Vec<DeviceId> },
}

/// 网卡
#[derive(Debug, Clone)]
pub struct NetDevice {
    pub id: DeviceId,
    pub node: NodeId,
    /// 在所属节点上的下标
    pub if_index: usize,
    pub channel: Option<ChannelId>,
    pub link_up: bool,
    pub kind: DeviceKind,
}

impl NetDevice {
    pub fn is_bridge(&self) -> bool {
        matches!(self.kind, DeviceKind::Bridge { .. })
    }

    /// 网桥端口；非网桥返回空切片
    pub fn bridge_ports(&self) -> &[DeviceId] {
        match &self.kind {
            DeviceKind::Bridge { ports } => ports,
            _ => &[],
        }
    }
}

/// 信道：按接入顺序记录挂在其上的网卡
#[derive(Debug, Clone)]
pub struct Channel {
    pub id: ChannelId,
    pub devices: Vec<DeviceId>,
}

