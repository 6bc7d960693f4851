//! 数据包类型
//!
//! 数据包只携带路由需要的元数据；nix-vector 作为包内“头部”随包传递。

use crate::nix::NixVector;

/// 网络数据包
#[derive(Debug, Clone)]
pub struct Packet {
    pub id: u64,
    pub size_bytes: u32,
    /// 已经走过的跳数
    pub hops_taken: u32,
    /// 由源节点 route_output 附加，逐跳消耗
    pub nix_vector: Option<NixVector>,
}

impl Packet {
    /// 创建不带 nix-vector 的数据包
    pub fn new(id: u64, size_bytes: u32) -> Self {
        Self {
            id,
            size_bytes,
            hops_taken: 0,
            nix_vector: None,
        }
    }

    /// 前进一跳（hops_taken 饱和递增）
    pub fn advance(mut self) -> Self {
        self.hops_taken = self.hops_taken.saturating_add(1);
        self
    }
}
