//! 统计信息
//!
//! 定义转发统计数据结构。

/// 转发统计信息
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Stats {
    pub delivered_pkts: u64,
    pub delivered_bytes: u64,
    pub dropped_pkts: u64,
    /// 源节点就找不到路由的包
    pub no_route_pkts: u64,
}
