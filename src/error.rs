//! 错误类型
//!
//! 可恢复的错误（目的不可达、缓冲区截断等）通过这里的枚举返回；
//! 建模错误（位宽越界、重复地址、输入包缺少 nix-vector）直接 panic。

use thiserror::Error;

use crate::net::NodeId;

/// 路由协议向上层报告的 socket 风格错误码
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketError {
    /// 目的地址不在任何节点上，或者 BFS 找不到路径
    #[error("no route to host")]
    NoRouteToHost,
}

/// nix-vector 反序列化 / 序列化错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NixVectorError {
    /// 缓冲区比声明的长度短
    #[error("nix-vector buffer truncated: need {needed} words, got {available}")]
    Truncated { needed: usize, available: usize },
    /// 序列化目标缓冲区不够大
    #[error("output buffer too small: need {needed} words, got {available}")]
    BufferTooSmall { needed: usize, available: usize },
    /// `used` 超过了 `total`
    #[error("inconsistent nix-vector cursor: used {used} > total {total}")]
    InconsistentCursor { used: u32, total: u32 },
}

/// `Network::send` 的失败原因
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// 源节点 route_output 失败
    #[error("route output failed at node {node}: {err}")]
    RouteOutput { node: NodeId, err: SocketError },
    /// 网关地址不属于任何节点
    #[error("gateway {gateway} is not owned by any node (path {path:?})")]
    UnknownGateway { gateway: String, path: Vec<NodeId> },
    /// TTL 耗尽
    #[error("ttl expired at node {node} (path {path:?})")]
    TtlExpired { node: NodeId, path: Vec<NodeId> },
    /// 路由协议没有接手该数据包
    #[error("packet not handled by routing at node {node} (path {path:?})")]
    NotHandled { node: NodeId, path: Vec<NodeId> },
    /// 路由协议通过错误回调拒绝了数据包
    #[error("routing rejected packet at node {node}: {err} (path {path:?})")]
    Rejected {
        node: NodeId,
        err: SocketError,
        path: Vec<NodeId>,
    },
}
