//! 网络模型
//!
//! 路由引擎所依赖的外部协作者的最小模型：节点、网卡、信道、网桥、
//! 按地址族区分的 IP 协议栈、数据包，以及逐跳转发驱动。

// 子模块声明
mod device;
mod family;
mod id;
mod network;
mod node;
mod packet;
mod protocol;
mod route;
mod stats;
mod topology;

// 重新导出公共接口
pub use device::{Channel, DeviceKind, NetDevice};
pub use family::{AddressFamily, InputScreen, Ipv4, Ipv6};
pub use id::{ChannelId, DeviceId, NodeId};
pub use network::{Delivery, Network};
pub use node::{IpInterface, IpStack, Node};
pub use packet::Packet;
pub use protocol::{InputCallbacks, RoutingProtocol};
pub use route::{IpHeader, Route};
pub use stats::Stats;
pub use topology::Topology;
