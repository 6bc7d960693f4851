//! Nix-vector 路由
//!
//! 按需在模拟拓扑上做 BFS 求最短路，把路径编码成逐跳邻居编号的位向量随包携带，
//! 每个转发节点只解出自己那一跳，不需要完整的路由表。

mod adjacency;
mod bfs;
mod path;
mod print;
mod registry;
mod routing;
mod vector;

pub use adjacency::adjacent_net_devices;
pub use bfs::{ParentVector, bfs};
pub use path::{
    Neighbor, build_nix_vector, find_net_device_for_nix_index, find_total_neighbors,
    neighbor_enumeration,
};
pub use registry::NixRegistry;
pub use routing::NixVectorRouting;
pub use vector::NixVector;
