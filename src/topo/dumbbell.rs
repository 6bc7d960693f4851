//! Dumbbell 拓扑构建

use super::{SubnetAllocator, SubnetPlan};
use crate::net::{NodeId, Topology};

#[derive(Debug, Clone, Copy)]
pub struct Dumbbell {
    pub h0: NodeId,
    pub s0: NodeId,
    pub s1: NodeId,
    pub h1: NodeId,
}

impl Dumbbell {
    /// 从 h0 到 h1 的最短路径
    pub fn route(&self) -> Vec<NodeId> {
        vec![self.h0, self.s0, self.s1, self.h1]
    }
}

/// 构建 dumbbell 拓扑
///
/// 拓扑结构：h0 <-> s0 <-> s1 <-> h1，三条链路各占一个子网
pub fn build_dumbbell<F: SubnetPlan>(topo: &mut Topology) -> Dumbbell {
    let h0 = topo.add_node("h0");
    let h1 = topo.add_node("h1");
    let s0 = topo.add_node("s0");
    let s1 = topo.add_node("s1");

    let mut subnets = SubnetAllocator::new();
    // h0 <-> s0
    subnets.link::<F>(topo, h0, s0);
    // s0 <-> s1 (bottleneck)
    subnets.link::<F>(topo, s0, s1);
    // s1 <-> h1
    subnets.link::<F>(topo, s1, h1);

    Dumbbell { h0, s0, s1, h1 }
}
