//! Fat-tree 拓扑构建
//!
//! 三层 L3 fat-tree：每条链路一个子网，所有交换机都是路由节点。

use super::{SubnetAllocator, SubnetPlan};
use crate::net::{NodeId, Topology};

#[derive(Debug, Clone)]
pub struct FatTreeOpts {
    pub k: usize,
}

impl Default for FatTreeOpts {
    fn default() -> Self {
        Self { k: 4 }
    }
}

#[derive(Debug, Clone)]
pub struct FatTreeTopology {
    pub k: usize,
    pub hosts: Vec<NodeId>,
    pub edge_switches: Vec<NodeId>,
    pub agg_switches: Vec<NodeId>,
    pub core_switches: Vec<NodeId>,
}

impl FatTreeTopology {
    fn half(&self) -> usize {
        self.k / 2
    }

    pub fn host(&self, pod: usize, edge: usize, host: usize) -> NodeId {
        let half = self.half();
        let idx = (pod * half + edge) * half + host;
        self.hosts[idx]
    }

    pub fn edge(&self, pod: usize, edge: usize) -> NodeId {
        let half = self.half();
        let idx = pod * half + edge;
        self.edge_switches[idx]
    }

    pub fn agg(&self, pod: usize, agg: usize) -> NodeId {
        let half = self.half();
        let idx = pod * half + agg;
        self.agg_switches[idx]
    }

    pub fn core(&self, group: usize, index: usize) -> NodeId {
        let half = self.half();
        let idx = group * half + index;
        self.core_switches[idx]
    }

    /// 两个主机之间最短路径的跳数：同 edge 2，同 pod 4，跨 pod 6
    pub fn expected_hops(&self, a: NodeId, b: NodeId) -> usize {
        let ia = self.host_index(a);
        let ib = self.host_index(b);
        let half = self.half();
        let per_pod = half * half;
        if ia == ib {
            0
        } else if ia / half == ib / half {
            2
        } else if ia / per_pod == ib / per_pod {
            4
        } else {
            6
        }
    }

    fn host_index(&self, host: NodeId) -> usize {
        self.hosts
            .iter()
            .position(|&h| h == host)
            .unwrap_or_else(|| panic!("{host:?} is not a fat-tree host"))
    }
}

pub fn build_fat_tree<F: SubnetPlan>(topo: &mut Topology, opts: &FatTreeOpts) -> FatTreeTopology {
    let k = opts.k;
    assert!(k >= 2 && k % 2 == 0, "fat-tree k must be even and >= 2");

    let half = k / 2;
    let mut subnets = SubnetAllocator::new();

    let mut core_switches = Vec::with_capacity(half * half);
    for group in 0..half {
        for index in 0..half {
            let name = format!("c{}_{}", group, index);
            core_switches.push(topo.add_node(name));
        }
    }

    let mut hosts = Vec::with_capacity(k * half * half);
    let mut edge_switches = Vec::with_capacity(k * half);
    let mut agg_switches = Vec::with_capacity(k * half);
    let mut pod_edges: Vec<Vec<NodeId>> = Vec::with_capacity(k);
    let mut pod_aggs: Vec<Vec<NodeId>> = Vec::with_capacity(k);

    for pod in 0..k {
        let mut edges = Vec::with_capacity(half);
        let mut aggs = Vec::with_capacity(half);

        for edge in 0..half {
            let name = format!("p{}_e{}", pod, edge);
            edges.push(topo.add_node(name));
        }
        for agg in 0..half {
            let name = format!("p{}_a{}", pod, agg);
            aggs.push(topo.add_node(name));
        }

        for (edge_idx, edge_id) in edges.iter().enumerate() {
            for host in 0..half {
                let name = format!("h{}_{}_{}", pod, edge_idx, host);
                let host_id = topo.add_node(name);
                subnets.link::<F>(topo, host_id, *edge_id);
                hosts.push(host_id);
            }
        }

        edge_switches.extend(edges.iter().copied());
        agg_switches.extend(aggs.iter().copied());
        pod_edges.push(edges);
        pod_aggs.push(aggs);
    }

    for pod in 0..k {
        for &edge_id in &pod_edges[pod] {
            for &agg_id in &pod_aggs[pod] {
                subnets.link::<F>(topo, edge_id, agg_id);
            }
        }
    }

    for pod in 0..k {
        for agg in 0..half {
            let agg_id = pod_aggs[pod][agg];
            for index in 0..half {
                let core_id = core_switches[agg * half + index];
                subnets.link::<F>(topo, agg_id, core_id);
            }
        }
    }

    FatTreeTopology {
        k,
        hosts,
        edge_switches,
        agg_switches,
        core_switches,
    }
}
