//! JSON 拓扑描述
//!
//! ```json
//! {
//!   "family": "ipv4",
//!   "nodes": ["a", "b", "c"],
//!   "links": [
//!     { "kind": "point_to_point", "a": "a", "b": "b", "subnet": "10.0.0.0/24" },
//!     { "kind": "lan", "members": ["b", "c"] },
//!     { "kind": "bridge", "bridge": "br", "members": ["a", "c"] }
//!   ]
//! }
//! ```
//!
//! 省略 `subnet` 时按链路顺序自动分配子网。`bridge` 链路的网桥节点必须也在
//! `nodes` 中声明，网桥端口不分配地址。

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::bridged_lan::bridge_members;
use super::{SubnetAllocator, SubnetPlan, assign_hosts};
use crate::net::{NodeId, Topology};

#[derive(Error, Debug)]
pub enum TopologySpecError {
    #[error("failed to read topology file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid topology json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("link {link} references unknown node {name:?}")]
    UnknownNode { link: usize, name: String },
    #[error("duplicate node name {0:?}")]
    DuplicateNode(String),
    #[error("link {link} has invalid {family} subnet {subnet:?}")]
    BadPrefix {
        link: usize,
        family: &'static str,
        subnet: String,
    },
    #[error("link {link} subnet {subnet} cannot hold {hosts} hosts")]
    SubnetTooSmall {
        link: usize,
        subnet: String,
        hosts: usize,
    },
    #[error("link {link} needs at least {min} members, got {got}")]
    TooFewMembers { link: usize, min: usize, got: usize },
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    #[default]
    Ipv4,
    Ipv6,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologySpec {
    #[serde(default)]
    pub family: Family,
    pub nodes: Vec<String>,
    #[serde(default)]
    pub links: Vec<LinkSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LinkSpec {
    PointToPoint {
        a: String,
        b: String,
        #[serde(default)]
        subnet: Option<String>,
        /// 建好后把链路两端置为 down
        #[serde(default)]
        down: bool,
    },
    /// 共享信道
    Lan {
        members: Vec<String>,
        #[serde(default)]
        subnet: Option<String>,
    },
    /// 成员经网桥节点 `bridge` 组成同一子网
    Bridge {
        bridge: String,
        members: Vec<String>,
        #[serde(default)]
        subnet: Option<String>,
    },
}

impl TopologySpec {
    pub fn from_json(s: &str) -> Result<Self, TopologySpecError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TopologySpecError> {
        let s = fs::read_to_string(path)?;
        Self::from_json(&s)
    }

    /// 按描述构建拓扑，地址族为 `F`（`family` 字段由调用方分派）
    pub fn build<F: SubnetPlan>(&self) -> Result<Topology, TopologySpecError> {
        let mut topo = Topology::default();
        for name in &self.nodes {
            if topo.node_by_name(name).is_some() {
                return Err(TopologySpecError::DuplicateNode(name.clone()));
            }
            topo.add_node(name.as_str());
        }

        let mut subnets = SubnetAllocator::new();
        for (idx, link) in self.links.iter().enumerate() {
            let lookup = |topo: &Topology, name: &str| {
                topo.node_by_name(name)
                    .ok_or_else(|| TopologySpecError::UnknownNode {
                        link: idx,
                        name: name.to_string(),
                    })
            };
            let lookup_all = |topo: &Topology, names: &[String]| {
                names
                    .iter()
                    .map(|n| lookup(topo, n.as_str()))
                    .collect::<Result<Vec<NodeId>, _>>()
            };
            let mut subnet = |s: &Option<String>, hosts: usize| -> Result<_, TopologySpecError> {
                let net = match s {
                    Some(s) => F::parse_net(s).ok_or_else(|| TopologySpecError::BadPrefix {
                        link: idx,
                        family: F::NAME,
                        subnet: s.clone(),
                    })?,
                    None => subnets.next_subnet::<F>(),
                };
                if F::nth_host(&net, hosts as u32 - 1).is_none() {
                    return Err(TopologySpecError::SubnetTooSmall {
                        link: idx,
                        subnet: net.to_string(),
                        hosts,
                    });
                }
                Ok(net)
            };

            match link {
                LinkSpec::PointToPoint {
                    a,
                    b,
                    subnet: s,
                    down,
                } => {
                    let na = lookup(&topo, a)?;
                    let nb = lookup(&topo, b)?;
                    let net = subnet(s, 2)?;
                    let (da, db) = topo.connect(na, nb);
                    assign_hosts::<F>(&mut topo, &net, &[da, db]);
                    if *down {
                        topo.set_link_up(da, false);
                        topo.set_link_up(db, false);
                    }
                }
                LinkSpec::Lan { members, subnet: s } => {
                    check_members(idx, members, 2)?;
                    let nodes = lookup_all(&topo, members)?;
                    let net = subnet(s, nodes.len())?;
                    let (_, devs) = topo.add_lan(&nodes);
                    assign_hosts::<F>(&mut topo, &net, &devs);
                }
                LinkSpec::Bridge {
                    bridge,
                    members,
                    subnet: s,
                } => {
                    check_members(idx, members, 1)?;
                    let br = lookup(&topo, bridge)?;
                    let nodes = lookup_all(&topo, members)?;
                    let net = subnet(s, nodes.len())?;
                    bridge_members::<F>(&mut topo, br, &nodes, &net);
                }
            }
            debug!(link = idx, "构建链路");
        }
        Ok(topo)
    }
}

fn check_members(link: usize, members: &[String], min: usize) -> Result<(), TopologySpecError> {
    if members.len() < min {
        return Err(TopologySpecError::TooFewMembers {
            link,
            min,
            got: members.len(),
        });
    }
    Ok(())
}
