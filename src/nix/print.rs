//! 诊断输出：路由表和路由路径
//!
//! 纯人读格式，列宽不构成兼容性约定。

use std::fmt::{self, Write};

use super::path::{find_net_device_for_nix_index, find_total_neighbors};
use super::routing::NixVectorRouting;
use super::vector::NixVector;
use crate::net::{AddressFamily, NodeId, Topology};

impl<F: AddressFamily> NixVectorRouting<F> {
    /// 打印本实例的 NixCache 和 RouteCache
    pub fn write_routing_table(&mut self, topo: &Topology, out: &mut dyn Write) -> fmt::Result {
        self.check_cache_state_and_flush();
        let node = self.bound_node();
        writeln!(
            out,
            "Node: {}, Name: {}, Nix Routing ({})",
            node,
            topo.node(node).name(),
            F::NAME
        )?;

        writeln!(out, "NixCache:")?;
        if !self.nix_cache.is_empty() {
            writeln!(out, "{:>30}{}", "Destination", "NixVector")?;
            for (dest, nix) in &self.nix_cache {
                writeln!(out, "{:>30}{}", dest.to_string(), nix)?;
            }
        }

        writeln!(out, "IpRouteCache:")?;
        if !self.route_cache.is_empty() {
            writeln!(
                out,
                "{:>30}{:>30}{:>30}{}",
                "Destination", "Gateway", "Source", "OutputDevice"
            )?;
            for (dest, route) in &self.route_cache {
                writeln!(
                    out,
                    "{:>30}{:>30}{:>30}{}",
                    dest.to_string(),
                    route.gateway.to_string(),
                    route.source.to_string(),
                    topo.device(route.output_device).if_index
                )?;
            }
        }
        writeln!(out)
    }

    /// 打印从 `source` 到 `dest` 的逐跳路径
    ///
    /// `source` 为本实例所在节点时使用并填充本实例的 NixCache；否则只临时计算。
    pub fn print_routing_path(
        &mut self,
        topo: &Topology,
        source: NodeId,
        dest: F::Addr,
        out: &mut dyn Write,
    ) -> fmt::Result {
        self.check_cache_state_and_flush();
        writeln!(out, "Nix Routing ({})", F::NAME)?;
        write!(out, "Route path from ")?;

        let Some(dest_node) = self.registry().node_by_address(topo, &dest) else {
            return writeln!(out, "Node {source} to {dest}: no such destination\n");
        };
        write!(out, "Node {source} to Node {dest_node}, ")?;

        if source == dest_node {
            writeln!(out, "Nix Vector: -")?;
            let here = format!("(Node {dest_node})");
            writeln!(
                out,
                "{:>25}{:>10}  ---->  {:>25}{:>10}",
                dest.to_string(),
                here,
                dest.to_string(),
                here
            )?;
            return writeln!(out);
        }

        let cached = if Some(source) == self.node() {
            match self.nix_cache.get(&dest) {
                Some(nix) => Some(nix.clone()),
                None => {
                    let built = self.get_nix_vector(topo, source, dest, None);
                    if let Some(nix) = &built {
                        self.nix_cache.insert(dest, nix.clone());
                    }
                    built
                }
            }
        } else {
            self.get_nix_vector(topo, source, dest, None)
        };
        let Some(mut nix) = cached else {
            return writeln!(out, "Nix Vector: no route\n");
        };
        writeln!(out, "Nix Vector: {} ({} bits left)", nix, nix.remaining_bits())?;

        let registry = self.registry();
        let mut curr = source;
        while curr != dest_node {
            let width = NixVector::bit_count(find_total_neighbors(topo, registry, curr));
            if width > nix.remaining_bits() {
                writeln!(out, "  <nix-vector exhausted at Node {curr}>")?;
                break;
            }
            let index = nix.extract_neighbor_index(width);
            let Some((device, gateway)) =
                find_net_device_for_nix_index(topo, registry, curr, index)
            else {
                writeln!(out, "  <index {index} does not resolve at Node {curr}>")?;
                break;
            };
            let stack = topo.stack::<F>(curr);
            let iface = stack.interface_for_device(device);
            let from_addr = iface.and_then(|i| {
                if curr == source {
                    stack.source_address_selection(i, &dest)
                } else {
                    stack.interface(i).and_then(|i| i.preferred_address())
                }
            });
            let Some(next) = registry.node_by_address(topo, &gateway) else {
                writeln!(out, "  <gateway {gateway} is not owned by any node>")?;
                break;
            };
            let to_addr = if next == dest_node { dest } else { gateway };
            writeln!(
                out,
                "{:>25}{:>10}  ---->  {:>25}{:>10}",
                from_addr.map(|a| a.to_string()).unwrap_or_default(),
                format!("(Node {curr})"),
                to_addr.to_string(),
                format!("(Node {next})")
            )?;
            curr = next;
        }
        writeln!(out)
    }
}
