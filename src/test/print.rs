use super::{addr_of, build_line};
use crate::net::{Ipv4, Network, Topology};
use std::net::Ipv4Addr;

#[test]
fn routing_path_lists_every_hop() {
    let mut topo = Topology::default();
    let (n, links) = build_line::<Ipv4>(&mut topo, 3);
    let dest = addr_of::<Ipv4>(&topo, links[1].1);
    let mut net = Network::<Ipv4>::new(topo);

    let mut out = String::new();
    net.print_routing_path(n[0], dest, &mut out).expect("write");

    assert!(out.starts_with("Nix Routing (IPv4)\n"), "{out}");
    assert!(
        out.contains("Route path from Node 0 to Node 2, Nix Vector: 01 (2 bits left)"),
        "{out}"
    );
    let hops: Vec<&str> = out.lines().filter(|l| l.contains("---->")).collect();
    assert_eq!(hops.len(), 2, "{out}");
    assert!(hops[0].contains("10.0.0.1") && hops[0].contains("(Node 0)"));
    assert!(hops[0].contains("10.0.0.2") && hops[0].contains("(Node 1)"));
    assert!(hops[1].contains("10.0.1.1") && hops[1].contains("10.0.1.2"));
    assert!(hops[1].trim_end().ends_with("(Node 2)"));

    // Printing from the bound node fills its cache.
    assert_eq!(net.routing(n[0]).nix_cache_len(), 1);
}

#[test]
fn routing_path_to_self_and_nowhere() {
    let mut topo = Topology::default();
    let (n, links) = build_line::<Ipv4>(&mut topo, 2);
    let own = addr_of::<Ipv4>(&topo, links[0].0);
    let mut net = Network::<Ipv4>::new(topo);

    let mut out = String::new();
    net.print_routing_path(n[0], own, &mut out).expect("write");
    assert!(out.contains("Node 0 to Node 0, Nix Vector: -"), "{out}");

    let mut out = String::new();
    net.print_routing_path(n[0], Ipv4Addr::new(198, 51, 100, 1), &mut out)
        .expect("write");
    assert!(out.contains("no such destination"), "{out}");
}

#[test]
fn routing_table_shows_both_caches() {
    let mut topo = Topology::default();
    let (n, links) = build_line::<Ipv4>(&mut topo, 3);
    let dest = addr_of::<Ipv4>(&topo, links[1].1);
    let mut net = Network::<Ipv4>::new(topo);

    let mut empty = String::new();
    net.print_routing_table(n[0], &mut empty).expect("write");
    assert_eq!(empty, "Node: 0, Name: n0, Nix Routing (IPv4)\nNixCache:\nIpRouteCache:\n\n");

    net.send(n[0], dest, 64).expect("delivered");
    let mut out = String::new();
    net.print_routing_table(n[0], &mut out).expect("write");

    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[0], "Node: 0, Name: n0, Nix Routing (IPv4)");
    assert_eq!(lines[1], "NixCache:");
    assert!(lines[2].contains("Destination") && lines[2].contains("NixVector"));
    assert!(lines[3].contains("10.0.1.2") && lines[3].ends_with("01"));
    assert_eq!(lines[4], "IpRouteCache:");
    assert!(lines[5].contains("Gateway") && lines[5].contains("OutputDevice"));
    assert!(lines[6].contains("10.0.1.2") && lines[6].contains("10.0.0.2"));
}
