use crate::net::{Ipv4, Ipv6, Topology};
use crate::nix::{NixRegistry, adjacent_net_devices};
use crate::topo::bridged_lan::build_bridged_lan;
use ipnet::{Ipv4Net, Ipv6Net};

fn v4(s: &str) -> Ipv4Net {
    s.parse().expect("ipv4 prefix")
}

fn v6(s: &str) -> Ipv6Net {
    s.parse().expect("ipv6 prefix")
}

#[test]
fn point_to_point_peer_in_same_subnet_is_adjacent() {
    let mut topo = Topology::default();
    let a = topo.add_node("a");
    let b = topo.add_node("b");
    let (da, db) = topo.connect(a, b);
    topo.assign::<Ipv4>(da, v4("10.0.0.1/24"));
    topo.assign::<Ipv4>(db, v4("10.0.0.2/24"));

    let reg = NixRegistry::<Ipv4>::new();
    let ch = topo.device(da).channel.expect("attached");
    assert_eq!(adjacent_net_devices(&topo, &reg, da, ch), vec![db]);
    assert_eq!(adjacent_net_devices(&topo, &reg, db, ch), vec![da]);
}

#[test]
fn peer_in_other_subnet_is_not_adjacent() {
    let mut topo = Topology::default();
    let a = topo.add_node("a");
    let b = topo.add_node("b");
    let (da, db) = topo.connect(a, b);
    topo.assign::<Ipv4>(da, v4("10.0.0.1/24"));
    topo.assign::<Ipv4>(db, v4("10.0.1.1/24"));

    let reg = NixRegistry::<Ipv4>::new();
    let ch = topo.device(da).channel.expect("attached");
    assert!(adjacent_net_devices(&topo, &reg, da, ch).is_empty());
}

#[test]
fn down_interfaces_are_not_adjacent() {
    let mut topo = Topology::default();
    let a = topo.add_node("a");
    let b = topo.add_node("b");
    let (da, db) = topo.connect(a, b);
    let ia = topo.assign::<Ipv4>(da, v4("10.0.0.1/24"));
    let ib = topo.assign::<Ipv4>(db, v4("10.0.0.2/24"));
    let ch = topo.device(da).channel.expect("attached");

    topo.set_interface_up::<Ipv4>(b, ib, false);
    let reg = NixRegistry::<Ipv4>::new();
    assert!(adjacent_net_devices(&topo, &reg, da, ch).is_empty());

    topo.set_interface_up::<Ipv4>(b, ib, true);
    topo.set_interface_up::<Ipv4>(a, ia, false);
    assert!(adjacent_net_devices(&topo, &reg, da, ch).is_empty());
}

#[test]
fn device_without_interface_has_no_neighbors() {
    let mut topo = Topology::default();
    let a = topo.add_node("a");
    let b = topo.add_node("b");
    let (da, db) = topo.connect(a, b);
    topo.assign::<Ipv4>(db, v4("10.0.0.2/24"));

    let reg = NixRegistry::<Ipv4>::new();
    let ch = topo.device(da).channel.expect("attached");
    assert!(adjacent_net_devices(&topo, &reg, da, ch).is_empty());
}

#[test]
fn shared_channel_lists_members_in_attachment_order() {
    let mut topo = Topology::default();
    let a = topo.add_node("a");
    let b = topo.add_node("b");
    let c = topo.add_node("c");
    let (ch, devs) = topo.add_lan(&[a, b, c]);
    topo.assign::<Ipv4>(devs[0], v4("10.1.0.1/24"));
    topo.assign::<Ipv4>(devs[1], v4("10.1.0.2/24"));
    topo.assign::<Ipv4>(devs[2], v4("10.1.0.3/24"));

    let reg = NixRegistry::<Ipv4>::new();
    assert_eq!(
        adjacent_net_devices(&topo, &reg, devs[0], ch),
        vec![devs[1], devs[2]]
    );
    assert_eq!(
        adjacent_net_devices(&topo, &reg, devs[1], ch),
        vec![devs[0], devs[2]]
    );
}

#[test]
fn bridge_is_transparent() {
    let mut topo = Topology::default();
    let lan = build_bridged_lan::<Ipv4>(&mut topo, 3);

    let reg = NixRegistry::<Ipv4>::new();
    let h0 = lan.host_devices[0];
    let ch = topo.device(h0).channel.expect("attached");
    let adj = adjacent_net_devices(&topo, &reg, h0, ch);
    assert_eq!(adj, vec![lan.host_devices[1], lan.host_devices[2]]);
    for d in adj {
        assert_ne!(topo.device(d).node, lan.bridge_node);
    }
}

#[test]
fn bridge_with_two_ports_on_one_channel_terminates() {
    let mut topo = Topology::default();
    let h = topo.add_node("h");
    let br = topo.add_node("br");
    let ch = topo.add_channel();
    let dh = topo.add_device(h);
    let p0 = topo.add_device(br);
    let p1 = topo.add_device(br);
    topo.attach(dh, ch);
    topo.attach(p0, ch);
    topo.attach(p1, ch);
    topo.add_bridge(br, &[p0, p1]);
    topo.assign::<Ipv4>(dh, v4("10.0.0.1/24"));

    let reg = NixRegistry::<Ipv4>::new();
    assert!(adjacent_net_devices(&topo, &reg, dh, ch).is_empty());
}

#[test]
fn ipv6_link_local_addresses_do_not_make_neighbors() {
    let mut topo = Topology::default();
    let a = topo.add_node("a");
    let b = topo.add_node("b");
    let (da, db) = topo.connect(a, b);
    let ia = topo.assign::<Ipv6>(da, v6("fe80::1/64"));
    let ib = topo.assign::<Ipv6>(db, v6("fe80::2/64"));
    let ch = topo.device(da).channel.expect("attached");

    let reg = NixRegistry::<Ipv6>::new();
    assert!(adjacent_net_devices(&topo, &reg, da, ch).is_empty());

    topo.add_address::<Ipv6>(a, ia, v6("2001:db8::1/64"));
    topo.add_address::<Ipv6>(b, ib, v6("2001:db8::2/64"));
    assert_eq!(adjacent_net_devices(&topo, &reg, da, ch), vec![db]);
}
