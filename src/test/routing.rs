use super::{Outcome, Recorder, addr_of, build_line};
use crate::error::SocketError;
use crate::net::{
    DeviceId, InputScreen, IpHeader, Ipv4, Ipv6, Network, NodeId, Packet, RoutingProtocol,
    Topology,
};
use crate::nix::{NixRegistry, NixVectorRouting};
use crate::topo::{SubnetAllocator, SubnetPlan};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::rc::Rc;

fn instances<F: SubnetPlan>(
    topo: &Topology,
) -> (Rc<NixRegistry<F>>, Vec<NixVectorRouting<F>>) {
    let reg = Rc::new(NixRegistry::new());
    let routing = topo
        .nodes()
        .iter()
        .map(|n| {
            let mut r = NixVectorRouting::new(Rc::clone(&reg));
            r.set_stack(n.id());
            r
        })
        .collect();
    (reg, routing)
}

fn header_v4(dest: Ipv4Addr) -> IpHeader<Ipv4> {
    IpHeader::new(Ipv4Addr::UNSPECIFIED, dest, 64)
}

#[test]
fn route_output_attaches_vector_and_picks_first_hop() {
    let mut topo = Topology::default();
    let (n, links) = build_line::<Ipv4>(&mut topo, 3);
    let (_reg, mut r) = instances::<Ipv4>(&topo);
    let dest = addr_of::<Ipv4>(&topo, links[1].1);

    let mut pkt = Packet::new(1, 100);
    let route = r[0]
        .route_output(&topo, Some(&mut pkt), &header_v4(dest), None)
        .expect("route");
    assert_eq!(route.destination, dest);
    assert_eq!(route.output_device, links[0].0);
    assert_eq!(route.gateway, addr_of::<Ipv4>(&topo, links[0].1));
    assert_eq!(route.source, addr_of::<Ipv4>(&topo, links[0].0));

    let nix = pkt.nix_vector.as_ref().expect("vector attached");
    assert_eq!(nix.total_bits(), 2);
    assert_eq!(nix.remaining_bits(), 1);

    let cached = r[0].cached_nix_vector(&dest).expect("nix cached");
    assert_eq!(cached.remaining_bits(), 2);
    assert_eq!(r[0].cached_route(&dest), Some(&route));
    assert_eq!(r[0].node(), Some(n[0]));
}

#[test]
fn forwarding_node_consumes_its_hop() {
    let mut topo = Topology::default();
    let (_n, links) = build_line::<Ipv4>(&mut topo, 3);
    let (_reg, mut r) = instances::<Ipv4>(&topo);
    let dest = addr_of::<Ipv4>(&topo, links[1].1);
    let header = header_v4(dest);

    let mut pkt = Packet::new(1, 100);
    r[0].route_output(&topo, Some(&mut pkt), &header, None)
        .expect("route");

    let mut rec = Recorder::<Ipv4>::new();
    r[1].route_input(&topo, pkt, &header, links[0].1, &mut rec)
        .expect("handled");
    match rec.outcomes.as_slice() {
        [Outcome::Forward(route, pkt)] => {
            assert_eq!(route.output_device, links[1].0);
            assert_eq!(route.gateway, dest);
            assert_eq!(route.source, addr_of::<Ipv4>(&topo, links[1].0));
            assert_eq!(pkt.nix_vector.as_ref().map(|v| v.remaining_bits()), Some(0));
        }
        other => panic!("unexpected outcomes {other:?}"),
    }
}

#[test]
fn routes_to_self_are_rejected() {
    let mut topo = Topology::default();
    let (n, links) = build_line::<Ipv4>(&mut topo, 2);
    let (_reg, mut r) = instances::<Ipv4>(&topo);
    let own = addr_of::<Ipv4>(&topo, links[0].0);

    assert!(r[0].get_nix_vector(&topo, n[0], own, None).is_none());
    assert_eq!(
        r[0].route_output(&topo, None, &header_v4(own), None),
        Err(SocketError::NoRouteToHost)
    );
    assert_eq!(r[0].nix_cache_len(), 0);
}

#[test]
fn unknown_or_unreachable_destination_has_no_route() {
    let mut topo = Topology::default();
    let (_n, _links) = build_line::<Ipv4>(&mut topo, 2);
    let island = topo.add_node("island");
    let other = topo.add_node("other");
    let mut subnets = SubnetAllocator::new();
    let _ = subnets.next_subnet::<Ipv4>();
    let _ = subnets.next_subnet::<Ipv4>();
    let (_, far) = subnets.link::<Ipv4>(&mut topo, island, other);
    let (_reg, mut r) = instances::<Ipv4>(&topo);

    let nowhere = Ipv4Addr::new(192, 0, 2, 1);
    assert_eq!(
        r[0].route_output(&topo, None, &header_v4(nowhere), None),
        Err(SocketError::NoRouteToHost)
    );
    let unreachable = addr_of::<Ipv4>(&topo, far);
    assert_eq!(
        r[0].route_output(&topo, None, &header_v4(unreachable), None),
        Err(SocketError::NoRouteToHost)
    );
}

#[test]
fn route_cache_is_reused() {
    let mut topo = Topology::default();
    let (_n, links) = build_line::<Ipv4>(&mut topo, 3);
    let (_reg, mut r) = instances::<Ipv4>(&topo);
    let dest = addr_of::<Ipv4>(&topo, links[1].1);

    let first = r[0].route_output(&topo, None, &header_v4(dest), None).expect("route");
    let second = r[0].route_output(&topo, None, &header_v4(dest), None).expect("route");
    assert_eq!(first, second);
    assert_eq!(r[0].route_cache_len(), 1);
    assert_eq!(r[0].nix_cache_len(), 1);
}

/// a has two links: to b (first) and to c (second); b and c both reach d.
fn square(topo: &mut Topology) -> ([NodeId; 4], Vec<(DeviceId, DeviceId)>) {
    let a = topo.add_node("a");
    let b = topo.add_node("b");
    let c = topo.add_node("c");
    let d = topo.add_node("d");
    let mut subnets = SubnetAllocator::new();
    let links = vec![
        subnets.link::<Ipv4>(topo, a, b),
        subnets.link::<Ipv4>(topo, a, c),
        subnets.link::<Ipv4>(topo, b, d),
        subnets.link::<Ipv4>(topo, c, d),
    ];
    ([a, b, c, d], links)
}

#[test]
fn requested_output_device_discards_mismatching_cached_route() {
    let mut topo = Topology::default();
    let (_nodes, links) = square(&mut topo);
    let (_reg, mut r) = instances::<Ipv4>(&topo);
    let dest = addr_of::<Ipv4>(&topo, links[2].1);
    let via_b = links[0].0;
    let via_c = links[1].0;

    let default = r[0].route_output(&topo, None, &header_v4(dest), None).expect("route");
    assert_eq!(default.output_device, via_b);

    let same = r[0]
        .route_output(&topo, None, &header_v4(dest), Some(via_b))
        .expect("route");
    assert_eq!(same, default);

    let forced = r[0]
        .route_output(&topo, None, &header_v4(dest), Some(via_c))
        .expect("route");
    assert_eq!(forced.output_device, via_c);
    assert_eq!(forced.gateway, addr_of::<Ipv4>(&topo, links[1].1));
    assert_eq!(r[0].cached_route(&dest), Some(&forced));
}

#[test]
fn notification_on_one_node_refreshes_routes_on_another() {
    let mut topo = Topology::default();
    let ([a, b, _c, _d], links) = square(&mut topo);
    let (reg, mut r) = instances::<Ipv4>(&topo);
    let dest = addr_of::<Ipv4>(&topo, links[2].1);
    let header = header_v4(dest);

    let before = r[a.0].route_output(&topo, None, &header, None).expect("route");
    assert_eq!(before.output_device, links[0].0);
    assert!(reg.address_index_len() > 0);
    let epoch = reg.epoch();

    // b loses its interface towards d; only b's instance is told.
    let b_to_d = topo
        .stack::<Ipv4>(b)
        .interface_for_device(links[2].0)
        .expect("iface");
    topo.set_interface_up::<Ipv4>(b, b_to_d, false);
    r[b.0].notify_interface_down(b_to_d);
    assert!(reg.is_dirty());

    let after = r[a.0].route_output(&topo, None, &header, None).expect("route");
    assert!(!reg.is_dirty());
    assert_eq!(reg.epoch(), epoch + 1);
    assert_eq!(after.output_device, links[1].0);
    assert_eq!(after.gateway, addr_of::<Ipv4>(&topo, links[1].1));
    assert_eq!(r[a.0].cached_route(&dest), Some(&after));
}

#[test]
fn stale_epoch_vector_is_rebuilt_at_forwarding_node() {
    let mut topo = Topology::default();
    let (n, links) = build_line::<Ipv4>(&mut topo, 3);
    let (reg, mut r) = instances::<Ipv4>(&topo);
    let dest = addr_of::<Ipv4>(&topo, links[1].1);
    let header = header_v4(dest);

    let mut pkt = Packet::new(1, 100);
    r[0].route_output(&topo, Some(&mut pkt), &header, None).expect("route");
    assert_eq!(pkt.nix_vector.as_ref().map(|v| v.epoch()), Some(reg.epoch()));

    // Give the middle node a third neighbor: its index width grows to 2 bits
    // while the in-flight vector only has 1 bit left.
    let extra = topo.add_node("extra");
    let net = Ipv4::auto_subnet(9);
    let (dm, dx) = topo.connect(n[1], extra);
    let im = topo.assign::<Ipv4>(dm, Ipv4::nth_host(&net, 0).expect("host"));
    topo.assign::<Ipv4>(dx, Ipv4::nth_host(&net, 1).expect("host"));
    r[1].notify_interface_up(im);

    let mut rec = Recorder::<Ipv4>::new();
    r[1].route_input(&topo, pkt, &header, links[0].1, &mut rec).expect("handled");
    match rec.outcomes.as_slice() {
        [Outcome::Forward(route, pkt)] => {
            assert_eq!(route.gateway, dest);
            assert_eq!(route.output_device, links[1].0);
            let nix = pkt.nix_vector.as_ref().expect("vector");
            assert_eq!(nix.epoch(), reg.epoch());
            assert_eq!(nix.remaining_bits(), 0);
        }
        other => panic!("unexpected outcomes {other:?}"),
    }
}

#[test]
fn route_follows_topology_change() {
    let mut topo = Topology::default();
    let (_nodes, links) = square(&mut topo);
    let (_reg, mut r) = instances::<Ipv4>(&topo);
    let dest = addr_of::<Ipv4>(&topo, links[2].1);

    let before = r[0].route_output(&topo, None, &header_v4(dest), None).expect("route");
    assert_eq!(before.output_device, links[0].0);

    topo.set_link_up(links[0].0, false);
    r[0].notify_interface_down(1);
    let after = r[0].route_output(&topo, None, &header_v4(dest), None).expect("route");
    assert_eq!(after.output_device, links[1].0);
}

#[test]
#[should_panic(expected = "without a nix-vector")]
fn input_without_vector_is_a_contract_violation() {
    let mut topo = Topology::default();
    let (_n, links) = build_line::<Ipv4>(&mut topo, 3);
    let (_reg, mut r) = instances::<Ipv4>(&topo);
    let dest = addr_of::<Ipv4>(&topo, links[1].1);

    let mut rec = Recorder::<Ipv4>::new();
    let _ = r[1].route_input(&topo, Packet::new(1, 100), &header_v4(dest), links[0].1, &mut rec);
}

#[test]
#[should_panic(expected = "already bound")]
fn binding_twice_panics() {
    let reg = Rc::new(NixRegistry::<Ipv4>::new());
    let mut r = NixVectorRouting::new(reg);
    r.set_stack(NodeId(0));
    r.set_stack(NodeId(1));
}

#[test]
#[should_panic(expected = "duplicate IPv4 address")]
fn duplicate_address_is_fatal() {
    let mut topo = Topology::default();
    let (_n, links) = build_line::<Ipv4>(&mut topo, 3);
    let dup = addr_of::<Ipv4>(&topo, links[0].0);
    topo.assign::<Ipv4>(links[1].1, ipnet::Ipv4Net::new(dup, 24).expect("prefix"));
    let reg = NixRegistry::<Ipv4>::new();
    let _ = reg.node_by_address(&topo, &dup);
}

fn header_v6(dest: Ipv6Addr) -> IpHeader<Ipv6> {
    IpHeader::new(Ipv6Addr::UNSPECIFIED, dest, 64)
}

#[test]
fn ipv6_input_screening() {
    let mut topo = Topology::default();
    let (n, links) = build_line::<Ipv6>(&mut topo, 3);
    let (_reg, mut r) = instances::<Ipv6>(&topo);
    let idev = links[0].1;

    let multicast: Ipv6Addr = "ff02::1".parse().expect("addr");
    let stack = topo.stack::<Ipv6>(n[1]);
    let iif = stack.interface_for_device(idev).expect("iif");
    assert_eq!(
        <Ipv6 as crate::net::AddressFamily>::screen_input(stack, &header_v6(multicast), iif),
        Some(InputScreen::NotHandled)
    );

    let mut rec = Recorder::<Ipv6>::new();
    let back = r[1].route_input(&topo, Packet::new(1, 10), &header_v6(multicast), idev, &mut rec);
    assert!(back.is_err());
    assert!(rec.outcomes.is_empty());

    let local = addr_of::<Ipv6>(&topo, links[1].0);
    r[1].route_input(&topo, Packet::new(2, 10), &header_v6(local), idev, &mut rec)
        .expect("handled");
    assert!(matches!(rec.outcomes.as_slice(), [Outcome::Local(_, i)] if *i == iif));

    topo.set_forwarding::<Ipv6>(n[1], iif, false);
    let far = addr_of::<Ipv6>(&topo, links[1].1);
    let mut rec = Recorder::<Ipv6>::new();
    r[1].route_input(&topo, Packet::new(3, 10), &header_v6(far), idev, &mut rec)
        .expect("handled");
    assert!(matches!(
        rec.outcomes.as_slice(),
        [Outcome::Error(SocketError::NoRouteToHost)]
    ));
}

#[test]
fn ipv4_has_no_input_screening() {
    let mut topo = Topology::default();
    let (n, links) = build_line::<Ipv4>(&mut topo, 2);
    let stack = topo.stack::<Ipv4>(n[1]);
    let dest = addr_of::<Ipv4>(&topo, links[0].1);
    assert_eq!(
        <Ipv4 as crate::net::AddressFamily>::screen_input(stack, &header_v4(dest), 1),
        None
    );
}

#[test]
fn forwarding_ignores_local_route_built_for_another_device() {
    // s - x, x - y1 - d, x - y2 - d; y2's link to d comes before its link to x.
    let mut topo = Topology::default();
    let s = topo.add_node("s");
    let x = topo.add_node("x");
    let y1 = topo.add_node("y1");
    let y2 = topo.add_node("y2");
    let d = topo.add_node("d");
    let mut subnets = SubnetAllocator::new();
    subnets.link::<Ipv4>(&mut topo, s, x);
    subnets.link::<Ipv4>(&mut topo, x, y1);
    let (_, to_d) = subnets.link::<Ipv4>(&mut topo, y2, d);
    let (x_to_y2, _) = subnets.link::<Ipv4>(&mut topo, x, y2);
    subnets.link::<Ipv4>(&mut topo, y1, d);
    let dest = addr_of::<Ipv4>(&topo, to_d);
    let mut net = Network::<Ipv4>::new(topo);

    assert_eq!(net.send(s, dest, 64).expect("delivered").path, vec![s, x, y1, d]);

    // A local send at x pinned to the y2 link caches a route through y2.
    let snapshot = net.topology().clone();
    let pinned = net
        .routing_mut(x)
        .route_output(&snapshot, None, &header_v4(dest), Some(x_to_y2))
        .expect("route");
    assert_eq!(pinned.output_device, x_to_y2);

    // Transit traffic still follows the hop its vector names.
    assert_eq!(net.send(s, dest, 64).expect("delivered").path, vec![s, x, y1, d]);
    assert_ne!(
        net.routing(x).cached_route(&dest).map(|r| r.output_device),
        Some(x_to_y2)
    );

    // And the next local send from x agrees with its cached vector again.
    let local = net
        .routing_mut(x)
        .route_output(&snapshot, None, &header_v4(dest), None)
        .expect("route");
    assert_eq!(local.output_device, x_to_y2);
}

#[test]
fn ipv6_gateway_skips_link_local_addresses() {
    let mut topo = Topology::default();
    let a = topo.add_node("a");
    let b = topo.add_node("b");
    let (da, db) = topo.connect(a, b);
    let net = |s: &str| s.parse::<ipnet::Ipv6Net>().expect("prefix");
    topo.assign::<Ipv6>(da, net("fe80::1/64"));
    topo.assign::<Ipv6>(da, net("2001:db8::1/64"));
    topo.assign::<Ipv6>(db, net("fe80::2/64"));
    topo.assign::<Ipv6>(db, net("2001:db8::2/64"));
    let (_reg, mut r) = instances::<Ipv6>(&topo);

    let dest: Ipv6Addr = "2001:db8::2".parse().expect("addr");
    let route = r[a.0].route_output(&topo, None, &header_v6(dest), None).expect("route");
    assert_eq!(route.gateway, dest);
    assert_eq!(route.output_device, da);
    assert_eq!(route.source, "2001:db8::1".parse::<Ipv6Addr>().expect("addr"));
}
