use clap::{Parser, ValueEnum};
use nixroute_rs::net::{Network, NodeId, Topology};
use nixroute_rs::topo::SubnetPlan;
use nixroute_rs::topo::bridged_lan::build_bridged_lan;
use nixroute_rs::topo::dumbbell::build_dumbbell;
use nixroute_rs::topo::fat_tree::{FatTreeOpts, build_fat_tree};
use nixroute_rs::topo::spec::{Family, TopologySpec};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Builtin {
    Dumbbell,
    FatTree,
    BridgedLan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FamilyArg {
    Ipv4,
    Ipv6,
}

#[derive(Debug, Parser)]
#[command(
    name = "nix-path",
    about = "Compute and exercise nix-vector routes on a topology"
)]
struct Args {
    /// Path to topology.json (overrides --builtin)
    #[arg(long)]
    topology: Option<PathBuf>,

    /// Built-in topology used when --topology is absent
    #[arg(long, value_enum, default_value = "dumbbell")]
    builtin: Builtin,

    /// Fat-tree k for --builtin fat-tree
    #[arg(long, default_value_t = 4)]
    k: usize,

    /// Host count for --builtin bridged-lan
    #[arg(long, default_value_t = 3)]
    lan_hosts: usize,

    /// Address family; defaults to the topology file's family, else ipv4
    #[arg(long, value_enum)]
    family: Option<FamilyArg>,

    /// Source node name (defaults to the first node)
    #[arg(long)]
    from: Option<String>,

    /// Destination node name (defaults to the last host)
    #[arg(long)]
    to: Option<String>,

    /// Number of packets to send
    #[arg(long, default_value_t = 1)]
    packets: u64,

    /// Packet size in bytes
    #[arg(long, default_value_t = 1500)]
    pkt_bytes: u32,

    /// Print every node's routing table after sending
    #[arg(long)]
    print_tables: bool,

    /// Write a JSON summary to this file
    #[arg(long)]
    summary_json: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct Summary {
    family: &'static str,
    from: String,
    to: String,
    destination: String,
    nix_vector: Option<String>,
    nix_bits: u32,
    path: Vec<String>,
    hops: usize,
    delivered_pkts: u64,
    dropped_pkts: u64,
    no_route_pkts: u64,
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("{msg}");
    std::process::exit(2);
}

fn builtin_topology<F: SubnetPlan>(args: &Args) -> (Topology, NodeId, NodeId) {
    let mut topo = Topology::default();
    let (src, dst) = match args.builtin {
        Builtin::Dumbbell => {
            let d = build_dumbbell::<F>(&mut topo);
            (d.h0, d.h1)
        }
        Builtin::FatTree => {
            if args.k < 2 || args.k % 2 != 0 {
                fail(format!("fat-tree k must be even and >= 2 (got {})", args.k));
            }
            let ft = build_fat_tree::<F>(&mut topo, &FatTreeOpts { k: args.k });
            let last = ft.hosts.len() - 1;
            (ft.hosts[0], ft.hosts[last])
        }
        Builtin::BridgedLan => {
            if args.lan_hosts < 2 {
                fail("bridged-lan needs at least 2 hosts");
            }
            let lan = build_bridged_lan::<F>(&mut topo, args.lan_hosts);
            (lan.hosts[0], lan.hosts[args.lan_hosts - 1])
        }
    };
    (topo, src, dst)
}

fn run<F: SubnetPlan>(args: &Args, spec: Option<&TopologySpec>) {
    let (topo, default_src, default_dst) = match spec {
        Some(spec) => {
            let topo = spec.build::<F>().unwrap_or_else(|e| fail(e));
            if topo.node_count() == 0 {
                fail("topology has no nodes");
            }
            let last = NodeId(topo.node_count() - 1);
            (topo, NodeId(0), last)
        }
        None => builtin_topology::<F>(args),
    };

    let resolve = |name: &Option<String>, default: NodeId| match name {
        Some(n) => topo
            .node_by_name(n)
            .unwrap_or_else(|| fail(format!("unknown node {n:?}"))),
        None => default,
    };
    let src = resolve(&args.from, default_src);
    let dst = resolve(&args.to, default_dst);
    let Some(dest_addr) = topo.primary_address::<F>(dst) else {
        fail(format!(
            "node {} has no {} address",
            topo.node(dst).name(),
            F::NAME
        ));
    };
    let names: Vec<String> = topo.nodes().iter().map(|n| n.name().to_string()).collect();

    let mut net: Network<F> = Network::new(topo);

    let mut out = String::new();
    net.print_routing_path(src, dest_addr, &mut out)
        .unwrap_or_else(|e| fail(e));
    print!("{out}");

    let nix = net
        .routing(src)
        .get_nix_vector(net.topology(), src, dest_addr, None);

    let mut last_path = Vec::new();
    for _ in 0..args.packets {
        match net.send(src, dest_addr, args.pkt_bytes) {
            Ok(delivery) => last_path = delivery.path,
            Err(e) => println!("drop {e}"),
        }
    }
    let path: Vec<String> = last_path.iter().map(|n| names[n.0].clone()).collect();
    println!(
        "delivered {}/{} path {}",
        net.stats.delivered_pkts,
        args.packets,
        path.join(" -> ")
    );

    if args.print_tables {
        for node in 0..names.len() {
            let mut table = String::new();
            net.print_routing_table(NodeId(node), &mut table)
                .unwrap_or_else(|e| fail(e));
            print!("{table}");
        }
    }

    if let Some(out_path) = &args.summary_json {
        let summary = Summary {
            family: F::NAME,
            from: names[src.0].clone(),
            to: names[dst.0].clone(),
            destination: dest_addr.to_string(),
            nix_vector: nix.as_ref().map(|n| n.to_string()),
            nix_bits: nix.as_ref().map_or(0, |n| n.total_bits()),
            hops: path.len().saturating_sub(1),
            path,
            delivered_pkts: net.stats.delivered_pkts,
            dropped_pkts: net.stats.dropped_pkts,
            no_route_pkts: net.stats.no_route_pkts,
        };
        let json = serde_json::to_string_pretty(&summary).unwrap_or_else(|e| fail(e));
        fs::write(out_path, json).unwrap_or_else(|e| fail(e));
        eprintln!("wrote summary to {}", out_path.display());
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    let args = Args::parse();
    let spec = args
        .topology
        .as_ref()
        .map(|p| TopologySpec::from_path(p).unwrap_or_else(|e| fail(e)));

    let family = match (args.family, &spec) {
        (Some(FamilyArg::Ipv4), _) => Family::Ipv4,
        (Some(FamilyArg::Ipv6), _) => Family::Ipv6,
        (None, Some(spec)) => spec.family,
        (None, None) => Family::Ipv4,
    };

    match family {
        Family::Ipv4 => run::<nixroute_rs::net::Ipv4>(&args, spec.as_ref()),
        Family::Ipv6 => run::<nixroute_rs::net::Ipv6>(&args, spec.as_ref()),
    }
}
