use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bgppolicy::route::{AsPath, Community};
use bgppolicy::{
    bgp_registry, load_policy, Attr, BgpRoute, FilterStore, MatchContext, PeerInfo, PolicyConfig,
    Prefix, RouteDirection, RouteMapMaster,
};

#[derive(Parser)]
#[command(name = "bgppolicy", about = "Inspect and evaluate BGP route-map policies")]
struct Cli {
    /// TOML policy file
    #[arg(short, long)]
    policy: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the installed route-maps
    Show {
        /// Only this map
        #[arg(short, long)]
        map: Option<String>,
        /// Print a JSON snapshot instead of clause text
        #[arg(long)]
        json: bool,
    },
    /// Run one route through a route-map
    Eval {
        #[arg(short, long)]
        map: String,
        #[arg(long)]
        prefix: Prefix,
        /// Peer address; omit for a locally originated route
        #[arg(long)]
        peer: Option<IpAddr>,
        #[arg(long, default_value = "0.0.0.0")]
        local: IpAddr,
        #[arg(long, default_value_t = 0)]
        peer_as: u32,
        #[arg(long, value_enum, default_value_t = Direction::In)]
        direction: Direction,
        #[arg(long)]
        as_path: Option<String>,
        #[arg(long)]
        med: Option<u32>,
        #[arg(long)]
        community: Option<String>,
        #[arg(long)]
        nexthop: Option<Ipv4Addr>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Direction {
    In,
    Out,
}

fn init_tracing(config: Option<&PolicyConfig>) {
    let default_level = config
        .and_then(|config| config.log_level.clone())
        .unwrap_or_else(|| "info".to_string());
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_policy(&cli.policy) {
        Ok(config) => config,
        Err(e) => {
            init_tracing(None);
            tracing::error!(policy = %cli.policy.display(), "{}", e);
            return ExitCode::FAILURE;
        }
    };
    init_tracing(Some(&config));

    let mut master = RouteMapMaster::new(bgp_registry());
    let mut store = FilterStore::new();
    if let Err(e) = config.install(&mut master, &mut store) {
        tracing::error!(policy = %cli.policy.display(), "{}", e);
        return ExitCode::FAILURE;
    }

    match run(cli.command, &master, &store) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command, master: &RouteMapMaster, store: &FilterStore) -> Result<(), String> {
    match command {
        Command::Show { map, json } => {
            let output = match (map, json) {
                (Some(name), true) => master
                    .lookup(&name)
                    .map(|map| map.to_json().to_string())
                    .ok_or_else(|| format!("route-map {} does not exist", name))?,
                (Some(name), false) => master
                    .render(&name)
                    .ok_or_else(|| format!("route-map {} does not exist", name))?,
                (None, true) => master.to_json().to_string(),
                (None, false) => master.render_all(),
            };
            print!("{}", output);
            if json {
                println!();
            }
            Ok(())
        }
        Command::Eval {
            map,
            prefix,
            peer,
            local,
            peer_as,
            direction,
            as_path,
            med,
            community,
            nexthop,
        } => {
            let peer = match peer {
                Some(remote) => PeerInfo::new(peer_as, remote, local),
                None => PeerInfo::local(peer_as),
            };
            let mut attr = Attr::new();
            if let Some(path) = as_path {
                attr = attr.with_as_path(path.parse::<AsPath>().map_err(|e| e.to_string())?);
            }
            if let Some(med) = med {
                attr = attr.with_med(med);
            }
            if let Some(com) = community {
                attr = attr.with_community(com.parse::<Community>().map_err(|e| e.to_string())?);
            }
            if let Some(nexthop) = nexthop {
                attr = attr.with_nexthop(nexthop);
            }
            let direction = match direction {
                Direction::In => RouteDirection::In,
                Direction::Out => RouteDirection::Out,
            };

            let mut route = BgpRoute::new(peer, direction, attr);
            let result = {
                let mut ctx = MatchContext::new(&mut route, store);
                master.apply(&map, &prefix, &mut ctx)
            };
            println!("{} {}: {}", map, prefix, result);
            print_attr(&route);
            Ok(())
        }
    }
}

fn print_attr(route: &BgpRoute) {
    let attr = &route.attr;
    println!("  as-path: {}", attr.as_path);
    println!("  origin: {}", attr.origin);
    println!("  next-hop: {}", attr.nexthop);
    println!("  metric: {}", attr.med);
    println!("  local-preference: {}", attr.local_pref);
    println!("  weight: {}", attr.weight);
    if let Some(com) = &attr.community {
        println!("  community: {}", com);
    }
    if let Some(ecom) = &attr.ecommunity {
        println!("  extcommunity: {}", ecom);
    }
    if let Some(damp) = &route.damp {
        println!(
            "  dampening: half-life {}m reuse {} suppress {}",
            damp.half_life.as_secs() / 60,
            damp.reuse,
            damp.suppress
        );
    }
}
