use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use env_logger::Builder;
use log::{debug, info, LevelFilter};

use bgpd_rib::config;
use bgpd_rib::rib::{
    LocalPreference, MemoryStore, MemoryTransaction, PathAttributes, RibPath, RibTable,
    RouteReflection, StoreType, StoreValue,
};

#[derive(Parser, Debug)]
#[clap(name = "rib-replay", rename_all = "kebab-case")]
/// Replay scripted BGP updates through the RIB and show the resulting tables
struct Args {
    /// Path to scenario config.toml
    config_path: String,
    /// Print stored routes as JSON
    #[clap(long)]
    json: bool,
    /// Print the datastore operations of every update
    #[clap(short, long)]
    updates: bool,
    /// Show debug logs (additive for trace logs)
    #[clap(short, parse(from_occurrences))]
    verbose: u8,
}

type Attributes = Arc<PathAttributes>;

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let (rib_level, other_level) = match args.verbose {
        0 => (LevelFilter::Info, LevelFilter::Warn),
        1 => (LevelFilter::Debug, LevelFilter::Warn),
        2 => (LevelFilter::Trace, LevelFilter::Warn),
        _ => (LevelFilter::Trace, LevelFilter::Trace),
    };
    Builder::new()
        .filter(Some("bgpd_rib"), rib_level)
        .filter(Some("rib_replay"), rib_level)
        .filter(None, other_level)
        .init();
    info!("Logging at levels {}/{}", rib_level, other_level);

    let config = config::from_file(&args.config_path)?;
    info!(
        "Replaying {} as router {} (AS {})",
        config.table, config.router_id, config.local_as
    );
    debug!(
        "Found {} peers and {} routes in {}",
        config.peers.len(),
        config.routes.len(),
        args.config_path
    );

    let mut tracker = config.peer_tracker();
    let mut table = RibTable::new(config.table, config.local_as, LocalPreference)
        .with_selection(config.path_selection);
    if config.route_reflection {
        table = table.with_policies(RouteReflection);
    }
    let mut store: MemoryStore<Attributes> = MemoryStore::new();

    for change in config.route_changes() {
        info!("Processing {}", change);
        let mut tx = MemoryTransaction::new();
        table.apply(&tracker, vec![change], &mut tx);
        commit(&mut store, tx, args.updates);
    }

    for peer in config.late_peers() {
        info!("Peer {} is up", peer.peer_id());
        tracker.insert(peer.to_peer());
        let mut tx = MemoryTransaction::new();
        table.peer_up(&tracker, peer.peer_id(), &mut tx);
        commit(&mut store, tx, args.updates);
    }

    for peer_id in &config.shutdown {
        info!("Peer {} is down", peer_id);
        let mut tx = MemoryTransaction::new();
        table.peer_down(&tracker, *peer_id, &mut tx);
        tracker.remove(*peer_id);
        commit(&mut store, tx, args.updates);
    }

    info!(
        "{} prefixes in {}, {} nodes stored",
        table.len(),
        table.table_key(),
        store.len()
    );
    if args.json {
        println!("{}", serde_json::to_string_pretty(&store.records())?);
    } else {
        print_routes(&store);
    }
    Ok(())
}

fn commit(store: &mut MemoryStore<Attributes>, tx: MemoryTransaction<Attributes>, show: bool) {
    if show && !tx.is_empty() {
        print_operations(&tx);
    }
    store.commit(tx);
}

#[cfg(feature = "cli")]
fn print_operations(tx: &MemoryTransaction<Attributes>) {
    use bgpd_rib::display::{OperationRow, OutputTable};

    let mut output = OutputTable::new();
    for operation in tx.operations() {
        output.add_row(&OperationRow(operation));
    }
    output.print();
    println!();
}

#[cfg(not(feature = "cli"))]
fn print_operations(tx: &MemoryTransaction<Attributes>) {
    for operation in tx.operations() {
        println!("{:?}", operation);
    }
}

#[cfg(feature = "cli")]
fn print_routes(store: &MemoryStore<Attributes>) {
    use bgpd_rib::display::{OutputTable, RouteRow};

    let root = RibPath::default();
    let mut output = OutputTable::new();
    for (path, stored) in store.under(StoreType::Operational, &root) {
        if let StoreValue::Route(_) = stored.value {
            output.add_row(&RouteRow { path, stored });
        }
    }
    if output.is_empty() {
        println!("No routes stored");
    } else {
        output.print();
    }
}

#[cfg(not(feature = "cli"))]
fn print_routes(store: &MemoryStore<Attributes>) {
    let root = RibPath::default();
    for (path, stored) in store.under(StoreType::Operational, &root) {
        if let StoreValue::Route(route) = &stored.value {
            println!("{} {}", path, route.attributes);
        }
    }
}
