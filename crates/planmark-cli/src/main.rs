//! Planmark - Main entry point
//!
//! Loads marker batches, reconciles them into the planning frame and hosts
//! them in a scene graph, then prints what ended up visible.

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use planmark_core::MarkerBatch;
use planmark_scene::{HandleFactory, MarkerHost, MarkerSet, SceneGraph};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "planmark")]
#[command(about = "Planning-result marker display host")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "planmark.toml")]
    config: PathBuf,

    /// Marker batch (JSON); repeat for several sets
    #[arg(short, long)]
    markers: Vec<PathBuf>,

    /// Hide a namespace after loading
    #[arg(long, value_name = "NS")]
    hide: Vec<String>,

    /// Show a namespace after loading
    #[arg(long, value_name = "NS")]
    show: Vec<String>,

    /// Disable the marker host
    #[arg(long)]
    disable: bool,

    /// Clear all hosted sets before exiting
    #[arg(long)]
    clear: bool,

    /// Write an example configuration to --config and exit
    #[arg(long)]
    init_config: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Planmark v{}", env!("CARGO_PKG_VERSION"));

    if args.init_config {
        config::save_default_config(&args.config)?;
        println!("Wrote example configuration to {}", args.config.display());
        return Ok(());
    }

    let config = config::load_config(&args.config)?;
    let tree = config.frame_tree()?;

    info!(
        planning_frame = %config.scene.planning_frame,
        fixed_frame = %config.display.fixed_frame,
        frames = config.frames.len(),
        "Configuration loaded"
    );

    let graph = SceneGraph::new();
    let mut host = MarkerHost::new(
        &graph,
        graph.root(),
        Box::new(config.transforms(tree.clone())),
        HandleFactory::default(),
    )?;

    for ns in &config.namespaces {
        host.set_namespace_visible(&ns.name, ns.visible);
    }

    let mut sets = Vec::with_capacity(args.markers.len());
    for path in &args.markers {
        let batch = MarkerBatch::from_file(path)
            .with_context(|| format!("Failed to load markers from {}", path.display()))?;
        let set = MarkerSet::new(batch, &tree);
        info!(
            path = %path.display(),
            markers = set.len(),
            "Reconciled marker batch"
        );
        let set = set.into_shared();
        host.add_markers(set.clone());
        sets.push(set);
    }

    for ns in &args.hide {
        host.set_namespace_visible(ns, false);
    }
    for ns in &args.show {
        host.set_namespace_visible(ns, true);
    }

    if args.disable || !config.display.enabled {
        host.set_enabled(false);
    }

    print_summary(&host);

    if args.clear {
        host.clear_markers();
        drop(sets);
        println!();
        println!("After clear:");
        print_summary(&host);
    }

    Ok(())
}

fn print_summary(host: &MarkerHost) {
    let graph = host.graph();
    println!("Scene:");
    print!("{}", graph.render_tree(graph.root()));
    if !host.is_enabled() {
        println!("Marker host disabled:");
        print!("{}", graph.render_tree(host.attachment()));
    }

    println!("Namespaces ({} sets hosted):", host.hosted_count());
    for (ns, visible) in host.toggles().iter() {
        println!("  - {}: {}", ns, if visible { "shown" } else { "hidden" });
    }
}
