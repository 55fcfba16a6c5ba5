use anyhow::Result;
use clap::Parser;

use ibd_networks::config::{ClusterConfig, Config, SegmentOverlap};
use ibd_networks::data::{load_ibd_segments, IbdFormat, TargetRegion};
use ibd_networks::engine::NetworkEngine;
use ibd_networks::storage;

#[derive(Parser, Debug)]
#[clap(
    name = "ibd-networks",
    about = "Identify networks of haplotypes sharing IBD segments around a target locus"
)]
struct Cli {
    /// Path to the IBD segment file (tab-delimited, no header)
    #[clap(long)]
    input: String,

    /// Program that produced the input: hapibd, germline, ilash or rapid
    #[clap(long)]
    format: String,

    /// Target region as <chr>:<start>-<end>
    #[clap(long)]
    target: String,

    /// Output prefix; writes <prefix>.networks.txt and <prefix>.summary.json
    #[clap(long)]
    output: String,

    /// Minimum segment length in centimorgans
    #[clap(long, default_value = "3.0")]
    min_cm: f64,

    /// How segments must relate to the target region
    #[clap(long, value_enum, default_value = "contains")]
    segment_overlap: SegmentOverlap,

    /// JSON file with clustering parameters; flags below override it
    #[clap(long)]
    config: Option<String>,

    #[clap(long)]
    min_connected_threshold: Option<f64>,

    #[clap(long)]
    max_network_size: Option<usize>,

    #[clap(long)]
    min_network_size: Option<usize>,

    #[clap(long)]
    max_recheck: Option<usize>,

    /// Random walk length for walktrap
    #[clap(long)]
    step: Option<usize>,

    #[clap(long)]
    segment_distribution_threshold: Option<f64>,

    #[clap(long)]
    hub_threshold: Option<f64>,

    /// Accept networks as first detected, without refinement
    #[clap(long)]
    no_recluster: bool,

    /// Refine only the first N initial clusters
    #[clap(long)]
    debug_iterations: Option<usize>,

    /// Number of worker threads (0 = use all available cores)
    #[clap(long, default_value = "0")]
    threads: usize,

    /// Verbose logging
    #[clap(long, short)]
    verbose: bool,
}

impl Cli {
    fn cluster_config(&self) -> Result<ClusterConfig> {
        let mut cluster = match &self.config {
            Some(path) => ClusterConfig::from_json_file(path)?,
            None => ClusterConfig::default(),
        };

        if let Some(v) = self.min_connected_threshold {
            cluster.min_connected_threshold = v;
        }
        if let Some(v) = self.max_network_size {
            cluster.max_network_size = v;
        }
        if let Some(v) = self.min_network_size {
            cluster.min_network_size = v;
        }
        if let Some(v) = self.max_recheck {
            cluster.max_recheck_count = v;
        }
        if let Some(v) = self.step {
            cluster.random_walk_step_size = v;
        }
        if let Some(v) = self.segment_distribution_threshold {
            cluster.segment_dist_threshold = v;
        }
        if let Some(v) = self.hub_threshold {
            cluster.hub_threshold = v;
        }
        if self.no_recluster {
            cluster.recluster = false;
        }

        cluster.validate()?;
        Ok(cluster)
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();

    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_millis()
        .init();

    let num_threads = if args.threads > 0 {
        args.threads
    } else {
        num_cpus::get()
    };

    log::info!("Using {} worker threads", num_threads);
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()?;

    let format: IbdFormat = args.format.parse()?;
    let region: TargetRegion = args.target.parse()?;
    let config = Config::new(
        args.min_cm,
        args.segment_overlap,
        args.cluster_config()?,
        args.debug_iterations,
    );

    log::info!("Starting network identification");
    log::info!("Input: {} ({})", args.input, format);
    log::info!("Target: {}", region);

    // 1. Load segments around the target
    let rows = load_ibd_segments(
        &args.input,
        format,
        &region,
        config.min_cm,
        config.segment_overlap,
    )?;

    // 2. Build the graph and identify networks
    let engine = NetworkEngine::with_walktrap(config);
    log::debug!("Configuration: {:?}", engine.config());
    let output = engine.run(&rows)?;

    // 3. Save results
    storage::save_results(&output.repository, &output.summary, &args.output)?;

    log::info!("Analysis complete. Results saved to {}.*", args.output);

    Ok(())
}
