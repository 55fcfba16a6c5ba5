use std::collections::HashSet;
use std::fs;
use std::io::Write;

use proptest::prelude::*;

use ibd_networks::cluster::{CommunityDetection, ConnectedComponents, Walktrap};
use ibd_networks::config::{ClusterConfig, Config, SegmentOverlap};
use ibd_networks::data::{load_ibd_segments, IbdFormat, TargetRegion};
use ibd_networks::graph::{build_graph, EdgeRow};
use ibd_networks::{storage, NetworkEngine, NetworkError};

fn row(a: u32, b: u32, cm: f64) -> EdgeRow {
    EdgeRow::new(
        format!("I{a}.1"),
        format!("I{b}.1"),
        cm,
        format!("I{a}"),
        format!("I{b}"),
    )
}

fn complete_rows(n: u32, cm: f64) -> Vec<EdgeRow> {
    let mut rows = Vec::new();
    for a in 0..n {
        for b in (a + 1)..n {
            rows.push(row(a, b, cm));
        }
    }
    rows
}

fn small_config() -> Config {
    Config {
        cluster: ClusterConfig {
            min_network_size: 3,
            ..ClusterConfig::default()
        },
        ..Config::default()
    }
}

#[test]
fn complete_graph_is_one_network() {
    let engine = NetworkEngine::with_walktrap(small_config());
    let output = engine.run(&complete_rows(10, 5.0)).unwrap();

    assert_eq!(output.repository.len(), 1);
    let network = &output.repository.networks()[0];
    assert_eq!(network.haplotypes.len(), 10);
    assert_eq!(network.true_positive_count, 45);
    assert_eq!(network.true_positive_ratio, 1.0);
    assert_eq!(network.false_negative_count, 0);
    assert!(!network.recheck_exhausted);
    assert_eq!(output.summary.dropped_haplotypes, 0);
}

#[test]
fn disabled_recluster_keeps_sparse_star() {
    let rows: Vec<EdgeRow> = (1..7).map(|leaf| row(0, leaf, 4.0)).collect();
    let config = Config {
        cluster: ClusterConfig {
            recluster: false,
            ..ClusterConfig::default()
        },
        ..Config::default()
    };

    let engine = NetworkEngine::new(config, Box::new(ConnectedComponents));
    let output = engine.run(&rows).unwrap();

    assert_eq!(output.repository.len(), 1);
    let network = &output.repository.networks()[0];
    assert_eq!(network.true_positive_count, 6);
    assert!((network.true_positive_ratio - 6.0 / 21.0).abs() < 1e-12);
    assert!(!network.recheck_exhausted);
}

#[test]
fn file_to_table_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("chr20.ibd");
    {
        let mut file = fs::File::create(&input).unwrap();
        for a in 0..5 {
            for b in (a + 1)..5 {
                writeln!(file, "S{a}\t1\tS{b}\t1\t20\t1000\t9000\t6.5").unwrap();
            }
        }
        // Outside the region
        writeln!(file, "S7\t1\tS8\t1\t20\t1\t500\t6.5").unwrap();
    }

    let region: TargetRegion = "chr20:2000-3000".parse().unwrap();
    let rows = load_ibd_segments(&input, IbdFormat::HapIbd, &region, 3.0, SegmentOverlap::Contains)
        .unwrap();
    assert_eq!(rows.len(), 10);

    let output = NetworkEngine::with_walktrap(small_config()).run(&rows).unwrap();
    let prefix = dir.path().join("out").join("run");
    let prefix = prefix.to_str().unwrap();
    storage::save_results(&output.repository, &output.summary, prefix).unwrap();

    let table = fs::read_to_string(format!("{prefix}.networks.txt")).unwrap();
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("clstID\tn.total"));
    assert_eq!(
        lines[1],
        "0\t5\t5\t10\t1\t0\tS0,S1,S2,S3,S4\tS0.1,S1.1,S2.1,S3.1,S4.1"
    );
}

#[test]
fn uniform_cycle_is_kept_whole() {
    let rows: Vec<EdgeRow> = (0..6).map(|v| row(v, (v + 1) % 6, 5.0)).collect();
    let engine = NetworkEngine::new(Config::default(), Box::new(ConnectedComponents));
    let output = engine.run(&rows).unwrap();

    assert_eq!(output.summary.removed_hubs, 0);
    assert_eq!(output.repository.len(), 1);
    let network = &output.repository.networks()[0];
    assert_eq!(network.haplotypes.len(), 6);
    assert!((network.true_positive_ratio - 0.4).abs() < 1e-12);
    assert!(!network.recheck_exhausted);
}

#[test]
fn empty_input_is_an_error() {
    let engine = NetworkEngine::with_walktrap(Config::default());
    assert!(matches!(engine.run(&[]), Err(NetworkError::EmptyGraph)));
}

fn edge_lists() -> impl Strategy<Value = Vec<(u32, u32, f64)>> {
    prop::collection::vec((0u32..14, 0u32..14, 3.0f64..20.0), 1..60)
        .prop_map(|edges| edges.into_iter().filter(|(a, b, _)| a != b).collect())
        .prop_filter("needs an edge", |edges: &Vec<(u32, u32, f64)>| !edges.is_empty())
}

proptest! {
    #[test]
    fn outcomes_partition_the_vertices(
        edges in edge_lists(),
        max_size in 3usize..8,
        max_recheck in 0usize..4,
    ) {
        let rows: Vec<EdgeRow> = edges.iter().map(|&(a, b, cm)| row(a, b, cm)).collect();
        let config = Config {
            cluster: ClusterConfig {
                max_network_size: max_size,
                max_recheck_count: max_recheck,
                ..ClusterConfig::default()
            },
            ..Config::default()
        };
        let output = NetworkEngine::with_walktrap(config).run(&rows).unwrap();

        let mut seen = HashSet::new();
        for network in &output.repository {
            prop_assert!(network.attempt <= max_recheck);
            prop_assert_eq!(network.cluster_id.split('.').count(), network.attempt + 1);
            for hap in &network.haplotypes {
                prop_assert!(seen.insert(hap.clone()));
            }
        }
        prop_assert_eq!(
            seen.len() + output.summary.dropped_haplotypes + output.summary.removed_hubs,
            output.summary.vertices
        );
    }

    #[test]
    fn ratio_is_one_only_for_complete_networks(edges in edge_lists()) {
        let rows: Vec<EdgeRow> = edges.iter().map(|&(a, b, cm)| row(a, b, cm)).collect();
        let output = NetworkEngine::with_walktrap(Config::default()).run(&rows).unwrap();

        for network in &output.repository {
            let k = network.haplotypes.len();
            let possible = k * (k - 1) / 2;
            prop_assert!((0.0..=1.0).contains(&network.true_positive_ratio));
            prop_assert_eq!(
                network.true_positive_ratio == 1.0,
                network.true_positive_count == possible
            );
        }
    }

    #[test]
    fn walktrap_is_deterministic(edges in edge_lists()) {
        let rows: Vec<EdgeRow> = edges.iter().map(|&(a, b, cm)| row(a, b, cm)).collect();
        let graph = build_graph(&rows).unwrap();
        let detector = Walktrap::new(3);

        prop_assert_eq!(detector.detect(&graph), detector.detect(&graph));
    }
}
