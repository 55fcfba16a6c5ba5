//! Results persistence module

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde_json::{json, to_string_pretty};

use crate::engine::RunSummary;
use crate::network::NetworkRepository;

const NETWORKS_HEADER: &str =
    "clstID\tn.total\tn.haplotype\ttrue.positive.n\ttrue.positive\tfalse.negative.n\tIDs\tID.haplotype";

/// Path of `<prefix><suffix>`, keeping any directory part of the prefix
fn with_suffix(output_prefix: &str, suffix: &str) -> PathBuf {
    PathBuf::from(format!("{output_prefix}{suffix}"))
}

/// Save the network table and run summary next to `output_prefix`
pub fn save_results(
    repository: &NetworkRepository,
    summary: &RunSummary,
    output_prefix: &str,
) -> Result<()> {
    log::info!("Saving {} networks to {}.*", repository.len(), output_prefix);

    if let Some(parent) = Path::new(output_prefix).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    save_networks(repository, &with_suffix(output_prefix, ".networks.txt"))?;
    save_summary(repository, summary, &with_suffix(output_prefix, ".summary.json"))?;

    log::info!("Results saved successfully");

    Ok(())
}

/// Tab-separated network table, one row per network ordered by cluster id
fn save_networks(repository: &NetworkRepository, path: &Path) -> Result<()> {
    log::debug!("Writing network table to {}", path.display());

    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "{NETWORKS_HEADER}")?;

    for network in repository.sorted_by_cluster_id() {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            network.cluster_id,
            network.members.len(),
            network.haplotypes.len(),
            network.true_positive_count,
            network.true_positive_ratio,
            network.false_negative_count,
            network.members_list(),
            network.haplotypes_list()
        )?;
    }

    writer.flush()?;
    Ok(())
}

fn save_summary(repository: &NetworkRepository, summary: &RunSummary, path: &Path) -> Result<()> {
    log::debug!("Writing run summary to {}", path.display());

    let sizes: Vec<usize> = repository.iter().map(|n| n.haplotypes.len()).collect();
    let avg_ratio = if repository.is_empty() {
        0.0
    } else {
        repository.iter().map(|n| n.true_positive_ratio).sum::<f64>() / repository.len() as f64
    };

    let stats = json!({
        "run": summary,
        "network_stats": {
            "network_count": repository.len(),
            "total_haplotypes": sizes.iter().sum::<usize>(),
            "largest_network_size": sizes.iter().max().copied().unwrap_or(0),
            "smallest_network_size": sizes.iter().min().copied().unwrap_or(0),
            "avg_true_positive_ratio": avg_ratio,
        },
        "networks": repository.sorted_by_cluster_id().iter().map(|n| {
            json!({
                "id": n.cluster_id,
                "size": n.haplotypes.len(),
                "true_positive_ratio": n.true_positive_ratio,
                "recheck_exhausted": n.recheck_exhausted,
            })
        }).collect::<Vec<_>>()
    });

    let mut file = File::create(path)?;
    file.write_all(to_string_pretty(&stats)?.as_bytes())?;

    Ok(())
}
