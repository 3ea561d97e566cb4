use crate::core::{Chart, Evidence, Finding, Section, Severity};
use crate::dump::{self, DiagnosticBundle, DocumentKind, SchemaError};
use crate::stats;
use crate::ui::format_bytes;

use super::{CheckContext, GIB, doc_evidence, percent};

pub(super) fn shard_count(
    bundle: &DiagnosticBundle,
    ctx: &CheckContext,
    section: &mut Section,
) -> Result<(), SchemaError> {
    let total = dump::total_shard_count(bundle)?;
    let th = &ctx.thresholds;

    let finding = if total > th.max_total_shards {
        Finding::new(
            "OVERSHARDING",
            Severity::Warning,
            format!(
                "Cluster has {total} shards, that can cause some instability (limit {})",
                th.max_total_shards
            ),
        )
    } else {
        Finding::new(
            "OVERSHARDING",
            Severity::Good,
            format!("Cluster has {total} shards, that should not cause any issues"),
        )
    };
    section.findings.push(finding.with_value(total as f64));

    match dump::data_node_count(bundle) {
        Ok(0) => section.findings.push(Finding::new(
            "SHARDS_PER_NODE",
            Severity::Info,
            "No data nodes reported; shards per node not computed",
        )),
        Ok(data_nodes) => {
            let per_node = total as f64 / data_nodes as f64;
            let severity = if per_node > th.max_shards_per_node as f64 {
                Severity::Warning
            } else {
                Severity::Good
            };
            let message = if severity.is_bad() {
                format!(
                    "{per_node:.1} shards per data node across {data_nodes} data nodes exceeds the limit of {}",
                    th.max_shards_per_node
                )
            } else {
                format!("{per_node:.1} shards per data node across {data_nodes} data nodes")
            };
            section.findings.push(
                Finding::new("SHARDS_PER_NODE", severity, message)
                    .with_value(per_node)
                    .with_evidence(Evidence::stat(format!(
                        "shards={total} data_nodes={data_nodes}"
                    ))),
            );
        }
        Err(err) => section.findings.push(Finding::new(
            "SHARDS_PER_NODE",
            Severity::Info,
            format!("Node count unavailable ({err}); shards per node not computed"),
        )),
    }
    Ok(())
}

pub(super) fn shard_size(
    bundle: &DiagnosticBundle,
    ctx: &CheckContext,
    section: &mut Section,
) -> Result<(), SchemaError> {
    let shards = dump::shards(bundle)?;
    let sizes: Vec<f64> = shards
        .iter()
        .filter(|s| s.primary)
        .filter_map(|s| s.store_bytes)
        .map(|b| b as f64)
        .collect();

    let Some(avg) = stats::mean(&sizes) else {
        section.findings.push(Finding::new(
            "SHARD_SIZE",
            Severity::Info,
            "No primary shard sizes reported",
        ));
        return Ok(());
    };

    let count = sizes.len();
    section.findings.push(
        Finding::new(
            "SHARD_SIZE",
            Severity::Info,
            format!(
                "Average primary shard size is {} across {count} primary shards",
                format_bytes(avg as u64)
            ),
        )
        .with_value(avg)
        .with_evidence(doc_evidence(DocumentKind::Shards)),
    );

    let th = &ctx.thresholds;
    let small_limit = th.small_shard_gb * GIB;
    let large_limit = th.large_shard_gb * GIB;
    let small = sizes.iter().filter(|s| **s < small_limit).count();
    let large = sizes.iter().filter(|s| **s > large_limit).count();
    let small_pct = percent(small, count);
    let large_pct = percent(large, count);

    let small_label = format_bytes(small_limit as u64);
    if small_pct / 100.0 > th.small_shard_ratio {
        section.findings.push(
            Finding::new(
                "MANY_SMALL_SHARDS",
                Severity::Warning,
                format!(
                    "Cluster has {small} ({small_pct:.2}%) small (less than {small_label}) primary shards, shrinking or merging recommended"
                ),
            )
            .with_value(small as f64),
        );
    } else {
        section.findings.push(
            Finding::new(
                "MANY_SMALL_SHARDS",
                Severity::Good,
                format!(
                    "Cluster has {small} ({small_pct:.2}%) small (less than {small_label}) primary shards"
                ),
            )
            .with_value(small as f64),
        );
    }

    let large_severity = if large > 0 {
        Severity::Warning
    } else {
        Severity::Good
    };
    section.findings.push(
        Finding::new(
            "MANY_LARGE_SHARDS",
            large_severity,
            format!(
                "Cluster has {large} ({large_pct:.2}%) large (more than {}) primary shards",
                format_bytes(large_limit as u64)
            ),
        )
        .with_value(large as f64),
    );

    let gib: Vec<f64> = sizes.iter().map(|b| b / GIB).collect();
    section.charts.push(Chart::Histogram {
        title: "Primary shards by disk size".to_string(),
        unit: "GiB".to_string(),
        buckets: stats::histogram(&gib, ctx.histogram_buckets),
    });
    Ok(())
}

pub(super) fn docs_distribution(
    bundle: &DiagnosticBundle,
    ctx: &CheckContext,
    section: &mut Section,
) -> Result<(), SchemaError> {
    let shards = dump::shards(bundle)?;
    let docs: Vec<f64> = shards.iter().filter_map(|s| s.docs).map(|d| d as f64).collect();

    let Some(d) = stats::distribution(&docs) else {
        section.findings.push(Finding::new(
            "SHARD_DOCS_DISTRIBUTION",
            Severity::Info,
            "No shard document counts reported",
        ));
        return Ok(());
    };

    section.findings.push(
        Finding::new(
            "SHARD_DOCS_DISTRIBUTION",
            Severity::Info,
            format!(
                "{} shards: min {:.0}, max {:.0}, mean {:.0}, stddev {:.0} documents",
                d.count, d.min, d.max, d.mean, d.stddev
            ),
        )
        .with_value(d.mean)
        .with_evidence(doc_evidence(DocumentKind::Shards)),
    );

    let millions: Vec<f64> = docs.iter().map(|d| d / 1_000_000.0).collect();
    section.charts.push(Chart::Histogram {
        title: "Shards by doc count".to_string(),
        unit: "million docs".to_string(),
        buckets: stats::histogram(&millions, ctx.histogram_buckets),
    });
    Ok(())
}

pub(super) fn size_distribution(
    bundle: &DiagnosticBundle,
    ctx: &CheckContext,
    section: &mut Section,
) -> Result<(), SchemaError> {
    let shards = dump::shards(bundle)?;
    let sizes: Vec<f64> = shards
        .iter()
        .filter_map(|s| s.store_bytes)
        .map(|b| b as f64)
        .collect();

    let Some(d) = stats::distribution(&sizes) else {
        section.findings.push(Finding::new(
            "SHARD_SIZE_DISTRIBUTION",
            Severity::Info,
            "No shard sizes reported",
        ));
        return Ok(());
    };

    section.findings.push(
        Finding::new(
            "SHARD_SIZE_DISTRIBUTION",
            Severity::Info,
            format!(
                "{} shards: min {}, max {}, mean {}, stddev {}",
                d.count,
                format_bytes(d.min as u64),
                format_bytes(d.max as u64),
                format_bytes(d.mean as u64),
                format_bytes(d.stddev as u64)
            ),
        )
        .with_value(d.mean)
        .with_evidence(doc_evidence(DocumentKind::Shards)),
    );

    let gib: Vec<f64> = sizes.iter().map(|b| b / GIB).collect();
    section.charts.push(Chart::Histogram {
        title: "Shards by disk size".to_string(),
        unit: "GiB".to_string(),
        buckets: stats::histogram(&gib, ctx.histogram_buckets),
    });
    Ok(())
}
