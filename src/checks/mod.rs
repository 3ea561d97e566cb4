use anyhow::Result;
use globset::GlobSet;

use crate::config::{EffectiveConfig, Thresholds};
use crate::core::{Evidence, Finding, Section, Severity};
use crate::dump::{DiagnosticBundle, DocumentKind, SchemaError};

mod cluster;
mod indices;
mod nodes;
mod shards;

pub(crate) const MIB: f64 = 1024.0 * 1024.0;
pub(crate) const GIB: f64 = MIB * 1024.0;

/// Read-only inputs shared by every check.
#[derive(Debug, Clone)]
pub struct CheckContext {
    pub thresholds: Thresholds,
    pub histogram_buckets: usize,
    pub ignore_indices: GlobSet,
}

impl CheckContext {
    pub fn from_config(cfg: &EffectiveConfig) -> Result<Self> {
        Ok(Self {
            thresholds: cfg.thresholds.clone(),
            histogram_buckets: cfg.ui.histogram_buckets.max(1),
            ignore_indices: cfg.analysis.ignore_set()?,
        })
    }
}

impl Default for CheckContext {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            histogram_buckets: 10,
            ignore_indices: GlobSet::empty(),
        }
    }
}

type CheckFn = fn(&DiagnosticBundle, &CheckContext, &mut Section) -> Result<(), SchemaError>;

pub struct Check {
    pub id: &'static str,
    pub title: &'static str,
    pub code: &'static str,
    run: CheckFn,
}

pub const CHECKS: [Check; 11] = [
    Check {
        id: "cluster-health",
        title: "Cluster health",
        code: "CLUSTER_HEALTH",
        run: cluster::cluster_health,
    },
    Check {
        id: "compressed-oops",
        title: "Compressed oops",
        code: "COMPRESSED_OOPS",
        run: cluster::compressed_oops,
    },
    Check {
        id: "shard-count",
        title: "Shards count",
        code: "OVERSHARDING",
        run: shards::shard_count,
    },
    Check {
        id: "shard-size",
        title: "Shard size",
        code: "SHARD_SIZE",
        run: shards::shard_size,
    },
    Check {
        id: "cluster-state-size",
        title: "Cluster state size",
        code: "CLUSTER_STATE_SIZE",
        run: cluster::cluster_state_size,
    },
    Check {
        id: "refresh-interval",
        title: "refresh_interval",
        code: "REFRESH_INTERVAL",
        run: indices::refresh_interval,
    },
    Check {
        id: "high-cardinality-fields",
        title: "High cardinality fields",
        code: "HIGH_CARDINALITY_FIELD",
        run: indices::high_cardinality_fields,
    },
    Check {
        id: "thread-pool-rejections",
        title: "Thread pool rejections",
        code: "THREAD_POOL_REJECTIONS",
        run: nodes::thread_pool_rejections,
    },
    Check {
        id: "shard-docs-distribution",
        title: "Shard distribution by doc count",
        code: "SHARD_DOCS_DISTRIBUTION",
        run: shards::docs_distribution,
    },
    Check {
        id: "shard-size-distribution",
        title: "Shard distribution by size",
        code: "SHARD_SIZE_DISTRIBUTION",
        run: shards::size_distribution,
    },
    Check {
        id: "shards-per-node",
        title: "Shard distribution per node",
        code: "SHARD_ALLOCATION",
        run: nodes::shards_per_node,
    },
];

/// One section per entry of [`CHECKS`], always in that order.
pub fn run_all(bundle: &DiagnosticBundle, ctx: &CheckContext) -> Vec<Section> {
    CHECKS.iter().map(|check| run_check(check, bundle, ctx)).collect()
}

pub fn run_check(check: &Check, bundle: &DiagnosticBundle, ctx: &CheckContext) -> Section {
    let mut section = Section::new(check.id, check.title);
    if let Err(err) = (check.run)(bundle, ctx, &mut section) {
        tracing::debug!(check = check.id, error = %err, "check skipped");
        section.findings.clear();
        section.charts.clear();
        section.findings.push(unavailable(check.code, &err));
    }
    section
}

fn unavailable(code: &str, err: &SchemaError) -> Finding {
    let document = match err {
        SchemaError::MissingDocument { document, .. }
        | SchemaError::MissingField { document, .. }
        | SchemaError::InvalidValue { document, .. } => *document,
    };
    let finding = Finding::new(code, Severity::Unavailable, format!("data unavailable: {err}"))
        .with_evidence(Evidence::document(document));
    match err {
        SchemaError::MissingField { path, .. } | SchemaError::InvalidValue { path, .. } => {
            finding.with_evidence(Evidence::field(path.clone()))
        }
        SchemaError::MissingDocument { .. } => finding,
    }
}

pub(crate) fn doc_evidence(kind: DocumentKind) -> Evidence {
    Evidence::document(kind.file_name())
}

pub(crate) fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    part as f64 / total as f64 * 100.0
}
