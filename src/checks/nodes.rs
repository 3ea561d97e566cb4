use std::collections::BTreeMap;

use crate::core::{Chart, Evidence, Finding, Section, Severity};
use crate::dump::{self, DiagnosticBundle, DocumentKind, SchemaError};
use crate::stats;

use super::{CheckContext, GIB, doc_evidence};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Rejection<'a> {
    node: &'a str,
    pool: &'a str,
    rejected: u64,
}

pub(super) fn thread_pool_rejections(
    bundle: &DiagnosticBundle,
    _ctx: &CheckContext,
    section: &mut Section,
) -> Result<(), SchemaError> {
    let nodes = dump::nodes_stats(bundle)?;

    let mut rejections: Vec<Rejection<'_>> = nodes
        .iter()
        .flat_map(|n| {
            n.thread_pool_rejections
                .iter()
                .filter(|(_, rejected)| *rejected > 0)
                .map(move |(pool, rejected)| Rejection {
                    node: n.name.as_str(),
                    pool: pool.as_str(),
                    rejected: *rejected,
                })
        })
        .collect();
    rejections.sort_by(|a, b| {
        b.rejected
            .cmp(&a.rejected)
            .then_with(|| a.node.cmp(b.node))
            .then_with(|| a.pool.cmp(b.pool))
    });

    if rejections.is_empty() {
        section.findings.push(
            Finding::new(
                "THREAD_POOL_REJECTIONS",
                Severity::Good,
                format!("No thread pool rejections on {} nodes", nodes.len()),
            )
            .with_evidence(doc_evidence(DocumentKind::NodesStats)),
        );
        return Ok(());
    }

    for r in &rejections {
        section.findings.push(
            Finding::new(
                "THREAD_POOL_REJECTIONS",
                Severity::Warning,
                format!("{} / {}: {} rejections", r.node, r.pool, r.rejected),
            )
            .with_value(r.rejected as f64),
        );
    }

    let mut by_pool: BTreeMap<&str, u64> = BTreeMap::new();
    for r in &rejections {
        let entry = by_pool.entry(r.pool).or_insert(0);
        *entry = entry.saturating_add(r.rejected);
    }
    let mut by_pool: Vec<(&str, u64)> = by_pool.into_iter().collect();
    by_pool.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    section.charts.push(Chart::Table {
        title: "Thread pool rejections".to_string(),
        columns: vec![
            "Node".to_string(),
            "Thread pool".to_string(),
            "Rejections".to_string(),
        ],
        rows: rejections
            .iter()
            .map(|r| vec![r.node.to_string(), r.pool.to_string(), r.rejected.to_string()])
            .collect(),
    });
    section.charts.push(Chart::Table {
        title: "Rejections by thread pool".to_string(),
        columns: vec!["Thread pool".to_string(), "Rejections".to_string()],
        rows: by_pool
            .iter()
            .map(|(pool, n)| vec![pool.to_string(), n.to_string()])
            .collect(),
    });
    Ok(())
}

pub(super) fn shards_per_node(
    bundle: &DiagnosticBundle,
    ctx: &CheckContext,
    section: &mut Section,
) -> Result<(), SchemaError> {
    let shards = dump::shards(bundle)?;

    let mut per_node: BTreeMap<String, u64> = BTreeMap::new();
    // Data nodes without any shard count as zero.
    if let Ok(nodes) = dump::nodes(bundle) {
        for node in nodes.iter().filter(|n| n.is_data_node()) {
            per_node.insert(node.name.clone(), 0);
        }
    }
    let mut unassigned: u64 = 0;
    for shard in &shards {
        match &shard.node {
            Some(node) => *per_node.entry(node.clone()).or_insert(0) += 1,
            None => unassigned += 1,
        }
    }

    if unassigned > 0 {
        section.findings.push(
            Finding::new(
                "UNASSIGNED_SHARDS",
                Severity::Warning,
                format!("{unassigned} shards are not allocated to any node"),
            )
            .with_value(unassigned as f64),
        );
    }

    let min = per_node.iter().min_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(b.0)));
    let max = per_node.iter().max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)));
    let (Some((min_node, &min_count)), Some((max_node, &max_count))) = (min, max) else {
        section.findings.push(Finding::new(
            "SHARD_ALLOCATION",
            Severity::Info,
            "No shards are allocated to any node",
        ));
        return Ok(());
    };

    let spread = max_count - min_count;
    let tolerance = ctx.thresholds.shard_imbalance_tolerance;
    let finding = if spread > tolerance {
        Finding::new(
            "SHARD_ALLOCATION",
            Severity::Warning,
            format!(
                "Shard allocation is imbalanced: {max_count} shards on {max_node} vs {min_count} on {min_node} (difference {spread} exceeds tolerance {tolerance})"
            ),
        )
    } else {
        Finding::new(
            "SHARD_ALLOCATION",
            Severity::Good,
            format!(
                "Shard allocation is balanced across {} nodes: {min_count} to {max_count} shards per node",
                per_node.len()
            ),
        )
    };
    section.findings.push(
        finding
            .with_value(spread as f64)
            .with_evidence(doc_evidence(DocumentKind::Shards))
            .with_evidence(Evidence::stat(format!(
                "nodes={} min={min_count} max={max_count}",
                per_node.len()
            ))),
    );

    let counts: Vec<f64> = per_node.values().map(|c| *c as f64).collect();
    section.charts.push(Chart::Histogram {
        title: "Nodes by shard count".to_string(),
        unit: "shards".to_string(),
        buckets: stats::histogram(&counts, ctx.histogram_buckets),
    });

    let mut rows: Vec<(&String, &u64)> = per_node.iter().collect();
    rows.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    section.charts.push(Chart::Table {
        title: "Shards per node".to_string(),
        columns: vec!["Node".to_string(), "Shards".to_string()],
        rows: rows
            .into_iter()
            .map(|(node, n)| vec![node.clone(), n.to_string()])
            .collect(),
    });

    if let Ok(stats) = dump::nodes_stats(bundle) {
        let docs: Vec<f64> = stats
            .iter()
            .filter_map(|n| n.docs_count)
            .map(|d| d as f64 / 1_000_000.0)
            .collect();
        if !docs.is_empty() {
            section.charts.push(Chart::Histogram {
                title: "Nodes by doc count".to_string(),
                unit: "million docs".to_string(),
                buckets: stats::histogram(&docs, ctx.histogram_buckets),
            });
        }
        let disk: Vec<f64> = stats
            .iter()
            .filter_map(|n| n.store_bytes)
            .map(|b| b as f64 / GIB)
            .collect();
        if !disk.is_empty() {
            section.charts.push(Chart::Histogram {
                title: "Nodes by disk size".to_string(),
                unit: "GiB".to_string(),
                buckets: stats::histogram(&disk, ctx.histogram_buckets),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::checks::tests::{bundle, run};
    use crate::core::{Chart, Severity};
    use crate::dump::DocumentKind;
    use serde_json::{Value, json};

    fn node_stats(name: &str, pools: Value) -> Value {
        json!({"name": name, "indices": {"docs": {"count": 1000}, "store": {"size_in_bytes": 1024}}, "thread_pool": pools})
    }

    #[test]
    fn rejections_skip_zero_and_sort_descending() {
        let b = bundle(vec![(
            DocumentKind::NodesStats,
            json!({"nodes": {
                "x": node_stats("node-zero", json!({"write": {"rejected": 0}, "search": {"rejected": 0}})),
                "y": node_stats("node-two", json!({"write": {"rejected": 2}})),
                "z": node_stats("node-five", json!({"search": {"rejected": 5}, "get": {"rejected": 0}}))
            }}),
        )]);
        let s = run("thread-pool-rejections", &b);
        let messages: Vec<&str> = s.findings.iter().map(|f| f.message.as_str()).collect();
        assert_eq!(
            messages,
            vec!["node-five / search: 5 rejections", "node-two / write: 2 rejections"]
        );
        assert!(s.findings.iter().all(|f| f.severity == Severity::Warning));
        assert!(!messages.iter().any(|m| m.contains("node-zero")));
        assert_eq!(s.charts.len(), 2);
        match &s.charts[1] {
            Chart::Table { rows, .. } => {
                assert_eq!(rows[0], vec!["search".to_string(), "5".to_string()]);
                assert_eq!(rows[1], vec!["write".to_string(), "2".to_string()]);
            }
            Chart::Histogram { .. } => panic!("expected table"),
        }
    }

    #[test]
    fn no_rejections_is_good() {
        let b = bundle(vec![(
            DocumentKind::NodesStats,
            json!({"nodes": {"x": node_stats("n", json!({"write": {"rejected": 0}}))}}),
        )]);
        let s = run("thread-pool-rejections", &b);
        assert_eq!(s.findings.len(), 1);
        assert_eq!(s.findings[0].severity, Severity::Good);
    }

    fn shards_on(counts: &[(&str, usize)]) -> Value {
        let mut rows = vec![];
        for (node, n) in counts {
            for i in 0..*n {
                rows.push(json!({"index": "idx", "shard": i.to_string(), "prirep": "p", "node": node}));
            }
        }
        Value::Array(rows)
    }

    #[test]
    fn imbalanced_allocation_is_flagged() {
        let b = bundle(vec![(
            DocumentKind::Shards,
            shards_on(&[("n1", 10), ("n2", 10), ("n3", 50)]),
        )]);
        let s = run("shards-per-node", &b);
        let f = s.findings.iter().find(|f| f.code == "SHARD_ALLOCATION").expect("finding");
        assert_eq!(f.severity, Severity::Warning);
        assert_eq!(f.value, Some(40.0));
        assert!(f.message.contains("50 shards on n3"), "message={}", f.message);
        assert!(f.message.contains("10 on n1"), "message={}", f.message);
    }

    #[test]
    fn balanced_allocation_is_good_and_includes_idle_data_nodes() {
        let b = bundle(vec![
            (DocumentKind::Shards, shards_on(&[("n1", 5), ("n2", 5)])),
            (
                DocumentKind::Nodes,
                json!({"nodes": {
                    "1": {"name": "n1", "roles": ["data"]},
                    "2": {"name": "n2", "roles": ["data"]},
                    "3": {"name": "n3", "roles": ["data"]},
                    "4": {"name": "m1", "roles": ["master"]}
                }}),
            ),
        ]);
        let s = run("shards-per-node", &b);
        let f = s.findings.iter().find(|f| f.code == "SHARD_ALLOCATION").expect("finding");
        assert_eq!(f.severity, Severity::Good);
        assert_eq!(f.value, Some(5.0));
        match &s.charts[1] {
            Chart::Table { rows, .. } => {
                assert_eq!(rows.len(), 3);
                assert_eq!(rows[2], vec!["n3".to_string(), "0".to_string()]);
            }
            Chart::Histogram { .. } => panic!("expected table"),
        }
    }

    #[test]
    fn unassigned_shards_are_reported() {
        let b = bundle(vec![(
            DocumentKind::Shards,
            json!([
                {"index": "a", "shard": "0", "prirep": "p", "node": "n1"},
                {"index": "a", "shard": "0", "prirep": "r", "state": "UNASSIGNED", "node": null}
            ]),
        )]);
        let s = run("shards-per-node", &b);
        assert!(s.findings.iter().any(|f| f.code == "UNASSIGNED_SHARDS" && f.value == Some(1.0)));
    }
}
