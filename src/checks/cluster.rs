use crate::core::{Evidence, Finding, Section, Severity};
use crate::dump::{self, DiagnosticBundle, DocumentKind, NodeInfo, SchemaError};
use crate::ui::format_bytes;

use super::{CheckContext, GIB, MIB, doc_evidence};

/// Heap size above which the JVM cannot use compressed object pointers.
const COMPRESSED_OOPS_HEAP_LIMIT: u64 = 32 * 1024 * 1024 * 1024;

pub(super) fn cluster_health(
    bundle: &DiagnosticBundle,
    _ctx: &CheckContext,
    section: &mut Section,
) -> Result<(), SchemaError> {
    let health = dump::cluster_health(bundle)?;
    let severity = if health.status == "green" {
        Severity::Good
    } else {
        Severity::Warning
    };
    section.findings.push(
        Finding::new(
            "CLUSTER_HEALTH",
            severity,
            format!("Cluster is: {}", health.status.to_ascii_uppercase()),
        )
        .with_evidence(doc_evidence(DocumentKind::ClusterHealth)),
    );

    if let Some(unassigned) = health.unassigned_shards.filter(|n| *n > 0) {
        section.findings.push(
            Finding::new(
                "UNASSIGNED_SHARDS",
                Severity::Warning,
                format!("{unassigned} shards are unassigned"),
            )
            .with_value(unassigned as f64)
            .with_evidence(Evidence::field("unassigned_shards")),
        );
    }
    if let Some(n) = health.number_of_nodes {
        section.findings.push(Finding::new(
            "CLUSTER_NODES",
            Severity::Info,
            format!("Cluster reports {n} nodes"),
        ));
    }
    Ok(())
}

pub(super) fn compressed_oops(
    bundle: &DiagnosticBundle,
    _ctx: &CheckContext,
    section: &mut Section,
) -> Result<(), SchemaError> {
    let nodes = dump::nodes(bundle)?;
    if nodes.is_empty() {
        section.findings.push(Finding::new(
            "COMPRESSED_OOPS",
            Severity::Info,
            "No nodes listed in nodes.json",
        ));
        return Ok(());
    }

    let node_count = nodes.len();
    let off: Vec<&NodeInfo> = nodes
        .iter()
        .filter(|n| n.compressed_oops == Some(false))
        .collect();
    let unknown = nodes.iter().filter(|n| n.compressed_oops.is_none()).count();

    if off.is_empty() {
        let message = if unknown == 0 {
            format!("Compressed OOPs on for all {node_count} nodes")
        } else {
            format!(
                "Compressed OOPs on for all {} nodes that report it",
                node_count - unknown
            )
        };
        section.findings.push(
            Finding::new("COMPRESSED_OOPS", Severity::Good, message)
                .with_evidence(doc_evidence(DocumentKind::Nodes)),
        );
    } else {
        section.findings.push(
            Finding::new(
                "COMPRESSED_OOPS",
                Severity::Warning,
                format!(
                    "Compressed OOPs off for {} nodes out of {node_count}",
                    off.len()
                ),
            )
            .with_value(off.len() as f64)
            .with_evidence(doc_evidence(DocumentKind::Nodes)),
        );
        for node in off {
            section
                .findings
                .push(oops_disabled_finding(node));
        }
    }

    if unknown > 0 {
        section.findings.push(Finding::new(
            "COMPRESSED_OOPS_UNKNOWN",
            Severity::Info,
            format!("Compressed OOPs status not reported for {unknown} nodes"),
        ));
    }
    Ok(())
}

fn oops_disabled_finding(node: &NodeInfo) -> Finding {
    let message = match node.heap_max_bytes {
        Some(heap) if heap < COMPRESSED_OOPS_HEAP_LIMIT => format!(
            "{}: compressed OOPs disabled although the heap ({}) is below the 32 GiB limit",
            node.name,
            format_bytes(heap)
        ),
        Some(heap) => format!(
            "{}: compressed OOPs disabled, heap {} is above the 32 GiB limit; a smaller heap would enable them",
            node.name,
            format_bytes(heap)
        ),
        None => format!("{}: compressed OOPs disabled", node.name),
    };
    let mut finding = Finding::new("COMPRESSED_OOPS_NODE", Severity::Warning, message)
        .with_evidence(Evidence::stat(format!("node_id={}", node.id)));
    if let Some(heap) = node.heap_max_bytes {
        finding = finding.with_value(heap as f64 / GIB);
    }
    finding
}

pub(super) fn cluster_state_size(
    bundle: &DiagnosticBundle,
    ctx: &CheckContext,
    section: &mut Section,
) -> Result<(), SchemaError> {
    let bytes = bundle.size_bytes(DocumentKind::ClusterState)?;
    let mb = bytes as f64 / MIB;
    let limit = ctx.thresholds.max_cluster_state_mb;

    let finding = if mb > limit {
        Finding::new(
            "CLUSTER_STATE_SIZE",
            Severity::Warning,
            format!(
                "Cluster state size is {mb:.2} MB; this might cause various issues across the cluster (limit {limit:.0} MB)"
            ),
        )
    } else {
        Finding::new(
            "CLUSTER_STATE_SIZE",
            Severity::Good,
            format!("Cluster state size is {mb:.2} MB"),
        )
    };
    section.findings.push(
        finding
            .with_value(mb)
            .with_evidence(doc_evidence(DocumentKind::ClusterState))
            .with_evidence(Evidence::stat(format!("bytes={bytes}"))),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::checks::tests::{bundle, run, run_with};
    use crate::checks::CheckContext;
    use crate::core::Severity;
    use crate::dump::{DiagnosticBundle, DocumentKind};
    use serde_json::json;

    #[test]
    fn green_cluster_is_good() {
        let b = bundle(vec![(DocumentKind::ClusterHealth, json!({"status": "green"}))]);
        let s = run("cluster-health", &b);
        assert_eq!(s.findings.len(), 1);
        assert_eq!(s.findings[0].severity, Severity::Good);
        assert_eq!(s.findings[0].message, "Cluster is: GREEN");
    }

    #[test]
    fn red_cluster_with_unassigned_shards_is_flagged() {
        let b = bundle(vec![(
            DocumentKind::ClusterHealth,
            json!({"status": "red", "unassigned_shards": 3, "number_of_nodes": 5}),
        )]);
        let s = run("cluster-health", &b);
        assert_eq!(s.findings[0].severity, Severity::Warning);
        assert_eq!(s.findings[0].message, "Cluster is: RED");
        assert!(s.findings.iter().any(|f| f.code == "UNASSIGNED_SHARDS" && f.value == Some(3.0)));
    }

    #[test]
    fn compressed_oops_flags_disabled_nodes_with_small_heap() {
        let b = bundle(vec![(
            DocumentKind::Nodes,
            json!({"nodes": {
                "a": {"name": "node-a", "jvm": {"using_compressed_ordinary_object_pointers": "true"}},
                "b": {"name": "node-b", "jvm": {"using_compressed_ordinary_object_pointers": "false", "mem": {"heap_max_in_bytes": 8589934592u64}}},
                "c": {"name": "node-c", "jvm": {"using_compressed_ordinary_object_pointers": false, "mem": {"heap_max_in_bytes": 42949672960u64}}}
            }}),
        )]);
        let s = run("compressed-oops", &b);
        assert_eq!(s.findings[0].severity, Severity::Warning);
        assert_eq!(s.findings[0].message, "Compressed OOPs off for 2 nodes out of 3");
        assert!(s.findings[1].message.starts_with("node-b:"));
        assert!(s.findings[1].message.contains("below the 32 GiB limit"));
        assert!(s.findings[2].message.contains("above the 32 GiB limit"));
    }

    #[test]
    fn compressed_oops_all_on_is_good() {
        let b = bundle(vec![(
            DocumentKind::Nodes,
            json!({"nodes": {"a": {"name": "a", "jvm": {"using_compressed_ordinary_object_pointers": "true"}}}}),
        )]);
        let s = run("compressed-oops", &b);
        assert_eq!(s.findings.len(), 1);
        assert_eq!(s.findings[0].severity, Severity::Good);
    }

    #[test]
    fn cluster_state_size_uses_file_size_and_threshold() {
        let big = DiagnosticBundle::from_documents(
            "/dump",
            vec![(DocumentKind::ClusterState, json!({"metadata": "x".repeat(2048)}))],
        );
        let mut ctx = CheckContext::default();
        ctx.thresholds.max_cluster_state_mb = 0.001;
        let s = run_with("cluster-state-size", &big, &ctx);
        assert_eq!(s.findings[0].severity, Severity::Warning);

        let s = run("cluster-state-size", &big);
        assert_eq!(s.findings[0].severity, Severity::Good);
        assert!(s.findings[0].message.starts_with("Cluster state size is 0.00 MB"));
    }

    #[test]
    fn truncated_cluster_state_is_still_sized() {
        let dir = std::env::temp_dir().join(format!("esdiag-cluster-state-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("mkdir");
        std::fs::write(dir.join("shards.json"), b"[]").expect("write");
        let mut truncated = br#"{"metadata": {"indices": {"#.to_vec();
        truncated.extend(std::iter::repeat_n(b'x', 4096));
        std::fs::write(dir.join("cluster_state.json"), &truncated).expect("write");

        let b = crate::dump::load(&dir).expect("load");
        let mut ctx = CheckContext::default();
        ctx.thresholds.max_cluster_state_mb = 0.001;
        let s = run_with("cluster-state-size", &b, &ctx);
        assert_eq!(s.findings[0].code, "CLUSTER_STATE_SIZE");
        assert_eq!(s.findings[0].severity, Severity::Warning);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
