use crate::core::{Chart, Evidence, Finding, Section, Severity};
use crate::dump::{self, DiagnosticBundle, DocumentKind, SchemaError, parse_time_value};
use crate::ui::format_bytes;

use super::{CheckContext, MIB, doc_evidence, percent};

/// Elasticsearch applies this when an index does not set `refresh_interval`.
const DEFAULT_REFRESH_INTERVAL: &str = "1s";

pub(super) fn refresh_interval(
    bundle: &DiagnosticBundle,
    ctx: &CheckContext,
    section: &mut Section,
) -> Result<(), SchemaError> {
    let settings = dump::index_settings(bundle)?;
    let threshold = ctx.thresholds.low_refresh_duration();
    let threshold_label = &ctx.thresholds.low_refresh_interval;

    let (ignored, indices): (Vec<_>, Vec<_>) = settings
        .iter()
        .partition(|s| ctx.ignore_indices.is_match(&s.name));

    if indices.is_empty() {
        section.findings.push(
            Finding::new(
                "REFRESH_INTERVAL",
                Severity::Info,
                "No indices to check for refresh_interval",
            )
            .with_evidence(doc_evidence(DocumentKind::Settings)),
        );
        push_ignored(section, ignored.len());
        return Ok(());
    }

    let mut low: Vec<(&str, String)> = Vec::new();
    let mut unparseable: Vec<(&str, &str)> = Vec::new();
    for index in &indices {
        let raw = index
            .refresh_interval
            .as_deref()
            .unwrap_or(DEFAULT_REFRESH_INTERVAL);
        match parse_time_value(raw) {
            Ok(Some(interval)) if interval <= threshold => {
                let shown = match &index.refresh_interval {
                    Some(v) => v.clone(),
                    None => format!("{DEFAULT_REFRESH_INTERVAL} (default)"),
                };
                low.push((index.name.as_str(), shown));
            }
            Ok(_) => {}
            Err(_) => unparseable.push((index.name.as_str(), raw)),
        }
    }

    let total = indices.len();
    let pct = percent(low.len(), total);
    let summary = format!(
        "refresh_interval is at or below {threshold_label} for {} of {total} indices ({pct:.1}%)",
        low.len()
    );
    let finding = if pct / 100.0 > ctx.thresholds.low_refresh_ratio {
        Finding::new(
            "REFRESH_INTERVAL",
            Severity::Warning,
            format!("{summary}, consider raising to 30s or 60s to speed up ingestion"),
        )
    } else {
        Finding::new(
            "REFRESH_INTERVAL",
            Severity::Good,
            format!("{summary}, that's ok"),
        )
    };
    section.findings.push(
        finding
            .with_value(pct)
            .with_evidence(doc_evidence(DocumentKind::Settings))
            .with_evidence(Evidence::field("settings.index.refresh_interval")),
    );

    for (name, raw) in &unparseable {
        section.findings.push(Finding::new(
            "REFRESH_INTERVAL_INVALID",
            Severity::Info,
            format!("{name}: cannot parse refresh_interval {raw:?}"),
        ));
    }
    push_ignored(section, ignored.len());

    if !low.is_empty() {
        section.charts.push(Chart::Table {
            title: "Indices with a low refresh_interval".to_string(),
            columns: vec!["Index".to_string(), "refresh_interval".to_string()],
            rows: low
                .into_iter()
                .map(|(name, shown)| vec![name.to_string(), shown])
                .collect(),
        });
    }
    Ok(())
}

fn push_ignored(section: &mut Section, ignored: usize) {
    if ignored > 0 {
        section.findings.push(Finding::new(
            "REFRESH_INTERVAL_IGNORED",
            Severity::Info,
            format!("{ignored} indices skipped by analysis.ignore_indices"),
        ));
    }
}

pub(super) fn high_cardinality_fields(
    bundle: &DiagnosticBundle,
    ctx: &CheckContext,
    section: &mut Section,
) -> Result<(), SchemaError> {
    let fields = dump::fielddata_by_field(bundle)?;
    let limit_mb = ctx.thresholds.fielddata_field_mb;

    let heavy: Vec<&(String, u64)> = fields
        .iter()
        .filter(|(_, bytes)| *bytes as f64 / MIB >= limit_mb)
        .collect();

    if fields.is_empty() {
        section.findings.push(
            Finding::new(
                "HIGH_CARDINALITY_FIELD",
                Severity::Good,
                "No fielddata loaded on any node",
            )
            .with_evidence(doc_evidence(DocumentKind::FielddataStats)),
        );
        return Ok(());
    }

    if heavy.is_empty() {
        section.findings.push(
            Finding::new(
                "HIGH_CARDINALITY_FIELD",
                Severity::Good,
                format!(
                    "No field uses more than {limit_mb:.0} MB of fielddata ({} fields loaded)",
                    fields.len()
                ),
            )
            .with_evidence(doc_evidence(DocumentKind::FielddataStats)),
        );
    }
    for (name, bytes) in heavy {
        section.findings.push(
            Finding::new(
                "HIGH_CARDINALITY_FIELD",
                Severity::Warning,
                format!(
                    "{name}: {} of fielddata, check whether aggregating or sorting on this field is needed",
                    format_bytes(*bytes)
                ),
            )
            .with_value(*bytes as f64 / MIB)
            .with_evidence(Evidence::field(name.clone())),
        );
    }

    let top = ctx.thresholds.top_fields;
    section.charts.push(Chart::Table {
        title: format!("Top {top} largest fields"),
        columns: vec!["Field".to_string(), "Fielddata".to_string()],
        rows: fields
            .iter()
            .take(top)
            .map(|(name, bytes)| vec![name.clone(), format_bytes(*bytes)])
            .collect(),
    });

    let empty: Vec<&str> = fields
        .iter()
        .filter(|(_, bytes)| *bytes == 0)
        .map(|(name, _)| name.as_str())
        .collect();
    if !empty.is_empty() {
        section.findings.push(
            Finding::new(
                "FIELDDATA_EMPTY_FIELDS",
                Severity::Info,
                format!(
                    "{} fields hold no fielddata, consider removing them from mappings",
                    empty.len()
                ),
            )
            .with_value(empty.len() as f64)
            .with_evidence(doc_evidence(DocumentKind::FielddataStats)),
        );
        section.charts.push(Chart::Table {
            title: "Fields without fielddata".to_string(),
            columns: vec!["Field".to_string()],
            rows: empty.into_iter().map(|name| vec![name.to_string()]).collect(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::checks::tests::{bundle, run, run_with};
    use crate::checks::CheckContext;
    use crate::config::build_globset;
    use crate::core::{Chart, Severity};
    use crate::dump::DocumentKind;
    use serde_json::{Value, json};

    fn settings(intervals: &[(&str, Option<&str>)]) -> Value {
        let mut map = serde_json::Map::new();
        for (name, interval) in intervals {
            let index = match interval {
                Some(v) => json!({"settings": {"index": {"refresh_interval": v}}}),
                None => json!({"settings": {"index": {"number_of_shards": "1"}}}),
            };
            map.insert(name.to_string(), index);
        }
        Value::Object(map)
    }

    #[test]
    fn default_refresh_interval_counts_as_low() {
        let b = bundle(vec![(
            DocumentKind::Settings,
            settings(&[("a", None), ("b", Some("30s")), ("c", Some("-1")), ("d", Some("500ms"))]),
        )]);
        let s = run("refresh-interval", &b);
        let f = &s.findings[0];
        assert_eq!(f.severity, Severity::Warning);
        assert_eq!(f.value, Some(50.0));
        assert!(f.message.contains("2 of 4 indices"), "message={}", f.message);
        match &s.charts[0] {
            Chart::Table { rows, .. } => {
                assert_eq!(rows[0], vec!["a".to_string(), "1s (default)".to_string()]);
                assert_eq!(rows[1], vec!["d".to_string(), "500ms".to_string()]);
            }
            Chart::Histogram { .. } => panic!("expected table"),
        }
    }

    #[test]
    fn few_low_intervals_are_ok() {
        let mut indices: Vec<(String, Option<&str>)> =
            (0..19).map(|i| (format!("logs-{i:02}"), Some("60s"))).collect();
        indices.push(("hot".to_string(), Some("1s")));
        let refs: Vec<(&str, Option<&str>)> =
            indices.iter().map(|(n, v)| (n.as_str(), *v)).collect();
        let b = bundle(vec![(DocumentKind::Settings, settings(&refs))]);
        let s = run("refresh-interval", &b);
        assert_eq!(s.findings[0].severity, Severity::Good);
        assert!(s.findings[0].message.ends_with("that's ok"));
    }

    #[test]
    fn ignored_indices_are_skipped() {
        let b = bundle(vec![(
            DocumentKind::Settings,
            settings(&[(".kibana", None), (".tasks", None), ("app", Some("30s"))]),
        )]);
        let mut ctx = CheckContext::default();
        ctx.ignore_indices = build_globset(&[".*".to_string()]).expect("globset");
        let s = run_with("refresh-interval", &b, &ctx);
        assert_eq!(s.findings[0].severity, Severity::Good);
        assert!(s.findings[0].message.contains("0 of 1 indices"));
        assert!(s.findings.iter().any(|f| f.code == "REFRESH_INTERVAL_IGNORED"));
    }

    #[test]
    fn unparseable_interval_is_reported() {
        let b = bundle(vec![(DocumentKind::Settings, settings(&[("a", Some("soon"))]))]);
        let s = run("refresh-interval", &b);
        assert!(s.findings.iter().any(|f| f.code == "REFRESH_INTERVAL_INVALID"));
    }

    fn fielddata(fields: &[(&str, u64)]) -> Value {
        let mut map = serde_json::Map::new();
        for (name, bytes) in fields {
            map.insert(name.to_string(), json!({"memory_size_in_bytes": bytes}));
        }
        json!({"nodes": {"n1": {"indices": {"fielddata": {"fields": map}}}}})
    }

    #[test]
    fn large_fielddata_fields_are_flagged() {
        let b = bundle(vec![(
            DocumentKind::FielddataStats,
            fielddata(&[("user.id", 200 * 1024 * 1024), ("tags", 1024), ("host", 0)]),
        )]);
        let s = run("high-cardinality-fields", &b);
        assert_eq!(s.findings.len(), 2);
        assert_eq!(s.findings[0].severity, Severity::Warning);
        assert!(s.findings[0].message.starts_with("user.id: 200.0 MiB"));
        match &s.charts[0] {
            Chart::Table { title, rows, .. } => {
                assert_eq!(title, "Top 10 largest fields");
                assert_eq!(rows.len(), 3);
                assert_eq!(rows[0][0], "user.id");
            }
            Chart::Histogram { .. } => panic!("expected table"),
        }
    }

    #[test]
    fn zero_byte_fields_are_listed_for_removal() {
        let b = bundle(vec![(
            DocumentKind::FielddataStats,
            fielddata(&[("tags", 1024), ("zone", 0), ("host", 0)]),
        )]);
        let s = run("high-cardinality-fields", &b);
        let f = s
            .findings
            .iter()
            .find(|f| f.code == "FIELDDATA_EMPTY_FIELDS")
            .expect("empty fields finding");
        assert_eq!(f.severity, Severity::Info);
        assert_eq!(f.value, Some(2.0));
        assert!(f.message.starts_with("2 fields hold no fielddata"), "message={}", f.message);
        match &s.charts[1] {
            Chart::Table { title, rows, .. } => {
                assert_eq!(title, "Fields without fielddata");
                assert_eq!(rows, &vec![vec!["host".to_string()], vec!["zone".to_string()]]);
            }
            Chart::Histogram { .. } => panic!("expected table"),
        }
    }

    #[test]
    fn table_is_limited_to_top_fields() {
        let fields: Vec<(String, u64)> = (0..15).map(|i| (format!("f{i:02}"), i * 10)).collect();
        let refs: Vec<(&str, u64)> = fields.iter().map(|(n, b)| (n.as_str(), *b)).collect();
        let b = bundle(vec![(DocumentKind::FielddataStats, fielddata(&refs))]);
        let s = run("high-cardinality-fields", &b);
        assert_eq!(s.findings[0].severity, Severity::Good);
        match &s.charts[0] {
            Chart::Table { rows, .. } => {
                assert_eq!(rows.len(), 10);
                assert_eq!(rows[0][0], "f14");
            }
            Chart::Histogram { .. } => panic!("expected table"),
        }
    }
}
