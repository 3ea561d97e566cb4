//! Typed views over the diagnostic documents.
//!
//! Accessors tolerate schema drift: unknown keys are ignored and optional
//! values become `None`. Only the fields a check cannot do without produce a
//! [`SchemaError`] naming the document and the JSON path.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::{Map, Value};

use super::{DiagnosticBundle, DocumentKind};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("{document} is unavailable ({reason})")]
    MissingDocument {
        document: &'static str,
        reason: String,
    },
    #[error("{document}: missing field `{path}`")]
    MissingField { document: &'static str, path: String },
    #[error("{document}: unexpected value at `{path}` ({reason})")]
    InvalidValue {
        document: &'static str,
        path: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterHealth {
    pub status: String,
    pub number_of_nodes: Option<u64>,
    pub unassigned_shards: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub id: String,
    pub name: String,
    pub roles: Option<Vec<String>>,
    pub compressed_oops: Option<bool>,
    pub heap_max_bytes: Option<u64>,
}

impl NodeInfo {
    /// Nodes from versions without `roles` are assumed to hold data.
    pub fn is_data_node(&self) -> bool {
        match &self.roles {
            None => true,
            Some(roles) => roles.iter().any(|r| r.starts_with("data")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStats {
    pub id: String,
    pub name: String,
    pub docs_count: Option<u64>,
    pub store_bytes: Option<u64>,
    /// `(pool, rejected)` sorted by pool name.
    pub thread_pool_rejections: Vec<(String, u64)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardInfo {
    pub index: String,
    pub shard: String,
    pub primary: bool,
    pub state: Option<String>,
    pub docs: Option<u64>,
    pub store_bytes: Option<u64>,
    pub node: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSettings {
    pub name: String,
    pub refresh_interval: Option<String>,
}

pub fn cluster_health(bundle: &DiagnosticBundle) -> Result<ClusterHealth, SchemaError> {
    let kind = DocumentKind::ClusterHealth;
    let doc = bundle.value(kind)?;
    let status = field(kind, doc, &["status"])?
        .as_str()
        .ok_or_else(|| invalid(kind, "status", "expected a string"))?
        .to_ascii_lowercase();
    Ok(ClusterHealth {
        status,
        number_of_nodes: opt_field(doc, &["number_of_nodes"]).and_then(lenient_u64),
        unassigned_shards: opt_field(doc, &["unassigned_shards"]).and_then(lenient_u64),
    })
}

/// Nodes from `nodes.json`, sorted by name then id.
pub fn nodes(bundle: &DiagnosticBundle) -> Result<Vec<NodeInfo>, SchemaError> {
    let kind = DocumentKind::Nodes;
    let doc = bundle.value(kind)?;
    let nodes = object(kind, doc, &["nodes"])?;

    let mut out: Vec<NodeInfo> = nodes
        .iter()
        .map(|(id, n)| NodeInfo {
            id: id.clone(),
            name: node_name(id, n),
            roles: opt_field(n, &["roles"]).and_then(Value::as_array).map(|roles| {
                roles
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            }),
            compressed_oops: opt_field(n, &["jvm", "using_compressed_ordinary_object_pointers"])
                .and_then(lenient_bool),
            heap_max_bytes: opt_field(n, &["jvm", "mem", "heap_max_in_bytes"])
                .and_then(lenient_u64),
        })
        .collect();
    out.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    Ok(out)
}

/// Data node count: `cluster_stats.json` first, then the data nodes of `nodes.json`.
pub fn data_node_count(bundle: &DiagnosticBundle) -> Result<u64, SchemaError> {
    if let Ok(doc) = bundle.value(DocumentKind::ClusterStats) {
        if let Some(n) = opt_field(doc, &["nodes", "count", "data"]).and_then(lenient_u64) {
            return Ok(n);
        }
    }
    let nodes = nodes(bundle)?;
    Ok(nodes.iter().filter(|n| n.is_data_node()).count() as u64)
}

pub fn nodes_stats(bundle: &DiagnosticBundle) -> Result<Vec<NodeStats>, SchemaError> {
    let kind = DocumentKind::NodesStats;
    let doc = bundle.value(kind)?;
    let nodes = object(kind, doc, &["nodes"])?;

    let mut out: Vec<NodeStats> = nodes
        .iter()
        .map(|(id, n)| {
            let mut thread_pool_rejections: Vec<(String, u64)> =
                opt_field(n, &["thread_pool"])
                    .and_then(Value::as_object)
                    .map(|pools| {
                        pools
                            .iter()
                            .map(|(pool, stats)| {
                                let rejected = opt_field(stats, &["rejected"])
                                    .and_then(lenient_u64)
                                    .unwrap_or(0);
                                (pool.clone(), rejected)
                            })
                            .collect()
                    })
                    .unwrap_or_default();
            thread_pool_rejections.sort();
            NodeStats {
                id: id.clone(),
                name: node_name(id, n),
                docs_count: opt_field(n, &["indices", "docs", "count"]).and_then(lenient_u64),
                store_bytes: opt_field(n, &["indices", "store", "size_in_bytes"])
                    .and_then(lenient_u64),
                thread_pool_rejections,
            }
        })
        .collect();
    out.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    Ok(out)
}

/// Rows of `_cat/shards?format=json`. The cat API renders numbers as strings.
pub fn shards(bundle: &DiagnosticBundle) -> Result<Vec<ShardInfo>, SchemaError> {
    let kind = DocumentKind::Shards;
    let doc = bundle.value(kind)?;
    let rows = doc
        .as_array()
        .ok_or_else(|| invalid(kind, "$", "expected an array of shard rows"))?;

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let index = field(kind, row, &["index"])
                .map_err(|_| missing(kind, format!("[{i}].index")))?
                .as_str()
                .unwrap_or_default()
                .to_string();
            let prirep = opt_field(row, &["prirep"])
                .and_then(Value::as_str)
                .unwrap_or("p");
            Ok(ShardInfo {
                index,
                shard: opt_field(row, &["shard"])
                    .map(value_to_string)
                    .unwrap_or_default(),
                primary: prirep.eq_ignore_ascii_case("p") || prirep.eq_ignore_ascii_case("primary"),
                state: opt_field(row, &["state"])
                    .and_then(Value::as_str)
                    .map(str::to_string),
                docs: opt_field(row, &["docs"]).and_then(lenient_u64),
                store_bytes: opt_field(row, &["store"]).and_then(lenient_bytes),
                node: opt_field(row, &["node"])
                    .and_then(Value::as_str)
                    .and_then(allocated_node_name),
            })
        })
        .collect()
}

/// Shard total from `shards.json`, falling back to `cluster_stats.json`.
pub fn total_shard_count(bundle: &DiagnosticBundle) -> Result<u64, SchemaError> {
    match shards(bundle) {
        Ok(shards) => Ok(shards.len() as u64),
        Err(err) => {
            let Ok(doc) = bundle.value(DocumentKind::ClusterStats) else {
                return Err(err);
            };
            opt_field(doc, &["indices", "shards", "total"])
                .and_then(lenient_u64)
                .ok_or(err)
        }
    }
}

/// Per-index settings, sorted by index name. Accepts nested and flat settings.
pub fn index_settings(bundle: &DiagnosticBundle) -> Result<Vec<IndexSettings>, SchemaError> {
    let kind = DocumentKind::Settings;
    let doc = bundle.value(kind)?;
    let indices = doc
        .as_object()
        .ok_or_else(|| invalid(kind, "$", "expected an object keyed by index"))?;

    let mut out: Vec<IndexSettings> = indices
        .iter()
        .map(|(name, v)| {
            let refresh_interval = opt_field(v, &["settings", "index", "refresh_interval"])
                .or_else(|| opt_field(v, &["settings", "index.refresh_interval"]))
                .map(value_to_string);
            IndexSettings {
                name: name.clone(),
                refresh_interval,
            }
        })
        .collect();
    out.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(out)
}

/// Fielddata memory per field, summed over nodes, largest first.
pub fn fielddata_by_field(bundle: &DiagnosticBundle) -> Result<Vec<(String, u64)>, SchemaError> {
    let kind = DocumentKind::FielddataStats;
    let doc = bundle.value(kind)?;
    let nodes = object(kind, doc, &["nodes"])?;

    let mut sizes: BTreeMap<String, u64> = BTreeMap::new();
    for n in nodes.values() {
        let Some(fields) =
            opt_field(n, &["indices", "fielddata", "fields"]).and_then(Value::as_object)
        else {
            continue;
        };
        for (name, stats) in fields {
            let bytes = opt_field(stats, &["memory_size_in_bytes"])
                .and_then(lenient_u64)
                .unwrap_or(0);
            let entry = sizes.entry(name.clone()).or_insert(0);
            *entry = entry.saturating_add(bytes);
        }
    }

    let mut out: Vec<(String, u64)> = sizes.into_iter().collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    Ok(out)
}

/// Elasticsearch time value to a duration; `Ok(None)` means disabled (`-1`).
/// A bare number is read as milliseconds.
pub fn parse_time_value(s: &str) -> Result<Option<Duration>, String> {
    let s = s.trim().to_ascii_lowercase();
    if s == "-1" {
        return Ok(None);
    }
    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    let (num, unit) = s.split_at(split);
    let n: f64 = num
        .parse()
        .map_err(|_| format!("invalid time value: {s:?}"))?;
    let secs = match unit.trim() {
        "" | "ms" => n / 1_000.0,
        "nanos" => n / 1_000_000_000.0,
        "micros" => n / 1_000_000.0,
        "s" => n,
        "m" => n * 60.0,
        "h" => n * 3_600.0,
        "d" => n * 86_400.0,
        other => return Err(format!("unknown time unit {other:?} in {s:?}")),
    };
    Duration::try_from_secs_f64(secs)
        .map(Some)
        .map_err(|err| format!("time value out of range {s:?}: {err}"))
}

/// Byte size as rendered by the cat APIs: `"1234"`, `"1234b"`, `"1.5gb"`.
pub fn parse_byte_value(s: &str) -> Option<u64> {
    let s = s.trim().to_ascii_lowercase();
    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    let (num, unit) = s.split_at(split);
    let n: f64 = num.parse().ok()?;
    let mult: f64 = match unit.trim() {
        "" | "b" => 1.0,
        "kb" => 1024.0,
        "mb" => 1024.0 * 1024.0,
        "gb" => 1024.0 * 1024.0 * 1024.0,
        "tb" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        "pb" => 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };
    Some((n * mult).round() as u64)
}

fn node_name(id: &str, node: &Value) -> String {
    opt_field(node, &["name"])
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| id.to_string())
}

/// `"node-1 -> 10.0.0.2 abc node-2"` for relocating shards; the source node owns it.
fn allocated_node_name(raw: &str) -> Option<String> {
    let name = raw.split("->").next().unwrap_or(raw).trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

fn opt_field<'a>(v: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut cur = v;
    for key in path {
        cur = cur.get(*key)?;
    }
    if cur.is_null() { None } else { Some(cur) }
}

fn field<'a>(kind: DocumentKind, v: &'a Value, path: &[&str]) -> Result<&'a Value, SchemaError> {
    opt_field(v, path).ok_or_else(|| missing(kind, path.join(".")))
}

fn object<'a>(
    kind: DocumentKind,
    v: &'a Value,
    path: &[&str],
) -> Result<&'a Map<String, Value>, SchemaError> {
    field(kind, v, path)?
        .as_object()
        .ok_or_else(|| invalid(kind, &path.join("."), "expected an object"))
}

fn missing(kind: DocumentKind, path: String) -> SchemaError {
    SchemaError::MissingField {
        document: kind.file_name(),
        path,
    }
}

fn invalid(kind: DocumentKind, path: &str, reason: &str) -> SchemaError {
    SchemaError::InvalidValue {
        document: kind.file_name(),
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

fn lenient_u64(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

fn lenient_bytes(v: &Value) -> Option<u64> {
    match v {
        Value::String(s) => parse_byte_value(s),
        other => lenient_u64(other),
    }
}

fn lenient_bool(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
