use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use walkdir::WalkDir;

mod schema;

pub use schema::{
    ClusterHealth, IndexSettings, NodeInfo, NodeStats, SchemaError, ShardInfo, cluster_health,
    data_node_count, fielddata_by_field, index_settings, nodes, nodes_stats, parse_byte_value,
    parse_time_value, shards, total_shard_count,
};

/// Files written by the diagnostics collection tool that the checks read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DocumentKind {
    ClusterHealth,
    ClusterStats,
    Nodes,
    NodesStats,
    Shards,
    ClusterState,
    Settings,
    FielddataStats,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 8] = [
        DocumentKind::ClusterHealth,
        DocumentKind::ClusterStats,
        DocumentKind::Nodes,
        DocumentKind::NodesStats,
        DocumentKind::Shards,
        DocumentKind::ClusterState,
        DocumentKind::Settings,
        DocumentKind::FielddataStats,
    ];

    pub const fn file_name(self) -> &'static str {
        match self {
            DocumentKind::ClusterHealth => "cluster_health.json",
            DocumentKind::ClusterStats => "cluster_stats.json",
            DocumentKind::Nodes => "nodes.json",
            DocumentKind::NodesStats => "nodes_stats.json",
            DocumentKind::Shards => "shards.json",
            DocumentKind::ClusterState => "cluster_state.json",
            DocumentKind::Settings => "settings.json",
            DocumentKind::FielddataStats => "fielddata_stats.json",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Loaded,
    Missing,
    Invalid(String),
}

#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub kind: DocumentKind,
    pub path: PathBuf,
    pub state: LoadState,
    pub size_bytes: u64,
    pub value: Option<Value>,
}

impl LoadedDocument {
    fn unavailable_reason(&self) -> String {
        match &self.state {
            LoadState::Loaded => "loaded".to_string(),
            LoadState::Missing => "file not found".to_string(),
            LoadState::Invalid(reason) => reason.clone(),
        }
    }
}

/// Every known document of one dump, parsed once and read-only afterwards.
#[derive(Debug, Clone)]
pub struct DiagnosticBundle {
    root: PathBuf,
    documents: BTreeMap<DocumentKind, LoadedDocument>,
}

impl DiagnosticBundle {
    /// Builds a bundle from in-memory documents; kinds not given are `Missing`.
    pub fn from_documents(
        root: impl Into<PathBuf>,
        docs: impl IntoIterator<Item = (DocumentKind, Value)>,
    ) -> Self {
        let root = root.into();
        let mut documents: BTreeMap<DocumentKind, LoadedDocument> = DocumentKind::ALL
            .iter()
            .map(|&kind| {
                (
                    kind,
                    LoadedDocument {
                        kind,
                        path: root.join(kind.file_name()),
                        state: LoadState::Missing,
                        size_bytes: 0,
                        value: None,
                    },
                )
            })
            .collect();
        for (kind, value) in docs {
            let size_bytes = serde_json::to_vec(&value).map(|v| v.len() as u64).unwrap_or(0);
            documents.insert(
                kind,
                LoadedDocument {
                    kind,
                    path: root.join(kind.file_name()),
                    state: LoadState::Loaded,
                    size_bytes,
                    value: Some(value),
                },
            );
        }
        Self { root, documents }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn documents(&self) -> impl Iterator<Item = &LoadedDocument> {
        self.documents.values()
    }

    pub fn document(&self, kind: DocumentKind) -> Option<&LoadedDocument> {
        self.documents.get(&kind)
    }

    pub fn loaded_count(&self) -> usize {
        self.documents
            .values()
            .filter(|d| d.state == LoadState::Loaded)
            .count()
    }

    pub fn value(&self, kind: DocumentKind) -> Result<&Value, SchemaError> {
        let doc = self.require(kind)?;
        doc.value.as_ref().ok_or_else(|| SchemaError::MissingDocument {
            document: kind.file_name(),
            reason: doc.unavailable_reason(),
        })
    }

    /// Size of the file on disk, in bytes. Unparseable files still report their
    /// size, since a truncated export is often the oversized one.
    pub fn size_bytes(&self, kind: DocumentKind) -> Result<u64, SchemaError> {
        match self.documents.get(&kind) {
            Some(doc) if matches!(doc.state, LoadState::Invalid(_)) && doc.size_bytes > 0 => {
                Ok(doc.size_bytes)
            }
            _ => Ok(self.require(kind)?.size_bytes),
        }
    }

    fn require(&self, kind: DocumentKind) -> Result<&LoadedDocument, SchemaError> {
        match self.documents.get(&kind) {
            Some(doc) if doc.state == LoadState::Loaded => Ok(doc),
            Some(doc) => Err(SchemaError::MissingDocument {
                document: kind.file_name(),
                reason: doc.unavailable_reason(),
            }),
            None => Err(SchemaError::MissingDocument {
                document: kind.file_name(),
                reason: "file not found".to_string(),
            }),
        }
    }
}

/// Loads a dump directory. A missing directory, a directory without any known
/// file, or one where no known file parses is an error; otherwise individual
/// documents degrade to `Missing`/`Invalid`.
pub fn load(path: &Path) -> Result<DiagnosticBundle> {
    let meta = std::fs::metadata(path)
        .with_context(|| format!("dump directory does not exist: {}", path.display()))?;
    if !meta.is_dir() {
        anyhow::bail!("dump path is not a directory: {}", path.display());
    }

    let root = locate_root(path)?;
    tracing::debug!(root = %root.display(), "using dump root");

    let mut documents = BTreeMap::new();
    for kind in DocumentKind::ALL {
        let doc = load_document(&root, kind);
        match &doc.state {
            LoadState::Loaded => {
                tracing::debug!(path = %doc.path.display(), bytes = doc.size_bytes, "loaded document")
            }
            LoadState::Missing => {
                tracing::warn!(path = %doc.path.display(), "document missing from dump")
            }
            LoadState::Invalid(reason) => {
                tracing::warn!(path = %doc.path.display(), %reason, "document could not be parsed")
            }
        }
        documents.insert(kind, doc);
    }

    let bundle = DiagnosticBundle { root, documents };
    if bundle.loaded_count() == 0 {
        let invalid: Vec<&str> = bundle
            .documents()
            .filter(|d| matches!(d.state, LoadState::Invalid(_)))
            .map(|d| d.kind.file_name())
            .collect();
        anyhow::bail!(
            "no diagnostic file in {} could be parsed (invalid: {})",
            bundle.root.display(),
            invalid.join(", ")
        );
    }
    Ok(bundle)
}

fn has_known_file(dir: &Path) -> bool {
    DocumentKind::ALL
        .iter()
        .any(|kind| dir.join(kind.file_name()).is_file())
}

fn locate_root(path: &Path) -> Result<PathBuf> {
    if has_known_file(path) {
        return Ok(path.to_path_buf());
    }

    // Diagnostic archives usually extract into a nested folder.
    for entry in WalkDir::new(path)
        .min_depth(1)
        .max_depth(2)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if entry.file_type().is_dir() && has_known_file(entry.path()) {
            tracing::debug!(nested = %entry.path().display(), "found dump in sub-directory");
            return Ok(entry.path().to_path_buf());
        }
    }

    let expected: Vec<&str> = DocumentKind::ALL.iter().map(|k| k.file_name()).collect();
    anyhow::bail!(
        "no recognizable diagnostic files found in {} (expected any of: {})",
        path.display(),
        expected.join(", ")
    )
}

fn load_document(root: &Path, kind: DocumentKind) -> LoadedDocument {
    let path = root.join(kind.file_name());
    let mut doc = LoadedDocument {
        kind,
        path: path.clone(),
        state: LoadState::Missing,
        size_bytes: 0,
        value: None,
    };

    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return doc,
        Err(err) => {
            doc.state = LoadState::Invalid(format!("read failed: {err}"));
            return doc;
        }
    };
    doc.size_bytes = bytes.len() as u64;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(value) => {
            doc.state = LoadState::Loaded;
            doc.value = Some(value);
        }
        Err(err) => doc.state = LoadState::Invalid(format!("invalid JSON: {err}")),
    }
    doc
}
