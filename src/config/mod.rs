use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::dump::parse_time_value;

#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub ui: UiConfig,
    pub thresholds: Thresholds,
    pub analysis: AnalysisConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UiConfig {
    pub color: bool,
    pub max_table_rows: usize,
    pub histogram_width: usize,
    pub histogram_buckets: usize,
}

/// Numeric limits the checks compare against.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Thresholds {
    pub max_total_shards: u64,
    pub max_shards_per_node: u64,
    pub small_shard_gb: f64,
    pub small_shard_ratio: f64,
    pub large_shard_gb: f64,
    pub max_cluster_state_mb: f64,
    pub low_refresh_interval: String,
    pub low_refresh_ratio: f64,
    pub fielddata_field_mb: f64,
    pub top_fields: usize,
    pub shard_imbalance_tolerance: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisConfig {
    pub ignore_indices: Vec<String>,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            max_total_shards: 20_000,
            max_shards_per_node: 1_000,
            small_shard_gb: 1.0,
            small_shard_ratio: 0.1,
            large_shard_gb: 50.0,
            max_cluster_state_mb: 50.0,
            low_refresh_interval: "1s".to_string(),
            low_refresh_ratio: 0.1,
            fielddata_field_mb: 100.0,
            top_fields: 10,
            shard_imbalance_tolerance: 20,
        }
    }
}

impl Thresholds {
    /// Parsed `low_refresh_interval`; validated when the config is loaded.
    pub fn low_refresh_duration(&self) -> Duration {
        parse_time_value(&self.low_refresh_interval)
            .ok()
            .flatten()
            .unwrap_or(Duration::from_secs(1))
    }
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            ui: UiConfig {
                color: true,
                max_table_rows: 20,
                histogram_width: 40,
                histogram_buckets: 10,
            },
            thresholds: Thresholds::default(),
            analysis: AnalysisConfig {
                ignore_indices: vec![],
            },
            config_path: None,
        }
    }
}

impl AnalysisConfig {
    pub fn ignore_set(&self) -> Result<GlobSet> {
        build_globset(&self.ignore_indices)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    ui: Option<RawUiConfig>,
    thresholds: Option<RawThresholds>,
    analysis: Option<RawAnalysisConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawUiConfig {
    color: Option<bool>,
    max_table_rows: Option<usize>,
    histogram_width: Option<usize>,
    histogram_buckets: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawThresholds {
    max_total_shards: Option<u64>,
    max_shards_per_node: Option<u64>,
    small_shard_gb: Option<f64>,
    small_shard_ratio: Option<f64>,
    large_shard_gb: Option<f64>,
    max_cluster_state_mb: Option<f64>,
    low_refresh_interval: Option<String>,
    low_refresh_ratio: Option<f64>,
    fielddata_field_mb: Option<f64>,
    top_fields: Option<usize>,
    shard_imbalance_tolerance: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAnalysisConfig {
    ignore_indices: Option<Vec<String>>,
}

pub fn default_config_path(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/esdiag/config.toml")
}

/// Defaults, then the TOML file (explicit path or `~/.config/esdiag/config.toml`), then env.
pub fn load(config_path: Option<&Path>, home_dir: Option<&Path>) -> Result<EffectiveConfig> {
    let mut cfg = EffectiveConfig::default();

    let path = match config_path {
        Some(p) => Some(p.to_owned()),
        None => home_dir.map(default_config_path),
    };

    if let Some(path) = path {
        if config_path.is_some() && !path.exists() {
            anyhow::bail!("config file not found: {}", path.display());
        }
        if path.exists() {
            let s = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config file: {}", path.display()))?;
            let raw: RawConfig = toml::from_str(&s)
                .with_context(|| format!("failed to parse config file (TOML): {}", path.display()))?;
            apply_raw_config(&mut cfg, raw);
            cfg.config_path = Some(path.display().to_string());
        }
    }

    apply_env_overrides(&mut cfg)?;
    validate(&cfg)?;

    Ok(cfg)
}

fn apply_raw_config(cfg: &mut EffectiveConfig, raw: RawConfig) {
    if let Some(ui) = raw.ui {
        if let Some(color) = ui.color {
            cfg.ui.color = color;
        }
        if let Some(max_table_rows) = ui.max_table_rows {
            cfg.ui.max_table_rows = max_table_rows;
        }
        if let Some(histogram_width) = ui.histogram_width {
            cfg.ui.histogram_width = histogram_width;
        }
        if let Some(histogram_buckets) = ui.histogram_buckets {
            cfg.ui.histogram_buckets = histogram_buckets;
        }
    }

    if let Some(t) = raw.thresholds {
        let th = &mut cfg.thresholds;
        if let Some(v) = t.max_total_shards {
            th.max_total_shards = v;
        }
        if let Some(v) = t.max_shards_per_node {
            th.max_shards_per_node = v;
        }
        if let Some(v) = t.small_shard_gb {
            th.small_shard_gb = v;
        }
        if let Some(v) = t.small_shard_ratio {
            th.small_shard_ratio = v;
        }
        if let Some(v) = t.large_shard_gb {
            th.large_shard_gb = v;
        }
        if let Some(v) = t.max_cluster_state_mb {
            th.max_cluster_state_mb = v;
        }
        if let Some(v) = t.low_refresh_interval {
            th.low_refresh_interval = v;
        }
        if let Some(v) = t.low_refresh_ratio {
            th.low_refresh_ratio = v;
        }
        if let Some(v) = t.fielddata_field_mb {
            th.fielddata_field_mb = v;
        }
        if let Some(v) = t.top_fields {
            th.top_fields = v;
        }
        if let Some(v) = t.shard_imbalance_tolerance {
            th.shard_imbalance_tolerance = v;
        }
    }

    if let Some(analysis) = raw.analysis {
        if let Some(ignore_indices) = analysis.ignore_indices {
            cfg.analysis.ignore_indices = ignore_indices;
        }
    }
}

fn apply_env_overrides(cfg: &mut EffectiveConfig) -> Result<()> {
    if let Ok(v) = std::env::var("ESDIAG_UI_COLOR") {
        cfg.ui.color = parse_bool(&v).with_context(|| "ESDIAG_UI_COLOR")?;
    }
    if let Ok(v) = std::env::var("ESDIAG_UI_MAX_TABLE_ROWS") {
        cfg.ui.max_table_rows = parse_num(&v).with_context(|| "ESDIAG_UI_MAX_TABLE_ROWS")?;
    }
    if let Ok(v) = std::env::var("ESDIAG_UI_HISTOGRAM_WIDTH") {
        cfg.ui.histogram_width = parse_num(&v).with_context(|| "ESDIAG_UI_HISTOGRAM_WIDTH")?;
    }
    if let Ok(v) = std::env::var("ESDIAG_MAX_TOTAL_SHARDS") {
        cfg.thresholds.max_total_shards =
            parse_num(&v).with_context(|| "ESDIAG_MAX_TOTAL_SHARDS")?;
    }
    if let Ok(v) = std::env::var("ESDIAG_MAX_SHARDS_PER_NODE") {
        cfg.thresholds.max_shards_per_node =
            parse_num(&v).with_context(|| "ESDIAG_MAX_SHARDS_PER_NODE")?;
    }
    if let Ok(v) = std::env::var("ESDIAG_MAX_CLUSTER_STATE_MB") {
        cfg.thresholds.max_cluster_state_mb =
            parse_num(&v).with_context(|| "ESDIAG_MAX_CLUSTER_STATE_MB")?;
    }
    if let Ok(v) = std::env::var("ESDIAG_FIELDDATA_FIELD_MB") {
        cfg.thresholds.fielddata_field_mb =
            parse_num(&v).with_context(|| "ESDIAG_FIELDDATA_FIELD_MB")?;
    }
    if let Ok(v) = std::env::var("ESDIAG_SHARD_IMBALANCE_TOLERANCE") {
        cfg.thresholds.shard_imbalance_tolerance =
            parse_num(&v).with_context(|| "ESDIAG_SHARD_IMBALANCE_TOLERANCE")?;
    }
    if let Ok(v) = std::env::var("ESDIAG_IGNORE_INDICES") {
        let parts: Vec<String> = v
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect();
        if !parts.is_empty() {
            cfg.analysis.ignore_indices = parts;
        }
    }

    Ok(())
}

fn validate(cfg: &EffectiveConfig) -> Result<()> {
    let th = &cfg.thresholds;
    parse_time_value(&th.low_refresh_interval)
        .map_err(anyhow::Error::msg)
        .with_context(|| "thresholds.low_refresh_interval")?;
    for (name, ratio) in [
        ("thresholds.small_shard_ratio", th.small_shard_ratio),
        ("thresholds.low_refresh_ratio", th.low_refresh_ratio),
    ] {
        if !(0.0..=1.0).contains(&ratio) {
            anyhow::bail!("{name} must be between 0 and 1 (got {ratio})");
        }
    }
    if cfg.ui.histogram_buckets == 0 {
        anyhow::bail!("ui.histogram_buckets must be greater than 0");
    }
    cfg.analysis
        .ignore_set()
        .with_context(|| "analysis.ignore_indices")?;
    Ok(())
}

pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for p in patterns {
        let glob = Glob::new(p).with_context(|| format!("invalid index pattern: {p}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

fn parse_bool(s: &str) -> Result<bool> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow::anyhow!(
            "invalid boolean: {s} (use true|false|1|0|yes|no|on|off)"
        )),
    }
}

fn parse_num<T>(s: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(s.trim().parse::<T>()?)
}
