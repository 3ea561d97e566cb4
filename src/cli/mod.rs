use std::io;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::checks::CheckContext;
use crate::core::{Chart, Report};
use crate::engine::{Engine, EngineOptions};
use crate::ui::UiConfig;

#[derive(Debug, Parser)]
#[command(
    name = "esdiag",
    version,
    about = "Analyze an Elasticsearch diagnostic dump and report cluster health heuristics"
)]
pub struct Cli {
    /// Directory produced by the diagnostics collection tool.
    #[arg(required_unless_present = "show_config")]
    pub dump_dir: Option<PathBuf>,
    #[arg(long, conflicts_with = "markdown")]
    pub json: bool,
    #[arg(long)]
    pub markdown: bool,
    #[arg(long = "no-color")]
    pub no_color: bool,
    #[arg(long, conflicts_with = "quiet")]
    pub verbose: bool,
    #[arg(long)]
    pub quiet: bool,
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Print the effective configuration and exit.
    #[arg(long)]
    pub show_config: bool,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let stdout_is_tty = io::stdout().is_terminal();
    let stderr_is_tty = io::stderr().is_terminal();

    let home_dir = std::env::var_os("HOME").map(PathBuf::from);
    let env_config_path = std::env::var_os("ESDIAG_CONFIG").map(PathBuf::from);
    let cfg = crate::config::load(
        cli.config.as_deref().or(env_config_path.as_deref()),
        home_dir.as_deref(),
    )
    .map_err(crate::exit::invalid_args_err)?;
    tracing::debug!(config = ?cfg.config_path, "configuration loaded");

    if cli.show_config {
        if cli.json {
            let stdout = std::io::stdout();
            serde_json::to_writer_pretty(stdout.lock(), &cfg)?;
            println!();
        } else {
            print!("{}", toml::to_string_pretty(&cfg)?);
        }
        return Ok(());
    }

    let Some(dump_dir) = cli.dump_dir.as_deref() else {
        return Err(crate::exit::invalid_args("missing <DUMP_DIR>"));
    };

    let ui_cfg = UiConfig {
        color: stdout_is_tty && cfg.ui.color && !cli.no_color,
        stderr_is_tty,
        max_table_rows: cfg.ui.max_table_rows,
        histogram_width: cfg.ui.histogram_width,
        quiet: cli.quiet,
        verbose: cli.verbose,
    };

    let ctx = CheckContext::from_config(&cfg).map_err(crate::exit::invalid_args_err)?;
    let engine = Engine::new(
        EngineOptions {
            show_progress: ui_cfg.stderr_is_tty && !cli.quiet && !cli.json,
        },
        ctx,
    );
    let report = engine
        .analyze(dump_dir)
        .map_err(crate::exit::load_failed_err)?;

    if cli.json {
        write_json(&report)?;
    } else if cli.markdown {
        if !ui_cfg.quiet {
            write_markdown_summary(&report, cli.verbose)?;
        }
    } else {
        crate::ui::print_report(&report, &ui_cfg);
    }

    Ok(())
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .try_init();
}

fn write_json(report: &Report) -> Result<()> {
    use std::io::Write;

    let buf = serde_json::to_vec_pretty(report)?;

    let mut stdout = std::io::stdout().lock();
    match stdout.write_all(&buf) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => return Ok(()),
        Err(err) => return Err(err.into()),
    }
    match stdout.write_all(b"\n") {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn write_markdown_summary(report: &Report, include_evidence: bool) -> Result<()> {
    use std::io::Write;

    let markdown = format_markdown_summary(report, include_evidence);
    let mut stdout = std::io::stdout().lock();
    match stdout.write_all(markdown.as_bytes()) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn format_markdown_summary(report: &Report, include_evidence: bool) -> String {
    use std::fmt::Write as _;

    let mut out = String::new();

    let _ = writeln!(out, "# esdiag report");
    let _ = writeln!(out);
    let _ = writeln!(out, "- Tool version: {}", report.tool_version);
    let _ = writeln!(out, "- Dump: `{}`", report.dump.root);
    let s = &report.summary;
    let _ = writeln!(
        out,
        "- Findings: {} ok, {} info, {} warnings, {} unavailable",
        s.good, s.info, s.warnings, s.unavailable
    );
    for note in &s.notes {
        let _ = writeln!(out, "- Note: {note}");
    }

    for (idx, section) in report.sections.iter().enumerate() {
        let _ = writeln!(out);
        let _ = writeln!(out, "## {}. {}", idx + 1, section.title);
        let _ = writeln!(out);
        for f in &section.findings {
            let _ = writeln!(out, "- **{}** {}", f.severity.label(), f.message);
            if include_evidence {
                for ev in &f.evidence {
                    let _ = writeln!(out, "  - {}: `{}`", ev.kind.as_str(), ev.value);
                }
            }
        }
        for chart in &section.charts {
            let _ = writeln!(out);
            write_markdown_chart(&mut out, chart);
        }
    }

    let _ = writeln!(out);
    out
}

fn write_markdown_chart(out: &mut String, chart: &Chart) {
    use std::fmt::Write as _;

    match chart {
        Chart::Histogram {
            title,
            unit,
            buckets,
        } => {
            let _ = writeln!(out, "### {title}");
            let _ = writeln!(out);
            let _ = writeln!(out, "| Range ({unit}) | Count |");
            let _ = writeln!(out, "| --- | ---: |");
            for b in buckets {
                let _ = writeln!(out, "| {:.2} - {:.2} | {} |", b.lower, b.upper, b.count);
            }
        }
        Chart::Table {
            title,
            columns,
            rows,
        } => {
            let _ = writeln!(out, "### {title}");
            let _ = writeln!(out);
            let header: Vec<String> = columns.iter().map(|c| escape_cell(c)).collect();
            let _ = writeln!(out, "| {} |", header.join(" | "));
            let rule: Vec<&str> = columns.iter().map(|_| "---").collect();
            let _ = writeln!(out, "| {} |", rule.join(" | "));
            for row in rows {
                let cells: Vec<String> = row.iter().map(|c| escape_cell(c)).collect();
                let _ = writeln!(out, "| {} |", cells.join(" | "));
            }
        }
    }
}

fn escape_cell(s: &str) -> String {
    s.replace('|', "\\|")
}
