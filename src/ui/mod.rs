use anyhow::Error;
use std::io::{self, Write};
use unicode_width::UnicodeWidthChar;

use crate::core::{Bucket, Chart, DocumentState, Finding, Report, Section, Severity};

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub color: bool,
    pub stderr_is_tty: bool,
    pub max_table_rows: usize,
    pub histogram_width: usize,
    pub quiet: bool,
    pub verbose: bool,
}

pub fn eprintln_error(err: &Error) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "error:");
    let _ = writeln!(stderr, "  {err}");

    let mut causes = err.chain().skip(1).peekable();
    if causes.peek().is_some() {
        let _ = writeln!(stderr, "caused by:");
        for cause in causes {
            let _ = writeln!(stderr, "  - {cause}");
        }
    }

    let _ = writeln!(stderr, "next:");
    let _ = writeln!(stderr, "  - rerun with `--verbose` for debug logs");
    let _ = writeln!(stderr, "  - see `esdiag --help` for the available options");
}

pub fn print_report(report: &Report, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    write_report(&mut out, report, cfg);
}

/// Console rendering: dump header, one block per section, summary line.
pub fn write_report(out: &mut dyn Write, report: &Report, cfg: &UiConfig) {
    let _ = writeln!(out, "Diagnostic dump: {}", report.dump.root);
    let loaded = report
        .dump
        .documents
        .iter()
        .filter(|d| d.state == DocumentState::Loaded)
        .count();
    let _ = writeln!(
        out,
        "Documents loaded: {loaded} of {}",
        report.dump.documents.len()
    );
    if cfg.verbose {
        for doc in &report.dump.documents {
            let state = match doc.state {
                DocumentState::Loaded => format!("loaded, {}", format_bytes(doc.size_bytes)),
                DocumentState::Missing => "missing".to_string(),
                DocumentState::Invalid => "invalid".to_string(),
            };
            let _ = writeln!(out, "  - {}: {state}", doc.file);
        }
    }
    for note in &report.summary.notes {
        let _ = writeln!(out, "- {note}");
    }

    for (idx, section) in report.sections.iter().enumerate() {
        let _ = writeln!(out);
        write_section(out, idx + 1, section, cfg);
    }

    let s = &report.summary;
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Summary: {} ok, {} info, {} warnings, {} unavailable",
        s.good, s.info, s.warnings, s.unavailable
    );
}

fn write_section(out: &mut dyn Write, n: usize, section: &Section, cfg: &UiConfig) {
    let _ = writeln!(out, "== {n}. {} ==", section.title);
    for finding in &section.findings {
        write_finding(out, finding, cfg);
    }
    for chart in &section.charts {
        let _ = writeln!(out);
        match chart {
            Chart::Histogram {
                title,
                unit,
                buckets,
            } => write_histogram(out, title, unit, buckets, cfg.histogram_width),
            Chart::Table {
                title,
                columns,
                rows,
            } => write_table(out, title, columns, rows, cfg.max_table_rows),
        }
    }
}

fn write_finding(out: &mut dyn Write, finding: &Finding, cfg: &UiConfig) {
    let label = format_severity(finding.severity, cfg.color);
    let _ = writeln!(out, "  [{label}] {}", finding.message);
    if cfg.verbose {
        for ev in &finding.evidence {
            let _ = writeln!(out, "      {}: {}", ev.kind.as_str(), ev.value);
        }
    }
}

fn write_histogram(out: &mut dyn Write, title: &str, unit: &str, buckets: &[Bucket], width: usize) {
    let _ = writeln!(out, "  {title} ({unit})");
    if buckets.is_empty() {
        let _ = writeln!(out, "    (no data)");
        return;
    }

    let labels: Vec<String> = buckets
        .iter()
        .map(|b| format!("{} - {}", format_number(b.lower), format_number(b.upper)))
        .collect();
    let label_w = labels
        .iter()
        .map(|l| visible_width_ansi(l))
        .max()
        .unwrap_or(0);
    let max_count = buckets.iter().map(|b| b.count).max().unwrap_or(0);
    let width = width.max(1) as u64;

    for (bucket, label) in buckets.iter().zip(&labels) {
        let mut len = if max_count == 0 {
            0
        } else {
            bucket.count.saturating_mul(width) / max_count
        };
        if bucket.count > 0 && len == 0 {
            len = 1;
        }
        let _ = writeln!(
            out,
            "    {} | {} {}",
            pad_start_display(label, label_w),
            "█".repeat(len as usize),
            bucket.count
        );
    }
}

fn write_table(
    out: &mut dyn Write,
    title: &str,
    columns: &[String],
    rows: &[Vec<String>],
    max_rows: usize,
) {
    let _ = writeln!(out, "  {title}");
    let shown = rows.len().min(max_rows);

    let mut widths: Vec<usize> = columns.iter().map(|c| visible_width_ansi(c)).collect();
    for row in rows.iter().take(shown) {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(visible_width_ansi(cell));
            }
        }
    }

    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| pad_end_display(c, *w))
        .collect();
    let _ = writeln!(out, "    {}", header.join("  ").trim_end());
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(out, "    {}", rule.join("  "));

    for row in rows.iter().take(shown) {
        let cells: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(c, w)| pad_end_display(c, *w))
            .collect();
        let _ = writeln!(out, "    {}", cells.join("  ").trim_end());
    }
    if rows.len() > shown {
        let _ = writeln!(out, "    ... ({} more rows)", rows.len() - shown);
    }
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{v:.0}")
    } else {
        format!("{v:.2}")
    }
}

fn format_severity(severity: Severity, color: bool) -> String {
    let s = severity.label();
    if !color {
        return s.to_string();
    }

    let code = match severity {
        Severity::Good => "32",
        Severity::Info => "36",
        Severity::Warning => "33",
        Severity::Unavailable => "90",
    };
    format!("\x1b[{code}m{s}\x1b[0m")
}

fn pad_end_display(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{s}{}", " ".repeat(width - w))
}

fn pad_start_display(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{}{}", " ".repeat(width - w), s)
}

fn visible_width_ansi(s: &str) -> usize {
    let mut width: usize = 0;
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            let _ = chars.next();
            for ch2 in chars.by_ref() {
                if ch2 == 'm' {
                    break;
                }
            }
            continue;
        }
        width = width.saturating_add(UnicodeWidthChar::width(ch).unwrap_or(0));
    }
    width
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    const TB: f64 = GB * 1024.0;

    let b = bytes as f64;
    if b < KB {
        return format!("{bytes} B");
    }
    if b < MB {
        return format!("{:.1} KiB", b / KB);
    }
    if b < GB {
        return format!("{:.1} MiB", b / MB);
    }
    if b < TB {
        return format!("{:.1} GiB", b / GB);
    }
    format!("{:.1} TiB", b / TB)
}
