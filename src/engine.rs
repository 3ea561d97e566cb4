use std::path::Path;
use std::time::Duration;

use anyhow::Result;

use crate::checks::{self, CheckContext};
use crate::core::{
    DocumentState, DocumentStatus, DumpInfo, Report, ReportSummary, Section, Severity,
};
use crate::dump::{self, DiagnosticBundle, LoadState};

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub show_progress: bool,
}

pub struct Engine {
    opts: EngineOptions,
    ctx: CheckContext,
}

impl Engine {
    pub fn new(opts: EngineOptions, ctx: CheckContext) -> Self {
        Self { opts, ctx }
    }

    /// Loads the dump once and runs every check against it.
    pub fn analyze(&self, path: &Path) -> Result<Report> {
        use std::io::IsTerminal;
        let progress_enabled = self.opts.show_progress && std::io::stderr().is_terminal();
        let pb = if progress_enabled {
            let pb = indicatif::ProgressBar::new_spinner();
            pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
            pb.set_message(format!("loading {}", path.display()));
            pb.enable_steady_tick(Duration::from_millis(120));
            Some(pb)
        } else {
            None
        };

        let loaded = dump::load(path);
        if let Some(pb) = &pb {
            pb.set_message("running checks");
        }
        let report = loaded.map(|bundle| self.report_for(&bundle));

        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        report
    }

    pub fn report_for(&self, bundle: &DiagnosticBundle) -> Report {
        let sections = checks::run_all(bundle, &self.ctx);
        report_from_sections(bundle, sections)
    }
}

fn report_from_sections(bundle: &DiagnosticBundle, sections: Vec<Section>) -> Report {
    let mut notes = Vec::new();
    let documents: Vec<DocumentStatus> = bundle
        .documents()
        .map(|doc| {
            let file = doc.kind.file_name().to_string();
            let (state, error) = match &doc.state {
                LoadState::Loaded => (DocumentState::Loaded, None),
                LoadState::Missing => {
                    notes.push(format!("{file} not found in the dump"));
                    (DocumentState::Missing, None)
                }
                LoadState::Invalid(reason) => {
                    notes.push(format!("{file} could not be parsed: {reason}"));
                    (DocumentState::Invalid, Some(reason.clone()))
                }
            };
            DocumentStatus {
                file,
                state,
                size_bytes: doc.size_bytes,
                error,
            }
        })
        .collect();

    let mut summary = ReportSummary {
        good: 0,
        info: 0,
        warnings: 0,
        unavailable: 0,
        notes,
    };
    for finding in sections.iter().flat_map(|s| &s.findings) {
        match finding.severity {
            Severity::Good => summary.good += 1,
            Severity::Info => summary.info += 1,
            Severity::Warning => summary.warnings += 1,
            Severity::Unavailable => summary.unavailable += 1,
        }
    }

    Report {
        schema_version: "1.0".to_string(),
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        dump: DumpInfo {
            root: bundle.root().display().to_string(),
            documents,
        },
        summary,
        sections,
    }
}
