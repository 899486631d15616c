//! Per-library processing state of a whitelist

use crate::config::Config;
use crate::util;
use anyhow::{Context, Result};
use libdiff_core::{ArtifactKind, LibraryStatus, Reconciler, ReportSummary};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::path::Path;

/// Status of one library plus the reports it currently holds
#[derive(Debug, Serialize)]
pub struct LibraryReport {
    #[serde(flatten)]
    pub status: LibraryStatus,
    pub versions: Vec<ReportSummary>,
}

pub fn run(root: &Path, config: &Config, json: bool) -> Result<()> {
    let whitelist = util::open_whitelist(root)?;
    let reconciler = Reconciler::new(config.layout.clone());

    let mut reports = Vec::new();
    for library in whitelist.libraries().context("Failed to list libraries")? {
        reports.push(collect(&reconciler, &library)?);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    print_human(whitelist.root(), &reports);
    Ok(())
}

/// Inspect a library and read every complete report in it
pub fn collect(reconciler: &Reconciler, library: &Path) -> Result<LibraryReport> {
    let status = reconciler
        .inspect(library)
        .with_context(|| format!("Failed to inspect {}", library.display()))?;

    let layout = reconciler.layout();
    let mut versions = Vec::new();
    for artifact in layout.artifacts(library, ArtifactKind::Build)? {
        let report = layout.report_path(&layout.content_dir(&artifact));
        if let Some(summary) = reconciler.codec().read(&report)? {
            versions.push(summary);
        }
    }
    versions.sort_by_key(|v| v.age);

    Ok(LibraryReport { status, versions })
}

fn print_human(root: &Path, reports: &[LibraryReport]) {
    println!("{}", "Whitelist Status".bold());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Root:          {}", root.display().to_string().cyan());
    println!();

    if reports.is_empty() {
        println!("  {}", "No libraries yet".dimmed());
        return;
    }

    let width = reports
        .iter()
        .map(|r| library_name(&r.status).len())
        .max()
        .unwrap_or(0);

    for report in reports {
        let status = &report.status;
        let counts = format!("{}/{} reports", status.valid_reports, status.eligible);
        let marker = if status.needs_work() {
            counts.yellow().to_string()
        } else {
            format!("{} {}", counts, "✓").green().to_string()
        };
        print!("  {:width$}  {}", library_name(status), marker, width = width);

        let mut pending = Vec::new();
        if status.pending_packages > 0 {
            pending.push(util::plural(status.pending_packages, "archive to unpack", "archives to unpack"));
        }
        if status.undecompiled > 0 {
            pending.push(util::plural(status.undecompiled, "artifact to decompile", "artifacts to decompile"));
        }
        if pending.is_empty() {
            println!();
        } else {
            println!("  {}", format!("({})", pending.join(", ")).dimmed());
        }

        for version in &report.versions {
            println!(
                "    {} {}  exclusive {}  modified {}  copied {}",
                version.version,
                format!("(age {})", version.age).dimmed(),
                version.exclusive.len(),
                version.modified.len(),
                version.copied.len()
            );
        }
    }

    let outdated = reports.iter().filter(|r| r.status.needs_work()).count();
    println!();
    if outdated > 0 {
        println!(
            "{}",
            format!(
                "{} out of date. Run 'libdiff sweep' to update.",
                util::plural(outdated, "library is", "libraries are")
            )
            .yellow()
        );
    } else {
        println!("{}", "All reports up to date.".green());
    }
}

fn library_name(status: &LibraryStatus) -> String {
    status
        .library
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use libdiff_core::Layout;
    use std::fs;

    #[test]
    fn test_collect_reads_reports() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let lib = temp_dir.path().join("gson");
        for (name, body) in [("gson-1.0", "a"), ("gson-2.0", "b")] {
            fs::create_dir_all(lib.join(name))?;
            fs::write(lib.join(format!("{name}.jar")), b"")?;
            fs::write(lib.join(name).join("Gson.java"), body)?;
        }
        fs::write(lib.join("gson-3.0.aar"), b"")?;
        let reconciler = Reconciler::new(Layout::default());

        let before = collect(&reconciler, &lib)?;
        assert!(before.versions.is_empty());
        assert_eq!(before.status.pending_packages, 1);

        reconciler.reconcile(&lib)?;
        let after = collect(&reconciler, &lib)?;
        assert_eq!(after.versions.len(), 2);
        assert_eq!(after.versions[0].age, 0);
        assert!(after.versions.iter().all(|v| v.modified == vec!["Gson.java"]));

        let json = serde_json::to_value(&after)?;
        assert_eq!(json["eligible"], 2);
        assert_eq!(json["versions"][1]["compared_against"], 1);
        Ok(())
    }
}
