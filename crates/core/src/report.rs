//! Durable per-version diff reports
//!
//! A report is plain text with a fixed section order and a terminal marker.
//! It is written through a staging file and renamed into place, and a report
//! that does not parse to the marker is treated exactly like a missing one.

use crate::error::{IoResultExt, Result};
use crate::layout::Layout;
use crate::store::atomic_write;
use crate::version::Version;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Last line of every complete report
pub const END_MARKER: &str = "=====END OF DIFF=====";

const SEPARATOR: &str = "====================";
const NAME_PREFIX: &str = "Showing Diffs For: ";
const AGE_PREFIX: &str = "Version Age: ";
const COMPARED_PREFIX: &str = "Compared Against: ";

/// Report sections in file order
const SECTIONS: [Section; 3] = [Section::Exclusive, Section::Modified, Section::Copied];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Exclusive,
    Modified,
    Copied,
}

impl Section {
    fn title(self) -> &'static str {
        match self {
            Self::Exclusive => "Exclusive Files",
            Self::Modified => "Modified Files",
            Self::Copied => "Copied Files",
        }
    }

    fn entries(self, version: &Version) -> &BTreeSet<String> {
        match self {
            Self::Exclusive => &version.exclusive,
            Self::Modified => &version.modified,
            Self::Copied => &version.copied,
        }
    }

    fn parse_header(line: &str) -> Option<(Self, usize)> {
        SECTIONS.iter().find_map(|&section| {
            let count = line
                .strip_prefix(section.title())?
                .strip_prefix(": ")?
                .strip_suffix(" files")?
                .parse()
                .ok()?;
            Some((section, count))
        })
    }
}

/// Parsed contents of a complete report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub version: String,
    pub age: usize,
    pub compared_against: usize,
    pub exclusive: Vec<String>,
    pub modified: Vec<String>,
    pub copied: Vec<String>,
}

/// Serializes classifications and checks report completeness
#[derive(Debug, Clone, Default)]
pub struct ReportCodec {
    layout: Layout,
}

impl ReportCodec {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    /// Report location for a version
    pub fn report_path(&self, version: &Version) -> PathBuf {
        self.layout.report_path(&version.path)
    }

    /// Render a classified version; `library_size` is the number of versions
    /// the classification ran over
    pub fn render(&self, version: &Version, library_size: usize) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}{}", NAME_PREFIX, version.name);
        let _ = writeln!(out, "{}{}", AGE_PREFIX, version.age);
        let _ = writeln!(
            out,
            "{}{} other versions",
            COMPARED_PREFIX,
            library_size.saturating_sub(1)
        );

        for section in SECTIONS {
            let entries = section.entries(version);
            out.push_str("\n\n");
            let _ = writeln!(out, "{}: {} files", section.title(), entries.len());
            out.push_str(SEPARATOR);
            out.push('\n');
            for path in entries {
                out.push_str(path);
                out.push('\n');
            }
        }

        out.push_str("\n\n");
        out.push_str(END_MARKER);
        out.push('\n');
        out
    }

    /// Atomically write a version's report next to its content
    pub fn write(&self, version: &Version, library_size: usize) -> Result<PathBuf> {
        let target = self.report_path(version);
        let staging = self.layout.report_staging_path(&version.path);
        atomic_write(&staging, &target, self.render(version, library_size).as_bytes())?;
        Ok(target)
    }

    /// Whether a report exists and is complete
    ///
    /// Complete means it ends with the terminal marker and every section
    /// lists as many entries as its header announces. A listed file may
    /// itself be named like the marker, so finding the marker line alone
    /// is not enough.
    pub fn is_valid(&self, report: &Path) -> bool {
        std::fs::read_to_string(report)
            .ok()
            .and_then(|text| parse(&text))
            .is_some()
    }

    /// Parse a report; `Ok(None)` when it is missing, truncated or malformed
    pub fn read(&self, report: &Path) -> Result<Option<ReportSummary>> {
        if !report.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(report).at(report)?;
        Ok(parse(&text))
    }
}

/// Positional parse: each section header is followed by the separator and
/// exactly as many entry lines as it announces, so entries are taken
/// verbatim whatever they look like.
fn parse(text: &str) -> Option<ReportSummary> {
    let mut lines = text.lines();
    let mut summary = ReportSummary {
        version: lines.next()?.strip_prefix(NAME_PREFIX)?.to_string(),
        age: lines.next()?.strip_prefix(AGE_PREFIX)?.parse().ok()?,
        compared_against: lines
            .next()?
            .strip_prefix(COMPARED_PREFIX)?
            .strip_suffix(" other versions")?
            .parse()
            .ok()?,
        ..ReportSummary::default()
    };

    let mut lines = lines.peekable();
    for expected in SECTIONS {
        while lines.next_if(|line| line.is_empty()).is_some() {}
        let (section, count) = Section::parse_header(lines.next()?)?;
        if section != expected || lines.next()? != SEPARATOR {
            return None;
        }
        let bucket = match section {
            Section::Exclusive => &mut summary.exclusive,
            Section::Modified => &mut summary.modified,
            Section::Copied => &mut summary.copied,
        };
        for _ in 0..count {
            let entry = lines.next().filter(|line| !line.is_empty())?;
            bucket.push(entry.to_string());
        }
    }

    while lines.next_if(|line| line.is_empty()).is_some() {}
    if lines.next()? != END_MARKER || lines.next().is_some() {
        return None;
    }
    Some(summary)
}
