//! Crash-safe file writes and path normalization

use crate::error::{IoResultExt, Result};
use std::ffi::OsStr;
use std::fmt::Write as _;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Component, Path};

/// Atomic write helper
///
/// Writes `data` to `staging`, fsyncs it, renames it over `target` and fsyncs
/// the parent directory. `staging` must live on the same filesystem as
/// `target` (in practice, the same directory). Readers observe either the old
/// file, no file, or the complete new file.
pub fn atomic_write(staging: &Path, target: &Path, data: &[u8]) -> Result<()> {
    {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(staging)
            .at(staging)?;
        file.write_all(data).at(staging)?;
        file.sync_all().at(staging)?;
    }

    fs::rename(staging, target).at(target)?;

    if let Some(parent) = target.parent() {
        sync_dir(parent)?;
    }
    Ok(())
}

/// Fsync a directory so a rename inside it is durable
#[cfg(unix)]
pub fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir).at(dir)?.sync_all().at(dir)
}

#[cfg(not(unix))]
pub fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

/// Normalize a path relative to a version root for reporting
///
/// - Joins normal components with `/` regardless of platform
/// - Drops `.` components
/// - Escapes each component with [`escape_component`], so every file name
///   maps to a distinct single-line key
/// - Returns `None` for absolute paths or paths containing `..`
pub fn normalize_path(path: &Path) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(escape_component(part)),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Render a file name as printable single-line text
///
/// Valid UTF-8 passes through except `\`, which is doubled, and control
/// characters, written as `\n`, `\r`, `\t` or `\u{..}`. Bytes that are not
/// UTF-8 are written as `\xNN`.
pub fn escape_component(name: &OsStr) -> String {
    let mut bytes = name.as_encoded_bytes();
    let mut out = String::with_capacity(bytes.len());
    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                push_escaped(&mut out, valid);
                return out;
            }
            Err(e) => {
                let (valid, rest) = bytes.split_at(e.valid_up_to());
                // Prefix is valid by construction
                if let Ok(valid) = std::str::from_utf8(valid) {
                    push_escaped(&mut out, valid);
                }
                let bad = e.error_len().unwrap_or(rest.len());
                for byte in &rest[..bad] {
                    let _ = write!(out, "\\x{:02x}", byte);
                }
                bytes = &rest[bad..];
            }
        }
    }
}

fn push_escaped(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{{{:x}}}", c as u32);
            }
            c => out.push(c),
        }
    }
}
