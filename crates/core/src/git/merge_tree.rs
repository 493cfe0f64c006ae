//! Parsing of trivial three-way `git merge-tree <base> <ours> <theirs>` output.
//!
//! The output is a sequence of sections. Each starts with an unindented
//! header (`changed in both`, `added in remote`, ...), followed by one entry
//! line per side (`  base   100644 <sha> <path>`) and an optional diff whose
//! added lines carry the conflict markers:
//!
//! ```text
//! changed in both
//!   base   100644 d00491f... notes.txt
//!   our    100644 0cfbf08... notes.txt
//!   their  100644 00750ed... notes.txt
//! @@ -1 +1,5 @@
//! +<<<<<<< .our
//!  two
//! +=======
//! +three
//! +>>>>>>> .their
//! ```

use tracing::trace;

pub const MARKER_OURS: &str = "<<<<<<<";
pub const MARKER_SEPARATOR: &str = "=======";
pub const MARKER_THEIRS: &str = ">>>>>>>";

/// One header-delimited section of merge-tree output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeTreeSection {
    pub header: String,
    /// Paths named by the section's entry lines (deduplicated).
    pub paths: Vec<String>,
    /// Diff lines following the entries.
    pub body: Vec<String>,
}

impl MergeTreeSection {
    /// Whether the diff body carries all three conflict-marker tokens.
    pub fn has_conflict_markers(&self) -> bool {
        let mut ours = false;
        let mut separator = false;
        let mut theirs = false;
        for line in &self.body {
            // Strip the one-character diff prefix.
            let content = line.get(1..).unwrap_or("");
            ours |= content.starts_with(MARKER_OURS);
            separator |= content.starts_with(MARKER_SEPARATOR);
            theirs |= content.starts_with(MARKER_THEIRS);
        }
        ours && separator && theirs
    }
}

/// Split raw merge-tree output into sections.
pub fn parse_sections(output: &str) -> Vec<MergeTreeSection> {
    let mut sections: Vec<MergeTreeSection> = Vec::new();
    let mut in_body = false;

    for line in output.lines() {
        if is_header(line) {
            sections.push(MergeTreeSection {
                header: line.trim().to_string(),
                ..Default::default()
            });
            in_body = false;
            continue;
        }
        let Some(section) = sections.last_mut() else {
            continue;
        };
        if !in_body {
            if let Some(path) = parse_entry(line) {
                if !section.paths.iter().any(|p| p == path) {
                    section.paths.push(path.to_string());
                }
                continue;
            }
            in_body = true;
        }
        section.body.push(line.to_string());
    }

    trace!(count = sections.len(), "parsed merge-tree sections");
    sections
}

/// Whether the section(s) describing `path` contain conflict markers.
pub fn path_has_conflict_markers(output: &str, path: &str) -> bool {
    parse_sections(output)
        .iter()
        .filter(|s| s.paths.iter().any(|p| p == path))
        .any(MergeTreeSection::has_conflict_markers)
}

fn is_header(line: &str) -> bool {
    match line.chars().next() {
        None => false,
        Some(c) => !matches!(c, ' ' | '+' | '-' | '@' | '\\'),
    }
}

/// `  base   100644 <sha> <path>` -> `<path>`
fn parse_entry(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("  ")?;
    let rest = ["base", "our", "their", "result"]
        .iter()
        .find_map(|role| rest.strip_prefix(role))?;
    let rest = rest.trim_start();
    let (mode, rest) = rest.split_once(' ')?;
    if mode.len() != 6 || !mode.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let (sha, path) = rest.split_once(' ')?;
    if sha.is_empty() || !sha.bytes().all(|b| b.is_ascii_hexdigit()) || path.is_empty() {
        return None;
    }
    Some(path)
}
