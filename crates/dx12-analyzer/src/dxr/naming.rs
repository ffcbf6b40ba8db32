//! Per-shader and per-pipeline output file names
//!
//! Ray tracing runs produce one file per shader or pipeline, named from a user
//! template such as `out/isa_*.txt` by substituting the wildcard.

use crate::error::{ExtractionReport, Warning};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Wildcard token replaced in file name templates
pub const WILDCARD: char = '*';

/// Expands `template` with `suffix`
///
/// Characters of `suffix` that are not safe in file names are replaced with `_`.
///
/// # Returns
/// The file name, or `None` unless the template holds exactly one wildcard
pub fn output_file_name(template: &Path, suffix: &str) -> Option<PathBuf> {
    let template = template.to_str()?;
    if template.matches(WILDCARD).count() != 1 {
        return None;
    }
    Some(PathBuf::from(template.replacen(WILDCARD, &sanitize(suffix), 1)))
}

/// Expands `template` for `item`, recording a warning when the template is invalid
pub fn expand_template(template: &Path, suffix: &str, item: &str, report: &mut ExtractionReport) -> Option<PathBuf> {
    let name = output_file_name(template, suffix);
    if name.is_none() {
        report.push(Warning::Template {
            template: template.to_path_buf(),
            item: item.to_string(),
        });
    }
    name
}

/// Output files claimed during one run
///
/// Sanitizing can map distinct suffixes such as `a?b` and `a_b` to the same file.
/// The first item keeps the file; later items are reported and produce no output.
#[derive(Debug, Default)]
pub struct OutputNames {
    claimed: HashSet<PathBuf>,
}

impl OutputNames {
    /// Expands `template` for `item` and claims the resulting file
    ///
    /// # Returns
    /// The file name, or `None` if the template is invalid or the file was already claimed
    pub fn claim(&mut self, template: &Path, suffix: &str, item: &str, report: &mut ExtractionReport) -> Option<PathBuf> {
        let path = expand_template(template, suffix, item, report)?;
        if !self.claimed.insert(path.clone()) {
            report.push(Warning::NameCollision { path, item: item.to_string() });
            return None;
        }
        Some(path)
    }
}

fn sanitize(suffix: &str) -> String {
    suffix.chars().map(|c| if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') { c } else { '_' }).collect()
}
