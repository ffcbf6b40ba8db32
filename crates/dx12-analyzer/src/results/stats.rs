//! Fixed-format statistics text
//!
//! Statistics files are consumed by other tools that match on the field names, so
//! the layout below is fixed: one `- name = value` line per field, names padded
//! to a common column.

use super::shader::{ShaderResult, ShaderResultKind, ShaderStats};
use std::fmt;

/// Column at which values start
const NAME_WIDTH: usize = 44;

/// Formats the statistics block of a shader
///
/// # Arguments
/// * `result` - The shader result to describe
/// * `thread_group` - Thread group dimensions, for compute shaders
///
/// # Returns
/// The statistics text, ending with a newline
pub fn format_stats(result: &ShaderResult, thread_group: Option<[u32; 3]>) -> String {
    StatsBlock { result, thread_group }.to_string()
}

struct StatsBlock<'a> {
    result: &'a ShaderResult,
    thread_group: Option<[u32; 3]>,
}

impl fmt::Display for StatsBlock<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Statistics:")?;
        write_fields(f, &self.result.stats)?;

        if let Some([x, y, z]) = self.thread_group {
            write_line(f, "computeWorkGroupSize0", x)?;
            write_line(f, "computeWorkGroupSize1", y)?;
            write_line(f, "computeWorkGroupSize2", z)?;
        }

        if let ShaderResultKind::RayTracing(ray_tracing) = &self.result.kind {
            write_line(f, "stackSizeInBytes", ray_tracing.stack_size_bytes)?;
            write_line(f, "isInlined", ray_tracing.inlined)?;
        }
        Ok(())
    }
}

fn write_fields(f: &mut fmt::Formatter<'_>, stats: &ShaderStats) -> fmt::Result {
    write_line(f, "shaderStageMask", format_args!("{:#x}", stats.stage_mask))?;
    write_line(f, "resourceUsage.numUsedVgprs", stats.vgprs.used)?;
    write_line(f, "resourceUsage.numUsedSgprs", stats.sgprs.used)?;
    write_line(f, "resourceUsage.ldsSizePerLocalWorkGroup", stats.lds_size_bytes)?;
    write_line(f, "resourceUsage.ldsUsageSizeInBytes", stats.lds_usage_bytes)?;
    write_line(f, "resourceUsage.scratchMemUsageInBytes", stats.scratch_bytes)?;
    write_line(f, "numPhysicalVgprs", stats.vgprs.physical)?;
    write_line(f, "numPhysicalSgprs", stats.sgprs.physical)?;
    write_line(f, "numAvailableVgprs", stats.vgprs.available)?;
    write_line(f, "numAvailableSgprs", stats.sgprs.available)
}

fn write_line(f: &mut fmt::Formatter<'_>, name: &str, value: impl fmt::Display) -> fmt::Result {
    writeln!(f, "    - {name:<width$}= {value}", width = NAME_WIDTH)
}

/// Reads the numeric fields of a statistics block back as `(name, value)` pairs
///
/// Lines that do not follow the `- name = value` layout are skipped.
pub fn parse_stats(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter_map(|line| line.trim().strip_prefix("- "))
        .filter_map(|line| line.split_once('='))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect()
}
