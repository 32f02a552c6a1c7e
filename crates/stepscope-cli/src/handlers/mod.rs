pub mod errors;
pub mod show;
pub mod steps;
pub mod subagents;

use crate::output::Palette;
use crate::types::OutputFormat;

/// Shared rendering context handed to every handler.
pub struct HandlerContext {
    pub format: OutputFormat,
    pub palette: Palette,
}

impl HandlerContext {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            palette: Palette::detect(),
        }
    }

    /// CSV is a `steps`-only format; everything else rejects it.
    pub fn reject_csv(&self, command: &str) -> anyhow::Result<()> {
        if self.format == OutputFormat::Csv {
            anyhow::bail!("--format csv is only supported by `steps`, not `{}`", command);
        }
        Ok(())
    }
}
