//! `check` and `render` command implementations.

use std::io::Write;

use wgbridge::parse;

use crate::error::CliError;
use crate::output::{ConfigSummary, OutputFormat, RenderedConfig};

/// Parses configuration text and reports on it.
pub struct ConfigCommand;

impl ConfigCommand {
    /// Parse `text` and write a summary without secret key material.
    ///
    /// # Errors
    ///
    /// Returns an error if the text does not parse or output fails.
    pub fn check<W: Write>(writer: &mut W, format: &OutputFormat, text: &str) -> Result<(), CliError> {
        let config = parse(text)?;
        format.write(writer, &ConfigSummary::from(&config))
    }

    /// Parse `text` and write it back in canonical wg-quick form.
    ///
    /// # Errors
    ///
    /// Returns an error if the text does not parse or output fails.
    pub fn render<W: Write>(writer: &mut W, format: &OutputFormat, text: &str) -> Result<(), CliError> {
        let config = parse(text)?;
        let rendered = RenderedConfig {
            wg_quick: config.to_wg_quick(),
        };
        format.write(writer, &rendered)
    }
}
