//! CLI configuration file handling.

use std::path::{Path, PathBuf};

use color_eyre::eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use linksim_core::config::SimulationConfig;

/// Top-level TOML configuration: the simulation record plus terminal
/// options.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CliConfig {
    pub simulation: SimulationConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OutputConfig {
    /// Write the full plot-data map as JSON to this path.
    pub json_output: Option<PathBuf>,
    /// Print the per-stage log entries after the summary.
    pub show_log: bool,
}

impl CliConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("reading {}", path.display()))?;
        toml::from_str(&raw).wrap_err_with(|| format!("parsing {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let cfg: CliConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.simulation.nbits, SimulationConfig::default().nbits);
        assert!(cfg.output.json_output.is_none());
    }

    #[test]
    fn partial_override_keeps_remaining_defaults() {
        let cfg: CliConfig = toml::from_str(
            r#"
            [simulation]
            nbits = 1000
            l_ch = 0.5

            [output]
            show_log = true
            "#,
        )
        .unwrap();
        assert_eq!(cfg.simulation.nbits, 1000);
        assert_eq!(cfg.simulation.l_ch, 0.5);
        assert_eq!(cfg.simulation.nspb, SimulationConfig::default().nspb);
        assert!(cfg.output.show_log);
    }
}
