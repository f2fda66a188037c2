//! Run configuration: ΔR matching thresholds and table-read bounds.

use std::fs;
use std::path::Path;

use serde::Deserialize;

/// Optional half-open row range for partial table reads.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds<T> {
    pub min: Option<T>,
    pub max: Option<T>,
}

impl<T> Bounds<T> {
    pub fn none() -> Self { Self { min: None, max: None } }
}

/// ΔR acceptance thresholds for truth → reco matching. The defaults are the
/// working-point values used throughout the analysis; a TOML file can
/// override them per run.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct MatchConfig {

    /// Maximum ΔR for a truth quark to claim a jet
    pub jet_dr_max: f64,

    /// Maximum ΔR for a truth lepton to claim a reconstructed lepton
    pub lepton_dr_max: f64,

    /// Maximum ΔR counted as "close" in the W-pairing quality summary
    pub w_dr_max: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            jet_dr_max: 0.4,
            lepton_dr_max: 0.1,
            w_dr_max: 0.4,
        }
    }
}

pub fn read_config_file(path: &Path) -> crate::BoxErr<MatchConfig> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("Couldn't read config file `{}`: {e}", path.display()))?;
    Ok(toml::from_str(&text)?)
}
