//! Process-wide scoring configuration.
//!
//! A TOML-backed, `serde`-derived struct with paired getter/setter methods
//! for the fields a consumer is expected to tweak at runtime, scoped to
//! what this engine actually has knobs for (the shared mutable state plus
//! the `finish`/`identify` flags a caller toggles).

use serde::{Deserialize, Serialize};

use crate::freq::DEFAULT_STOP_GRAM_PENALTY;
use crate::langid::CoverageBasis;
use crate::scoring::ScoringOptions;

/// Runtime-tunable knobs for identification and post-processing.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Skip whitespace bytes during trie descent instead of treating them
    /// as ordinary n-gram bytes.
    pub ignore_whitespace: bool,
    /// Whether stop-gram matches subtract from their language's score.
    pub apply_stop_grams: bool,
    /// Whether per-language alignment constraints are enforced during
    /// scoring (disabling this uses the all-ones `unaligned` table).
    pub enforce_alignment: bool,
    /// Whether `finish` multiplies each score by its language's adjustment
    /// factor.
    pub apply_coverage: bool,
    /// Which per-language statistic the adjustment factor is computed
    /// from.
    pub coverage_basis: CoverageBasis,
    /// Process-wide multiplier applied to stop-gram matches. Negative by
    /// convention (default: -9.0).
    pub stop_gram_penalty: f64,
    /// Default `top_n` passed to `finish` when a caller doesn't override it.
    /// 0 means "no limit".
    pub top_n: usize,
    /// Default cutoff ratio passed to `finish`.
    pub cutoff_ratio: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            ignore_whitespace: false,
            apply_stop_grams: true,
            enforce_alignment: true,
            apply_coverage: true,
            coverage_basis: CoverageBasis::default(),
            stop_gram_penalty: DEFAULT_STOP_GRAM_PENALTY,
            top_n: 5,
            cutoff_ratio: 0.01,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn load_toml<P: AsRef<std::path::Path>>(
        path: P,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save_toml<P: AsRef<std::path::Path>>(
        &self,
        path: P,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Set the stop-gram penalty (process-wide multiplier applied to
    /// stop-gram matches).
    pub fn set_stop_gram_penalty(&mut self, penalty: f64) {
        self.stop_gram_penalty = penalty;
    }

    pub fn stop_gram_penalty(&self) -> f64 {
        self.stop_gram_penalty
    }

    /// The subset of fields the scoring hot loop needs.
    pub fn scoring_options(&self) -> ScoringOptions {
        ScoringOptions {
            ignore_whitespace: self.ignore_whitespace,
            apply_stop_grams: self.apply_stop_grams,
            enforce_alignment: self.enforce_alignment,
        }
    }
}
