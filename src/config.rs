//! Evaluation options and tuned constants.
//!
//! `EvalOptions` is the option surface a protocol front-end forwards to the
//! evaluator (which network files to use). `EvalConfig` and
//! `ClassifierConfig` hold the empirically tuned constants of the blender.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::nnue::NetSize;

/// Default big network file
pub const DEFAULT_EVAL_FILE_BIG: &str = "nn-b1a57edbea57.nnue";
/// Default small network file (compact format)
pub const DEFAULT_EVAL_FILE: &str = "HL64-qa101-qb160-S2-T77novT79maraprmay.rearranged.8-bit.nnue";
/// Default classifier file
pub const DEFAULT_EVAL_FILE_CLASSIFIER: &str = "aux-classifier.bin";

/// Outcome of a `setoption` handled by [`EvalOptions::apply_setoption`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvalOptionAction {
    /// The networks must be reloaded
    ReloadNetworks,
}

/// Network file selection, one entry per size class. Empty means default.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EvalOptions {
    pub eval_file_big: String,
    pub eval_file: String,
    pub eval_file_classifier: String,
}

impl EvalOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default file name for a size class
    #[must_use]
    pub const fn default_name(size: NetSize) -> &'static str {
        match size {
            NetSize::Big => DEFAULT_EVAL_FILE_BIG,
            NetSize::Small => DEFAULT_EVAL_FILE,
            NetSize::Classifier => DEFAULT_EVAL_FILE_CLASSIFIER,
        }
    }

    /// File name requested for a size class, falling back to the default.
    #[must_use]
    pub fn requested(&self, size: NetSize) -> &str {
        let value = match size {
            NetSize::Big => &self.eval_file_big,
            NetSize::Small => &self.eval_file,
            NetSize::Classifier => &self.eval_file_classifier,
        };
        if value.trim().is_empty() {
            Self::default_name(size)
        } else {
            value.trim()
        }
    }

    /// Print the option declarations in UCI form.
    pub fn print(&self) {
        for size in NetSize::ALL {
            println!(
                "option name {} type string default {}",
                size.option_name(),
                Self::default_name(size)
            );
        }
    }

    /// Apply one `setoption`. Unknown names are ignored.
    pub fn apply_setoption(&mut self, name: &str, value: Option<&str>) -> Option<EvalOptionAction> {
        let normalized = name.trim().to_ascii_lowercase();
        let slot = match normalized.as_str() {
            "evalfilebig" => &mut self.eval_file_big,
            "evalfile" => &mut self.eval_file,
            "evalfileclassifier" => &mut self.eval_file_classifier,
            _ => return None,
        };
        let value = value.unwrap_or("").trim();
        if slot.as_str() == value {
            return None;
        }
        *slot = value.to_string();
        Some(EvalOptionAction::ReloadNetworks)
    }
}

/// Split `setoption name <name...> [value <value...>]` into name and value.
#[must_use]
pub fn parse_setoption(parts: &[&str]) -> Option<(String, Option<String>)> {
    if parts.first() != Some(&"setoption") {
        return None;
    }

    let mut name_parts: Vec<&str> = Vec::new();
    let mut value_parts: Vec<&str> = Vec::new();
    let mut mode = "";

    for part in parts.iter().skip(1) {
        match *part {
            "name" if mode != "value" => mode = "name",
            "value" if mode == "name" => mode = "value",
            _ => match mode {
                "name" => name_parts.push(part),
                "value" => value_parts.push(part),
                _ => {}
            },
        }
    }

    if name_parts.is_empty() {
        return None;
    }

    let name = name_parts.join(" ");
    let value = if value_parts.is_empty() {
        None
    } else {
        Some(value_parts.join(" "))
    };

    Some((name, value))
}

/// Thresholds and blend weights of the evaluation blender.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EvalConfig {
    /// Above this `|simple eval|` the networks are skipped
    pub lazy_threshold: i32,
    /// Above this `|simple eval|` the small network is used
    pub small_net_threshold: i32,
    /// Below this `|small net eval|` the classifier is consulted
    pub recheck_threshold: i32,
    pub small_net_weight: i32,
    pub big_net_weight: i32,
    pub pawn_weight: i32,
    pub optimism_base: i32,
    pub optimism_complexity_div: i32,
    pub nnue_complexity_div: i32,
    /// Shuffle counter at which damping stops growing
    pub damping_cap: i32,
    pub damping_base: i32,
    pub damping_div: i32,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig {
            lazy_threshold: 2550,
            small_net_threshold: 1050,
            recheck_threshold: 500,
            small_net_weight: 773,
            big_net_weight: 882,
            pawn_weight: 9,
            optimism_base: 106,
            optimism_complexity_div: 512,
            nnue_complexity_div: 32768,
            damping_cap: 100,
            damping_base: 200,
            damping_div: 214,
        }
    }
}

/// Normalisation of the classifier inputs and its decision threshold.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClassifierConfig {
    /// Network terms are divided by `OUTPUT_SCALE` and then by this
    pub network_norm: f32,
    pub complexity_norm: f32,
    pub optimism_norm: f32,
    pub pawn_norm: f32,
    pub piece_norm: f32,
    pub material_norm: f32,
    pub simple_norm: f32,
    pub classical_norm: f32,
    pub shuffle_norm: f32,
    pub threshold: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            network_norm: 600.0,
            complexity_norm: 600.0,
            optimism_norm: 150.0,
            pawn_norm: 16.0,
            piece_norm: 14.0,
            material_norm: 15000.0,
            simple_norm: 2550.0,
            classical_norm: 2550.0,
            shuffle_norm: 100.0,
            threshold: 0.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_setoption() {
        let parts: Vec<&str> = "setoption name EvalFile value my net.nnue".split_whitespace().collect();
        assert_eq!(
            parse_setoption(&parts),
            Some(("EvalFile".to_string(), Some("my net.nnue".to_string())))
        );
        let parts: Vec<&str> = "setoption name EvalFileBig".split_whitespace().collect();
        assert_eq!(parse_setoption(&parts), Some(("EvalFileBig".to_string(), None)));
        assert_eq!(parse_setoption(&["go", "depth", "3"]), None);
        assert_eq!(parse_setoption(&["setoption"]), None);
    }

    #[test]
    fn test_apply_setoption_reports_reload() {
        let mut options = EvalOptions::new();
        assert_eq!(options.requested(NetSize::Big), DEFAULT_EVAL_FILE_BIG);

        let action = options.apply_setoption("evalfilebig", Some("big.nnue"));
        assert_eq!(action, Some(EvalOptionAction::ReloadNetworks));
        assert_eq!(options.requested(NetSize::Big), "big.nnue");

        // Same value again is a no-op
        assert_eq!(options.apply_setoption("EvalFileBig", Some("big.nnue")), None);
        assert_eq!(options.apply_setoption("Hash", Some("64")), None);

        // Clearing falls back to the default name
        options.apply_setoption("EvalFileBig", None);
        assert_eq!(options.requested(NetSize::Big), DEFAULT_EVAL_FILE_BIG);
        assert_eq!(options.requested(NetSize::Classifier), DEFAULT_EVAL_FILE_CLASSIFIER);
    }

    #[test]
    fn test_default_constants() {
        let config = EvalConfig::default();
        assert!(config.small_net_threshold < config.lazy_threshold);
        assert!(config.recheck_threshold < config.small_net_threshold);
        assert_eq!(ClassifierConfig::default().threshold, 0.5);
    }
}
