//! Configuration consumed by the analysis core (§6 of the design).
//!
//! The core never loads this itself — that's the front end's job — but
//! it owns the shape of the options it actually reads.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A single ordered symbol rename rule: a regex matched against a raw
/// symbol name, and its replacement. Every rule is applied once, in
/// order, against the running value.
///
/// `regex::Regex` has no `Serialize`/`Deserialize` of its own, so this
/// round-trips through its source pattern instead, re-compiling on
/// deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawSymbolTransform", into = "RawSymbolTransform")]
pub struct SymbolTransform {
    pub pattern: regex::Regex,
    pub replacement: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawSymbolTransform {
    pattern: String,
    replacement: String,
}

impl TryFrom<RawSymbolTransform> for SymbolTransform {
    type Error = regex::Error;

    fn try_from(raw: RawSymbolTransform) -> Result<Self, Self::Error> {
        Self::new(&raw.pattern, raw.replacement)
    }
}

impl From<SymbolTransform> for RawSymbolTransform {
    fn from(transform: SymbolTransform) -> Self {
        Self {
            pattern: transform.pattern.as_str().to_string(),
            replacement: transform.replacement,
        }
    }
}

impl SymbolTransform {
    pub fn new(pattern: &str, replacement: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: regex::Regex::new(pattern)?,
            replacement: replacement.into(),
        })
    }

    fn apply(&self, name: &str) -> String {
        self.pattern.replace_all(name, self.replacement.as_str()).into_owned()
    }
}

/// The `to_utf8` transcoder named in the configuration table: how
/// author names and log messages that aren't valid UTF-8 get handled
/// (§7, "Encoding failure" — a warning, with the raw bytes passed
/// through rather than the file being rejected).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Utf8Transcode {
    /// Invalid byte sequences are replaced with U+FFFD; a warning is
    /// logged naming what failed to decode.
    Lossy,
}

impl Utf8Transcode {
    pub fn decode(&self, raw: &[u8], what: &str) -> String {
        match self {
            Self::Lossy => match std::str::from_utf8(raw) {
                Ok(s) => s.to_string(),
                Err(_) => {
                    log::warn!("{} is not valid UTF-8; substituting replacement characters", what);
                    String::from_utf8_lossy(raw).into_owned()
                }
            },
        }
    }
}

/// Configuration options recognized by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ordered rename rules applied to every raw symbol name.
    pub symbol_transforms: Vec<SymbolTransform>,

    /// Resync deltas at or above this threshold emit a warning.
    pub commit_threshold: Duration,

    /// When set, branches are parsed but not retained: no `BranchData` is
    /// created, and revisions on branches are never classified or
    /// emitted.
    pub trunk_only: bool,

    /// Default author attributed to commits this tool manufactures
    /// itself (symbol-fill commits, the initial project commit).
    pub username: String,

    /// How to handle author/log bytes that aren't valid UTF-8.
    pub to_utf8: Utf8Transcode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            symbol_transforms: Vec::new(),
            commit_threshold: Duration::from_secs(5 * 60),
            trunk_only: false,
            username: String::from("cvs2svn"),
            to_utf8: Utf8Transcode::Lossy,
        }
    }
}

impl Config {
    /// Runs `name` through every configured rename rule in order,
    /// returning the rewritten name. Each rewrite is logged at `debug`
    /// level so a user can trace why a symbol ended up with a given
    /// name.
    pub fn apply_symbol_transforms(&self, name: &str) -> String {
        let mut current = name.to_string();

        for transform in &self.symbol_transforms {
            let rewritten = transform.apply(&current);
            if rewritten != current {
                log::debug!(
                    "symbol transform {:?} -> {:?} rewrote {:?} to {:?}",
                    transform.pattern.as_str(),
                    transform.replacement,
                    current,
                    rewritten
                );
            }
            current = rewritten;
        }

        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transforms_apply_in_order() {
        let config = Config {
            symbol_transforms: vec![
                SymbolTransform::new("^vendor-", "v-").unwrap(),
                SymbolTransform::new("-branch$", "").unwrap(),
            ],
            ..Config::default()
        };

        assert_eq!(
            config.apply_symbol_transforms("vendor-acme-branch"),
            "v-acme"
        );
    }

    #[test]
    fn no_transforms_is_identity() {
        let config = Config::default();
        assert_eq!(config.apply_symbol_transforms("REL_1_0"), "REL_1_0");
    }

    #[test]
    fn lossy_transcode_passes_valid_utf8_through() {
        assert_eq!(Utf8Transcode::Lossy.decode(b"alice", "author"), "alice");
    }

    #[test]
    fn lossy_transcode_substitutes_invalid_bytes() {
        let decoded = Utf8Transcode::Lossy.decode(&[0x66, 0xff, 0x6f], "author");
        assert!(decoded.contains('\u{fffd}'));
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = Config {
            symbol_transforms: vec![SymbolTransform::new("^v-", "vendor-").unwrap()],
            ..Config::default()
        };

        let serialized = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();

        assert_eq!(deserialized.username, config.username);
        assert_eq!(deserialized.symbol_transforms.len(), 1);
        assert_eq!(deserialized.symbol_transforms[0].replacement, "vendor-");
    }
}
