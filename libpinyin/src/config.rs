use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Pinyin engine configuration extending the core `Config`.
///
/// Adds where the partition tables live, an optional prebuilt prefix-index
/// snapshot and the default candidate count. Core tunables are flattened, so a
/// single TOML file sets both.
///
/// # Example
///
/// ```rust
/// use pinyin_staged::PinyinConfig;
///
/// let config = PinyinConfig::from_toml_str("default_limit = 8\nescalation_min = 6\n").unwrap();
/// assert_eq!(config.default_limit, 8);
/// assert_eq!(config.base().escalation_min, 6);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PinyinConfig {
    /// Thresholds, budgets, caches and runtime knobs
    #[serde(flatten)]
    pub base: candidate_core::Config,

    /// Directory holding `<partition>.txt` tables
    pub data_dir: PathBuf,

    /// Prebuilt prefix index; skips the background bulk load when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trie_snapshot: Option<PathBuf>,

    /// Candidates returned when the caller does not ask for a count
    pub default_limit: usize,
}

impl Default for PinyinConfig {
    fn default() -> Self {
        Self {
            base: candidate_core::Config::default(),
            data_dir: PathBuf::from("data"),
            trie_snapshot: None,
            default_limit: 20,
        }
    }
}

impl PinyinConfig {
    pub fn into_base(self) -> candidate_core::Config {
        self.base
    }

    pub fn base(&self) -> &candidate_core::Config {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut candidate_core::Config {
        &mut self.base
    }

    pub fn load_toml<P: AsRef<std::path::Path>>(
        path: P,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
