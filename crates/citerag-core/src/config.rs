//! Layered configuration and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` +
//! `config.<env>.toml` + `APP_*` env vars (`__` separates nested keys, e.g.
//! `APP_FUSION__VECTOR_WEIGHT=0.6`). [`expand_path`] expands `~` and
//! `${VAR}` in configured paths.
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::types::source;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self { Self { figment } }

    /// Typed, validated view of the whole configuration tree.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub retrieval: RetrievalSettings,
    pub fusion: FusionSettings,
    pub budget: BudgetSettings,
    pub embedding: EmbeddingSettings,
    pub store: StoreSettings,
    pub chunking: ChunkingSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.fusion.validate()?;
        if self.budget.chars_per_token == 0 {
            return Err(Error::InvalidConfig("budget.chars_per_token must be positive".into()));
        }
        if self.embedding.dim == 0 {
            return Err(Error::InvalidConfig("embedding.dim must be positive".into()));
        }
        if self.chunking.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunking.chunk_size must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Candidates requested from the vector stage.
    pub top_k: usize,
    /// Candidates kept after ranking; `None` keeps `top_k`.
    pub rerank_top_k: Option<usize>,
    pub score_threshold: Option<f32>,
    /// Fuse the lexical and source signals into the vector ranking.
    pub rerank: bool,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_k: 50, rerank_top_k: Some(5), score_threshold: None, rerank: true }
    }
}

/// Tuning knobs of the score fusion. The defaults are empirical, not derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionSettings {
    pub vector_weight: f32,
    pub lexical_weight: f32,
    /// Raw lexical scores are divided by this and capped at 1.0.
    pub lexical_divisor: f32,
    /// Boost for source tags missing from `source_boost`.
    pub default_boost: f32,
    pub source_boost: BTreeMap<String, f32>,
    pub bm25: Bm25Settings,
}

impl Default for FusionSettings {
    fn default() -> Self {
        let source_boost = [(source::DOCS, 1.3), (source::CODE, 1.0), (source::CHAT, 1.1)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        Self {
            vector_weight: 0.7,
            lexical_weight: 0.3,
            lexical_divisor: 10.0,
            default_boost: 1.0,
            source_boost,
            bm25: Bm25Settings::default(),
        }
    }
}

impl FusionSettings {
    pub fn validate(&self) -> Result<()> {
        let non_negative = |name: &str, v: f32| {
            if v.is_finite() && v >= 0.0 { Ok(()) } else { Err(Error::InvalidConfig(format!("{name} must be a non-negative number, got {v}"))) }
        };
        non_negative("fusion.vector_weight", self.vector_weight)?;
        non_negative("fusion.lexical_weight", self.lexical_weight)?;
        non_negative("fusion.default_boost", self.default_boost)?;
        for (tag, boost) in &self.source_boost {
            non_negative(&format!("fusion.source_boost.{tag}"), *boost)?;
        }
        if !(self.lexical_divisor.is_finite() && self.lexical_divisor > 0.0) {
            return Err(Error::InvalidConfig(format!("fusion.lexical_divisor must be positive, got {}", self.lexical_divisor)));
        }
        non_negative("fusion.bm25.k1", self.bm25.k1)?;
        if !(0.0..=1.0).contains(&self.bm25.b) {
            return Err(Error::InvalidConfig(format!("fusion.bm25.b must be within [0, 1], got {}", self.bm25.b)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Settings {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Settings {
    fn default() -> Self { Self { k1: 1.5, b: 0.75 } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetSettings {
    pub max_context_tokens: usize,
    pub chars_per_token: usize,
}

impl Default for BudgetSettings {
    fn default() -> Self { Self { max_context_tokens: 3000, chars_per_token: 4 } }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Deterministic token hashing; no model files needed.
    Hash,
    /// Local sentence-transformer weights run through candle.
    #[default]
    Candle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub backend: EmbeddingBackend,
    pub model_dir: String,
    pub dim: usize,
    pub max_len: usize,
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Candle,
            model_dir: "models/all-MiniLM-L6-v2".to_string(),
            dim: 384,
            max_len: 256,
            batch_size: 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub uri: String,
    pub table: String,
}

impl Default for StoreSettings {
    fn default() -> Self { Self { uri: "data/lancedb".to_string(), table: "documents".to_string() } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Target chunk length in characters.
    pub chunk_size: usize,
    /// Overlap in characters; carried over as `chunk_overlap / 10` words.
    pub chunk_overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self { Self { chunk_size: 1000, chunk_overlap: 200 } }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
