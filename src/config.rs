use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};

/// Project-level config file looked up in the working directory.
pub const PROJECT_CONFIG_FILE: &str = "rag-eval.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub encoder: EncoderConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub eval: EvalConfig,
}

impl Config {
    /// Load configuration: defaults, then global and project files (or the
    /// explicit file alone), then `RAG_EVAL_*` environment overrides.
    pub fn load(explicit_path: Option<&Path>, project_root: &Path) -> Result<Self> {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("RAG_EVAL_CONFIG").ok().map(PathBuf::from));

        if let Some(path) = explicit {
            let Some(patch) = Self::load_patch(&path)? else {
                return Err(EvalError::Config(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            };
            config.merge_patch(patch);
        } else {
            if let Some(global) = Self::load_global()? {
                config.merge_patch(global);
            }
            if let Some(project) = Self::load_patch(&project_root.join(PROJECT_CONFIG_FILE))? {
                config.merge_patch(project);
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        let Some(dir) = dirs::config_dir() else {
            return Ok(None);
        };
        Self::load_patch(&dir.join("rag-eval/config.toml"))
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| EvalError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| EvalError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.encoder {
            self.encoder.merge(patch);
        }
        if let Some(patch) = patch.backend {
            self.backend.merge(patch);
        }
        if let Some(patch) = patch.search {
            self.search.merge(patch);
        }
        if let Some(patch) = patch.eval {
            self.eval.merge(patch);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(value) = env_string("RAG_EVAL_ENCODER_BACKEND") {
            self.encoder.backend = value;
        }
        if let Some(value) = env_string("RAG_EVAL_ENCODER_ENDPOINT") {
            self.encoder.endpoint = value;
        }
        if let Some(value) = env_string("RAG_EVAL_ENCODER_MODEL") {
            self.encoder.model = value;
        }
        if let Some(value) = env_usize("RAG_EVAL_ENCODER_DIMS")? {
            self.encoder.dims = value;
        }
        if let Some(value) = env_usize("RAG_EVAL_ENCODER_MAX_SEQ_LEN")? {
            self.encoder.max_seq_len = value;
        }
        if let Some(value) = env_u64("RAG_EVAL_ENCODER_TIMEOUT_SECS")? {
            self.encoder.timeout_secs = value;
        }

        if let Some(value) = env_string("RAG_EVAL_BACKEND_URL") {
            self.backend.url = value;
        }
        if let Some(value) = env_string("RAG_EVAL_BACKEND_INDEX") {
            self.backend.index = value;
        }
        if let Some(value) = env_u64("RAG_EVAL_BACKEND_TIMEOUT_SECS")? {
            self.backend.timeout_secs = value;
        }
        if let Some(value) = env_string("RAG_EVAL_BACKEND_SIMILARITY") {
            self.backend.similarity = value;
        }

        if let Some(value) = env_usize("RAG_EVAL_SEARCH_K")? {
            self.search.k = value;
        }
        if let Some(value) = env_usize("RAG_EVAL_SEARCH_NUM_CANDIDATES")? {
            self.search.num_candidates = value;
        }
        if let Some(value) = env_string("RAG_EVAL_SEARCH_VECTOR_FIELD") {
            self.search.vector_field = value;
        }
        if let Some(values) = env_list("RAG_EVAL_SEARCH_HYBRID_FIELDS") {
            self.search.hybrid_fields = values;
        }
        if let Some(values) = env_list("RAG_EVAL_SEARCH_LEXICAL_FIELDS") {
            self.search.lexical_fields = values;
        }

        if let Some(value) = env_bool("RAG_EVAL_PARALLEL") {
            self.eval.parallel = value;
        }

        Ok(())
    }

    /// Reject values no query or encoder could be built from.
    pub fn validate(&self) -> Result<()> {
        if self.encoder.dims == 0 {
            return Err(EvalError::Config(
                "encoder.dims must be greater than 0".to_string(),
            ));
        }
        if self.encoder.max_seq_len == 0 {
            return Err(EvalError::Config(
                "encoder.max_seq_len must be greater than 0".to_string(),
            ));
        }
        if self.search.k == 0 {
            return Err(EvalError::Config("search.k must be greater than 0".to_string()));
        }
        if self.search.k > self.search.num_candidates {
            return Err(EvalError::Config(format!(
                "search.k ({}) must not exceed search.num_candidates ({})",
                self.search.k, self.search.num_candidates
            )));
        }
        if self.search.hybrid_fields.is_empty() {
            return Err(EvalError::Config(
                "search.hybrid_fields must name at least one vector field".to_string(),
            ));
        }
        if !self.search.source.iter().any(|field| field == "id") {
            return Err(EvalError::Config(
                "search.source must include \"id\" so results can be matched to ground truth"
                    .to_string(),
            ));
        }
        if self.backend.index.trim().is_empty() {
            return Err(EvalError::Config("backend.index is empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// `hash`, `sentence` or `mean_pool`.
    #[serde(default)]
    pub backend: String,
    /// Base URL of the model server (sentence / mean_pool backends).
    #[serde(default)]
    pub endpoint: String,
    /// Model identifier expected to be loaded by the server.
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub dims: usize,
    #[serde(default)]
    pub max_seq_len: usize,
    #[serde(default)]
    pub timeout_secs: u64,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            backend: "hash".to_string(),
            endpoint: "http://localhost:8080".to_string(),
            model: "ProsusAI/finbert".to_string(),
            dims: 768,
            max_seq_len: 512,
            timeout_secs: 30,
        }
    }
}

impl EncoderConfig {
    fn merge(&mut self, patch: EncoderPatch) {
        if let Some(value) = patch.backend {
            self.backend = value;
        }
        if let Some(value) = patch.endpoint {
            self.endpoint = value;
        }
        if let Some(value) = patch.model {
            self.model = value;
        }
        if let Some(value) = patch.dims {
            self.dims = value;
        }
        if let Some(value) = patch.max_seq_len {
            self.max_seq_len = value;
        }
        if let Some(value) = patch.timeout_secs {
            self.timeout_secs = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub index: String,
    #[serde(default)]
    pub timeout_secs: u64,
    /// Similarity metric declared on the dense-vector fields.
    #[serde(default)]
    pub similarity: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            index: "sec-filing-index".to_string(),
            timeout_secs: 30,
            similarity: "cosine".to_string(),
        }
    }
}

impl BackendConfig {
    fn merge(&mut self, patch: BackendPatch) {
        if let Some(value) = patch.url {
            self.url = value;
        }
        if let Some(value) = patch.index {
            self.index = value;
        }
        if let Some(value) = patch.timeout_secs {
            self.timeout_secs = value;
        }
        if let Some(value) = patch.similarity {
            self.similarity = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub k: usize,
    #[serde(default)]
    pub num_candidates: usize,
    #[serde(default)]
    pub vector_field: String,
    #[serde(default)]
    pub hybrid_fields: Vec<String>,
    #[serde(default)]
    pub lexical_fields: Vec<String>,
    /// Field -> boost value, applied to `lexical_fields` by `boost_source`.
    #[serde(default)]
    pub boosts: BTreeMap<String, String>,
    /// Source fields returned for every hit.
    #[serde(default)]
    pub source: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            k: 5,
            num_candidates: 10_000,
            vector_field: "text_vector".to_string(),
            hybrid_fields: vec!["text_vector".to_string(), "non_text_vector".to_string()],
            lexical_fields: crate::search::builder::DEFAULT_LEXICAL_FIELDS
                .iter()
                .map(ToString::to_string)
                .collect(),
            boosts: BTreeMap::new(),
            source: crate::corpus::DEFAULT_SOURCE_FIELDS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl SearchConfig {
    fn merge(&mut self, patch: SearchPatch) {
        if let Some(value) = patch.k {
            self.k = value;
        }
        if let Some(value) = patch.num_candidates {
            self.num_candidates = value;
        }
        if let Some(value) = patch.vector_field {
            self.vector_field = value;
        }
        if let Some(values) = patch.hybrid_fields {
            self.hybrid_fields = values;
        }
        if let Some(values) = patch.lexical_fields {
            self.lexical_fields = values;
        }
        if let Some(values) = patch.boosts {
            self.boosts.extend(values);
        }
        if let Some(values) = patch.source {
            self.source = values;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalConfig {
    #[serde(default)]
    pub parallel: bool,
    #[serde(default)]
    pub strategies: Vec<String>,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            parallel: false,
            strategies: vec!["knn".to_string(), "lexical".to_string(), "hybrid".to_string()],
        }
    }
}

impl EvalConfig {
    fn merge(&mut self, patch: EvalPatch) {
        if let Some(value) = patch.parallel {
            self.parallel = value;
        }
        if let Some(values) = patch.strategies {
            self.strategies = values;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigPatch {
    pub encoder: Option<EncoderPatch>,
    pub backend: Option<BackendPatch>,
    pub search: Option<SearchPatch>,
    pub eval: Option<EvalPatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct EncoderPatch {
    pub backend: Option<String>,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub dims: Option<usize>,
    pub max_seq_len: Option<usize>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct BackendPatch {
    pub url: Option<String>,
    pub index: Option<String>,
    pub timeout_secs: Option<u64>,
    pub similarity: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SearchPatch {
    pub k: Option<usize>,
    pub num_candidates: Option<usize>,
    pub vector_field: Option<String>,
    pub hybrid_fields: Option<Vec<String>>,
    pub lexical_fields: Option<Vec<String>>,
    pub boosts: Option<BTreeMap<String, String>>,
    pub source: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct EvalPatch {
    pub parallel: Option<bool>,
    pub strategies: Option<Vec<String>>,
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn env_usize(key: &str) -> Result<Option<usize>> {
    match std::env::var(key) {
        Ok(value) => value
            .parse::<usize>()
            .map(Some)
            .map_err(|err| EvalError::Config(format!("invalid {key} value {value}: {err}"))),
        Err(_) => Ok(None),
    }
}

fn env_u64(key: &str) -> Result<Option<u64>> {
    match std::env::var(key) {
        Ok(value) => value
            .parse::<u64>()
            .map(Some)
            .map_err(|err| EvalError::Config(format!("invalid {key} value {value}: {err}"))),
        Err(_) => Ok(None),
    }
}

fn env_list(key: &str) -> Option<Vec<String>> {
    std::env::var(key).ok().map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(ToString::to_string)
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // =========================================================================
    // Defaults
    // =========================================================================

    #[test]
    fn config_defaults_match_filing_index() {
        let config = Config::default();
        assert_eq!(config.encoder.backend, "hash");
        assert_eq!(config.encoder.dims, 768);
        assert_eq!(config.encoder.max_seq_len, 512);
        assert_eq!(config.backend.index, "sec-filing-index");
        assert_eq!(config.backend.similarity, "cosine");
        assert_eq!(config.search.k, 5);
        assert_eq!(config.search.num_candidates, 10_000);
        assert_eq!(config.search.hybrid_fields, vec!["text_vector", "non_text_vector"]);
        assert_eq!(
            config.search.lexical_fields,
            vec!["reporting_period", "filing_type", "section", "text"]
        );
        assert!(config.search.boosts.is_empty());
        assert!(config.search.source.contains(&"id".to_string()));
        config.validate().unwrap();
    }

    #[test]
    fn config_serialization_roundtrip() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(config.search.k, deserialized.search.k);
        assert_eq!(config.backend.url, deserialized.backend.url);
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn validate_rejects_k_above_candidates() {
        let mut config = Config::default();
        config.search.k = 50;
        config.search.num_candidates = 10;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, EvalError::Config(msg) if msg.contains("num_candidates")));
    }

    #[test]
    fn validate_rejects_zero_dims() {
        let mut config = Config::default();
        config.encoder.dims = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_hybrid_fields() {
        let mut config = Config::default();
        config.search.hybrid_fields.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_requires_id_in_source() {
        let mut config = Config::default();
        config.search.source = vec!["text".to_string()];
        let err = config.validate().unwrap_err();
        assert!(matches!(err, EvalError::Config(msg) if msg.contains("\"id\"")));
    }

    // =========================================================================
    // File loading and merging
    // =========================================================================

    #[test]
    fn load_patch_nonexistent_file() {
        let result = Config::load_patch(Path::new("/nonexistent/path/config.toml")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn load_patch_invalid_toml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "this is not valid toml [[[").unwrap();
        assert!(Config::load_patch(&path).is_err());
    }

    #[test]
    fn merge_patch_updates_only_present_values() {
        let mut config = Config::default();
        let patch = ConfigPatch {
            search: Some(SearchPatch {
                k: Some(10),
                boosts: Some(BTreeMap::from([("text".to_string(), "2".to_string())])),
                ..Default::default()
            }),
            ..Default::default()
        };

        config.merge_patch(patch);
        assert_eq!(config.search.k, 10);
        assert_eq!(config.search.boosts.get("text").map(String::as_str), Some("2"));
        assert_eq!(config.search.num_candidates, 10_000);
        assert_eq!(config.encoder.dims, 768);
    }

    #[test]
    fn load_from_explicit_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("custom.toml");
        std::fs::write(
            &path,
            r#"
[encoder]
dims = 384

[search]
k = 3
hybrid_fields = ["all_vector"]
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path), temp.path()).unwrap();
        assert_eq!(config.encoder.dims, 384);
        assert_eq!(config.search.k, 3);
        assert_eq!(config.search.hybrid_fields, vec!["all_vector"]);
    }

    #[test]
    fn load_from_missing_explicit_path_fails() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing.toml");
        assert!(Config::load(Some(&missing), temp.path()).is_err());
    }

    #[test]
    fn load_project_config() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(PROJECT_CONFIG_FILE),
            r#"
[backend]
index = "filings-test"
"#,
        )
        .unwrap();

        let config = Config::load(None, temp.path()).unwrap();
        assert_eq!(config.backend.index, "filings-test");
    }

    #[test]
    fn load_rejects_invalid_combination() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.toml");
        std::fs::write(
            &path,
            r#"
[search]
k = 20
num_candidates = 5
"#,
        )
        .unwrap();
        assert!(Config::load(Some(&path), temp.path()).is_err());
    }
}
