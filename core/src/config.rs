use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, SearchError};
use crate::query::QueryConfig;
use crate::ranker::RankingParams;
use crate::tokenizer::TokenizerConfig;

/// Everything that shapes indexing and ranking. Every field has a default, so
/// a config file only needs the keys it overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub tokenizer: TokenizerConfig,
    pub ranking: RankingParams,
    pub query: QueryConfig,
}

impl SearchConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: SearchConfig = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| SearchError::Io { path: path.to_path_buf(), source })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        let r = &self.ranking;
        if !(r.k1.is_finite() && r.k1 >= 0.0) {
            return Err(SearchError::Config(format!("k1 must be a non-negative number, got {}", r.k1)));
        }
        if !(0.0..=1.0).contains(&r.b) {
            return Err(SearchError::Config(format!("b must be within [0, 1], got {}", r.b)));
        }
        if !(r.title_boost >= 0.0 && r.body_boost >= 0.0) {
            return Err(SearchError::Config("field boosts must be non-negative".into()));
        }
        let q = &self.query;
        if !(q.prefix_weight > 0.0 && q.prefix_weight <= 1.0) {
            return Err(SearchError::Config(format!("prefix_weight must be within (0, 1], got {}", q.prefix_weight)));
        }
        if let Some(fuzzy) = &q.fuzzy {
            if !(fuzzy.max_edit_ratio >= 0.0 && fuzzy.weight > 0.0) {
                return Err(SearchError::Config("fuzzy ratio and weight must be positive".into()));
            }
        }
        if self.tokenizer.min_token_len == 0 {
            return Err(SearchError::Config("min_token_len must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::StopWords;

    #[test]
    fn partial_config_keeps_defaults() {
        let config = SearchConfig::from_json_str(r#"{"ranking": {"title_boost": 3.0}, "tokenizer": {"stop_words": "none"}}"#).unwrap();
        assert_eq!(config.ranking.title_boost, 3.0);
        assert_eq!(config.ranking.body_boost, 1.0);
        assert_eq!(config.tokenizer.stop_words, StopWords::None);
        assert_eq!(config.tokenizer.min_token_len, 2);
        assert_eq!(config.query.default_limit, 10);
    }

    #[test]
    fn rejects_out_of_range_b() {
        let err = SearchConfig::from_json_str(r#"{"ranking": {"b": 1.5}}"#).unwrap_err();
        assert!(matches!(err, SearchError::Config(_)));
    }

    #[test]
    fn custom_stopwords_from_json() {
        let config = SearchConfig::from_json_str(r#"{"tokenizer": {"stop_words": {"custom": ["julia"]}}}"#).unwrap();
        assert_eq!(config.tokenizer.stop_words, StopWords::Custom(vec!["julia".into()]));
    }
}
