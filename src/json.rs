//! JSON interface for configuration, pre-tagged input and resources
//!
//! External taggers, config files and lexicon dumps all arrive as JSON.
//! These types mirror the wire layout and convert into the core types.

use crate::errors::{CounterfactualError, Result};
use crate::types::{GeneratorConfig, LexicalRelation, PosTag, ScoreAggregation, Sentence};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Input token from an external tagger (spaCy-style tags)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedToken {
    pub text: String,
    #[serde(default)]
    pub lemma: String,
    pub pos: String,
    pub start: usize,
    pub end: usize,
}

/// One pre-tagged input row
#[derive(Debug, Clone, Deserialize)]
pub struct JsonSentence {
    pub text: String,
    #[serde(default)]
    pub row: Option<usize>,
    pub tokens: Vec<TaggedToken>,
}

/// A batch of pre-tagged rows with an optional configuration
#[derive(Debug, Clone, Deserialize)]
pub struct JsonDocument {
    pub sentences: Vec<JsonSentence>,
    #[serde(default)]
    pub config: Option<JsonConfig>,
}

impl JsonDocument {
    /// Parse a document from a JSON string
    pub fn from_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Split into sentences and a validated configuration.
    ///
    /// Rows without an explicit `row` take their position in the batch.
    pub fn into_parts(self) -> Result<(Vec<Sentence>, GeneratorConfig)> {
        let config = match self.config {
            Some(jc) => GeneratorConfig::try_from(jc)?,
            None => GeneratorConfig::default(),
        };
        config.validate()?;

        let sentences = self
            .sentences
            .into_iter()
            .enumerate()
            .map(|(i, js)| Sentence::from_tagged(js.text, js.row.unwrap_or(i), &js.tokens))
            .collect();
        Ok((sentences, config))
    }
}

/// Configuration from JSON, using the generator's flag names
#[derive(Debug, Clone, Deserialize, Default)]
pub struct JsonConfig {
    /// Accepts "adj", "ADJ", "adjective", WordNet letters
    #[serde(default, alias = "pos")]
    pub pos_filter: Option<String>,
    #[serde(default)]
    pub relation: Option<String>,
    /// Boolean switch; `true` selects antonyms
    #[serde(default)]
    pub antonyms: Option<bool>,
    #[serde(default)]
    pub edge_filter: bool,
    #[serde(default)]
    pub optimal_threshold: bool,
    #[serde(default)]
    pub use_contrastive_prob: bool,
    #[serde(default = "default_beam_width")]
    pub beam_width: usize,
    #[serde(default = "default_max_edits")]
    pub max_edits: usize,
    #[serde(default = "default_edit_fraction")]
    pub edit_fraction: f64,
    #[serde(default = "default_top_k")]
    pub top_k_per_position: usize,
    #[serde(default)]
    pub score_aggregation: String,
    #[serde(default)]
    pub max_edges: Option<usize>,
}

fn default_beam_width() -> usize {
    3
}
fn default_max_edits() -> usize {
    3
}
fn default_edit_fraction() -> f64 {
    0.3
}
fn default_top_k() -> usize {
    5
}

impl TryFrom<JsonConfig> for GeneratorConfig {
    type Error = CounterfactualError;

    fn try_from(jc: JsonConfig) -> Result<Self> {
        let pos_filter = match jc.pos_filter.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(tag) => Some(tag.parse::<PosTag>()?),
        };

        let relation = match (jc.relation.as_deref(), jc.antonyms) {
            (Some(name), antonyms) => {
                let relation: LexicalRelation = name.parse()?;
                if let Some(flag) = antonyms {
                    if LexicalRelation::from_antonyms(flag) != relation {
                        return Err(CounterfactualError::invalid_config(format!(
                            "relation '{}' contradicts antonyms = {}",
                            relation.as_str(),
                            flag
                        )));
                    }
                }
                relation
            }
            (None, Some(flag)) => LexicalRelation::from_antonyms(flag),
            (None, None) => LexicalRelation::Synonym,
        };

        let score_aggregation = jc
            .score_aggregation
            .parse::<ScoreAggregation>()
            .unwrap_or_default();

        Ok(GeneratorConfig {
            pos_filter,
            relation,
            edge_filter: jc.edge_filter,
            optimal_threshold: jc.optimal_threshold,
            use_contrastive_prob: jc.use_contrastive_prob,
            beam_width: jc.beam_width,
            max_edits: jc.max_edits,
            edit_fraction: jc.edit_fraction,
            top_k_per_position: jc.top_k_per_position,
            score_aggregation,
            max_edges: jc.max_edges,
        })
    }
}

// ============================================================================
// Lexicon documents
// ============================================================================

/// One word's relations in a lexicon dump
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonLexEntry {
    pub word: String,
    pub pos: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub antonyms: Vec<String>,
}

impl JsonLexEntry {
    /// The entry's POS, rejecting tags the lexicon cannot key on
    pub fn pos_tag(&self) -> Result<PosTag> {
        PosTag::parse(&self.pos).ok_or_else(|| {
            CounterfactualError::invalid_config(format!(
                "lexicon entry '{}' has unknown POS '{}'",
                self.word, self.pos
            ))
        })
    }
}

/// A WordNet-shaped relation dump
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonLexicon {
    #[serde(default)]
    pub entries: Vec<JsonLexEntry>,
}

impl JsonLexicon {
    /// Parse a lexicon from a JSON string
    pub fn from_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a lexicon from a JSON file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_str(&read_resource(path.as_ref())?)
    }
}

/// Read a resource file, reporting a missing file as a configuration error.
pub(crate) fn read_resource(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(CounterfactualError::missing_resource(
            path.display().to_string(),
        ));
    }
    Ok(std::fs::read_to_string(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let jc: JsonConfig = serde_json::from_str("{}").unwrap();
        let cfg = GeneratorConfig::try_from(jc).unwrap();
        assert_eq!(cfg, GeneratorConfig::default());
    }

    #[test]
    fn test_config_aliases() {
        let jc: JsonConfig =
            serde_json::from_str(r#"{"pos": "ADJ", "antonyms": true, "edge_filter": true}"#)
                .unwrap();
        let cfg = GeneratorConfig::try_from(jc).unwrap();
        assert_eq!(cfg.pos_filter, Some(PosTag::Adjective));
        assert_eq!(cfg.relation, LexicalRelation::Antonym);
        assert!(cfg.edge_filter);
    }

    #[test]
    fn test_config_relation_conflict() {
        let jc: JsonConfig =
            serde_json::from_str(r#"{"relation": "synonym", "antonyms": true}"#).unwrap();
        assert!(GeneratorConfig::try_from(jc).is_err());
    }

    #[test]
    fn test_config_unknown_pos() {
        let jc: JsonConfig = serde_json::from_str(r#"{"pos_filter": "banana"}"#).unwrap();
        let err = GeneratorConfig::try_from(jc).unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_config_empty_pos_means_none() {
        let jc: JsonConfig = serde_json::from_str(r#"{"pos": ""}"#).unwrap();
        assert_eq!(GeneratorConfig::try_from(jc).unwrap().pos_filter, None);
    }

    #[test]
    fn test_document_into_parts() {
        let doc = JsonDocument::from_str(
            r#"{
                "sentences": [
                    {"text": "Great plot", "tokens": [
                        {"text": "Great", "pos": "ADJ", "start": 0, "end": 5},
                        {"text": "plot", "lemma": "plot", "pos": "NOUN", "start": 6, "end": 10}
                    ]},
                    {"text": "Fine", "row": 9, "tokens": [
                        {"text": "Fine", "pos": "ADJ", "start": 0, "end": 4}
                    ]}
                ],
                "config": {"pos": "adj"}
            }"#,
        )
        .unwrap();

        let (sentences, cfg) = doc.into_parts().unwrap();
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].row, 0);
        assert_eq!(sentences[1].row, 9);
        assert_eq!(sentences[0].tokens[0].lemma, "great");
        assert_eq!(cfg.pos_filter, Some(PosTag::Adjective));
    }

    #[test]
    fn test_lexicon_document() {
        let lex = JsonLexicon::from_str(
            r#"{"entries": [{"word": "good", "pos": "a", "antonyms": ["bad"]}]}"#,
        )
        .unwrap();
        assert_eq!(lex.entries.len(), 1);
        assert!(lex.entries[0].synonyms.is_empty());
        assert_eq!(lex.entries[0].pos_tag().unwrap(), PosTag::Adjective);
    }

    #[test]
    fn test_missing_resource() {
        let err = JsonLexicon::from_path("/definitely/not/here/lexicon.json").unwrap_err();
        assert!(matches!(err, CounterfactualError::MissingResource { .. }));
    }
}
