//! Core types for rapid_counterfactual
//!
//! This module defines the fundamental data structures used throughout the library,
//! including POS tags, tokens, sentences, lexical relations, and configuration.

use crate::errors::{CounterfactualError, Result};
use crate::json::{JsonConfig, TaggedToken};
use serde::{Deserialize, Serialize};

// ============================================================================
// Part of speech
// ============================================================================

/// Part-of-speech tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PosTag {
    Noun,
    Verb,
    Adjective,
    Adverb,
    Pronoun,
    Determiner,
    Preposition,
    Conjunction,
    Interjection,
    Numeral,
    Particle,
    Punctuation,
    Symbol,
    ProperNoun,
    Other,
}

impl PosTag {
    /// Every tag, in the fixed order used for deterministic lookups.
    pub const ALL: [PosTag; 15] = [
        PosTag::Noun,
        PosTag::Verb,
        PosTag::Adjective,
        PosTag::Adverb,
        PosTag::Pronoun,
        PosTag::Determiner,
        PosTag::Preposition,
        PosTag::Conjunction,
        PosTag::Interjection,
        PosTag::Numeral,
        PosTag::Particle,
        PosTag::Punctuation,
        PosTag::Symbol,
        PosTag::ProperNoun,
        PosTag::Other,
    ];

    /// Number of coarse classes used in GNN feature one-hots.
    pub const COARSE_CLASSES: usize = 5;

    /// Check if this POS tag carries lexical content worth substituting
    pub fn is_content_word(&self) -> bool {
        matches!(
            self,
            PosTag::Noun | PosTag::Verb | PosTag::Adjective | PosTag::Adverb | PosTag::ProperNoun
        )
    }

    /// Check if this tag represents a noun (common or proper)
    pub fn is_noun(&self) -> bool {
        matches!(self, PosTag::Noun | PosTag::ProperNoun)
    }

    /// Whether a substitute tagged `other` may replace a word tagged `self`.
    ///
    /// Tags are compatible when equal, or when both are nominal.
    pub fn is_compatible(&self, other: &PosTag) -> bool {
        self == other || (self.is_noun() && other.is_noun())
    }

    /// Coarse class index: noun, verb, adjective, adverb, everything else.
    pub fn coarse_index(&self) -> usize {
        match self {
            PosTag::Noun | PosTag::ProperNoun => 0,
            PosTag::Verb => 1,
            PosTag::Adjective => 2,
            PosTag::Adverb => 3,
            _ => 4,
        }
    }

    /// Parse from spaCy-style POS tag
    pub fn from_spacy(tag: &str) -> Self {
        match tag.to_uppercase().as_str() {
            "NOUN" => PosTag::Noun,
            "VERB" | "AUX" => PosTag::Verb,
            "ADJ" => PosTag::Adjective,
            "ADV" => PosTag::Adverb,
            "PRON" => PosTag::Pronoun,
            "DET" => PosTag::Determiner,
            "ADP" => PosTag::Preposition,
            "CCONJ" | "SCONJ" => PosTag::Conjunction,
            "INTJ" => PosTag::Interjection,
            "NUM" => PosTag::Numeral,
            "PART" => PosTag::Particle,
            "PUNCT" => PosTag::Punctuation,
            "SYM" => PosTag::Symbol,
            "PROPN" => PosTag::ProperNoun,
            _ => PosTag::Other,
        }
    }

    /// Parse a user-supplied tag.
    ///
    /// Accepts spaCy tags (`ADJ`), long names (`adjective`) and WordNet
    /// letters (`a`, `s`, `n`, `v`, `r`). Returns `None` for anything else.
    pub fn parse(value: &str) -> Option<Self> {
        let lower = value.trim().to_lowercase();
        let pos = match lower.as_str() {
            "n" | "noun" | "nouns" => PosTag::Noun,
            "v" | "verb" | "verbs" => PosTag::Verb,
            "a" | "s" | "adj" | "adjective" | "adjectives" => PosTag::Adjective,
            "r" | "adv" | "adverb" | "adverbs" => PosTag::Adverb,
            "propn" | "proper_noun" => PosTag::ProperNoun,
            _ => match PosTag::from_spacy(&lower) {
                PosTag::Other => return None,
                pos => pos,
            },
        };
        Some(pos)
    }

    /// Get the spaCy-style POS tag string for this enum.
    pub fn as_str(&self) -> &'static str {
        match self {
            PosTag::Noun => "NOUN",
            PosTag::Verb => "VERB",
            PosTag::Adjective => "ADJ",
            PosTag::Adverb => "ADV",
            PosTag::Pronoun => "PRON",
            PosTag::Determiner => "DET",
            PosTag::Preposition => "ADP",
            PosTag::Conjunction => "CCONJ",
            PosTag::Interjection => "INTJ",
            PosTag::Numeral => "NUM",
            PosTag::Particle => "PART",
            PosTag::Punctuation => "PUNCT",
            PosTag::Symbol => "SYM",
            PosTag::ProperNoun => "PROPN",
            PosTag::Other => "X",
        }
    }
}

impl std::str::FromStr for PosTag {
    type Err = CounterfactualError;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        PosTag::parse(value).ok_or_else(|| {
            CounterfactualError::invalid_config(format!("unknown part-of-speech tag '{value}'"))
        })
    }
}

// ============================================================================
// Lexical relation
// ============================================================================

/// Relation a substitute must hold to the word it replaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LexicalRelation {
    #[default]
    Synonym,
    Antonym,
}

impl LexicalRelation {
    /// Map the boolean `antonyms` switch onto a relation.
    pub fn from_antonyms(antonyms: bool) -> Self {
        if antonyms {
            LexicalRelation::Antonym
        } else {
            LexicalRelation::Synonym
        }
    }

    /// The other relation.
    pub fn opposite(&self) -> Self {
        match self {
            LexicalRelation::Synonym => LexicalRelation::Antonym,
            LexicalRelation::Antonym => LexicalRelation::Synonym,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LexicalRelation::Synonym => "synonym",
            LexicalRelation::Antonym => "antonym",
        }
    }
}

impl std::str::FromStr for LexicalRelation {
    type Err = CounterfactualError;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "synonym" | "synonyms" | "syn" => Ok(LexicalRelation::Synonym),
            "antonym" | "antonyms" | "ant" => Ok(LexicalRelation::Antonym),
            other => Err(CounterfactualError::invalid_config(format!(
                "unknown lexical relation '{other}'"
            ))),
        }
    }
}

// ============================================================================
// Token & Sentence
// ============================================================================

/// A token from an input sentence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// The surface form (original text)
    pub text: String,
    /// The lemmatized form (normalized)
    pub lemma: String,
    /// Part-of-speech tag
    pub pos: PosTag,
    /// Byte offset (start) in the sentence text
    pub start: usize,
    /// Byte offset (end) in the sentence text
    pub end: usize,
    /// Token index within the sentence
    pub index: usize,
}

impl Token {
    /// Create a new token
    pub fn new(
        text: impl Into<String>,
        lemma: impl Into<String>,
        pos: PosTag,
        start: usize,
        end: usize,
        index: usize,
    ) -> Self {
        Self {
            text: text.into(),
            lemma: lemma.into(),
            pos,
            start,
            end,
            index,
        }
    }

    /// Check if this token may be replaced under the given POS filter.
    ///
    /// Without a filter every content word is eligible.
    pub fn is_substitution_site(&self, pos_filter: Option<PosTag>) -> bool {
        match pos_filter {
            Some(pos) => self.pos == pos,
            None => self.pos.is_content_word(),
        }
    }
}

/// A tokenized input sentence, identified by its source row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentence {
    /// The sentence text
    pub text: String,
    /// Row index in the input table
    pub row: usize,
    /// Tokens in order; offsets point into `text`
    pub tokens: Vec<Token>,
}

impl Sentence {
    /// Create a new sentence
    pub fn new(text: impl Into<String>, row: usize, tokens: Vec<Token>) -> Self {
        Self {
            text: text.into(),
            row,
            tokens,
        }
    }

    /// Build a sentence from tokens produced by an external tagger.
    ///
    /// Token indices follow input order; a missing lemma falls back to the
    /// lowercased surface form.
    pub fn from_tagged(text: impl Into<String>, row: usize, tagged: &[TaggedToken]) -> Self {
        let tokens = tagged
            .iter()
            .enumerate()
            .map(|(index, t)| {
                let lemma = if t.lemma.is_empty() {
                    t.text.to_lowercase()
                } else {
                    t.lemma.clone()
                };
                Token::new(
                    t.text.clone(),
                    lemma,
                    PosTag::from_spacy(&t.pos),
                    t.start,
                    t.end,
                    index,
                )
            })
            .collect();
        Self::new(text, row, tokens)
    }

    /// Number of tokens
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Check if the sentence has no tokens
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Number of word tokens, not counting punctuation or symbols
    pub fn word_count(&self) -> usize {
        self.tokens
            .iter()
            .filter(|t| !matches!(t.pos, PosTag::Punctuation | PosTag::Symbol))
            .count()
    }

    /// Get a token by index
    pub fn token(&self, index: usize) -> Option<&Token> {
        self.tokens.get(index)
    }

    /// Render the sentence with some tokens replaced.
    ///
    /// `edits` pairs a token index with its substitute. Text between tokens
    /// (spacing, punctuation) is kept verbatim and each substitute copies the
    /// capitalization of the word it replaces. Unknown indices are ignored;
    /// when an index appears twice the last substitute wins.
    pub fn apply_edits(&self, edits: &[(usize, &str)]) -> String {
        let mut sorted: Vec<(usize, &str)> = edits
            .iter()
            .copied()
            .filter(|(idx, _)| *idx < self.tokens.len())
            .collect();
        sorted.sort_by_key(|(idx, _)| *idx);
        sorted.dedup_by(|later, earlier| {
            if later.0 == earlier.0 {
                earlier.1 = later.1;
                true
            } else {
                false
            }
        });

        let mut out = String::with_capacity(self.text.len() + 16);
        let mut cursor = 0;
        for (idx, substitute) in sorted {
            let token = &self.tokens[idx];
            if token.start < cursor
                || token.start > token.end
                || token.end > self.text.len()
                || !self.text.is_char_boundary(token.start)
                || !self.text.is_char_boundary(token.end)
            {
                continue;
            }
            out.push_str(&self.text[cursor..token.start]);
            out.push_str(&match_case(&token.text, substitute));
            cursor = token.end;
        }
        out.push_str(&self.text[cursor..]);
        out
    }
}

/// Copy the capitalization pattern of `original` onto `substitute`.
pub fn match_case(original: &str, substitute: &str) -> String {
    let mut letters = original.chars().filter(|c| c.is_alphabetic());
    let first_upper = letters.next().map(|c| c.is_uppercase()).unwrap_or(false);
    if !first_upper {
        return substitute.to_string();
    }

    let rest_upper = original.chars().filter(|c| c.is_alphabetic()).count() > 1
        && original
            .chars()
            .filter(|c| c.is_alphabetic())
            .all(|c| c.is_uppercase());
    if rest_upper {
        return substitute.to_uppercase();
    }

    let mut chars = substitute.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ============================================================================
// Score Aggregation
// ============================================================================

/// Methods for aggregating GNN edge scores across the edits of one beam state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScoreAggregation {
    /// Sum of all edge scores
    #[default]
    Sum,
    /// Arithmetic mean of edge scores
    Mean,
    /// Maximum edge score
    Max,
    /// Product of edge scores (joint likelihood for scores in (0, 1))
    Product,
}

impl ScoreAggregation {
    /// Aggregate a slice of scores
    pub fn aggregate(&self, scores: &[f64]) -> f64 {
        if scores.is_empty() {
            return 0.0;
        }

        match self {
            ScoreAggregation::Sum => scores.iter().sum(),
            ScoreAggregation::Mean => scores.iter().sum::<f64>() / scores.len() as f64,
            ScoreAggregation::Max => scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            ScoreAggregation::Product => scores.iter().product(),
        }
    }

    fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "mean" | "average" => ScoreAggregation::Mean,
            "max" => ScoreAggregation::Max,
            "product" | "prod" => ScoreAggregation::Product,
            _ => ScoreAggregation::Sum,
        }
    }
}

impl std::str::FromStr for ScoreAggregation {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        Ok(ScoreAggregation::parse(value))
    }
}

/// Two scores within this epsilon are considered tied.
pub const SCORE_EPSILON: f64 = 1e-10;

/// Order two scores descending, treating near-equal scores as equal.
pub fn cmp_score_desc(a: f64, b: f64) -> std::cmp::Ordering {
    let diff = a - b;
    if diff.abs() > SCORE_EPSILON {
        // Higher score first (descending).
        if diff > 0.0 {
            std::cmp::Ordering::Less
        } else {
            std::cmp::Ordering::Greater
        }
    } else {
        std::cmp::Ordering::Equal
    }
}

// ============================================================================
// Ranking criterion
// ============================================================================

/// What the beam is ranked by after each expansion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingCriterion {
    /// Aggregated GNN scores of the applied edges
    #[default]
    GnnScore,
    /// How far the classifier has moved away from the original label
    Contrastive,
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for counterfactual generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Only tokens with this POS are substitution sites (None = content words)
    pub pos_filter: Option<PosTag>,
    /// Relation substitutes must hold to the original word
    pub relation: LexicalRelation,
    /// Drop POS-incompatible edges while building the graph
    pub edge_filter: bool,
    /// Compute the edit budget per sentence instead of using `max_edits`
    pub optimal_threshold: bool,
    /// Rank beam states by contrastive probability instead of GNN score
    pub use_contrastive_prob: bool,
    /// Number of states kept after each expansion
    pub beam_width: usize,
    /// Fixed edit budget, and the ceiling of the adaptive budget
    pub max_edits: usize,
    /// Fraction of the sentence's words the adaptive budget may edit
    pub edit_fraction: f64,
    /// Per-position cap on edges entering the search pool (0 = all)
    pub top_k_per_position: usize,
    /// How edge scores combine across the edits of a state
    pub score_aggregation: ScoreAggregation,
    /// Maximum substitution edges per graph
    pub max_edges: Option<usize>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            pos_filter: None,
            relation: LexicalRelation::Synonym,
            edge_filter: false,
            optimal_threshold: false,
            use_contrastive_prob: false,
            beam_width: 3,
            max_edits: 3,
            edit_fraction: 0.3,
            top_k_per_position: 5,
            score_aggregation: ScoreAggregation::Sum,
            max_edges: None,
        }
    }
}

impl GeneratorConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON configuration document and validate it.
    ///
    /// Unknown fields are ignored; `pos` and `antonyms` are accepted as
    /// aliases of `pos_filter` and `relation`.
    pub fn from_json(json: &str) -> Result<Self> {
        let parsed: JsonConfig = serde_json::from_str(json)?;
        let config = GeneratorConfig::try_from(parsed)?;
        config.validate()?;
        Ok(config)
    }

    /// The beam ranking criterion selected by `use_contrastive_prob`
    pub fn criterion(&self) -> RankingCriterion {
        if self.use_contrastive_prob {
            RankingCriterion::Contrastive
        } else {
            RankingCriterion::GnnScore
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.beam_width == 0 {
            return Err(CounterfactualError::invalid_config("beam_width must be > 0"));
        }

        if self.max_edits == 0 {
            return Err(CounterfactualError::invalid_config("max_edits must be > 0"));
        }

        if !self.edit_fraction.is_finite() || self.edit_fraction <= 0.0 || self.edit_fraction > 1.0
        {
            return Err(CounterfactualError::invalid_config(format!(
                "edit_fraction must be in (0, 1], got {}",
                self.edit_fraction
            )));
        }

        if self.max_edges == Some(0) {
            return Err(CounterfactualError::invalid_config(
                "max_edges must be > 0 when set",
            ));
        }

        Ok(())
    }

    /// Builder method: set the POS filter
    pub fn with_pos_filter(mut self, pos: PosTag) -> Self {
        self.pos_filter = Some(pos);
        self
    }

    /// Builder method: set the lexical relation
    pub fn with_relation(mut self, relation: LexicalRelation) -> Self {
        self.relation = relation;
        self
    }

    /// Builder method: toggle construction-time POS edge filtering
    pub fn with_edge_filter(mut self, enabled: bool) -> Self {
        self.edge_filter = enabled;
        self
    }

    /// Builder method: toggle the adaptive edit budget
    pub fn with_optimal_threshold(mut self, enabled: bool) -> Self {
        self.optimal_threshold = enabled;
        self
    }

    /// Builder method: toggle contrastive beam ranking
    pub fn with_contrastive_prob(mut self, enabled: bool) -> Self {
        self.use_contrastive_prob = enabled;
        self
    }

    /// Builder method: set beam width
    pub fn with_beam_width(mut self, beam_width: usize) -> Self {
        self.beam_width = beam_width;
        self
    }

    /// Builder method: set the fixed edit budget
    pub fn with_max_edits(mut self, max_edits: usize) -> Self {
        self.max_edits = max_edits;
        self
    }

    /// Builder method: set the adaptive budget fraction
    pub fn with_edit_fraction(mut self, fraction: f64) -> Self {
        self.edit_fraction = fraction;
        self
    }

    /// Builder method: set the per-position edge cap
    pub fn with_top_k_per_position(mut self, top_k: usize) -> Self {
        self.top_k_per_position = top_k;
        self
    }

    /// Builder method: set score aggregation
    pub fn with_score_aggregation(mut self, aggregation: ScoreAggregation) -> Self {
        self.score_aggregation = aggregation;
        self
    }

    /// Builder method: set maximum graph edges limit
    pub fn with_max_edges(mut self, max: usize) -> Self {
        self.max_edges = Some(max);
        self
    }
}
