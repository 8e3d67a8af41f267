//! In-memory lexical relation store
//!
//! A WordNet-shaped table keyed by `(lowercased word, POS)`. Relations are
//! stored symmetrically: adding `good -> bad` as antonyms also records
//! `bad -> good`.

use crate::errors::Result;
use crate::json::JsonLexicon;
use crate::pipeline::traits::{Substitute, SubstitutionProvider};
use crate::types::{LexicalRelation, PosTag};
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::path::Path;

/// Relations recorded for one `(word, POS)` key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LexEntry {
    pub synonyms: BTreeSet<String>,
    pub antonyms: BTreeSet<String>,
}

impl LexEntry {
    fn relation(&self, relation: LexicalRelation) -> &BTreeSet<String> {
        match relation {
            LexicalRelation::Synonym => &self.synonyms,
            LexicalRelation::Antonym => &self.antonyms,
        }
    }

    fn relation_mut(&mut self, relation: LexicalRelation) -> &mut BTreeSet<String> {
        match relation {
            LexicalRelation::Synonym => &mut self.synonyms,
            LexicalRelation::Antonym => &mut self.antonyms,
        }
    }
}

/// Synonym/antonym store implementing [`SubstitutionProvider`]
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    entries: FxHashMap<(String, PosTag), LexEntry>,
}

impl Lexicon {
    /// Create an empty lexicon
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `others` as synonyms of `word`, in both directions
    pub fn add_synonyms<I, S>(&mut self, word: &str, pos: PosTag, others: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.add_relation(word, pos, LexicalRelation::Synonym, others);
    }

    /// Record `others` as antonyms of `word`, in both directions
    pub fn add_antonyms<I, S>(&mut self, word: &str, pos: PosTag, others: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.add_relation(word, pos, LexicalRelation::Antonym, others);
    }

    fn add_relation<I, S>(&mut self, word: &str, pos: PosTag, relation: LexicalRelation, others: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let word = normalize(word);
        if word.is_empty() {
            return;
        }

        for other in others {
            let other = normalize(other.as_ref());
            if other.is_empty() || other == word {
                continue;
            }
            self.entries
                .entry((word.clone(), pos))
                .or_default()
                .relation_mut(relation)
                .insert(other.clone());
            self.entries
                .entry((other, pos))
                .or_default()
                .relation_mut(relation)
                .insert(word.clone());
        }
    }

    /// Build a lexicon from a parsed JSON dump
    pub fn from_json(doc: &JsonLexicon) -> Result<Self> {
        let mut lexicon = Self::new();
        for entry in &doc.entries {
            let pos = entry.pos_tag()?;
            lexicon.add_synonyms(&entry.word, pos, &entry.synonyms);
            lexicon.add_antonyms(&entry.word, pos, &entry.antonyms);
        }
        Ok(lexicon)
    }

    /// Load a lexicon from a JSON file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&JsonLexicon::from_path(path)?)
    }

    /// Raw relations for a key
    pub fn entry(&self, word: &str, pos: PosTag) -> Option<&LexEntry> {
        self.entries.get(&(normalize(word), pos))
    }

    /// Number of `(word, POS)` keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the lexicon is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SubstitutionProvider for Lexicon {
    fn candidates(
        &self,
        word: &str,
        pos: Option<PosTag>,
        relation: LexicalRelation,
    ) -> Vec<Substitute> {
        let word = normalize(word);
        if word.is_empty() {
            return Vec::new();
        }

        let tags: &[PosTag] = match &pos {
            Some(tag) => std::slice::from_ref(tag),
            None => &PosTag::ALL,
        };

        let mut out = Vec::new();
        for &tag in tags {
            let Some(entry) = self.entries.get(&(word.clone(), tag)) else {
                continue;
            };
            let excluded = entry.relation(relation.opposite());
            out.extend(
                entry
                    .relation(relation)
                    .iter()
                    .filter(|w| **w != word && !excluded.contains(*w))
                    .map(|w| Substitute::new(w.clone(), tag)),
            );
        }

        out.sort_by(|a, b| a.word.cmp(&b.word).then(a.pos.cmp(&b.pos)));
        out.dedup();
        out
    }
}

fn normalize(word: &str) -> String {
    word.trim().to_lowercase()
}
