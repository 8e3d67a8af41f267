//! Unicode-aware tokenization
//!
//! This module provides UAX #29 word segmentation with heuristic POS tagging
//! and lemmatization, for callers that do not run an external tagger.

use crate::types::{PosTag, Sentence, Token};
use rustc_hash::FxHashMap;
use unicode_segmentation::UnicodeSegmentation;

/// A Unicode-aware tokenizer following UAX #29
#[derive(Debug, Clone)]
pub struct Tokenizer {
    /// Minimum token length to consider
    min_token_length: usize,
    /// Lowercased word -> forced POS tag
    pos_overrides: FxHashMap<String, PosTag>,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer {
    /// Create a new tokenizer with default settings
    pub fn new() -> Self {
        Self {
            min_token_length: 1,
            pos_overrides: FxHashMap::default(),
        }
    }

    /// Set minimum token length
    pub fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_token_length = min_length;
        self
    }

    /// Force the POS tag of specific words, overriding the heuristics
    pub fn with_pos_overrides<I, S>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (S, PosTag)>,
        S: AsRef<str>,
    {
        for (word, pos) in overrides {
            self.pos_overrides
                .insert(word.as_ref().to_lowercase(), pos);
        }
        self
    }

    /// Tokenize one input row into a sentence.
    ///
    /// Token offsets are byte offsets into `text`. Pure punctuation and
    /// symbols are skipped, so they survive edits untouched.
    pub fn tokenize(&self, text: &str, row: usize) -> Sentence {
        let mut tokens = Vec::new();

        for (start, word) in text.unicode_word_indices() {
            if word.chars().count() < self.min_token_length {
                continue;
            }

            if !word.chars().any(|c| c.is_alphanumeric()) {
                continue;
            }

            let index = tokens.len();
            let pos = self.tag(word, index == 0);
            let lemma = self.basic_lemmatize(word);
            tokens.push(Token::new(word, lemma, pos, start, start + word.len(), index));
        }

        Sentence::new(text, row, tokens)
    }

    /// Tokenize many rows; row indices follow input order.
    pub fn tokenize_batch<'a, I>(&self, texts: I) -> Vec<Sentence>
    where
        I: IntoIterator<Item = &'a str>,
    {
        texts
            .into_iter()
            .enumerate()
            .map(|(row, text)| self.tokenize(text, row))
            .collect()
    }

    fn tag(&self, word: &str, sentence_initial: bool) -> PosTag {
        let lower = word.to_lowercase();
        if let Some(pos) = self.pos_overrides.get(&lower) {
            return *pos;
        }
        self.guess_pos(word, sentence_initial)
    }

    /// Basic heuristic POS tagging
    ///
    /// This is intentionally simple - for accurate POS tags, feed pre-tagged tokens.
    fn guess_pos(&self, word: &str, sentence_initial: bool) -> PosTag {
        let lower = word.to_lowercase();

        if let Some(pos) = self.function_word_pos(&lower) {
            return pos;
        }

        if let Some(pos) = self.frequent_content_pos(&lower) {
            return pos;
        }

        // A capitalized word mid-sentence is most likely a name
        if !sentence_initial
            && word
                .chars()
                .next()
                .map(|c| c.is_uppercase())
                .unwrap_or(false)
            && word.chars().skip(1).all(|c| c.is_lowercase())
        {
            return PosTag::ProperNoun;
        }

        if lower.ends_with("ful")
            || lower.ends_with("less")
            || lower.ends_with("ous")
            || lower.ends_with("ive")
            || lower.ends_with("able")
            || lower.ends_with("ible")
            || lower.ends_with("al")
            || lower.ends_with("ic")
        {
            return PosTag::Adjective;
        }

        if lower.ends_with("ly") {
            return PosTag::Adverb;
        }

        if lower.ends_with("ing") || lower.ends_with("ed") || lower.ends_with("ize") {
            return PosTag::Verb;
        }

        if lower.ends_with("tion")
            || lower.ends_with("ness")
            || lower.ends_with("ment")
            || lower.ends_with("ity")
            || lower.ends_with("er")
            || lower.ends_with("or")
        {
            return PosTag::Noun;
        }

        if word
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.' || c == ',')
        {
            return PosTag::Numeral;
        }

        PosTag::Noun
    }

    fn function_word_pos(&self, lower: &str) -> Option<PosTag> {
        let pos = match lower {
            // Determiners
            "a" | "an" | "the" | "this" | "that" | "these" | "those" | "my" | "your" | "his"
            | "her" | "its" | "our" | "their" | "some" | "any" | "each" | "every" | "no" => {
                PosTag::Determiner
            }
            // Conjunctions
            "and" | "or" | "but" | "nor" | "so" | "yet" | "if" | "because" | "while"
            | "though" | "although" | "when" | "unless" | "until" | "since" => PosTag::Conjunction,
            // Prepositions
            "of" | "to" | "in" | "for" | "on" | "with" | "at" | "from" | "by" | "about" | "as"
            | "into" | "like" | "through" | "after" | "over" | "between" | "out" | "against"
            | "during" | "without" | "before" | "under" | "around" | "among" => PosTag::Preposition,
            // Pronouns
            "i" | "you" | "he" | "she" | "it" | "we" | "they" | "me" | "him" | "us"
            | "them" | "myself" | "yourself" | "ourselves" | "themselves" => PosTag::Pronoun,
            // Auxiliaries
            "is" | "am" | "are" | "was" | "were" | "be" | "been" | "being" | "do" | "does"
            | "did" | "has" | "have" | "had" => PosTag::Verb,
            "not" | "n't" => PosTag::Particle,
            _ => return None,
        };
        Some(pos)
    }

    /// Frequent sentiment-bearing words the suffix rules get wrong
    fn frequent_content_pos(&self, lower: &str) -> Option<PosTag> {
        let pos = match lower {
            "good" | "bad" | "great" | "poor" | "fine" | "nice" | "awful" | "dull" | "new"
            | "old" | "big" | "small" | "long" | "short" | "high" | "low" | "happy" | "sad"
            | "interesting" | "boring" | "amazing" | "exciting" | "annoying" | "ugly"
            | "pretty" | "weak" | "strong" | "bright" | "dark" | "slow" | "fast" | "cheap"
            | "rich" | "clean" | "dirty" | "easy" | "hard" | "best" | "worst" | "better"
            | "worse" => PosTag::Adjective,
            "very" | "really" | "too" | "quite" | "never" | "always" | "often" | "well" => {
                PosTag::Adverb
            }
            _ => return None,
        };
        Some(pos)
    }

    /// Basic lemmatization
    ///
    /// This handles simple English morphology.
    fn basic_lemmatize(&self, word: &str) -> String {
        let lower = word.to_lowercase();

        if lower.ends_with("ies") && lower.len() > 4 {
            return format!("{}y", &lower[..lower.len() - 3]);
        }
        if lower.ends_with("es") && lower.len() > 3 {
            let stem = &lower[..lower.len() - 2];
            if stem.ends_with("ss")
                || stem.ends_with("sh")
                || stem.ends_with("ch")
                || stem.ends_with('x')
                || stem.ends_with('o')
            {
                return stem.to_string();
            }
        }
        if lower.ends_with('s') && lower.len() > 2 && !lower.ends_with("ss") {
            return lower[..lower.len() - 1].to_string();
        }
        if lower.ends_with("ing") && lower.len() > 5 {
            let stem = &lower[..lower.len() - 3];
            // Doubled consonant (running -> run)
            return undouble(stem).to_string();
        }
        if lower.ends_with("ed") && lower.len() > 4 {
            if lower.ends_with("ied") {
                return format!("{}y", &lower[..lower.len() - 3]);
            }
            let stem = &lower[..lower.len() - 2];
            return undouble(stem).to_string();
        }

        lower
    }
}

/// Drop the last character of a stem ending in a doubled letter
fn undouble(stem: &str) -> &str {
    let mut rev = stem.char_indices().rev();
    match (rev.next(), rev.next()) {
        (Some((cut, last)), Some((_, prev))) if last == prev => &stem[..cut],
        _ => stem,
    }
}
