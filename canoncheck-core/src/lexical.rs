//! Sparse lexical representation of the chunk set.
//!
//! Term weights are raw counts scaled by a smoothed inverse document
//! frequency, `ln((1 + n) / (1 + df)) + 1`, with every row L2-normalized so
//! cosine similarity reduces to a sparse dot product.

use crate::types::Chunk;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few",
    "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "herself", "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its",
    "itself", "just", "may", "me", "might", "more", "most", "must", "my", "myself", "no", "nor",
    "not", "now", "of", "off", "on", "once", "only", "or", "other", "our", "ours", "ourselves",
    "out", "over", "own", "same", "shall", "she", "should", "so", "some", "such", "than", "that",
    "the", "their", "theirs", "them", "themselves", "then", "there", "these", "they", "this",
    "those", "through", "to", "too", "under", "until", "up", "very", "was", "we", "were", "what",
    "when", "where", "which", "while", "who", "whom", "why", "will", "with", "would", "you",
    "your", "yours", "yourself", "yourselves",
];

fn stop_words() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOP_WORDS.iter().copied().collect())
}

/// Lowercased word tokens of at least two characters, stop words removed.
pub fn tokenize(text: &str) -> Vec<String> {
    let stop = stop_words();
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.chars().count() >= 2 && !stop.contains(t))
        .map(str::to_string)
        .collect()
}

/// A sparse, L2-normalized term vector. Entries are sorted by term id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    entries: Vec<(usize, f64)>,
}

impl SparseVector {
    fn from_weights(weights: BTreeMap<usize, f64>) -> Self {
        let norm = weights.values().map(|w| w * w).sum::<f64>().sqrt();
        if norm <= f64::EPSILON {
            return Self::default();
        }
        Self {
            entries: weights.into_iter().map(|(t, w)| (t, w / norm)).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Cosine similarity. Zero when either side has no terms.
    pub fn cosine(&self, other: &SparseVector) -> f64 {
        let (mut i, mut j, mut dot) = (0, 0, 0.0);
        while i < self.entries.len() && j < other.entries.len() {
            let (ta, wa) = self.entries[i];
            let (tb, wb) = other.entries[j];
            match ta.cmp(&tb) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    dot += wa * wb;
                    i += 1;
                    j += 1;
                }
            }
        }
        dot
    }
}

/// Fitted vocabulary plus one weighted row per chunk, in chunk order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexicalIndex {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    rows: Vec<SparseVector>,
}

impl LexicalIndex {
    /// Fit the vocabulary and weights over `chunks`.
    pub fn fit(chunks: &[Chunk]) -> Self {
        let tokenized: Vec<Vec<String>> = chunks.iter().map(|c| tokenize(&c.text)).collect();

        let mut doc_freq: BTreeMap<&str, usize> = BTreeMap::new();
        for tokens in &tokenized {
            let unique: HashSet<&str> = tokens.iter().map(String::as_str).collect();
            for term in unique {
                *doc_freq.entry(term).or_default() += 1;
            }
        }

        // Term ids follow lexical order so fits are reproducible.
        let n = chunks.len() as f64;
        let mut vocabulary = HashMap::with_capacity(doc_freq.len());
        let mut idf = Vec::with_capacity(doc_freq.len());
        for (id, (term, df)) in doc_freq.iter().enumerate() {
            vocabulary.insert((*term).to_string(), id);
            idf.push(((1.0 + n) / (1.0 + *df as f64)).ln() + 1.0);
        }

        let mut index = Self {
            vocabulary,
            idf,
            rows: Vec::new(),
        };
        index.rows = tokenized
            .iter()
            .map(|tokens| index.weigh(tokens.iter().map(String::as_str)))
            .collect();
        index
    }

    /// Project arbitrary text onto the fitted vocabulary. Unknown terms are dropped.
    pub fn transform(&self, text: &str) -> SparseVector {
        let tokens = tokenize(text);
        self.weigh(tokens.iter().map(String::as_str))
    }

    /// Cosine similarity of `text` against every row, in chunk order.
    pub fn similarities(&self, text: &str) -> Vec<f64> {
        let query = self.transform(text);
        self.rows.iter().map(|row| query.cosine(row)).collect()
    }

    pub fn rows(&self) -> &[SparseVector] {
        &self.rows
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    fn weigh<'a>(&self, tokens: impl Iterator<Item = &'a str>) -> SparseVector {
        let mut weights: BTreeMap<usize, f64> = BTreeMap::new();
        for token in tokens {
            if let Some(&id) = self.vocabulary.get(token) {
                *weights.entry(id).or_default() += 1.0;
            }
        }
        for (id, w) in weights.iter_mut() {
            *w *= self.idf[*id];
        }
        SparseVector::from_weights(weights)
    }
}
