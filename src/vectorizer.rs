//! Bag-of-words TF-IDF vectorization behind a pluggable [`Vectorizer`] trait.

use std::collections::{BTreeMap, HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Default vocabulary cap.
pub const DEFAULT_MAX_FEATURES: usize = 5000;

static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w\w+\b").expect("static regex"));

static STOP_WORDS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ENGLISH_STOP_WORDS.iter().copied().collect());

/// Sparse row with strictly increasing column indices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    indices: Vec<u32>,
    values: Vec<f32>,
}

impl SparseVector {
    /// Builds a vector from `(column, weight)` pairs; zero weights are dropped.
    pub fn from_pairs(mut pairs: Vec<(u32, f32)>) -> Self {
        pairs.sort_by_key(|(idx, _)| *idx);
        pairs.dedup_by_key(|(idx, _)| *idx);
        let (indices, values) = pairs.into_iter().filter(|(_, v)| *v != 0.0).unzip();
        Self { indices, values }
    }

    /// Number of non-zero entries.
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// Whether every entry is zero.
    pub fn is_zero(&self) -> bool {
        self.indices.is_empty()
    }

    /// Iterates `(column, weight)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u32, f32)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    /// Euclidean norm.
    pub fn norm(&self) -> f64 {
        self.values
            .iter()
            .map(|v| f64::from(*v) * f64::from(*v))
            .sum::<f64>()
            .sqrt()
    }

    /// Sparse dot product (merge join over sorted indices).
    pub fn dot(&self, other: &SparseVector) -> f64 {
        let (mut i, mut j) = (0, 0);
        let mut acc = 0.0f64;
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    acc += f64::from(self.values[i]) * f64::from(other.values[j]);
                    i += 1;
                    j += 1;
                }
            }
        }
        acc
    }

    fn l2_normalize(&mut self) {
        let norm = self.norm();
        if norm > 0.0 {
            for value in &mut self.values {
                *value = (f64::from(*value) / norm) as f32;
            }
        }
    }
}

/// One sparse row per corpus product, aligned with the corpus table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureMatrix {
    rows: Vec<SparseVector>,
}

impl FeatureMatrix {
    /// Wraps already-transformed rows.
    pub fn new(rows: Vec<SparseVector>) -> Self {
        Self { rows }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row at `index`.
    pub fn row(&self, index: usize) -> Option<&SparseVector> {
        self.rows.get(index)
    }

    /// All rows in order.
    pub fn rows(&self) -> &[SparseVector] {
        &self.rows
    }

    pub(crate) fn set_row(&mut self, index: usize, row: SparseVector) {
        self.rows[index] = row;
    }

    pub(crate) fn push(&mut self, row: SparseVector) {
        self.rows.push(row);
    }
}

/// Text-to-vector capability used by the recommender model.
pub trait Vectorizer {
    /// Learns vocabulary and weights from the corpus, replacing any prior fit.
    fn fit(&mut self, documents: &[&str]);

    /// Maps a document into the fitted space; unseen terms are dropped.
    fn transform(&self, document: &str) -> SparseVector;

    /// Number of fitted vocabulary terms.
    fn vocabulary_len(&self) -> usize;

    /// Fits, then transforms every document.
    fn fit_transform(&mut self, documents: &[&str]) -> FeatureMatrix {
        self.fit(documents);
        FeatureMatrix::new(documents.iter().map(|doc| self.transform(doc)).collect())
    }
}

/// TF-IDF weighting with English stop words, smooth IDF and L2-normalized rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    max_features: usize,
    vocabulary: HashMap<String, u32>,
    idf: Vec<f32>,
}

impl TfidfVectorizer {
    /// Unfitted vectorizer keeping at most `max_features` terms.
    pub fn new(max_features: usize) -> Self {
        Self {
            max_features: max_features.max(1),
            vocabulary: HashMap::new(),
            idf: Vec::new(),
        }
    }

    /// Configured vocabulary cap.
    pub fn max_features(&self) -> usize {
        self.max_features
    }

    /// Column index of `term`, if it is in the vocabulary.
    pub fn column(&self, term: &str) -> Option<u32> {
        self.vocabulary.get(term).copied()
    }
}

impl Default for TfidfVectorizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FEATURES)
    }
}

impl Vectorizer for TfidfVectorizer {
    fn fit(&mut self, documents: &[&str]) {
        let mut term_freq: BTreeMap<String, u64> = BTreeMap::new();
        let mut doc_freq: HashMap<String, u64> = HashMap::new();
        for doc in documents {
            let mut seen = HashSet::new();
            for term in tokenize(doc) {
                *term_freq.entry(term.clone()).or_insert(0) += 1;
                if seen.insert(term.clone()) {
                    *doc_freq.entry(term).or_insert(0) += 1;
                }
            }
        }

        // BTreeMap iteration is alphabetical, so the stable sort breaks frequency ties by term.
        let mut ranked: Vec<(String, u64)> = term_freq.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(self.max_features);
        let mut kept: Vec<String> = ranked.into_iter().map(|(term, _)| term).collect();
        kept.sort();

        let n = documents.len() as f64;
        self.idf = kept
            .iter()
            .map(|term| {
                let df = doc_freq.get(term).copied().unwrap_or(0) as f64;
                (((1.0 + n) / (1.0 + df)).ln() + 1.0) as f32
            })
            .collect();
        self.vocabulary = kept
            .into_iter()
            .enumerate()
            .map(|(idx, term)| (term, idx as u32))
            .collect();
    }

    fn transform(&self, document: &str) -> SparseVector {
        let mut counts: HashMap<u32, u32> = HashMap::new();
        for term in tokenize(document) {
            if let Some(&col) = self.vocabulary.get(&term) {
                *counts.entry(col).or_insert(0) += 1;
            }
        }
        let pairs = counts
            .into_iter()
            .map(|(col, count)| (col, count as f32 * self.idf[col as usize]))
            .collect();
        let mut vector = SparseVector::from_pairs(pairs);
        vector.l2_normalize();
        vector
    }

    fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }
}

/// Lowercased word tokens of two or more characters, stop words removed.
pub fn tokenize(document: &str) -> Vec<String> {
    let lowered = document.to_lowercase();
    TOKEN
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|term| !STOP_WORDS.contains(term))
        .map(str::to_string)
        .collect()
}

const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "afterwards", "again", "against", "all", "almost",
    "alone", "along", "already", "also", "although", "always", "am", "among", "amongst",
    "amoungst", "amount", "an", "and", "another", "any", "anyhow", "anyone", "anything", "anyway",
    "anywhere", "are", "around", "as", "at", "back", "be", "became", "because", "become",
    "becomes", "becoming", "been", "before", "beforehand", "behind", "being", "below", "beside",
    "besides", "between", "beyond", "bill", "both", "bottom", "but", "by", "call", "can",
    "cannot", "cant", "co", "con", "could", "couldnt", "cry", "de", "describe", "detail", "do",
    "done", "down", "due", "during", "each", "eg", "eight", "either", "eleven", "else",
    "elsewhere", "empty", "enough", "etc", "even", "ever", "every", "everyone", "everything",
    "everywhere", "except", "few", "fifteen", "fifty", "fill", "find", "fire", "first", "five",
    "for", "former", "formerly", "forty", "found", "four", "from", "front", "full", "further",
    "get", "give", "go", "had", "has", "hasnt", "have", "he", "hence", "her", "here",
    "hereafter", "hereby", "herein", "hereupon", "hers", "herself", "him", "himself", "his",
    "how", "however", "hundred", "i", "ie", "if", "in", "inc", "indeed", "interest", "into",
    "is", "it", "its", "itself", "keep", "last", "latter", "latterly", "least", "less", "ltd",
    "made", "many", "may", "me", "meanwhile", "might", "mill", "mine", "more", "moreover",
    "most", "mostly", "move", "much", "must", "my", "myself", "name", "namely", "neither",
    "never", "nevertheless", "next", "nine", "no", "nobody", "none", "noone", "nor", "not",
    "nothing", "now", "nowhere", "of", "off", "often", "on", "once", "one", "only", "onto", "or",
    "other", "others", "otherwise", "our", "ours", "ourselves", "out", "over", "own", "part",
    "per", "perhaps", "please", "put", "rather", "re", "same", "see", "seem", "seemed",
    "seeming", "seems", "serious", "several", "she", "should", "show", "side", "since",
    "sincere", "six", "sixty", "so", "some", "somehow", "someone", "something", "sometime",
    "sometimes", "somewhere", "still", "such", "system", "take", "ten", "than", "that", "the",
    "their", "them", "themselves", "then", "thence", "there", "thereafter", "thereby",
    "therefore", "therein", "thereupon", "these", "they", "thick", "thin", "third", "this",
    "those", "though", "three", "through", "throughout", "thru", "thus", "to", "together", "too",
    "top", "toward", "towards", "twelve", "twenty", "two", "un", "under", "until", "up", "upon",
    "us", "very", "via", "was", "we", "well", "were", "what", "whatever", "when", "whence",
    "whenever", "where", "whereafter", "whereas", "whereby", "wherein", "whereupon", "wherever",
    "whether", "which", "while", "whither", "who", "whoever", "whole", "whom", "whose", "why",
    "will", "with", "within", "without", "would", "yet", "you", "your", "yours", "yourself",
    "yourselves",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizer_drops_stop_words_and_short_tokens() {
        assert_eq!(
            tokenize("The X quick brown fox is over a Lazy dog"),
            vec!["quick", "brown", "fox", "lazy", "dog"]
        );
    }

    #[test]
    fn vocabulary_is_alphabetical() {
        let mut vec = TfidfVectorizer::default();
        vec.fit(&["zebra apple", "mango apple"]);
        assert_eq!(vec.vocabulary_len(), 3);
        assert_eq!(vec.column("apple"), Some(0));
        assert_eq!(vec.column("mango"), Some(1));
        assert_eq!(vec.column("zebra"), Some(2));
    }

    #[test]
    fn cap_keeps_most_frequent_terms() {
        let mut vec = TfidfVectorizer::new(2);
        vec.fit(&["kettle kettle toaster", "kettle blender toaster", "mixer"]);
        assert_eq!(vec.vocabulary_len(), 2);
        assert!(vec.column("kettle").is_some());
        assert!(vec.column("toaster").is_some());
        assert!(vec.column("mixer").is_none());
    }

    #[test]
    fn frequency_ties_break_alphabetically() {
        let mut vec = TfidfVectorizer::new(1);
        vec.fit(&["pear", "apple"]);
        assert_eq!(vec.column("apple"), Some(0));
        assert!(vec.column("pear").is_none());
    }

    #[test]
    fn transform_drops_unseen_terms_and_normalizes() {
        let mut vec = TfidfVectorizer::default();
        vec.fit(&["blue kettle", "red toaster"]);
        let row = vec.transform("blue kettle with turbo");
        assert_eq!(row.nnz(), 2);
        assert!((row.norm() - 1.0).abs() < 1e-6);
        assert!(vec.transform("turbo").is_zero());
    }

    #[test]
    fn rarer_terms_weigh_more() {
        let mut vec = TfidfVectorizer::default();
        vec.fit(&["steel kettle", "steel toaster", "steel blender"]);
        let row = vec.transform("steel kettle");
        let weights: HashMap<u32, f32> = row.iter().collect();
        let steel = weights[&vec.column("steel").expect("steel")];
        let kettle = weights[&vec.column("kettle").expect("kettle")];
        assert!(kettle > steel);
    }
}
