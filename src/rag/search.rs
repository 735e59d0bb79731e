//! BM25 lexical index backing the in-memory retriever.

use std::collections::{HashMap, HashSet};

/// BM25 search index for lexical matching
#[derive(Debug, Clone, Default)]
pub struct Bm25Index {
    /// Document ID -> tokenized content
    documents: HashMap<String, Vec<String>>,
    /// Term -> document IDs containing term
    inverted_index: HashMap<String, HashSet<String>>,
    /// Average document length
    avg_doc_length: f32,
    /// BM25 k1 parameter (term frequency saturation)
    k1: f32,
    /// BM25 b parameter (length normalization)
    b: f32,
}

impl Bm25Index {
    /// Create a new BM25 index with default parameters
    pub fn new() -> Self {
        Self {
            k1: 1.2,
            b: 0.75,
            ..Default::default()
        }
    }

    /// Tokenize text into lowercase terms
    fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|s| s.chars().count() > 1)
            .map(String::from)
            .collect()
    }

    /// Add (or replace) a document in the index
    pub fn add_document(&mut self, id: &str, content: &str) {
        self.remove_document(id);

        let tokens = Self::tokenize(content);
        for term in tokens.iter().collect::<HashSet<_>>() {
            self.inverted_index
                .entry(term.clone())
                .or_default()
                .insert(id.to_string());
        }
        self.documents.insert(id.to_string(), tokens);
        self.recompute_average();
    }

    /// Remove a document from the index
    pub fn remove_document(&mut self, id: &str) {
        if let Some(tokens) = self.documents.remove(id) {
            for term in tokens.into_iter().collect::<HashSet<_>>() {
                if let Some(docs) = self.inverted_index.get_mut(&term) {
                    docs.remove(id);
                    if docs.is_empty() {
                        self.inverted_index.remove(&term);
                    }
                }
            }
            self.recompute_average();
        }
    }

    fn recompute_average(&mut self) {
        let total: usize = self.documents.values().map(Vec::len).sum();
        self.avg_doc_length = if self.documents.is_empty() {
            0.0
        } else {
            total as f32 / self.documents.len() as f32
        };
    }

    fn idf(&self, term: &str) -> f32 {
        let df = self.inverted_index.get(term).map(HashSet::len).unwrap_or(0) as f32;
        let n = self.documents.len() as f32;
        if df == 0.0 || n == 0.0 {
            return 0.0;
        }
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    fn score_document(&self, doc_id: &str, query_terms: &[String]) -> f32 {
        let Some(doc_tokens) = self.documents.get(doc_id) else {
            return 0.0;
        };

        let doc_len = doc_tokens.len() as f32;
        let mut term_freq: HashMap<&str, usize> = HashMap::new();
        for token in doc_tokens {
            *term_freq.entry(token.as_str()).or_insert(0) += 1;
        }

        query_terms
            .iter()
            .map(|term| {
                let tf = term_freq.get(term.as_str()).copied().unwrap_or(0) as f32;
                let numerator = tf * (self.k1 + 1.0);
                let denominator =
                    tf + self.k1 * (1.0 - self.b + self.b * doc_len / self.avg_doc_length);
                self.idf(term) * numerator / denominator
            })
            .sum()
    }

    /// Search the index and return top-k `(id, score)` pairs, best first
    pub fn search(&self, query: &str, top_k: usize) -> Vec<(String, f32)> {
        let query_terms = Self::tokenize(query);
        if query_terms.is_empty() {
            return Vec::new();
        }

        let candidates: HashSet<&String> = query_terms
            .iter()
            .filter_map(|term| self.inverted_index.get(term))
            .flatten()
            .collect();

        let mut results: Vec<(String, f32)> = candidates
            .into_iter()
            .map(|id| (id.clone(), self.score_document(id, &query_terms)))
            .filter(|(_, score)| *score > 0.0)
            .collect();

        results.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        results.truncate(top_k);
        results
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
