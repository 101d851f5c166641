//! TF-IDF text vectorization.
//!
//! `TfIdfVectorizer` holds the fit-time configuration; fitting it on a corpus
//! yields a `FittedVectorizer` whose vocabulary is frozen. Every vector it
//! produces has the same dimensionality, equal to the vocabulary size.

use hs_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub mod stop_words;
pub mod tokenizer;

pub use tokenizer::tokenize;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorizerConfig {
    /// Upper bound on vocabulary size, keeping the most frequent terms
    pub max_features: usize,
    pub stop_words: bool,
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self {
            max_features: 5000,
            stop_words: true,
        }
    }
}

/// Sparse feature vector with a fixed dimensionality.
///
/// Entries are sorted by index and never contain explicit zeros.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    dim: usize,
    entries: Vec<(usize, f64)>,
}

impl FeatureVector {
    pub fn zeros(dim: usize) -> Self {
        Self {
            dim,
            entries: Vec::new(),
        }
    }

    /// Builds a vector from `(index, value)` pairs. Indices must be below `dim`.
    pub fn from_entries(dim: usize, mut entries: Vec<(usize, f64)>) -> Result<Self> {
        if let Some(&(index, _)) = entries.iter().find(|(i, _)| *i >= dim) {
            return Err(Error::Scoring(format!(
                "Feature index {} out of range for dimension {}",
                index, dim
            )));
        }
        entries.retain(|(_, v)| *v != 0.0);
        entries.sort_by_key(|(i, _)| *i);
        entries.dedup_by_key(|(i, _)| *i);
        Ok(Self { dim, entries })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    pub fn is_zero(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.entries.iter().copied()
    }

    pub fn get(&self, index: usize) -> f64 {
        self.entries
            .binary_search_by_key(&index, |(i, _)| *i)
            .map(|pos| self.entries[pos].1)
            .unwrap_or(0.0)
    }

    pub fn dot(&self, dense: &[f64]) -> f64 {
        self.entries.iter().map(|(i, v)| v * dense[*i]).sum()
    }

    pub fn norm(&self) -> f64 {
        self.entries.iter().map(|(_, v)| v * v).sum::<f64>().sqrt()
    }

    pub fn to_dense(&self) -> Vec<f64> {
        let mut dense = vec![0.0; self.dim];
        for (i, v) in &self.entries {
            dense[*i] = *v;
        }
        dense
    }
}

#[derive(Debug, Clone, Default)]
pub struct TfIdfVectorizer {
    config: VectorizerConfig,
}

impl TfIdfVectorizer {
    pub fn new(config: VectorizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VectorizerConfig {
        &self.config
    }

    /// Learns the vocabulary and IDF weights from `corpus`.
    ///
    /// Terms are ranked by total count across the corpus (ties broken
    /// alphabetically) and the top `max_features` are kept. Feature indices
    /// follow alphabetical term order.
    pub fn fit<S: AsRef<str>>(&self, corpus: &[S]) -> Result<FittedVectorizer> {
        if corpus.is_empty() {
            return Err(Error::Training("Cannot fit vectorizer on an empty corpus".to_string()));
        }
        if self.config.max_features == 0 {
            return Err(Error::Config("max_features must be positive".to_string()));
        }

        let documents: Vec<Vec<String>> = corpus
            .iter()
            .map(|doc| tokenize(doc.as_ref(), self.config.stop_words))
            .collect();

        let mut term_counts: HashMap<&str, usize> = HashMap::new();
        for doc in &documents {
            for token in doc {
                *term_counts.entry(token.as_str()).or_insert(0) += 1;
            }
        }
        if term_counts.is_empty() {
            return Err(Error::Training(
                "Empty vocabulary; corpus only contains stop words".to_string(),
            ));
        }

        let mut ranked: Vec<(&str, usize)> = term_counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(self.config.max_features);

        let mut terms: Vec<String> = ranked.into_iter().map(|(t, _)| t.to_string()).collect();
        terms.sort();
        let index: HashMap<String, usize> =
            terms.iter().enumerate().map(|(i, t)| (t.clone(), i)).collect();

        let mut doc_freq = vec![0usize; terms.len()];
        for doc in &documents {
            let unique: HashSet<&String> = doc.iter().collect();
            for token in unique {
                if let Some(&i) = index.get(token) {
                    doc_freq[i] += 1;
                }
            }
        }

        let n_docs = documents.len() as f64;
        let idf = doc_freq
            .into_iter()
            .map(|df| ((1.0 + n_docs) / (1.0 + df as f64)).ln() + 1.0)
            .collect();

        tracing::debug!("Fitted vocabulary of {} terms over {} documents", terms.len(), documents.len());

        Ok(FittedVectorizer {
            config: self.config.clone(),
            terms,
            idf,
            index,
        })
    }

    pub fn fit_transform<S: AsRef<str>>(&self, corpus: &[S]) -> Result<(FittedVectorizer, Vec<FeatureVector>)> {
        let fitted = self.fit(corpus)?;
        let vectors = fitted.transform(corpus);
        Ok((fitted, vectors))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VectorizerState {
    config: VectorizerConfig,
    terms: Vec<String>,
    idf: Vec<f64>,
}

/// A vectorizer with a frozen vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "VectorizerState", into = "VectorizerState")]
pub struct FittedVectorizer {
    config: VectorizerConfig,
    terms: Vec<String>,
    idf: Vec<f64>,
    index: HashMap<String, usize>,
}

impl PartialEq for FittedVectorizer {
    fn eq(&self, other: &Self) -> bool {
        self.config == other.config && self.terms == other.terms && self.idf == other.idf
    }
}

impl From<FittedVectorizer> for VectorizerState {
    fn from(v: FittedVectorizer) -> Self {
        Self {
            config: v.config,
            terms: v.terms,
            idf: v.idf,
        }
    }
}

impl TryFrom<VectorizerState> for FittedVectorizer {
    type Error = String;

    fn try_from(state: VectorizerState) -> std::result::Result<Self, Self::Error> {
        if state.terms.len() != state.idf.len() {
            return Err(format!(
                "vocabulary has {} terms but {} idf weights",
                state.terms.len(),
                state.idf.len()
            ));
        }
        let index: HashMap<String, usize> = state
            .terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();
        if index.len() != state.terms.len() {
            return Err("vocabulary contains duplicate terms".to_string());
        }
        Ok(Self {
            config: state.config,
            terms: state.terms,
            idf: state.idf,
            index,
        })
    }
}

impl FittedVectorizer {
    /// Number of features every produced vector has.
    pub fn dim(&self) -> usize {
        self.terms.len()
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.terms
    }

    pub fn idf(&self) -> &[f64] {
        &self.idf
    }

    pub fn config(&self) -> &VectorizerConfig {
        &self.config
    }

    /// Maps one text to an L2-normalized TF-IDF vector. Unknown terms are ignored.
    pub fn transform_one(&self, text: &str) -> FeatureVector {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for token in tokenize(text, self.config.stop_words) {
            if let Some(&i) = self.index.get(&token) {
                *counts.entry(i).or_insert(0.0) += 1.0;
            }
        }

        let mut entries: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(i, tf)| (i, tf * self.idf[i]))
            .collect();
        entries.sort_by_key(|(i, _)| *i);

        let norm = entries.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, v) in entries.iter_mut() {
                *v /= norm;
            }
        }

        FeatureVector {
            dim: self.dim(),
            entries,
        }
    }

    pub fn transform<S: AsRef<str>>(&self, texts: &[S]) -> Vec<FeatureVector> {
        texts.iter().map(|t| self.transform_one(t.as_ref())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<String> {
        vec![
            "Strong profit growth".to_string(),
            "Market crash fears".to_string(),
            "Stable outlook for the market".to_string(),
        ]
    }

    #[test]
    fn test_fit_builds_sorted_vocabulary_without_stop_words() {
        let fitted = TfIdfVectorizer::default().fit(&corpus()).unwrap();
        assert_eq!(
            fitted.vocabulary(),
            &["crash", "fears", "growth", "market", "outlook", "profit", "stable", "strong"]
        );
        assert_eq!(fitted.dim(), 8);
    }

    #[test]
    fn test_idf_is_lower_for_common_terms() {
        let fitted = TfIdfVectorizer::default().fit(&corpus()).unwrap();
        let market = fitted.vocabulary().iter().position(|t| t == "market").unwrap();
        let crash = fitted.vocabulary().iter().position(|t| t == "crash").unwrap();
        assert!(fitted.idf()[market] < fitted.idf()[crash]);
        // ln(4/3) + 1
        assert!((fitted.idf()[market] - ((4.0f64 / 3.0).ln() + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_max_features_keeps_most_frequent() {
        let config = VectorizerConfig {
            max_features: 1,
            ..Default::default()
        };
        let fitted = TfIdfVectorizer::new(config).fit(&corpus()).unwrap();
        assert_eq!(fitted.vocabulary(), &["market"]);
    }

    #[test]
    fn test_transform_is_l2_normalized() {
        let fitted = TfIdfVectorizer::default().fit(&corpus()).unwrap();
        let v = fitted.transform_one("strong market growth");
        assert_eq!(v.nnz(), 3);
        assert!((v.norm() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_unseen_text_yields_zero_vector_of_fixed_dim() {
        let fitted = TfIdfVectorizer::default().fit(&corpus()).unwrap();
        let v = fitted.transform_one("completely unrelated words here");
        assert_eq!(v.dim(), fitted.dim());
        assert!(v.is_zero());
        assert_eq!(v.to_dense(), vec![0.0; fitted.dim()]);
    }

    #[test]
    fn test_fit_is_idempotent() {
        let vectorizer = TfIdfVectorizer::default();
        let a = vectorizer.fit(&corpus()).unwrap();
        let b = vectorizer.fit(&corpus()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_fit_rejects_stop_word_only_corpus() {
        let result = TfIdfVectorizer::default().fit(&["the and of", "is it"]);
        assert!(matches!(result, Err(Error::Training(_))));
    }

    #[test]
    fn test_state_survives_serialization() {
        let fitted = TfIdfVectorizer::default().fit(&corpus()).unwrap();
        let json = serde_json::to_string(&fitted).unwrap();
        let restored: FittedVectorizer = serde_json::from_str(&json).unwrap();
        assert_eq!(fitted, restored);
        assert_eq!(
            fitted.transform_one("profit fears"),
            restored.transform_one("profit fears")
        );
    }

    #[test]
    fn test_inconsistent_state_is_rejected() {
        let json = r#"{"config":{"max_features":10,"stop_words":true},"terms":["a","b"],"idf":[1.0]}"#;
        assert!(serde_json::from_str::<FittedVectorizer>(json).is_err());
    }

    #[test]
    fn test_feature_vector_from_entries() {
        let v = FeatureVector::from_entries(4, vec![(3, 2.0), (1, 0.0), (0, 1.0)]).unwrap();
        assert_eq!(v.nnz(), 2);
        assert_eq!(v.get(3), 2.0);
        assert_eq!(v.dot(&[1.0, 1.0, 1.0, 0.5]), 2.0);
        assert!(FeatureVector::from_entries(2, vec![(2, 1.0)]).is_err());
    }
}
