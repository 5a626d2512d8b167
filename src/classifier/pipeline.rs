// src/classifier/pipeline.rs
//! Runtime half of a fitted TF-IDF + multinomial Naive Bayes text pipeline.
//!
//! The on-disk form is [`PipelineArtifact`]; it is checked for internal
//! consistency when converted into a [`TextPipeline`], so a loaded pipeline
//! never fails at prediction time.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::TextClassifier;

/// Words of two or more characters, Unicode-aware.
static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?u)\b\w\w+\b").expect("token regex"));

/// Longest n-gram an artifact may ask for. Bounds per-text work at predict time.
pub const MAX_NGRAM: usize = 5;

/// Serialized artifact, exactly as written by the trainer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineArtifact {
    pub task: String,
    pub vocabulary: HashMap<String, usize>,
    pub idf: Vec<f64>,
    pub ngram_range: (usize, usize),
    #[serde(default)]
    pub stop_words: Vec<String>,
    pub classes: Vec<String>,
    pub class_log_prior: Vec<f64>,
    pub feature_log_prob: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "PipelineArtifact", into = "PipelineArtifact")]
pub struct TextPipeline {
    artifact: PipelineArtifact,
    stop_words: HashSet<String>,
}

impl TryFrom<PipelineArtifact> for TextPipeline {
    type Error = String;

    fn try_from(a: PipelineArtifact) -> Result<Self, Self::Error> {
        let n_features = a.idf.len();
        if a.classes.is_empty() {
            return Err("artifact has no classes".into());
        }
        if a.class_log_prior.len() != a.classes.len() || a.feature_log_prob.len() != a.classes.len() {
            return Err(format!(
                "class dimension mismatch: {} classes, {} priors, {} rows",
                a.classes.len(),
                a.class_log_prior.len(),
                a.feature_log_prob.len()
            ));
        }
        if let Some(row) = a.feature_log_prob.iter().find(|r| r.len() != n_features) {
            return Err(format!(
                "feature dimension mismatch: idf has {n_features} columns, row has {}",
                row.len()
            ));
        }
        if let Some((term, idx)) = a.vocabulary.iter().find(|(_, i)| **i >= n_features) {
            return Err(format!("vocabulary term `{term}` points past column {n_features} ({idx})"));
        }
        let (lo, hi) = a.ngram_range;
        if lo == 0 || lo > hi || hi > MAX_NGRAM {
            return Err(format!("invalid ngram range ({lo}, {hi})"));
        }

        let stop_words = a.stop_words.iter().cloned().collect();
        Ok(Self {
            artifact: a,
            stop_words,
        })
    }
}

impl From<TextPipeline> for PipelineArtifact {
    fn from(p: TextPipeline) -> Self {
        p.artifact
    }
}

impl TextPipeline {
    pub fn classes(&self) -> &[String] {
        &self.artifact.classes
    }

    pub fn vocabulary_len(&self) -> usize {
        self.artifact.idf.len()
    }

    /// Sparse, L2-normalised TF-IDF row for `text`.
    pub fn transform(&self, text: &str) -> Vec<(usize, f64)> {
        let terms = analyze_terms(text, &self.stop_words, self.artifact.ngram_range);
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for t in &terms {
            if let Some(&col) = self.artifact.vocabulary.get(t) {
                *counts.entry(col).or_insert(0.0) += 1.0;
            }
        }
        let mut row: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(col, tf)| (col, tf * self.artifact.idf[col]))
            .collect();
        row.sort_unstable_by_key(|(col, _)| *col);
        l2_normalize(&mut row);
        row
    }

    pub fn joint_log_likelihood(&self, text: &str) -> Vec<f64> {
        let row = self.transform(text);
        self.artifact
            .class_log_prior
            .iter()
            .zip(&self.artifact.feature_log_prob)
            .map(|(prior, flp)| prior + row.iter().map(|&(col, x)| x * flp[col]).sum::<f64>())
            .collect()
    }

    /// Index of the most likely class; ties resolve to the lowest index.
    fn predict_index(&self, text: &str) -> usize {
        argmax(&self.joint_log_likelihood(text))
    }

    pub fn predict(&self, text: &str) -> &str {
        &self.artifact.classes[self.predict_index(text)]
    }

    /// Posterior distribution over `classes()`, same order.
    pub fn predict_proba(&self, text: &str) -> Vec<f64> {
        softmax(&self.joint_log_likelihood(text))
    }
}

impl TextClassifier for TextPipeline {
    fn classify(&self, text: &str) -> String {
        self.predict(text).to_string()
    }

    fn score(&self, text: &str) -> Vec<(String, f64)> {
        self.artifact
            .classes
            .iter()
            .cloned()
            .zip(self.predict_proba(text))
            .collect()
    }
}

/// Lowercase, tokenize, drop stop words, then emit word n-grams in `range`.
pub fn analyze_terms(text: &str, stop_words: &HashSet<String>, range: (usize, usize)) -> Vec<String> {
    let lowered = text.to_lowercase();
    let tokens: Vec<&str> = TOKEN_RE
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|t| !stop_words.contains(*t))
        .collect();

    let (lo, hi) = range;
    let mut out = Vec::new();
    for n in lo..=hi {
        if n == 0 || n > tokens.len() {
            continue;
        }
        for w in tokens.windows(n) {
            out.push(w.join(" "));
        }
    }
    out
}

pub(crate) fn l2_normalize(row: &mut [(usize, f64)]) {
    let norm = row.iter().map(|(_, x)| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        for (_, x) in row.iter_mut() {
            *x /= norm;
        }
    }
}

fn argmax(v: &[f64]) -> usize {
    let mut best = 0;
    for (i, x) in v.iter().enumerate() {
        if *x > v[best] {
            best = i;
        }
    }
    best
}

fn softmax(jll: &[f64]) -> Vec<f64> {
    let max = jll.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = jll.iter().map(|x| (x - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
