// src/classifier/train.rs
//! Offline fitting of the TF-IDF + multinomial Naive Bayes pipeline.
//! Used by the `train-models` binary and by tests that need real artifacts.

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::Path;

use super::pipeline::{analyze_terms, l2_normalize, PipelineArtifact, TextPipeline};
use super::Task;

/// Common English function words removed before n-gram extraction.
pub const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "either",
    "else", "etc", "even", "ever", "every", "few", "for", "from", "further", "had", "has", "have",
    "having", "he", "her", "here", "hers", "herself", "him", "himself", "his", "how", "however",
    "if", "in", "into", "is", "it", "its", "itself", "just", "may", "me", "might", "more", "most",
    "must", "my", "myself", "neither", "nor", "of", "off", "on", "once", "only", "or", "other",
    "our", "ours", "ourselves", "out", "over", "own", "per", "same", "she", "should", "since",
    "so", "some", "such", "than", "that", "the", "their", "theirs", "them", "themselves", "then",
    "there", "these", "they", "this", "those", "through", "thus", "to", "too", "under", "until",
    "up", "upon", "us", "very", "via", "was", "we", "were", "what", "when", "where", "whether",
    "which", "while", "who", "whom", "whose", "why", "will", "with", "within", "would", "yet",
    "you", "your", "yours", "yourself", "yourselves",
];

#[derive(Debug, Clone)]
pub struct FitOptions {
    /// Additive (Laplace/Lidstone) smoothing.
    pub alpha: f64,
    pub ngram_range: (usize, usize),
    pub stop_words: Vec<String>,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            ngram_range: (1, 1),
            stop_words: Vec::new(),
        }
    }
}

impl FitOptions {
    /// Settings the service's shipped models are trained with.
    pub fn for_task(task: Task) -> Self {
        let alpha = match task {
            Task::Category | Task::Department => 0.1,
            Task::Priority | Task::Type => 0.5,
        };
        Self {
            alpha,
            ngram_range: (1, 2),
            stop_words: ENGLISH_STOP_WORDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

pub fn fit(task: Task, docs: &[&str], labels: &[&str], opts: &FitOptions) -> Result<TextPipeline> {
    if docs.len() != labels.len() {
        bail!("{} documents but {} labels", docs.len(), labels.len());
    }
    if docs.is_empty() {
        bail!("cannot fit {task} model on an empty corpus");
    }
    if opts.alpha <= 0.0 {
        bail!("alpha must be positive, got {}", opts.alpha);
    }

    let stop: HashSet<String> = opts.stop_words.iter().cloned().collect();
    let analyzed: Vec<Vec<String>> = docs
        .iter()
        .map(|d| analyze_terms(d, &stop, opts.ngram_range))
        .collect();

    // Columns in lexical order, document frequency per column.
    let terms: BTreeSet<&str> = analyzed.iter().flatten().map(String::as_str).collect();
    let vocabulary: HashMap<String, usize> = terms
        .iter()
        .enumerate()
        .map(|(i, t)| (t.to_string(), i))
        .collect();
    let n_features = vocabulary.len();
    let mut df = vec![0usize; n_features];
    for doc in &analyzed {
        let seen: HashSet<usize> = doc.iter().map(|t| vocabulary[t]).collect();
        for col in seen {
            df[col] += 1;
        }
    }
    let n = docs.len() as f64;
    let idf: Vec<f64> = df
        .iter()
        .map(|&d| ((1.0 + n) / (1.0 + d as f64)).ln() + 1.0)
        .collect();

    let classes: Vec<String> = labels
        .iter()
        .map(|l| l.to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let class_idx: HashMap<&str, usize> = classes
        .iter()
        .enumerate()
        .map(|(i, c)| (c.as_str(), i))
        .collect();

    let mut feature_count = vec![vec![0.0f64; n_features]; classes.len()];
    let mut class_count = vec![0usize; classes.len()];
    for (doc, label) in analyzed.iter().zip(labels) {
        let c = class_idx[label];
        class_count[c] += 1;

        let mut tf: BTreeMap<usize, f64> = BTreeMap::new();
        for t in doc {
            *tf.entry(vocabulary[t]).or_insert(0.0) += 1.0;
        }
        let mut row: Vec<(usize, f64)> = tf.into_iter().map(|(col, x)| (col, x * idf[col])).collect();
        l2_normalize(&mut row);
        for (col, x) in row {
            feature_count[c][col] += x;
        }
    }

    let feature_log_prob = feature_count
        .into_iter()
        .map(|row| {
            let smoothed: Vec<f64> = row.into_iter().map(|x| x + opts.alpha).collect();
            let total: f64 = smoothed.iter().sum();
            smoothed.into_iter().map(|x| (x / total).ln()).collect()
        })
        .collect();
    let class_log_prior = class_count.iter().map(|&k| (k as f64 / n).ln()).collect();

    TextPipeline::try_from(PipelineArtifact {
        task: task.as_str().to_string(),
        vocabulary,
        idf,
        ngram_range: opts.ngram_range,
        stop_words: opts.stop_words.clone(),
        classes,
        class_log_prior,
        feature_log_prob,
    })
    .map_err(|e| anyhow!("fitted {task} model is inconsistent: {e}"))
}

/// Write `pipeline` to `<dir>/<task>_model.json` via a temp file + rename.
pub fn write_artifact(dir: &Path, task: Task, pipeline: &TextPipeline) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = task.artifact_path(dir);
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_vec(pipeline)?;
    fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, &path).with_context(|| format!("renaming into {}", path.display()))?;
    Ok(())
}

/// One labelled row of the training dataset.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingSample {
    pub complaint_text: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    #[serde(rename = "type")]
    pub complaint_type: Option<String>,
    pub department: Option<String>,
}

impl TrainingSample {
    fn label(&self, task: Task) -> Option<&str> {
        let v = match task {
            Task::Category => &self.category,
            Task::Priority => &self.priority,
            Task::Type => &self.complaint_type,
            Task::Department => &self.department,
        };
        v.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// Fit and write all four artifacts. Rows missing the text or any label are
/// skipped so every model sees the same corpus. Returns the number of rows used.
pub fn train_all(samples: &[TrainingSample], models_dir: &Path) -> Result<usize> {
    let usable: Vec<&TrainingSample> = samples
        .iter()
        .filter(|s| s.complaint_text.as_deref().is_some_and(|t| !t.trim().is_empty()))
        .filter(|s| Task::ALL.iter().all(|&t| s.label(t).is_some()))
        .collect();
    if usable.is_empty() {
        bail!("no usable training rows out of {}", samples.len());
    }
    let docs: Vec<&str> = usable
        .iter()
        .filter_map(|s| s.complaint_text.as_deref())
        .collect();

    for task in Task::ALL {
        let labels: Vec<&str> = usable.iter().filter_map(|s| s.label(task)).collect();
        let pipeline = fit(task, &docs, &labels, &FitOptions::for_task(task))?;
        write_artifact(models_dir, task, &pipeline)?;
    }
    Ok(usable.len())
}
