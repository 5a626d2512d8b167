// src/classifier/mod.rs
//! Classifier artifact provider.
//!
//! Four independently fitted text classifiers (category, priority, type,
//! department) are read from `<models_dir>/<task>_model.json`. A successful
//! load is cached for the lifetime of the provider; a failed one is not, so
//! artifacts dropped in later are picked up by the next caller. Once loaded,
//! the set is immutable and shared behind an `Arc` without locking.

pub mod pipeline;
pub mod train;

use once_cell::sync::OnceCell;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub use pipeline::{PipelineArtifact, TextPipeline};

/// Anything that can label a text and report a distribution over its labels.
pub trait TextClassifier: Send + Sync {
    fn classify(&self, text: &str) -> String;
    /// `(label, probability)` pairs; probabilities sum to 1.
    fn score(&self, text: &str) -> Vec<(String, f64)>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    Category,
    Priority,
    Type,
    Department,
}

impl Task {
    pub const ALL: [Task; 4] = [Task::Category, Task::Priority, Task::Type, Task::Department];

    pub fn as_str(self) -> &'static str {
        match self {
            Task::Category => "category",
            Task::Priority => "priority",
            Task::Type => "type",
            Task::Department => "department",
        }
    }

    pub fn artifact_path(self, models_dir: &Path) -> PathBuf {
        models_dir.join(format!("{}_model.json", self.as_str()))
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("models directory {} not found", .0.display())]
    DirNotFound(PathBuf),
    #[error("{task} model not found at {}", path.display())]
    NotFound { task: Task, path: PathBuf },
    #[error("reading {task} model from {}: {source}", path.display())]
    Io {
        task: Task,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{task} model at {} is malformed: {source}", path.display())]
    Malformed {
        task: Task,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// The four loaded classifiers.
#[derive(Clone)]
pub struct ClassifierSet {
    pub category: Arc<dyn TextClassifier>,
    pub priority: Arc<dyn TextClassifier>,
    pub complaint_type: Arc<dyn TextClassifier>,
    pub department: Arc<dyn TextClassifier>,
}

impl fmt::Debug for ClassifierSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifierSet").finish_non_exhaustive()
    }
}

impl ClassifierSet {
    /// Read all four artifacts from `models_dir`.
    pub fn load_from_dir(models_dir: &Path) -> Result<Self, ArtifactError> {
        if !models_dir.is_dir() {
            return Err(ArtifactError::DirNotFound(models_dir.to_path_buf()));
        }
        Ok(Self {
            category: Arc::new(load_pipeline(Task::Category, models_dir)?),
            priority: Arc::new(load_pipeline(Task::Priority, models_dir)?),
            complaint_type: Arc::new(load_pipeline(Task::Type, models_dir)?),
            department: Arc::new(load_pipeline(Task::Department, models_dir)?),
        })
    }
}

/// Read and validate a single artifact.
pub fn load_pipeline(task: Task, models_dir: &Path) -> Result<TextPipeline, ArtifactError> {
    let path = task.artifact_path(models_dir);
    let raw = match fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ArtifactError::NotFound { task, path });
        }
        Err(source) => return Err(ArtifactError::Io { task, path, source }),
    };
    let pipeline: TextPipeline = serde_json::from_str(&raw)
        .map_err(|source| ArtifactError::Malformed {
            task,
            path: path.clone(),
            source,
        })?;
    info!(
        %task,
        path = %path.display(),
        classes = pipeline.classes().len(),
        features = pipeline.vocabulary_len(),
        "loaded classifier artifact"
    );
    Ok(pipeline)
}

/// Process-wide owner of the classifier set.
#[derive(Debug)]
pub struct ClassifierProvider {
    models_dir: PathBuf,
    loaded: OnceCell<Arc<ClassifierSet>>,
}

impl ClassifierProvider {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
            loaded: OnceCell::new(),
        }
    }

    /// Provider that already holds a set; never touches the filesystem.
    pub fn preloaded(set: ClassifierSet) -> Self {
        Self {
            models_dir: PathBuf::new(),
            loaded: OnceCell::with_value(Arc::new(set)),
        }
    }

    /// Return the cached set, loading it on first success.
    /// Concurrent first callers block on a single initialisation.
    pub fn load(&self) -> Result<Arc<ClassifierSet>, ArtifactError> {
        self.loaded
            .get_or_try_init(|| {
                ClassifierSet::load_from_dir(&self.models_dir)
                    .map(Arc::new)
                    .inspect_err(|e| warn!(error = %e, "classifier artifacts unavailable"))
            })
            .cloned()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.get().is_some()
    }
}
