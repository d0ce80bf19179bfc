//! Frozen model artifacts and their process-wide cache.
//!
//! An [`ArtifactBundle`] is immutable once built. [`ArtifactCache`] hands the
//! same `Arc` to every caller: reads are a lock-free snapshot load, and only
//! the (re)load path takes an async mutex, so concurrent first requests
//! trigger exactly one load.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::ForecastError;
use crate::model::{OnnxModel, SequenceModel};
use crate::scaler::Scaler;
use crate::sequence::FeatureSchema;

/// Model, scaler and feature schema loaded together.
pub struct ArtifactBundle {
    pub model: Arc<dyn SequenceModel>,
    pub scaler: Scaler,
    pub schema: FeatureSchema,
}

impl ArtifactBundle {
    /// Assemble a bundle, rejecting a scaler that does not cover the schema.
    pub fn new(
        model: Arc<dyn SequenceModel>,
        scaler: Scaler,
        schema: FeatureSchema,
    ) -> Result<Self, ForecastError> {
        scaler.validate().map_err(ForecastError::ArtifactUnavailable)?;
        if scaler.width() != schema.len() {
            return Err(ForecastError::ArtifactUnavailable(format!(
                "scaler was fitted on {} columns but the feature list has {}",
                scaler.width(),
                schema.len()
            )));
        }
        Ok(Self {
            model,
            scaler,
            schema,
        })
    }
}

impl std::fmt::Debug for ArtifactBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactBundle")
            .field("model", &self.model.name())
            .field("scaler", &self.scaler)
            .field("schema", &self.schema)
            .finish()
    }
}

/// On-disk layout of the preprocessor artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessorFile {
    pub scaler: Scaler,
    pub feature_columns: Vec<String>,
}

/// Read the scaler and feature schema from a preprocessor JSON file.
///
/// Unknown feature names surface as `SchemaMismatch`; unreadable or malformed
/// files as `ArtifactUnavailable`.
pub fn load_preprocessor(path: &Path) -> Result<(Scaler, FeatureSchema), ForecastError> {
    let parsed = read_preprocessor(path)
        .map_err(|e| ForecastError::ArtifactUnavailable(format!("{e:#}")))?;
    let schema = FeatureSchema::from_names(&parsed.feature_columns)?;
    Ok((parsed.scaler, schema))
}

fn read_preprocessor(path: &Path) -> anyhow::Result<PreprocessorFile> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("preprocessor not found at {}", path.display()))?;
    let parsed = serde_json::from_str(&raw)
        .with_context(|| format!("preprocessor at {} is malformed", path.display()))?;
    Ok(parsed)
}

/// Source of artifact bundles.
pub trait ArtifactLoader: Send + Sync + 'static {
    fn load(&self) -> Result<ArtifactBundle, ForecastError>;
}

/// Configured filesystem locations of the artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub model_path: PathBuf,
    pub preprocessor_path: PathBuf,
}

impl ArtifactPaths {
    /// Default artifact file names inside `data_dir`.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self {
            model_path: data_dir.join("lstm_stock_model.onnx"),
            preprocessor_path: data_dir.join("preprocessor.json"),
        }
    }
}

/// Loads the ONNX model and preprocessor JSON from disk.
#[derive(Debug, Clone)]
pub struct FsArtifactLoader {
    paths: ArtifactPaths,
}

impl FsArtifactLoader {
    /// Loader reading from the given paths.
    pub fn new(paths: ArtifactPaths) -> Self {
        Self { paths }
    }
}

impl ArtifactLoader for FsArtifactLoader {
    fn load(&self) -> Result<ArtifactBundle, ForecastError> {
        let model_path = &self.paths.model_path;
        if !model_path.exists() {
            return Err(ForecastError::ArtifactUnavailable(format!(
                "model not found at {}",
                model_path.display()
            )));
        }
        let (scaler, schema) = load_preprocessor(&self.paths.preprocessor_path)?;
        let model = OnnxModel::load(model_path)
            .map_err(|e| ForecastError::ArtifactUnavailable(format!("{e:#}")))?;

        tracing::info!(
            model = %model_path.display(),
            features = schema.len(),
            "loaded model artifacts"
        );
        ArtifactBundle::new(Arc::new(model), scaler, schema)
    }
}

/// Load-once holder for the artifact bundle.
pub struct ArtifactCache {
    loader: Arc<dyn ArtifactLoader>,
    slot: ArcSwapOption<ArtifactBundle>,
    load_guard: Mutex<()>,
}

impl ArtifactCache {
    /// Empty cache; the first [`ArtifactCache::get_or_load`] call loads.
    pub fn new(loader: Arc<dyn ArtifactLoader>) -> Self {
        Self {
            loader,
            slot: ArcSwapOption::empty(),
            load_guard: Mutex::new(()),
        }
    }

    /// Cache that starts with a resident bundle.
    pub fn with_bundle(loader: Arc<dyn ArtifactLoader>, bundle: ArtifactBundle) -> Self {
        let cache = Self::new(loader);
        cache.slot.store(Some(Arc::new(bundle)));
        cache
    }

    /// Resident bundle, if any. Never loads.
    pub fn current(&self) -> Option<Arc<ArtifactBundle>> {
        self.slot.load_full()
    }

    /// Resident bundle, loading it first if absent.
    ///
    /// Concurrent callers wait on the same load and receive the same `Arc`.
    /// A failed load leaves the cache empty so a later call retries.
    pub async fn get_or_load(&self) -> Result<Arc<ArtifactBundle>, ForecastError> {
        if let Some(bundle) = self.slot.load_full() {
            return Ok(bundle);
        }

        let _guard = self.load_guard.lock().await;
        if let Some(bundle) = self.slot.load_full() {
            return Ok(bundle);
        }
        self.load_into_slot().await
    }

    /// Replace the resident bundle with a freshly loaded one.
    ///
    /// On failure the previous bundle stays resident.
    pub async fn reload(&self) -> Result<Arc<ArtifactBundle>, ForecastError> {
        let _guard = self.load_guard.lock().await;
        self.load_into_slot().await
    }

    async fn load_into_slot(&self) -> Result<Arc<ArtifactBundle>, ForecastError> {
        let loader = Arc::clone(&self.loader);
        let bundle = tokio::task::spawn_blocking(move || loader.load())
            .await
            .map_err(|e| ForecastError::ArtifactUnavailable(format!("artifact load task failed: {e}")))??;

        let bundle = Arc::new(bundle);
        self.slot.store(Some(Arc::clone(&bundle)));
        Ok(bundle)
    }
}
