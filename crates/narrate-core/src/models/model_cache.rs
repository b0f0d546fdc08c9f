// Lazily constructed, single-instance holder for the shared model

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{ModelHandle, SpeechBackend};
use crate::error::{NarrateError, NarrateResult};

/// Holds at most one loaded model for the lifetime of the engine
///
/// The first successful [`get`](Self::get) wins; later calls return the same
/// handle whatever paths they pass. A failed construction leaves the slot empty.
pub struct ModelCache<B: SpeechBackend> {
    backend: Arc<B>,
    slot: Mutex<Option<ModelHandle<B>>>,
}

impl<B: SpeechBackend> ModelCache<B> {
    /// Create an empty cache
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            slot: Mutex::new(None),
        }
    }

    /// Return the shared model, constructing it on first use
    ///
    /// # Errors
    ///
    /// Returns `ModelConstruction` if the backend fails to load the model.
    pub fn get(&self, config_path: &Path, weights_path: &Path) -> NarrateResult<ModelHandle<B>> {
        let mut slot = self.slot.lock();
        if let Some(model) = slot.as_ref() {
            return Ok(Arc::clone(model));
        }

        tracing::info!("Loading model from {:?} with config {:?}", weights_path, config_path);
        let model = self
            .backend
            .load_model(config_path, weights_path)
            .map_err(|e| match e {
                NarrateError::ModelConstruction { .. } => e,
                other => NarrateError::model_construction(other.to_string()),
            })?;

        let model = Arc::new(model);
        *slot = Some(Arc::clone(&model));
        tracing::info!("Model loaded");
        Ok(model)
    }

    /// The loaded model, if any, without constructing it
    #[must_use]
    pub fn loaded(&self) -> Option<ModelHandle<B>> {
        self.slot.lock().clone()
    }

    /// Check if the model has been constructed
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.slot.lock().is_some()
    }
}
