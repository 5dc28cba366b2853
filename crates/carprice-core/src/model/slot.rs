//! Process-lifetime model slot
//!
//! Readers take lock-free snapshots of the current handle through `ArcSwap`;
//! loads and reloads are serialised by a write lock and publish a complete new
//! state with a single pointer swap. A failed reload keeps the previous handle.

use arc_swap::ArcSwap;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

use super::handle::ModelHandle;
use crate::error::LoadError;
use crate::schema::FeatureSchema;

#[derive(Debug, Default)]
struct SlotState {
    handle: Option<Arc<ModelHandle>>,
    source_path: Option<PathBuf>,
    last_error: Option<&'static str>,
    generation: u64,
}

/// Snapshot of the slot for health reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotStatus {
    pub loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
    /// Kind of the most recent load failure, see [`LoadError::kind`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<&'static str>,
    /// Number of handles published so far
    pub generation: u64,
}

pub struct ModelSlot {
    schema: Arc<FeatureSchema>,
    state: ArcSwap<SlotState>,
    write_lock: Mutex<()>,
}

impl ModelSlot {
    /// Create a slot with nothing loaded
    pub fn empty(schema: Arc<FeatureSchema>) -> Self {
        Self {
            schema,
            state: ArcSwap::from_pointee(SlotState::default()),
            write_lock: Mutex::new(()),
        }
    }

    /// Create a slot and attempt the startup load from `path`
    ///
    /// A failed load leaves the slot empty with the error recorded; the path is
    /// remembered so a later [`reload`](Self::reload) can retry it.
    pub fn with_path(schema: Arc<FeatureSchema>, path: impl Into<PathBuf>) -> Self {
        let slot = Self::empty(schema);
        let path = path.into();
        // failure is logged by reload_from and recorded in the status
        let _ = slot.reload_from(&path);
        slot
    }

    pub fn schema(&self) -> &Arc<FeatureSchema> {
        &self.schema
    }

    /// Current handle, if any
    pub fn current(&self) -> Option<Arc<ModelHandle>> {
        self.state.load().handle.clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.state.load().handle.is_some()
    }

    pub fn status(&self) -> SlotStatus {
        let state = self.state.load();
        SlotStatus {
            loaded: state.handle.is_some(),
            source_path: state
                .source_path
                .as_ref()
                .map(|p| p.display().to_string()),
            last_error: state.last_error,
            generation: state.generation,
        }
    }

    /// Reload from the remembered source path
    pub fn reload(&self) -> Result<Arc<ModelHandle>, LoadError> {
        let path = self
            .state
            .load()
            .source_path
            .clone()
            .ok_or(LoadError::NoSource)?;
        self.reload_from(&path)
    }

    /// Load `path` and publish it, or keep the current handle on failure
    pub fn reload_from(&self, path: &Path) -> Result<Arc<ModelHandle>, LoadError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let previous = self.state.load_full();

        match ModelHandle::load(path, &self.schema) {
            Ok(handle) => {
                let handle = Arc::new(handle);
                self.state.store(Arc::new(SlotState {
                    handle: Some(Arc::clone(&handle)),
                    source_path: Some(path.to_path_buf()),
                    last_error: None,
                    generation: previous.generation + 1,
                }));
                info!(
                    model_path = %path.display(),
                    generation = previous.generation + 1,
                    "Model published"
                );
                Ok(handle)
            }
            Err(err) => {
                if previous.handle.is_some() {
                    warn!(model_path = %path.display(), error = %err, "Model reload failed; keeping previous model");
                } else {
                    error!(model_path = %path.display(), error = %err, "Model load failed; no model is being served");
                }
                self.state.store(Arc::new(SlotState {
                    handle: previous.handle.clone(),
                    source_path: previous
                        .source_path
                        .clone()
                        .or_else(|| Some(path.to_path_buf())),
                    last_error: Some(err.kind()),
                    generation: previous.generation,
                }));
                Err(err)
            }
        }
    }

    /// Publish an already built handle
    pub fn install(&self, handle: ModelHandle) -> Arc<ModelHandle> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let previous = self.state.load_full();
        let handle = Arc::new(handle);
        self.state.store(Arc::new(SlotState {
            handle: Some(Arc::clone(&handle)),
            source_path: previous.source_path.clone(),
            last_error: None,
            generation: previous.generation + 1,
        }));
        handle
    }
}

impl std::fmt::Debug for ModelSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSlot")
            .field("status", &self.status())
            .finish()
    }
}
