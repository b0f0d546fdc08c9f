//! Pool of ONNX sessions over one model file
//! Lets several voices run inference at once without sharing a session

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use parking_lot::Mutex;

use crate::error::{NarrateError, NarrateResult};

/// Round-robin pool of identical sessions
#[derive(Debug)]
pub struct SessionPool {
    sessions: Vec<Mutex<Session>>,
    next: AtomicUsize,
}

impl SessionPool {
    /// Build `size` sessions from `model_path`
    ///
    /// # Errors
    ///
    /// Returns a model construction error if any session fails to build.
    pub fn load(model_path: &Path, size: usize) -> NarrateResult<Self> {
        if size == 0 {
            return Err(NarrateError::model_construction("Pool size must be greater than 0"));
        }

        let threads = thread_config(size);
        tracing::info!(
            "Creating {} ONNX session(s) for {:?} with {} intra-op threads each",
            size,
            model_path,
            threads
        );

        let sessions = (0..size)
            .map(|i| {
                build_session(model_path, threads).map(Mutex::new).map_err(|e| {
                    NarrateError::model_construction(format!(
                        "session {} of {size}: {e}",
                        i + 1
                    ))
                })
            })
            .collect::<NarrateResult<Vec<_>>>()?;

        Ok(Self {
            sessions,
            next: AtomicUsize::new(0),
        })
    }

    /// Run `f` on a free session, waiting on the round-robin choice if all are busy
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `f`.
    pub fn with_session<R>(
        &self,
        f: impl FnOnce(&mut Session) -> NarrateResult<R>,
    ) -> NarrateResult<R> {
        let start = self.next.fetch_add(1, Ordering::Relaxed) % self.sessions.len();

        let free = (0..self.sessions.len())
            .map(|offset| (start + offset) % self.sessions.len())
            .find_map(|i| self.sessions[i].try_lock());

        match free {
            Some(mut session) => f(&mut session),
            None => f(&mut self.sessions[start].lock()),
        }
    }

    /// Number of sessions
    #[must_use]
    pub fn size(&self) -> usize {
        self.sessions.len()
    }
}

/// Split the physical cores across the pool, capped at 8 per session
fn thread_config(pool_size: usize) -> usize {
    (num_cpus::get_physical() / pool_size).clamp(1, 8)
}

fn build_session(model_path: &Path, intra_threads: usize) -> NarrateResult<Session> {
    Ok(Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(intra_threads)?
        .commit_from_file(model_path)?)
}
