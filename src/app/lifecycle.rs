// SPDX-License-Identifier: MIT

//! Session lifecycle - load state before a unit of work, save it after
//!
//! `before` fetches the thread's metadata and decodes it into the state type
//! (or starts from `S::default()` when nothing is stored). `after` flushes
//! staged changes, encodes the state and replaces the thread's metadata.
//!
//! There is no locking across units of work: two runs against the same
//! thread race, and the later `after` wins.

use async_trait::async_trait;
use std::error::Error;
use std::marker::PhantomData;
use std::sync::Arc;

use super::working::WorkingState;
use crate::error::StateError;
use crate::state::{FlatMap, StateModel};
use crate::thread::{Thread, ThreadStore};

/// Context of one unit of work, supplied by the execution engine
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub thread_id: Option<String>,
}

impl RunContext {
    pub fn for_thread(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: Some(thread_id.into()),
        }
    }
}

/// Work executed between the lifecycle hooks
#[async_trait]
pub trait UnitOfWork<S: StateModel>: Send + Sync {
    /// Returns the name used in logs
    fn name(&self) -> &str;

    /// Run with mutable access to the thread's state
    async fn run(
        &self,
        input: String,
        state: &mut WorkingState<S>,
    ) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// Binds a state type to a thread store
pub struct Application<S: StateModel> {
    name: String,
    store: Arc<dyn ThreadStore>,
    _state: PhantomData<fn() -> S>,
}

impl<S: StateModel> Application<S> {
    pub fn new(name: impl Into<String>, store: Arc<dyn ThreadStore>) -> Self {
        Self {
            name: name.into(),
            store,
            _state: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create an empty thread for this application
    pub async fn create_thread(&self) -> Result<Thread, StateError> {
        let thread = self.store.create(FlatMap::new()).await?;
        log::info!("{}: created thread {}", self.name, thread.id);
        Ok(thread)
    }

    /// Load the stored state of a thread, or the default state when the
    /// thread has no metadata
    pub async fn load(&self, thread_id: &str) -> Result<S, StateError> {
        S::schema().validate()?;

        let metadata = self.store.fetch(thread_id).await?;
        if metadata.is_empty() {
            log::info!(
                "{}: no stored state for thread {}, creating new state",
                self.name,
                thread_id
            );
            return Ok(S::default());
        }

        log::debug!("{}: thread {} metadata: {:?}", self.name, thread_id, metadata);
        S::from_flat_map(&metadata)
    }

    /// Hook run before the unit of work
    pub async fn before(&self, run: &RunContext) -> Result<WorkingState<S>, StateError> {
        let thread_id = Self::thread_id(run)?;
        log::info!("{}: loading state for thread {}", self.name, thread_id);

        let state = self.load(thread_id).await?;
        Ok(WorkingState::new(state))
    }

    /// Hook run after the unit of work; returns the metadata confirmed by the store
    pub async fn after(
        &self,
        run: &RunContext,
        mut state: WorkingState<S>,
    ) -> Result<FlatMap, StateError> {
        let thread_id = Self::thread_id(run)?;
        state.flush_changes();

        let metadata = state.value().to_flat_map()?;
        let stored = self.store.update(thread_id, metadata).await?;
        log::info!(
            "{}: saved {} fields to thread {}",
            self.name,
            stored.len(),
            thread_id
        );
        Ok(stored)
    }

    /// Run a unit of work between the hooks.
    ///
    /// A failed unit of work skips `after`, so nothing is persisted.
    pub async fn run(
        &self,
        run: &RunContext,
        input: String,
        work: &dyn UnitOfWork<S>,
    ) -> Result<String, StateError> {
        let mut state = self.before(run).await?;

        let output = match work.run(input, &mut state).await {
            Ok(output) => output,
            Err(e) => {
                log::error!("{}: unit of work {} failed: {}", self.name, work.name(), e);
                return Err(StateError::Work(e.to_string()));
            }
        };

        self.after(run, state).await?;
        Ok(output)
    }

    fn thread_id(run: &RunContext) -> Result<&str, StateError> {
        run.thread_id
            .as_deref()
            .ok_or_else(|| StateError::config("thread id is required to load or save state"))
    }
}
