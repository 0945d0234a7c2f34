//! In-memory ordered step collection.
//!
//! The store is the single source of truth for step identity and ordering
//! while a session is open. Every structural operation validates its input
//! before touching the vector, so a failed call leaves the store exactly as
//! it was and positions always cover `0..len` with no gaps.

use chrono::{DateTime, Utc};
use std::path::PathBuf;

use super::models::{CaptureRegion, Manifest, SessionMeta, Step, StepId, MANIFEST_VERSION};
use crate::error::{Result, SessionError};

/// Immutable, ordered copy of the store contents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    steps: Vec<Step>,
}

impl Snapshot {
    /// Steps in position order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, id: StepId) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn into_steps(self) -> Vec<Step> {
        self.steps
    }
}

/// Ordered, mutable collection of steps for one session.
#[derive(Debug, Clone)]
pub struct StepStore {
    steps: Vec<Step>,
    next_id: u64,
}

impl Default for StepStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StepStore {
    /// Creates an empty store whose first id will be 1.
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            next_id: 1,
        }
    }

    /// Rebuilds a store from a manifest whose ordering was already validated.
    ///
    /// Positions are rewritten from vector order and the id counter is
    /// moved past every id in use.
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let max_id = manifest.steps.iter().map(|s| s.id.0).max().unwrap_or(0);
        let mut store = Self {
            steps: manifest.steps.clone(),
            next_id: manifest.next_step_id.max(max_id.saturating_add(1)),
        };
        store.reindex(0);
        store
    }

    /// Produces the persisted form of the current state.
    pub fn to_manifest(&self, session: &SessionMeta) -> Manifest {
        Manifest {
            version: MANIFEST_VERSION,
            session: session.clone(),
            next_step_id: self.next_id,
            steps: self.steps.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The id the next allocation will return.
    pub fn next_id(&self) -> StepId {
        StepId(self.next_id)
    }

    /// Hands out a fresh id. Ids are never reused, even if the capture that
    /// requested one fails before the step is inserted.
    ///
    /// `u64::MAX` is never handed out, so the counter can always move past
    /// the last allocated id.
    pub fn allocate_id(&mut self) -> Result<StepId> {
        let next = self
            .next_id
            .checked_add(1)
            .ok_or(SessionError::IdsExhausted)?;
        let id = StepId(self.next_id);
        self.next_id = next;
        Ok(id)
    }

    /// Ensures future allocations start after `id`.
    ///
    /// Returns `false` if `id` is too large to move past; the counter is left
    /// untouched in that case.
    pub fn reserve_through(&mut self, id: StepId) -> bool {
        match id.0.checked_add(1) {
            Some(next) => {
                self.next_id = self.next_id.max(next);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: StepId) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    fn index_of(&self, id: StepId) -> Result<usize> {
        self.steps
            .iter()
            .position(|s| s.id == id)
            .ok_or(SessionError::NotFound(id))
    }

    /// Appends a new step at the end of the ordering with the default title.
    ///
    /// # Errors
    ///
    /// `DuplicateStep` if the id is already in use, `IdsExhausted` if the
    /// counter could not be moved past it. The store is unchanged on error.
    pub fn insert_end(
        &mut self,
        id: StepId,
        timestamp: DateTime<Utc>,
        asset_path: PathBuf,
        region: CaptureRegion,
    ) -> Result<&Step> {
        if self.get(id).is_some() {
            return Err(SessionError::DuplicateStep(id));
        }
        if !self.reserve_through(id) {
            return Err(SessionError::IdsExhausted);
        }

        let position = self.steps.len();
        self.steps.push(Step {
            id,
            position,
            title: Step::default_title(position),
            notes: String::new(),
            expected: String::new(),
            actual: String::new(),
            timestamp,
            asset_path,
            region,
            missing_asset: false,
        });
        Ok(&self.steps[position])
    }

    /// Moves a step to `position`, shifting the steps in between.
    ///
    /// Returns `Ok(false)` when the step is already there.
    pub fn move_to(&mut self, id: StepId, position: usize) -> Result<bool> {
        let len = self.steps.len();
        let from = self.index_of(id)?;
        if position >= len {
            return Err(SessionError::InvalidPosition { position, len });
        }
        if from == position {
            return Ok(false);
        }

        let step = self.steps.remove(from);
        self.steps.insert(position, step);
        self.reindex(from.min(position));
        Ok(true)
    }

    pub fn rename(&mut self, id: StepId, title: impl Into<String>) -> Result<()> {
        let index = self.index_of(id)?;
        self.steps[index].title = title.into();
        Ok(())
    }

    pub fn set_notes(&mut self, id: StepId, notes: impl Into<String>) -> Result<()> {
        let index = self.index_of(id)?;
        self.steps[index].notes = notes.into();
        Ok(())
    }

    /// Records the expected and actual outcome of a step. `None` leaves that
    /// field as it is.
    pub fn set_results(
        &mut self,
        id: StepId,
        expected: Option<String>,
        actual: Option<String>,
    ) -> Result<()> {
        let index = self.index_of(id)?;
        let step = &mut self.steps[index];
        if let Some(expected) = expected {
            step.expected = expected;
        }
        if let Some(actual) = actual {
            step.actual = actual;
        }
        Ok(())
    }

    pub fn set_missing_asset(&mut self, id: StepId, missing: bool) -> Result<()> {
        let index = self.index_of(id)?;
        self.steps[index].missing_asset = missing;
        Ok(())
    }

    /// Removes a step and compacts the positions after it.
    pub fn delete(&mut self, id: StepId) -> Result<Step> {
        let index = self.index_of(id)?;
        let removed = self.steps.remove(index);
        self.reindex(index);
        Ok(removed)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            steps: self.steps.clone(),
        }
    }

    fn reindex(&mut self, from: usize) {
        for (i, step) in self.steps.iter_mut().enumerate().skip(from) {
            step.position = i;
        }
    }
}
