//! In-memory power backend for tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{AssertionId, AssertionKind, PowerApi};
use crate::error::{Result, VigiloError};

/// `kIOReturnError`
const IO_RETURN_ERROR: i32 = 0xE00002BCu32 as i32;
/// `kIOReturnNotFound`
const IO_RETURN_NOT_FOUND: i32 = 0xE00002F0u32 as i32;

#[derive(Debug, Default)]
struct FakeState {
    next_id: u32,
    outstanding: BTreeMap<AssertionId, AssertionKind>,
    labels: Vec<String>,
    created: usize,
    released: Vec<AssertionId>,
    fail_create: Option<AssertionKind>,
    fail_release: bool,
}

/// Clones share state, so a test keeps one clone to inspect the backend
/// after handing another to the code under test.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakePower {
    state: Arc<Mutex<FakeState>>,
}

impl FakePower {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every creation of `kind` fail until cleared.
    pub fn fail_create(&self, kind: Option<AssertionKind>) {
        self.state.lock().fail_create = kind;
    }

    /// Make every release fail (the assertion still goes away, as if the
    /// process had lost it).
    pub fn fail_release(&self, fail: bool) {
        self.state.lock().fail_release = fail;
    }

    pub fn outstanding(&self) -> usize {
        self.state.lock().outstanding.len()
    }

    pub fn outstanding_kinds(&self) -> Vec<AssertionKind> {
        self.state.lock().outstanding.values().copied().collect()
    }

    pub fn created(&self) -> usize {
        self.state.lock().created
    }

    pub fn released(&self) -> Vec<AssertionId> {
        self.state.lock().released.clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.state.lock().labels.clone()
    }
}

impl PowerApi for FakePower {
    fn create_assertion(&mut self, kind: AssertionKind, label: &str) -> Result<AssertionId> {
        let mut state = self.state.lock();
        if state.fail_create == Some(kind) {
            return Err(VigiloError::Power {
                kind,
                code: IO_RETURN_ERROR,
            });
        }

        state.next_id += 1;
        let id = AssertionId::new(state.next_id).ok_or(VigiloError::Power {
            kind,
            code: IO_RETURN_ERROR,
        })?;
        state.outstanding.insert(id, kind);
        state.labels.push(label.to_string());
        state.created += 1;
        Ok(id)
    }

    fn release_assertion(&mut self, id: AssertionId) -> Result<()> {
        let mut state = self.state.lock();
        if state.outstanding.remove(&id).is_none() {
            return Err(VigiloError::Release {
                id,
                code: IO_RETURN_NOT_FOUND,
            });
        }
        state.released.push(id);
        if state.fail_release {
            return Err(VigiloError::Release {
                id,
                code: IO_RETURN_ERROR,
            });
        }
        Ok(())
    }
}
