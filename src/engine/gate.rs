// src/engine/gate.rs

//! Pause/resume gate.
//!
//! While the gate is paused, every task launched through a scheduler that
//! uses it gets one extra, implicit prerequisite: the gate's resume token.
//! Resuming triggers the token and releases all of those tasks at once.
//! Tasks launched while the gate is running are unaffected, and a caller's
//! declared prerequisites are never modified.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::dag::handle::TaskHandle;

static GLOBAL_GATE: LazyLock<Arc<Gate>> = LazyLock::new(|| Arc::new(Gate::new()));

/// Pause/resume switch usable as a prerequisite.
#[derive(Debug, Default)]
pub struct Gate {
    paused: AtomicBool,
    /// Resume token handed out while paused. Created on first request.
    token: Mutex<Option<TaskHandle>>,
}

impl Gate {
    /// A new, running gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide gate used by schedulers that were not given one.
    pub fn global() -> Arc<Gate> {
        Arc::clone(&GLOBAL_GATE)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    fn token_slot(&self) -> MutexGuard<'_, Option<TaskHandle>> {
        self.token.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Defer newly launched tasks until [`resume`](Gate::resume).
    pub fn pause(&self) {
        let _slot = self.token_slot();
        if !self.paused.swap(true, Ordering::AcqRel) {
            info!("task gate paused");
        }
    }

    /// Release every task that was launched while paused.
    pub fn resume(&self) {
        // Flag and token change together, so a token handed out after a
        // later `pause` always belongs to that pause.
        let token = {
            let mut slot = self.token_slot();
            if !self.paused.swap(false, Ordering::AcqRel) {
                return;
            }
            slot.take()
        };
        info!(pending_token = token.is_some(), "task gate resumed");

        if let Some(token) = token {
            token.trigger();
        }
    }

    /// Handle that completes when the gate is running.
    ///
    /// While running this is an already completed event; while paused it is
    /// the shared token that the next [`resume`](Gate::resume) triggers.
    pub fn wait_for_resume_token(&self) -> TaskHandle {
        let mut slot = self.token_slot();

        // `pause` and `resume` flip the flag under this lock.
        if !self.is_paused() {
            drop(slot);
            return completed_event();
        }

        slot.get_or_insert_with(|| {
            debug!("creating resume token");
            TaskHandle::new_event("gate.resume")
        })
        .clone()
    }

    /// Effective prerequisites of a launch: `declared` plus the resume token
    /// when paused.
    pub fn gated_prerequisites(&self, declared: &[TaskHandle]) -> Vec<TaskHandle> {
        let mut prerequisites = declared.to_vec();
        if self.is_paused() {
            prerequisites.push(self.wait_for_resume_token());
        }
        prerequisites
    }
}

fn completed_event() -> TaskHandle {
    let event = TaskHandle::new_event("gate.running");
    event.trigger();
    event
}
