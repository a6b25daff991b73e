//! Shared breakpoint store.
//!
//! All mutation goes through the registry so every caller sees one
//! consistent view and every successful mutation fires the change
//! listeners exactly once. Listeners run outside the state lock, so a
//! listener may call back into the registry.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use vigil_core::{Breakpoint, BreakpointId, ExceptionBreakpoint};

type ChangeListener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct RegistryState {
    breakpoints: HashMap<BreakpointId, Breakpoint>,
    exceptions: HashMap<BreakpointId, ExceptionBreakpoint>,
}

/// Thread-safe store for location breakpoints and exception filters.
#[derive(Default)]
pub struct BreakpointRegistry {
    state: Mutex<RegistryState>,
    listeners: Mutex<Vec<ChangeListener>>,
}

impl BreakpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener invoked after every successful mutation.
    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) {
        self.listeners.lock().push(Arc::new(listener));
    }

    /// Inserts a breakpoint. Returns false (and fires nothing) if the id
    /// is already present.
    pub fn add(&self, breakpoint: Breakpoint) -> bool {
        let inserted = {
            let mut state = self.state.lock();
            match state.breakpoints.entry(breakpoint.id.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(breakpoint);
                    true
                }
                Entry::Occupied(_) => false,
            }
        };
        if inserted {
            self.notify_changed();
        }
        inserted
    }

    /// Replaces an existing breakpoint wholesale. Returns false (and
    /// fires nothing) if the id is unknown.
    pub fn update(&self, breakpoint: Breakpoint) -> bool {
        let updated = {
            let mut state = self.state.lock();
            match state.breakpoints.get_mut(&breakpoint.id) {
                Some(slot) => {
                    *slot = breakpoint;
                    true
                }
                None => false,
            }
        };
        if updated {
            self.notify_changed();
        }
        updated
    }

    /// Read-modify-write under the state lock. The closure sees the
    /// current record and returns the replacement, or `None` to decline;
    /// declining fires no event. Returns the stored replacement.
    pub fn update_with(
        &self,
        id: &BreakpointId,
        f: impl FnOnce(&Breakpoint) -> Option<Breakpoint>,
    ) -> Option<Breakpoint> {
        let next = {
            let mut state = self.state.lock();
            let current = state.breakpoints.get_mut(id)?;
            let next = f(current)?;
            *current = next.clone();
            next
        };
        self.notify_changed();
        Some(next)
    }

    pub fn remove(&self, id: &BreakpointId) -> Option<Breakpoint> {
        let removed = self.state.lock().breakpoints.remove(id);
        if removed.is_some() {
            self.notify_changed();
        }
        removed
    }

    pub fn get(&self, id: &BreakpointId) -> Option<Breakpoint> {
        self.state.lock().breakpoints.get(id).cloned()
    }

    /// Snapshot of every location breakpoint, ordered by id for stable
    /// iteration.
    pub fn all(&self) -> Vec<Breakpoint> {
        let mut all: Vec<_> = self.state.lock().breakpoints.values().cloned().collect();
        all.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        all
    }

    pub fn add_exception(&self, breakpoint: ExceptionBreakpoint) -> bool {
        let inserted = {
            let mut state = self.state.lock();
            match state.exceptions.entry(breakpoint.id.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(breakpoint);
                    true
                }
                Entry::Occupied(_) => false,
            }
        };
        if inserted {
            self.notify_changed();
        }
        inserted
    }

    pub fn update_exception(&self, breakpoint: ExceptionBreakpoint) -> bool {
        let updated = {
            let mut state = self.state.lock();
            match state.exceptions.get_mut(&breakpoint.id) {
                Some(slot) => {
                    *slot = breakpoint;
                    true
                }
                None => false,
            }
        };
        if updated {
            self.notify_changed();
        }
        updated
    }

    /// Exception-filter counterpart of [`update_with`].
    ///
    /// [`update_with`]: Self::update_with
    pub fn update_exception_with(
        &self,
        id: &BreakpointId,
        f: impl FnOnce(&ExceptionBreakpoint) -> Option<ExceptionBreakpoint>,
    ) -> Option<ExceptionBreakpoint> {
        let next = {
            let mut state = self.state.lock();
            let current = state.exceptions.get_mut(id)?;
            let next = f(current)?;
            *current = next.clone();
            next
        };
        self.notify_changed();
        Some(next)
    }

    pub fn remove_exception(&self, id: &BreakpointId) -> Option<ExceptionBreakpoint> {
        let removed = self.state.lock().exceptions.remove(id);
        if removed.is_some() {
            self.notify_changed();
        }
        removed
    }

    pub fn get_exception(&self, id: &BreakpointId) -> Option<ExceptionBreakpoint> {
        self.state.lock().exceptions.get(id).cloned()
    }

    pub fn all_exceptions(&self) -> Vec<ExceptionBreakpoint> {
        let mut all: Vec<_> = self.state.lock().exceptions.values().cloned().collect();
        all.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        all
    }

    /// Drops every breakpoint and exception filter. Fires one change
    /// event regardless of how many records were removed.
    pub fn clear(&self) {
        {
            let mut state = self.state.lock();
            state.breakpoints.clear();
            state.exceptions.clear();
        }
        self.notify_changed();
    }

    fn notify_changed(&self) {
        let listeners: Vec<ChangeListener> = self.listeners.lock().clone();
        for listener in listeners {
            listener();
        }
    }
}
