//! Pool of independent [`VectorSource`] views.
//!
//! Scoring during insertion needs two vectors alive at once, so each worker
//! borrows two views. Views of sources that hand out values through a
//! per-view buffer are kept for reuse; views of immutable storage are cheap
//! to copy and are simply dropped.

use std::{
    fmt,
    mem,
    ops::{Deref, DerefMut},
    sync::Mutex,
};

use crate::vectors::VectorSource;

use super::error::GraphError;

/// Hands out copies of a prototype view through [`Pooled`] guards.
pub struct ViewPool<S> {
    prototype: S,
    idle: Mutex<Vec<S>>,
    retain: bool,
}

impl<S: VectorSource> ViewPool<S> {
    /// Creates a pool that copies `prototype` on demand.
    #[must_use]
    pub fn new(prototype: S) -> Self {
        let retain = prototype.is_value_shared();
        Self {
            prototype,
            idle: Mutex::new(Vec::new()),
            retain,
        }
    }

    /// Borrows a view, creating one when none is idle. The view returns to
    /// the pool when the guard drops.
    ///
    /// # Errors
    /// Returns [`GraphError::LockPoisoned`] when the idle list is poisoned.
    pub fn acquire(&self) -> Result<Pooled<'_, S>, GraphError> {
        let reused = if self.retain {
            self.idle
                .lock()
                .map_err(|_| GraphError::LockPoisoned {
                    resource: "view pool",
                })?
                .pop()
        } else {
            None
        };
        let view = reused.unwrap_or_else(|| self.prototype.copy());
        Ok(Pooled {
            pool: self,
            view,
        })
    }

    /// The view every pooled copy is derived from.
    #[rustfmt::skip]
    #[must_use]
    pub fn prototype(&self) -> &S { &self.prototype }

    /// Number of views waiting for reuse.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.idle.lock().map_or(0, |idle| idle.len())
    }

    /// Moves `view` back to the idle list, leaving a fresh copy behind.
    fn release(&self, view: &mut S) {
        if !self.retain {
            return;
        }
        // A poisoned list just loses the view.
        if let Ok(mut idle) = self.idle.lock() {
            idle.push(mem::replace(view, self.prototype.copy()));
        }
    }
}

impl<S> fmt::Debug for ViewPool<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewPool")
            .field("retain", &self.retain)
            .finish_non_exhaustive()
    }
}

/// Scoped loan of a pooled view.
pub struct Pooled<'pool, S: VectorSource> {
    pool: &'pool ViewPool<S>,
    view: S,
}

impl<S: VectorSource> Deref for Pooled<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.view
    }
}

impl<S: VectorSource> DerefMut for Pooled<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.view
    }
}

impl<S: VectorSource> Drop for Pooled<'_, S> {
    fn drop(&mut self) {
        self.pool.release(&mut self.view);
    }
}
