//! The locked query-to-handle map behind every cache namespace.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use hashbrown::HashMap;
use parking_lot::{Mutex, MutexGuard};
use stmtcache_core::{Context, Result};

/// Map from literal query text to a shared statement handle.
///
/// The lock is held across the whole check, prepare and store sequence, so a
/// query is prepared at most once no matter how many callers race for it.
pub(crate) struct StatementMap<S> {
    entries: Mutex<HashMap<String, Arc<S>>>,
    namespace: &'static str,
    scope: &'static str,
    prepares: AtomicU64,
    hits: AtomicU64,
}

impl<S> StatementMap<S> {
    pub(crate) fn new(namespace: &'static str, scope: &'static str) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            namespace,
            scope,
            prepares: AtomicU64::new(0),
            hits: AtomicU64::new(0),
        }
    }

    /// Locks the map, giving up as soon as `ctx` ends.
    fn lock(&self, ctx: &Context) -> Result<MutexGuard<'_, HashMap<String, Arc<S>>>> {
        ctx.check()?;
        if ctx.is_background() {
            return Ok(self.entries.lock());
        }
        loop {
            if let Some(entries) = self.entries.try_lock_for(ctx.poll_slice()) {
                return Ok(entries);
            }
            ctx.check()?;
        }
    }

    /// Returns the handle stored for `query`, or runs `prepare` and stores its
    /// result.
    ///
    /// A failed `prepare` stores nothing. A handle prepared after `ctx` ended is
    /// dropped and the context error returned instead.
    pub(crate) fn get_or_try_insert_with<F>(
        &self,
        ctx: &Context,
        query: &str,
        prepare: F,
    ) -> Result<Arc<S>>
    where
        F: FnOnce() -> Result<S>,
    {
        let mut entries = self.lock(ctx)?;
        if let Some(stmt) = entries.get(query) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            stmtcache_core::stmtcache_trace_hit!(query, self.namespace, self.scope);
            return Ok(Arc::clone(stmt));
        }

        stmtcache_core::stmtcache_trace_prepare!(query, self.namespace, self.scope);
        let stmt = Arc::new(prepare()?);
        ctx.check()?;

        entries.insert(query.to_owned(), Arc::clone(&stmt));
        self.prepares.fetch_add(1, Ordering::Relaxed);
        Ok(stmt)
    }

    #[cfg(test)]
    pub(crate) fn get(&self, query: &str) -> Option<Arc<S>> {
        self.entries.lock().get(query).cloned()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub(crate) fn prepares(&self) -> u64 {
        self.prepares.load(Ordering::Relaxed)
    }

    pub(crate) fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }
}
