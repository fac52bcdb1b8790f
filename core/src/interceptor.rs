//! Ordered request and response hooks.
//!
//! Hooks run in registration order and are removed by the [`InterceptorId`]
//! returned when they were added.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::http::{HttpRequest, HttpResponse};

/// Rewrites an outgoing request before it reaches the transport.
pub type RequestHook = dyn Fn(&mut HttpRequest) + Send + Sync;

/// Rewrites a received response before its status is classified.
pub type ResponseHook = dyn Fn(&mut HttpResponse) + Send + Sync;

/// Handle for a registered hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterceptorId(Uuid);

impl InterceptorId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for InterceptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

pub(crate) struct HookChain<H: ?Sized> {
    hooks: Vec<(InterceptorId, Arc<H>)>,
}

impl<H: ?Sized> HookChain<H> {
    pub(crate) fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    pub(crate) fn add(&mut self, hook: Arc<H>) -> InterceptorId {
        let id = InterceptorId::new();
        self.hooks.push((id, hook));
        id
    }

    /// Returns `false` when `id` is not registered.
    pub(crate) fn remove(&mut self, id: InterceptorId) -> bool {
        let before = self.hooks.len();
        self.hooks.retain(|(existing, _)| *existing != id);
        self.hooks.len() != before
    }

    /// Hooks in registration order, detached from the chain.
    pub(crate) fn snapshot(&self) -> Vec<Arc<H>> {
        self.hooks.iter().map(|(_, hook)| Arc::clone(hook)).collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.hooks.len()
    }
}

impl<H: ?Sized> fmt::Debug for HookChain<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.hooks.iter().map(|(id, _)| id))
            .finish()
    }
}
