//! Named lifecycle hook table

use std::fmt;
use std::sync::Arc;

/// Hooks run at the start of argument resolution
pub const PRE_PARSE: &str = "pre-parse";
/// Hooks run once arguments are resolved and logging flags applied
pub const POST_PARSE: &str = "post-parse";
pub const PRE_RUN: &str = "pre-run";
/// Hooks run after `main`, whether it succeeded or not
pub const POST_RUN: &str = "post-run";
/// Hooks run after the step's own teardown on every exit path
pub const CLEANUP: &str = "cleanup";

/// A hook callable. It receives the owning step.
pub type HookFn<S> = Arc<dyn Fn(&mut S) -> anyhow::Result<()> + Send + Sync>;

pub struct HookEntry<S> {
    pub name: String,
    pub func: HookFn<S>,
}

// Manual impl: cloning shares the callable and must not require `S: Clone`
impl<S> Clone for HookEntry<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            func: Arc::clone(&self.func),
        }
    }
}

impl<S> fmt::Debug for HookEntry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookEntry").field("name", &self.name).finish()
    }
}

/// Lifecycle name to ordered hooks. Lifecycles appear in the order they first
/// received a hook. Lookups never create entries.
pub struct LifecycleTable<S> {
    lifecycles: Vec<(String, Vec<HookEntry<S>>)>,
}

impl<S> Default for LifecycleTable<S> {
    fn default() -> Self {
        Self {
            lifecycles: Vec::new(),
        }
    }
}

impl<S> LifecycleTable<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook to `lifecycle`, or put it first when `at_begin` is set.
    pub fn add(&mut self, lifecycle: &str, name: &str, func: HookFn<S>, at_begin: bool) {
        let entry = HookEntry {
            name: name.to_string(),
            func,
        };
        let hooks = match self.lifecycles.iter().position(|(n, _)| n == lifecycle) {
            Some(index) => &mut self.lifecycles[index].1,
            None => {
                self.lifecycles.push((lifecycle.to_string(), Vec::new()));
                let last = self.lifecycles.len() - 1;
                &mut self.lifecycles[last].1
            }
        };
        if at_begin {
            hooks.insert(0, entry);
        } else {
            hooks.push(entry);
        }
    }

    /// Hooks registered under `lifecycle`, empty if there are none.
    pub fn hooks(&self, lifecycle: &str) -> &[HookEntry<S>] {
        self.lifecycles
            .iter()
            .find(|(n, _)| n == lifecycle)
            .map(|(_, hooks)| hooks.as_slice())
            .unwrap_or(&[])
    }

    pub fn lifecycles(&self) -> impl Iterator<Item = &str> {
        self.lifecycles.iter().map(|(n, _)| n.as_str())
    }

    pub fn contains(&self, lifecycle: &str) -> bool {
        self.lifecycles.iter().any(|(n, _)| n == lifecycle)
    }
}
