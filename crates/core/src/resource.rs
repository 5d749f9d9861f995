//! Process-wide registry of single-instance services.
//!
//! Each service type has at most one live instance per process. Acquisition is
//! always explicit: callers name the type and hand over the initializer that
//! runs if, and only if, no instance exists yet.
//!
//! ```ignore
//! let cache = resource::acquire(|| ArtifactCache::new(dir));
//! // Elsewhere in the process, the same instance comes back:
//! let again = resource::acquire(|| ArtifactCache::new(other_dir));
//! assert!(Arc::ptr_eq(&cache, &again));
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard};

type Instances = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

static REGISTRY: LazyLock<Mutex<Instances>> = LazyLock::new(|| Mutex::new(HashMap::new()));

fn lock() -> MutexGuard<'static, Instances> {
    // A panicking initializer never leaves a half-inserted entry behind.
    REGISTRY.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn downcast<R: Send + Sync + 'static>(instance: &Arc<dyn Any + Send + Sync>) -> Arc<R> {
    match Arc::clone(instance).downcast::<R>() {
        Ok(typed) => typed,
        Err(_) => unreachable!("registry entry stored under a foreign TypeId"),
    }
}

/// Get the instance of `R`, constructing it with `init` on first use.
///
/// `init` runs under the registry lock, so concurrent callers observe exactly
/// one construction. It must not acquire other resources.
pub fn acquire<R, F>(init: F) -> Arc<R>
where
    R: Send + Sync + 'static,
    F: FnOnce() -> R,
{
    let mut instances = lock();
    let entry = instances
        .entry(TypeId::of::<R>())
        .or_insert_with(|| Arc::new(init()) as Arc<dyn Any + Send + Sync>);
    downcast(entry)
}

/// Like [`acquire`], for fallible initializers. Nothing is registered when
/// `init` fails, so a later call may try again.
pub fn try_acquire<R, E, F>(init: F) -> Result<Arc<R>, E>
where
    R: Send + Sync + 'static,
    F: FnOnce() -> Result<R, E>,
{
    let mut instances = lock();
    if let Some(existing) = instances.get(&TypeId::of::<R>()) {
        return Ok(downcast(existing));
    }

    let created: Arc<R> = Arc::new(init()?);
    instances.insert(TypeId::of::<R>(), created.clone() as Arc<dyn Any + Send + Sync>);
    Ok(created)
}

/// Whether an instance of `R` has been constructed in this process.
pub fn contains<R: Send + Sync + 'static>() -> bool {
    lock().contains_key(&TypeId::of::<R>())
}
