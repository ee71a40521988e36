//! Cached Property
//!
//! Per-instance memoization of a zero-argument accessor.

use std::any::type_name;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};

use super::wrapper::fetch_through;
use crate::cache::{CacheManager, Category, GetOptions, Policy};

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

// == Instance Id ==
/// Identity token of an owning object, unique within the process.
///
/// Owners create one at construction and hand it to each of their cached properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(u64);

impl InstanceId {
    pub fn new() -> Self {
        Self(NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

/// Last path segment of `O`'s type name, generics stripped.
fn short_type_name<O: ?Sized>() -> &'static str {
    let full = type_name::<O>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

// == Cached Property ==
/// A memoized accessor bound to one owner instance.
///
/// The identifier is `<Owner>.<instance>.<accessor>`, so each instance and
/// each accessor gets its own entry.
pub struct CachedProperty<T> {
    manager: Arc<CacheManager>,
    identifier: String,
    category: Category,
    policy: Policy,
    _value: PhantomData<fn() -> T>,
}

impl<T> CachedProperty<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Creates the property `accessor` of the `O` instance identified by `owner`.
    pub fn new<O: ?Sized>(
        manager: Arc<CacheManager>,
        owner: InstanceId,
        accessor: &str,
        category: Category,
        policy: Policy,
    ) -> Self {
        Self {
            manager,
            identifier: format!("{}.{}.{}", short_type_name::<O>(), owner.get(), accessor),
            category,
            policy,
            _value: PhantomData,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Returns the cached value, running `compute` at most once per policy window.
    pub async fn get<F, Fut>(&self, compute: F) -> anyhow::Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let opts = GetOptions::new().policy(self.policy);
        fetch_through(&self.manager, self.category, &self.identifier, opts, compute).await
    }

    /// Forgets the cached value.
    pub async fn invalidate(&self) -> bool {
        self.manager.delete(self.category, &self.identifier, None).await
    }
}
