//! Memoizing Wrapper
//!
//! Caches an async operation's result keyed by its arguments.

use std::future::Future;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::cache::{
    hex_digest, CacheManager, Category, GetOptions, Params, Policy, SetOptions, StorageLevel,
};

/// Stands in for an argument serde cannot represent.
pub const UNHASHABLE: &str = "<unhashable>";

/// Length of the digest that replaces composite argument values.
const ARG_HASH_LEN: usize = 16;

// == Call Arguments ==
/// One named argument of a memoized call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallArg {
    pub name: &'static str,
    pub value: Value,
}

impl CallArg {
    /// Captures `value`; values serde cannot represent become [`UNHASHABLE`].
    pub fn new<T: Serialize + ?Sized>(name: &'static str, value: &T) -> Self {
        Self {
            name,
            value: serde_json::to_value(value).unwrap_or_else(|_| Value::String(UNHASHABLE.into())),
        }
    }
}

/// Argument bundle of a memoized operation, in declaration order.
pub trait CallArgs {
    fn call_args(&self) -> Vec<CallArg>;
}

impl CallArgs for () {
    fn call_args(&self) -> Vec<CallArg> {
        Vec::new()
    }
}

impl CallArgs for Vec<CallArg> {
    fn call_args(&self) -> Vec<CallArg> {
        self.clone()
    }
}

/// Which argument identifies the cached value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum IdentifierRule {
    /// The first argument, or the operation name when there is none
    #[default]
    FirstArg,
    /// A named argument, or the operation name when it is absent
    Named(&'static str),
    /// A constant identifier
    Fixed(String),
}

// == Cache Options ==
/// Static caching configuration of one wrapped operation.
#[derive(Debug, Clone)]
pub struct CacheOptions {
    pub category: Category,
    pub policy: Policy,
    pub identifier: IdentifierRule,
    pub key_prefix: Option<String>,
    /// Arguments left out of the parameter map
    pub exclude: Vec<&'static str>,
    pub level: Option<StorageLevel>,
}

impl CacheOptions {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            policy: Policy::Daily,
            identifier: IdentifierRule::FirstArg,
            key_prefix: None,
            exclude: Vec::new(),
            level: None,
        }
    }

    pub fn policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn identifier(mut self, rule: IdentifierRule) -> Self {
        self.identifier = rule;
        self
    }

    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    pub fn exclude(mut self, names: &[&'static str]) -> Self {
        self.exclude.extend_from_slice(names);
        self
    }

    pub fn level(mut self, level: StorageLevel) -> Self {
        self.level = Some(level);
        self
    }
}

/// Parameter-map form of an argument: primitives as-is, composites as a digest.
pub fn reduce_arg(value: &Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) => match serde_json::to_string(value) {
            Ok(text) => {
                let mut digest = hex_digest(text.as_bytes());
                digest.truncate(ARG_HASH_LEN);
                Value::String(digest)
            }
            Err(_) => Value::String(UNHASHABLE.into()),
        },
        primitive => primitive.clone(),
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => match reduce_arg(value) {
            Value::String(digest) => digest,
            other => other.to_string(),
        },
        other => other.to_string(),
    }
}

// == Memoized ==
/// An async operation whose results go through the cache.
///
/// The key is `(category, identifier, params)`: the identifier is picked by
/// [`IdentifierRule`], the remaining non-excluded arguments form the params.
pub struct Memoized<F> {
    name: String,
    manager: Arc<CacheManager>,
    options: CacheOptions,
    op: F,
}

impl<F> Memoized<F> {
    pub fn new(name: impl Into<String>, manager: Arc<CacheManager>, options: CacheOptions, op: F) -> Self {
        Self {
            name: name.into(),
            manager,
            options,
            op,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    /// Identifier and parameter map derived from `args`.
    pub fn key_parts<A: CallArgs + ?Sized>(&self, args: &A) -> (String, Params) {
        let mut args = args.call_args();

        let picked = match &self.options.identifier {
            IdentifierRule::FirstArg if !args.is_empty() => Some(stringify(&args.remove(0).value)),
            IdentifierRule::FirstArg => None,
            IdentifierRule::Named(name) => args
                .iter()
                .position(|a| a.name == *name)
                .map(|ix| stringify(&args.remove(ix).value)),
            IdentifierRule::Fixed(id) => Some(id.clone()),
        };
        let identifier = picked.unwrap_or_else(|| self.name.clone());
        let identifier = match &self.options.key_prefix {
            Some(prefix) => format!("{}.{}", prefix, identifier),
            None => identifier,
        };

        let params = args
            .iter()
            .filter(|a| !self.options.exclude.contains(&a.name))
            .map(|a| (a.name.to_string(), reduce_arg(&a.value)))
            .collect();

        (identifier, params)
    }

    /// Runs the operation through the cache.
    ///
    /// Errors come only from the operation itself, and only when no cached
    /// value (fresh or stale) is available.
    pub async fn call<A, T, Fut>(&self, args: A) -> anyhow::Result<T>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
        A: CallArgs,
        T: Serialize + DeserializeOwned,
    {
        let (identifier, params) = self.key_parts(&args);
        let mut opts = GetOptions::new().policy(self.options.policy);
        opts.params = Some(params);
        opts.level = self.options.level;

        fetch_through(&self.manager, self.options.category, &identifier, opts, || (self.op)(args)).await
    }

    /// Drops the cached result for `args`.
    pub async fn invalidate<A: CallArgs + ?Sized>(&self, args: &A) -> bool {
        let (identifier, params) = self.key_parts(args);
        self.manager
            .delete(self.options.category, &identifier, Some(&params))
            .await
    }
}

/// Cache lookup with `compute` as the refresh callback, returning typed values.
///
/// A cached payload that no longer fits `T` is recomputed.
pub(crate) async fn fetch_through<T, C, Fut>(
    manager: &CacheManager,
    category: Category,
    identifier: &str,
    opts: GetOptions,
    compute: C,
) -> anyhow::Result<T>
where
    C: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
    T: Serialize + DeserializeOwned,
{
    let compute = Mutex::new(Some(compute));
    let computed: Mutex<Option<T>> = Mutex::new(None);
    let failure: Mutex<Option<anyhow::Error>> = Mutex::new(None);
    let take_compute = || compute.lock().unwrap_or_else(|e| e.into_inner()).take();

    let params = opts.params.clone();
    let level = opts.level;
    let policy = opts.policy.unwrap_or_default();

    let cached = manager
        .get_with(category, identifier, opts, || async {
            let Some(compute) = take_compute() else {
                return Err(anyhow!("operation already consumed"));
            };
            match compute().await {
                Ok(value) => {
                    let json = serde_json::to_value(&value).map_err(anyhow::Error::from);
                    *computed.lock().unwrap_or_else(|e| e.into_inner()) = Some(value);
                    json
                }
                Err(e) => {
                    let reason = format!("{:#}", e);
                    *failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(e);
                    Err(anyhow!(reason))
                }
            }
        })
        .await;

    if let Some(value) = computed.into_inner().unwrap_or_else(|e| e.into_inner()) {
        return Ok(value);
    }

    if let Some(json) = cached {
        match serde_json::from_value::<T>(json) {
            Ok(value) => return Ok(value),
            Err(e) => warn!("Cached value for {} has the wrong shape, recomputing: {}", identifier, e),
        }
    }

    if let Some(e) = failure.into_inner().unwrap_or_else(|e| e.into_inner()) {
        return Err(e);
    }

    let compute = take_compute().ok_or_else(|| anyhow!("no value available for {}", identifier))?;
    let value = compute().await?;
    let mut set_opts = SetOptions::new().policy(policy);
    set_opts.params = params;
    set_opts.level = level;
    manager.set_value(category, identifier, &value, set_opts).await;
    Ok(value)
}
