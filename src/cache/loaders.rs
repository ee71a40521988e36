//! Loader Registry
//!
//! Per-category bulk loaders used by warmup.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Context;
use serde_json::Value;
use tokio::fs;

use super::entry::Policy;
use super::key::Category;

/// Identifier → payload map produced by a loader. No ordering is implied.
pub type LoadedData = HashMap<String, Value>;

pub type LoaderFuture = Pin<Box<dyn Future<Output = anyhow::Result<LoadedData>> + Send>>;

/// A zero-argument async loader.
pub type Loader = Arc<dyn Fn() -> LoaderFuture + Send + Sync>;

/// Categories warmed up when no explicit list is given.
pub const DEFAULT_WARMUP: [Category; 4] = [
    Category::Regulation,
    Category::Subsidy,
    Category::Climate,
    Category::Geodata,
];

/// Policy applied to data bulk-loaded for `category`.
pub fn default_policy(category: Category) -> Policy {
    match category {
        Category::Geodata | Category::Climate => Policy::Monthly,
        Category::Regulation | Category::Subsidy => Policy::Weekly,
        _ => Policy::Daily,
    }
}

// == Loader Registry ==
#[derive(Clone, Default)]
pub struct LoaderRegistry {
    loaders: HashMap<Category, Loader>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `loader` for `category`, replacing any previous one.
    pub fn register<F, Fut>(&mut self, category: Category, loader: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<LoadedData>> + Send + 'static,
    {
        let loader: Loader = Arc::new(move || Box::pin(loader()) as LoaderFuture);
        self.loaders.insert(category, loader);
    }

    pub fn get(&self, category: Category) -> Option<Loader> {
        self.loaders.get(&category).cloned()
    }

    pub fn contains(&self, category: Category) -> bool {
        self.loaders.contains_key(&category)
    }

    /// Registry loading each category from `<dir>/<category>.json`, a JSON
    /// object of identifier to payload. A missing file loads nothing.
    pub fn from_seed_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let mut registry = Self::new();
        for category in Category::ALL {
            let path = dir.join(format!("{}.json", category));
            registry.register(category, move || read_seed_file(path.clone()));
        }
        registry
    }
}

async fn read_seed_file(path: PathBuf) -> anyhow::Result<LoadedData> {
    let bytes = match fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(LoadedData::new()),
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    };
    serde_json::from_slice(&bytes).with_context(|| format!("parsing {}", path.display()))
}
