//! Where application specs come from

use async_trait::async_trait;
use meshpack_core::ApplicationSpec;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::Result;

/// Read-only lookup of application specs by name
#[async_trait]
pub trait SpecStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<Arc<ApplicationSpec>>>;

    /// Names of every stored application, sorted
    async fn names(&self) -> Result<Vec<String>>;
}

/// Specs held in memory, validated on insert
#[derive(Debug, Clone, Default)]
pub struct InMemorySpecStore {
    specs: BTreeMap<String, Arc<ApplicationSpec>>,
}

impl InMemorySpecStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a spec, replacing any spec with the same name
    pub fn insert(&mut self, spec: ApplicationSpec) -> Result<()> {
        spec.ensure_valid()?;
        tracing::debug!(application = %spec.name, versions = spec.versions.len(), "stored spec");
        self.specs.insert(spec.name.clone(), Arc::new(spec));
        Ok(())
    }

    pub fn with_spec(mut self, spec: ApplicationSpec) -> Result<Self> {
        self.insert(spec)?;
        Ok(self)
    }

    /// Load and store a spec file, returning the application name
    pub fn load_file(&mut self, path: &Path) -> Result<String> {
        let spec = ApplicationSpec::from_file(path)?;
        let name = spec.name.clone();
        self.insert(spec)?;
        Ok(name)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

#[async_trait]
impl SpecStore for InMemorySpecStore {
    async fn get(&self, name: &str) -> Result<Option<Arc<ApplicationSpec>>> {
        Ok(self.specs.get(name).cloned())
    }

    async fn names(&self) -> Result<Vec<String>> {
        Ok(self.specs.keys().cloned().collect())
    }
}
