//! Loading module definitions from outside the resolver.
//!
//! Providers hand out fresh definitions on every call; callers that want
//! caching keep the built [`Module`] themselves.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::error::ModuleError;
use crate::spec::{BuildOptions, Module, ModuleDefinition};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("module '{0}' is not available")]
    NotFound(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("module '{id}' is invalid: {source}")]
    Invalid {
        id: String,
        #[source]
        source: ModuleError,
    },
}

/// Source of module definitions.
pub trait DefinitionProvider {
    fn module_ids(&self) -> Result<Vec<String>, ProviderError>;

    fn load(&self, id: &str) -> Result<ModuleDefinition, ProviderError>;
}

/// Reads `<root>/<id>.json` definition files.
#[derive(Debug, Clone)]
pub struct DirectoryProvider {
    root: PathBuf,
}

impl DirectoryProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }
}

impl DefinitionProvider for DirectoryProvider {
    fn module_ids(&self) -> Result<Vec<String>, ProviderError> {
        let entries = fs::read_dir(&self.root).map_err(|source| ProviderError::Io {
            path: self.root.clone(),
            source,
        })?;
        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ProviderError::Io {
                path: self.root.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn load(&self, id: &str) -> Result<ModuleDefinition, ProviderError> {
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(ProviderError::NotFound(id.to_string()));
        }
        let path = self.path_for(id);
        if !path.is_file() {
            return Err(ProviderError::NotFound(id.to_string()));
        }
        let contents = fs::read_to_string(&path).map_err(|source| ProviderError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(module = id, path = %path.display(), "loaded module definition");
        serde_json::from_str(&contents).map_err(|source| ProviderError::Parse { path, source })
    }
}

/// Loads and builds one module.
pub fn load_module(
    provider: &dyn DefinitionProvider,
    id: &str,
    options: &BuildOptions,
) -> Result<Module, ProviderError> {
    let definition = provider.load(id)?;
    Module::build_with(definition, options).map_err(|source| ProviderError::Invalid {
        id: id.to_string(),
        source,
    })
}

/// Every module the provider offers that can be answered in context, sorted by id.
///
/// A module that fails to load or build fails the whole listing.
pub fn answerable_modules(
    provider: &dyn DefinitionProvider,
    options: &BuildOptions,
) -> Result<Vec<Module>, ProviderError> {
    let mut modules = Vec::new();
    for id in provider.module_ids()? {
        let module = load_module(provider, &id, options)?;
        if module.is_answerable_in_context() {
            modules.push(module);
        } else {
            warn!(module = %id, "skipping module that is not answerable in context");
        }
    }
    modules.sort_by(|a, b| a.id().cmp(b.id()));
    Ok(modules)
}
