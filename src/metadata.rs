//! Datasource metadata registry
//!
//! Process-wide mapping from datasource name to the installed datasource.
//! The transaction aspect resolves `options.datasource_name` here before
//! acquiring a session; the bootstrap installs and removes entries.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use tracing::{info, warn};

use crate::session::Datasource;

/// Name used when a transactional call does not select a datasource
pub const DEFAULT_DATASOURCE_NAME: &str = "DB";

/// Metadata recorded for a registered datasource
#[derive(Clone)]
pub struct DatasourceMetadata {
    pub datasource: Arc<dyn Datasource>,
}

static DATASOURCES: Lazy<RwLock<HashMap<String, DatasourceMetadata>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Register a datasource under the given name, replacing any previous entry
pub fn register_datasource(name: impl Into<String>, datasource: Arc<dyn Datasource>) {
    let name = name.into();
    info!("Registering datasource: {}", name);
    let mut map = DATASOURCES.write().unwrap_or_else(|e| e.into_inner());
    if map.insert(name.clone(), DatasourceMetadata { datasource }).is_some() {
        warn!("Datasource '{}' was already registered and has been replaced", name);
    }
}

/// Look up the metadata for a named datasource
pub fn get_metadata(name: &str) -> Option<DatasourceMetadata> {
    DATASOURCES
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .get(name)
        .cloned()
}

/// Remove a datasource registration, returning the removed entry
pub fn remove_datasource(name: &str) -> Option<DatasourceMetadata> {
    let removed = DATASOURCES
        .write()
        .unwrap_or_else(|e| e.into_inner())
        .remove(name);
    if removed.is_some() {
        info!("Removed datasource: {}", name);
    }
    removed
}

/// Names of all registered datasources
pub fn datasource_names() -> Vec<String> {
    DATASOURCES
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .keys()
        .cloned()
        .collect()
}
