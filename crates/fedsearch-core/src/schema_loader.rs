//! Settings-directory loader and the per-provider schema cache.
//!
//! The loader walks a directory tree for `.json` files and classifies them by
//! filename:
//!
//! - `<index>.types.json`    → field type hints for `<index>`
//! - `<index>.settings.json` → engine settings for `<index>`
//! - `<index>.json`          → engine settings for `<index>`
//!
//! Files that are not JSON objects are skipped; one broken file never blocks
//! the other indexes.

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::schema::{build_schema, BackendFamily, Schema};
use crate::types::Fields;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsKind {
    Settings,
    Types,
}

/// Index name and kind for a settings file, from its file name.
pub fn classify(path: &Path) -> Option<(String, SettingsKind)> {
    let stem = path.file_stem()?.to_str()?;
    if let Some(index) = stem.strip_suffix(".types") {
        return Some((index.to_string(), SettingsKind::Types));
    }
    if let Some(index) = stem.strip_suffix(".settings") {
        return Some((index.to_string(), SettingsKind::Settings));
    }
    Some((stem.to_string(), SettingsKind::Settings))
}

/// Load every settings file under `dir` into a schema for `family`.
/// A missing directory yields an empty schema.
pub fn load_schema(dir: &Path, family: BackendFamily) -> Schema {
    let mut settings_by_index: BTreeMap<String, Fields> = BTreeMap::new();
    let mut hints_by_index: BTreeMap<String, Fields> = BTreeMap::new();

    for path in list_json_files(dir) {
        let Some((index, kind)) = classify(&path) else { continue };
        let Some(json) = read_object(&path) else {
            debug!(path = %path.display(), "skipping unreadable schema file");
            continue;
        };
        match kind {
            SettingsKind::Types => hints_by_index.insert(index, json),
            SettingsKind::Settings => settings_by_index.insert(index, json),
        };
    }

    let schema = build_schema(family, &settings_by_index, &hints_by_index);
    debug!(dir = %dir.display(), indexes = schema.len(), "loaded schema");
    schema
}

fn read_object(path: &Path) -> Option<Fields> {
    let text = fs::read_to_string(path).ok()?;
    match serde_json::from_str::<Value>(&text).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn list_json_files(root: &Path) -> Vec<PathBuf> {
    if !root.is_dir() {
        return Vec::new();
    }
    let mut json_files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        })
        .collect();
    json_files.sort();
    json_files
}

/// Load-once schema holder shared by a provider's concurrent callers.
///
/// The first `get` performs the load; later calls read the cached value.
/// `reset` drops the cached schema so the next `get` reloads from disk.
#[derive(Debug)]
pub struct SchemaCache {
    family: BackendFamily,
    dir: Option<PathBuf>,
    cell: RwLock<Arc<OnceCell<Option<Arc<Schema>>>>>,
}

impl SchemaCache {
    pub fn new(family: BackendFamily, dir: Option<PathBuf>) -> Self {
        Self { family, dir, cell: RwLock::new(Arc::new(OnceCell::new())) }
    }

    /// The schema, loading it on first use. `None` when no settings directory is configured.
    pub fn get(&self) -> Option<Arc<Schema>> {
        let cell = Arc::clone(&self.cell.read());
        cell.get_or_init(|| self.dir.as_ref().map(|dir| Arc::new(load_schema(dir, self.family)))).clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.read().get().is_some()
    }

    pub fn reset(&self) {
        *self.cell.write() = Arc::new(OnceCell::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_by_suffix() {
        assert_eq!(
            classify(Path::new("/s/products.types.json")),
            Some(("products".to_string(), SettingsKind::Types))
        );
        assert_eq!(
            classify(Path::new("/s/products.settings.json")),
            Some(("products".to_string(), SettingsKind::Settings))
        );
        assert_eq!(
            classify(Path::new("/s/products.json")),
            Some(("products".to_string(), SettingsKind::Settings))
        );
    }

    #[test]
    fn unconfigured_cache_has_no_schema() {
        let cache = SchemaCache::new(BackendFamily::Meilisearch, None);
        assert!(cache.get().is_none());
        assert!(cache.is_loaded());
    }
}
