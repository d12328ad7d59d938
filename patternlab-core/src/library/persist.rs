//! JSON persistence for the template mapping.
//!
//! The whole id → template map is one JSON object. There is no version tag;
//! the only migration is coercing legacy map-shaped labels to strings.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde_json::Value;
use tracing::warn;

use super::LibraryError;
use crate::domain::{Template, TemplateId};

pub(crate) type TemplateMap = BTreeMap<TemplateId, Template>;

pub(crate) fn to_json(templates: &TemplateMap) -> Result<String, LibraryError> {
    Ok(serde_json::to_string(templates)?)
}

pub(crate) fn from_json(json: &str) -> Result<TemplateMap, LibraryError> {
    let mut blob: Value = serde_json::from_str(json)?;
    let migrated = migrate_labels(&mut blob)?;
    if migrated > 0 {
        warn!(migrated, "coerced non-string template labels while loading library");
    }
    Ok(serde_json::from_value(blob)?)
}

pub(crate) fn write(path: &Path, templates: &TemplateMap) -> Result<(), LibraryError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, to_json(templates)?)?;
    Ok(())
}

/// Read a library blob; a missing file is an empty library.
pub(crate) fn read(path: &Path) -> Result<TemplateMap, LibraryError> {
    match fs::read_to_string(path) {
        Ok(json) => from_json(&json),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(TemplateMap::new()),
        Err(e) => Err(e.into()),
    }
}

/// Rewrite every non-string `label` in place. A map carrying a string under
/// `"label"` yields that string; anything else yields its JSON text.
fn migrate_labels(blob: &mut Value) -> Result<usize, LibraryError> {
    let entries = blob
        .as_object_mut()
        .ok_or_else(|| LibraryError::Malformed("library blob is not a JSON object".into()))?;
    let mut migrated = 0;
    for (id, entry) in entries.iter_mut() {
        let Some(label) = entry.get_mut("label") else {
            return Err(LibraryError::Malformed(format!("template {id} has no label")));
        };
        if label.is_string() {
            continue;
        }
        let coerced = match label.get("label").and_then(Value::as_str) {
            Some(inner) => inner.to_string(),
            None => label.to_string(),
        };
        *label = Value::String(coerced);
        migrated += 1;
    }
    Ok(migrated)
}
