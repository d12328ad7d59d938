//! Template store — labeled templates, augmentation, pruning index,
//! persistence.
//!
//! The store owns every template by id. Mutations (add, insert, remove,
//! augment, load) mark the LB_Keogh index dirty; only a full
//! [`build_index`](PatternLibrary::build_index) clears it. Read-only consumers
//! take an [`IndexSnapshot`] instead of touching the live index.

mod persist;
pub mod view;

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::distance::DistanceEngine;
use crate::domain::{
    AugmentationType, Bar, Label, Template, TemplateId, TemplateMetadata, WindowError, UNKNOWN,
};
use crate::preprocess::Preprocessor;

pub use view::{IndexSnapshot, TemplateView, ViewEntry};

use persist::TemplateMap;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("invalid pattern window: {0}")]
    Window(#[from] WindowError),

    #[error("template not found: {0}")]
    NotFound(TemplateId),

    #[error("library I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("library JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed library blob: {0}")]
    Malformed(String),
}

/// Collection of labeled pattern templates.
#[derive(Debug, Clone)]
pub struct PatternLibrary {
    templates: TemplateMap,
    index_dirty: bool,
    preprocessor: Preprocessor,
    engine: DistanceEngine,
    mirror: bool,
}

impl Default for PatternLibrary {
    fn default() -> Self {
        Self::new(Preprocessor::default(), DistanceEngine::default())
    }
}

impl PatternLibrary {
    pub fn new(preprocessor: Preprocessor, engine: DistanceEngine) -> Self {
        Self {
            templates: TemplateMap::new(),
            index_dirty: false,
            preprocessor,
            engine,
            mirror: true,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        let mut library = Self::new(
            config.preprocessing.preprocessor(),
            DistanceEngine::from_config(&config.dtw),
        );
        library.mirror = config.augmentation.mirror;
        library
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn engine(&self) -> &DistanceEngine {
        &self.engine
    }

    // ─── Mutations ───────────────────────────────────────────────────

    /// Normalize `window`, score it, and store it as a new template.
    pub fn add_pattern(
        &mut self,
        label: impl Into<Label>,
        window: &[Bar],
        metadata: TemplateMetadata,
    ) -> Result<&Template, LibraryError> {
        let normalized = self.preprocessor.checked_normalize(window)?;
        let (first, last) = match (window.first(), window.last()) {
            (Some(first), Some(last)) => (first.timestamp, last.timestamp),
            _ => {
                return Err(WindowError::TooShort {
                    need: self.preprocessor.min_bars(),
                    got: 0,
                }
                .into())
            }
        };

        let template = Template {
            id: TemplateId::generate(),
            label: label.into(),
            normalized,
            symbol: metadata.symbol.unwrap_or_else(|| UNKNOWN.to_string()),
            timeframe: metadata.timeframe.unwrap_or_else(|| UNKNOWN.to_string()),
            start_time: metadata.start_time.unwrap_or(first),
            end_time: metadata.end_time.unwrap_or(last),
            bars_count: window.len(),
            quality_score: quality_score(window),
            raw_data: window.to_vec(),
            is_augmented: false,
            augmentation_type: None,
            parent_id: None,
            envelope: None,
        };
        info!(
            id = %template.id,
            label = %template.label,
            bars = template.bars_count,
            quality = template.quality_score,
            "added pattern template"
        );

        let id = template.id.clone();
        self.index_dirty = true;
        Ok(self.templates.entry(id).or_insert(template))
    }

    /// Store a prebuilt template, replacing any with the same id.
    pub fn insert(&mut self, template: Template) -> Option<Template> {
        self.index_dirty = true;
        self.templates.insert(template.id.clone(), template)
    }

    pub fn remove(&mut self, id: &TemplateId) -> Option<Template> {
        let removed = self.templates.remove(id);
        if removed.is_some() {
            self.index_dirty = true;
            info!(%id, "removed pattern template");
        }
        removed
    }

    /// Change a template's label in place. The envelope does not depend on
    /// the label, so the index stays valid.
    pub fn relabel(&mut self, id: &TemplateId, label: impl Into<Label>) -> Result<(), LibraryError> {
        let template = self
            .templates
            .get_mut(id)
            .ok_or_else(|| LibraryError::NotFound(id.clone()))?;
        template.label = label.into();
        Ok(())
    }

    /// Augment with the configured options.
    pub fn augment_library(&mut self) -> usize {
        self.augment(self.mirror)
    }

    /// Derive a mirrored sibling for every original template that has none
    /// yet. Returns the number of templates added.
    ///
    /// Unlike a plain additive pass, repeated calls do not stack duplicate
    /// mirrors of the same original, so each parent casts one mirrored vote.
    pub fn augment(&mut self, mirror: bool) -> usize {
        if !mirror {
            return 0;
        }
        let mirrored_parents: HashSet<&TemplateId> = self
            .templates
            .values()
            .filter(|t| t.augmentation_type == Some(AugmentationType::Mirror))
            .filter_map(|t| t.parent_id.as_ref())
            .collect();
        let children: Vec<Template> = self
            .templates
            .values()
            .filter(|t| !t.is_augmented && !mirrored_parents.contains(&t.id))
            .map(Template::mirrored)
            .collect();

        let added = children.len();
        for child in children {
            self.templates.insert(child.id.clone(), child);
        }
        self.index_dirty = true;
        info!(added, total = self.templates.len(), "augmented library");
        added
    }

    /// Recompute every envelope and clear the dirty flag.
    ///
    /// `window_fraction` defaults to the distance engine's band fraction.
    pub fn build_index(&mut self, window_fraction: Option<f64>) {
        let engine = self.engine;
        for template in self.templates.values_mut() {
            template.envelope = Some(engine.envelopes(&template.normalized, window_fraction));
        }
        self.index_dirty = false;
        info!(templates = self.templates.len(), "rebuilt LB_Keogh index");
    }

    /// Rebuild with the default width if the index is stale.
    pub fn ensure_index(&mut self) {
        if self.index_dirty {
            self.build_index(None);
        }
    }

    // ─── Queries ─────────────────────────────────────────────────────

    pub fn is_index_dirty(&self) -> bool {
        self.index_dirty
    }

    pub fn get(&self, id: &TemplateId) -> Option<&Template> {
        self.templates.get(id)
    }

    /// Templates in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.values()
    }

    pub fn templates_by_label(&self, label: &str) -> Vec<&Template> {
        self.templates.values().filter(|t| t.label == label).collect()
    }

    /// Distinct labels, sorted.
    pub fn labels(&self) -> Vec<Label> {
        self.templates
            .values()
            .map(|t| &t.label)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Content hash over the serialized template map.
    pub fn fingerprint(&self) -> Result<String, LibraryError> {
        let json = persist::to_json(&self.templates)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }

    /// Read-only snapshot of the templates accepted by `filter`.
    ///
    /// If the index is stale the snapshot carries envelopes computed with the
    /// default width; the library itself is left untouched.
    pub fn snapshot<F>(&self, filter: F) -> IndexSnapshot<'_>
    where
        F: Fn(&Template) -> bool,
    {
        let templates: Vec<&Template> = self.templates.values().filter(|t| filter(t)).collect();
        let computed = self.index_dirty.then(|| {
            debug!(templates = templates.len(), "computing envelopes for stale snapshot");
            templates
                .iter()
                .map(|t| self.engine.envelopes(&t.normalized, None))
                .collect()
        });
        IndexSnapshot::new(templates, computed)
    }

    // ─── Persistence ─────────────────────────────────────────────────

    pub fn to_json(&self) -> Result<String, LibraryError> {
        persist::to_json(&self.templates)
    }

    /// Replace the contents with a JSON blob. Always marks the index dirty.
    pub fn load_json(&mut self, json: &str) -> Result<(), LibraryError> {
        self.templates = persist::from_json(json)?;
        self.index_dirty = true;
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<(), LibraryError> {
        persist::write(path, &self.templates)?;
        info!(path = %path.display(), templates = self.templates.len(), "saved library");
        Ok(())
    }

    /// Replace the contents with the blob at `path`; a missing file yields an
    /// empty library. Always marks the index dirty.
    pub fn load(&mut self, path: &Path) -> Result<(), LibraryError> {
        self.templates = persist::read(path)?;
        self.index_dirty = true;
        info!(path = %path.display(), templates = self.templates.len(), "loaded library");
        Ok(())
    }
}

/// `mean(1 / (1 + std(close pct-change)), 1.0)`, sample std.
///
/// Non-finite returns (zero previous close) are ignored; fewer than two
/// returns count as perfectly smooth.
pub fn quality_score(window: &[Bar]) -> f64 {
    let returns: Vec<f64> = window
        .windows(2)
        .map(|w| w[1].close / w[0].close - 1.0)
        .filter(|r| r.is_finite())
        .collect();
    let smoothness = if returns.len() < 2 {
        1.0
    } else {
        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
        1.0 / (1.0 + var.sqrt())
    };
    let completeness = 1.0;
    (smoothness + completeness) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn window(closes: &[f64]) -> Vec<Bar> {
        let t0 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(9, 30, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                timestamp: t0 + chrono::Duration::minutes(5 * i as i64),
                open: c,
                high: c + 0.5,
                low: c - 0.5,
                close: c,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn add_fills_metadata_defaults() {
        let mut lib = PatternLibrary::default();
        let bars = window(&[10.0, 11.0, 12.0, 11.5]);
        let t = lib.add_pattern("flag", &bars, TemplateMetadata::default()).unwrap();
        assert_eq!(t.symbol, UNKNOWN);
        assert_eq!(t.timeframe, UNKNOWN);
        assert_eq!(t.start_time, bars[0].timestamp);
        assert_eq!(t.end_time, bars[3].timestamp);
        assert_eq!(t.bars_count, 4);
        assert_eq!(t.normalized.len(), 3);
        assert!(t.envelope.is_none());
        assert!(lib.is_index_dirty());
    }

    #[test]
    fn add_keeps_supplied_metadata() {
        let mut lib = PatternLibrary::default();
        let t = lib
            .add_pattern("flag", &window(&[1.0, 2.0, 3.0]), TemplateMetadata::new("SPY", "5m"))
            .unwrap();
        assert_eq!(t.symbol, "SPY");
        assert_eq!(t.timeframe, "5m");
    }

    #[test]
    fn add_rejects_short_window() {
        let mut lib = PatternLibrary::default();
        let err = lib.add_pattern("x", &window(&[1.0]), TemplateMetadata::default());
        assert!(matches!(err, Err(LibraryError::Window(WindowError::TooShort { .. }))));
        assert!(lib.is_empty());
    }

    #[test]
    fn build_index_clears_dirty_and_sets_envelopes() {
        let mut lib = PatternLibrary::default();
        lib.add_pattern("a", &window(&[1.0, 2.0, 1.5, 3.0, 2.0]), TemplateMetadata::default())
            .unwrap();
        lib.build_index(None);
        assert!(!lib.is_index_dirty());
        let t = lib.iter().next().unwrap();
        let env = t.envelope.as_ref().unwrap();
        // derivative DTW compares the slope signal: len(normalized) - 2
        assert_eq!(env.len(), t.normalized.len() - 2);
    }

    #[test]
    fn augment_is_idempotent() {
        let mut lib = PatternLibrary::default();
        lib.add_pattern("bullish_flag", &window(&[1.0, 2.0, 3.0]), TemplateMetadata::default())
            .unwrap();
        lib.add_pattern("head_shoulders", &window(&[3.0, 2.0, 4.0]), TemplateMetadata::default())
            .unwrap();
        lib.build_index(None);

        assert_eq!(lib.augment(true), 2);
        assert!(lib.is_index_dirty());
        assert_eq!(lib.augment(true), 0);
        assert_eq!(lib.len(), 4);
        assert_eq!(
            lib.labels(),
            vec![
                Label::from("bearish_flag"),
                Label::from("bullish_flag"),
                Label::from("head_shoulders"),
                Label::from("head_shoulders_inverted"),
            ]
        );
    }

    #[test]
    fn augment_disabled_adds_nothing() {
        let mut lib = PatternLibrary::default();
        lib.add_pattern("a", &window(&[1.0, 2.0, 3.0]), TemplateMetadata::default())
            .unwrap();
        assert_eq!(lib.augment(false), 0);
        assert_eq!(lib.len(), 1);
    }

    #[test]
    fn remove_and_relabel() {
        let mut lib = PatternLibrary::default();
        let id = lib
            .add_pattern("a", &window(&[1.0, 2.0, 3.0]), TemplateMetadata::default())
            .unwrap()
            .id
            .clone();
        lib.build_index(None);

        lib.relabel(&id, "b").unwrap();
        assert!(!lib.is_index_dirty());
        assert_eq!(lib.templates_by_label("b").len(), 1);
        assert!(lib.templates_by_label("a").is_empty());

        assert!(matches!(
            lib.relabel(&TemplateId::new("nope"), "c"),
            Err(LibraryError::NotFound(_))
        ));

        assert!(lib.remove(&id).is_some());
        assert!(lib.is_index_dirty());
        assert!(lib.remove(&id).is_none());
    }

    #[test]
    fn stale_snapshot_computes_envelopes_without_mutation() {
        let mut lib = PatternLibrary::default();
        lib.add_pattern("a", &window(&[1.0, 2.0, 4.0, 3.0]), TemplateMetadata::default())
            .unwrap();
        lib.add_pattern("b", &window(&[4.0, 3.0, 1.0, 2.0]), TemplateMetadata::default())
            .unwrap();

        let snapshot = lib.snapshot(|t| t.label == "a");
        assert_eq!(snapshot.len(), 1);
        let view = snapshot.view();
        assert!(view.entries()[0].envelope.is_some());
        assert!(lib.iter().all(|t| t.envelope.is_none()));
        assert!(lib.is_index_dirty());
    }

    #[test]
    fn quality_score_rewards_smooth_windows() {
        let smooth = quality_score(&window(&[100.0, 101.0, 102.0, 103.0, 104.0]));
        let noisy = quality_score(&window(&[100.0, 130.0, 80.0, 140.0, 60.0]));
        assert!(smooth > noisy);
        assert!(smooth <= 1.0 && noisy >= 0.5);
        assert_eq!(quality_score(&window(&[100.0, 101.0])), 1.0);
    }

    #[test]
    fn fingerprint_tracks_content() {
        let mut lib = PatternLibrary::default();
        let empty = lib.fingerprint().unwrap();
        lib.add_pattern("a", &window(&[1.0, 2.0, 3.0]), TemplateMetadata::default())
            .unwrap();
        let one = lib.fingerprint().unwrap();
        assert_ne!(empty, one);
        assert_eq!(one, lib.fingerprint().unwrap());
    }
}
