//! Read-only views over a template subset.
//!
//! An [`IndexSnapshot`] borrows templates from the live library and, when the
//! library index is stale, carries freshly computed envelopes alongside them.
//! A [`TemplateView`] is what the matcher consults: template plus envelope,
//! for the whole snapshot or any index subset of it. Nothing here mutates the
//! library, so evaluation folds can share one snapshot.

use crate::domain::{Envelope, Template};

/// Templates selected from a library, with envelopes if the index was stale.
#[derive(Debug, Clone)]
pub struct IndexSnapshot<'a> {
    templates: Vec<&'a Template>,
    computed: Option<Vec<Envelope>>,
}

impl<'a> IndexSnapshot<'a> {
    pub(crate) fn new(templates: Vec<&'a Template>, computed: Option<Vec<Envelope>>) -> Self {
        debug_assert!(computed
            .as_ref()
            .map_or(true, |envs| envs.len() == templates.len()));
        Self {
            templates,
            computed,
        }
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Snapshot templates in library order.
    pub fn templates(&self) -> &[&'a Template] {
        &self.templates
    }

    pub fn get(&self, index: usize) -> Option<&'a Template> {
        self.templates.get(index).copied()
    }

    fn entry(&self, index: usize) -> ViewEntry<'_> {
        let template = self.templates[index];
        let envelope = match &self.computed {
            Some(envs) => envs.get(index),
            None => template.envelope.as_ref(),
        };
        ViewEntry { template, envelope }
    }

    /// View over every template in the snapshot.
    pub fn view(&self) -> TemplateView<'_> {
        TemplateView {
            entries: (0..self.templates.len()).map(|i| self.entry(i)).collect(),
        }
    }

    /// View over the given snapshot positions; out-of-range positions are
    /// skipped.
    pub fn view_of(&self, indices: &[usize]) -> TemplateView<'_> {
        TemplateView {
            entries: indices
                .iter()
                .filter(|&&i| i < self.templates.len())
                .map(|&i| self.entry(i))
                .collect(),
        }
    }
}

/// One template and its pruning envelope (absent if never indexed).
#[derive(Debug, Clone, Copy)]
pub struct ViewEntry<'v> {
    pub template: &'v Template,
    pub envelope: Option<&'v Envelope>,
}

/// Immutable template subset consulted by the matcher.
#[derive(Debug, Clone, Default)]
pub struct TemplateView<'v> {
    entries: Vec<ViewEntry<'v>>,
}

impl<'v> TemplateView<'v> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ViewEntry<'v>] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &ViewEntry<'v>> {
        self.entries.iter()
    }
}

impl<'v> FromIterator<ViewEntry<'v>> for TemplateView<'v> {
    fn from_iter<I: IntoIterator<Item = ViewEntry<'v>>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
