//! OS-keyed variants of a lifecycle step.
use crate::platform::{OsCondition, Platform};

/// The entries of one lifecycle step (check, install or configure).
///
/// `common` entries apply everywhere.  `by_os` holds at most one entry list
/// per [`OsCondition`]; on a given platform the single most specific matching
/// variant is appended to the common entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsVariants<T> {
    common: Vec<T>,
    by_os: Vec<(OsCondition, Vec<T>)>,
}

impl<T> Default for OsVariants<T> {
    fn default() -> Self {
        Self {
            common: Vec::new(),
            by_os: Vec::new(),
        }
    }
}

impl<T> OsVariants<T> {
    /// Variants with only un-gated entries.
    #[must_use]
    pub const fn common(entries: Vec<T>) -> Self {
        Self {
            common: entries,
            by_os: Vec::new(),
        }
    }

    /// Append un-gated entries.
    #[must_use]
    pub fn with_common(mut self, entries: Vec<T>) -> Self {
        self.common.extend(entries);
        self
    }

    /// Add entries gated on `condition`, appending to an existing variant for
    /// the same condition.
    #[must_use]
    pub fn with_variant(mut self, condition: OsCondition, entries: Vec<T>) -> Self {
        if let Some((_, existing)) = self.by_os.iter_mut().find(|(c, _)| *c == condition) {
            existing.extend(entries);
        } else {
            self.by_os.push((condition, entries));
        }
        self
    }

    /// The OS variant chosen on `platform`, if any.
    #[must_use]
    pub fn selected_condition(&self, platform: &Platform) -> Option<OsCondition> {
        self.by_os
            .iter()
            .map(|(c, _)| *c)
            .filter(|c| platform.matches(*c))
            .max_by_key(|c| c.specificity())
    }

    /// Entries that apply on `platform`: common entries, then the selected
    /// variant's entries.
    #[must_use]
    pub fn select(&self, platform: &Platform) -> Vec<&T> {
        let chosen = self.selected_condition(platform);
        let variant = self
            .by_os
            .iter()
            .filter(move |(c, _)| Some(*c) == chosen)
            .flat_map(|(_, entries)| entries);
        self.common.iter().chain(variant).collect()
    }

    /// Whether any entry is gated on an OS condition.
    #[must_use]
    pub fn has_os_variants(&self) -> bool {
        self.by_os.iter().any(|(_, entries)| !entries.is_empty())
    }

    /// Whether no entries are declared at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.common.is_empty() && !self.has_os_variants()
    }

    /// Every declared entry regardless of platform, for validation.
    pub fn iter_all(&self) -> impl Iterator<Item = &T> {
        self.common
            .iter()
            .chain(self.by_os.iter().flat_map(|(_, entries)| entries))
    }
}
