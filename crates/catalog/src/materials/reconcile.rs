//! Reconciles captured swatches against live material groups.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use swatchbook_core::MaterialGroupId;

use super::{IdentityKey, LocalizedText, MaterialBook, MaterialGroup, MaterialSelection, MaterialSwatch};

/// One selection's group, pruned to the captured swatches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciledSelection {
    pub group_id: MaterialGroupId,
    pub title: LocalizedText,
    pub books: Vec<MaterialBook>,
}

/// Flat and grouped views over a product's selections.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconciledMaterials {
    /// Every captured swatch once, canonical where possible, in traversal order.
    pub flat: Vec<MaterialSwatch>,
    /// Group/book nesting per selection, independent of flat deduplication.
    pub grouped: Vec<ReconciledSelection>,
}

impl ReconciledMaterials {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flat.is_empty() && self.grouped.is_empty()
    }
}

/// Build both views.
#[must_use]
pub fn reconcile(selections: &[MaterialSelection]) -> ReconciledMaterials {
    ReconciledMaterials {
        flat: flatten(selections),
        grouped: group(selections),
    }
}

/// Flat view: the first occurrence of each identity key wins, across all
/// selections. Captured swatches are replaced by the group's current copy
/// when the group still has them.
#[must_use]
pub fn flatten(selections: &[MaterialSelection]) -> Vec<MaterialSwatch> {
    let mut seen: HashSet<&IdentityKey> = HashSet::new();
    let mut flat = Vec::new();

    for selection in selections {
        let canonical = selection
            .group
            .as_ref()
            .map(canonical_swatches)
            .unwrap_or_default();

        for captured in &selection.captured {
            if !seen.insert(&captured.key) {
                continue;
            }
            let swatch = canonical.get(&captured.key).copied().unwrap_or(captured);
            flat.push(swatch.clone());
        }
    }

    flat
}

/// Grouped view: each selection's group with books pruned to captured
/// swatches, in book order. Empty books and groups are dropped, as are
/// selections whose group did not dereference.
#[must_use]
pub fn group(selections: &[MaterialSelection]) -> Vec<ReconciledSelection> {
    selections
        .iter()
        .filter_map(|selection| {
            let group = selection.group.as_ref()?;
            let wanted: HashSet<&IdentityKey> =
                selection.captured.iter().map(|swatch| &swatch.key).collect();

            let books: Vec<MaterialBook> = group
                .books
                .iter()
                .filter_map(|book| {
                    let swatches: Vec<MaterialSwatch> = book
                        .swatches
                        .iter()
                        .filter(|swatch| wanted.contains(&swatch.key))
                        .cloned()
                        .collect();
                    (!swatches.is_empty()).then(|| MaterialBook {
                        title: book.title.clone(),
                        swatches,
                    })
                })
                .collect();

            (!books.is_empty()).then(|| ReconciledSelection {
                group_id: group.id.clone(),
                title: group.title.clone(),
                books,
            })
        })
        .collect()
}

/// Identity key → first swatch with that key in the group.
fn canonical_swatches(group: &MaterialGroup) -> HashMap<&IdentityKey, &MaterialSwatch> {
    let mut lookup = HashMap::new();
    for swatch in group.swatches() {
        lookup.entry(&swatch.key).or_insert(swatch);
    }
    lookup
}
