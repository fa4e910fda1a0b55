//! Drug catalog as loaded from the calculation service.

use peds_dose_api::DrugCatalogEntry;
use serde::{Deserialize, Serialize};
use strsim::{jaro_winkler, normalized_levenshtein};

/// Minimum similarity for a search hit.
const MIN_SEARCH_SCORE: f64 = 0.5;

/// Drugs sharing a category, in catalog order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryGroup {
    pub category: String,
    pub drugs: Vec<DrugCatalogEntry>,
}

/// A ranked search hit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogMatch {
    pub drug: DrugCatalogEntry,
    /// Similarity in 0.0 - 1.0; substring hits score 1.0
    pub score: f64,
}

/// The list of drugs offered on the drug-selection step.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DrugCatalog {
    entries: Vec<DrugCatalogEntry>,
}

impl DrugCatalog {
    pub fn new(entries: Vec<DrugCatalogEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[DrugCatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find(&self, drug_id: &str) -> Option<&DrugCatalogEntry> {
        self.entries.iter().find(|d| d.id == drug_id)
    }

    /// Group by category, categories in first-seen order.
    pub fn by_category(&self) -> Vec<CategoryGroup> {
        let mut groups: Vec<CategoryGroup> = Vec::new();
        for drug in &self.entries {
            match groups.iter_mut().find(|g| g.category == drug.category) {
                Some(group) => group.drugs.push(drug.clone()),
                None => groups.push(CategoryGroup {
                    category: drug.category.clone(),
                    drugs: vec![drug.clone()],
                }),
            }
        }
        groups
    }

    /// Rank drugs by how well `query` matches their generic or brand names.
    ///
    /// An empty query returns the first `limit` drugs unranked.
    pub fn search(&self, query: &str, limit: usize) -> Vec<CatalogMatch> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return self
                .entries
                .iter()
                .take(limit)
                .map(|drug| CatalogMatch {
                    drug: drug.clone(),
                    score: 1.0,
                })
                .collect();
        }

        let mut matches: Vec<CatalogMatch> = self
            .entries
            .iter()
            .map(|drug| CatalogMatch {
                drug: drug.clone(),
                score: score_drug(drug, &query),
            })
            .filter(|m| m.score >= MIN_SEARCH_SCORE)
            .collect();

        // Stable sort keeps catalog order among equal scores
        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(limit);
        matches
    }
}

fn score_drug(drug: &DrugCatalogEntry, query: &str) -> f64 {
    std::iter::once(&drug.generic_name)
        .chain(drug.brand_names.iter())
        .map(|name| {
            let name = name.to_lowercase();
            if name.contains(query) {
                1.0
            } else {
                fuzzy_match(query, &name)
            }
        })
        .fold(0.0, f64::max)
}

fn fuzzy_match(a: &str, b: &str) -> f64 {
    // Jaro-Winkler favours shared prefixes, Levenshtein overall edit distance
    jaro_winkler(a, b) * 0.6 + normalized_levenshtein(a, b) * 0.4
}
