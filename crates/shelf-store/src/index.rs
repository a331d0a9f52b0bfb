//! # Index Builder
//!
//! Distinct brand and category sets plus record counts, derived once after
//! load. Distinctness is exact and case-sensitive: `"Stanley"` and
//! `"STANLEY"` are two brands, because the source's casing is what the
//! consumer needs to see.

use std::collections::BTreeSet;

use shelf_core::{DatasetStats, ProductRecord};

/// Marker the source uses for "brand not applicable".
pub const DEFAULT_PLACEHOLDER_BRAND: &str = "No Aplica";

/// Knobs for index construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexOptions {
    /// Brand values that mean "no brand" and are left out of the brand set.
    pub placeholder_brands: Vec<String>,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            placeholder_brands: vec![DEFAULT_PLACEHOLDER_BRAND.to_string()],
        }
    }
}

/// Auxiliary lookup structures over one snapshot's records.
#[derive(Debug, Clone, Default)]
pub struct DatasetIndex {
    brands: BTreeSet<String>,
    categories: BTreeSet<String>,
    stats: DatasetStats,
}

impl DatasetIndex {
    pub fn build(records: &[ProductRecord], options: &IndexOptions) -> Self {
        let mut brands = BTreeSet::new();
        let mut categories = BTreeSet::new();

        for record in records {
            if !record.brand.is_empty()
                && !options.placeholder_brands.iter().any(|p| *p == record.brand)
                && !brands.contains(record.brand.as_str())
            {
                brands.insert(record.brand.clone());
            }
            if !record.category.is_empty() && !categories.contains(record.category.as_str()) {
                categories.insert(record.category.clone());
            }
        }

        let stats = DatasetStats {
            total_records: records.len(),
            brands_count: brands.len(),
            categories_count: categories.len(),
        };

        Self {
            brands,
            categories,
            stats,
        }
    }

    #[inline]
    pub fn stats(&self) -> DatasetStats {
        self.stats
    }

    /// Distinct brands in ascending lexicographic order.
    pub fn brands(&self) -> impl Iterator<Item = &str> {
        self.brands.iter().map(String::as_str)
    }

    /// Distinct categories in ascending lexicographic order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(String::as_str)
    }

    pub fn has_brand(&self, brand: &str) -> bool {
        self.brands.contains(brand)
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.categories.contains(category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ordinal: usize, brand: &str, category: &str) -> ProductRecord {
        ProductRecord {
            brand: brand.to_string(),
            category: category.to_string(),
            ..ProductRecord::at(ordinal)
        }
    }

    #[test]
    fn test_distinct_values_are_sorted_and_unique() {
        let records = vec![
            record(0, "STANLEY", "CAMPING"),
            record(1, "DEWALT", "HERRAMIENTAS"),
            record(2, "STANLEY", "CAMPING"),
            record(3, "CASABLANCA", "PINTURAS"),
        ];
        let index = DatasetIndex::build(&records, &IndexOptions::default());

        let brands: Vec<&str> = index.brands().collect();
        assert_eq!(brands, vec!["CASABLANCA", "DEWALT", "STANLEY"]);
        let categories: Vec<&str> = index.categories().collect();
        assert_eq!(categories, vec!["CAMPING", "HERRAMIENTAS", "PINTURAS"]);
    }

    #[test]
    fn test_distinctness_is_case_sensitive() {
        let records = vec![record(0, "Stanley", "X"), record(1, "STANLEY", "x")];
        let index = DatasetIndex::build(&records, &IndexOptions::default());
        assert_eq!(index.stats().brands_count, 2);
        assert_eq!(index.stats().categories_count, 2);
        assert!(index.has_brand("Stanley"));
        assert!(!index.has_brand("stanley"));
    }

    #[test]
    fn test_empty_and_placeholder_values_are_not_distinct_values() {
        let records = vec![
            record(0, "", ""),
            record(1, DEFAULT_PLACEHOLDER_BRAND, "CAMPING"),
            record(2, "STANLEY", "CAMPING"),
        ];
        let index = DatasetIndex::build(&records, &IndexOptions::default());
        assert_eq!(index.brands().collect::<Vec<_>>(), vec!["STANLEY"]);
        assert_eq!(index.stats().total_records, 3);
        assert_eq!(index.stats().categories_count, 1);
    }

    #[test]
    fn test_placeholders_are_configurable() {
        let records = vec![record(0, DEFAULT_PLACEHOLDER_BRAND, "C"), record(1, "N/A", "C")];
        let options = IndexOptions {
            placeholder_brands: vec!["N/A".to_string()],
        };
        let index = DatasetIndex::build(&records, &options);
        assert_eq!(index.brands().collect::<Vec<_>>(), vec![DEFAULT_PLACEHOLDER_BRAND]);
    }
}
