//! # Snapshot
//!
//! The full, immutable in-memory materialization of the dataset: the records
//! in source order, the index derived from them, and what the loader reported.
//! A snapshot is never mutated; replacing data means building a new one.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use shelf_core::{DatasetStats, Page, Pagination, ProductFilter, ProductRecord};

use crate::engine;
use crate::error::LoadError;
use crate::index::{DatasetIndex, IndexOptions};
use crate::loader::{self, LoadReport};

#[derive(Debug)]
pub struct Snapshot {
    records: Vec<ProductRecord>,
    index: DatasetIndex,
    report: LoadReport,
    source: Option<PathBuf>,
    loaded_at: DateTime<Utc>,
}

impl Snapshot {
    /// Load `path` and index it.
    pub fn load(path: &Path, options: &IndexOptions) -> Result<Self, LoadError> {
        let loaded = loader::load(path)?;
        let mut snapshot = Self::build(loaded.records, loaded.report, options);
        snapshot.source = Some(path.to_path_buf());
        Ok(snapshot)
    }

    /// Build a snapshot from already decoded records.
    ///
    /// Ordinals are reassigned from the vector's order.
    pub fn from_records(mut records: Vec<ProductRecord>, options: &IndexOptions) -> Self {
        for (ordinal, record) in records.iter_mut().enumerate() {
            record.ordinal = ordinal;
        }
        let report = LoadReport {
            rows: records.len(),
            ..LoadReport::default()
        };
        Self::build(records, report, options)
    }

    fn build(records: Vec<ProductRecord>, report: LoadReport, options: &IndexOptions) -> Self {
        let index = DatasetIndex::build(&records, options);
        Self {
            records,
            index,
            report,
            source: None,
            loaded_at: Utc::now(),
        }
    }

    // =========================================================================
    // Query Engine
    // =========================================================================

    pub fn search(&self, filter: &ProductFilter, pagination: Pagination) -> Page<&ProductRecord> {
        engine::search(&self.records, filter, pagination.window())
    }

    pub fn count(&self, filter: &ProductFilter) -> usize {
        engine::count(&self.records, filter)
    }

    // =========================================================================
    // Statistics Aggregator
    // =========================================================================

    /// O(1): read from the index built at load.
    #[inline]
    pub fn stats(&self) -> DatasetStats {
        self.index.stats()
    }

    pub fn list_brands(&self) -> Vec<String> {
        self.index.brands().map(str::to_string).collect()
    }

    pub fn list_categories(&self) -> Vec<String> {
        self.index.categories().map(str::to_string).collect()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn records(&self) -> &[ProductRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn index(&self) -> &DatasetIndex {
        &self.index
    }

    pub fn report(&self) -> &LoadReport {
        &self.report
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;

    const CSV: &str = "\
brand,category,sku,event_date,client_id
STANLEY,CAMPING,K1,20240129,8
CASABLANCA,PINTURAS,S1,20240129,8
DEWALT,HERRAMIENTAS,D1,20240130,10
STANLEY,CAMPING,K2,bad,10
";

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_builds_index_and_report() {
        let file = write_csv(CSV);
        let snapshot = Snapshot::load(file.path(), &IndexOptions::default()).unwrap();

        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot.source(), Some(file.path()));
        assert_eq!(snapshot.report().warnings, 1);
        assert_eq!(
            snapshot.stats(),
            DatasetStats {
                total_records: 4,
                brands_count: 3,
                categories_count: 3,
            }
        );
        assert_eq!(
            snapshot.list_brands(),
            vec!["CASABLANCA", "DEWALT", "STANLEY"]
        );
    }

    #[test]
    fn test_stats_total_matches_unfiltered_row_count() {
        let file = write_csv(CSV);
        let snapshot = Snapshot::load(file.path(), &IndexOptions::default()).unwrap();

        let mut total = 0;
        let mut offset = 0;
        loop {
            let page = snapshot.search(&ProductFilter::all(), Pagination::new(3, offset));
            total += page.len();
            if !page.has_more {
                break;
            }
            offset += 3;
        }
        assert_eq!(total, snapshot.stats().total_records);
        assert_eq!(snapshot.count(&ProductFilter::all()), total);
    }

    #[test]
    fn test_date_range_skips_rows_whose_date_did_not_parse() {
        let file = write_csv(CSV);
        let snapshot = Snapshot::load(file.path(), &IndexOptions::default()).unwrap();
        assert!(snapshot.records()[3].event_date.is_none());

        let ordinals = |filter: &ProductFilter| -> Vec<usize> {
            snapshot
                .search(filter, Pagination::default())
                .records
                .iter()
                .map(|r| r.ordinal)
                .collect()
        };

        let ranged = ProductFilter {
            date_from: NaiveDate::from_ymd_opt(2024, 1, 1),
            ..ProductFilter::default()
        };
        assert_eq!(ordinals(&ranged), vec![0, 1, 2]);
        assert_eq!(snapshot.count(&ranged), 3);

        let bounded = ProductFilter {
            brand: Some("STANLEY".into()),
            date_to: NaiveDate::from_ymd_opt(2024, 12, 31),
            ..ProductFilter::default()
        };
        assert_eq!(ordinals(&bounded), vec![0]);

        assert_eq!(ordinals(&ProductFilter::all()), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_listings_are_sorted_without_duplicates() {
        let file = write_csv(CSV);
        let snapshot = Snapshot::load(file.path(), &IndexOptions::default()).unwrap();
        for listing in [snapshot.list_brands(), snapshot.list_categories()] {
            assert!(listing.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_from_records_reassigns_ordinals() {
        let records = vec![ProductRecord::at(40), ProductRecord::at(7)];
        let snapshot = Snapshot::from_records(records, &IndexOptions::default());
        let ordinals: Vec<usize> = snapshot.records().iter().map(|r| r.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1]);
        assert!(snapshot.source().is_none());
    }
}
