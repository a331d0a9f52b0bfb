//! # Query Engine
//!
//! Evaluates a [`ProductFilter`] over the snapshot's rows and slices the
//! matches into a page.
//!
//! Every query is one linear scan in insertion order. There is no per-field
//! index: the data is read-only, a single snapshot, and tens of thousands of
//! rows, so O(n) per query is the intended cost. The scan stops early once a
//! match beyond the window proves `has_more`.

use shelf_core::{Page, PageWindow, ProductFilter, ProductRecord};

/// Return the `window` slice of the records matching `filter`.
///
/// Results keep source order. An unsatisfiable filter (inverted date range)
/// yields an empty page rather than an error.
pub fn search<'a>(
    records: &'a [ProductRecord],
    filter: &ProductFilter,
    window: PageWindow,
) -> Page<&'a ProductRecord> {
    if filter.is_unsatisfiable() {
        return Page::empty(window);
    }

    let mut page = Page {
        records: Vec::with_capacity(window.limit.min(records.len())),
        has_more: false,
        offset: window.offset,
        limit: window.limit,
    };

    let end = window.end();
    for (position, record) in records.iter().filter(|r| filter.matches(r)).enumerate() {
        if position >= end {
            page.has_more = true;
            break;
        }
        if window.contains(position) {
            page.records.push(record);
        }
    }

    page
}

/// Number of records matching `filter`.
pub fn count(records: &[ProductRecord], filter: &ProductFilter) -> usize {
    if filter.is_unsatisfiable() {
        return 0;
    }
    records.iter().filter(|r| filter.matches(r)).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use shelf_core::{Pagination, MAX_PAGE_SIZE};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// The three-row dataset: A 2024-01-01, B 2024-02-01, A 2024-03-01.
    fn three_rows() -> Vec<ProductRecord> {
        vec![
            ProductRecord {
                brand: "A".into(),
                event_date: Some(date(2024, 1, 1)),
                ..ProductRecord::at(0)
            },
            ProductRecord {
                brand: "B".into(),
                event_date: Some(date(2024, 2, 1)),
                ..ProductRecord::at(1)
            },
            ProductRecord {
                brand: "A".into(),
                event_date: Some(date(2024, 3, 1)),
                ..ProductRecord::at(2)
            },
        ]
    }

    /// A larger mixed dataset for property-style checks.
    fn catalog_rows() -> Vec<ProductRecord> {
        let brands = ["STANLEY", "DEWALT", "CASABLANCA", "Stanley"];
        let categories = ["CAMPING", "HERRAMIENTAS", "PINTURAS"];
        (0..57)
            .map(|i| ProductRecord {
                brand: brands[i % brands.len()].to_string(),
                category: categories[i % categories.len()].to_string(),
                sku: format!("SKU{}", i % 11),
                client_id: (i % 5).to_string(),
                event_date: if i % 13 == 0 {
                    None
                } else {
                    Some(date(2024, 1, 1) + chrono::Duration::days(i as i64))
                },
                ..ProductRecord::at(i)
            })
            .collect()
    }

    fn ordinals(page: &Page<&ProductRecord>) -> Vec<usize> {
        page.records.iter().map(|r| r.ordinal).collect()
    }

    fn all_pages(records: &[ProductRecord], filter: &ProductFilter, limit: i64) -> Vec<usize> {
        let mut collected = Vec::new();
        let mut offset = 0;
        loop {
            let page = search(records, filter, Pagination::new(limit, offset).window());
            collected.extend(ordinals(&page));
            if !page.has_more {
                break;
            }
            offset += limit;
        }
        collected
    }

    #[test]
    fn test_brand_filter_keeps_insertion_order() {
        let rows = three_rows();
        let filter = ProductFilter {
            brand: Some("A".into()),
            ..ProductFilter::default()
        };
        let page = search(&rows, &filter, Pagination::default().window());
        assert_eq!(ordinals(&page), vec![0, 2]);
        assert!(!page.has_more);
    }

    #[test]
    fn test_has_more_at_each_offset() {
        let rows = three_rows();
        let all = ProductFilter::all();

        let first = search(&rows, &all, Pagination::new(1, 0).window());
        assert_eq!(first.len(), 1);
        assert!(first.has_more);

        let last = search(&rows, &all, Pagination::new(1, 2).window());
        assert_eq!(ordinals(&last), vec![2]);
        assert!(!last.has_more);

        let past_end = search(&rows, &all, Pagination::new(1, 3).window());
        assert!(past_end.is_empty());
        assert!(!past_end.has_more);
    }

    #[test]
    fn test_no_matches_is_an_empty_page() {
        let rows = three_rows();
        let filter = ProductFilter {
            brand: Some("Z".into()),
            ..ProductFilter::default()
        };
        let page = search(&rows, &filter, Pagination::default().window());
        assert!(page.is_empty());
        assert!(!page.has_more);
    }

    #[test]
    fn test_unknown_date_is_excluded_from_ranges_only() {
        let mut rows = three_rows();
        rows.push(ProductRecord {
            brand: "A".into(),
            event_date: None,
            ..ProductRecord::at(3)
        });

        let unfiltered = search(&rows, &ProductFilter::all(), Pagination::default().window());
        assert_eq!(ordinals(&unfiltered), vec![0, 1, 2, 3]);

        let ranged = ProductFilter {
            date_from: Some(date(2000, 1, 1)),
            ..ProductFilter::default()
        };
        let page = search(&rows, &ranged, Pagination::default().window());
        assert_eq!(ordinals(&page), vec![0, 1, 2]);
    }

    #[test]
    fn test_date_range() {
        let rows = three_rows();
        let filter = ProductFilter {
            date_from: Some(date(2024, 1, 15)),
            date_to: Some(date(2024, 3, 1)),
            ..ProductFilter::default()
        };
        let page = search(&rows, &filter, Pagination::default().window());
        assert_eq!(ordinals(&page), vec![1, 2]);
    }

    #[test]
    fn test_inverted_range_yields_nothing() {
        let rows = three_rows();
        let filter = ProductFilter {
            date_from: Some(date(2024, 3, 1)),
            date_to: Some(date(2024, 1, 1)),
            ..ProductFilter::default()
        };
        let page = search(&rows, &filter, Pagination::default().window());
        assert!(page.is_empty());
        assert!(!page.has_more);
        assert_eq!(count(&rows, &filter), 0);
    }

    #[test]
    fn test_limit_is_clamped_to_max_page_size() {
        let rows: Vec<ProductRecord> = (0..MAX_PAGE_SIZE + 10).map(ProductRecord::at).collect();
        let page = search(&rows, &ProductFilter::all(), Pagination::new(i64::MAX, 0).window());
        assert_eq!(page.len(), MAX_PAGE_SIZE);
        assert_eq!(page.limit, MAX_PAGE_SIZE);
        assert!(page.has_more);
    }

    #[test]
    fn test_search_is_idempotent() {
        let rows = catalog_rows();
        let filter = ProductFilter {
            category: Some("CAMPING".into()),
            ..ProductFilter::default()
        };
        let window = Pagination::new(7, 3).window();
        let a = search(&rows, &filter, window);
        let b = search(&rows, &filter, window);
        assert_eq!(ordinals(&a), ordinals(&b));
        assert_eq!(a.has_more, b.has_more);
    }

    #[test]
    fn test_pages_concatenate_to_the_full_filtered_set() {
        let rows = catalog_rows();
        let filters = [
            ProductFilter::all(),
            ProductFilter {
                brand: Some("STANLEY".into()),
                ..ProductFilter::default()
            },
            ProductFilter {
                date_from: Some(date(2024, 1, 10)),
                date_to: Some(date(2024, 2, 10)),
                ..ProductFilter::default()
            },
        ];
        for filter in &filters {
            let expected: Vec<usize> = rows
                .iter()
                .filter(|r| filter.matches(r))
                .map(|r| r.ordinal)
                .collect();
            for limit in [1, 4, 10, 100] {
                assert_eq!(all_pages(&rows, filter, limit), expected, "limit {}", limit);
            }
        }
    }

    #[test]
    fn test_conjunction_is_intersection_of_single_predicates() {
        let rows = catalog_rows();
        let singles = [
            ProductFilter {
                brand: Some("STANLEY".into()),
                ..ProductFilter::default()
            },
            ProductFilter {
                category: Some("CAMPING".into()),
                ..ProductFilter::default()
            },
            ProductFilter {
                client_id: Some("2".into()),
                ..ProductFilter::default()
            },
            ProductFilter {
                date_from: Some(date(2024, 1, 5)),
                ..ProductFilter::default()
            },
        ];
        let combined = ProductFilter {
            brand: Some("STANLEY".into()),
            category: Some("CAMPING".into()),
            client_id: Some("2".into()),
            date_from: Some(date(2024, 1, 5)),
            ..ProductFilter::default()
        };

        let mut intersection: Vec<usize> = all_pages(&rows, &ProductFilter::all(), 100);
        for single in &singles {
            let matched = all_pages(&rows, single, 100);
            intersection.retain(|o| matched.contains(o));
        }

        assert_eq!(all_pages(&rows, &combined, 100), intersection);
    }

    #[test]
    fn test_sku_and_client_filters() {
        let rows = catalog_rows();
        let filter = ProductFilter {
            sku: Some("SKU3".into()),
            ..ProductFilter::default()
        };
        let page = search(&rows, &filter, Pagination::default().window());
        assert!(page.records.iter().all(|r| r.sku == "SKU3"));
        assert_eq!(page.len(), count(&rows, &filter));
    }
}
