//! # shelf-core — The "Shape" of SHELF
//!
//! Defines the data the rest of the workspace moves around: one
//! [`ProductRecord`] per dataset row, the typed [`ProductFilter`] a caller can
//! ask for, the [`Pagination`] it arrives with and the [`PageWindow`] it is
//! clamped into, plus the [`Capability`] that proves a caller was verified.
//!
//! Nothing in this crate performs I/O.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};

/// Hard upper bound on the number of records a single page may carry.
pub const MAX_PAGE_SIZE: usize = 100;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: usize = 100;

// =============================================================================
// Record
// =============================================================================

/// One row of the product analytics dataset.
///
/// Records are created once by the loader and never mutated afterwards.
/// String fields default to `""` and numeric fields to zero (or `None` for
/// identifiers) when the source cell was missing or malformed.
///
/// # Ordering Key
///
/// Records are ordered by `ordinal`, the zero-based position of the row in the
/// source file. It is the only field that takes part in [`Ord`] and
/// [`PartialEq`]: within one snapshot two records are the same row iff they
/// share an ordinal, and every listing of records is in ordinal order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub ordinal: usize,
    pub product_name: String,
    /// Secondary product name column, kept apart from `product_name`.
    pub product_name_alt: String,
    pub brand: String,
    pub category: String,
    pub sku: String,
    pub client_id: String,
    /// `None` when the source date was missing or unparseable ("unknown").
    pub event_date: Option<NaiveDate>,
    pub add_to_cart_count: u64,
    pub removed_from_cart_count: u64,
    pub detail_views_count: u64,
    pub product_quantity: u64,
    pub page_views_count: u64,
    pub revenue_amount: f64,
    pub view_id: Option<i64>,
    pub device_type_id: Option<i64>,
    pub source_medium_id: Option<i64>,
    pub product_id: Option<i64>,
    pub flag: Option<i64>,
    pub product_code: String,
    pub detailed_category: String,
    pub analytics_category: String,
    pub alt_sku: String,
    pub sasasa: String,
}

impl Ord for ProductRecord {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.ordinal.cmp(&other.ordinal)
    }
}

impl PartialOrd for ProductRecord {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ProductRecord {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.ordinal == other.ordinal
    }
}

impl Eq for ProductRecord {}

impl ProductRecord {
    /// A blank record at the given source position.
    pub fn at(ordinal: usize) -> Self {
        Self {
            ordinal,
            ..Self::default()
        }
    }
}

// =============================================================================
// Filter
// =============================================================================

/// A conjunction of optional predicates. Absent predicates match everything.
///
/// String predicates are exact and case-sensitive. Date predicates are
/// inclusive and never match a record whose date is unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(
        default,
        alias = "client_id",
        deserialize_with = "string_or_integer",
        skip_serializing_if = "Option::is_none"
    )]
    pub client_id: Option<String>,
    #[serde(default, alias = "date_from", skip_serializing_if = "Option::is_none")]
    pub date_from: Option<NaiveDate>,
    #[serde(default, alias = "date_to", skip_serializing_if = "Option::is_none")]
    pub date_to: Option<NaiveDate>,
}

impl ProductFilter {
    /// A filter that matches every record.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// True when no record can ever match (`date_from` after `date_to`).
    pub fn is_unsatisfiable(&self) -> bool {
        matches!((self.date_from, self.date_to), (Some(from), Some(to)) if from > to)
    }

    /// Evaluate every present predicate against `record`.
    pub fn matches(&self, record: &ProductRecord) -> bool {
        exact(&self.brand, &record.brand)
            && exact(&self.category, &record.category)
            && exact(&self.sku, &record.sku)
            && exact(&self.client_id, &record.client_id)
            && self.matches_date(record.event_date)
    }

    fn matches_date(&self, date: Option<NaiveDate>) -> bool {
        if self.date_from.is_none() && self.date_to.is_none() {
            return true;
        }
        let Some(date) = date else {
            return false;
        };
        self.date_from.map_or(true, |from| from <= date)
            && self.date_to.map_or(true, |to| date <= to)
    }
}

#[inline]
fn exact(wanted: &Option<String>, actual: &str) -> bool {
    wanted.as_deref().map_or(true, |w| w == actual)
}

/// Client ids travel as strings, but JSON callers often send them as numbers.
fn string_or_integer<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    }))
}

/// Page bounds arrive as numbers or query-string text. Integers past the
/// `i64` range saturate; blank text counts as absent.
fn saturating_integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Signed(i64),
        Unsigned(u64),
        Float(f64),
        Text(String),
    }

    let Some(raw) = Option::<Raw>::deserialize(deserializer)? else {
        return Ok(None);
    };
    match raw {
        Raw::Signed(n) => Ok(Some(n)),
        Raw::Unsigned(n) => Ok(Some(i64::try_from(n).unwrap_or(i64::MAX))),
        // `as` saturates at the i64 bounds.
        Raw::Float(f) => Ok(Some(f as i64)),
        Raw::Text(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            parse_saturating(text)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("expected an integer, got {:?}", text)))
        }
    }
}

fn parse_saturating(text: &str) -> Option<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(match text.parse::<i64>() {
        Ok(n) => n,
        Err(_) if negative => i64::MIN,
        Err(_) => i64::MAX,
    })
}

// =============================================================================
// Pagination
// =============================================================================

/// Pagination exactly as the caller sent it. Nothing here is trusted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default, deserialize_with = "saturating_integer")]
    pub limit: Option<i64>,
    #[serde(default, deserialize_with = "saturating_integer")]
    pub offset: Option<i64>,
}

impl Pagination {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self {
            limit: Some(limit),
            offset: Some(offset),
        }
    }

    /// Clamp into a window. Out-of-range values are clamped, never rejected.
    pub fn window(&self) -> PageWindow {
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE as i64);
        PageWindow::clamped(limit, self.offset.unwrap_or(0))
    }
}

/// A validated `[offset, offset + limit)` slice of an ordered result set.
///
/// # Invariants
/// - `1 <= limit <= MAX_PAGE_SIZE`
/// - `end()` never overflows (saturates at `usize::MAX`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageWindow {
    pub offset: usize,
    pub limit: usize,
}

impl PageWindow {
    pub fn clamped(limit: i64, offset: i64) -> Self {
        let limit = limit.clamp(1, MAX_PAGE_SIZE as i64) as usize;
        let offset = usize::try_from(offset.max(0)).unwrap_or(usize::MAX);
        Self { offset, limit }
    }

    /// One past the last position inside the window.
    #[inline]
    pub fn end(&self) -> usize {
        self.offset.saturating_add(self.limit)
    }

    /// Whether the `position`-th match (zero-based) belongs on this page.
    #[inline]
    pub fn contains(&self, position: usize) -> bool {
        position >= self.offset && position < self.end()
    }

    /// Number of rows this window yields out of `total` matches.
    #[inline]
    pub fn page_len(&self, total: usize) -> usize {
        total.saturating_sub(self.offset).min(self.limit)
    }

    /// True iff at least one match lies beyond the window.
    #[inline]
    pub fn has_more(&self, total: usize) -> bool {
        total > self.end()
    }
}

/// One page of results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<R = ProductRecord> {
    pub records: Vec<R>,
    pub has_more: bool,
    pub offset: usize,
    pub limit: usize,
}

impl<R> Page<R> {
    pub fn empty(window: PageWindow) -> Self {
        Self {
            records: Vec::new(),
            has_more: false,
            offset: window.offset,
            limit: window.limit,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Page<&ProductRecord> {
    /// Detach the page from the snapshot it borrows from.
    pub fn into_owned(self) -> Page<ProductRecord> {
        Page {
            records: self.records.into_iter().cloned().collect(),
            has_more: self.has_more,
            offset: self.offset,
            limit: self.limit,
        }
    }
}

// =============================================================================
// Search request (transport shape)
// =============================================================================

/// Every key a transport may pass to a search. Unrecognized keys are ignored
/// so that newer clients keep working against older servers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(
        default,
        alias = "client_id",
        deserialize_with = "string_or_integer",
        skip_serializing_if = "Option::is_none"
    )]
    pub client_id: Option<String>,
    #[serde(default, alias = "date_from", skip_serializing_if = "Option::is_none")]
    pub date_from: Option<NaiveDate>,
    #[serde(default, alias = "date_to", skip_serializing_if = "Option::is_none")]
    pub date_to: Option<NaiveDate>,
    #[serde(
        default,
        deserialize_with = "saturating_integer",
        skip_serializing_if = "Option::is_none"
    )]
    pub limit: Option<i64>,
    #[serde(
        default,
        deserialize_with = "saturating_integer",
        skip_serializing_if = "Option::is_none"
    )]
    pub offset: Option<i64>,
}

impl SearchRequest {
    pub fn into_parts(self) -> (ProductFilter, Pagination) {
        let filter = ProductFilter {
            brand: self.brand,
            category: self.category,
            sku: self.sku,
            client_id: self.client_id,
            date_from: self.date_from,
            date_to: self.date_to,
        };
        let pagination = Pagination {
            limit: self.limit,
            offset: self.offset,
        };
        (filter, pagination)
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Dataset-wide counters, computed once at load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetStats {
    pub total_records: usize,
    pub brands_count: usize,
    pub categories_count: usize,
}

// =============================================================================
// Capability
// =============================================================================

/// Proof that a caller was authenticated by the token verifier.
///
/// Holding one only says the token's signature checked out when it was
/// verified; expiry is re-checked against the clock at every use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub subject: String,
    pub expires_at: DateTime<Utc>,
}

impl Capability {
    pub fn new(subject: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            subject: subject.into(),
            expires_at,
        }
    }

    #[inline]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(ordinal: usize, brand: &str, event_date: Option<NaiveDate>) -> ProductRecord {
        ProductRecord {
            brand: brand.to_string(),
            event_date,
            ..ProductRecord::at(ordinal)
        }
    }

    #[test]
    fn test_ordering_is_by_ordinal_only() {
        let a = record(1, "ZZZ", None);
        let b = record(2, "AAA", Some(date(2024, 1, 1)));
        assert!(a < b);
        assert_eq!(record(3, "X", None), record(3, "Y", None));
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = ProductFilter::all();
        assert!(filter.is_empty());
        assert!(filter.matches(&record(0, "", None)));
        assert!(filter.matches(&record(1, "STANLEY", Some(date(2024, 1, 29)))));
    }

    #[test]
    fn test_string_predicates_are_exact_and_case_sensitive() {
        let filter = ProductFilter {
            brand: Some("STANLEY".into()),
            ..ProductFilter::default()
        };
        assert!(filter.matches(&record(0, "STANLEY", None)));
        assert!(!filter.matches(&record(0, "Stanley", None)));
        assert!(!filter.matches(&record(0, "STANLEY ", None)));
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let filter = ProductFilter {
            date_from: Some(date(2024, 1, 1)),
            date_to: Some(date(2024, 1, 31)),
            ..ProductFilter::default()
        };
        assert!(filter.matches(&record(0, "A", Some(date(2024, 1, 1)))));
        assert!(filter.matches(&record(0, "A", Some(date(2024, 1, 31)))));
        assert!(!filter.matches(&record(0, "A", Some(date(2024, 2, 1)))));
    }

    #[test]
    fn test_unknown_date_never_matches_a_range() {
        let from_only = ProductFilter {
            date_from: Some(date(2000, 1, 1)),
            ..ProductFilter::default()
        };
        let to_only = ProductFilter {
            date_to: Some(date(2100, 1, 1)),
            ..ProductFilter::default()
        };
        assert!(!from_only.matches(&record(0, "A", None)));
        assert!(!to_only.matches(&record(0, "A", None)));
    }

    #[test]
    fn test_inverted_range_is_unsatisfiable() {
        let filter = ProductFilter {
            date_from: Some(date(2024, 3, 1)),
            date_to: Some(date(2024, 1, 1)),
            ..ProductFilter::default()
        };
        assert!(filter.is_unsatisfiable());
        assert!(!ProductFilter::all().is_unsatisfiable());
    }

    #[test]
    fn test_pagination_defaults_and_clamping() {
        assert_eq!(
            Pagination::default().window(),
            PageWindow {
                offset: 0,
                limit: DEFAULT_PAGE_SIZE
            }
        );
        assert_eq!(Pagination::new(0, 0).window().limit, 1);
        assert_eq!(Pagination::new(-5, 0).window().limit, 1);
        assert_eq!(Pagination::new(10_000, 0).window().limit, MAX_PAGE_SIZE);
        assert_eq!(Pagination::new(10, -3).window().offset, 0);
    }

    #[test]
    fn test_window_arithmetic() {
        let w = PageWindow::clamped(1, 2);
        assert!(!w.contains(1));
        assert!(w.contains(2));
        assert!(!w.contains(3));
        assert_eq!(w.page_len(3), 1);
        assert!(!w.has_more(3));
        assert!(w.has_more(4));
        assert_eq!(PageWindow::clamped(1, 3).page_len(3), 0);
    }

    #[test]
    fn test_window_end_saturates() {
        let w = PageWindow::clamped(MAX_PAGE_SIZE as i64, i64::MAX);
        assert_eq!(w.end(), usize::MAX);
        assert!(!w.has_more(usize::MAX));
    }

    #[test]
    fn test_search_request_accepts_numeric_client_id_and_ignores_unknown_keys() {
        let req: SearchRequest = serde_json::from_str(
            r#"{"brand":"STANLEY","clientId":8,"dateFrom":"2024-01-01","limit":5,"colour":"red"}"#,
        )
        .unwrap();
        let (filter, pagination) = req.into_parts();
        assert_eq!(filter.brand.as_deref(), Some("STANLEY"));
        assert_eq!(filter.client_id.as_deref(), Some("8"));
        assert_eq!(filter.date_from, Some(date(2024, 1, 1)));
        assert_eq!(pagination.window().limit, 5);
    }

    #[test]
    fn test_search_request_snake_case_aliases() {
        let req: SearchRequest =
            serde_json::from_str(r#"{"client_id":"8","date_to":"2024-02-01"}"#).unwrap();
        assert_eq!(req.client_id.as_deref(), Some("8"));
        assert_eq!(req.date_to, Some(date(2024, 2, 1)));
    }

    #[test]
    fn test_oversized_page_bounds_saturate() {
        let req: SearchRequest =
            serde_json::from_str(r#"{"limit":99999999999999999999,"offset":18446744073709551615}"#)
                .unwrap();
        assert_eq!(req.limit, Some(i64::MAX));
        assert_eq!(req.offset, Some(i64::MAX));

        let pagination: Pagination =
            serde_json::from_str(r#"{"limit":"99999999999999999999","offset":"-99999999999999999999"}"#)
                .unwrap();
        assert_eq!(pagination.limit, Some(i64::MAX));
        assert_eq!(pagination.offset, Some(i64::MIN));
        assert_eq!(
            pagination.window(),
            PageWindow {
                offset: 0,
                limit: MAX_PAGE_SIZE
            }
        );

        let pagination: Pagination = serde_json::from_str(r#"{"limit":" 7 ","offset":""}"#).unwrap();
        assert_eq!(pagination, Pagination { limit: Some(7), offset: None });

        assert!(serde_json::from_str::<Pagination>(r#"{"limit":"ten"}"#).is_err());
        assert!(serde_json::from_str::<Pagination>(r#"{"limit":"-"}"#).is_err());
    }

    #[test]
    fn test_capability_expiry() {
        let now = Utc::now();
        let cap = Capability::new("shelf_client", now + Duration::minutes(30));
        assert!(cap.is_valid_at(now));
        assert!(!cap.is_valid_at(now + Duration::minutes(30)));
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let json = serde_json::to_value(record(0, "STANLEY", Some(date(2024, 1, 29)))).unwrap();
        assert_eq!(json["brand"], "STANLEY");
        assert_eq!(json["eventDate"], "2024-01-29");
        assert_eq!(json["addToCartCount"], 0);
    }
}
