//! # Record Store — CSV Loader
//!
//! Decodes the dataset file into an ordered `Vec<ProductRecord>` in a single
//! pass. Columns are found by header name, so their order does not matter and
//! optional columns may be missing entirely.
//!
//! A malformed cell never rejects its row. The field falls back to its default
//! and a [`DecodeWarning`] is recorded. Only an unreadable source, a file with
//! no records, or a file lacking a required column fails the load.

use std::borrow::Cow;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::{ByteRecord, ReaderBuilder, Trim};

use shelf_core::ProductRecord;

use crate::error::{DecodeWarning, LoadError};

/// Number of warnings logged (and kept) individually before only counting.
pub const WARNING_SAMPLE_SIZE: usize = 20;

/// Cell spellings that mean "no value" rather than "bad value".
const NULL_TOKENS: [&str; 4] = ["", "nan", "NaN", "null"];

/// Output of a successful load.
#[derive(Debug)]
pub struct LoadedRecords {
    pub records: Vec<ProductRecord>,
    pub report: LoadReport,
}

/// What the loader noticed on the way.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub rows: usize,
    /// Total number of malformed cells.
    pub warnings: usize,
    /// The first [`WARNING_SAMPLE_SIZE`] warnings.
    pub sample: Vec<DecodeWarning>,
    /// Optional columns absent from the header.
    pub missing_optional: Vec<&'static str>,
}

impl LoadReport {
    fn warn(&mut self, warning: DecodeWarning) {
        self.warnings += 1;
        if self.sample.len() < WARNING_SAMPLE_SIZE {
            tracing::warn!("Defaulted malformed cell: {}", warning);
            self.sample.push(warning);
        }
    }
}

/// Load the dataset at `path`.
pub fn load(path: &Path) -> Result<LoadedRecords, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let loaded = load_from_reader(file)?;
    tracing::info!(
        "Loaded {} records from {:?} ({} malformed cells)",
        loaded.report.rows,
        path,
        loaded.report.warnings
    );
    Ok(loaded)
}

/// Load the dataset from any byte source.
pub fn load_from_reader<R: Read>(reader: R) -> Result<LoadedRecords, LoadError> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers = reader.byte_headers()?.clone();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(LoadError::Empty);
    }

    let columns = ColumnMap::resolve(&headers);
    let missing = columns.missing_required();
    if !missing.is_empty() {
        return Err(LoadError::MissingColumns(
            missing.into_iter().map(str::to_string).collect(),
        ));
    }

    let mut report = LoadReport {
        missing_optional: columns.missing_optional(),
        ..LoadReport::default()
    };
    if !report.missing_optional.is_empty() {
        tracing::info!(
            "Optional columns absent, defaulting: {}",
            report.missing_optional.join(", ")
        );
    }

    let mut records = Vec::new();
    let mut row = ByteRecord::new();
    while reader.read_byte_record(&mut row)? {
        let ordinal = records.len();
        let decoder = RowDecoder {
            row: &row,
            ordinal,
            columns: &columns,
        };
        records.push(decoder.decode(&mut report));
    }

    if records.is_empty() {
        return Err(LoadError::Empty);
    }

    report.rows = records.len();
    if report.warnings > report.sample.len() {
        tracing::warn!(
            "{} further malformed cells defaulted without individual logging",
            report.warnings - report.sample.len()
        );
    }

    Ok(LoadedRecords { records, report })
}

// =============================================================================
// Column mapping
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    ProductName,
    ProductNameAlt,
    Brand,
    Category,
    Sku,
    ClientId,
    EventDate,
    AddToCart,
    RemovedFromCart,
    DetailViews,
    ProductQuantity,
    PageViews,
    Revenue,
    ViewId,
    DeviceTypeId,
    SourceMediumId,
    ProductId,
    Flag,
    ProductCode,
    DetailedCategory,
    AnalyticsCategory,
    AltSku,
    Sasasa,
}

const COLUMN_COUNT: usize = 23;

impl Column {
    const ALL: [Column; COLUMN_COUNT] = [
        Column::ProductName,
        Column::ProductNameAlt,
        Column::Brand,
        Column::Category,
        Column::Sku,
        Column::ClientId,
        Column::EventDate,
        Column::AddToCart,
        Column::RemovedFromCart,
        Column::DetailViews,
        Column::ProductQuantity,
        Column::PageViews,
        Column::Revenue,
        Column::ViewId,
        Column::DeviceTypeId,
        Column::SourceMediumId,
        Column::ProductId,
        Column::Flag,
        Column::ProductCode,
        Column::DetailedCategory,
        Column::AnalyticsCategory,
        Column::AltSku,
        Column::Sasasa,
    ];

    /// Accepted header names, preferred first.
    fn aliases(self) -> &'static [&'static str] {
        match self {
            Column::ProductName => &["product_name", "desc_ga_nombre_producto_1"],
            Column::ProductNameAlt => &["product_name_alt", "desc_ga_nombre_producto"],
            Column::Brand => &["brand", "desc_ga_marca_producto"],
            Column::Category => &["category", "desc_categoria_prod_principal"],
            Column::Sku => &["sku", "desc_ga_sku_producto"],
            Column::ClientId => &["client_id", "id_cli_cliente"],
            Column::EventDate => &["event_date", "id_tie_fecha_valor"],
            Column::AddToCart => &["add_to_cart_count", "fc_agregado_carrito_cant"],
            Column::RemovedFromCart => &["removed_from_cart_count", "fc_retirado_carrito_cant"],
            Column::DetailViews => &["detail_views_count", "fc_detalle_producto_cant"],
            Column::ProductQuantity => &["product_quantity", "fc_producto_cant"],
            Column::PageViews => &["page_views_count", "fc_visualizaciones_pag_cant"],
            Column::Revenue => &["revenue_amount", "fc_ingreso_producto_monto"],
            Column::ViewId => &["view_id", "id_ga_vista"],
            Column::DeviceTypeId => &["device_type_id", "id_ga_tipo_dispositivo"],
            Column::SourceMediumId => &["source_medium_id", "id_ga_fuente_medio"],
            Column::ProductId => &["product_id", "id_ga_producto"],
            Column::Flag => &["flag", "flag_pipol"],
            Column::ProductCode => &["product_code", "desc_ga_cod_producto"],
            Column::DetailedCategory => &["detailed_category", "desc_categoria_producto"],
            Column::AnalyticsCategory => &["analytics_category", "desc_ga_categoria_producto"],
            Column::AltSku => &["alt_sku", "desc_ga_sku_producto_1"],
            Column::Sasasa => &["sasasa", "SASASA"],
        }
    }

    fn name(self) -> &'static str {
        self.aliases()[0]
    }

    /// Columns the engine filters or indexes on.
    fn is_required(self) -> bool {
        matches!(
            self,
            Column::Brand | Column::Category | Column::Sku | Column::EventDate
        )
    }
}

/// Header position of every known column, if present.
struct ColumnMap {
    slots: [Option<usize>; COLUMN_COUNT],
}

impl ColumnMap {
    fn resolve(headers: &ByteRecord) -> Self {
        let names: Vec<String> = headers
            .iter()
            .map(|h| String::from_utf8_lossy(h).trim_start_matches('\u{feff}').to_string())
            .collect();

        let mut slots = [None; COLUMN_COUNT];
        for (slot, column) in slots.iter_mut().zip(Column::ALL) {
            *slot = column
                .aliases()
                .iter()
                .find_map(|alias| names.iter().position(|name| name == alias));
        }
        Self { slots }
    }

    fn position(&self, column: Column) -> Option<usize> {
        self.slots[column as usize]
    }

    fn missing_required(&self) -> Vec<&'static str> {
        self.missing(true)
    }

    fn missing_optional(&self) -> Vec<&'static str> {
        self.missing(false)
    }

    fn missing(&self, required: bool) -> Vec<&'static str> {
        Column::ALL
            .iter()
            .filter(|c| c.is_required() == required && self.position(**c).is_none())
            .map(|c| c.name())
            .collect()
    }
}

// =============================================================================
// Row decoding
// =============================================================================

struct RowDecoder<'a> {
    row: &'a ByteRecord,
    ordinal: usize,
    columns: &'a ColumnMap,
}

impl RowDecoder<'_> {
    fn decode(&self, report: &mut LoadReport) -> ProductRecord {
        ProductRecord {
            ordinal: self.ordinal,
            product_name: self.text(Column::ProductName),
            product_name_alt: self.text(Column::ProductNameAlt),
            brand: self.text(Column::Brand),
            category: self.text(Column::Category),
            sku: self.text(Column::Sku),
            client_id: self.identifier(Column::ClientId),
            event_date: self.date(Column::EventDate, report),
            add_to_cart_count: self.count(Column::AddToCart, report),
            removed_from_cart_count: self.count(Column::RemovedFromCart, report),
            detail_views_count: self.count(Column::DetailViews, report),
            product_quantity: self.count(Column::ProductQuantity, report),
            page_views_count: self.count(Column::PageViews, report),
            revenue_amount: self.amount(Column::Revenue, report),
            view_id: self.integer(Column::ViewId, report),
            device_type_id: self.integer(Column::DeviceTypeId, report),
            source_medium_id: self.integer(Column::SourceMediumId, report),
            product_id: self.integer(Column::ProductId, report),
            flag: self.integer(Column::Flag, report),
            product_code: self.text(Column::ProductCode),
            detailed_category: self.text(Column::DetailedCategory),
            analytics_category: self.text(Column::AnalyticsCategory),
            alt_sku: self.text(Column::AltSku),
            sasasa: self.text(Column::Sasasa),
        }
    }

    /// The cell's text, or `None` when the column is absent or the cell null.
    fn cell(&self, column: Column) -> Option<Cow<'_, str>> {
        let raw = self.row.get(self.columns.position(column)?)?;
        let value = String::from_utf8_lossy(raw);
        if NULL_TOKENS.contains(&value.trim()) {
            None
        } else {
            Some(value)
        }
    }

    fn warning(&self, column: Column, value: &str, reason: &'static str) -> DecodeWarning {
        DecodeWarning {
            row: self.ordinal,
            column: column.name(),
            value: value.to_string(),
            reason,
        }
    }

    fn text(&self, column: Column) -> String {
        self.cell(column).map(Cow::into_owned).unwrap_or_default()
    }

    /// Identifier kept as text; `"8.0"` is normalized to `"8"`.
    fn identifier(&self, column: Column) -> String {
        match self.cell(column) {
            Some(value) if value.contains('.') => match parse_integer(&value) {
                Some(n) => n.to_string(),
                None => value.into_owned(),
            },
            Some(value) => value.into_owned(),
            None => String::new(),
        }
    }

    fn integer(&self, column: Column, report: &mut LoadReport) -> Option<i64> {
        let value = self.cell(column)?;
        let parsed = parse_integer(&value);
        if parsed.is_none() {
            report.warn(self.warning(column, &value, "not an integer"));
        }
        parsed
    }

    fn count(&self, column: Column, report: &mut LoadReport) -> u64 {
        let Some(value) = self.cell(column) else {
            return 0;
        };
        match parse_integer(&value) {
            Some(n) if n >= 0 => n as u64,
            Some(_) => {
                report.warn(self.warning(column, &value, "negative count"));
                0
            }
            None => {
                report.warn(self.warning(column, &value, "not an integer"));
                0
            }
        }
    }

    fn amount(&self, column: Column, report: &mut LoadReport) -> f64 {
        let Some(value) = self.cell(column) else {
            return 0.0;
        };
        match value.parse::<f64>() {
            Ok(n) if n.is_finite() => n,
            _ => {
                report.warn(self.warning(column, &value, "not a finite number"));
                0.0
            }
        }
    }

    fn date(&self, column: Column, report: &mut LoadReport) -> Option<NaiveDate> {
        let value = self.cell(column)?;
        let parsed = parse_date(&value);
        if parsed.is_none() {
            report.warn(self.warning(column, &value, "not a date"));
        }
        parsed
    }
}

/// Accepts `"3"` and integral floats such as `"3.0"`.
pub(crate) fn parse_integer(raw: &str) -> Option<i64> {
    if let Ok(n) = raw.parse::<i64>() {
        return Some(n);
    }
    let f = raw.parse::<f64>().ok()?;
    // Past 2^53 a float no longer pins down a single integer.
    if f.is_finite() && f.fract() == 0.0 && f.abs() <= 9_007_199_254_740_992.0 {
        Some(f as i64)
    } else {
        None
    }
}

/// Accepts `YYYYMMDD`, `YYYYMMDD.0` and `YYYY-MM-DD`.
pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
    let compact = raw.strip_suffix(".0").unwrap_or(raw);
    if compact.len() == 8 && compact.bytes().all(|b| b.is_ascii_digit()) {
        let year = compact[0..4].parse().ok()?;
        let month = compact[4..6].parse().ok()?;
        let day = compact[6..8].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}
