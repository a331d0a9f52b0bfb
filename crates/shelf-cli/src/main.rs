//! # shelf-cli — The "Counter" of SHELF
//!
//! - `shelf inspect --data <csv>` — Load a dataset locally and summarize it.
//! - `shelf token` — Obtain an access token from the hub.
//! - `shelf search` / `shelf products` — Query product records.
//! - `shelf brands` / `shelf categories` / `shelf stats` — Dataset summaries.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tabled::{Table, Tabled};
use thiserror::Error;

use shelf_core::{DatasetStats, Page, ProductRecord, SearchRequest};
use shelf_store::index::DEFAULT_PLACEHOLDER_BRAND;
use shelf_store::{IndexOptions, LoadError, Snapshot};

/// 📦 SHELF — product analytics, filtered and paged.
#[derive(Parser)]
#[command(name = "shelf", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a CSV locally and print what the hub would serve.
    Inspect {
        /// Path to the product CSV.
        #[arg(long)]
        data: PathBuf,

        /// Brand values to leave out of the brand listing.
        #[arg(long = "placeholder-brand", default_value = DEFAULT_PLACEHOLDER_BRAND)]
        placeholder_brands: Vec<String>,
    },

    /// Request an access token with client credentials.
    Token,

    /// Search products.
    Search {
        #[arg(long)]
        brand: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        sku: Option<String>,
        #[arg(long)]
        client_id: Option<String>,
        /// Inclusive lower date bound (YYYY-MM-DD).
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Inclusive upper date bound (YYYY-MM-DD).
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long)]
        offset: Option<i64>,
        /// Print raw JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// List products without filtering.
    Products {
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long)]
        offset: Option<i64>,
    },

    /// List distinct brands.
    Brands,

    /// List distinct categories.
    Categories,

    /// Print dataset statistics.
    Stats,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Inspect {
            data,
            placeholder_brands,
        } => inspect(data, placeholder_brands),

        // Async Commands
        cmd => tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(CliError::from)
            .and_then(|rt| rt.block_on(async_main(cmd))),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

// =============================================================================
// Local
// =============================================================================

fn inspect(data: PathBuf, placeholder_brands: Vec<String>) -> Result<(), CliError> {
    let options = IndexOptions { placeholder_brands };
    let snapshot = Snapshot::load(&data, &options)?;
    let report = snapshot.report();

    eprintln!("📦 SHELF: {}", data.display());
    print_stats(&snapshot.stats());
    println!("Malformed cells: {}", report.warnings);
    for warning in &report.sample {
        println!("  {}", warning);
    }
    if !report.missing_optional.is_empty() {
        println!("Missing optional columns: {}", report.missing_optional.join(", "));
    }

    print_listing("Brand", snapshot.list_brands());
    print_listing("Category", snapshot.list_categories());
    Ok(())
}

// =============================================================================
// Remote
// =============================================================================

async fn async_main(cmd: Commands) -> Result<(), CliError> {
    let client = reqwest::Client::new();
    let base_url =
        std::env::var("SHELF_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:8000".to_string());

    if let Commands::Token = cmd {
        let token = request_token(&client, &base_url).await?;
        println!("{}", serde_json::to_string_pretty(&token).unwrap_or_default());
        return Ok(());
    }

    let access_token = match std::env::var("SHELF_TOKEN") {
        Ok(token) if !token.is_empty() => token,
        _ => request_token(&client, &base_url)
            .await?
            .get("access_token")
            .and_then(|t| t.as_str())
            .map(str::to_string)
            .unwrap_or_default(),
    };

    match cmd {
        Commands::Search {
            brand,
            category,
            sku,
            client_id,
            from,
            to,
            limit,
            offset,
            json,
        } => {
            let query = SearchRequest {
                brand,
                category,
                sku,
                client_id,
                date_from: from,
                date_to: to,
                limit,
                offset,
            };
            let url = format!("{}/api/products/search", base_url);
            let page: Page = get_json(&client, &url, &access_token, &query).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&page).unwrap_or_default());
            } else {
                print_page(&page);
            }
        }

        Commands::Products { limit, offset } => {
            let url = format!("{}/api/products", base_url);
            let query = SearchRequest {
                limit,
                offset,
                ..SearchRequest::default()
            };
            let page: Page = get_json(&client, &url, &access_token, &query).await?;
            print_page(&page);
        }

        Commands::Brands => {
            let url = format!("{}/api/brands", base_url);
            let brands: Vec<String> = get_json(&client, &url, &access_token, &()).await?;
            print_listing("Brand", brands);
        }

        Commands::Categories => {
            let url = format!("{}/api/categories", base_url);
            let categories: Vec<String> = get_json(&client, &url, &access_token, &()).await?;
            print_listing("Category", categories);
        }

        Commands::Stats => {
            let url = format!("{}/api/stats", base_url);
            let stats: DatasetStats = get_json(&client, &url, &access_token, &()).await?;
            print_stats(&stats);
        }

        Commands::Inspect { .. } | Commands::Token => {}
    }
    Ok(())
}

async fn request_token(
    client: &reqwest::Client,
    base_url: &str,
) -> Result<serde_json::Value, CliError> {
    let client_id =
        std::env::var("SHELF_CLIENT_ID").unwrap_or_else(|_| "shelf_client".to_string());
    let client_secret =
        std::env::var("SHELF_CLIENT_SECRET").unwrap_or_else(|_| "shelf_secret".to_string());
    let payload = serde_json::json!({
        "grant_type": "client_credentials",
        "client_id": client_id,
        "client_secret": client_secret,
    });

    let url = format!("{}/auth/token", base_url);
    let resp = post_request(client, &url, None, &payload).await?;
    decode(resp).await
}

async fn get_json<Q, T>(
    client: &reqwest::Client,
    url: &str,
    token: &str,
    query: &Q,
) -> Result<T, CliError>
where
    Q: Serialize + ?Sized,
    T: DeserializeOwned,
{
    let resp = get_request(client, url, Some(token), query).await?;
    decode(resp).await
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, CliError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(CliError::Status { status, body });
    }
    Ok(resp.json::<T>().await?)
}

async fn get_request<Q: Serialize + ?Sized>(
    client: &reqwest::Client,
    url: &str,
    key: Option<&str>,
    query: &Q,
) -> Result<reqwest::Response, reqwest::Error> {
    let mut req = client.get(url).query(query);
    if let Some(k) = key {
        req = req.bearer_auth(k);
    }
    req.send().await
}

async fn post_request(
    client: &reqwest::Client,
    url: &str,
    key: Option<&str>,
    json: &serde_json::Value,
) -> Result<reqwest::Response, reqwest::Error> {
    let mut req = client.post(url).json(json);
    if let Some(k) = key {
        req = req.bearer_auth(k);
    }
    req.send().await
}

// =============================================================================
// Output
// =============================================================================

#[derive(Tabled)]
struct RecordRow {
    #[tabled(rename = "#")]
    ordinal: usize,
    date: String,
    brand: String,
    category: String,
    sku: String,
    product: String,
    client: String,
    cart_adds: u64,
}

impl From<&ProductRecord> for RecordRow {
    fn from(r: &ProductRecord) -> Self {
        Self {
            ordinal: r.ordinal,
            date: r
                .event_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
            brand: r.brand.clone(),
            category: r.category.clone(),
            sku: r.sku.clone(),
            product: r.product_name.clone(),
            client: r.client_id.clone(),
            cart_adds: r.add_to_cart_count,
        }
    }
}

#[derive(Tabled)]
struct StatRow {
    metric: &'static str,
    value: usize,
}

#[derive(Tabled)]
struct ValueRow {
    #[tabled(rename = "")]
    value: String,
}

fn print_page(page: &Page) {
    let rows: Vec<RecordRow> = page.records.iter().map(RecordRow::from).collect();
    println!("{}", Table::new(rows));
    println!(
        "offset {} · limit {} · {} shown{}",
        page.offset,
        page.limit,
        page.len(),
        if page.has_more { " · more available" } else { "" }
    );
}

fn print_stats(stats: &DatasetStats) {
    let rows = vec![
        StatRow {
            metric: "records",
            value: stats.total_records,
        },
        StatRow {
            metric: "brands",
            value: stats.brands_count,
        },
        StatRow {
            metric: "categories",
            value: stats.categories_count,
        },
    ];
    println!("{}", Table::new(rows));
}

fn print_listing(title: &str, values: Vec<String>) {
    println!("{} ({})", title, values.len());
    let rows: Vec<ValueRow> = values.into_iter().map(|value| ValueRow { value }).collect();
    println!("{}", Table::new(rows));
}
