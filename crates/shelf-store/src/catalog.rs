//! # Catalog — Gated Access to the Live Snapshot
//!
//! The catalog is the only way request handlers reach the data. Every read
//! demands a [`Capability`]; without a valid one the call fails with
//! [`QueryError::Unauthorized`] before the snapshot is touched.
//!
//! The live snapshot sits behind an `Arc`. Readers clone the `Arc` and run
//! against that clone without holding any lock. A reload builds the
//! replacement completely before swapping the pointer, so in-flight readers
//! finish against the snapshot they started with.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use shelf_core::{Capability, DatasetStats, Page, Pagination, ProductFilter};

use crate::error::{LoadError, QueryError};
use crate::index::IndexOptions;
use crate::snapshot::Snapshot;

pub struct Catalog {
    current: RwLock<Arc<Snapshot>>,
    options: IndexOptions,
}

impl Catalog {
    pub fn new(snapshot: Snapshot, options: IndexOptions) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
            options,
        }
    }

    /// Load `path` and serve it.
    pub fn open(path: &Path, options: IndexOptions) -> Result<Self, LoadError> {
        let snapshot = Snapshot::load(path, &options)?;
        Ok(Self::new(snapshot, options))
    }

    /// The live snapshot, ungated. For health reporting and operators.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swap in `snapshot`, returning the one it replaced.
    pub fn replace(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        self.install(Arc::new(snapshot))
    }

    fn install(&self, next: Arc<Snapshot>) -> Arc<Snapshot> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, next)
    }

    /// Rebuild from `path` off to the side, then swap. Returns the snapshot
    /// this call installed, even if another reload has since replaced it.
    ///
    /// On failure the current snapshot keeps serving.
    pub fn reload_from(&self, path: &Path) -> Result<Arc<Snapshot>, LoadError> {
        let next = Arc::new(Snapshot::load(path, &self.options)?);
        let stats = next.stats();
        self.install(next.clone());
        tracing::info!(
            "Reloaded {:?}: {} records, {} brands, {} categories",
            path,
            stats.total_records,
            stats.brands_count,
            stats.categories_count
        );
        Ok(next)
    }

    /// Reload from the file the live snapshot came from.
    pub fn reload(&self) -> Result<Arc<Snapshot>, LoadError> {
        let live = self.snapshot();
        let path = live.source().ok_or(LoadError::NoSource)?;
        self.reload_from(path)
    }

    // =========================================================================
    // Gated operations
    // =========================================================================

    pub fn search(
        &self,
        capability: Option<&Capability>,
        filter: &ProductFilter,
        pagination: Pagination,
    ) -> Result<Page, QueryError> {
        let snapshot = self.authorize(capability)?;
        let page = snapshot.search(filter, pagination).into_owned();
        Ok(page)
    }

    /// Unfiltered page in source order.
    pub fn list_products(
        &self,
        capability: Option<&Capability>,
        pagination: Pagination,
    ) -> Result<Page, QueryError> {
        self.search(capability, &ProductFilter::all(), pagination)
    }

    pub fn stats(&self, capability: Option<&Capability>) -> Result<DatasetStats, QueryError> {
        Ok(self.authorize(capability)?.stats())
    }

    pub fn list_brands(&self, capability: Option<&Capability>) -> Result<Vec<String>, QueryError> {
        Ok(self.authorize(capability)?.list_brands())
    }

    pub fn list_categories(
        &self,
        capability: Option<&Capability>,
    ) -> Result<Vec<String>, QueryError> {
        Ok(self.authorize(capability)?.list_categories())
    }

    fn authorize(&self, capability: Option<&Capability>) -> Result<Arc<Snapshot>, QueryError> {
        authorize_at(capability, Utc::now())?;
        Ok(self.snapshot())
    }
}

fn authorize_at(capability: Option<&Capability>, now: DateTime<Utc>) -> Result<(), QueryError> {
    match capability {
        Some(cap) if cap.is_valid_at(now) => Ok(()),
        Some(cap) => {
            tracing::debug!("Rejected expired capability for {}", cap.subject);
            Err(QueryError::Unauthorized)
        }
        None => Err(QueryError::Unauthorized),
    }
}
