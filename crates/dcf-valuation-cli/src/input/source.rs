//! File-backed data retrieval and an explicit, caller-owned snapshot cache.

use cached::{Cached, TimedCache};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use dcf_valuation_core::historical::period::HistoricalPeriod;
use dcf_valuation_core::interfaces::{CompanySnapshot, HistoricalDataSource};
use dcf_valuation_core::types::{Currency, Money};
use dcf_valuation_core::{DcfError, DcfResult};

use super::file;

/// Company file as written by hand or exported from a data provider.
///
/// Either `net_debt` or `total_debt` (with optional `cash`) must be given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyFile {
    pub symbol: String,
    #[serde(default)]
    pub currency: Currency,
    pub periods: Vec<HistoricalPeriod>,
    pub shares_outstanding: Decimal,
    #[serde(default)]
    pub net_debt: Option<Money>,
    #[serde(default)]
    pub total_debt: Option<Money>,
    #[serde(default)]
    pub cash: Option<Money>,
    #[serde(default)]
    pub current_price: Option<Money>,
}

impl TryFrom<CompanyFile> for CompanySnapshot {
    type Error = DcfError;

    fn try_from(f: CompanyFile) -> DcfResult<Self> {
        let net_debt = match (f.net_debt, f.total_debt) {
            (Some(nd), _) => nd,
            (None, Some(debt)) => debt - f.cash.unwrap_or(Decimal::ZERO),
            (None, None) => {
                return Err(DcfError::DataSource(format!(
                    "{}: provide net_debt or total_debt",
                    f.symbol
                )))
            }
        };
        Ok(CompanySnapshot {
            symbol: f.symbol,
            currency: f.currency,
            periods: f.periods,
            shares_outstanding: f.shares_outstanding,
            net_debt,
            current_price: f.current_price,
        })
    }
}

/// Looks up `<dir>/<SYMBOL>.json`, `.yaml` or `.yml`.
pub struct FileSource {
    dir: PathBuf,
}

impl FileSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn locate(&self, symbol: &str) -> Option<PathBuf> {
        ["json", "yaml", "yml"]
            .iter()
            .map(|ext| self.dir.join(format!("{symbol}.{ext}")))
            .find(|p| p.is_file())
    }
}

impl HistoricalDataSource for FileSource {
    fn fetch(&self, symbol: &str) -> DcfResult<CompanySnapshot> {
        let path = self.locate(symbol).ok_or_else(|| {
            DcfError::DataSource(format!(
                "No company file for {symbol} in {}",
                self.dir.display()
            ))
        })?;
        let path = path.to_string_lossy();
        let company: CompanyFile =
            file::read_structured(&path).map_err(|e| DcfError::DataSource(e.to_string()))?;
        if !company.symbol.eq_ignore_ascii_case(symbol) {
            tracing::warn!(requested = symbol, found = %company.symbol, "symbol mismatch in company file");
        }
        company.try_into()
    }
}

/// Memoizes another source's snapshots for a fixed lifetime.
pub struct CachedSource<S> {
    inner: S,
    cache: Mutex<TimedCache<String, CompanySnapshot>>,
}

impl<S: HistoricalDataSource> CachedSource<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            cache: Mutex::new(TimedCache::with_lifespan(ttl)),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn len(&self) -> usize {
        self.cache.lock().map(|c| c.cache_size()).unwrap_or(0)
    }
}

impl<S: HistoricalDataSource> HistoricalDataSource for CachedSource<S> {
    fn fetch(&self, symbol: &str) -> DcfResult<CompanySnapshot> {
        let key = symbol.to_ascii_uppercase();
        {
            let mut cache = self
                .cache
                .lock()
                .map_err(|_| DcfError::DataSource("snapshot cache poisoned".into()))?;
            if let Some(hit) = cache.cache_get(&key) {
                tracing::debug!(symbol, "snapshot cache hit");
                return Ok(hit.clone());
            }
        }

        tracing::debug!(symbol, "snapshot cache miss");
        let snapshot = self.inner.fetch(symbol)?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.cache_set(key, snapshot.clone());
        }
        Ok(snapshot)
    }
}
