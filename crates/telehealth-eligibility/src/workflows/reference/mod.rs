//! Reference tables (postcodes, LGAs, disasters, disaster-LGA links) and the immutable
//! snapshot built from them.

mod cache;
pub mod domain;
mod parser;
mod snapshot;

pub use cache::{CachedSnapshot, SnapshotCache};
pub use domain::{Disaster, DisasterLgaLink, LgaRecord, PostcodeRecord, RemotenessArea};
pub use snapshot::{PostcodeMapping, ReferenceSnapshot, ReferenceTables};

pub(crate) use snapshot::most_recent_first;

use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Mutex;

pub const POSTCODES_FILE: &str = "postcodes.csv";
pub const LGAS_FILE: &str = "lgas.csv";
pub const DISASTERS_FILE: &str = "disasters.csv";
pub const DISASTER_LGAS_FILE: &str = "disaster_lgas.csv";

/// Failure to load or assemble reference data. Always fatal for an analysis run.
#[derive(Debug, thiserror::Error)]
pub enum ReferenceDataError {
    #[error("failed to read {dataset} from {}: {source}", .path.display())]
    Io {
        dataset: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid {dataset} data: {source}")]
    Csv {
        dataset: &'static str,
        #[source]
        source: csv::Error,
    },
    #[error("{dataset} dataset is empty")]
    EmptyDataset { dataset: &'static str },
    #[error("reference data provider unavailable: {0}")]
    Unavailable(String),
}

/// Provider of the raw tables; the scraper and ingestion pipeline live behind it.
pub trait ReferenceDataSource: Send + Sync {
    fn load(&self) -> Result<ReferenceTables, ReferenceDataError>;
}

/// Reads the four tables from CSV files in a single directory.
#[derive(Debug, Clone)]
pub struct CsvReferenceSource {
    dir: PathBuf,
}

impl CsvReferenceSource {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_readers<P, L, D, K>(
        postcodes: P,
        lgas: L,
        disasters: D,
        links: K,
    ) -> Result<ReferenceTables, ReferenceDataError>
    where
        P: Read,
        L: Read,
        D: Read,
        K: Read,
    {
        Ok(ReferenceTables {
            postcodes: parser::parse_postcodes(postcodes).map_err(csv_error("postcodes"))?,
            lgas: parser::parse_lgas(lgas).map_err(csv_error("lgas"))?,
            disasters: parser::parse_disasters(disasters).map_err(csv_error("disasters"))?,
            links: parser::parse_links(links).map_err(csv_error("disaster_lgas"))?,
        })
    }

    fn open(&self, dataset: &'static str, file: &str) -> Result<File, ReferenceDataError> {
        let path = self.dir.join(file);
        File::open(&path).map_err(|source| ReferenceDataError::Io {
            dataset,
            path,
            source,
        })
    }
}

impl ReferenceDataSource for CsvReferenceSource {
    fn load(&self) -> Result<ReferenceTables, ReferenceDataError> {
        Self::from_readers(
            self.open("postcodes", POSTCODES_FILE)?,
            self.open("lgas", LGAS_FILE)?,
            self.open("disasters", DISASTERS_FILE)?,
            self.open("disaster_lgas", DISASTER_LGAS_FILE)?,
        )
    }
}

fn csv_error(dataset: &'static str) -> impl Fn(csv::Error) -> ReferenceDataError {
    move |source| ReferenceDataError::Csv { dataset, source }
}

/// Tables held in memory; handy for embedding fixtures or a pre-fetched copy.
#[derive(Debug, Default)]
pub struct InMemoryReferenceSource {
    tables: Mutex<Option<ReferenceTables>>,
}

impl InMemoryReferenceSource {
    pub fn new(tables: ReferenceTables) -> Self {
        Self {
            tables: Mutex::new(Some(tables)),
        }
    }

    /// A source that has nothing to offer, as when the upstream store is down.
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn replace(&self, tables: Option<ReferenceTables>) {
        let mut guard = self
            .tables
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = tables;
    }
}

impl ReferenceDataSource for InMemoryReferenceSource {
    fn load(&self) -> Result<ReferenceTables, ReferenceDataError> {
        let guard = self
            .tables
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard
            .clone()
            .ok_or_else(|| ReferenceDataError::Unavailable("no reference tables loaded".to_string()))
    }
}
