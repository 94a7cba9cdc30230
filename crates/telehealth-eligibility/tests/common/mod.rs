#![allow(dead_code)]

use chrono::NaiveDate;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use telehealth_eligibility::config::{AnalysisConfig, AnalysisTier};
use telehealth_eligibility::workflows::clock::{Clock, FixedClock};
use telehealth_eligibility::workflows::eligibility::{
    AnalysisRequest, EligibilityService, PopulationAnalyzer,
};
use telehealth_eligibility::workflows::reference::{
    CsvReferenceSource, ReferenceDataSource, ReferenceSnapshot, SnapshotCache,
};

pub fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/reference")
}

pub fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 10, 8).expect("valid as-of date")
}

pub fn clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock::on(as_of()))
}

pub fn fixture_snapshot() -> Arc<ReferenceSnapshot> {
    let tables = CsvReferenceSource::new(fixture_dir())
        .load()
        .expect("fixture tables load");
    Arc::new(ReferenceSnapshot::build(tables).expect("fixture snapshot builds"))
}

pub fn config(worker_count: usize, chunk_size: Option<usize>) -> AnalysisConfig {
    AnalysisConfig {
        worker_count,
        chunk_size,
        ..AnalysisConfig::for_tier(AnalysisTier::Standard)
    }
}

pub fn analyzer(config: AnalysisConfig) -> PopulationAnalyzer {
    PopulationAnalyzer::new(config, clock())
}

pub fn service(config: AnalysisConfig) -> EligibilityService<CsvReferenceSource> {
    service_with_source(CsvReferenceSource::new(fixture_dir()), config)
}

pub fn service_with_source<S>(source: S, config: AnalysisConfig) -> EligibilityService<S>
where
    S: ReferenceDataSource + 'static,
{
    let cache = Arc::new(SnapshotCache::new(
        source,
        Duration::from_secs(3_600),
        clock(),
    ));
    EligibilityService::new(cache, analyzer(config))
}

/// Clinic population covering every outcome kind in the fixture tables.
pub fn mixed_population() -> Vec<String> {
    [
        "4000", "2480", "0800", "800", "4870", "0872", "6765", "2000", "3000", "5000", "9999",
        "abc",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

pub fn request(postcodes: Vec<String>) -> AnalysisRequest {
    AnalysisRequest {
        clinic_name: "Northern Rivers Medical Centre".to_string(),
        postcodes,
    }
}

pub fn repeated(postcode: &str, count: usize) -> Vec<String> {
    vec![postcode.to_string(); count]
}
