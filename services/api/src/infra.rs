use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use telehealth_eligibility::config::AnalysisConfig;
use telehealth_eligibility::error::AppError;
use telehealth_eligibility::workflows::clock::Clock;
use telehealth_eligibility::workflows::eligibility::{
    EligibilityService, PopulationAnalyzer, Postcode,
};
use telehealth_eligibility::workflows::reference::{CsvReferenceSource, SnapshotCache};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type CsvEligibilityService = EligibilityService<CsvReferenceSource>;

pub(crate) fn build_service(
    reference_dir: PathBuf,
    cache_ttl: std::time::Duration,
    analysis: AnalysisConfig,
    clock: Arc<dyn Clock>,
) -> CsvEligibilityService {
    let snapshots = Arc::new(SnapshotCache::new(
        CsvReferenceSource::new(reference_dir),
        cache_ttl,
        clock.clone(),
    ));
    EligibilityService::new(snapshots, PopulationAnalyzer::new(analysis, clock))
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

/// Reads a patient postcode list.
///
/// `.csv` files use the `postcode` column when present, otherwise the first column; a
/// first row that already holds a postcode is data, not a header. Any other file is read
/// as one postcode per line. Entries are kept verbatim (apart from
/// trimming) so malformed values are counted by the analysis rather than dropped here.
pub(crate) fn read_postcode_list(path: &Path) -> Result<Vec<String>, AppError> {
    let file = std::fs::File::open(path)?;
    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    if is_csv {
        postcodes_from_csv(file)
    } else {
        postcodes_from_lines(file)
    }
}

fn postcodes_from_csv<R: Read>(reader: R) -> Result<Vec<String>, AppError> {
    let mut records = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader)
        .into_records();

    let Some(first) = records.next().transpose().map_err(std::io::Error::from)? else {
        return Ok(Vec::new());
    };

    // Row 1 is a header unless its first cell is itself a postcode.
    let mut postcodes = Vec::new();
    let column = match first
        .iter()
        .position(|cell| cell.eq_ignore_ascii_case("postcode"))
    {
        Some(column) => column,
        None => {
            if Postcode::parse(first.get(0).unwrap_or_default()).is_ok() {
                push_postcode(&mut postcodes, &first, 0);
            }
            0
        }
    };

    for record in records {
        let record = record.map_err(std::io::Error::from)?;
        push_postcode(&mut postcodes, &record, column);
    }
    Ok(postcodes)
}

fn push_postcode(postcodes: &mut Vec<String>, record: &csv::StringRecord, column: usize) {
    if record.iter().all(str::is_empty) {
        return;
    }
    postcodes.push(record.get(column).unwrap_or_default().to_string());
}

fn postcodes_from_lines<R: Read>(mut reader: R) -> Result<Vec<String>, AppError> {
    let mut contents = String::new();
    reader.read_to_string(&mut contents)?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}
