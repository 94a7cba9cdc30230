use crate::infra::{build_service, read_postcode_list};
use chrono::NaiveDate;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use telehealth_eligibility::config::AppConfig;
use telehealth_eligibility::error::AppError;
use telehealth_eligibility::telemetry;
use telehealth_eligibility::workflows::clock::{Clock, FixedClock, SystemClock};
use telehealth_eligibility::workflows::eligibility::{
    AnalysisReport, AnalysisRequest, PostcodeCheck, RiskBucket, RunControl,
};
use telehealth_eligibility::workflows::reference::RemotenessArea;
use tokio::sync::mpsc;

#[derive(Args, Debug)]
pub(crate) struct AnalyzeArgs {
    /// Patient postcode list (.csv with a `postcode` column, or one postcode per line)
    #[arg(long)]
    pub(crate) postcodes: PathBuf,
    /// Clinic name shown on the report
    #[arg(long)]
    pub(crate) clinic_name: String,
    /// Directory holding the reference CSV tables (defaults to REFERENCE_DATA_DIR)
    #[arg(long)]
    pub(crate) reference_dir: Option<PathBuf>,
    /// Evaluate eligibility as of this date (YYYY-MM-DD). Defaults to today (UTC).
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) as_of: Option<NaiveDate>,
    /// Print the report as JSON instead of a summary
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct CheckArgs {
    /// Postcode to check
    pub(crate) postcode: String,
    /// Directory holding the reference CSV tables (defaults to REFERENCE_DATA_DIR)
    #[arg(long)]
    pub(crate) reference_dir: Option<PathBuf>,
    /// Evaluate eligibility as of this date (YYYY-MM-DD). Defaults to today (UTC).
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) as_of: Option<NaiveDate>,
}

fn clock_for(as_of: Option<NaiveDate>) -> Arc<dyn Clock> {
    match as_of {
        Some(date) => Arc::new(FixedClock::on(date)),
        None => Arc::new(SystemClock),
    }
}

pub(crate) async fn run_analyze(args: AnalyzeArgs) -> Result<(), AppError> {
    let AnalyzeArgs {
        postcodes,
        clinic_name,
        reference_dir,
        as_of,
        json,
    } = args;

    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    let reference_dir = reference_dir.unwrap_or(config.reference.data_dir);
    let service = build_service(
        reference_dir,
        config.reference.cache_ttl,
        config.analysis,
        clock_for(as_of),
    );

    let postcodes = read_postcode_list(&postcodes)?;
    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    let control = RunControl::with_progress(progress_tx);

    let cancellation = control.cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling analysis...");
            cancellation.cancel();
        }
    });

    if !json {
        tokio::spawn(async move {
            while let Some(event) = progress_rx.recv().await {
                eprintln!(
                    "  analysed chunk {}/{} ({} postcodes)",
                    event.completed_chunks, event.total_chunks, event.postcodes
                );
            }
        });
    }

    let request = AnalysisRequest {
        clinic_name,
        postcodes,
    };
    let report = service.analyze(request, control).await?;

    if json {
        let rendered = serde_json::to_string_pretty(&report)
            .map_err(|err| AppError::Io(std::io::Error::other(err)))?;
        println!("{rendered}");
    } else {
        render_analysis_report(&report);
    }

    Ok(())
}

pub(crate) async fn run_check(args: CheckArgs) -> Result<(), AppError> {
    let CheckArgs {
        postcode,
        reference_dir,
        as_of,
    } = args;

    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    let reference_dir = reference_dir.unwrap_or(config.reference.data_dir);
    let service = build_service(
        reference_dir,
        config.reference.cache_ttl,
        config.analysis,
        clock_for(as_of),
    );

    let check = service.check_postcode(&postcode).await?;
    render_postcode_check(&check);
    Ok(())
}

pub(crate) fn render_analysis_report(report: &AnalysisReport) {
    println!("Telehealth disaster exemption analysis");
    println!(
        "Clinic: {} (analysed {})",
        report.clinic_name,
        report.analyzed_at.format("%Y-%m-%d %H:%M UTC")
    );

    println!(
        "\n{} patients analysed: {} eligible ({:.1}%), {} not eligible, {} unresolved",
        report.total_analyzed,
        report.eligible_count,
        report.eligible_percentage,
        report.ineligible_count,
        report.unresolved_count
    );

    if report.state_breakdown.is_empty() {
        println!("\nState breakdown: none");
    } else {
        println!("\nState breakdown");
        for (state, breakdown) in &report.state_breakdown {
            println!(
                "- {}: {}/{} eligible",
                state, breakdown.eligible, breakdown.total
            );
        }
    }

    println!("\nRemoteness");
    for area in RemotenessArea::ordered() {
        println!(
            "- {}: {}",
            area.label(),
            report.national_remoteness_breakdown.get(area)
        );
    }

    println!("\nTime since disaster declaration (eligible patients)");
    for bucket in RiskBucket::ordered() {
        let share = report.time_based_analysis.bucket(bucket);
        println!(
            "- {}: {} ({:.1}%)",
            bucket.label(),
            share.count,
            share.percentage
        );
    }
}

pub(crate) fn render_postcode_check(check: &PostcodeCheck) {
    let outcome = &check.outcome;
    println!(
        "Postcode {} (checked {})",
        outcome.postcode,
        check.checked_at.format("%Y-%m-%d")
    );

    if !outcome.resolved {
        println!("Not found in the postcode reference data.");
        return;
    }

    let suburb = outcome.suburb.as_deref().unwrap_or_default();
    let state = outcome.state.as_deref().unwrap_or_default();
    let lga = outcome.lga_name.as_deref().unwrap_or_default();
    println!("{suburb} {state}, LGA {lga}");
    if let Some(area) = outcome.remoteness_area {
        println!("Remoteness: {}", area.label());
    }

    if !outcome.is_eligible {
        println!("Not eligible: no current disaster declarations cover this area.");
        return;
    }

    println!(
        "Eligible: {} current disaster declaration(s)",
        outcome.total_disasters
    );
    for disaster in &outcome.disasters {
        let started = disaster
            .start_date
            .map(|date| date.to_string())
            .unwrap_or_else(|| "undated".to_string());
        let ends = disaster
            .end_date
            .map(|date| date.to_string())
            .unwrap_or_else(|| "ongoing".to_string());
        println!(
            "- {} {} ({}, {} -> {})",
            disaster.agrn, disaster.title, disaster.hazard_type, started, ends
        );
    }

    if let Some(bucket) = check.risk_bucket {
        match check.months_since_earliest {
            Some(months) => println!("Risk: {} ({} months)", bucket.label(), months),
            None => println!("Risk: {}", bucket.label()),
        }
    }
}
