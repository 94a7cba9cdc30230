use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{EligibilityOutcome, MalformedPostcode, Postcode, RiskBucket};
use super::orchestrator::{AnalysisError, AnalysisRequest, PopulationAnalyzer, RunControl};
use super::report::AnalysisReport;
use super::{resolver, risk};
use crate::workflows::reference::{ReferenceDataSource, ReferenceSnapshot, SnapshotCache};

/// Service composing the snapshot cache, the orchestrator and the injected clock.
pub struct EligibilityService<S> {
    snapshots: Arc<SnapshotCache<S>>,
    analyzer: PopulationAnalyzer,
}

impl<S> EligibilityService<S>
where
    S: ReferenceDataSource + 'static,
{
    pub fn new(snapshots: Arc<SnapshotCache<S>>, analyzer: PopulationAnalyzer) -> Self {
        Self {
            snapshots,
            analyzer,
        }
    }

    /// Analyse a clinic population. Invalid requests are rejected before reference data
    /// is touched.
    pub async fn analyze(
        &self,
        request: AnalysisRequest,
        control: RunControl,
    ) -> Result<AnalysisReport, EligibilityServiceError> {
        self.analyzer.validate(&request).map_err(AnalysisError::from)?;
        let snapshot = self.snapshot().await?;
        let report = self
            .analyzer
            .analyze_with(request, snapshot, control)
            .await?;
        Ok(report)
    }

    /// Eligibility of a single postcode with its risk bucket.
    pub async fn check_postcode(
        &self,
        raw: &str,
    ) -> Result<PostcodeCheck, EligibilityServiceError> {
        let postcode = Postcode::parse(raw)?;
        let snapshot = self.snapshot().await?;
        let checked_at = self.analyzer.clock().now();
        let today = checked_at.date_naive();

        let outcome = resolver::resolve(&postcode, &snapshot, today);
        let risk_bucket = risk::classify(&outcome, today);
        let months_since_earliest = outcome
            .disasters
            .iter()
            .filter_map(|disaster| disaster.start_date)
            .min()
            .map(|start| risk::months_between(start, today));

        Ok(PostcodeCheck {
            checked_at,
            outcome,
            risk_bucket,
            months_since_earliest,
        })
    }

    /// Warm the cache so the first request does not pay for the load.
    pub async fn preload(&self) -> Result<(), EligibilityServiceError> {
        self.snapshot().await.map(|_| ())
    }

    async fn snapshot(&self) -> Result<Arc<ReferenceSnapshot>, EligibilityServiceError> {
        let cache = self.snapshots.clone();
        let snapshot = tokio::task::spawn_blocking(move || cache.snapshot())
            .await
            .map_err(AnalysisError::from)?
            .map_err(AnalysisError::from)?;
        Ok(snapshot)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostcodeCheck {
    pub checked_at: DateTime<Utc>,
    pub outcome: EligibilityOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_bucket: Option<RiskBucket>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub months_since_earliest: Option<u32>,
}

/// Error raised by the eligibility service.
#[derive(Debug, thiserror::Error)]
pub enum EligibilityServiceError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    MalformedPostcode(#[from] MalformedPostcode),
}
