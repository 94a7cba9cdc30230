use super::super::domain::{EligibilityOutcome, RiskBucket};
use super::views::{
    percentage, AnalysisReport, BucketShare, RemotenessBreakdown, StateBreakdown,
    TimeBasedAnalysis,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Running counters for a slice of the population.
///
/// Only integer counters are kept, so merging partials is associative and commutative.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialAggregate {
    pub total: u64,
    pub eligible: u64,
    pub ineligible: u64,
    pub unresolved: u64,
    /// Subset of `unresolved` that failed postcode validation.
    pub malformed: u64,
    pub states: BTreeMap<String, StateBreakdown>,
    pub remoteness: RemotenessBreakdown,
    pub risk: [u64; 3],
}

impl PartialAggregate {
    pub fn record(&mut self, outcome: &EligibilityOutcome, bucket: Option<RiskBucket>) {
        self.total += 1;

        if !outcome.resolved {
            self.unresolved += 1;
            return;
        }

        if outcome.is_eligible {
            self.eligible += 1;
            // Every eligible outcome is classified; see `risk::classify`.
            let bucket = bucket.unwrap_or(RiskBucket::Over24Months);
            self.risk[bucket_index(bucket)] += 1;
        } else {
            self.ineligible += 1;
        }

        let state = outcome.state.clone().unwrap_or_default();
        let entry = self.states.entry(state).or_default();
        entry.total += 1;
        if outcome.is_eligible {
            entry.eligible += 1;
        }
        if let Some(area) = outcome.remoteness_area {
            entry.remoteness.increment(area);
            self.remoteness.increment(area);
        }
    }

    pub fn record_malformed(&mut self) {
        self.total += 1;
        self.unresolved += 1;
        self.malformed += 1;
    }

    pub fn merge(&mut self, other: PartialAggregate) {
        self.total += other.total;
        self.eligible += other.eligible;
        self.ineligible += other.ineligible;
        self.unresolved += other.unresolved;
        self.malformed += other.malformed;
        self.remoteness.merge(&other.remoteness);
        for (slot, count) in self.risk.iter_mut().zip(other.risk) {
            *slot += count;
        }

        for (state, breakdown) in other.states {
            let entry = self.states.entry(state).or_default();
            entry.total += breakdown.total;
            entry.eligible += breakdown.eligible;
            entry.remoteness.merge(&breakdown.remoteness);
        }
    }

    pub fn risk_count(&self, bucket: RiskBucket) -> u64 {
        self.risk[bucket_index(bucket)]
    }

    /// Computes percentages from the final counters and stamps the report.
    pub fn finish<S: Into<String>>(
        self,
        clinic_name: S,
        analyzed_at: DateTime<Utc>,
    ) -> AnalysisReport {
        let share = |bucket: RiskBucket| {
            let count = self.risk_count(bucket);
            BucketShare {
                count,
                percentage: percentage(count, self.eligible),
            }
        };
        let time_based_analysis = TimeBasedAnalysis {
            within12_months: share(RiskBucket::Within12Months),
            between12_and24_months: share(RiskBucket::Between12And24Months),
            over24_months: share(RiskBucket::Over24Months),
        };

        AnalysisReport {
            clinic_name: clinic_name.into(),
            analyzed_at,
            total_analyzed: self.total,
            eligible_count: self.eligible,
            ineligible_count: self.ineligible,
            unresolved_count: self.unresolved,
            eligible_percentage: percentage(self.eligible, self.total),
            state_breakdown: self.states,
            national_remoteness_breakdown: self.remoteness,
            time_based_analysis,
        }
    }
}

fn bucket_index(bucket: RiskBucket) -> usize {
    match bucket {
        RiskBucket::Within12Months => 0,
        RiskBucket::Between12And24Months => 1,
        RiskBucket::Over24Months => 2,
    }
}
