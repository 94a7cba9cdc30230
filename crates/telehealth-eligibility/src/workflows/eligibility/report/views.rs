use super::super::domain::RiskBucket;
use crate::workflows::reference::RemotenessArea;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Patient counts per ABS remoteness area. Always serialises all five areas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotenessBreakdown {
    #[serde(rename = "Major Cities")]
    pub major_cities: u64,
    #[serde(rename = "Inner Regional")]
    pub inner_regional: u64,
    #[serde(rename = "Outer Regional")]
    pub outer_regional: u64,
    #[serde(rename = "Remote")]
    pub remote: u64,
    #[serde(rename = "Very Remote")]
    pub very_remote: u64,
}

impl RemotenessBreakdown {
    pub fn get(&self, area: RemotenessArea) -> u64 {
        match area {
            RemotenessArea::MajorCities => self.major_cities,
            RemotenessArea::InnerRegional => self.inner_regional,
            RemotenessArea::OuterRegional => self.outer_regional,
            RemotenessArea::Remote => self.remote,
            RemotenessArea::VeryRemote => self.very_remote,
        }
    }

    fn slot(&mut self, area: RemotenessArea) -> &mut u64 {
        match area {
            RemotenessArea::MajorCities => &mut self.major_cities,
            RemotenessArea::InnerRegional => &mut self.inner_regional,
            RemotenessArea::OuterRegional => &mut self.outer_regional,
            RemotenessArea::Remote => &mut self.remote,
            RemotenessArea::VeryRemote => &mut self.very_remote,
        }
    }

    pub(crate) fn increment(&mut self, area: RemotenessArea) {
        *self.slot(area) += 1;
    }

    pub(crate) fn merge(&mut self, other: &Self) {
        for area in RemotenessArea::ordered() {
            *self.slot(area) += other.get(area);
        }
    }

    pub fn total(&self) -> u64 {
        RemotenessArea::ordered()
            .into_iter()
            .map(|area| self.get(area))
            .sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateBreakdown {
    pub total: u64,
    pub eligible: u64,
    pub remoteness: RemotenessBreakdown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BucketShare {
    pub count: u64,
    pub percentage: f64,
}

/// Risk buckets as shares of the eligible population.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeBasedAnalysis {
    pub within12_months: BucketShare,
    pub between12_and24_months: BucketShare,
    pub over24_months: BucketShare,
}

impl TimeBasedAnalysis {
    pub fn bucket(&self, bucket: RiskBucket) -> BucketShare {
        match bucket {
            RiskBucket::Within12Months => self.within12_months,
            RiskBucket::Between12And24Months => self.between12_and24_months,
            RiskBucket::Over24Months => self.over24_months,
        }
    }
}

/// Aggregate eligibility statistics for one clinic population, produced once per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub clinic_name: String,
    pub analyzed_at: DateTime<Utc>,
    pub total_analyzed: u64,
    pub eligible_count: u64,
    pub ineligible_count: u64,
    pub unresolved_count: u64,
    pub eligible_percentage: f64,
    pub state_breakdown: BTreeMap<String, StateBreakdown>,
    pub national_remoteness_breakdown: RemotenessBreakdown,
    pub time_based_analysis: TimeBasedAnalysis,
}

/// `round(count / total * 100, 1)`, or zero for an empty denominator.
pub fn percentage(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }

    ((count as f64 / total as f64) * 1_000.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn percentage_rounds_to_one_decimal_and_guards_zero() {
        assert_eq!(percentage(1, 3), 33.3);
        assert_eq!(percentage(2, 3), 66.7);
        assert_eq!(percentage(3, 3), 100.0);
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(5, 0), 0.0);
    }

    #[test]
    fn remoteness_breakdown_serialises_display_names() {
        let mut breakdown = RemotenessBreakdown::default();
        breakdown.increment(RemotenessArea::VeryRemote);
        breakdown.increment(RemotenessArea::VeryRemote);
        breakdown.increment(RemotenessArea::MajorCities);

        let value = serde_json::to_value(breakdown).expect("serialises");
        assert_eq!(
            value,
            json!({
                "Major Cities": 1,
                "Inner Regional": 0,
                "Outer Regional": 0,
                "Remote": 0,
                "Very Remote": 2
            })
        );
        assert_eq!(breakdown.total(), 3);
    }

    #[test]
    fn time_based_analysis_uses_contract_keys() {
        let analysis = TimeBasedAnalysis {
            within12_months: BucketShare {
                count: 1,
                percentage: 50.0,
            },
            ..TimeBasedAnalysis::default()
        };
        let value = serde_json::to_value(analysis).expect("serialises");
        assert_eq!(value["within12Months"]["count"], 1);
        assert!(value.get("between12And24Months").is_some());
        assert!(value.get("over24Months").is_some());
    }
}
