use super::domain::{EligibilityOutcome, RiskBucket};
use chrono::{Datelike, NaiveDate};

/// Whole calendar months from `start` to `as_of`. A month is only complete once the
/// day-of-month is reached again; starts after `as_of` count as zero.
pub fn months_between(start: NaiveDate, as_of: NaiveDate) -> u32 {
    if start >= as_of {
        return 0;
    }

    let mut months = (as_of.year() - start.year()) * 12 + as_of.month() as i32
        - start.month() as i32;
    if as_of.day() < start.day() {
        months -= 1;
    }

    months.max(0) as u32
}

/// Buckets an eligible outcome by its earliest dated current disaster.
///
/// Returns `None` for ineligible or unresolved outcomes. When every current disaster is
/// undated the outcome falls in [`RiskBucket::Over24Months`], so every eligible postcode
/// lands in exactly one bucket.
pub fn classify(outcome: &EligibilityOutcome, as_of: NaiveDate) -> Option<RiskBucket> {
    if !outcome.is_eligible {
        return None;
    }

    let earliest = outcome
        .disasters
        .iter()
        .filter_map(|disaster| disaster.start_date)
        .min();

    Some(match earliest {
        Some(start) => RiskBucket::from_months(months_between(start, as_of)),
        None => RiskBucket::Over24Months,
    })
}
