use super::domain::{EligibilityOutcome, Postcode};
use crate::workflows::reference::{most_recent_first, Disaster, ReferenceSnapshot};
use chrono::NaiveDate;
use std::collections::HashSet;

/// Maps one postcode to its current covering disasters.
///
/// Disasters are unioned across every LGA the postcode maps to and de-duplicated by AGRN.
/// A declaration is current when it has no end date or ends on or after `today`.
pub fn resolve(
    postcode: &Postcode,
    snapshot: &ReferenceSnapshot,
    today: NaiveDate,
) -> EligibilityOutcome {
    let Some(record) = snapshot.resolve_postcode(postcode.as_str()) else {
        return EligibilityOutcome::unresolved(postcode.as_str());
    };

    let mut seen: HashSet<&str> = HashSet::new();
    let mut current: Vec<Disaster> = Vec::new();
    for lga_code in snapshot.lga_codes_for_postcode(postcode.as_str()) {
        for disaster in snapshot.disasters_for_lga(lga_code) {
            if disaster.is_current(today) && seen.insert(disaster.agrn.as_str()) {
                current.push(disaster.clone());
            }
        }
    }

    if snapshot.lga_codes_for_postcode(postcode.as_str()).len() > 1 {
        current.sort_by(most_recent_first);
    }

    EligibilityOutcome::resolved(record, current)
}

/// Validates the raw entry first; malformed input resolves to an unresolved outcome.
pub fn resolve_raw(
    raw: &str,
    snapshot: &ReferenceSnapshot,
    today: NaiveDate,
) -> EligibilityOutcome {
    match Postcode::parse(raw) {
        Ok(postcode) => resolve(&postcode, snapshot, today),
        Err(_) => EligibilityOutcome::unresolved(raw.trim()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::reference::{
        DisasterLgaLink, PostcodeMapping, PostcodeRecord, ReferenceTables, RemotenessArea,
    };

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn mapping(postcode: &str, lga: &str) -> PostcodeMapping {
        PostcodeMapping {
            record: PostcodeRecord {
                postcode: postcode.to_string(),
                suburb: "Lismore".to_string(),
                state: "NSW".to_string(),
                lga_code: lga.to_string(),
                lga_name: lga.to_string(),
                remoteness_area: RemotenessArea::InnerRegional,
                remoteness_code: "RA2".to_string(),
            },
            updated_at: None,
        }
    }

    fn disaster(agrn: &str, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Disaster {
        Disaster {
            agrn: agrn.to_string(),
            title: format!("Declaration {agrn}"),
            hazard_type: "Flood".to_string(),
            state: "NSW".to_string(),
            start_date: start,
            end_date: end,
        }
    }

    fn link(agrn: &str, lga: &str) -> DisasterLgaLink {
        DisasterLgaLink {
            agrn: agrn.to_string(),
            lga_code: lga.to_string(),
        }
    }

    fn snapshot() -> ReferenceSnapshot {
        ReferenceSnapshot::build(ReferenceTables {
            postcodes: vec![
                mapping("2480", "LISMORE"),
                mapping("2480", "KYOGLE"),
                mapping("2000", "SYDNEY"),
            ],
            lgas: Vec::new(),
            disasters: vec![
                disaster("AGRN-1", Some(date(2022, 2, 22)), None),
                disaster("AGRN-2", Some(date(2025, 3, 1)), Some(date(2025, 12, 31))),
                disaster("AGRN-3", Some(date(2019, 11, 8)), Some(date(2020, 6, 30))),
                disaster("AGRN-4", None, None),
            ],
            links: vec![
                link("AGRN-1", "LISMORE"),
                link("AGRN-1", "KYOGLE"),
                link("AGRN-2", "KYOGLE"),
                link("AGRN-3", "LISMORE"),
                link("AGRN-3", "SYDNEY"),
                link("AGRN-4", "KYOGLE"),
            ],
        })
        .expect("snapshot builds")
    }

    #[test]
    fn unknown_postcode_is_unresolved() {
        let outcome = resolve_raw("9999", &snapshot(), date(2025, 10, 8));
        assert!(!outcome.resolved);
        assert!(!outcome.is_eligible);
        assert!(outcome.state.is_none());
        assert_eq!(outcome.total_disasters, 0);
    }

    #[test]
    fn malformed_postcode_is_unresolved() {
        let outcome = resolve_raw(" 20x0 ", &snapshot(), date(2025, 10, 8));
        assert!(!outcome.resolved);
        assert_eq!(outcome.postcode, "20x0");
    }

    #[test]
    fn expired_disasters_do_not_confer_eligibility() {
        let outcome = resolve_raw("2000", &snapshot(), date(2025, 10, 8));
        assert!(outcome.resolved);
        assert!(!outcome.is_eligible);
        assert!(outcome.disasters.is_empty());
        assert_eq!(outcome.state.as_deref(), Some("NSW"));
    }

    #[test]
    fn multi_lga_postcodes_union_disasters_without_duplicates() {
        let outcome = resolve_raw("2480", &snapshot(), date(2025, 10, 8));
        assert!(outcome.is_eligible);
        assert_eq!(outcome.lga_code.as_deref(), Some("LISMORE"));

        let agrns: Vec<&str> = outcome.disasters.iter().map(|d| d.agrn.as_str()).collect();
        assert_eq!(agrns, vec!["AGRN-2", "AGRN-1", "AGRN-4"]);
        assert_eq!(outcome.total_disasters, 3);
        assert_eq!(
            outcome.primary_disaster().map(|d| d.agrn.as_str()),
            Some("AGRN-2")
        );
    }

    #[test]
    fn disasters_ending_today_still_count() {
        let outcome = resolve_raw("2480", &snapshot(), date(2025, 12, 31));
        assert!(outcome.disasters.iter().any(|d| d.agrn == "AGRN-2"));

        let outcome = resolve_raw("2480", &snapshot(), date(2026, 1, 1));
        assert!(outcome.disasters.iter().all(|d| d.agrn != "AGRN-2"));
        assert!(outcome.is_eligible, "open-ended declarations remain");
    }
}
