use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// ABS remoteness classification of a postcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RemotenessArea {
    #[serde(rename = "Major Cities")]
    MajorCities,
    #[serde(rename = "Inner Regional")]
    InnerRegional,
    #[serde(rename = "Outer Regional")]
    OuterRegional,
    #[serde(rename = "Remote")]
    Remote,
    #[serde(rename = "Very Remote")]
    VeryRemote,
}

impl RemotenessArea {
    pub const fn ordered() -> [Self; 5] {
        [
            Self::MajorCities,
            Self::InnerRegional,
            Self::OuterRegional,
            Self::Remote,
            Self::VeryRemote,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::MajorCities => "Major Cities",
            Self::InnerRegional => "Inner Regional",
            Self::OuterRegional => "Outer Regional",
            Self::Remote => "Remote",
            Self::VeryRemote => "Very Remote",
        }
    }

    /// Accepts ABS labels ("Major Cities of Australia", "Remote Australia"), compact names
    /// and `RA1`..`RA5` codes.
    pub fn parse(value: &str) -> Option<Self> {
        let compact: String = value
            .chars()
            .filter(|ch| ch.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        let compact = compact
            .strip_suffix("ofaustralia")
            .or_else(|| compact.strip_suffix("australia"))
            .unwrap_or(&compact);

        match compact {
            "majorcities" | "majorcity" | "ra1" => Some(Self::MajorCities),
            "innerregional" | "ra2" => Some(Self::InnerRegional),
            "outerregional" | "ra3" => Some(Self::OuterRegional),
            "remote" | "ra4" => Some(Self::Remote),
            "veryremote" | "ra5" => Some(Self::VeryRemote),
            _ => None,
        }
    }
}

/// Canonical geography for one postcode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostcodeRecord {
    pub postcode: String,
    pub suburb: String,
    pub state: String,
    pub lga_code: String,
    pub lga_name: String,
    pub remoteness_area: RemotenessArea,
    pub remoteness_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LgaRecord {
    pub lga_code: String,
    pub lga_name: String,
    pub state: String,
}

/// A declared disaster. An absent `end_date` means the declaration is still active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Disaster {
    pub agrn: String,
    pub title: String,
    pub hazard_type: String,
    pub state: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl Disaster {
    pub fn is_current(&self, today: NaiveDate) -> bool {
        match self.end_date {
            None => true,
            Some(end) => end >= today,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisasterLgaLink {
    pub agrn: String,
    pub lga_code: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remoteness_parses_labels_and_codes() {
        assert_eq!(
            RemotenessArea::parse("Major Cities of Australia"),
            Some(RemotenessArea::MajorCities)
        );
        assert_eq!(
            RemotenessArea::parse("inner_regional"),
            Some(RemotenessArea::InnerRegional)
        );
        assert_eq!(
            RemotenessArea::parse("Very Remote Australia"),
            Some(RemotenessArea::VeryRemote)
        );
        assert_eq!(RemotenessArea::parse("RA4"), Some(RemotenessArea::Remote));
        assert_eq!(RemotenessArea::parse("Outback"), None);
    }

    #[test]
    fn open_ended_disasters_are_always_current() {
        let disaster = Disaster {
            agrn: "AGRN-1".to_string(),
            title: "Flood".to_string(),
            hazard_type: "Flood".to_string(),
            state: "QLD".to_string(),
            start_date: NaiveDate::from_ymd_opt(2001, 1, 1),
            end_date: None,
        };
        let today = NaiveDate::from_ymd_opt(2025, 10, 8).expect("valid date");
        assert!(disaster.is_current(today));

        let ended_today = Disaster {
            end_date: Some(today),
            ..disaster.clone()
        };
        assert!(ended_today.is_current(today));

        let expired = Disaster {
            end_date: today.pred_opt(),
            ..disaster
        };
        assert!(!expired.is_current(today));
    }
}
