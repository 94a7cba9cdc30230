use crate::workflows::reference::{Disaster, PostcodeRecord, RemotenessArea};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A normalised 4-digit Australian postcode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Postcode(String);

impl Postcode {
    /// Accepts 3 or 4 ASCII digits; 3-digit input is zero-padded (`800` -> `0800`).
    pub fn parse(raw: &str) -> Result<Self, MalformedPostcode> {
        let trimmed = raw.trim();
        let digits_only = trimmed.chars().all(|ch| ch.is_ascii_digit());

        match trimmed.len() {
            3 if digits_only => Ok(Self(format!("0{trimmed}"))),
            4 if digits_only => Ok(Self(trimmed.to_string())),
            _ => Err(MalformedPostcode {
                value: raw.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Postcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single input entry that is not a 3-4 digit numeric postcode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{value}' is not a 3-4 digit postcode")]
pub struct MalformedPostcode {
    pub value: String,
}

/// Per-postcode eligibility result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityOutcome {
    pub postcode: String,
    pub resolved: bool,
    pub is_eligible: bool,
    pub suburb: Option<String>,
    pub state: Option<String>,
    pub lga_name: Option<String>,
    pub lga_code: Option<String>,
    pub remoteness_area: Option<RemotenessArea>,
    /// Current disasters, most recent start first.
    pub disasters: Vec<Disaster>,
    pub total_disasters: usize,
}

impl EligibilityOutcome {
    pub fn unresolved<S: Into<String>>(postcode: S) -> Self {
        Self {
            postcode: postcode.into(),
            resolved: false,
            is_eligible: false,
            suburb: None,
            state: None,
            lga_name: None,
            lga_code: None,
            remoteness_area: None,
            disasters: Vec::new(),
            total_disasters: 0,
        }
    }

    pub(crate) fn resolved(record: &PostcodeRecord, disasters: Vec<Disaster>) -> Self {
        Self {
            postcode: record.postcode.clone(),
            resolved: true,
            is_eligible: !disasters.is_empty(),
            suburb: Some(record.suburb.clone()),
            state: Some(record.state.clone()),
            lga_name: Some(record.lga_name.clone()),
            lga_code: Some(record.lga_code.clone()),
            remoteness_area: Some(record.remoteness_area),
            total_disasters: disasters.len(),
            disasters,
        }
    }

    /// The most recently started current disaster, used for notes and headlines.
    pub fn primary_disaster(&self) -> Option<&Disaster> {
        self.disasters.first()
    }
}

/// Time since the longest-standing current disaster began.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RiskBucket {
    Within12Months,
    Between12And24Months,
    Over24Months,
}

impl RiskBucket {
    pub const fn ordered() -> [Self; 3] {
        [
            Self::Within12Months,
            Self::Between12And24Months,
            Self::Over24Months,
        ]
    }

    pub const fn from_months(months: u32) -> Self {
        match months {
            0..=11 => Self::Within12Months,
            12..=23 => Self::Between12And24Months,
            _ => Self::Over24Months,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Within12Months => "Within 12 months",
            Self::Between12And24Months => "12-24 months",
            Self::Over24Months => "Over 24 months",
        }
    }
}
