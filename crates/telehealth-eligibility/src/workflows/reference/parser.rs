use super::domain::{Disaster, DisasterLgaLink, LgaRecord, PostcodeRecord, RemotenessArea};
use super::snapshot::PostcodeMapping;
use crate::workflows::eligibility::Postcode;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer};
use std::io::Read;
use tracing::warn;

fn reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader)
}

pub(crate) fn parse_postcodes<R: Read>(source: R) -> Result<Vec<PostcodeMapping>, csv::Error> {
    let mut csv_reader = reader(source);
    let mut mappings = Vec::new();

    for (line, row) in csv_reader.deserialize::<PostcodeRow>().enumerate() {
        let row = row?;
        let postcode = match Postcode::parse(&row.postcode) {
            Ok(postcode) => postcode,
            Err(err) => {
                warn!(line = line + 2, %err, "skipping postcode row");
                continue;
            }
        };

        let remoteness_area = match RemotenessArea::parse(&row.remoteness_area)
            .or_else(|| row.remoteness_code.as_deref().and_then(RemotenessArea::parse))
        {
            Some(area) => area,
            None => {
                warn!(
                    line = line + 2,
                    postcode = postcode.as_str(),
                    remoteness = row.remoteness_area.as_str(),
                    "skipping postcode row with unknown remoteness area"
                );
                continue;
            }
        };

        mappings.push(PostcodeMapping {
            record: PostcodeRecord {
                postcode: postcode.into_inner(),
                suburb: row.suburb,
                state: row.state.to_ascii_uppercase(),
                lga_code: row.lga_code,
                lga_name: row.lga_name.unwrap_or_default(),
                remoteness_area,
                remoteness_code: row.remoteness_code.unwrap_or_default(),
            },
            updated_at: row.updated_at.as_deref().and_then(parse_datetime),
        });
    }

    Ok(mappings)
}

pub(crate) fn parse_lgas<R: Read>(source: R) -> Result<Vec<LgaRecord>, csv::Error> {
    let mut csv_reader = reader(source);
    let mut lgas = Vec::new();

    for row in csv_reader.deserialize::<LgaRow>() {
        let row = row?;
        lgas.push(LgaRecord {
            lga_code: row.lga_code,
            lga_name: row.lga_name,
            state: row.state.unwrap_or_default().to_ascii_uppercase(),
        });
    }

    Ok(lgas)
}

pub(crate) fn parse_disasters<R: Read>(source: R) -> Result<Vec<Disaster>, csv::Error> {
    let mut csv_reader = reader(source);
    let mut disasters = Vec::new();

    for (line, row) in csv_reader.deserialize::<DisasterRow>().enumerate() {
        let row = row?;

        // An end date we cannot read makes currency unknowable.
        let end_date = match row.end_date.as_deref() {
            None => None,
            Some(raw) => match parse_date(raw) {
                Some(date) => Some(date),
                None => {
                    warn!(
                        line = line + 2,
                        agrn = row.agrn.as_str(),
                        end_date = raw,
                        "skipping disaster with unreadable end date"
                    );
                    continue;
                }
            },
        };

        let start_date = row.start_date.as_deref().and_then(parse_date);
        if start_date.is_none() {
            warn!(
                agrn = row.agrn.as_str(),
                "disaster has no usable start date; excluded from risk bucketing"
            );
        }

        disasters.push(Disaster {
            agrn: row.agrn,
            title: row.title.unwrap_or_default(),
            hazard_type: row.hazard_type.unwrap_or_default(),
            state: row.state.unwrap_or_default().to_ascii_uppercase(),
            start_date,
            end_date,
        });
    }

    Ok(disasters)
}

pub(crate) fn parse_links<R: Read>(source: R) -> Result<Vec<DisasterLgaLink>, csv::Error> {
    let mut csv_reader = reader(source);
    let mut links = Vec::new();

    for row in csv_reader.deserialize::<LinkRow>() {
        let row = row?;
        links.push(DisasterLgaLink {
            agrn: row.agrn,
            lga_code: row.lga_code,
        });
    }

    Ok(links)
}

#[derive(Debug, Deserialize)]
struct PostcodeRow {
    postcode: String,
    #[serde(default)]
    suburb: String,
    #[serde(default)]
    state: String,
    lga_code: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    lga_name: Option<String>,
    #[serde(default)]
    remoteness_area: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    remoteness_code: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    updated_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LgaRow {
    lga_code: String,
    lga_name: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DisasterRow {
    agrn: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    title: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    hazard_type: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    state: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    start_date: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LinkRow {
    agrn: String,
    lga_code: String,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| {
        let trimmed = value.trim();
        !trimmed.is_empty() && !trimmed.eq_ignore_ascii_case("null")
    }))
}

pub(crate) fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc());
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }

    None
}

pub(crate) fn parse_date(value: &str) -> Option<NaiveDate> {
    parse_datetime(value).map(|dt| dt.date())
}
