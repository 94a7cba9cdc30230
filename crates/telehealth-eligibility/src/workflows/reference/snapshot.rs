use super::domain::{Disaster, DisasterLgaLink, LgaRecord, PostcodeRecord};
use super::ReferenceDataError;
use chrono::NaiveDateTime;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// One row of the postcode table together with its revision timestamp.
#[derive(Debug, Clone)]
pub struct PostcodeMapping {
    pub record: PostcodeRecord,
    pub updated_at: Option<NaiveDateTime>,
}

/// The four raw tables a snapshot is built from.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTables {
    pub postcodes: Vec<PostcodeMapping>,
    pub lgas: Vec<LgaRecord>,
    pub disasters: Vec<Disaster>,
    pub links: Vec<DisasterLgaLink>,
}

#[derive(Debug, Clone)]
struct PostcodeEntry {
    record: PostcodeRecord,
    updated_at: Option<NaiveDateTime>,
    /// Canonical LGA first, then any additional LGAs the postcode straddles.
    lga_codes: Vec<String>,
}

/// Immutable lookup structures shared read-only by every analysis worker.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSnapshot {
    postcodes: HashMap<String, PostcodeEntry>,
    lga_disasters: HashMap<String, Vec<Disaster>>,
    disaster_count: usize,
}

impl ReferenceSnapshot {
    pub fn build(tables: ReferenceTables) -> Result<Self, ReferenceDataError> {
        let ReferenceTables {
            postcodes,
            lgas,
            disasters,
            links,
        } = tables;

        if postcodes.is_empty() {
            return Err(ReferenceDataError::EmptyDataset { dataset: "postcodes" });
        }

        let lga_names: HashMap<String, LgaRecord> = lgas
            .into_iter()
            .map(|lga| (lga.lga_code.clone(), lga))
            .collect();

        let mut disasters_by_agrn: HashMap<String, Disaster> = HashMap::new();
        for disaster in disasters {
            if disasters_by_agrn.contains_key(&disaster.agrn) {
                warn!(agrn = disaster.agrn.as_str(), "duplicate disaster declaration ignored");
                continue;
            }
            disasters_by_agrn.insert(disaster.agrn.clone(), disaster);
        }
        let disaster_count = disasters_by_agrn.len();

        let mut lga_disasters: HashMap<String, Vec<Disaster>> = HashMap::new();
        let mut seen_links: HashSet<(String, String)> = HashSet::new();
        for link in links {
            let Some(disaster) = disasters_by_agrn.get(&link.agrn) else {
                warn!(
                    agrn = link.agrn.as_str(),
                    lga_code = link.lga_code.as_str(),
                    "link references unknown disaster"
                );
                continue;
            };
            if !lga_names.is_empty() && !lga_names.contains_key(&link.lga_code) {
                debug!(lga_code = link.lga_code.as_str(), "link references LGA absent from LGA table");
            }
            if seen_links.insert((link.agrn.clone(), link.lga_code.clone())) {
                lga_disasters
                    .entry(link.lga_code)
                    .or_default()
                    .push(disaster.clone());
            }
        }

        for list in lga_disasters.values_mut() {
            list.sort_by(most_recent_first);
        }

        let mut entries: HashMap<String, PostcodeEntry> = HashMap::new();
        for PostcodeMapping {
            mut record,
            updated_at,
        } in postcodes
        {
            if let Some(lga) = lga_names.get(&record.lga_code) {
                record.lga_name = lga.lga_name.clone();
            }

            match entries.get_mut(&record.postcode) {
                None => {
                    let lga_codes = vec![record.lga_code.clone()];
                    entries.insert(
                        record.postcode.clone(),
                        PostcodeEntry {
                            record,
                            updated_at,
                            lga_codes,
                        },
                    );
                }
                Some(entry) => {
                    if !entry.lga_codes.contains(&record.lga_code) {
                        entry.lga_codes.push(record.lga_code.clone());
                    }
                    // Strictly newer revisions replace the canonical row; ties keep the first.
                    if updated_at > entry.updated_at {
                        let canonical = record.lga_code.clone();
                        entry.lga_codes.retain(|code| code != &canonical);
                        entry.lga_codes.insert(0, canonical);
                        entry.record = record;
                        entry.updated_at = updated_at;
                    }
                }
            }
        }

        debug!(
            postcodes = entries.len(),
            lgas_with_disasters = lga_disasters.len(),
            disasters = disaster_count,
            "reference snapshot built"
        );

        Ok(Self {
            postcodes: entries,
            lga_disasters,
            disaster_count,
        })
    }

    /// Expects a normalised 4-digit postcode; performs no validation.
    pub fn resolve_postcode(&self, postcode: &str) -> Option<&PostcodeRecord> {
        self.postcodes.get(postcode).map(|entry| &entry.record)
    }

    pub fn lga_codes_for_postcode(&self, postcode: &str) -> &[String] {
        self.postcodes
            .get(postcode)
            .map(|entry| entry.lga_codes.as_slice())
            .unwrap_or(&[])
    }

    /// Disasters linked to the LGA, most recent start first.
    pub fn disasters_for_lga(&self, lga_code: &str) -> &[Disaster] {
        self.lga_disasters
            .get(lga_code)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn postcode_count(&self) -> usize {
        self.postcodes.len()
    }

    pub fn disaster_count(&self) -> usize {
        self.disaster_count
    }
}

/// Descending start date with undated declarations last; AGRN breaks ties.
pub(crate) fn most_recent_first(a: &Disaster, b: &Disaster) -> Ordering {
    match (a.start_date, b.start_date) {
        (Some(left), Some(right)) => right.cmp(&left),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.agrn.cmp(&b.agrn))
}
