//! Structured clinical record model.
//!
//! A [`ClinicalRecord`] owns the demographics and the ordered entities of one patient. Values are
//! plain data: the codec never mutates a record, [`crate::encode`] and [`crate::decode`] always
//! produce new values.

use crate::registry::{EntityId, EntityKind};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Dates
// ============================================================================

/// Errors produced when parsing an [`IsoDate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid ISO-8601 date '{0}' (expected YYYY, YYYY-MM, YYYY-MM-DD or an RFC 3339 date-time)")]
pub struct DateError(pub String);

/// An ISO-8601 date or date-time kept exactly as written.
///
/// Accepted shapes are the FHIR `date`/`dateTime` forms: `YYYY`, `YYYY-MM`, `YYYY-MM-DD` and full
/// RFC 3339 date-times. The text is validated once and never reinterpreted or converted between
/// time zones.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IsoDate(String);

impl IsoDate {
    pub fn parse(input: &str) -> Result<Self, DateError> {
        if is_iso_date(input) {
            Ok(Self(input.to_string()))
        } else {
            Err(DateError(input.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_iso_date(input: &str) -> bool {
    let bytes = input.as_bytes();
    let digits = |range: std::ops::Range<usize>| bytes[range].iter().all(u8::is_ascii_digit);

    match bytes.len() {
        4 => digits(0..4),
        7 => {
            if !(digits(0..4) && bytes[4] == b'-' && digits(5..7)) {
                return false;
            }
            let year = input[0..4].parse::<i32>();
            let month = input[5..7].parse::<u32>();
            matches!((year, month), (Ok(y), Ok(m)) if NaiveDate::from_ymd_opt(y, m, 1).is_some())
        }
        10 => {
            digits(0..4)
                && bytes[4] == b'-'
                && digits(5..7)
                && bytes[7] == b'-'
                && digits(8..10)
                && NaiveDate::parse_from_str(input, "%Y-%m-%d").is_ok()
        }
        _ => input.contains('T') && DateTime::parse_from_rfc3339(input).is_ok(),
    }
}

impl fmt::Display for IsoDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for IsoDate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for IsoDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        IsoDate::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A single date or a date range attached to an entity.
///
/// Onset-only entities set `start`; completion-only entities set `end`; ranges set both. A period
/// with neither is representable so that it can be reported by validation, but it cannot be
/// encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Period {
    pub start: Option<IsoDate>,
    pub end: Option<IsoDate>,
}

impl Period {
    /// A single point in time, stored as the start.
    pub fn on(date: IsoDate) -> Self {
        Self {
            start: Some(date),
            end: None,
        }
    }

    pub fn range(start: IsoDate, end: IsoDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Only an end date is known, e.g. a completion date.
    pub fn ended(end: IsoDate) -> Self {
        Self {
            start: None,
            end: Some(end),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

// ============================================================================
// Demographics
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VitalStatus {
    #[default]
    Alive,
    Deceased,
}

impl VitalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VitalStatus::Alive => "alive",
            VitalStatus::Deceased => "deceased",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input {
            "alive" => Some(VitalStatus::Alive),
            "deceased" => Some(VitalStatus::Deceased),
            _ => None,
        }
    }
}

/// Patient demographics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Demographics {
    pub name: Option<String>,
    /// Age in whole years.
    pub age: Option<u32>,
    pub birth_date: Option<IsoDate>,
    pub gender: Option<String>,
    pub race: Option<String>,
    pub ethnicity: Option<String>,
    pub vital_status: VitalStatus,
    /// Only meaningful when `vital_status` is [`VitalStatus::Deceased`].
    pub date_of_death: Option<IsoDate>,
}

// ============================================================================
// Entities
// ============================================================================

/// A care plan goal. Goals are owned by their care plan and carry no ID of their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Goal {
    pub description: String,
    pub status: String,
    pub due: Option<IsoDate>,
}

/// Kind-specific payload of a [`ClinicalEntity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityDetail {
    Condition,
    Medication,
    MedicationRequest { dosage: Option<String> },
    CarePlan { goals: Vec<Goal> },
    Procedure { outcome: Option<String> },
    Encounter { reason: Option<String> },
    /// The value is kept as text so that precision and composite values (`125/64`) survive.
    Observation { value: String, unit: Option<String> },
}

impl EntityDetail {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityDetail::Condition => EntityKind::Condition,
            EntityDetail::Medication => EntityKind::Medication,
            EntityDetail::MedicationRequest { .. } => EntityKind::MedicationRequest,
            EntityDetail::CarePlan { .. } => EntityKind::CarePlan,
            EntityDetail::Procedure { .. } => EntityKind::Procedure,
            EntityDetail::Encounter { .. } => EntityKind::Encounter,
            EntityDetail::Observation { .. } => EntityKind::Observation,
        }
    }
}

/// One clinical entity of any kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClinicalEntity {
    pub id: EntityId,
    pub description: String,
    /// Short status token (`active`, `stopped`, `completed`...). May be empty.
    pub status: String,
    pub period: Period,
    pub detail: EntityDetail,
}

impl ClinicalEntity {
    pub fn new(
        id: EntityId,
        description: impl Into<String>,
        status: impl Into<String>,
        period: Period,
        detail: EntityDetail,
    ) -> Self {
        Self {
            id,
            description: description.into(),
            status: status.into(),
            period,
            detail,
        }
    }

    /// Kind of the payload. The ID prefix is expected to agree; see
    /// [`crate::validation::validate_record`].
    pub fn kind(&self) -> EntityKind {
        self.detail.kind()
    }
}

// ============================================================================
// Record
// ============================================================================

/// One patient's record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClinicalRecord {
    pub demographics: Demographics,
    /// Entities in insertion order.
    pub entities: Vec<ClinicalEntity>,
}

impl ClinicalRecord {
    pub fn new(demographics: Demographics) -> Self {
        Self {
            demographics,
            entities: Vec::new(),
        }
    }

    /// Builder-style append used when assembling a record from an upstream source.
    pub fn with_entity(mut self, entity: ClinicalEntity) -> Self {
        self.entities.push(entity);
        self
    }

    /// Entities of one kind, in insertion order.
    pub fn entities_of(&self, kind: EntityKind) -> impl Iterator<Item = &ClinicalEntity> {
        self.entities
            .iter()
            .filter(move |entity| entity.kind() == kind)
    }

    pub fn find(&self, id: &str) -> Option<&ClinicalEntity> {
        self.entities.iter().find(|entity| entity.id.as_str() == id)
    }

    /// A copy with entities grouped by kind in section order, keeping insertion order within a
    /// kind. This is the order in which [`crate::encode`] writes entities, so for any valid record
    /// `decode(encode(r)) == r.grouped()`.
    pub fn grouped(&self) -> ClinicalRecord {
        let entities = EntityKind::ALL
            .iter()
            .flat_map(|kind| self.entities_of(*kind).cloned())
            .collect();
        ClinicalRecord {
            demographics: self.demographics.clone(),
            entities,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> IsoDate {
        IsoDate::parse(s).expect("valid date")
    }

    #[test]
    fn accepts_fhir_date_shapes() {
        for ok in [
            "1980",
            "1980-05",
            "1980-05-14",
            "2023-10-04T10:15:00+02:00",
            "2023-10-04T10:15:00.123Z",
        ] {
            assert_eq!(IsoDate::parse(ok).expect(ok).as_str(), ok);
        }
    }

    #[test]
    fn rejects_invalid_dates() {
        for bad in [
            "",
            "80",
            "1980-13",
            "1980-02-30",
            "1980/05/14",
            "14-05-1980",
            "1980-5-14",
            "2023-10-04 10:15:00",
            "yesterday",
        ] {
            assert!(IsoDate::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn date_time_text_is_not_normalised() {
        let d = date("2023-10-04T23:30:00-05:00");
        assert_eq!(d.to_string(), "2023-10-04T23:30:00-05:00");
    }

    #[test]
    fn grouped_orders_by_section_and_keeps_insertion_order() {
        let record = ClinicalRecord::default()
            .with_entity(ClinicalEntity::new(
                EntityId::parse("EN-312").expect("id"),
                "Emergency room admission",
                "completed",
                Period::on(date("2017-09-24")),
                EntityDetail::Encounter { reason: None },
            ))
            .with_entity(ClinicalEntity::new(
                EntityId::parse("CN-26").expect("id"),
                "Essential hypertension",
                "confirmed",
                Period::on(date("2003-06-11")),
                EntityDetail::Condition,
            ))
            .with_entity(ClinicalEntity::new(
                EntityId::parse("CN-9").expect("id"),
                "Loss of teeth",
                "confirmed",
                Period::on(date("1980-05-14")),
                EntityDetail::Condition,
            ));

        let grouped = record.grouped();
        let ids: Vec<&str> = grouped.entities.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["CN-26", "CN-9", "EN-312"]);
        assert_eq!(grouped.entities.len(), record.entities.len());
    }

    #[test]
    fn find_looks_up_by_id_text() {
        let record = ClinicalRecord::default().with_entity(ClinicalEntity::new(
            EntityId::parse("PR-1000").expect("id"),
            "Admission to hospice",
            "completed",
            Period::ended(date("2022-05-25")),
            EntityDetail::Procedure { outcome: None },
        ));
        assert!(record.find("PR-1000").is_some());
        assert!(record.find("PR-100").is_none());
    }
}
