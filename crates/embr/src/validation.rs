//! Record invariants and size guards.
//!
//! [`validate_record`] runs before every encode. It rejects anything the encoder could not write
//! unambiguously or that the decoder would later refuse, so that every encoded record decodes.

use crate::record::{ClinicalEntity, ClinicalRecord, Demographics, EntityDetail, VitalStatus};
use crate::{EmbrError, EmbrResult};
use std::collections::HashSet;

/// Maximum size of an EMBR document accepted by the decoder.
pub const MAX_DOCUMENT_BYTES: usize = 8 * 1024 * 1024;

/// Maximum length, in characters, of any single text field.
pub const MAX_FIELD_CHARS: usize = 4096;

/// Maximum number of entities in one record.
pub const MAX_ENTITIES: usize = 100_000;

const DEMOGRAPHICS_SUBJECT: &str = "demographics";
const RECORD_SUBJECT: &str = "record";

fn invalid(subject: &str, reason: impl Into<String>) -> EmbrError {
    EmbrError::Validation {
        subject: subject.to_string(),
        reason: reason.into(),
    }
}

/// Checks a text field's length. Shared with the decoder so both directions agree on the limit.
pub(crate) fn check_field_length(field: &str, value: &str) -> Result<(), String> {
    let chars = value.chars().count();
    if chars > MAX_FIELD_CHARS {
        return Err(format!(
            "{field} is {chars} characters, exceeding the maximum of {MAX_FIELD_CHARS}"
        ));
    }
    Ok(())
}

/// Checks the size of an encoded document, which only exists once the record is rendered.
pub(crate) fn check_document_size(bytes: usize) -> EmbrResult<()> {
    if bytes > MAX_DOCUMENT_BYTES {
        return Err(invalid(
            RECORD_SUBJECT,
            format!("encoded record is {bytes} bytes, exceeding the maximum of {MAX_DOCUMENT_BYTES}"),
        ));
    }
    Ok(())
}

fn required_text(subject: &str, field: &str, value: &str) -> EmbrResult<()> {
    if value.trim().is_empty() {
        return Err(invalid(subject, format!("{field} cannot be empty")));
    }
    check_field_length(field, value).map_err(|reason| invalid(subject, reason))
}

fn optional_text(subject: &str, field: &str, value: Option<&str>) -> EmbrResult<()> {
    match value {
        Some(text) => required_text(subject, field, text),
        None => Ok(()),
    }
}

/// Validates a whole record.
///
/// # Errors
///
/// Returns [`EmbrError::Validation`] naming the first offending entity ID (or `demographics` /
/// `record`) if:
/// - two entities share an ID,
/// - an ID prefix does not match the entity's kind,
/// - an entity has neither a start nor an end date,
/// - a description is empty, or an optional text field is present but empty,
/// - a text field exceeds [`MAX_FIELD_CHARS`],
/// - a living patient has a date of death,
/// - the record holds more than [`MAX_ENTITIES`] entities.
///
/// The encoded size limit, [`MAX_DOCUMENT_BYTES`], depends on the rendered text and is checked by
/// [`crate::encode`] after rendering, also as a `record` validation error.
pub fn validate_record(record: &ClinicalRecord) -> EmbrResult<()> {
    if record.entities.len() > MAX_ENTITIES {
        return Err(invalid(
            RECORD_SUBJECT,
            format!(
                "{} entities exceeds the maximum of {MAX_ENTITIES}",
                record.entities.len()
            ),
        ));
    }

    validate_demographics(&record.demographics)?;

    let mut seen = HashSet::with_capacity(record.entities.len());
    for entity in &record.entities {
        if !seen.insert(entity.id.as_str()) {
            return Err(invalid(entity.id.as_str(), "duplicate id"));
        }
        validate_entity(entity)?;
    }

    Ok(())
}

fn validate_demographics(demographics: &Demographics) -> EmbrResult<()> {
    let subject = DEMOGRAPHICS_SUBJECT;
    optional_text(subject, "name", demographics.name.as_deref())?;
    optional_text(subject, "gender", demographics.gender.as_deref())?;
    optional_text(subject, "race", demographics.race.as_deref())?;
    optional_text(subject, "ethnicity", demographics.ethnicity.as_deref())?;

    if demographics.vital_status == VitalStatus::Alive && demographics.date_of_death.is_some() {
        return Err(invalid(
            subject,
            "date of death given for a patient who is alive",
        ));
    }

    Ok(())
}

/// Validates a single entity in isolation (uniqueness is checked by [`validate_record`]).
pub fn validate_entity(entity: &ClinicalEntity) -> EmbrResult<()> {
    let subject = entity.id.as_str();

    if entity.id.kind() != entity.kind() {
        return Err(invalid(
            subject,
            format!(
                "id prefix {} belongs to {} but the entity is a {}",
                entity.id.prefix(),
                entity.id.kind(),
                entity.kind()
            ),
        ));
    }

    if entity.period.is_empty() {
        return Err(invalid(subject, "missing date"));
    }

    required_text(subject, "description", &entity.description)?;
    check_field_length("status", &entity.status).map_err(|reason| invalid(subject, reason))?;

    match &entity.detail {
        EntityDetail::Condition | EntityDetail::Medication => {}
        EntityDetail::MedicationRequest { dosage } => {
            optional_text(subject, "dosage", dosage.as_deref())?;
        }
        EntityDetail::Procedure { outcome } => {
            optional_text(subject, "outcome", outcome.as_deref())?;
        }
        EntityDetail::Encounter { reason } => {
            optional_text(subject, "reason", reason.as_deref())?;
        }
        EntityDetail::Observation { value, unit } => {
            required_text(subject, "observation value", value)?;
            optional_text(subject, "unit", unit.as_deref())?;
        }
        EntityDetail::CarePlan { goals } => {
            for goal in goals {
                required_text(subject, "goal description", &goal.description)?;
                check_field_length("goal status", &goal.status)
                    .map_err(|reason| invalid(subject, reason))?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Goal, IsoDate, Period};
    use crate::registry::EntityId;

    fn entity(id: &str, detail: EntityDetail) -> ClinicalEntity {
        ClinicalEntity::new(
            EntityId::parse(id).expect("valid id"),
            "Something",
            "active",
            Period::on(IsoDate::parse("2020-01-01").expect("valid date")),
            detail,
        )
    }

    fn subject_of(err: EmbrError) -> String {
        match err {
            EmbrError::Validation { subject, .. } => subject,
            other => panic!("expected Validation error, got {other:?}"),
        }
    }

    #[test]
    fn accepts_valid_record() {
        let record = ClinicalRecord::default()
            .with_entity(entity("CN-9", EntityDetail::Condition))
            .with_entity(entity(
                "OB-1",
                EntityDetail::Observation {
                    value: "183.1".into(),
                    unit: Some("cm".into()),
                },
            ));
        assert!(validate_record(&record).is_ok());
    }

    #[test]
    fn rejects_duplicate_ids() {
        let record = ClinicalRecord::default()
            .with_entity(entity("CN-9", EntityDetail::Condition))
            .with_entity(entity("CN-9", EntityDetail::Condition));
        let err = validate_record(&record).expect_err("duplicate should fail");
        assert!(err.to_string().contains("duplicate id"));
        assert_eq!(subject_of(err), "CN-9");
    }

    #[test]
    fn rejects_prefix_kind_mismatch() {
        let record =
            ClinicalRecord::default().with_entity(entity("CN-4", EntityDetail::Encounter { reason: None }));
        let err = validate_record(&record).expect_err("mismatch should fail");
        assert!(err.to_string().contains("belongs to Condition"));
        assert_eq!(subject_of(err), "CN-4");
    }

    #[test]
    fn rejects_missing_date() {
        let mut e = entity("PR-1000", EntityDetail::Procedure { outcome: None });
        e.period = Period::default();
        let err = validate_record(&ClinicalRecord::default().with_entity(e))
            .expect_err("missing date should fail");
        assert!(err.to_string().contains("missing date"));
        assert_eq!(subject_of(err), "PR-1000");
    }

    #[test]
    fn rejects_blank_description_and_empty_optionals() {
        let mut e = entity("MD-178", EntityDetail::Medication);
        e.description = "   ".into();
        assert!(validate_entity(&e).is_err());

        let e = entity(
            "MR-49",
            EntityDetail::MedicationRequest {
                dosage: Some(String::new()),
            },
        );
        let err = validate_entity(&e).expect_err("empty dosage should fail");
        assert!(err.to_string().contains("dosage cannot be empty"));
    }

    #[test]
    fn rejects_empty_goal_description() {
        let e = entity(
            "CP-28",
            EntityDetail::CarePlan {
                goals: vec![Goal {
                    description: String::new(),
                    status: "active".into(),
                    due: None,
                }],
            },
        );
        assert_eq!(subject_of(validate_entity(&e).expect_err("should fail")), "CP-28");
    }

    #[test]
    fn rejects_oversized_fields() {
        let mut e = entity("CN-1", EntityDetail::Condition);
        e.description = "x".repeat(MAX_FIELD_CHARS + 1);
        let err = validate_entity(&e).expect_err("oversized should fail");
        assert!(err.to_string().contains("exceeding the maximum"));
    }

    #[test]
    fn rejects_date_of_death_for_living_patient() {
        let mut record = ClinicalRecord::default();
        record.demographics.date_of_death = Some(IsoDate::parse("2023-01-01").expect("date"));
        assert_eq!(
            subject_of(validate_record(&record).expect_err("should fail")),
            "demographics"
        );

        record.demographics.vital_status = VitalStatus::Deceased;
        assert!(validate_record(&record).is_ok());
    }

    #[test]
    fn empty_status_is_allowed() {
        let mut e = entity("EN-312", EntityDetail::Encounter { reason: None });
        e.status = String::new();
        assert!(validate_entity(&e).is_ok());
    }
}
