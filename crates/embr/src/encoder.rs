//! EMBR encoder.
//!
//! Output layout:
//!
//! ```text
//! [Demographics]
//! name=Clair Towne|age=66|born=1957-05-22|gender=male|status=alive
//! [Conditions]
//! CN-9|Loss of teeth (disorder)|confirmed|1980-05-14
//! [CarePlans]
//! CP-623|Cancer care plan|completed|2021-06-29~2023-08-15
//! >Reduce tumour size|achieved|2022-01-01
//! [Observations]
//! OB-1|Body Height|final|2023-10-04|183.1|cm
//! ```
//!
//! Sections are written in [`EntityKind::ALL`] order; empty entity sections are omitted. Within a
//! section entities keep record order. Trailing empty optional fields are dropped to save tokens.

use crate::escape::escape_field;
use crate::format::{
    field_bounds, render_period, section_header, DEMOGRAPHICS_SECTION, FIELD_SEPARATOR,
    GOAL_MARKER, KEY_AGE, KEY_BORN, KEY_DIED, KEY_ETHNICITY, KEY_GENDER, KEY_NAME, KEY_RACE,
    KEY_STATUS, KEY_VALUE_SEPARATOR,
};
use crate::record::{ClinicalEntity, ClinicalRecord, Demographics, EntityDetail, Goal};
use crate::registry::EntityKind;
use crate::validation::{check_document_size, validate_record};
use crate::EmbrResult;

/// Encodes a record as EMBR text.
///
/// The output is a pure function of the record: encoding the same record twice yields identical
/// bytes.
///
/// # Errors
///
/// Returns [`crate::EmbrError::Validation`] naming the offending entity if the record breaks an
/// invariant (duplicate ID, missing date, prefix/kind mismatch, ...), or naming `record` if the
/// encoded text would exceed [`crate::validation::MAX_DOCUMENT_BYTES`].
pub fn encode(record: &ClinicalRecord) -> EmbrResult<String> {
    validate_record(record)?;

    let mut output = String::new();

    push_line(&mut output, &section_header(DEMOGRAPHICS_SECTION));
    push_line(&mut output, &demographics_line(&record.demographics));

    for kind in EntityKind::ALL {
        let mut entities = record.entities_of(kind).peekable();
        if entities.peek().is_none() {
            continue;
        }

        push_line(&mut output, &section_header(kind.section_name()));
        for entity in entities {
            push_line(&mut output, &entity_line(entity));
            if let EntityDetail::CarePlan { goals } = &entity.detail {
                for goal in goals {
                    push_line(&mut output, &goal_line(goal));
                }
            }
        }
    }

    check_document_size(output.len())?;

    tracing::debug!(
        entities = record.entities.len(),
        bytes = output.len(),
        "encoded EMBR record"
    );

    Ok(output)
}

fn push_line(output: &mut String, line: &str) {
    output.push_str(line);
    output.push('\n');
}

fn join_fields(fields: &[String]) -> String {
    let mut buffer = [0u8; 4];
    let separator: &str = FIELD_SEPARATOR.encode_utf8(&mut buffer);
    fields.join(separator)
}

fn demographics_line(demographics: &Demographics) -> String {
    let mut pairs: Vec<(&str, String)> = Vec::new();

    if let Some(name) = &demographics.name {
        pairs.push((KEY_NAME, escape_field(name)));
    }
    if let Some(age) = demographics.age {
        pairs.push((KEY_AGE, age.to_string()));
    }
    if let Some(born) = &demographics.birth_date {
        pairs.push((KEY_BORN, born.to_string()));
    }
    if let Some(gender) = &demographics.gender {
        pairs.push((KEY_GENDER, escape_field(gender)));
    }
    if let Some(race) = &demographics.race {
        pairs.push((KEY_RACE, escape_field(race)));
    }
    if let Some(ethnicity) = &demographics.ethnicity {
        pairs.push((KEY_ETHNICITY, escape_field(ethnicity)));
    }
    pairs.push((KEY_STATUS, demographics.vital_status.as_str().to_string()));
    if let Some(died) = &demographics.date_of_death {
        pairs.push((KEY_DIED, died.to_string()));
    }

    let fields: Vec<String> = pairs
        .into_iter()
        .map(|(key, value)| format!("{key}{KEY_VALUE_SEPARATOR}{value}"))
        .collect();
    join_fields(&fields)
}

fn entity_line(entity: &ClinicalEntity) -> String {
    let mut fields = vec![
        entity.id.to_string(),
        escape_field(&entity.description),
        escape_field(&entity.status),
        render_period(&entity.period),
    ];

    let optional = |value: &Option<String>| value.as_deref().map(escape_field).unwrap_or_default();
    match &entity.detail {
        EntityDetail::Condition | EntityDetail::Medication | EntityDetail::CarePlan { .. } => {}
        EntityDetail::MedicationRequest { dosage } => fields.push(optional(dosage)),
        EntityDetail::Procedure { outcome } => fields.push(optional(outcome)),
        EntityDetail::Encounter { reason } => fields.push(optional(reason)),
        EntityDetail::Observation { value, unit } => {
            fields.push(escape_field(value));
            fields.push(optional(unit));
        }
    }

    let (min_fields, _) = field_bounds(entity.kind());
    while fields.len() > min_fields && fields.last().is_some_and(String::is_empty) {
        fields.pop();
    }

    join_fields(&fields)
}

fn goal_line(goal: &Goal) -> String {
    let mut fields = vec![escape_field(&goal.description), escape_field(&goal.status)];
    if let Some(due) = &goal.due {
        fields.push(due.to_string());
    }
    format!("{GOAL_MARKER}{}", join_fields(&fields))
}
