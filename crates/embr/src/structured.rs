//! Structured (JSON/YAML) import and export of clinical records.
//!
//! Responsibilities:
//! - Define a strict wire model for serialisation/deserialisation
//! - Translate between the wire model and [`ClinicalRecord`]
//! - Report schema mismatches with the path of the failing field
//!
//! Notes:
//! - Import checks the schema only. Record invariants (unique IDs, prefix/kind agreement,
//!   mandatory dates) are enforced by [`crate::encode`], which reports them as validation errors.
//! - Observation values may be given as strings or numbers; they are stored as text. A number is
//!   stored in its shortest decimal form, not its source spelling (`183.10` becomes `"183.1"`,
//!   `1e3` becomes `"1000"`). Quote the value to keep trailing zeros or other formatting.

use crate::record::{
    ClinicalEntity, ClinicalRecord, Demographics, EntityDetail, Goal, IsoDate, Period, VitalStatus,
};
use crate::registry::{EntityId, EntityKind};
use crate::{EmbrError, EmbrResult};
use serde::{Deserialize, Serialize};

// ============================================================================
// Public operations
// ============================================================================

/// Parse a structured record from JSON text.
///
/// # Errors
///
/// Returns [`EmbrError::Translation`] naming the failing path (e.g. `entities[2].id`) if the
/// JSON does not match the wire schema, contains unknown keys, or carries fields that do not
/// belong to an entity's kind.
pub fn parse_json(json_text: &str) -> EmbrResult<ClinicalRecord> {
    let mut deserializer = serde_json::Deserializer::from_str(json_text);
    let wire: RecordWire = serde_path_to_error::deserialize(&mut deserializer)
        .map_err(|err| schema_mismatch(err.path().to_string(), err.into_inner()))?;
    deserializer
        .end()
        .map_err(|e| EmbrError::Translation(format!("trailing content after record: {e}")))?;
    wire_to_domain(wire)
}

/// Parse a structured record from YAML text.
///
/// # Errors
///
/// Same as [`parse_json`].
pub fn parse_yaml(yaml_text: &str) -> EmbrResult<ClinicalRecord> {
    let deserializer = serde_yaml::Deserializer::from_str(yaml_text);
    let wire: RecordWire = serde_path_to_error::deserialize(deserializer)
        .map_err(|err| schema_mismatch(err.path().to_string(), err.into_inner()))?;
    wire_to_domain(wire)
}

/// Render a record as pretty-printed JSON.
pub fn render_json(record: &ClinicalRecord) -> EmbrResult<String> {
    serde_json::to_string_pretty(&domain_to_wire(record))
        .map_err(|e| EmbrError::Translation(format!("failed to serialize record as JSON: {e}")))
}

/// Render a record as YAML.
pub fn render_yaml(record: &ClinicalRecord) -> EmbrResult<String> {
    serde_yaml::to_string(&domain_to_wire(record))
        .map_err(|e| EmbrError::Translation(format!("failed to serialize record as YAML: {e}")))
}

fn schema_mismatch(path: String, source: impl std::fmt::Display) -> EmbrError {
    let path = if path.is_empty() || path == "." {
        "<root>".to_string()
    } else {
        path
    };
    EmbrError::Translation(format!("record schema mismatch at {path}: {source}"))
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct RecordWire {
    #[serde(default)]
    demographics: DemographicsWire,
    #[serde(default)]
    entities: Vec<EntityWire>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct DemographicsWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    birth_date: Option<IsoDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    race: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ethnicity: Option<String>,
    #[serde(default)]
    vital_status: VitalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date_of_death: Option<IsoDate>,
}

/// Flat entity representation. Payload fields that do not apply to `kind` must be absent.
#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct EntityWire {
    kind: EntityKind,
    id: EntityId,
    description: String,
    #[serde(default)]
    status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    start: Option<IsoDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    end: Option<IsoDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dosage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    outcome: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<ScalarWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    goals: Option<Vec<GoalWire>>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct GoalWire {
    description: String,
    #[serde(default)]
    status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    due: Option<IsoDate>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
enum ScalarWire {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl ScalarWire {
    fn into_text(self) -> String {
        match self {
            ScalarWire::Text(text) => text,
            ScalarWire::Integer(n) => n.to_string(),
            ScalarWire::Float(f) => f.to_string(),
        }
    }
}

// ============================================================================
// Translation helpers (internal)
// ============================================================================

fn wire_to_domain(wire: RecordWire) -> EmbrResult<ClinicalRecord> {
    let d = wire.demographics;
    let demographics = Demographics {
        name: d.name,
        age: d.age,
        birth_date: d.birth_date,
        gender: d.gender,
        race: d.race,
        ethnicity: d.ethnicity,
        vital_status: d.vital_status,
        date_of_death: d.date_of_death,
    };

    let entities = wire
        .entities
        .into_iter()
        .enumerate()
        .map(|(index, entity)| entity_to_domain(index, entity))
        .collect::<EmbrResult<Vec<_>>>()?;

    Ok(ClinicalRecord {
        demographics,
        entities,
    })
}

fn entity_to_domain(index: usize, wire: EntityWire) -> EmbrResult<ClinicalEntity> {
    let kind = wire.kind;
    let unexpected = |field: &str| {
        EmbrError::Translation(format!(
            "entities[{index}] ({}): field '{field}' is not allowed for kind {kind}",
            wire.id
        ))
    };

    // Reject payload fields that belong to other kinds.
    let allowed: &[&str] = match kind {
        EntityKind::Condition | EntityKind::Medication => &[],
        EntityKind::MedicationRequest => &["dosage"],
        EntityKind::CarePlan => &["goals"],
        EntityKind::Procedure => &["outcome"],
        EntityKind::Encounter => &["reason"],
        EntityKind::Observation => &["value", "unit"],
    };
    let present = [
        ("dosage", wire.dosage.is_some()),
        ("outcome", wire.outcome.is_some()),
        ("reason", wire.reason.is_some()),
        ("value", wire.value.is_some()),
        ("unit", wire.unit.is_some()),
        ("goals", wire.goals.is_some()),
    ];
    if let Some((field, _)) = present
        .iter()
        .find(|(field, is_present)| *is_present && !allowed.contains(field))
    {
        return Err(unexpected(field));
    }

    let detail = match kind {
        EntityKind::Condition => EntityDetail::Condition,
        EntityKind::Medication => EntityDetail::Medication,
        EntityKind::MedicationRequest => EntityDetail::MedicationRequest {
            dosage: wire.dosage,
        },
        EntityKind::CarePlan => EntityDetail::CarePlan {
            goals: wire
                .goals
                .unwrap_or_default()
                .into_iter()
                .map(|goal| Goal {
                    description: goal.description,
                    status: goal.status,
                    due: goal.due,
                })
                .collect(),
        },
        EntityKind::Procedure => EntityDetail::Procedure {
            outcome: wire.outcome,
        },
        EntityKind::Encounter => EntityDetail::Encounter {
            reason: wire.reason,
        },
        EntityKind::Observation => EntityDetail::Observation {
            value: wire
                .value
                .map(ScalarWire::into_text)
                .ok_or_else(|| {
                    EmbrError::Translation(format!(
                        "entities[{index}] ({}): observation requires 'value'",
                        wire.id
                    ))
                })?,
            unit: wire.unit,
        },
    };

    Ok(ClinicalEntity {
        id: wire.id,
        description: wire.description,
        status: wire.status,
        period: Period {
            start: wire.start,
            end: wire.end,
        },
        detail,
    })
}

fn domain_to_wire(record: &ClinicalRecord) -> RecordWire {
    let d = &record.demographics;
    RecordWire {
        demographics: DemographicsWire {
            name: d.name.clone(),
            age: d.age,
            birth_date: d.birth_date.clone(),
            gender: d.gender.clone(),
            race: d.race.clone(),
            ethnicity: d.ethnicity.clone(),
            vital_status: d.vital_status,
            date_of_death: d.date_of_death.clone(),
        },
        entities: record.entities.iter().map(entity_to_wire).collect(),
    }
}

fn entity_to_wire(entity: &ClinicalEntity) -> EntityWire {
    let mut wire = EntityWire {
        kind: entity.kind(),
        id: entity.id.clone(),
        description: entity.description.clone(),
        status: entity.status.clone(),
        start: entity.period.start.clone(),
        end: entity.period.end.clone(),
        dosage: None,
        outcome: None,
        reason: None,
        value: None,
        unit: None,
        goals: None,
    };

    match &entity.detail {
        EntityDetail::Condition | EntityDetail::Medication => {}
        EntityDetail::MedicationRequest { dosage } => wire.dosage = dosage.clone(),
        EntityDetail::CarePlan { goals } => {
            wire.goals = Some(
                goals
                    .iter()
                    .map(|goal| GoalWire {
                        description: goal.description.clone(),
                        status: goal.status.clone(),
                        due: goal.due.clone(),
                    })
                    .collect(),
            );
        }
        EntityDetail::Procedure { outcome } => wire.outcome = outcome.clone(),
        EntityDetail::Encounter { reason } => wire.reason = reason.clone(),
        EntityDetail::Observation { value, unit } => {
            wire.value = Some(ScalarWire::Text(value.clone()));
            wire.unit = unit.clone();
        }
    }

    wire
}
