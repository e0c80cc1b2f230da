//! EMBR decoder.
//!
//! Single pass over the lines of a document. Each line is one of:
//! - blank (ignored)
//! - a section header, `[Name]`
//! - the demographics line, `key=value|key=value...`
//! - an entity line, `ID|description|status|period[|payload...]`
//! - a goal line directly under a care plan, `>description|status[|due]`
//!
//! Decoding never guesses: any structural problem aborts with an error carrying the 1-based line
//! number and the current section.

use crate::escape::split_fields;
use crate::format::{
    field_bounds, parse_period, parse_section_header, DEMOGRAPHICS_SECTION, GOAL_MARKER,
    GOAL_MAX_FIELDS, GOAL_MIN_FIELDS, KEY_AGE, KEY_BORN, KEY_DIED, KEY_ETHNICITY, KEY_GENDER,
    KEY_NAME, KEY_RACE, KEY_STATUS, KEY_VALUE_SEPARATOR,
};
use crate::record::{
    ClinicalEntity, ClinicalRecord, Demographics, EntityDetail, Goal, IsoDate, VitalStatus,
};
use crate::registry::{kind_for_section, EntityId, EntityKind, IdError};
use crate::validation::{check_field_length, MAX_DOCUMENT_BYTES, MAX_ENTITIES};
use crate::{EmbrError, EmbrResult};
use std::collections::{HashMap, HashSet};

/// Decodes EMBR text into a record.
///
/// Entities are returned in file order. A leading byte-order mark and CRLF line endings are
/// tolerated.
///
/// # Errors
///
/// - [`EmbrError::Format`] for malformed headers, wrong field counts, bad IDs, dates or escapes,
///   goal lines outside a care plan, a missing demographics section, or oversized input.
/// - [`EmbrError::Reference`] when an ID prefix is unknown or belongs to another section.
/// - [`EmbrError::DuplicateId`] when two entities share an ID.
pub fn decode(input: &str) -> EmbrResult<ClinicalRecord> {
    if input.len() > MAX_DOCUMENT_BYTES {
        return Err(EmbrError::Format {
            line: 0,
            section: None,
            reason: format!(
                "document is {} bytes, exceeding the maximum of {MAX_DOCUMENT_BYTES}",
                input.len()
            ),
        });
    }

    let input = input.strip_prefix('\u{feff}').unwrap_or(input);

    let mut state = DecodeState::default();
    for (index, line) in input.lines().enumerate() {
        state.feed(index + 1, line)?;
    }
    let record = state.finish()?;

    tracing::debug!(entities = record.entities.len(), "decoded EMBR record");
    Ok(record)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Section {
    Demographics,
    Entities(EntityKind),
}

impl Section {
    fn name(self) -> &'static str {
        match self {
            Section::Demographics => DEMOGRAPHICS_SECTION,
            Section::Entities(kind) => kind.section_name(),
        }
    }
}

#[derive(Default)]
struct DecodeState {
    section: Option<Section>,
    seen_sections: HashSet<&'static str>,
    demographics: Option<Demographics>,
    entities: Vec<ClinicalEntity>,
    /// ID text → line it was first seen on.
    ids: HashMap<String, usize>,
    /// Set after a care plan line so that following goal lines can attach to it.
    care_plan_open: bool,
}

impl DecodeState {
    fn format_error(&self, line: usize, reason: impl Into<String>) -> EmbrError {
        EmbrError::Format {
            line,
            section: self.section.map(|s| s.name().to_string()),
            reason: reason.into(),
        }
    }

    fn fields(&self, line_no: usize, text: &str) -> EmbrResult<Vec<String>> {
        split_fields(text).map_err(|e| self.format_error(line_no, e.to_string()))
    }

    /// Length limit on a free-text value. IDs and dates are bounded by their own grammar.
    fn check_text(&self, line_no: usize, name: &str, value: &str) -> EmbrResult<()> {
        check_field_length(name, value).map_err(|reason| self.format_error(line_no, reason))
    }

    fn feed(&mut self, line_no: usize, line: &str) -> EmbrResult<()> {
        if line.trim().is_empty() {
            return Ok(());
        }

        if let Some(header) = parse_section_header(line.trim_end()) {
            return self.open_section(line_no, header);
        }

        let section = self.section;
        match section {
            None => Err(self.format_error(line_no, "content before the first section header")),
            Some(Section::Demographics) => self.demographics_line(line_no, line),
            Some(Section::Entities(kind)) => match line.strip_prefix(GOAL_MARKER) {
                Some(rest) => self.goal_line(line_no, rest),
                None => self.entity_line(line_no, kind, line),
            },
        }
    }

    fn open_section(&mut self, line_no: usize, header: Result<&str, &str>) -> EmbrResult<()> {
        let name = header
            .map_err(|raw| self.format_error(line_no, format!("malformed section header '{raw}'")))?;

        let section = if name == DEMOGRAPHICS_SECTION {
            Section::Demographics
        } else {
            let kind = kind_for_section(name).ok_or_else(|| {
                self.format_error(line_no, format!("unknown section '{name}'"))
            })?;
            Section::Entities(kind)
        };

        if !self.seen_sections.insert(section.name()) {
            return Err(EmbrError::Format {
                line: line_no,
                section: Some(section.name().to_string()),
                reason: format!("section [{}] appears more than once", section.name()),
            });
        }

        self.section = Some(section);
        self.care_plan_open = false;
        Ok(())
    }

    fn demographics_line(&mut self, line_no: usize, line: &str) -> EmbrResult<()> {
        if self.demographics.is_some() {
            return Err(self.format_error(line_no, "more than one demographics line"));
        }

        let mut demographics = Demographics::default();
        let mut status = None;
        let mut seen_keys = HashSet::new();

        for pair in self.fields(line_no, line)? {
            let (key, value) = pair.split_once(KEY_VALUE_SEPARATOR).ok_or_else(|| {
                self.format_error(line_no, format!("expected key=value, found '{pair}'"))
            })?;
            if value.trim().is_empty() {
                return Err(self.format_error(line_no, format!("empty value for '{key}'")));
            }
            if !seen_keys.insert(key.to_string()) {
                return Err(self.format_error(line_no, format!("repeated key '{key}'")));
            }

            let date = |value: &str| {
                IsoDate::parse(value).map_err(|e| self.format_error(line_no, e.to_string()))
            };

            let text = |name: &str| {
                self.check_text(line_no, name, value)
                    .map(|()| Some(value.to_string()))
            };

            match key {
                KEY_NAME => demographics.name = text(KEY_NAME)?,
                KEY_AGE => demographics.age = Some(self.age(line_no, value)?),
                KEY_BORN => demographics.birth_date = Some(date(value)?),
                KEY_GENDER => demographics.gender = text(KEY_GENDER)?,
                KEY_RACE => demographics.race = text(KEY_RACE)?,
                KEY_ETHNICITY => demographics.ethnicity = text(KEY_ETHNICITY)?,
                KEY_STATUS => {
                    status = Some(VitalStatus::parse(value).ok_or_else(|| {
                        self.format_error(line_no, format!("invalid vital status '{value}'"))
                    })?);
                }
                KEY_DIED => demographics.date_of_death = Some(date(value)?),
                other => {
                    return Err(
                        self.format_error(line_no, format!("unknown demographics key '{other}'"))
                    );
                }
            }
        }

        demographics.vital_status = status
            .ok_or_else(|| self.format_error(line_no, "missing 'status' in demographics"))?;
        if demographics.vital_status == VitalStatus::Alive && demographics.date_of_death.is_some() {
            return Err(self.format_error(line_no, "date of death given for a patient who is alive"));
        }

        self.demographics = Some(demographics);
        Ok(())
    }

    /// Ages are plain ASCII digits, so `+66` or ` 66` never decode to a value that re-encodes
    /// differently.
    fn age(&self, line_no: usize, value: &str) -> EmbrResult<u32> {
        let invalid = || self.format_error(line_no, format!("invalid age '{value}'"));
        if !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        value.parse::<u32>().map_err(|_| invalid())
    }

    fn entity_line(&mut self, line_no: usize, kind: EntityKind, line: &str) -> EmbrResult<()> {
        let fields = self.fields(line_no, line)?;

        let (min_fields, max_fields) = field_bounds(kind);
        if fields.len() < min_fields {
            return Err(self.format_error(
                line_no,
                format!("expected at least {min_fields} fields, found {}", fields.len()),
            ));
        }
        if fields.len() > max_fields {
            return Err(self.format_error(
                line_no,
                format!("expected at most {max_fields} fields, found {}", fields.len()),
            ));
        }

        let id = self.resolve_id(line_no, kind, &fields[0])?;

        let description = fields[1].clone();
        if description.trim().is_empty() {
            return Err(self.format_error(line_no, "empty description"));
        }
        self.check_text(line_no, "description", &description)?;
        let status = fields[2].clone();
        self.check_text(line_no, "status", &status)?;
        let period = parse_period(&fields[3]).map_err(|reason| self.format_error(line_no, reason))?;

        let optional = |index: usize, name: &str| -> EmbrResult<Option<String>> {
            match fields.get(index).map(String::as_str) {
                None | Some("") => Ok(None),
                Some(text) if text.trim().is_empty() => {
                    Err(self.format_error(line_no, format!("blank {name}")))
                }
                Some(text) => {
                    self.check_text(line_no, name, text)?;
                    Ok(Some(text.to_string()))
                }
            }
        };

        let detail = match kind {
            EntityKind::Condition => EntityDetail::Condition,
            EntityKind::Medication => EntityDetail::Medication,
            EntityKind::MedicationRequest => EntityDetail::MedicationRequest {
                dosage: optional(4, "dosage")?,
            },
            EntityKind::CarePlan => EntityDetail::CarePlan { goals: Vec::new() },
            EntityKind::Procedure => EntityDetail::Procedure {
                outcome: optional(4, "outcome")?,
            },
            EntityKind::Encounter => EntityDetail::Encounter {
                reason: optional(4, "reason")?,
            },
            EntityKind::Observation => EntityDetail::Observation {
                value: optional(4, "observation value")?
                    .ok_or_else(|| self.format_error(line_no, "missing observation value"))?,
                unit: optional(5, "unit")?,
            },
        };

        if self.entities.len() >= MAX_ENTITIES {
            return Err(self.format_error(
                line_no,
                format!("more than {MAX_ENTITIES} entities"),
            ));
        }

        self.ids.insert(id.to_string(), line_no);
        self.entities.push(ClinicalEntity {
            id,
            description,
            status,
            period,
            detail,
        });
        self.care_plan_open = kind == EntityKind::CarePlan;
        Ok(())
    }

    fn resolve_id(&self, line_no: usize, kind: EntityKind, text: &str) -> EmbrResult<EntityId> {
        let section = Some(kind.section_name().to_string());

        let id = EntityId::parse(text).map_err(|err| {
            let message = err.to_string();
            match err {
                IdError::Malformed(_) => self.format_error(line_no, message),
                IdError::UnknownPrefix(id) => EmbrError::Reference {
                    line: line_no,
                    section: section.clone(),
                    id,
                    reason: "unknown id prefix".into(),
                },
            }
        })?;

        if id.kind() != kind {
            return Err(EmbrError::Reference {
                line: line_no,
                section,
                id: id.to_string(),
                reason: format!(
                    "prefix {} belongs to {} and cannot appear in [{}]",
                    id.prefix(),
                    id.kind().section_name(),
                    kind.section_name()
                ),
            });
        }

        if let Some(first_line) = self.ids.get(id.as_str()) {
            return Err(EmbrError::DuplicateId {
                id: id.to_string(),
                line: line_no,
                first_line: *first_line,
                section,
            });
        }

        Ok(id)
    }

    fn goal_line(&mut self, line_no: usize, text: &str) -> EmbrResult<()> {
        if !self.care_plan_open {
            return Err(self.format_error(line_no, "goal line outside a care plan"));
        }

        let fields = self.fields(line_no, text)?;
        if fields.len() < GOAL_MIN_FIELDS || fields.len() > GOAL_MAX_FIELDS {
            return Err(self.format_error(
                line_no,
                format!(
                    "goal expects {GOAL_MIN_FIELDS} to {GOAL_MAX_FIELDS} fields, found {}",
                    fields.len()
                ),
            ));
        }

        let mut fields = fields.into_iter();
        let description = fields.next().unwrap_or_default();
        if description.trim().is_empty() {
            return Err(self.format_error(line_no, "empty goal description"));
        }
        self.check_text(line_no, "goal description", &description)?;
        let status = fields.next().unwrap_or_default();
        self.check_text(line_no, "goal status", &status)?;
        let due = match fields.next().as_deref() {
            None | Some("") => None,
            Some(date) => Some(
                IsoDate::parse(date).map_err(|e| self.format_error(line_no, e.to_string()))?,
            ),
        };

        let goal = Goal {
            description,
            status,
            due,
        };

        if let Some(EntityDetail::CarePlan { goals }) =
            self.entities.last_mut().map(|entity| &mut entity.detail)
        {
            goals.push(goal);
            return Ok(());
        }
        Err(self.format_error(line_no, "goal line outside a care plan"))
    }

    fn finish(self) -> EmbrResult<ClinicalRecord> {
        let demographics = match self.demographics {
            Some(demographics) => demographics,
            None => {
                let reason = if self.seen_sections.contains(DEMOGRAPHICS_SECTION) {
                    "[Demographics] section has no demographics line"
                } else {
                    "missing [Demographics] section"
                };
                return Err(EmbrError::Format {
                    line: 0,
                    section: None,
                    reason: reason.into(),
                });
            }
        };

        Ok(ClinicalRecord {
            demographics,
            entities: self.entities,
        })
    }
}
