//! Layout constants and small helpers shared by the encoder and decoder.

use crate::record::{DateError, IsoDate, Period};
use crate::registry::EntityKind;

pub(crate) const FIELD_SEPARATOR: char = '|';
pub(crate) const PERIOD_SEPARATOR: char = '~';
pub(crate) const GOAL_MARKER: char = '>';
pub(crate) const KEY_VALUE_SEPARATOR: char = '=';

pub(crate) const DEMOGRAPHICS_SECTION: &str = "Demographics";

/// `id|description|status|period`
pub(crate) const BASE_FIELDS: usize = 4;

/// `description|status[|due]`
pub(crate) const GOAL_MIN_FIELDS: usize = 2;
pub(crate) const GOAL_MAX_FIELDS: usize = 3;

pub(crate) const KEY_NAME: &str = "name";
pub(crate) const KEY_AGE: &str = "age";
pub(crate) const KEY_BORN: &str = "born";
pub(crate) const KEY_GENDER: &str = "gender";
pub(crate) const KEY_RACE: &str = "race";
pub(crate) const KEY_ETHNICITY: &str = "ethnicity";
pub(crate) const KEY_STATUS: &str = "status";
pub(crate) const KEY_DIED: &str = "died";

/// Minimum and maximum number of fields on an entity line of the given kind.
pub(crate) fn field_bounds(kind: EntityKind) -> (usize, usize) {
    let (required, optional) = match kind {
        EntityKind::Condition | EntityKind::Medication | EntityKind::CarePlan => (0, 0),
        EntityKind::MedicationRequest | EntityKind::Procedure | EntityKind::Encounter => (0, 1),
        EntityKind::Observation => (1, 1),
    };
    (BASE_FIELDS + required, BASE_FIELDS + required + optional)
}

pub(crate) fn section_header(name: &str) -> String {
    format!("[{name}]")
}

/// Returns the section name if `line` looks like a header. `Err` carries the raw line when it
/// starts like a header but is not closed.
pub(crate) fn parse_section_header(line: &str) -> Option<Result<&str, &str>> {
    let rest = line.strip_prefix('[')?;
    Some(rest.strip_suffix(']').ok_or(line))
}

pub(crate) fn render_period(period: &Period) -> String {
    match (&period.start, &period.end) {
        (Some(start), Some(end)) => format!("{start}{PERIOD_SEPARATOR}{end}"),
        (Some(start), None) => start.to_string(),
        (None, Some(end)) => format!("{PERIOD_SEPARATOR}{end}"),
        (None, None) => String::new(),
    }
}

/// Inverse of [`render_period`]. An empty field or a range without an end date is rejected.
pub(crate) fn parse_period(field: &str) -> Result<Period, String> {
    if field.is_empty() {
        return Err("missing date".into());
    }

    let date = |s: &str| IsoDate::parse(s).map_err(|DateError(bad)| format!("invalid date '{bad}'"));

    match field.split_once(PERIOD_SEPARATOR) {
        None => Ok(Period::on(date(field)?)),
        Some((_, "")) => Err(format!("date range '{field}' has no end date")),
        Some(("", end)) => Ok(Period::ended(date(end)?)),
        Some((start, end)) => Ok(Period::range(date(start)?, date(end)?)),
    }
}
