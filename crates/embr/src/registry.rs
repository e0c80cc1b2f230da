//! Entity kind registry.
//!
//! The mapping between entity kinds, their two-letter ID prefixes and the EMBR section names is
//! fixed. It lives in a `const` table and is never mutated, so lookups are safe from any thread.
//!
//! Entity IDs have the shape `<PREFIX>-<DIGITS>`, for example `CN-9` or `PR-1000`. The digits are
//! kept verbatim: `CN-009` stays `CN-009` and is a different ID from `CN-9`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of digits accepted in the numeric part of an ID.
pub const MAX_ID_DIGITS: usize = 20;

/// Clinical entity kinds, in canonical section order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Condition,
    Medication,
    MedicationRequest,
    CarePlan,
    Procedure,
    Encounter,
    Observation,
}

struct KindEntry {
    kind: EntityKind,
    prefix: &'static str,
    section: &'static str,
}

const REGISTRY: [KindEntry; 7] = [
    KindEntry {
        kind: EntityKind::Condition,
        prefix: "CN",
        section: "Conditions",
    },
    KindEntry {
        kind: EntityKind::Medication,
        prefix: "MD",
        section: "Medications",
    },
    KindEntry {
        kind: EntityKind::MedicationRequest,
        prefix: "MR",
        section: "MedicationRequests",
    },
    KindEntry {
        kind: EntityKind::CarePlan,
        prefix: "CP",
        section: "CarePlans",
    },
    KindEntry {
        kind: EntityKind::Procedure,
        prefix: "PR",
        section: "Procedures",
    },
    KindEntry {
        kind: EntityKind::Encounter,
        prefix: "EN",
        section: "Encounters",
    },
    KindEntry {
        kind: EntityKind::Observation,
        prefix: "OB",
        section: "Observations",
    },
];

impl EntityKind {
    /// All kinds in the order their sections are written.
    pub const ALL: [EntityKind; 7] = [
        EntityKind::Condition,
        EntityKind::Medication,
        EntityKind::MedicationRequest,
        EntityKind::CarePlan,
        EntityKind::Procedure,
        EntityKind::Encounter,
        EntityKind::Observation,
    ];

    fn entry(self) -> &'static KindEntry {
        // REGISTRY is declared in the same order as the enum.
        &REGISTRY[self as usize]
    }

    /// Two-letter ID prefix, e.g. `CN` for conditions.
    pub fn prefix(self) -> &'static str {
        self.entry().prefix
    }

    /// Section name used in EMBR text, e.g. `Conditions`.
    pub fn section_name(self) -> &'static str {
        self.entry().section
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Condition => "Condition",
            EntityKind::Medication => "Medication",
            EntityKind::MedicationRequest => "MedicationRequest",
            EntityKind::CarePlan => "CarePlan",
            EntityKind::Procedure => "Procedure",
            EntityKind::Encounter => "Encounter",
            EntityKind::Observation => "Observation",
        };
        f.write_str(name)
    }
}

/// Look up the entity kind for a two-letter prefix.
pub fn kind_for_prefix(prefix: &str) -> Option<EntityKind> {
    REGISTRY
        .iter()
        .find(|entry| entry.prefix == prefix)
        .map(|entry| entry.kind)
}

/// Look up the entity kind for an EMBR section name.
pub fn kind_for_section(name: &str) -> Option<EntityKind> {
    REGISTRY
        .iter()
        .find(|entry| entry.section == name)
        .map(|entry| entry.kind)
}

/// Returns `true` if `id` is a well-formed ID whose prefix maps to `expected`.
pub fn is_valid_id(id: &str, expected: EntityKind) -> bool {
    EntityId::parse(id).is_ok_and(|parsed| parsed.kind() == expected)
}

/// Errors produced when parsing an [`EntityId`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The text is not `<two uppercase letters>-<digits>`.
    #[error("malformed entity id '{0}' (expected e.g. CN-9)")]
    Malformed(String),

    /// The shape is right but the prefix is not registered.
    #[error("unknown id prefix in '{0}'")]
    UnknownPrefix(String),
}

/// A validated entity identifier.
///
/// The original text is kept so that numbering is never altered on re-encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityId {
    raw: String,
    kind: EntityKind,
}

impl EntityId {
    /// Parses an ID such as `EN-312`.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::Malformed`] if the text does not have the `XX-123` shape, and
    /// [`IdError::UnknownPrefix`] if the prefix is not one of the seven registered ones.
    pub fn parse(input: &str) -> Result<Self, IdError> {
        let malformed = || IdError::Malformed(input.to_string());

        let (prefix, digits) = input.split_once('-').ok_or_else(malformed)?;
        let prefix_ok = prefix.len() == 2 && prefix.bytes().all(|b| b.is_ascii_uppercase());
        let digits_ok = !digits.is_empty()
            && digits.len() <= MAX_ID_DIGITS
            && digits.bytes().all(|b| b.is_ascii_digit());
        if !prefix_ok || !digits_ok {
            return Err(malformed());
        }

        let kind =
            kind_for_prefix(prefix).ok_or_else(|| IdError::UnknownPrefix(input.to_string()))?;

        Ok(Self {
            raw: input.to_string(),
            kind,
        })
    }

    /// Kind implied by the prefix.
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Two-letter prefix.
    pub fn prefix(&self) -> &str {
        &self.raw[..2]
    }

    /// Numeric part, exactly as written.
    pub fn number(&self) -> &str {
        &self.raw[3..]
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

impl Serialize for EntityId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        EntityId::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_round_trips_through_prefix_and_section() {
        for kind in EntityKind::ALL {
            assert_eq!(kind_for_prefix(kind.prefix()), Some(kind));
            assert_eq!(kind_for_section(kind.section_name()), Some(kind));
        }
    }

    #[test]
    fn prefixes_match_fixed_table() {
        assert_eq!(EntityKind::Condition.prefix(), "CN");
        assert_eq!(EntityKind::Encounter.prefix(), "EN");
        assert_eq!(EntityKind::Medication.prefix(), "MD");
        assert_eq!(EntityKind::MedicationRequest.prefix(), "MR");
        assert_eq!(EntityKind::CarePlan.prefix(), "CP");
        assert_eq!(EntityKind::Procedure.prefix(), "PR");
        assert_eq!(EntityKind::Observation.prefix(), "OB");
    }

    #[test]
    fn unknown_prefix_and_section_resolve_to_none() {
        assert_eq!(kind_for_prefix("XX"), None);
        assert_eq!(kind_for_prefix("cn"), None);
        assert_eq!(kind_for_section("Allergies"), None);
    }

    #[test]
    fn parses_ids_and_keeps_digits_verbatim() {
        let id = EntityId::parse("EN-312").expect("valid id");
        assert_eq!(id.kind(), EntityKind::Encounter);
        assert_eq!(id.prefix(), "EN");
        assert_eq!(id.number(), "312");

        let padded = EntityId::parse("CN-009").expect("valid id");
        assert_eq!(padded.to_string(), "CN-009");
        assert_ne!(padded, EntityId::parse("CN-9").expect("valid id"));
    }

    #[test]
    fn rejects_malformed_ids() {
        for bad in ["", "CN", "CN-", "CN9", "C-9", "CNX-9", "cn-9", "CN-9a", "CN--9", " CN-9"] {
            assert!(
                matches!(EntityId::parse(bad), Err(IdError::Malformed(_))),
                "{bad:?} should be malformed"
            );
        }
        let long = format!("CN-{}", "1".repeat(MAX_ID_DIGITS + 1));
        assert!(matches!(EntityId::parse(&long), Err(IdError::Malformed(_))));
    }

    #[test]
    fn rejects_unknown_prefix() {
        assert_eq!(
            EntityId::parse("ZZ-1"),
            Err(IdError::UnknownPrefix("ZZ-1".into()))
        );
    }

    #[test]
    fn is_valid_id_checks_expected_kind() {
        assert!(is_valid_id("CN-9", EntityKind::Condition));
        assert!(!is_valid_id("CN-9", EntityKind::Encounter));
        assert!(!is_valid_id("nonsense", EntityKind::Condition));
    }

    #[test]
    fn serde_uses_plain_string() {
        let id = EntityId::parse("MR-49").expect("valid id");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"MR-49\"");
        let back: EntityId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, id);
        assert!(serde_json::from_str::<EntityId>("\"QQ-1\"").is_err());
    }
}
