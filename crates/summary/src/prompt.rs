//! Prompt template.

use crate::{SummaryError, SummaryResult};

/// Placeholder replaced by the encoded patient record.
pub const PATIENT_DATA_PLACEHOLDER: &str = "{patient_data}";

const DEFAULT_SYSTEM: &str =
    "You are a healthcare professional skilled at analyzing and summarizing patient records.";

const DEFAULT_USER: &str = "\
You are analyzing patient data in EMBR format, a compact summary of FHIR data. Each section lists \
one entity per line as ID|description|status|date, where a date may be a range written start~end. \
Care plan goals follow their care plan on lines starting with '>'.

Provide a summary with:
Patient demographics (age, gender, race, ethnicity, if deceased write \"deceased\" and date of death)
Conditions
Medications and MedicationRequests
Care plan and goals
Key procedures
Important Encounters and Observations
Only use the data provided, without adding, recommending, or inferring beyond it.

Reference any data with the dates and ID (e.g. EN-129 for Encounter 129).

Patient Data:
{patient_data}
";

/// System message and user template for a summary request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    system: String,
    user: String,
}

impl PromptTemplate {
    /// # Errors
    ///
    /// Returns [`SummaryError::Config`] if the user template has no `{patient_data}` slot.
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> SummaryResult<Self> {
        let user = user.into();
        if !user.contains(PATIENT_DATA_PLACEHOLDER) {
            return Err(SummaryError::Config(format!(
                "prompt template must contain {PATIENT_DATA_PLACEHOLDER}"
            )));
        }
        Ok(Self {
            system: system.into(),
            user,
        })
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    /// User message with the patient data substituted.
    pub fn render(&self, patient_data: &str) -> String {
        self.user.replace(PATIENT_DATA_PLACEHOLDER, patient_data)
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            system: DEFAULT_SYSTEM.to_string(),
            user: DEFAULT_USER.to_string(),
        }
    }
}
