//! Summary orchestration: record in, prompt out to the model, text back.

use crate::client::{ChatClient, ChatRequest};
use crate::config::SummaryConfig;
use crate::prompt::PromptTemplate;
use crate::{SummaryError, SummaryResult};
use embr::ClinicalRecord;

/// What to summarize: a structured record, or text that claims to be EMBR.
#[derive(Debug, Clone, Copy)]
pub enum SummaryInput<'a> {
    Record(&'a ClinicalRecord),
    Encoded(&'a str),
}

/// Produces clinical summaries through a [`ChatClient`].
pub struct Summarizer<C> {
    client: C,
    config: SummaryConfig,
    template: PromptTemplate,
}

impl<C: ChatClient> Summarizer<C> {
    pub fn new(client: C, config: SummaryConfig) -> Self {
        Self::with_template(client, config, PromptTemplate::default())
    }

    pub fn with_template(client: C, config: SummaryConfig, template: PromptTemplate) -> Self {
        Self {
            client,
            config,
            template,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Build the chat request for `input` without sending it.
    ///
    /// Records are encoded; encoded text is decoded once so malformed files fail here rather than
    /// at the model. The text sent is the caller's text, unchanged.
    pub fn prepare(&self, input: SummaryInput<'_>) -> SummaryResult<ChatRequest> {
        let patient_data = match input {
            SummaryInput::Record(record) => embr::encode(record)?,
            SummaryInput::Encoded(text) => {
                let record = embr::decode(text)?;
                tracing::debug!(entities = record.entities.len(), "validated encoded record");
                text.to_string()
            }
        };

        Ok(ChatRequest {
            model: self.config.model().to_string(),
            system: self.template.system().to_string(),
            user: self.template.render(&patient_data),
            temperature: self.config.temperature(),
            max_tokens: self.config.max_tokens(),
        })
    }

    /// Summarize a patient record.
    ///
    /// # Arguments
    ///
    /// * `input` - A structured record, or EMBR text read from a file.
    ///
    /// # Returns
    ///
    /// The model's reply with surrounding whitespace removed.
    ///
    /// # Errors
    ///
    /// - [`SummaryError::Codec`] if the record fails validation or the text does not decode.
    /// - Any transport or API error from the [`ChatClient`].
    /// - [`SummaryError::EmptyResponse`] if the reply is blank.
    pub fn summarize(&self, input: SummaryInput<'_>) -> SummaryResult<String> {
        let request = self.prepare(input)?;
        tracing::info!(
            model = %request.model,
            prompt_chars = request.user.chars().count(),
            "requesting summary"
        );

        let reply = self.client.complete(&request)?;
        let summary = reply.trim();
        if summary.is_empty() {
            tracing::warn!(model = %request.model, "model returned an empty reply");
            return Err(SummaryError::EmptyResponse);
        }
        Ok(summary.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockChatClient;
    use embr::{ClinicalEntity, EntityDetail, EntityId, IsoDate, Period};

    const ENCODED: &str =
        "[Demographics]\nstatus=alive\n[Encounters]\nEN-312|Emergency room admission|completed|2017-09-24\n";

    fn config() -> SummaryConfig {
        SummaryConfig::with_defaults("sk-test".into()).expect("config")
    }

    fn record() -> ClinicalRecord {
        ClinicalRecord::default().with_entity(ClinicalEntity::new(
            EntityId::parse("CN-9").expect("id"),
            "Loss of teeth",
            "confirmed",
            Period::on(IsoDate::parse("1980-05-14").expect("date")),
            EntityDetail::Condition,
        ))
    }

    #[test]
    fn record_is_encoded_into_prompt() {
        let summarizer = Summarizer::new(MockChatClient::new("  Patient has lost teeth (CN-9).\n"), config());

        let summary = summarizer
            .summarize(SummaryInput::Record(&record()))
            .expect("summary");
        assert_eq!(summary, "Patient has lost teeth (CN-9).");

        let requests = summarizer.client().requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "gpt-4o-mini");
        assert_eq!(requests[0].max_tokens, 5000);
        assert!(requests[0]
            .user
            .contains("[Conditions]\nCN-9|Loss of teeth|confirmed|1980-05-14\n"));
    }

    #[test]
    fn encoded_text_is_sent_verbatim() {
        let summarizer = Summarizer::new(MockChatClient::new("ok"), config());
        let request = summarizer
            .prepare(SummaryInput::Encoded(ENCODED))
            .expect("request");
        assert!(request.user.ends_with(&format!("Patient Data:\n{ENCODED}\n")));
    }

    #[test]
    fn malformed_encoded_text_never_reaches_the_client() {
        let summarizer = Summarizer::new(MockChatClient::new("ok"), config());
        let err = summarizer
            .summarize(SummaryInput::Encoded("[Conditions]\nCN-9|x|y|2020\n"))
            .expect_err("no demographics");
        assert!(matches!(err, SummaryError::Codec(_)));
        assert!(summarizer.client().requests().is_empty());
    }

    #[test]
    fn invalid_record_is_a_codec_error() {
        let bad = record().with_entity(record().entities[0].clone());
        let summarizer = Summarizer::new(MockChatClient::new("ok"), config());
        assert!(matches!(
            summarizer.summarize(SummaryInput::Record(&bad)),
            Err(SummaryError::Codec(embr::EmbrError::Validation { .. }))
        ));
    }

    #[test]
    fn blank_reply_is_an_error() {
        let summarizer = Summarizer::new(MockChatClient::new(" \n "), config());
        assert!(matches!(
            summarizer.summarize(SummaryInput::Encoded(ENCODED)),
            Err(SummaryError::EmptyResponse)
        ));
    }

    #[test]
    fn api_failures_pass_through() {
        let summarizer = Summarizer::new(MockChatClient::failing(401, "invalid api key"), config());
        assert!(matches!(
            summarizer.summarize(SummaryInput::Encoded(ENCODED)),
            Err(SummaryError::Api { status: 401, .. })
        ));
    }

    #[test]
    fn custom_template_is_used() {
        let template = PromptTemplate::new("Be brief.", "Record:\n{patient_data}").expect("template");
        let summarizer = Summarizer::with_template(MockChatClient::new("ok"), config(), template);
        let request = summarizer
            .prepare(SummaryInput::Encoded(ENCODED))
            .expect("request");
        assert_eq!(request.system, "Be brief.");
        assert_eq!(request.user, format!("Record:\n{ENCODED}"));
    }
}
