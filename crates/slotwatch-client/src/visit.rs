//! Visit preparation: obtain a visit token and answer the prerequisite
//! questionnaire with the user's stored details.

use async_trait::async_trait;

use slotwatch_core::{Answer, PrepareError, PreparedVisit, UserMetadata, VisitPreparer};

use crate::client::BookingClient;
use crate::error::ClientError;
use crate::types::{join_messages, AnswerRequest, PrepareVisitData, PrepareVisitEnvelope};

/// Platform question asking for the national identity number.
pub const ID_NUMBER_QUESTION_ID: i64 = 113;
/// Platform question asking for the contact phone number.
pub const PHONE_NUMBER_QUESTION_ID: i64 = 114;

/// Guards against a questionnaire that never ends.
const MAX_QUESTIONS: usize = 10;

impl BookingClient {
    /// Opens a new prepared visit for the configured organization.
    ///
    /// # Errors
    ///
    /// - [`ClientError::AuthExpired`] on 401/403.
    /// - [`ClientError::Api`] if the envelope reports failure or carries no data.
    /// - [`ClientError::Http`] / [`ClientError::UnexpectedStatus`] on transport failure.
    /// - [`ClientError::Deserialize`] if the response shape is unexpected.
    pub async fn prepare_visit(&self) -> Result<PrepareVisitData, ClientError> {
        let url = self.endpoint_url(&format!(
            "Organization/{}/PrepareVisit",
            self.organization_id
        ))?;
        let envelope: PrepareVisitEnvelope = self.post_json::<(), _>(url, None).await?;
        visit_data(envelope)
    }

    /// Answers one questionnaire item and returns the updated visit state.
    ///
    /// # Errors
    ///
    /// Same as [`BookingClient::prepare_visit`].
    pub async fn answer_question(
        &self,
        request: &AnswerRequest<'_>,
    ) -> Result<PrepareVisitData, ClientError> {
        let url = self.endpoint_url(&format!(
            "PreparedVisit/{}/Answer",
            request.prepared_visit_token
        ))?;
        let envelope: PrepareVisitEnvelope = self.post_json(url, Some(request)).await?;
        visit_data(envelope)
    }
}

fn visit_data(envelope: PrepareVisitEnvelope) -> Result<PrepareVisitData, ClientError> {
    if envelope.success == Some(false) {
        return Err(ClientError::Api(
            join_messages(&envelope.messages)
                .unwrap_or_else(|| "visit preparation failed".to_owned()),
        ));
    }
    envelope
        .data
        .ok_or_else(|| ClientError::Api("visit preparation returned no data".to_owned()))
}

/// Picks the stored answer for a platform question.
fn answer_for(question_id: i64, metadata: &UserMetadata) -> Option<&str> {
    match question_id {
        ID_NUMBER_QUESTION_ID => Some(metadata.id_number.as_str()),
        PHONE_NUMBER_QUESTION_ID => Some(metadata.phone_number.as_str()),
        _ => None,
    }
}

#[async_trait]
impl VisitPreparer for BookingClient {
    async fn prepare(&self, metadata: &UserMetadata) -> Result<PreparedVisit, PrepareError> {
        let mut state = self.prepare_visit().await?;
        let visit_id = state.prepared_visit_id;
        let visit_token = state.prepared_visit_token.clone();
        let mut answers = Vec::new();

        while let Some(item) = state.questionnaire_item.take() {
            if answers.len() >= MAX_QUESTIONS {
                return Err(PrepareError::TooManyQuestions { max: MAX_QUESTIONS });
            }

            let text = answer_for(item.question_id, metadata).ok_or(
                PrepareError::UnexpectedQuestion {
                    question_id: item.question_id,
                },
            )?;

            let request = AnswerRequest {
                prepared_visit_token: &visit_token,
                questionnaire_item_id: item.questionnaire_item_id,
                question_id: item.question_id,
                answer_ids: None,
                answer_text: text,
            };
            state = self.answer_question(&request).await?;
            tracing::debug!(question_id = item.question_id, "visit: question answered");

            answers.push(Answer {
                question_id: item.question_id,
                text: text.to_owned(),
            });
        }

        tracing::info!(visit_id, answered = answers.len(), "visit prepared");
        Ok(PreparedVisit {
            visit_id,
            visit_token,
            answers,
        })
    }
}
