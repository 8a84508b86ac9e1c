use serde::Serialize;

use crate::domain::repository::MailSender;
use crate::domain::types::Mail;
use crate::error::LmsError;

/// Transactional mail API taking a JSON message.
#[derive(Clone)]
pub struct HttpMailSender {
    pub client: reqwest::Client,
    pub api_url: String,
    pub api_key: String,
    pub from: String,
}

#[derive(Serialize)]
struct Message<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl MailSender for HttpMailSender {
    async fn send(&self, mail: &Mail) -> Result<(), LmsError> {
        let message = Message {
            from: &self.from,
            to: &mail.to,
            subject: &mail.subject,
            text: &mail.body,
        };
        self.client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&message)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| {
                tracing::warn!(error = %e, subject = %mail.subject, "mail delivery failed");
                LmsError::ExternalService("mail")
            })?;
        Ok(())
    }
}
