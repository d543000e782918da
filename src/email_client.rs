use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use std::time;

use crate::domain::SubscriberEmail;

const REQUEST_TIMEOUT: time::Duration = time::Duration::from_secs(10);
const MESSAGE_ID_HEADER: &str = "X-Message-Id";

#[derive(thiserror::Error, Debug)]
pub enum DeliveryError {
    #[error("The mail API rejected or failed the request.")]
    Transport(#[from] reqwest::Error),
    #[error("The mail API did not answer within {0:?}.")]
    Timeout(time::Duration),
    #[error("An email needs an html or a text part.")]
    EmptyContent,
}

/// Who the message comes from, e.g. `VigilConso <alertes@vigilconso.fr>`.
#[derive(Debug, Clone)]
pub struct Sender {
    pub email: SubscriberEmail,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub from: Sender,
    pub to: SubscriberEmail,
    pub subject: String,
    pub html_body: Option<String>,
    pub text_body: Option<String>,
}

/// Identifier the transport assigned to an accepted message, when it gives one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryId(pub Option<String>);

/// The only thing the rest of the service knows about sending mail.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<DeliveryId, DeliveryError>;
}

pub struct EmailClient {
    http_client: Client,
    base_url: String,
    api_key: Secret<String>,
}

#[derive(serde::Serialize)]
pub struct SendEmailBody {
    personalizations: Vec<SengridPersonalization>,
    from: SengridEmail,
    subject: String,
    content: Vec<SengridContent>,
}

#[derive(serde::Serialize)]
struct SengridEmail {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(serde::Serialize)]
struct SengridPersonalization {
    to: Vec<SengridEmail>,
}

#[derive(serde::Serialize)]
struct SengridContent {
    #[serde(rename = "type")]
    content_type: String,
    value: String,
}

impl EmailClient {
    pub fn new(
        base_url: String,
        api_key: Secret<String>,
        timeout: Option<time::Duration>,
    ) -> Result<EmailClient, reqwest::Error> {
        let http_client = Client::builder()
            .timeout(timeout.unwrap_or(REQUEST_TIMEOUT))
            .build()?;

        Ok(EmailClient {
            http_client,
            base_url,
            api_key,
        })
    }

    fn build_body(email: &OutgoingEmail) -> Result<SendEmailBody, DeliveryError> {
        // Plain text has to come first for the mail API.
        let content: Vec<SengridContent> = [
            ("text/plain", email.text_body.as_ref()),
            ("text/html", email.html_body.as_ref()),
        ]
        .into_iter()
        .filter_map(|(content_type, value)| {
            value.map(|value| SengridContent {
                content_type: String::from(content_type),
                value: value.clone(),
            })
        })
        .collect();

        if content.is_empty() {
            return Err(DeliveryError::EmptyContent);
        }

        Ok(SendEmailBody {
            from: SengridEmail {
                email: String::from(email.from.email.as_ref()),
                name: email.from.name.clone(),
            },
            personalizations: vec![SengridPersonalization {
                to: vec![SengridEmail {
                    email: String::from(email.to.as_ref()),
                    name: None,
                }],
            }],
            subject: email.subject.clone(),
            content,
        })
    }
}

#[async_trait]
impl MailTransport for EmailClient {
    #[tracing::instrument(
        name = "Send an email through the mail API",
        skip(self, email),
        fields(recipient = %email.to, subject = %email.subject)
    )]
    async fn send(&self, email: &OutgoingEmail) -> Result<DeliveryId, DeliveryError> {
        let url = format!("{}/mail/send", self.base_url);
        let body = Self::build_body(email)?;

        let response = self
            .http_client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&body)
            .send()
            .await?
            .error_for_status()?; // return an error when server response status code is 4xx or 5xx

        let message_id = response
            .headers()
            .get(MESSAGE_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(String::from);

        Ok(DeliveryId(message_id))
    }
}
