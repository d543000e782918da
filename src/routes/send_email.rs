use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use serde::Deserialize;

use crate::domain::SubscriberEmail;
use crate::email_client::{DeliveryError, MailTransport, OutgoingEmail, Sender};
use crate::routes::{error_chain_fmt, MessageResponse};
use crate::startup::MailSettings;

#[derive(Deserialize, Debug)]
pub struct SendEmailRequest {
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
}

#[derive(serde::Serialize)]
struct SentResponse {
    message: &'static str,
    id: Option<String>,
}

#[derive(thiserror::Error)]
pub enum SendEmailError {
    #[error("Champs requis manquants.")]
    ValidationError(String),
    #[error("Erreur envoi email")]
    DeliveryError(#[from] DeliveryError),
}

impl std::fmt::Debug for SendEmailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for SendEmailError {
    fn status_code(&self) -> StatusCode {
        match self {
            SendEmailError::ValidationError(_) => StatusCode::BAD_REQUEST,
            SendEmailError::DeliveryError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        tracing::error!(exception.details = ?self, exception.message = %self);

        HttpResponse::build(self.status_code()).json(MessageResponse {
            message: &self.to_string(),
        })
    }
}

impl SendEmailRequest {
    fn into_email(self, from: Sender) -> Result<OutgoingEmail, String> {
        let to = SubscriberEmail::parse(self.to.unwrap_or_default())?;
        let subject = self
            .subject
            .filter(|subject| !subject.trim().is_empty())
            .ok_or_else(|| String::from("subject is missing"))?;

        if self.text.is_none() && self.html.is_none() {
            return Err(String::from("either text or html content is required"));
        }

        Ok(OutgoingEmail {
            from,
            to,
            subject,
            html_body: self.html,
            text_body: self.text,
        })
    }
}

/// Relays an arbitrary message through the mail transport.
#[tracing::instrument(
    name = "Relaying an email handler",
    skip(body, transport, mail),
    fields(recipient = ?body.to, subject = ?body.subject)
)]
pub async fn handle_send_email(
    body: web::Json<SendEmailRequest>,
    transport: web::Data<dyn MailTransport>,
    mail: web::Data<MailSettings>,
) -> Result<HttpResponse, SendEmailError> {
    let email = body
        .into_inner()
        .into_email(mail.sender.clone())
        .map_err(SendEmailError::ValidationError)?;

    let delivery_id = transport.send(&email).await?;

    Ok(HttpResponse::Ok().json(SentResponse {
        message: "Email envoyé",
        id: delivery_id.0,
    }))
}
