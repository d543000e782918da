use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use chrono::Utc;
use handlebars::RenderError;
use serde::Deserialize;

use crate::domain::SubscriberEmail;
use crate::email_client::{DeliveryError, MailTransport, OutgoingEmail};
use crate::routes::{error_chain_fmt, MessageResponse};
use crate::startup::MailSettings;
use crate::subscriber_store::{SubscriberStore, SubscriberStoreError};
use crate::templates::MailTemplates;

#[derive(Deserialize)]
pub struct NewSubscriptionBody {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(thiserror::Error)]
pub enum SubscribeError {
    #[error("Email invalide.")]
    ValidationError(String),
    #[error("Erreur inscription. Réessayez.")]
    StoreError(#[from] SubscriberStoreError),
    #[error("Erreur inscription. Réessayez.")]
    RenderError(#[from] RenderError),
    #[error("Erreur inscription. Réessayez.")]
    SendEmailError(#[from] DeliveryError),
}

impl std::fmt::Debug for SubscribeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for SubscribeError {
    fn status_code(&self) -> StatusCode {
        match self {
            SubscribeError::ValidationError(_) => StatusCode::BAD_REQUEST,
            SubscribeError::StoreError(_)
            | SubscribeError::RenderError(_)
            | SubscribeError::SendEmailError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        tracing::error!(exception.details = ?self, exception.message = %self);

        HttpResponse::build(self.status_code()).json(MessageResponse {
            message: &self.to_string(),
        })
    }
}

#[tracing::instrument(
    name = "Creating a new subscriber handler",
    skip(body, store, transport, templates, mail),
    fields(subscriber_email = ?body.email)
)]
pub async fn handle_create_subscription(
    body: web::Json<NewSubscriptionBody>,
    store: web::Data<dyn SubscriberStore>,
    transport: web::Data<dyn MailTransport>,
    templates: web::Data<MailTemplates>,
    mail: web::Data<MailSettings>,
) -> Result<HttpResponse, SubscribeError> {
    let email = SubscriberEmail::parse(body.into_inner().email.unwrap_or_default())
        .map_err(SubscribeError::ValidationError)?;

    if !store.add(email.clone()).await? {
        tracing::info!("Subscriber was already registered");
    }

    send_welcome_email(transport.get_ref(), &templates, &mail, &email).await?;

    if let Some(admin_email) = &mail.admin_email {
        let total = store.count().await;
        send_admin_notification(transport.get_ref(), &mail, admin_email, &email, total).await?;
    }

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "Inscription réussie !",
    }))
}

#[tracing::instrument(
    name = "Send a welcome email to a new subscriber",
    skip(transport, templates, mail)
)]
async fn send_welcome_email(
    transport: &dyn MailTransport,
    templates: &MailTemplates,
    mail: &MailSettings,
    email: &SubscriberEmail,
) -> Result<(), SubscribeError> {
    let welcome = OutgoingEmail {
        from: mail.sender.clone(),
        to: email.clone(),
        subject: String::from("Bienvenue sur VigilConso ! 🛡️"),
        html_body: Some(templates.render_welcome()?),
        text_body: None,
    };

    transport.send(&welcome).await?;

    Ok(())
}

#[tracing::instrument(name = "Notify the administrator of a new subscriber", skip(transport, mail))]
async fn send_admin_notification(
    transport: &dyn MailTransport,
    mail: &MailSettings,
    admin_email: &SubscriberEmail,
    email: &SubscriberEmail,
    total: usize,
) -> Result<(), SubscribeError> {
    let subscribed_at = Utc::now()
        .with_timezone(&mail.timezone)
        .format("%d/%m/%Y %H:%M:%S");
    let notification = OutgoingEmail {
        from: mail.sender.clone(),
        to: admin_email.clone(),
        subject: format!("Nouvelle inscription newsletter : {}", email),
        html_body: None,
        text_body: Some(format!(
            "Nouvel abonné : {}\nDate : {}\nTotal abonnés : {}",
            email, subscribed_at, total
        )),
    };

    transport.send(&notification).await?;

    Ok(())
}
