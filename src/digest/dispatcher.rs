use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;
use futures::StreamExt;
use handlebars::RenderError;
use std::sync::Arc;
use std::time::Duration;

use crate::digest::renderer::{french_date, DigestRenderer, RenderedDigest};
use crate::domain::SubscriberEmail;
use crate::email_client::{DeliveryError, DeliveryId, MailTransport, OutgoingEmail, Sender};
use crate::recall_client::RecallSource;
use crate::scheduler::ScheduledJob;
use crate::subscriber_store::SubscriberStore;

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub sender: Sender,
    pub timezone: Tz,
    pub record_limit: usize,
    pub max_concurrent_deliveries: usize,
    pub send_timeout: Duration,
}

#[derive(thiserror::Error, Debug)]
pub enum DigestError {
    #[error("Failed to render the weekly digest.")]
    Render(#[from] RenderError),
}

#[derive(Debug)]
pub struct DeliveryOutcome {
    pub subscriber: SubscriberEmail,
    pub result: Result<DeliveryId, DeliveryError>,
}

/// What a single run did. Nothing of it outlives the run besides the log.
#[derive(Debug)]
pub enum DigestReport {
    NoSubscribers,
    NoRecords,
    Dispatched { deliveries: Vec<DeliveryOutcome> },
}

impl DigestReport {
    pub fn sent(&self) -> usize {
        match self {
            DigestReport::Dispatched { deliveries } => {
                deliveries.iter().filter(|d| d.result.is_ok()).count()
            }
            _ => 0,
        }
    }

    pub fn total(&self) -> usize {
        match self {
            DigestReport::Dispatched { deliveries } => deliveries.len(),
            _ => 0,
        }
    }
}

/// Runs one weekly digest: subscribers, records, render once, deliver to each.
pub struct DigestDispatcher {
    store: Arc<dyn SubscriberStore>,
    source: Arc<dyn RecallSource>,
    transport: Arc<dyn MailTransport>,
    renderer: DigestRenderer,
    settings: DispatchSettings,
}

impl DigestDispatcher {
    pub fn new(
        store: Arc<dyn SubscriberStore>,
        source: Arc<dyn RecallSource>,
        transport: Arc<dyn MailTransport>,
        renderer: DigestRenderer,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            store,
            source,
            transport,
            renderer,
            settings,
        }
    }

    pub async fn run_digest(&self) -> Result<DigestReport, DigestError> {
        self.run_digest_at(Utc::now()).await
    }

    #[tracing::instrument(name = "Run the weekly digest", skip(self))]
    pub async fn run_digest_at(&self, now: DateTime<Utc>) -> Result<DigestReport, DigestError> {
        let subscribers = self.store.load().await;

        if subscribers.is_empty() {
            tracing::info!("Digest: no subscribers, nothing to send");
            return Ok(DigestReport::NoSubscribers);
        }

        let today = now.with_timezone(&self.settings.timezone).date_naive();
        let year_start = today.with_ordinal(1).unwrap_or(today);

        let records = match self
            .source
            .fetch_recent(self.settings.record_limit, year_start)
            .await
        {
            Ok(records) if !records.is_empty() => records,
            Ok(_) => {
                tracing::info!("Digest: no recent recall found, nothing to send");
                return Ok(DigestReport::NoRecords);
            }
            Err(err) => {
                tracing::warn!(
                    error.cause_chain = ?err,
                    error.message = %err,
                    "Digest: recall source unavailable, skipping this cycle"
                );
                return Ok(DigestReport::NoRecords);
            }
        };

        let digest = self.renderer.render(&records, &french_date(today))?;
        let total = subscribers.len();

        let pending: Vec<_> = subscribers
            .into_iter()
            .map(|subscriber| self.deliver(subscriber, &digest))
            .collect();
        let deliveries: Vec<DeliveryOutcome> = futures::stream::iter(pending)
            .buffered(self.settings.max_concurrent_deliveries.max(1))
            .collect()
            .await;

        let report = DigestReport::Dispatched { deliveries };
        tracing::info!(
            sent = report.sent(),
            total,
            "Weekly digest delivered to {}/{} subscriber(s)",
            report.sent(),
            total
        );

        Ok(report)
    }

    async fn deliver(&self, subscriber: SubscriberEmail, digest: &RenderedDigest) -> DeliveryOutcome {
        let email = OutgoingEmail {
            from: self.settings.sender.clone(),
            to: subscriber.clone(),
            subject: digest.subject.clone(),
            html_body: Some(digest.html_body.clone()),
            text_body: None,
        };

        let timeout = self.settings.send_timeout;
        let result = match tokio::time::timeout(timeout, self.transport.send(&email)).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout(timeout)),
        };

        if let Err(err) = &result {
            tracing::error!(
                subscriber_email = %subscriber,
                error.cause_chain = ?err,
                error.message = %err,
                "Failed to deliver the weekly digest"
            );
        }

        DeliveryOutcome { subscriber, result }
    }
}

#[async_trait]
impl ScheduledJob for DigestDispatcher {
    fn name(&self) -> &'static str {
        "weekly-digest"
    }

    async fn run(&self) -> Result<(), anyhow::Error> {
        self.run_digest().await?;

        Ok(())
    }
}
