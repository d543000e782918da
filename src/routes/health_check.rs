use actix_web::{web, HttpResponse, Responder};
use chrono::{DateTime, Utc};

use crate::scheduler::DigestSchedule;
use crate::subscriber_store::SubscriberStore;

#[derive(serde::Serialize)]
struct HealthReport {
    status: &'static str,
    subscribers: usize,
    next_digest: Option<DateTime<Utc>>,
}

/// Endpoint used by clients to know if the server is working
#[tracing::instrument(name = "Health Check handler", skip(store, schedule))]
pub async fn health_check(
    store: web::Data<dyn SubscriberStore>,
    schedule: web::Data<DigestSchedule>,
) -> impl Responder {
    HttpResponse::Ok().json(HealthReport {
        status: "ok",
        subscribers: store.count().await,
        next_digest: schedule.next_after(Utc::now()),
    })
}
