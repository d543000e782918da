use chrono::{Locale, NaiveDate};
use chrono_tz::Tz;
use handlebars::RenderError;
use serde::Serialize;
use std::sync::Arc;

use crate::domain::RecallRecord;
use crate::templates::{MailTemplates, DIGEST_TEMPLATE};

/// Subject and HTML body shared by every recipient of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDigest {
    pub subject: String,
    pub html_body: String,
}

#[derive(Serialize)]
struct RecordCard<'a> {
    name: &'a str,
    brand: Option<&'a str>,
    category: Option<String>,
    published_on: Option<String>,
    link: &'a str,
}

/// `3 mars 2025`
pub fn french_date(date: NaiveDate) -> String {
    date.format_localized("%-d %B %Y", Locale::fr_FR).to_string()
}

/// Turns a batch of recall records into the weekly email. Pure: the same
/// records and label always give byte-identical output. Publication dates
/// are shown as calendar days in `timezone`.
pub struct DigestRenderer {
    templates: Arc<MailTemplates>,
    timezone: Tz,
}

impl DigestRenderer {
    pub fn new(templates: Arc<MailTemplates>, timezone: Tz) -> Self {
        Self {
            templates,
            timezone,
        }
    }

    pub fn subject(week_label: &str) -> String {
        format!("VigilConso — Résumé hebdomadaire du {}", week_label)
    }

    pub fn render(
        &self,
        records: &[RecallRecord],
        week_label: &str,
    ) -> Result<RenderedDigest, RenderError> {
        let app_url = self.templates.app_url();
        let cards: Vec<RecordCard> = records
            .iter()
            .map(|record| RecordCard {
                name: &record.name,
                brand: record.brand.as_deref(),
                category: record.category.as_ref().map(|c| c.to_uppercase()),
                published_on: record
                    .published
                    .map(|published| french_date(published.local_date(self.timezone))),
                link: record.link_or(app_url),
            })
            .collect();

        let html_body = self.templates.render(
            DIGEST_TEMPLATE,
            &format!("Résumé de la semaine — {}", week_label),
            serde_json::json!({
                "count": records.len(),
                "records": cards,
            }),
        )?;

        Ok(RenderedDigest {
            subject: Self::subject(week_label),
            html_body,
        })
    }
}
