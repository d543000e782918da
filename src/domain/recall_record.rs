use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use reqwest::Url;
use serde::Deserialize;

pub const UNKNOWN_PRODUCT: &str = "Produit inconnu";

/// A recall notice as returned by the dataset API. Every field is optional and
/// empty strings are as good as missing.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawRecallRecord {
    pub noms_des_modeles_ou_references: Option<String>,
    pub libelle_produit: Option<String>,
    pub libelle: Option<String>,
    pub nom_de_la_marque_du_produit: Option<String>,
    pub categorie_de_produit: Option<String>,
    pub date_publication: Option<String>,
    pub lien_vers_la_liste_des_produits: Option<String>,
}

/// When a notice was published. The dataset mostly gives UTC instants, but
/// a bare calendar date is kept as-is rather than pinned to a timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicationDate {
    Instant(DateTime<Utc>),
    Day(NaiveDate),
}

impl PublicationDate {
    /// Calendar date as seen from `timezone`.
    pub fn local_date(&self, timezone: Tz) -> NaiveDate {
        match self {
            PublicationDate::Instant(instant) => instant.with_timezone(&timezone).date_naive(),
            PublicationDate::Day(day) => *day,
        }
    }
}

/// One recall entry, normalised for a single digest run.
#[derive(Debug, Clone, PartialEq)]
pub struct RecallRecord {
    pub name: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub published: Option<PublicationDate>,
    pub link: Option<Url>,
}

impl RecallRecord {
    /// Official listing, or `home` when the source gave no usable link.
    pub fn link_or<'a>(&'a self, home: &'a str) -> &'a str {
        self.link.as_ref().map(Url::as_str).unwrap_or(home)
    }
}

impl From<RawRecallRecord> for RecallRecord {
    fn from(raw: RawRecallRecord) -> Self {
        let name = non_empty(raw.noms_des_modeles_ou_references)
            .or_else(|| non_empty(raw.libelle_produit))
            .or_else(|| non_empty(raw.libelle))
            .unwrap_or_else(|| UNKNOWN_PRODUCT.to_string());

        RecallRecord {
            name,
            brand: non_empty(raw.nom_de_la_marque_du_produit),
            category: non_empty(raw.categorie_de_produit),
            published: non_empty(raw.date_publication).and_then(|date| parse_date(&date)),
            link: non_empty(raw.lien_vers_la_liste_des_produits).and_then(|link| parse_link(&link)),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// Timestamps without an offset are the dataset's UTC.
fn parse_date(value: &str) -> Option<PublicationDate> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        return Some(PublicationDate::Instant(datetime.with_timezone(&Utc)));
    }

    if let Ok(datetime) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(PublicationDate::Instant(datetime.and_utc()));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .map(PublicationDate::Day)
}

// Only absolute http(s) links make it into an email.
fn parse_link(value: &str) -> Option<Url> {
    Url::parse(value)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
}
