use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use std::time;

use crate::domain::{RawRecallRecord, RecallRecord};

const REQUEST_TIMEOUT: time::Duration = time::Duration::from_secs(15);

/// Every way the dataset can fail to give us something to send.
#[derive(thiserror::Error, Debug)]
pub enum RecallSourceError {
    #[error("Failed to reach the recall dataset.")]
    Request(#[source] reqwest::Error),
    #[error("The recall dataset answered with an unexpected payload.")]
    Decode(#[source] reqwest::Error),
    #[error("The recall dataset has no record published since {0}.")]
    Empty(NaiveDate),
}

#[async_trait]
pub trait RecallSource: Send + Sync {
    /// The `limit` most recent records published on or after `since`, newest first.
    async fn fetch_recent(
        &self,
        limit: usize,
        since: NaiveDate,
    ) -> Result<Vec<RecallRecord>, RecallSourceError>;
}

#[derive(serde::Deserialize)]
struct RecordsResponse {
    #[serde(default)]
    results: Vec<RawRecallRecord>,
}

/// Client for the public product-recall catalog (Opendatasoft explore API).
pub struct RecallSourceClient {
    http_client: Client,
    base_url: String,
    dataset: String,
}

impl RecallSourceClient {
    pub fn new(
        base_url: String,
        dataset: String,
        timeout: Option<time::Duration>,
    ) -> Result<RecallSourceClient, reqwest::Error> {
        let http_client = Client::builder()
            .timeout(timeout.unwrap_or(REQUEST_TIMEOUT))
            .build()?;

        Ok(RecallSourceClient {
            http_client,
            base_url,
            dataset,
        })
    }

    fn records_url(&self) -> String {
        format!(
            "{}/api/explore/v2.1/catalog/datasets/{}/records",
            self.base_url, self.dataset
        )
    }
}

#[async_trait]
impl RecallSource for RecallSourceClient {
    #[tracing::instrument(
        name = "Fetch recent recall records",
        skip(self),
        fields(dataset = %self.dataset)
    )]
    async fn fetch_recent(
        &self,
        limit: usize,
        since: NaiveDate,
    ) -> Result<Vec<RecallRecord>, RecallSourceError> {
        let date_filter = format!("date_publication>=\"{}\"", since.format("%Y-%m-%d"));

        let response: RecordsResponse = self
            .http_client
            .get(self.records_url())
            .query(&[
                ("limit", limit.to_string()),
                ("where", date_filter),
                ("order_by", String::from("date_publication DESC")),
            ])
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(RecallSourceError::Request)?
            .json()
            .await
            .map_err(RecallSourceError::Decode)?;

        if response.results.is_empty() {
            return Err(RecallSourceError::Empty(since));
        }

        tracing::info!(count = response.results.len(), "Fetched recall records");

        Ok(response
            .results
            .into_iter()
            .take(limit)
            .map(RecallRecord::from)
            .collect())
    }
}
