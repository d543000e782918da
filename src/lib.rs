pub mod config;
pub mod digest;
pub mod domain;
pub mod email_client;
pub mod recall_client;
pub mod routes;
pub mod run_ledger;
pub mod scheduler;
pub mod startup;
pub mod subscriber_store;
pub mod telemetry;
pub mod templates;
