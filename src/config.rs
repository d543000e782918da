use config::{Config, ConfigError, File};
use secrecy::Secret;
use serde_aux::field_attributes::deserialize_number_from_string;
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::SubscriberEmail;
use crate::email_client::Sender;
use crate::scheduler::{DigestSchedule, ScheduleError};

#[derive(Debug)]
pub enum Environment {
    Development,
    Production,
}

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub email_client: EmailClientSettings,
    pub subscribers: SubscribersSettings,
    pub recall_source: RecallSourceSettings,
    pub digest: DigestSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    pub base_url: String,
}

#[derive(serde::Deserialize, Clone)]
pub struct EmailClientSettings {
    pub base_url: String,
    pub sender_email: String,
    pub sender_name: Option<String>,
    pub admin_email: Option<String>,
    pub api_key: Secret<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_milliseconds: u64,
}

#[derive(serde::Deserialize, Clone)]
pub struct SubscribersSettings {
    pub file_path: PathBuf,
}

#[derive(serde::Deserialize, Clone)]
pub struct RecallSourceSettings {
    pub base_url: String,
    pub dataset: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_milliseconds: u64,
}

#[derive(serde::Deserialize, Clone)]
pub struct DigestSettings {
    pub schedule: String,
    pub timezone: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub record_limit: usize,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_concurrent_deliveries: usize,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub send_timeout_milliseconds: u64,
    pub ledger_path: Option<PathBuf>,
}

impl Settings {
    pub fn get_address(&self) -> String {
        format!(
            "{}:{}",
            self.application.get_host(),
            self.application.get_port()
        )
    }

    pub fn get_app_base_url(&self) -> String {
        self.application.get_base_url()
    }

    pub fn set_app_port(&mut self, port: u16) {
        self.application.port = port;
    }

    pub fn set_email_client_base_url(&mut self, new_base_url: String) {
        self.email_client.set_base_url(new_base_url)
    }

    pub fn set_recall_source_base_url(&mut self, new_base_url: String) {
        self.recall_source.base_url = new_base_url
    }

    pub fn set_subscribers_file_path(&mut self, file_path: PathBuf) {
        self.subscribers.file_path = file_path
    }

    pub fn set_digest_ledger_path(&mut self, ledger_path: Option<PathBuf>) {
        self.digest.ledger_path = ledger_path
    }
}

impl ApplicationSettings {
    pub fn get_port(&self) -> u16 {
        self.port
    }

    pub fn get_host(&self) -> String {
        self.host.clone()
    }

    pub fn get_base_url(&self) -> String {
        self.base_url.clone()
    }
}

impl EmailClientSettings {
    pub fn get_sender(&self) -> Result<Sender, String> {
        Ok(Sender {
            email: SubscriberEmail::parse(self.sender_email.clone())?,
            name: self.sender_name.clone(),
        })
    }

    /// Where new-subscriber notifications go, if anywhere.
    pub fn get_admin_email(&self) -> Result<Option<SubscriberEmail>, String> {
        self.admin_email
            .clone()
            .filter(|email| !email.trim().is_empty())
            .map(SubscriberEmail::parse)
            .transpose()
    }

    pub fn get_base_url(&self) -> String {
        self.base_url.clone()
    }

    pub fn get_api_key(&self) -> Secret<String> {
        self.api_key.clone()
    }

    pub fn get_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_milliseconds)
    }

    pub fn set_base_url(&mut self, new_base_url: String) {
        self.base_url = new_base_url
    }
}

impl RecallSourceSettings {
    pub fn get_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_milliseconds)
    }
}

impl DigestSettings {
    pub fn get_schedule(&self) -> Result<DigestSchedule, ScheduleError> {
        DigestSchedule::parse(&self.schedule, &self.timezone)
    }

    pub fn get_send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_milliseconds)
    }
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "development" => Ok(Self::Development),
            "production" => Ok(Self::Production),
            unknown_env => Err(format!(
                "{} is not supported environment. Use either 'development' or 'production'.",
                unknown_env
            )),
        }
    }
}

pub fn get_configuration() -> Result<Settings, ConfigError> {
    let root_path = std::env::current_dir().map_err(|e| ConfigError::Foreign(Box::new(e)))?;
    let config_directory = root_path.join("config");
    // Uses development environment by default
    let enviroment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "development".into())
        .try_into()
        .map_err(ConfigError::Message)?;
    let config_base_filepath = config_directory.join("base");
    let config_env_filepath = config_directory.join(enviroment.as_str());

    // It merges the base configuration file with the one from the specific environment (development or production)
    let settings = Config::builder()
        .add_source(File::from(config_base_filepath).required(true))
        .add_source(File::from(config_env_filepath).required(true))
        // Merge settings from environment variables with a prefix of APP and "__" separator
        // E.g APP_APPLICATION__PORT would set Settings.application.port
        .add_source(config::Environment::with_prefix("app").separator("__"))
        .build()?;

    tracing::info!("Application environment = {:?}", enviroment);

    // Try to convert the value from the configuration file into a Settings type
    settings.try_deserialize()
}
