use reqwest::Response;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vigilconso::{
    config::get_configuration,
    digest::DigestDispatcher,
    domain::SubscriberEmail,
    startup::Application,
    subscriber_store::{JsonFileSubscriberStore, SubscriberStore},
};

pub struct TestApp {
    pub address: String,
    pub email_server: MockServer,
    pub recall_server: MockServer,
    pub subscribers_path: PathBuf,
    pub dispatcher: Arc<DigestDispatcher>,
}

impl TestApp {
    pub async fn spawn_app() -> TestApp {
        Self::spawn_app_with_admin(None).await
    }

    pub async fn spawn_app_with_admin(admin_email: Option<&str>) -> TestApp {
        let mut config = get_configuration().expect("Missing configuration file.");
        let email_server = MockServer::start().await;
        let recall_server = MockServer::start().await;
        let subscribers_path =
            std::env::temp_dir().join(format!("subscribers_{}.json", Uuid::new_v4()));

        // We are using port 0 as way to define a different port per each test. Port 0 is a special case that operating systems
        // take into account: when port is 0, the OS will search for the first available port
        config.set_app_port(0);
        config.set_email_client_base_url(email_server.uri());
        config.set_recall_source_base_url(recall_server.uri());
        config.set_subscribers_file_path(subscribers_path.clone());
        config.set_digest_ledger_path(None);
        config.email_client.admin_email = admin_email.map(String::from);

        let application = Application::build(config.clone())
            .await
            .expect("Failed to build application.");

        let address = format!("http://127.0.0.1:{}", application.get_port());
        let dispatcher = application.dispatcher();

        tokio::spawn(application.run_until_stop());

        TestApp {
            address,
            email_server,
            recall_server,
            subscribers_path,
            dispatcher,
        }
    }

    pub fn subscriber_store(&self) -> JsonFileSubscriberStore {
        JsonFileSubscriberStore::new(self.subscribers_path.clone())
    }

    pub async fn seed_subscribers(&self, emails: &[&str]) {
        let subscribers: Vec<SubscriberEmail> = emails
            .iter()
            .map(|email| SubscriberEmail::parse(email.to_string()).unwrap())
            .collect();

        self.subscriber_store()
            .save(&subscribers)
            .await
            .expect("Failed to seed subscribers.");
    }

    pub async fn mock_mail_api(&self, status: u16) {
        Mock::given(path("/mail/send"))
            .and(method("POST"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.email_server)
            .await;
    }

    pub async fn post_subscription(&self, body: HashMap<&str, &str>) -> Response {
        reqwest::Client::new()
            .post(format!("{}/newsletter", self.address))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_send_email(&self, body: serde_json::Value) -> Response {
        reqwest::Client::new()
            .post(format!("{}/send-email", self.address))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn get_health(&self) -> Response {
        reqwest::Client::new()
            .get(format!("{}/health", self.address))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Bodies of every mail the transport received, in arrival order.
    pub async fn sent_emails(&self) -> Vec<serde_json::Value> {
        self.email_server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|request| serde_json::from_slice(&request.body).unwrap())
            .collect()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.subscribers_path);
    }
}
