use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use chrono_tz::Tz;
use std::net::TcpListener;
use std::sync::Arc;
use tracing_actix_web::TracingLogger;

use crate::config::Settings;
use crate::digest::{DigestDispatcher, DigestRenderer, DispatchSettings};
use crate::domain::SubscriberEmail;
use crate::email_client::{EmailClient, MailTransport, Sender};
use crate::recall_client::RecallSourceClient;
use crate::routes::{handle_create_subscription, handle_send_email, health_check};
use crate::run_ledger::RunLedger;
use crate::scheduler::{DigestSchedule, Scheduler};
use crate::subscriber_store::{JsonFileSubscriberStore, SubscriberStore};
use crate::templates::MailTemplates;

/// Mail identity shared by the HTTP handlers.
#[derive(Debug, Clone)]
pub struct MailSettings {
    pub sender: Sender,
    pub admin_email: Option<SubscriberEmail>,
    pub timezone: Tz,
}

pub struct Application {
    port: u16,
    server: Server,
    scheduler: Scheduler,
    dispatcher: Arc<DigestDispatcher>,
}

impl Application {
    pub async fn build(config: Settings) -> Result<Self, anyhow::Error> {
        let sender = config
            .email_client
            .get_sender()
            .map_err(anyhow::Error::msg)?;
        let admin_email = config
            .email_client
            .get_admin_email()
            .map_err(anyhow::Error::msg)?;
        let schedule = config.digest.get_schedule()?;

        let store: Arc<dyn SubscriberStore> = Arc::new(JsonFileSubscriberStore::new(
            config.subscribers.file_path.clone(),
        ));
        let email_client: Arc<dyn MailTransport> = Arc::new(EmailClient::new(
            config.email_client.get_base_url(),
            config.email_client.get_api_key(),
            Some(config.email_client.get_timeout()),
        )?);
        let recall_source = Arc::new(RecallSourceClient::new(
            config.recall_source.base_url.clone(),
            config.recall_source.dataset.clone(),
            Some(config.recall_source.get_timeout()),
        )?);
        let templates = Arc::new(MailTemplates::new(config.get_app_base_url())?);

        let dispatcher = Arc::new(DigestDispatcher::new(
            Arc::clone(&store),
            recall_source,
            Arc::clone(&email_client),
            DigestRenderer::new(Arc::clone(&templates), schedule.timezone()),
            DispatchSettings {
                sender: sender.clone(),
                timezone: schedule.timezone(),
                record_limit: config.digest.record_limit,
                max_concurrent_deliveries: config.digest.max_concurrent_deliveries,
                send_timeout: config.digest.get_send_timeout(),
            },
        ));
        let ledger = match &config.digest.ledger_path {
            Some(path) => RunLedger::new(path.clone()),
            None => RunLedger::disabled(),
        };
        let scheduler = Scheduler::new(schedule.clone(), dispatcher.clone(), ledger);

        let mail = MailSettings {
            sender,
            admin_email,
            timezone: schedule.timezone(),
        };

        let listener = TcpListener::bind(config.get_address())?;
        let port = listener.local_addr()?.port();
        let server = run(listener, store, email_client, templates, mail, schedule)?;

        Ok(Self {
            port,
            server,
            scheduler,
            dispatcher,
        })
    }

    pub fn get_port(&self) -> u16 {
        self.port
    }

    pub fn dispatcher(&self) -> Arc<DigestDispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// Serves HTTP and runs the digest scheduler until the server stops.
    pub async fn run_until_stop(self) -> Result<(), std::io::Error> {
        let scheduler = tokio::spawn(self.scheduler.run_until_stopped());
        let result = self.server.await;
        scheduler.abort();

        result
    }
}

pub fn run(
    listener: TcpListener,
    store: Arc<dyn SubscriberStore>,
    transport: Arc<dyn MailTransport>,
    templates: Arc<MailTemplates>,
    mail: MailSettings,
    schedule: DigestSchedule,
) -> Result<Server, std::io::Error> {
    let store = web::Data::from(store);
    let transport = web::Data::from(transport);
    let templates = web::Data::from(templates);
    let mail = web::Data::new(mail);
    let schedule = web::Data::new(schedule);

    let server = HttpServer::new(move || {
        // App is where your application logic lives: routing, middlewares, request handler, etc
        App::new()
            // 'wrap' method adds a middleware to the App. This specific middleware provide incoming
            // request logger
            .wrap(TracingLogger::default())
            .route("/health", web::get().to(health_check))
            .route("/newsletter", web::post().to(handle_create_subscription))
            .route("/send-email", web::post().to(handle_send_email))
            .app_data(store.clone())
            .app_data(transport.clone())
            .app_data(templates.clone())
            .app_data(mail.clone())
            .app_data(schedule.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
