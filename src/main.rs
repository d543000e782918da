use vigilconso::config::get_configuration;
use vigilconso::startup::Application;
use vigilconso::telemetry::{get_subscriber, init_subscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = get_subscriber(
        String::from("vigilconso"),
        String::from("info"),
        std::io::stdout,
    );

    init_subscriber(subscriber);

    let config = get_configuration()?;
    let application = Application::build(config.clone()).await?;

    tracing::info!(
        "Server listening on {}:{}",
        config.application.get_host(),
        application.get_port()
    );

    application.run_until_stop().await?;

    Ok(())
}
