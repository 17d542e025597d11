use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use callmeter::app::App;
use callmeter_core::config::{Config, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Config::parse_args();

    // Setup logging
    setup_logging(cli.debug);

    // Load settings
    let mut settings = Settings::load(cli.config.as_ref())?;
    settings.merge_cli(&cli);
    settings.validate();

    let app = App::new(settings);
    app.run(&cli).await
}

fn setup_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("callmeter=debug,callmeter_core=debug")
    } else {
        EnvFilter::new("callmeter=info,callmeter_core=info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
