use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use etwsense::config::Settings;
use etwsense::plugin::{api, SearchPlugin};
use etwsense::{LogProgress, VectorDatabase};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Clone, Debug)]
#[clap(author, version, about = "Serves the ETW search plugin over HTTP", long_about = None)]
struct Args {
    #[clap(long, env = "ETWSENSE_LISTEN", default_value = "127.0.0.1:7400")]
    listen: SocketAddr,

    #[clap(flatten)]
    settings: Settings,
}

#[tokio::main]
async fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info,etwsense=info");
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_level(true)
        .init();

    let args = Args::parse();
    info!(
        manifests = %args.settings.manifest_collection,
        events = %args.settings.event_collection,
        in_memory = args.settings.in_memory,
        "starting etwsense"
    );

    let db = Arc::new(VectorDatabase::from_settings(args.settings.clone()));
    if let Err(e) = db.initialize(&LogProgress).await {
        error!(error = %e, "could not prepare collections");
        std::process::exit(1);
    }

    let plugin = Arc::new(SearchPlugin::new(db));
    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            error!("could not listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };
    api::serve(plugin, args.listen, shutdown).await;
    info!("Shutting down.");
}
