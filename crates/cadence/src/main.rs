//! Cadence: multi-account social posting scheduler.
//!
//! Single binary with one subcommand:
//! - `serve`: run the HTTP control plane and the posting chains

use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cadence_publish::{
    CaptionRules, CredentialStore, GraphMediaClient, HttpTextPublisher, MediaPublishFlow,
    NoopNotifier, Notifier, QueuePublisher, WebhookNotifier,
};
use cadence_scheduler::{SchedulerRegistry, SchedulingPolicy};
use cadence_store::ItemStore;
use cadence_web::{AppState, create_router};

#[derive(Parser)]
#[command(name = "cadence")]
#[command(about = "Multi-account social posting scheduler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server and posting chains
    Serve {
        /// HTTP server port
        #[arg(long, env = "CADENCE_PORT", default_value = "8080")]
        port: u16,

        /// Path to the credentials JSON (platform -> account -> entry)
        #[arg(long, env = "CADENCE_CREDENTIALS")]
        credentials: String,

        /// Path to the caption rules JSON
        #[arg(long, env = "CADENCE_CAPTIONS")]
        captions: Option<String>,

        /// Path to a scheduling policy JSON (defaults apply when absent)
        #[arg(long, env = "CADENCE_POLICY")]
        policy: Option<String>,

        /// Graph media API base URL
        #[arg(
            long,
            env = "CADENCE_GRAPH_API_BASE",
            default_value = "https://graph.facebook.com/v23.0"
        )]
        graph_api_base: String,

        /// Webhook URL for publish-failure notifications
        #[arg(long, env = "CADENCE_NOTIFY_URL")]
        notify_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "cadence=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            credentials,
            captions,
            policy,
            graph_api_base,
            notify_url,
        } => {
            serve(
                port,
                &credentials,
                captions.as_deref(),
                policy.as_deref(),
                &graph_api_base,
                notify_url,
            )
            .await
        }
    }
}

async fn serve(
    port: u16,
    credentials_path: &str,
    captions_path: Option<&str>,
    policy_path: Option<&str>,
    graph_api_base: &str,
    notify_url: Option<String>,
) -> Result<()> {
    let credentials = load_json::<CredentialStore>(credentials_path)?;

    let captions = match captions_path {
        Some(path) => load_json::<CaptionRules>(path)?,
        None => CaptionRules::default(),
    };

    let policy = match policy_path {
        Some(path) => load_json::<SchedulingPolicy>(path)?,
        None => SchedulingPolicy::default(),
    };

    let notifier: Arc<dyn Notifier> = match notify_url {
        Some(url) => Arc::new(WebhookNotifier::new(url)),
        None => Arc::new(NoopNotifier),
    };

    let media = GraphMediaClient::new(graph_api_base).map_err(|e| miette::miette!("{}", e))?;

    let store = ItemStore::new();
    let publisher = QueuePublisher::new(
        store.clone(),
        Arc::new(credentials),
        Arc::new(captions),
        Arc::new(media),
        Arc::new(HttpTextPublisher::new()),
        MediaPublishFlow::default(),
        notifier,
    );

    let registry = Arc::new(SchedulerRegistry::new(policy.clone(), Arc::new(publisher)));

    let state = Arc::new(AppState {
        store,
        registry,
        policy,
    });
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .map_err(|e| miette::miette!("{}", e))?;

    tracing::info!("cadence listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router)
        .await
        .map_err(|e| miette::miette!("{}", e))?;

    Ok(())
}

fn load_json<T: serde::de::DeserializeOwned>(path: &str) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| miette::miette!("failed to read {}: {}", path, e))?;
    serde_json::from_str(&raw).map_err(|e| miette::miette!("failed to parse {}: {}", path, e))
}
