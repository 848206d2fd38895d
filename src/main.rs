use chrono::Duration;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use workout_sync::controllers::{SyncController, TokenController};
use workout_sync::domain::auth::{ClientCredentials, Clock, SystemClock, TokenExchange};
use workout_sync::domain::workout::WorkoutSyncService;
use workout_sync::error::AppResult;
use workout_sync::infrastructure::config::{Config, LogFormat};
use workout_sync::infrastructure::db::{check_connection, create_pool, run_migrations};
use workout_sync::infrastructure::http::build_http_client;
use workout_sync::infrastructure::oauth::OAuthTokenClient;
use workout_sync::infrastructure::repositories::{
    FileTokenRepository, WorkoutApiRepository, WorkoutRepository,
};

#[derive(Debug, Parser)]
#[command(name = "workout-sync", version, about = "Sync workout history into Postgres")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch new workouts and upsert them into the database (default)
    Sync,
    /// Refresh the stored token and validate it
    Refresh,
    /// Obtain a first token (authorization code, or client credentials without --code)
    Login {
        #[arg(long)]
        code: Option<String>,
        #[arg(long)]
        redirect_uri: Option<String>,
    },
    /// Print the authorization URL to open in a browser
    AuthorizeUrl {
        #[arg(long)]
        state: Option<String>,
        #[arg(long)]
        redirect_uri: Option<String>,
    },
    /// Show expiry of the stored token
    Status,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(e.exit_code());
        }
    };

    // Initialize logging
    init_logging(&config);

    if let Err(e) = run(cli.command.unwrap_or(Command::Sync), config).await {
        tracing::error!(error = %e, "Process failed");
        std::process::exit(e.exit_code());
    }
}

async fn run(command: Command, config: Config) -> AppResult<()> {
    let http_client = build_http_client(&config)?;

    // === DEPENDENCY INJECTION SETUP ===
    let oauth_client = Arc::new(
        OAuthTokenClient::new(config.token_url.clone(), config.token_request_encoding)
            .with_authorize_url(config.authorize_url.clone())
            .with_http_client(http_client.clone()),
    );
    let token_repo = Arc::new(FileTokenRepository::new(config.tokens_file.clone()));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let exchange = TokenExchange::new(
        oauth_client,
        token_repo,
        ClientCredentials {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            scope: config.scope.clone(),
        },
        config.api_base_url.clone(),
    )
    .with_clock(clock.clone())
    .with_safety_margin(Duration::seconds(config.token_safety_margin_secs))
    .with_api_client(http_client);

    let api = WorkoutApiRepository::new(exchange);

    match command {
        Command::Sync => {
            let database_url = config.require_database_url()?;
            let pool = create_pool(database_url).await?;
            tracing::info!("Database connection pool created");

            check_connection(&pool).await?;
            run_migrations(&pool).await?;
            tracing::info!("Database connection verified");

            let workout_repo = Arc::new(WorkoutRepository::new(Arc::new(pool)));
            let sync_service =
                WorkoutSyncService::new(api, workout_repo, clock, config.workout_page_size);

            let report = SyncController::new(sync_service).run().await?;
            if report.fetched == 0 {
                println!("No new workouts found.");
            } else {
                println!("Successfully loaded {} records.", report.fetched);
            }
        }
        Command::Refresh => {
            TokenController::new(api).refresh().await?;
        }
        Command::Login { code, redirect_uri } => {
            TokenController::new(api)
                .login(code.as_deref(), redirect_uri.or(config.redirect_uri).as_deref())
                .await?;
        }
        Command::AuthorizeUrl {
            state,
            redirect_uri,
        } => {
            let url = TokenController::new(api)
                .authorize_url(redirect_uri.or(config.redirect_uri).as_deref(), state.as_deref())?;
            println!("{}", url);
        }
        Command::Status => {
            let status = TokenController::new(api).status().await?;
            println!(
                "expires_at={} expired={} refresh_token={}",
                status.expires_at,
                status.expired,
                if status.has_refresh_token { "present" } else { "missing" }
            );
        }
    }

    Ok(())
}

fn init_logging(config: &Config) {
    if config.log_format == LogFormat::Json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "workout_sync=info".into()),
            )
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "workout_sync=info".into()),
            )
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}
