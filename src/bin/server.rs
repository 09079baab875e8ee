use std::{
    env::{self},
    error::Error,
    fs::OpenOptions,
    net::SocketAddr,
    sync::Arc,
    time::Duration,
};

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware,
};
use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use rust_decimal::Decimal;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{
    EnvFilter, Layer, filter, layer::SubscriberExt, util::SubscriberInitExt,
};

use global_bank::{
    AdminCredentials, AppState, BankConfig, PasswordHash, build_router, graceful_shutdown,
    logging_middleware,
};

/// The REST API server for global_bank.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// The port to serve the API from.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// The canonical name of the timezone that decides when a day starts, e.g. "Pacific/Auckland".
    #[arg(long, default_value = "Etc/UTC")]
    timezone: String,

    /// The email the administrator logs in with. The password is read from
    /// the environment variable 'ADMIN_PASSWORD'.
    #[arg(long)]
    admin_email: String,

    /// The USD amount granted to each customer once per day.
    #[arg(long, default_value = "10.00")]
    daily_credit: Decimal,

    /// The BTC amount credited on every mining tick.
    #[arg(long, default_value = "0.5")]
    mining_reward: Decimal,

    /// The number of seconds between mining ticks.
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    mining_interval_secs: u64,
}

/// How often the tasks of expired sessions are looked for.
const SESSION_REAP_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    setup_logging()?;

    let args = Args::parse();

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));

    let secret = env::var("SECRET").map_err(|_| "The environment variable 'SECRET' must be set")?;
    let admin_password = env::var("ADMIN_PASSWORD")
        .map_err(|_| "The environment variable 'ADMIN_PASSWORD' must be set")?;

    let admin = AdminCredentials::new(
        &args.admin_email,
        &admin_password,
        PasswordHash::DEFAULT_COST,
    )?;
    let bank_config = BankConfig {
        daily_credit_amount: args.daily_credit,
        mining_reward: args.mining_reward,
        mining_interval: Duration::from_secs(args.mining_interval_secs),
        ..BankConfig::default()
    };

    let conn = Connection::open(&args.db_path)?;
    let app_state = AppState::new(conn, &secret, &args.timezone, bank_config, admin)?;
    let session_tasks = app_state.session_tasks.clone();
    let session_reaper = session_tasks.spawn_reaper(SESSION_REAP_INTERVAL);

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = add_tracing_layer(
        build_router(app_state).layer(middleware::from_fn(logging_middleware)),
    );

    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await?;

    tracing::info!("Stopping scheduled tasks...");
    session_reaper.stop().await;
    session_tasks.stop_everything().await?;

    Ok(())
}

fn setup_logging() -> Result<(), Box<dyn Error>> {
    let stdout_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")?;

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(Arc::new(log_file))
        .with_filter(filter::LevelFilter::DEBUG);

    tracing_subscriber::registry()
        .with(stdout_log)
        .with(debug_log)
        .init();

    Ok(())
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // By default, `TraceLayer` will log 5xx responses but we're doing our specific
        // logging of errors so disable that
        .on_failure(());

    router.layer(tracing_layer)
}
