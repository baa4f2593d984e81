use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod artifact;
mod config;
mod dashboard;
mod db;
mod error;
mod features;
mod interpret;
mod models;
mod report;
mod scorer;
mod screener;

use config::Config;
use models::QuestionnaireRecord;
use screener::Screener;

#[derive(Parser)]
#[command(name = "tea-screening")]
#[command(about = "Questionnaire screening API with a pre-trained classifier", long_about = None)]
struct Cli {
    /// Model artifact to load (overrides TEA_MODEL_PATH)
    #[arg(long, global = true)]
    model: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API
    Serve {
        /// Listen address (overrides TEA_BIND_ADDR)
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed screenings
    Seed,
    /// Score and store questionnaires from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Score one questionnaire JSON file without touching the database
    Predict {
        #[arg(long)]
        json: PathBuf,
    },
    /// Generate a markdown dashboard report
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(config.database_url()?)
        .await
        .context("failed to connect to Postgres")
}

fn load_screener(config: &Config) -> anyhow::Result<Screener> {
    Screener::load(&config.model_path).with_context(|| {
        format!(
            "cannot start without a valid model artifact at {}",
            config.model_path.display()
        )
    })
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(model) = cli.model {
        config.model_path = model;
    }

    match cli.command {
        Commands::Serve { bind } => {
            let screener = Arc::new(load_screener(&config)?);
            let pool = connect(&config).await?;
            let addr = bind.unwrap_or(config.bind_addr);

            let state = api::AppState { pool, screener };
            let app = api::router(state, &config.cors_origin);

            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;
            tracing::info!(%addr, "screening API listening");
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
        Commands::InitDb => {
            let pool = connect(&config).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let screener = load_screener(&config)?;
            let pool = connect(&config).await?;
            let inserted = db::seed(&pool, &screener).await?;
            println!("Inserted {inserted} seed screenings.");
        }
        Commands::Import { csv } => {
            let screener = load_screener(&config)?;
            let pool = connect(&config).await?;
            let inserted = db::import_csv(&pool, &screener, &csv).await?;
            println!("Inserted {inserted} screenings from {}.", csv.display());
        }
        Commands::Predict { json } => {
            let screener = load_screener(&config)?;
            let raw = std::fs::read_to_string(&json)
                .with_context(|| format!("cannot read {}", json.display()))?;
            let record: QuestionnaireRecord =
                serde_json::from_str(&raw).context("questionnaire JSON is malformed")?;
            if let Err(problems) = record.validate() {
                anyhow::bail!("invalid questionnaire: {}", problems.join("; "));
            }

            let result = screener.screen(&record)?;
            let output = serde_json::json!({
                "prediction": result.label(),
                "predicted_class": result.predicted_class,
                "probability": result.probability,
                "confidence": result.confidence_tier.to_string(),
                "recommendation": result.recommendation.text(),
                "model_type": result.model_identifier,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Report { out } => {
            let pool = connect(&config).await?;
            let data = report::ReportData {
                generated_at: chrono::Utc::now(),
                kpis: dashboard::kpis(&pool).await?,
                ages: dashboard::age_distribution(&pool).await?,
                genders: dashboard::gender_distribution(&pool).await?,
                risk_factors: dashboard::risk_factors(&pool).await?,
                recent: db::recent_screenings(&pool, 5).await?,
            };
            std::fs::write(&out, report::build_report(&data))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
