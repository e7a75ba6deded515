use anyhow::Context;
use clap::{Parser, Subcommand};
use shopmap_core::{AppConfig, LlmProvider};
use shopmap_llm::{GenerationRequest, LlmService};
use tracing_subscriber::EnvFilter;


#[derive(Debug, Parser)]
#[command(name = "shopmap-cli")]
#[command(about = "Shop & Product API command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Text generation against the configured providers
    Llm {
        #[command(subcommand)]
        command: LlmCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check that the database is reachable
    Ping,
    /// Apply pending migrations
    Migrate,
    /// Insert the default colors, sizes and categories
    Seed,
}

#[derive(Debug, Subcommand)]
enum LlmCommands {
    Generate {
        #[arg(long)]
        prompt: String,
        /// `openai` or `claude`; defaults to the configured provider
        #[arg(long)]
        provider: Option<LlmProvider>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long, default_value_t = shopmap_llm::types::DEFAULT_TEMPERATURE)]
        temperature: f32,
        #[arg(long, default_value_t = shopmap_llm::types::DEFAULT_MAX_TOKENS)]
        max_tokens: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = shopmap_core::load_app_config().context("failed to load configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},sqlx=warn", config.log_level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Some(Commands::Db { command }) => run_db(&config, command).await,
        Some(Commands::Llm {
            command:
                LlmCommands::Generate {
                    prompt,
                    provider,
                    model,
                    temperature,
                    max_tokens,
                },
        }) => {
            let request = GenerationRequest {
                prompt,
                model,
                temperature,
                max_tokens,
            };
            run_generate(&config, provider, &request).await
        }
        None => {
            println!("shopmap-cli ready; see --help for commands");
            Ok(())
        }
    }
}

async fn run_db(config: &AppConfig, command: DbCommands) -> anyhow::Result<()> {
    let pool = shopmap_db::connect_pool(
        &config.database_url,
        shopmap_db::PoolConfig::from_app_config(config),
    )
    .await
    .context("failed to connect to database")?;

    match command {
        DbCommands::Ping => {
            shopmap_db::ping(&pool).await.context("database ping failed")?;
            println!("database ok");
        }
        DbCommands::Migrate => {
            let applied = shopmap_db::run_migrations(&pool)
                .await
                .context("failed to run migrations")?;
            tracing::info!(applied, "migrations complete");
            println!("applied {applied} migration(s)");
        }
        DbCommands::Seed => {
            let summary = shopmap_db::seed_defaults(&pool)
                .await
                .context("failed to seed defaults")?;
            println!(
                "seeded colors={} sizes={} categories={}",
                summary.colors, summary.sizes, summary.categories
            );
        }
    }

    pool.close().await;
    Ok(())
}

async fn run_generate(
    config: &AppConfig,
    provider: Option<LlmProvider>,
    request: &GenerationRequest,
) -> anyhow::Result<()> {
    if request.prompt.trim().is_empty() {
        anyhow::bail!("--prompt must not be empty");
    }

    let service = LlmService::from_settings(&config.llm).context("invalid llm settings")?;
    let response = service
        .generate(provider, request)
        .await
        .context("generation failed")?;

    tracing::info!(
        model = %response.model,
        total_tokens = response.tokens.total,
        "generation completed"
    );
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
