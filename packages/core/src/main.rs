use chrono::Local;
use clap::Parser;
use dotenvy::dotenv;

use local_library::cli::Cli;
use local_library::commands;
use local_library::config::Config;
use local_library::db;
use local_library::error::AppError;
use local_library::logging::init_logging;
use local_library::repository::CatalogRepository;

#[tokio::main]
async fn main() {
    dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::from_env(cli.database_url.clone())
        .map_err(AppError::Config)
        .unwrap_or_else(|err| {
            tracing::error!("{}", err);
            std::process::exit(1);
        });

    tracing::debug!("Loaded config: {:?}", config);

    if let Err(err) = run(cli, config).await {
        tracing::error!("{}", err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: Config) -> Result<(), AppError> {
    let pool = db::create_pool(&config.database_url).await?;
    let repository = CatalogRepository::new(pool);
    let today = Local::now().date_naive();

    let output = commands::execute(cli.command, &repository, &config, today, cli.json).await?;
    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}
