use clap::Parser;
use market_client::config::Command;
use market_client::utils::error::ErrorCategory;
use market_client::utils::logger::{self, LogFormat};
use market_client::utils::validation;
use market_client::{build_repository, CliConfig, MarketError, MarketRepository};

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    logger::init_logger(format, cli.verbose);

    tracing::info!("Starting market-client");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    if let Err(e) = run(&cli).await {
        tracing::error!(
            "❌ {} failed: {} (Category: {:?})",
            command_name(&cli.command),
            e,
            e.category()
        );
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let exit_code = match e.category() {
            ErrorCategory::Configuration => 2,
            ErrorCategory::Network => 3,
            ErrorCategory::Node | ErrorCategory::Contract | ErrorCategory::Data => 1,
        };
        std::process::exit(exit_code);
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Create => "create",
        Command::Info { .. } => "info",
    }
}

async fn run(cli: &CliConfig) -> Result<(), MarketError> {
    let config = cli.resolve()?;
    let repository = build_repository(&config).await?;

    match &cli.command {
        Command::Create => create(&repository).await,
        Command::Info { address } => {
            let address = validation::validate_address("address", address)?;
            info(&repository, address).await
        }
    }
}

async fn create(repository: &MarketRepository) -> Result<(), MarketError> {
    let pending = repository.create().await?;
    println!("📤 Transaction submitted: {}", pending.transaction_hash());

    let market = pending.confirmed().await?;
    println!("✅ Market deployed at: {}", market.address());
    Ok(())
}

async fn info(
    repository: &MarketRepository,
    address: market_client::Address,
) -> Result<(), MarketError> {
    let market = repository.from_address(address);

    let products = market.product_count().await?;
    let requirements = market.requirements_count().await?;

    println!("📋 Market {}", market.address());
    println!("  - products: {}", products);
    println!("  - requirements: {}", requirements);
    Ok(())
}
