use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use stay_quotes::config::cli::Command;
use stay_quotes::core::{Outcome, QuoteSource, RefreshRequest};
use stay_quotes::utils::error::{ErrorSeverity, QuoteError};
use stay_quotes::utils::logger;
use stay_quotes::utils::validation::parse_date;
use stay_quotes::{
    build_pipeline, Cli, PriceQuery, RefreshAuthority, RemoteQuoteClient, SavingsScenario,
    Settings,
};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // 初始化日誌
    logger::init_cli_logger(cli.verbose);

    tracing::info!("Starting stay-quotes CLI");
    if cli.verbose {
        tracing::debug!("CLI args: {:?}", cli);
    }

    let exit_code = match run(&cli).await {
        Ok(code) => code,
        Err(e) => report_failure(&e),
    };

    if exit_code > 0 {
        std::process::exit(exit_code);
    }
}

async fn run(cli: &Cli) -> stay_quotes::Result<i32> {
    let settings = Arc::new(cli.load_settings()?);

    match &cli.command {
        Command::Resolve {
            destination,
            checkin,
            checkout,
            guests,
            rooms,
        } => {
            let query = PriceQuery::new(
                destination.as_str(),
                parse_date("checkin", checkin)?,
                parse_date("checkout", checkout)?,
                *guests,
                *rooms,
            )?;
            resolve(settings, query).await
        }
        Command::Refresh {
            token,
            all,
            destination,
            checkin,
            checkout,
        } => {
            let authority = RefreshAuthority::new(&settings);
            let request = RefreshRequest {
                all: *all,
                destination: destination.clone(),
                checkin: checkin.clone(),
                checkout: checkout.clone(),
            };
            let header = token.as_ref().map(|t| format!("Bearer {}", t));
            let response =
                authority.refresh(header.as_deref(), &request, &mut StdRng::from_entropy())?;

            tracing::info!("✅ Generated {} entries", response.count);
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(0)
        }
        Command::Health => {
            let client = RemoteQuoteClient::new(settings.clone());
            let health = client.health().await?;
            println!("{}", serde_json::to_string_pretty(&health)?);
            Ok(if health.is_online() { 0 } else { 2 })
        }
        Command::Savings {
            membership_cost,
            retail_price,
            member_price,
            trips_per_year,
            years,
            inflation,
            csv,
        } => {
            let scenario = SavingsScenario {
                membership_cost: *membership_cost,
                retail_price: *retail_price,
                member_price: *member_price,
                trips_per_year: *trips_per_year,
                years: *years,
                retail_inflation: inflation / 100.0,
            };
            let projection = scenario.project()?;
            if *csv {
                print!("{}", projection.to_csv()?);
            } else {
                println!("{}", serde_json::to_string_pretty(&projection)?);
            }
            match projection.break_even_year {
                Some(year) => tracing::info!("📈 Break-even in year {}", year),
                None => tracing::info!("📉 No break-even within {} years", years),
            }
            Ok(0)
        }
    }
}

/// Prints each delivery as one JSON line: the cached result first when there is one.
async fn resolve(settings: Arc<Settings>, query: PriceQuery) -> stay_quotes::Result<i32> {
    tracing::info!(
        "🔍 Resolving {} {}→{} in {} mode",
        query.destination,
        query.checkin,
        query.checkout,
        settings.mode
    );

    let pipeline = Arc::new(build_pipeline(settings));
    let mut deliveries = pipeline.resolve_stream(query);
    let mut outcome = Outcome::Unavailable;

    while let Some(delivery) = deliveries.recv().await {
        if let stay_quotes::core::Delivery::Final(resolution) = &delivery {
            outcome = resolution.outcome;
        }
        println!("{}", serde_json::to_string(&delivery)?);
    }

    Ok(if outcome == Outcome::Unavailable { 1 } else { 0 })
}

fn report_failure(e: &QuoteError) -> i32 {
    // 記錄詳細錯誤信息
    tracing::error!(
        "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    match e.severity() {
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}
