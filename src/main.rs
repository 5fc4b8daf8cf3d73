use clap::Parser;
use small_volume_transfer::core::engine::ProtocolTables;
use small_volume_transfer::core::report::{write_run_report, RunReport};
use small_volume_transfer::utils::{logger, validation::Validate};
use small_volume_transfer::{
    CliConfig, LocalStorage, ProtocolConfig, ProtocolEngine, ProtocolError, SimulatedSession,
};
use std::path::{Path, PathBuf};

fn fail(e: &ProtocolError) -> ! {
    tracing::error!(
        "❌ Protocol failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
    std::process::exit(e.severity().exit_code());
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting small-volume-transfer");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let (config, base_dir) = match &cli.config {
        Some(path) => {
            tracing::info!("📁 Loading protocol from: {}", path);
            let base_dir = Path::new(path)
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            (ProtocolConfig::from_file(path), base_dir)
        }
        None => {
            tracing::info!("No --config given, using the built-in protocol");
            (ProtocolConfig::builtin(), PathBuf::from("."))
        }
    };
    let config = config.unwrap_or_else(|e| fail(&e));

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        fail(&e);
    }
    tracing::info!("✅ Configuration loaded and validated");

    display_config_summary(&config, &cli);

    let mut engine = ProtocolEngine::from_config(SimulatedSession::new(), config, &base_dir);

    if cli.dry_run {
        tracing::info!("🔍 DRY RUN MODE - no robot commands will be issued");
        let tables = engine.load_tables().await.unwrap_or_else(|e| fail(&e));
        print_plan(&engine, &tables);
        return Ok(());
    }

    let outcome = engine.run().await;

    if let Some(output_path) = &cli.output_path {
        let storage = LocalStorage::new(output_path.clone());
        let report = RunReport {
            protocol_name: engine.config().protocol_name(),
            summary: outcome.as_ref().ok(),
            error: outcome.as_ref().err().map(|e| e.to_string()),
            journal: engine.session().journal(),
        };
        let file = write_run_report(&storage, &report).await?;
        tracing::info!("📁 Run report saved to: {}/{}", output_path, file);
    }

    match outcome {
        Ok(summary) => {
            tracing::info!("✅ Protocol completed successfully!");
            println!("✅ Protocol '{}' completed", summary.protocol_name);
            println!("  Liquids defined: {}", summary.liquids_defined);
            println!(
                "  Transfers: {} ({} tips, {} moved)",
                summary.transfers.transfers_completed,
                summary.transfers.tips_used,
                summary.transfers.volume_moved
            );
            println!(
                "  Duration: {} ms",
                (summary.finished_at - summary.started_at).num_milliseconds()
            );
        }
        Err(e) => fail(&e),
    }

    Ok(())
}

fn display_config_summary(config: &ProtocolConfig, cli: &CliConfig) {
    println!("📋 Protocol Summary:");
    println!("  Protocol: {}", config.protocol_name());
    if let Some(api_level) = &config.metadata.api_level {
        println!("  API level: {}", api_level);
    }
    if let Some(author) = &config.metadata.author {
        println!("  Author: {}", author);
    }
    println!(
        "  Pipette: {} ({} mount)",
        config.pipette.instrument, config.pipette.mount
    );
    println!("  Modules: {}", config.modules.len());
    println!("  Labware: {}", config.labware.len());
    println!(
        "  Units: liquids in {}, transfers in {}",
        config.liquids.volume_unit, config.transfers.volume_unit
    );

    if cli.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}

fn print_plan(engine: &ProtocolEngine<SimulatedSession>, tables: &ProtocolTables) {
    let config = engine.config();
    let (liquid_source, transfer_source) = engine.describe_sources();

    println!("🧪 Starting liquids ({}) into '{}':", liquid_source, config.liquids.labware);
    for liquid in &tables.liquids {
        println!(
            "  {} {} {} ({}, {})",
            liquid.well_location,
            liquid.initial_volume,
            config.liquids.volume_unit,
            liquid.name,
            liquid.color
        );
    }

    println!();
    println!(
        "💧 Transfers ({}) '{}' -> '{}', aspirate at {}, dispense at {}:",
        transfer_source,
        config.transfers.source_labware,
        config.transfers.destination_labware,
        config.transfers.aspirate,
        config.transfers.dispense
    );
    for (index, transfer) in tables.transfers.iter().enumerate() {
        println!(
            "  {:>3}. {} -> {} {} {}",
            index + 1,
            transfer.source_well,
            transfer.destination_well,
            transfer.volume,
            config.transfers.volume_unit
        );
    }

    println!();
    println!(
        "✅ Dry run complete: {} tips needed. Run without --dry-run to execute.",
        tables.transfers.len()
    );
}
