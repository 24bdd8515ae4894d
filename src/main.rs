use anyhow::Context;
use cherrypick::utils::error::PickError;
use cherrypick::utils::{logger, validation::Validate};
use cherrypick::{CherryPickPipeline, CliConfig, LocalStorage, PickEngine, RunReport, TomlConfig};
use clap::Parser;

fn load_config(cli: &CliConfig) -> anyhow::Result<TomlConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("📁 Loading configuration from: {}", path);
            TomlConfig::from_file(path).with_context(|| format!("Failed to load config file '{}'", path))?
        }
        None => {
            tracing::info!("📋 No config file given, using built-in defaults");
            TomlConfig::default()
        }
    };
    cli.apply_overrides(&mut config);
    Ok(config)
}

fn report_failure(e: &PickError) -> ! {
    tracing::error!(
        "❌ Cherry-pick run failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    std::process::exit(e.severity().exit_code());
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("🚀 Starting cherrypick");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    if let Err(e) = cli.validate() {
        report_failure(&e);
    }

    let config = load_config(&cli)?;

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        report_failure(&e);
    }
    tracing::info!("✅ Configuration loaded and validated successfully");

    let run_name = config.run_name().to_string();
    let storage = LocalStorage::new(".".to_string());
    let pipeline = match CherryPickPipeline::new(storage, config) {
        Ok(pipeline) => pipeline,
        Err(e) => report_failure(&e),
    };
    let engine = PickEngine::new(pipeline);

    if cli.dry_run {
        tracing::info!("🔍 DRY RUN MODE - no files will be written");
        match engine.plan().await {
            Ok(result) => {
                let report = RunReport::build(&run_name, &result, &[]);
                for (block, count) in &report.demand {
                    println!("{}: {} transfers", block, count);
                }
                for usage in &report.source_usage {
                    println!("{}:{} <- {} ({})", usage.plate, usage.well, usage.block, usage.stocked);
                }
                for line in report.summary_lines() {
                    println!("{}", line);
                }
            }
            Err(e) => report_failure(&e),
        }
        return Ok(());
    }

    match engine.run().await {
        Ok(output_path) => {
            tracing::info!("✅ Cherry-pick run completed successfully!");
            println!("✅ Cherry-pick run completed successfully!");
            println!("📁 Output saved to: {}", output_path);
        }
        Err(e) => report_failure(&e),
    }

    Ok(())
}
