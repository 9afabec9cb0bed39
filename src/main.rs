use p2p_cpp::datasource::{write_sample_files, CsvRecordSource};
use p2p_cpp::export::ExportManifest;
use p2p_cpp::{AppError, Compiler, Config, ReportWriter};

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}", AppError::from(e));
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&config) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run(config: &Config) -> Result<ExportManifest, AppError> {
    if config.seed_sample_data {
        write_sample_files(
            &config.purchases_path,
            &config.sales_path,
            &config.conversions_path,
        )
        .map_err(AppError::Seed)?;
    }

    let source = CsvRecordSource::new(&config.purchases_path, &config.sales_path)
        .with_conversions(&config.conversions_path);

    let output = Compiler::new(config.ledger.clone()).compile_source(&source)?;
    let manifest = ReportWriter::new(&config.report_dir).write(&output)?;

    let stats = &output.statistics;
    tracing::info!(
        sales = stats.sales_processed,
        gain_loss_usd = %stats.total_gain_loss_usd.to_export_string(),
        inventory_usdt = %stats.ending_inventory_usdt.to_export_string(),
        fingerprint = %manifest.fingerprint,
        "Run complete"
    );

    Ok(manifest)
}
