use std::sync::Arc;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;
use tracing::{debug, error};

use acctmerge::config::{format_error_message, MergeConfig};
use acctmerge::config_file::ConfigFile;
use acctmerge::logging::init_logging;
use acctmerge::platform::{shutdown_channel, signal_exit_code, ExitCode, SignalHandler};
use acctmerge::validation::validate_input_file;
use acctmerge::{MergeProcessor, ParallelConfig, PipelineError, StatusClient};

mod cli;

use cli::{print_usage, Cli};

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
            _ => {
                let _ = e.print();
                print_usage();
                ExitCode::InvalidUsage.exit();
            }
        },
    };

    init_logging(cli.verbose, cli.quiet);

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", format_error_message(&format!("{:#}", e)));
            ExitCode::InvalidUsage.exit();
        }
    };

    if cli.show_config {
        ConfigFile::show_config(&config, cli.config.as_deref());
        ExitCode::Success.exit();
    }

    match run(&cli, &config) {
        Ok(()) => ExitCode::Success.exit(),
        Err(e) => {
            if matches!(
                e.downcast_ref::<PipelineError>(),
                Some(PipelineError::Cancelled)
            ) {
                debug!("processing cancelled");
                signal_exit_code()
                    .unwrap_or(ExitCode::GeneralError)
                    .exit();
            }
            error!(error = %format!("{:#}", e), "merge failed");
            eprintln!("{}", format_error_message(&format!("{:#}", e)));
            ExitCode::GeneralError.exit();
        }
    }
}

/// Defaults, then config files, then command-line flags
fn build_config(cli: &Cli) -> Result<MergeConfig> {
    let file = ConfigFile::load_with_custom_path(cli.config.as_deref())?;
    let mut config = MergeConfig::default();
    config.apply_file(&file)?;
    cli.apply_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

fn run(cli: &Cli, config: &MergeConfig) -> Result<()> {
    let (input, output) = match cli.validate_paths() {
        Ok(paths) => paths,
        Err(message) => {
            error!("{}", message);
            eprintln!("{}", format_error_message(&message));
            print_usage();
            ExitCode::InvalidUsage.exit();
        }
    };
    debug!(input = %input.display(), output = %output.display(), "arguments received");

    let size = validate_input_file(input, config.input.max_inbound_file_size_mb)?;
    debug!(size, "inbound file accepted");

    let (trigger, shutdown) = shutdown_channel();
    let _signal_handler = SignalHandler::new(trigger)?;

    let client = StatusClient::new(&config.service.status_api, config.service.request_timeout)?;
    let processor =
        MergeProcessor::new(ParallelConfig::from(config), Arc::new(client)).with_shutdown(shutdown);

    let stats = processor.process_files(input, output)?;

    if cli.stats {
        eprintln!("{}", stats.format_stats());
    }
    Ok(())
}
