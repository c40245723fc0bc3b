//! ChatVoice CLI entry point

use std::process::ExitCode;

use clap::Parser;

use chat_voice::application::ports::ConfigStore;
use chat_voice::cli::{
    app::{init_logging, load_merged_config, run_devices, run_play, run_record, EXIT_ERROR},
    args::{Cli, Commands, PlayOptions, RecordOptions},
    config_cmd::handle_config_command,
    presenter::Presenter,
};
use chat_voice::domain::config::AppConfig;
use chat_voice::infrastructure::XdgConfigStore;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let presenter = Presenter::new();
    let store = XdgConfigStore::from_override(cli.config.clone());

    let loaded = load_merged_config(&store).await;
    let log_level = loaded
        .as_ref()
        .map(|config| config.log_level_or_default().to_string())
        .unwrap_or_else(|_| AppConfig::defaults().log_level_or_default().to_string());
    init_logging(cli.verbose, &log_level);

    let command = match cli.command {
        // Config commands work on the raw file and report their own errors
        Commands::Config { action } => {
            if let Err(e) = handle_config_command(action, &store, &presenter).await {
                presenter.error(&e.to_string());
                return ExitCode::from(EXIT_ERROR);
            }
            return ExitCode::SUCCESS;
        }
        command => command,
    };

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            presenter.error(&format!("{} ({})", e, store.path().display()));
            return ExitCode::from(EXIT_ERROR);
        }
    };

    match command {
        Commands::Record { seconds, output } => {
            run_record(RecordOptions { seconds, output }, config.capture_settings()).await
        }
        Commands::Play {
            file,
            content_type,
            base64,
        } => {
            let options = PlayOptions {
                file,
                content_type,
                base64,
            };
            run_play(options, config.playback_settings()).await
        }
        Commands::Devices => run_devices(&presenter),
        Commands::Config { .. } => ExitCode::SUCCESS,
    }
}
