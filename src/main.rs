//! catdog - cat vs. dog classification service

use clap::Parser;
use catdog_classifier::cli::{cmd_classify, cmd_info, cmd_serve, Cli, Commands, ModelArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "catdog=info,catdog_classifier=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Some(Commands::Serve { host, port, model, tracking_dir, allow_missing_model }) => {
            cmd_serve(config_path, host, port, &model, tracking_dir, allow_missing_model).await?;
        }
        Some(Commands::Classify { image, model, no_track }) => {
            cmd_classify(config_path, &image, &model, no_track)?;
        }
        Some(Commands::Info { model }) => {
            cmd_info(config_path, &model)?;
        }
        None => {
            cmd_serve(config_path, None, None, &ModelArgs::default(), None, false).await?;
        }
    }

    Ok(())
}
