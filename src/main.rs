mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use lumaflow::config::Config;
use lumaflow::error::{Error, JobError};
use lumaflow::nodes::Nodes;
use lumaflow::placement::CanvasPlacement;

#[tokio::main]
async fn main() {
    // logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        tracing::error!(kind = %err.kind(), error = %err, "Command failed");
        print_json(&ErrorOutput {
            error: JobError::from(&err),
        });
        std::process::exit(1);
    }
}

#[derive(Serialize)]
struct ErrorOutput {
    error: JobError,
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!(error = %e, "Failed to encode output"),
    }
}

async fn run(cli: Cli) -> Result<(), Error> {
    let config = match cli.config {
        Some(path) => Config::load_from_path(path)?.with_env_api_key(),
        None => Config::load()?,
    };

    match cli.command {
        Commands::Placement(args) => {
            let placement = CanvasPlacement::compute(
                args.source_width,
                args.source_height,
                args.aspect_ratio,
                &args.overrides.into(),
            )?;
            print_json(&placement);
        }
        Commands::Config => match toml::to_string_pretty(&config) {
            Ok(text) => print!("{text}"),
            Err(e) => tracing::error!(error = %e, "Failed to encode configuration"),
        },
        command => {
            let nodes = Nodes::from_config(&config)?;
            match command {
                Commands::GenerateImage(args) => {
                    print_json(&nodes.generate_image(args.into_request()).await?)
                }
                Commands::GenerateVideo(args) => {
                    print_json(&nodes.generate_video(args.into_request()).await?)
                }
                Commands::ReframeImage(args) => {
                    print_json(&nodes.reframe_image(args.source.into_request(args.model)).await?)
                }
                Commands::ReframeVideo(args) => {
                    print_json(&nodes.reframe_video(args.source.into_request(args.model)).await?)
                }
                Commands::ModifyVideo(args) => {
                    print_json(&nodes.modify_video(args.into_request()).await?)
                }
                Commands::ListConcepts => print_json(&nodes.list_concepts().await?),
                Commands::ListCameraMotions => print_json(&nodes.list_camera_motions().await?),
                Commands::Placement(_) | Commands::Config => {}
            }
        }
    }

    Ok(())
}
