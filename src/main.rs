use autofill_inspector::cli::commands::{cmd_fixture, cmd_inspect, cmd_render, cmd_report};
use autofill_inspector::cli::config::{Cli, Commands, load_config};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let mut config = load_config(cli.config.as_deref());

    // Classifier endpoint: CLI > config > built-in heuristics
    let classifier_endpoint = cli
        .classifier_endpoint
        .clone()
        .or(config.classifier.endpoint.clone());

    match cli.command {
        Commands::Render {
            input,
            show_invisible,
            show_unknown,
            format,
            output,
        } => {
            let filter = config.display.filter(show_invisible, show_unknown);
            cmd_render(&input, filter, &format, output.as_deref())?;
        }
        Commands::Fixture {
            input,
            host,
            output_dir,
        } => {
            let output_dir = output_dir.unwrap_or_else(|| config.export.output_dir.clone());
            cmd_fixture(&input, &host, &output_dir)?;
        }
        Commands::Inspect {
            target,
            address_records,
            credit_card_records,
            format,
            output,
        } => {
            cmd_inspect(
                &target,
                &config,
                classifier_endpoint.as_deref(),
                (address_records, credit_card_records),
                &format,
                output.as_deref(),
            )
            .await?;
        }
        Commands::Report {
            target,
            panel_image,
            output_dir,
        } => {
            if let Some(dir) = output_dir {
                config.export.output_dir = dir;
            }
            cmd_report(&target, &config, classifier_endpoint.as_deref(), &panel_image).await?;
        }
    }

    Ok(())
}
