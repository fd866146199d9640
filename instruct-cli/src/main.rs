//! The `rig-instruct` binary: schema-validated extraction from the command line.

use clap::Parser;
use rig::client::{CompletionClient, ProviderClient};
use rig_instruct::Instructor;
use rig_instruct_adapter::RigAdapter;
use rig_instruct_cli::{load_schema, render_output, Cli, CliError};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays pipeable JSON
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let schema = load_schema(&cli.schema, cli.name.as_deref())?;

    if std::env::var_os("OPENAI_API_KEY").is_none() {
        return Err(CliError::Config(
            "OPENAI_API_KEY is not set. Export it before running rig-instruct.".to_string(),
        ));
    }
    let client = rig::providers::openai::Client::from_env();
    let adapter = RigAdapter::new(client.completion_model(&cli.model));

    tracing::info!(schema = %schema.name, model = %cli.model, "Starting extraction");
    let result = Instructor::new(adapter)
        .with_config(cli.config())
        .instruct_with_schema::<serde_json::Value>(cli.params(), &schema)
        .await?;

    let output =
        serde_json::to_string_pretty(&render_output(result)).map_err(CliError::Output)?;
    println!("{output}");
    Ok(())
}
