//! Binary entry point for the Imprint CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;

use imprint::{
    ConfigError, ImageWorkflow, RequestError, ScalewayConfig, ScalewayImageError,
    ScalewayImageService, SnapshotRequest, WorkflowConfig, WorkflowError, WorkflowResult,
};

mod cli;

use cli::{Cli, SnapshotCommand};

#[derive(Debug, Error)]
enum CliError {
    #[error("invalid request: {0}")]
    Request(#[from] RequestError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("provider error: {0}")]
    Provider(#[from] ScalewayImageError),
    #[error("snapshot failed: {0}")]
    Workflow(#[from] WorkflowError<ScalewayImageError>),
    #[error("failed to write result: {0}")]
    Output(String),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli {
        Cli::Snapshot(command) => {
            let result = snapshot(command).await?;
            write_result(io::stdout(), &result)
        }
    }
}

async fn snapshot(args: SnapshotCommand) -> Result<WorkflowResult, CliError> {
    // Reject bad input before touching configuration or the network.
    let request = SnapshotRequest::new(args.instance_id, args.target_region)?;

    let workflow_config = WorkflowConfig::load_without_cli_args()?;
    workflow_config.validate()?;
    let source = ScalewayImageService::new(ScalewayConfig::load_without_cli_args()?)?;

    let replica = request
        .target_region()
        .filter(|zone| *zone != source.zone())
        .map(|zone| source.for_zone(zone));
    let mut workflow = ImageWorkflow::new(workflow_config, request, source);
    if let Some(replica) = replica {
        workflow = workflow.with_replica_service(replica);
    }

    Ok(workflow.run().await?)
}

fn write_result(mut target: impl Write, result: &WorkflowResult) -> Result<(), CliError> {
    let rendered =
        serde_json::to_string_pretty(result).map_err(|err| CliError::Output(err.to_string()))?;
    writeln!(target, "{rendered}").map_err(|err| CliError::Output(err.to_string()))
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
