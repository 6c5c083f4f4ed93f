#![recursion_limit = "256"]

mod cli;
mod application;
mod domain;
mod data;
mod ml;
mod infra;

#[cfg(test)]
mod testing;

use anyhow::Result;

use application::run_use_case::RunUseCase;
use domain::error::PipelineError;

fn main() -> Result<()> {
    let args = cli::parse_arguments(std::env::args_os())?;

    // Held until exit so run.log is flushed.
    let _guard = infra::logging::init(&args.training.output_dir, &args.training.log_level)?;
    tracing::info!("Output directory: '{}'", args.training.output_dir.display());

    if let Err(err) = RunUseCase::new(args).execute() {
        let kind = err.downcast_ref::<PipelineError>().map_or("Error", PipelineError::kind);
        tracing::error!("{}: {:#}", kind, err);
        return Err(err);
    }
    Ok(())
}
