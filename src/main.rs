use std::process;
use std::sync::Arc;

use anyhow::Result;
use clap::CommandFactory;
use tracing::error;

use botstrap::executor::{CommandExecutor, RealCommandExecutor};
use botstrap::{BotstrapError, cli, init_logging, interrupt, run_apply, run_validate};

fn main() -> Result<()> {
    let args = cli::parse_args()?;

    let log_level = match &args.command {
        cli::Commands::Apply(opts) => opts.log_level,
        cli::Commands::Validate(opts) => opts.log_level,
        cli::Commands::Completions(_) => cli::LogLevel::Info,
    };
    init_logging(log_level)?;

    match &args.command {
        cli::Commands::Apply(opts) => {
            interrupt::install()?;
            let executor: Arc<dyn CommandExecutor> = Arc::new(RealCommandExecutor {
                dry_run: opts.dry_run,
            });
            if let Err(e) = run_apply(opts, executor) {
                if matches!(
                    e.downcast_ref::<BotstrapError>(),
                    Some(BotstrapError::Interrupted)
                ) {
                    // No cleanup is performed; partial state stays behind.
                    eprintln!();
                    eprintln!("provisioning interrupted; partial changes were left in place");
                    process::exit(1);
                }
                error!("provisioning failed: {:#}", e);
                process::exit(1);
            }
        }
        cli::Commands::Validate(opts) => run_validate(opts)?,
        cli::Commands::Completions(opts) => {
            let mut cmd = cli::Cli::command();
            clap_complete::generate(
                opts.shell,
                &mut cmd,
                env!("CARGO_PKG_NAME"),
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}
