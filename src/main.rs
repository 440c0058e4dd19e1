use anyhow::Result;
use clap::Parser;
use inbox_triage::cli::{self, Cli, Commands};
use inbox_triage::config::Config;
use inbox_triage::error::TriageError;
use inbox_triage::logging;
use std::process;
use tracing::error;

/// Configuration problems exit with 2, anything else with 1
fn exit_code(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<TriageError>() {
        Some(e) if e.is_fatal() => 2,
        _ => 1,
    }
}

/// Log a failed command through the installed subscriber and pick the exit code
fn log_failure(e: &anyhow::Error) -> i32 {
    let code = exit_code(e);
    if code == 2 {
        error!(exit_code = code, "Run aborted: {:#}", e);
    } else {
        error!(exit_code = code, "Command failed: {:#}", e);
    }
    code
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Nothing can be logged until the config is loaded
    let (config, guard) = match setup(&cli).await {
        Ok(ready) => ready,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            eprintln!("\nFor help, run: inbox-triage --help");
            process::exit(exit_code(&e));
        }
    };

    if let Err(e) = dispatch(&cli, &config).await {
        let code = log_failure(&e);
        eprintln!("\nFor help, run: inbox-triage --help");
        // process::exit skips destructors; flush the log file first
        drop(guard);
        process::exit(code);
    }
}

async fn setup(cli: &Cli) -> Result<(Config, Option<tracing_appender::non_blocking::WorkerGuard>)> {
    // Both aws-lc-rs and ring end up in the tree; pick one explicitly
    #[cfg(not(windows))]
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    #[cfg(windows)]
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    // init-config must work even when the existing config is broken
    let config = match cli.command {
        Commands::InitConfig { .. } => Config::default(),
        _ => Config::load(&cli.config).await?,
    };

    let guard = logging::init_tracing(&config.logging, cli.verbose)?;
    Ok((config, guard))
}

async fn dispatch(cli: &Cli, config: &Config) -> Result<()> {
    match &cli.command {
        Commands::Auth { force } => {
            tracing::info!("Authenticating with Gmail API...");
            let account = cli::authenticate(cli, *force).await?;

            println!("Successfully authenticated with Gmail API");
            println!("Token cached at: {:?}", cli.token_cache);
            println!("Connected to account: {}", account);
        }

        Commands::Run {
            rules,
            dry_run,
            limit,
            report,
        } => {
            if *dry_run || config.execution.dry_run {
                println!("Running in DRY RUN mode - no changes will be made");
            }

            let summary = cli::run_triage(
                cli,
                config,
                rules.as_deref(),
                *dry_run,
                *limit,
                report.as_deref(),
            )
            .await?;

            cli::print_summary(&summary);
        }

        Commands::Check { rules } => {
            let plans = cli::check_rules(config, rules.as_deref()).await?;
            print!("{}", cli::render_plan(&plans));
        }

        Commands::InitConfig { output, force } => {
            cli::init_config(output, *force).await?;

            println!("Created example configuration file at: {:?}", output);
            println!("\nKey settings to review:");
            println!("  - search.max_results: messages handled per rule (1-500)");
            println!("  - rules.source: rule set file or http(s) URL");
            println!("  - execution.dry_run: preview instead of changing labels");
            println!("  - logging.file: rotating log file");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn captured(e: &anyhow::Error) -> (i32, String) {
        let buffer = SharedBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let code = tracing::subscriber::with_default(subscriber, || log_failure(e));
        let output = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        (code, output)
    }

    #[test]
    fn test_fatal_failure_is_logged_with_exit_code_2() {
        let e = anyhow::Error::new(TriageError::ConfigurationFatal(
            "rule set http://host/rules.json returned 404".to_string(),
        ));

        let (code, output) = captured(&e);
        assert_eq!(code, 2);
        assert!(output.contains("ERROR"));
        assert!(output.contains("Run aborted"));
        assert!(output.contains("returned 404"));
    }

    #[test]
    fn test_other_failure_is_logged_with_exit_code_1() {
        let e = anyhow::Error::new(TriageError::AuthError("token expired".to_string()));

        let (code, output) = captured(&e);
        assert_eq!(code, 1);
        assert!(output.contains("Command failed"));
        assert!(output.contains("token expired"));
    }
}
