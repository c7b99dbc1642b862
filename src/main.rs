mod cli;

use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};
use worktree_container::commands::{
    self, create::CreateOptions, remove::RemoveOptions,
};
use worktree_container::Error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let json = cli.json;

    if let Err(err) = run(cli).await {
        std::process::exit(report_error(&err, json));
    }
}

async fn run(cli: Cli) -> Result<(), Error> {
    let json = cli.json;

    match cli.command {
        Commands::Create {
            branch,
            base,
            path,
            name,
            no_start,
        } => {
            commands::run_create(CreateOptions {
                branch,
                base,
                path,
                name,
                no_start,
                json,
            })
            .await
        }
        Commands::List { status } => commands::run_list(&status, json).await,
        Commands::Start { name } => commands::run_start(&name, json).await,
        Commands::Stop { name } => commands::run_stop(&name, json).await,
        Commands::Restart { name } => commands::run_restart(&name, json).await,
        Commands::Remove {
            name,
            force,
            keep_worktree,
        } => {
            commands::run_remove(RemoveOptions {
                name,
                force,
                keep_worktree,
                json,
            })
            .await
        }
        Commands::Doctor => commands::run_doctor().await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
            Ok(())
        }
    }
}

/// Print the error in the selected format and return its exit code.
/// Errors go to stderr in both modes; stdout is reserved for command
/// output.
fn report_error(err: &Error, json_mode: bool) -> i32 {
    if json_mode {
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&err.to_json()).unwrap_or_default()
        );
    } else {
        let message = err.to_string();
        eprintln!("Error: {message}");
        // Wrapping variants already render their cause; only print a
        // detail line when it adds something.
        if let Some(detail) = err.detail() {
            if !message.contains(&detail) {
                eprintln!("  {detail}");
            }
        }
    }
    err.exit_code()
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "worktree_container=debug,info"
    } else {
        "worktree_container=info,warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
