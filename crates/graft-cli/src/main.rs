//! Graft CLI - resumable rebases with continue and abort.

use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;
mod output;

use commands::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    output::set_quiet(cli.quiet);

    let result = match cli.command {
        Commands::Rebase {
            upstream,
            onto,
            branch,
            max_steps,
            force_rewrite,
            json,
            continue_,
            abort,
        } => commands::rebase::run(&commands::rebase::RebaseArgs {
            json,
            upstream: upstream.as_deref(),
            onto: onto.as_deref(),
            branch: branch.as_deref(),
            max_steps,
            force_rewrite,
            continue_,
            abort,
        }),
        Commands::Status { json } => commands::status::run(json),
        Commands::Completions { shell } => commands::completions::run(shell),
    };

    if let Err(e) = result {
        output::error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

/// Log to stderr. `GRAFT_LOG` takes an `EnvFilter` directive and wins over
/// `--verbose`.
fn init_tracing(verbose: bool) {
    let fallback = if verbose { "graft=debug,graft_core=debug,graft_git=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("GRAFT_LOG").unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}
