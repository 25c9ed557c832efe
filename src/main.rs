//! `profile-sync` binary entry point.

// crates.io
use clap::Parser;
// self
use profile_sync::{cli::Cli, obs};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let cli = Cli::parse();

	obs::init_tracing(cli.log_filter.as_deref());

	if let Err(e) = cli.run().await {
		tracing::error!(kind = %e.kind(), cause = %obs::ErrorChain(&e), "Run aborted.");

		return Err(e.into());
	}

	Ok(())
}
