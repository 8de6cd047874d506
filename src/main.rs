use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;

mod commands;
mod fixtures;
mod service;

/// The tag stamped in by build.rs, or the crate version when
/// building outside of CI or a git checkout.
pub fn mock_version() -> &'static str {
    match env!("DUUX_MOCK_CI_TAG") {
        "" => env!("CARGO_PKG_VERSION"),
        tag => tag,
    }
}

#[derive(clap::Parser, Debug)]
#[command(version = mock_version())]
pub struct Args {
    /// The JSON fixture file holding the device catalog.
    /// If not passed here, it will be read from the
    /// DUUX_MOCK_FIXTURES environment variable, falling back
    /// to ./fixtures/devices.json
    #[arg(long, global = true)]
    fixtures: Option<PathBuf>,

    #[command(subcommand)]
    cmd: SubCommand,
}

impl Args {
    pub fn fixtures_path(&self) -> anyhow::Result<PathBuf> {
        match &self.fixtures {
            Some(path) => Ok(path.clone()),
            None => Ok(opt_env_var("DUUX_MOCK_FIXTURES")?
                .unwrap_or_else(|| PathBuf::from(fixtures::DEFAULT_FIXTURES_PATH))),
        }
    }
}

#[derive(clap::Parser, Debug)]
enum SubCommand {
    /// Run the mock HTTP API
    Serve(commands::serve::ServeCommand),
    /// Show the devices in the fixture file
    List(commands::list::ListCommand),
    /// Apply a command to a device in the fixture file
    Apply(commands::apply::ApplyCommand),
}

pub fn opt_env_var<T: FromStr>(name: &str) -> anyhow::Result<Option<T>>
where
    <T as FromStr>::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(p) => Ok(Some(
            p.parse()
                .map_err(|err| anyhow::anyhow!("parsing ${name}: {err:#}"))?,
        )),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(err) => anyhow::bail!("${name} is invalid: {err:#}"),
    }
}

fn setup_logger() {
    const DEFAULT_LOG_LEVEL: &str = "duux_mock=info";
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(DEFAULT_LOG_LEVEL),
    )
    .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    color_backtrace::install();
    if let Ok(path) = dotenvy::dotenv() {
        eprintln!("Loading environment overrides from {path:?}");
    }

    setup_logger();

    let args = Args::parse();
    match &args.cmd {
        SubCommand::Serve(cmd) => cmd.run(&args).await,
        SubCommand::List(cmd) => cmd.run(&args).await,
        SubCommand::Apply(cmd) => cmd.run(&args).await,
    }
}
