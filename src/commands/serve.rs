use crate::service::http::run_http_server;
use crate::service::state::State;
use std::sync::Arc;

const DEFAULT_PORT: u16 = 3000;

#[derive(clap::Parser, Debug)]
pub struct ServeCommand {
    /// The port on which the mock API will listen.
    /// If not passed here, it will be read from the PORT
    /// environment variable, falling back to 3000.
    #[arg(long)]
    port: Option<u16>,
}

impl ServeCommand {
    fn port(&self) -> anyhow::Result<u16> {
        match self.port {
            Some(port) => Ok(port),
            None => Ok(crate::opt_env_var("PORT")?.unwrap_or(DEFAULT_PORT)),
        }
    }

    pub async fn run(&self, args: &crate::Args) -> anyhow::Result<()> {
        log::info!("Starting mock Duux server. version {}", crate::mock_version());
        let port = self.port()?;
        let state = Arc::new(State::new());

        let fixtures = args.fixtures_path()?;
        match state.load(&fixtures) {
            Ok(count) => log::info!("Loaded {count} devices from {}", fixtures.display()),
            Err(err) => {
                // Keep going with an empty catalog; the client under test
                // will simply see no devices.
                log::warn!("{err:#}");
            }
        }

        if state.is_empty() {
            log::warn!("No devices are loaded; /smarthome/sensors will be empty");
        }
        for device in state.snapshot() {
            log::info!("{device}");
            log::trace!("{device:#?}");
        }

        run_http_server(state, port).await
    }
}
