use crate::service::command::{apply_command, DeviceCommand};
use crate::service::device::Device;
use crate::service::state::{MockError, State};

/// Apply a command to a device in the fixture file, as if it had
/// been posted to `/sensor/{deviceMac}/commands`, and print the
/// resulting device.
#[derive(clap::Parser, Debug)]
pub struct ApplyCommand {
    /// The device id, numeric id, name or display name
    key: String,

    /// The command, eg: `tune set power 01`
    #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
    command: Vec<String>,

    /// Write the updated catalog back to the fixture file
    #[arg(long)]
    save: bool,
}

impl ApplyCommand {
    /// Resolve the device, apply the command to a copy and commit it
    /// back through the handle it was resolved from.
    fn apply(&self, state: &State) -> anyhow::Result<Device> {
        let handle = state
            .find_by_key(&self.key)
            .ok_or_else(|| MockError::NotFound(self.key.clone()))?;

        let command = DeviceCommand::parse(&self.command.join(" "));
        let mut device = handle.device.clone();
        device.latest_data = apply_command(&device.latest_data, &command);
        log::info!("applying {command:?} to {device}");

        if !state.update(&handle, device.clone()) {
            anyhow::bail!(
                "{} changed while the command was being applied",
                handle.device
            );
        }
        Ok(device)
    }

    pub async fn run(&self, args: &crate::Args) -> anyhow::Result<()> {
        let fixtures = args.fixtures_path()?;
        let state = State::new();
        state.load(&fixtures)?;

        let device = self.apply(&state)?;
        println!("{}", serde_json::to_string_pretty(&device)?);

        if self.save {
            state.save(&fixtures)?;
            log::info!("Saved {} devices to {}", state.len(), fixtures.display());
        }

        Ok(())
    }
}
