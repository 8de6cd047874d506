use crate::service::state::State;

#[derive(clap::Parser, Debug)]
pub struct ListCommand {
    /// Show the devices as they would be reported with force_tcp=1
    #[arg(long)]
    force_tcp: bool,
}

impl ListCommand {
    pub async fn run(&self, args: &crate::Args) -> anyhow::Result<()> {
        let state = State::new();
        state.load(&args.fixtures_path()?)?;

        let devices = if self.force_tcp {
            state.snapshot_with(|d| d.simulate_tcp_only())
        } else {
            state.snapshot()
        };

        for d in devices {
            println!(
                "{id:<6} {device_id:<17} {kind:<12} {conn:<5} {online:<7} {name} ({display})",
                id = d.id,
                device_id = d.device_id,
                kind = d.kind,
                conn = d.connection_type,
                online = if d.online { "online" } else { "offline" },
                name = d.name,
                display = d.display_name,
            );
            match &d.latest_data.full_data {
                Some(full) => println!("       fullData: {}", full.as_str()),
                None => println!("       fullData: null"),
            }
        }

        Ok(())
    }
}
