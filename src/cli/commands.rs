use anyhow::{bail, Context};
use clap::ArgMatches;
use log::info;
use tokio::sync::mpsc::{self, UnboundedReceiver};

use crate::config::Config;
use crate::devices::power_meter::populate_demo_meter;
use crate::modbus::{RegisterTransport, SimulatedMeter};
use crate::output::{
    ConsoleFormatter, JsonFormatter, LinkEvent, LogIndicator, LoopbackLink, RecordFormatter,
};
use crate::services::TelemetryNode;
use crate::storage::models::{
    ButtonConfigFile, ButtonFile, EnergyConfigFile, EnergyFile, FileId, Record,
    BUTTON_CONFIG_FILE_ID, BUTTON_FILE_ID, ENERGY_CONFIG_FILE_ID, ENERGY_FILE_ID,
};
use crate::storage::store::{FileStore, MemoryStore};

pub fn build_node(
    config: &Config,
    simulate: bool,
) -> anyhow::Result<(TelemetryNode, UnboundedReceiver<LinkEvent>)> {
    let transport = open_transport(config, simulate)?;
    let store: Box<dyn FileStore> = match &config.storage.persistence_dir {
        Some(dir) => {
            info!("💾 Persisting permanent files in {}", dir.display());
            Box::new(MemoryStore::with_persistence(dir)?)
        }
        None => Box::new(MemoryStore::new()),
    };
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let node = TelemetryNode::new(
        config,
        transport,
        Box::new(LoopbackLink::new(events_tx)),
        Box::new(LogIndicator),
        store,
    )?;
    Ok((node, events_rx))
}

fn open_transport(config: &Config, simulate: bool) -> anyhow::Result<Box<dyn RegisterTransport>> {
    if simulate {
        info!("🧪 Using simulated meter at address {}", config.meter.device_address);
        let meter = SimulatedMeter::new(config.meter.device_address);
        populate_demo_meter(&meter, &config.meter.registers, config.meter.word_order);
        return Ok(Box::new(meter));
    }

    #[cfg(feature = "serial")]
    return Ok(Box::new(crate::modbus::RtuClient::open(&config.meter)?));

    #[cfg(not(feature = "serial"))]
    bail!("built without serial support, use --simulate");
}

fn formatter_for(matches: &ArgMatches) -> Box<dyn RecordFormatter> {
    match matches.get_one::<String>("format").map(String::as_str) {
        Some("json") => Box::new(JsonFormatter),
        _ => Box::new(ConsoleFormatter),
    }
}

/// Runs one-shot subcommands. Returns false when the node should run.
pub fn handle_subcommands(matches: &ArgMatches, config: &Config) -> anyhow::Result<bool> {
    let simulate = matches.get_flag("simulate");

    if let Some(matches) = matches.subcommand_matches("measure") {
        info!("🔍 Executing measure command...");
        let formatter = formatter_for(matches);
        // the loopback link needs a live receiver
        let (mut node, _events) = build_node(config, simulate)?;
        let record = node
            .measure_once()
            .context("measurement cycle did not complete")?;
        for outcome in node.measurement().last_phase_outcomes() {
            info!(
                "{} {}: {} attempt(s)",
                if outcome.success { "✅" } else { "❌" },
                outcome.quantity,
                outcome.attempts
            );
        }
        println!("{}", formatter.format_energy(&record));
        return Ok(true);
    }

    if let Some(matches) = matches.subcommand_matches("init-config") {
        let path = matches
            .get_one::<String>("path")
            .context("missing config path")?;
        Config::default().save_to_file(path)?;
        println!("✅ Wrote default configuration to {}", path);
        return Ok(true);
    }

    if matches.subcommand_matches("show-config").is_some() {
        print!("{}", toml::to_string_pretty(config)?);
        return Ok(true);
    }

    if let Some(matches) = matches.subcommand_matches("decode") {
        let id: FileId = matches
            .get_one::<String>("file-id")
            .context("missing file id")?
            .parse()
            .context("file id must be a number between 0 and 255")?;
        let data = matches.get_one::<String>("hex").context("missing data")?;
        let bytes = hex::decode(data.trim()).context("data is not valid hex")?;
        let formatter = formatter_for(matches);

        let text = match id {
            ENERGY_FILE_ID => formatter.format_energy(&EnergyFile::decode(&bytes)?),
            ENERGY_CONFIG_FILE_ID => {
                formatter.format_energy_config(&EnergyConfigFile::decode(&bytes)?)
            }
            BUTTON_FILE_ID => formatter.format_button(&ButtonFile::decode(&bytes)?),
            BUTTON_CONFIG_FILE_ID => {
                formatter.format_button_config(&ButtonConfigFile::decode(&bytes)?)
            }
            other => bail!("unknown file id {}", other),
        };
        println!("{}", text);
        return Ok(true);
    }

    Ok(false)
}
