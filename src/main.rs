use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use env_logger::Env;
use log::info;

use energy_telemetry_node::cli::commands::{build_node, handle_subcommands};
use energy_telemetry_node::{Config, ConsoleFormatter, NodeRuntime, RecordFormatter, VERSION};

fn cli() -> Command {
    Command::new("energy-node")
        .version(VERSION)
        .about("Three-phase energy telemetry node")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .global(true)
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .global(true)
                .help("Serial port of the meter"),
        )
        .arg(Arg::new("baud").long("baud").global(true).help("Baud rate"))
        .arg(
            Arg::new("address")
                .long("address")
                .global(true)
                .help("Modbus address of the meter"),
        )
        .arg(
            Arg::new("interval")
                .long("interval")
                .global(true)
                .help("Default measurement interval in seconds"),
        )
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .global(true)
                .help("Directory for permanent files"),
        )
        .arg(
            Arg::new("simulate")
                .long("simulate")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Use a simulated meter instead of the serial port"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Debug logging"),
        )
        .subcommand(Command::new("run").about("Run the node until Ctrl-C (default)"))
        .subcommand(
            Command::new("measure")
                .about("Run one measurement cycle and print the record")
                .arg(format_arg()),
        )
        .subcommand(
            Command::new("init-config")
                .about("Write a default configuration file")
                .arg(Arg::new("path").required(true)),
        )
        .subcommand(Command::new("show-config").about("Print the effective configuration"))
        .subcommand(
            Command::new("decode")
                .about("Decode a hex-encoded file payload")
                .arg(Arg::new("file-id").required(true).help("51, 52, 61 or 62"))
                .arg(Arg::new("hex").required(true))
                .arg(format_arg()),
        )
}

fn format_arg() -> Arg {
    Arg::new("format")
        .short('f')
        .long("format")
        .value_parser(["console", "json"])
        .default_value("console")
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level))
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_logging(matches.get_flag("verbose"));

    let config = Config::from_matches(&matches)?;
    if handle_subcommands(&matches, &config)? {
        return Ok(());
    }

    info!("🖥️  {} v{}", config.node.name, VERSION);
    let (mut node, events) = build_node(&config, matches.get_flag("simulate"))?;
    node.start();
    let node = NodeRuntime::new(node, events).run().await?;
    println!("{}", ConsoleFormatter.format_network_quality(&node.network_quality()));
    info!("👋 Node stopped");
    Ok(())
}
