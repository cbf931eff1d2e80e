use std::env;

use innova_butler::setup;
use innova_butler::{Coordinator, GatewayClient, HvacMode, Preset, Thermostat};

const USAGE: &str = "usage: control <host[:port]> <device-uid> <temp <value>|on|off|mode <off|heat|cool>|preset <home|sleep|eco|boost>>";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let [host, uid, command, rest @ ..] = args.as_slice() else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };

    let client = GatewayClient::builder(host).build()?;
    let coordinator = setup::start(Coordinator::builder(client)).await?;

    let Some(thermostat) = Thermostat::all(&coordinator)
        .into_iter()
        .find(|t| t.uid() == uid)
    else {
        eprintln!("no device {uid} on {host}");
        std::process::exit(1);
    };

    match (command.as_str(), rest.first().map(String::as_str)) {
        ("temp", Some(value)) => thermostat.set_temperature(value.parse()?).await?,
        ("on", None) => thermostat.turn_on().await?,
        ("off", None) => thermostat.turn_off().await?,
        ("mode", Some(name)) => {
            let Some(mode) = HvacMode::from_name(name) else {
                eprintln!("unknown mode {name}");
                std::process::exit(2);
            };
            thermostat.set_hvac_mode(mode).await?
        }
        ("preset", Some(name)) => {
            let Some(preset) = Preset::from_name(name) else {
                eprintln!("unknown preset {name}");
                std::process::exit(2);
            };
            thermostat.set_preset(preset).await?
        }
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    }

    if let Some(device) = thermostat.device() {
        println!("{device:#?}");
    }
    Ok(())
}
