use std::env;

use innova_butler::setup::{self, SetupError};
use innova_butler::{Coordinator, GatewayClient, Thermostat};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let Some(host) = args.get(1) else {
        eprintln!("usage: monitor <host[:port]> [--https]");
        std::process::exit(2);
    };
    let use_https = args.iter().any(|a| a == "--https");

    let mut builder = GatewayClient::builder(host);
    if use_https {
        builder = builder.protocol("https");
    }

    println!("Checking {host}...");
    let mut probe = builder.build()?;
    match setup::validate(&mut probe).await {
        Ok(summary) => println!("{}: {} device(s)", summary.title, summary.device_count),
        Err(SetupError::NoDevices) => {
            eprintln!("gateway answered but reported no devices");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    let coordinator = setup::start(
        Coordinator::builder(probe)
            .on_event(|event| println!("{event:?}"))
            .on_snapshot(|devices| {
                for d in devices {
                    println!(
                        "[{}] {} | room {:?} | set {:?} | {} | {}",
                        d.room,
                        d.name,
                        d.temp_room,
                        d.temp_set,
                        d.hvac_mode(),
                        if d.connected { "online" } else { "offline" },
                    );
                }
            }),
    )
    .await?;

    for t in Thermostat::all(&coordinator) {
        println!("{} -> {}", t.uid(), t.unique_id());
    }

    println!("Polling every {:?}, ctrl-c to stop", coordinator.interval());
    coordinator
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;
    Ok(())
}
