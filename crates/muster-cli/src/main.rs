use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use contracts::{EngineConfig, Location};
use muster_core::oracle::{HeuristicOracle, InterpretationOracle};
use muster_core::{now_ms, Runtime};
use tracing_subscriber::EnvFilter;

fn print_usage() {
    println!("muster <command>");
    println!("commands:");
    println!("  serve [addr]");
    println!("    run the engine with the default fleet and the http surface");
    println!("    default addr: 127.0.0.1:8080");
    println!("  demo [seed] [seconds]");
    println!("    run a self-contained scenario and print the outcome");
    println!("    defaults: seed from the clock, 30 seconds");
    println!("  report <text...>");
    println!("    interpret a free-text report offline and print the result");
}

fn parse_socket_addr(value: Option<&String>) -> Result<SocketAddr, String> {
    let raw = value.map(String::as_str).unwrap_or("127.0.0.1:8080");
    raw.parse::<SocketAddr>()
        .map_err(|_| format!("invalid addr: {raw}"))
}

fn parse_u64(value: Option<&String>, label: &str, default: u64) -> Result<u64, String> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|_| format!("invalid {label}: {raw}")),
    }
}

async fn cmd_serve(args: &[String]) -> Result<(), String> {
    let addr = parse_socket_addr(args.first())?;
    let runtime = Runtime::new(EngineConfig::default());
    runtime.spawn_fleet(now_ms());

    muster_api::serve(addr, runtime)
        .await
        .map_err(|err| err.to_string())
}

async fn cmd_demo(args: &[String]) -> Result<(), String> {
    let seed = parse_u64(args.first(), "seed", now_ms())?;
    let seconds = parse_u64(args.get(1), "seconds", 30)?;

    let mut config = EngineConfig::default();
    config.bid_window_ms = 1_000;
    config.cycle_period_ms = 250;
    config.scout_period_ms = 500;

    let runtime = Runtime::new(config);
    runtime.spawn_fleet(seed);

    // One reported incident up front; the scouts surface the rest.
    runtime
        .submit_report(
            "fire with heavy smoke near the market square",
            Location::new(35.0, 45.0),
        )
        .map_err(|err| err.to_string())?;

    println!("running demo for {seconds}s with seed {seed}...");
    tokio::time::sleep(Duration::from_secs(seconds)).await;

    print_summary(&runtime);
    runtime.shutdown();
    Ok(())
}

fn cmd_report(args: &[String]) -> Result<(), String> {
    if args.is_empty() {
        return Err("missing report text".to_string());
    }
    let text = args.join(" ");

    let oracle = HeuristicOracle::new();
    match oracle
        .interpret_report(&text, Location::new(50.0, 50.0))
        .map_err(|err| err.to_string())?
    {
        Some(draft) => {
            let rendered =
                serde_json::to_string_pretty(&draft).map_err(|err| err.to_string())?;
            println!("{rendered}");
            Ok(())
        }
        None => Err("report did not describe an actionable incident".to_string()),
    }
}

fn print_summary(runtime: &Runtime) {
    let snapshot = runtime.board().snapshot();

    println!();
    println!("incidents ({}):", snapshot.incidents.len());
    for record in snapshot.incidents.values() {
        println!(
            "  {} {:?}/{:?} at ({:.1}, {:.1}) -> {:?} assigned={:?}",
            record.incident_id,
            record.kind,
            record.severity,
            record.location.x,
            record.location.y,
            record.status,
            record.assigned_units,
        );
    }

    println!("units ({}):", snapshot.units.len());
    for unit in snapshot.units.values() {
        println!(
            "  {} {:?} {:?} at ({:.1}, {:.1}) fuel={:.2} incident={:?}",
            unit.unit_id,
            unit.kind,
            unit.status,
            unit.location.x,
            unit.location.y,
            unit.fuel_level,
            unit.current_incident,
        );
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = args.first() else {
        print_usage();
        std::process::exit(2);
    };

    let result = match command.as_str() {
        "serve" => cmd_serve(&args[1..]).await,
        "demo" => cmd_demo(&args[1..]).await,
        "report" => cmd_report(&args[1..]),
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => Err(format!("unknown command: {other}")),
    };

    if let Err(message) = result {
        eprintln!("error: {message}");
        print_usage();
        std::process::exit(2);
    }
}
