//! # TARMAC Relay Server
//!
//! Accepts drivers, runs the handshake, and relays car states.
//!
//! ## Usage
//!
//! ```bash
//! tarmac_server --config server.toml --port 2500 --level oval --tick-rate 60
//! ```

use std::process::ExitCode;
use std::time::Instant;

use tarmac_networking::{Server, ServerConfig, TcpServerTransport, TickLoop};
use tarmac_race::DirectoryLoader;

fn print_help() {
    println!("Usage: tarmac_server [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -c, --config <FILE>        TOML configuration file");
    println!("  -p, --port <PORT>          TCP port to bind (default: 2500)");
    println!("  -l, --level <ID>           Start a race on this level at boot");
    println!("  -t, --tick-rate <RATE>     Server loop rate in Hz (default: 60)");
    println!("  -h, --help                 Show this help");
}

/// Reads the config file first, then lets flags override it.
fn parse_args() -> Result<Option<ServerConfig>, String> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut config_path = None;
    let mut port: Option<u16> = None;
    let mut level = None;
    let mut tick_rate: Option<u32> = None;

    let mut i = 0;
    while i < args.len() {
        let value = args.get(i + 1);
        match (args[i].as_str(), value) {
            ("--config" | "-c", Some(v)) => config_path = Some(v.clone()),
            ("--port" | "-p", Some(v)) => port = Some(v.parse().map_err(|_| format!("invalid port `{v}`"))?),
            ("--level" | "-l", Some(v)) => level = Some(v.clone()),
            ("--tick-rate" | "-t", Some(v)) => {
                tick_rate = Some(v.parse().map_err(|_| format!("invalid tick rate `{v}`"))?);
            }
            ("--help" | "-h", _) => {
                print_help();
                return Ok(None);
            }
            (flag, _) => return Err(format!("unexpected argument `{flag}`")),
        }
        i += 2;
    }

    let mut config = match config_path {
        Some(path) => ServerConfig::from_toml_file(&path).map_err(|e| format!("{path}: {e}"))?,
        None => ServerConfig::default(),
    };
    if let Some(port) = port {
        let host = config.bind_address.rsplit_once(':').map_or("0.0.0.0", |(host, _)| host);
        config.bind_address = format!("{host}:{port}");
    }
    if level.is_some() {
        config.level = level;
    }
    if let Some(rate) = tick_rate {
        config.tick_rate = rate;
    }
    Ok(Some(config))
}

fn main() -> ExitCode {
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         TARMAC RELAY SERVER                                      ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let config = match parse_args() {
        Ok(Some(config)) => config,
        Ok(None) => return ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            print_help();
            return ExitCode::FAILURE;
        }
    };

    println!("┌─ CONFIGURATION ─────────────────────────────────────────────────┐");
    println!("│ Bind Address:       {}", config.bind_address);
    println!("│ Tick Rate:          {} Hz", config.tick_rate);
    println!("│ Max Clients:        {}", config.max_clients);
    println!("│ Level Directory:    {}", config.level_dir.display());
    println!("│ Level:              {}", config.level.as_deref().unwrap_or("(none)"));
    println!("│ Relay Race Start:   {}", config.relay_race_start);
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    let (transport, events, commands) = match TcpServerTransport::bind(config.bind_address.as_str(), config.max_clients) {
        Ok(bound) => bound,
        Err(e) => {
            eprintln!("error: cannot bind {}: {e}", config.bind_address);
            return ExitCode::FAILURE;
        }
    };

    let mut tick_loop = TickLoop::new(config.tick_rate);
    let boot_level = config.level.clone();
    let loader = Box::new(DirectoryLoader::new(config.level_dir.clone()));
    let mut server = Server::new(config, loader, events, commands);

    if let Some(level) = boot_level {
        if let Err(e) = server.start_race(&level) {
            eprintln!("error: cannot start race on `{level}`: {e}");
            return ExitCode::FAILURE;
        }
    }

    println!("Listening on {}", transport.local_addr());
    println!();

    let start = Instant::now();
    let mut last_report = 0u64;
    let report_interval = u64::from(server.config().tick_rate.max(1)) * 30;

    loop {
        tick_loop.wait_for_next_tick();

        while tick_loop.should_tick() {
            let tick_start = tick_loop.begin_tick();
            server.pump();
            tick_loop.end_tick(tick_start);

            let current_tick = tick_loop.tick_count();
            if current_tick - last_report >= report_interval {
                last_report = current_tick;
                let stats = tick_loop.stats();

                println!("┌─ SERVER STATUS (Tick {current_tick}) ────────────────────────────────────");
                println!("│ Uptime:             {:.1}s", start.elapsed().as_secs_f64());
                println!("│ Connections:        {}", server.connection_count());
                println!("│ Racers:             {}", server.race().player_count());
                println!("│ Avg Tick Time:      {} μs", stats.avg_tick_us);
                println!("│ Late Ticks:         {}", stats.late_ticks);
                #[cfg(feature = "stats")]
                {
                    let traffic = transport.stats();
                    println!("│ Frames In/Out:      {} / {}", traffic.frames_received, traffic.frames_sent);
                    println!("│ Bytes In/Out:       {} / {}", traffic.bytes_received, traffic.bytes_sent);
                    println!("│ Send Errors:        {}", traffic.send_errors);
                }
                println!("└──────────────────────────────────────────────────────────────────");
                println!();
            }
        }
    }
}
