use clap::Parser;
use client::network::Client;
use log::{error, info};
use macroquad::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,

    /// Random extra delay per packet in milliseconds
    #[arg(short = 'j', long, default_value = "0")]
    jitter: u64,

    /// Window width
    #[arg(short = 'w', long, default_value = "800")]
    width: usize,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "600")]
    height: usize,
}

fn window_conf() -> Conf {
    let args = Args::parse();
    Conf {
        window_title: "Skirmish".to_string(),
        window_width: args.width as i32,
        window_height: args.height as i32,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Connecting to: {}", args.server);
    if args.fake_ping > 0 || args.jitter > 0 {
        info!(
            "Simulating {}ms latency with up to {}ms jitter",
            args.fake_ping, args.jitter
        );
    }
    info!("Controls: W/S or Up/Down to thrust, mouse to steer, Space or click to fire, E to open ports");

    let mut client = match Client::new(&args.server, args.fake_ping, args.jitter) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to start client: {}", e);
            return;
        }
    };

    if let Err(e) = client.run().await {
        error!("Client error: {}", e);
    }
}
