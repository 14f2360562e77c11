use clap::Parser;
use log::info;
use rcon::{RconConfig, RconConnection};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// RCON address of the server
    #[arg(short = 'a', long, default_value = "127.0.0.1:27015")]
    address: String,

    /// rcon_password of the server
    #[arg(short = 'p', long, env = "RCON_PASSWORD")]
    password: String,

    /// Print the connected players as JSON instead of running a command
    #[arg(long)]
    players: bool,

    /// Command to run, e.g. `status` or `mp_timelimit 30`
    #[arg(trailing_var_arg = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Connecting to: {}", args.address);
    let config = RconConfig::new(&args.address, &args.password);
    let mut conn = RconConnection::from_config(&config).await?;

    if args.players {
        let players = conn.list_players().await?;
        println!("{}", serde_json::to_string_pretty(&players)?);
    } else if !args.command.is_empty() {
        let response = conn.send(&args.command.join(" ")).await?;
        print!("{}", response);
    } else {
        eprintln!("Nothing to do: pass a command or --players");
    }

    conn.close().await;

    Ok(())
}
