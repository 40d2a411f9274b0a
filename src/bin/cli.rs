//! FlowDB CLI Client
//!
//! Command-line interface for interacting with a FlowDB server.

use clap::{Parser, Subcommand};
use flowdb::network::Client;
use flowdb::FlowError;

/// FlowDB CLI
#[derive(Parser, Debug)]
#[command(name = "flowdb-cli")]
#[command(about = "CLI for the FlowDB key-value store")]
#[command(version)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:5678")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Flush the server's active segment to disk
    Sync,

    /// Ping the server
    Ping,
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> flowdb::Result<()> {
    let mut client = Client::connect(args.server.as_str())?;

    match args.command {
        Commands::Get { key } => match client.get(key.as_bytes()) {
            Ok(value) => println!("{}", String::from_utf8_lossy(&value)),
            Err(FlowError::KeyNotFound) => println!("(nil)"),
            Err(e) => return Err(e),
        },
        Commands::Set { key, value } => {
            client.put(key.as_bytes(), value.as_bytes())?;
            println!("OK");
        }
        Commands::Sync => {
            client.sync()?;
            println!("OK");
        }
        Commands::Ping => {
            let reply = client.ping()?;
            println!("{}", String::from_utf8_lossy(&reply));
        }
    }
    Ok(())
}
