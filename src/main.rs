#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate rocket;
#[macro_use]
extern crate serde_derive;

mod admission;
mod api;
mod config;
mod errors;
mod key_types;
mod keygen;
mod protocol;
mod timestamp;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use log::error;

/// Signs "hash|time" attestations with the server's P-256 key.
#[derive(Parser, Debug)]
#[command(name = "timestamper", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service (the default)
    Serve,

    /// Create a signing key: the public half goes to a file, the private
    /// half to stdout
    Keygen {
        /// Where to write the public key PEM
        #[arg(long, default_value = "public/public_key.pem")]
        public_out: PathBuf,

        /// Replace an existing public key file
        #[arg(long)]
        force: bool,
    },
}

#[rocket::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            if let Err(e) = api::setup_rocket(config::figment()).launch().await {
                let reason = e.kind().to_string();
                error!("server stopped: {}", reason);
                eprintln!("timestamper: {}", reason);
                process::exit(1);
            }
        }
        Command::Keygen { public_out, force } => {
            if let Err(e) = keygen::run(&public_out, force) {
                eprintln!("timestamper keygen: {}", e.render_chain());
                process::exit(1);
            }
        }
    }
}
