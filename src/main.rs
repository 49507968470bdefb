#![deny(unsafe_code)]

//! ssd-linux-runtime CLI entry point.

use clap::Parser;

mod cli_app;

fn main() {
    let args = cli_app::Cli::parse();
    if let Err(e) = cli_app::run(&args) {
        eprintln!("ssd-linux-runtime: {e}");
        std::process::exit(1);
    }
}
