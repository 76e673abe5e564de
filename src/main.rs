use clap::Parser;

use gdaip_lib::cli::{run, Cli};

fn main() {
    gdaip_lib::init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        tracing::error!(error = %e, "Command failed");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
