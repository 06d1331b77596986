use bitrecover::cli::{commands, output, Cli};
use clap::Parser;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = commands::recover::execute(&cli) {
        output::error(&e.to_string());
        std::process::exit(1);
    }
}
