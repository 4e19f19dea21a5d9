//! adaptive-rag binary entry point.

use std::io::{self, Write};
use std::process::ExitCode;

use adaptive_rag::cli::{Cli, execute};
use adaptive_rag::logging;
use clap::Parser;

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match execute(&cli) {
        Ok(output) => {
            if !output.is_empty() {
                let _ = writeln!(io::stdout(), "{output}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            let _ = writeln!(io::stderr(), "Error: {e}");
            ExitCode::FAILURE
        }
    }
}
