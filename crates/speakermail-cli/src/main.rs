use clap::Parser;
use speakermail_cli::{Cli, dispatch};
use speakermail_core::logging::{LoggingDestination, init_logging};
use speakermail_core::runtime::RunMode;

fn main() {
    if let Err(err) = init_logging(LoggingDestination::FileAndStderr) {
        eprintln!("Warning: {err}");
    }

    let cli = Cli::parse();
    match dispatch(cli) {
        Ok(summary) => match (summary.mode, summary.output_dir) {
            (RunMode::DryRun, Some(dir)) => println!(
                "Wrote {} message(s) to {}",
                summary.messages,
                dir.display()
            ),
            _ => println!("Sent {} message(s)", summary.messages),
        },
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    }
}
