use std::env;

use archusb::iso::{self, cli::ISO_USAGE, interactive};
use archusb::logging;
use archusb::paths;

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();

    if args.iter().any(|a| a == "-h" || a == "--help") {
        print!("{}", ISO_USAGE);
        return;
    }

    if let Err(e) = logging::init(&paths::LOG_FILE) {
        eprintln!("Warning: {:#}", e);
    }

    let cli_mode = args.iter().any(|a| a == "--cli");

    let result = if cli_mode {
        let rest: Vec<String> = args.into_iter().filter(|a| a != "--cli").collect();
        match iso::cli::parse(&rest) {
            Ok(request) => iso::build(&request).map(|artifacts| {
                println!("\nDone:");
                for artifact in artifacts {
                    println!("  {}", artifact.display());
                }
            }),
            Err(e) => {
                eprintln!("Error: {}\n", e);
                print!("{}", ISO_USAGE);
                std::process::exit(1);
            }
        }
    } else {
        interactive::run()
    };

    if let Err(e) = result {
        eprintln!("\nError: {:#}", e);
        std::process::exit(1);
    }
}
