// src/main.rs

use magpipe::{cli, logging, run};

#[tokio::main]
async fn main() {
    let args = cli::parse();

    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("magpipe error: {err:?}");
        std::process::exit(2);
    }

    match run(args).await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("magpipe error: {err}");
            // Graph-build/config failures are distinguishable from execution
            // failures by exit code.
            let code = if err.is_build_error() { 2 } else { 1 };
            std::process::exit(code);
        }
    }
}
