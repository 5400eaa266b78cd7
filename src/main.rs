use clap::Parser;
use sagewatch::cli::{init_logging, run_cli, Cli};
use sagewatch::display::print_error;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run_cli(cli).await {
        Ok(()) => {}
        Err(e) => {
            print_error(&format!("Error: {}", e));
            std::process::exit(e.exit_code());
        }
    }
}
