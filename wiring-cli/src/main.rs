use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    wiring_cli::run_main(std::env::args_os()).await
}
