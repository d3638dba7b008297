use std::process::ExitCode;

fn main() -> ExitCode {
    rollbot_cli::run()
}
