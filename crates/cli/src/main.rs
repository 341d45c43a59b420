use std::process::ExitCode;

fn main() -> ExitCode {
    gradedesk_cli::run()
}
