fn main() -> std::process::ExitCode {
    subscriber_dashboard_lib::run()
}
