mod service;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    service::telemetry::init_tracing();
    let args: Vec<String> = std::env::args().collect();
    let config = service::ServiceConfig::from_args(&args)?;
    let credentials = service::Credentials::from_env()?;
    service::run(config, credentials)
}
