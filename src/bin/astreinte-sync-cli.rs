#![forbid(unsafe_code)]
use anyhow::Result;
use astreinte_sync::{load_config, HttpClient, Provisioner};
use clap::Parser;
use tracing_subscriber::{fmt::Subscriber, EnvFilter};

/// Provisionne équipes, utilisateurs et gardes dans Oncall depuis un YAML
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Fichier YAML déclaratif (équipes et utilisateurs)
    config: String,

    /// hôte:port de l'API Oncall (ex : localhost:8080)
    host: String,

    /// Compte de session API
    #[arg(long, default_value = "root")]
    username: String,

    #[arg(long, default_value = "root")]
    password: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let _ = Subscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    let config = load_config(&cli.config)?;
    let client = HttpClient::new(format!("http://{}", cli.host))?;
    let provisioner = Provisioner::new(client);
    let report = provisioner.run(&config, &cli.username, &cli.password)?;

    println!(
        "teams: {} created, {} existing | users: {} created, {} existing | events: {} created, {} skipped",
        report.teams_created,
        report.teams_existing,
        report.users_created,
        report.users_existing,
        report.events_created,
        report.events_skipped
    );

    let code = if report.is_clean() {
        0
    } else {
        for failure in &report.duty_failures {
            eprintln!(
                "duty dropped: {} {} ({})",
                failure.user, failure.date, failure.reason
            );
        }
        // Code 2 = WARNING/INCOMPLETE
        2
    };
    std::process::exit(code);
}
