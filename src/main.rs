use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use proxy_fixture::util::absolute_path;
use proxy_fixture::{FixtureSettings, ProxyFixture, TaskData, GIT_REPO_DIRECTORY_ENV};
use serde_json::{json, Value};
use tokio::process::Command;

#[derive(Parser, Debug)]
#[command(name = "proxy-fixture", version, about)]
struct Cli {
    /// Settings file (defaults to ./proxy-fixture.toml when present)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the proxy fixture, run a command against it, then tear it down
    Run {
        /// JSON object merged into the shared test configuration
        #[arg(long, value_parser = parse_options, default_value = "{}")]
        options: Value,

        /// Command to run while the proxy server is up
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
    /// Start the proxy fixture and keep it up until Ctrl-C
    Up {
        /// JSON object merged into the shared test configuration
        #[arg(long, value_parser = parse_options, default_value = "{}")]
        options: Value,
    },
}

fn parse_options(raw: &str) -> Result<Value, String> {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err("options must be a JSON object".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    let cli = Cli::parse();
    let settings = FixtureSettings::load(cli.settings.as_deref())?;
    let mut fixture = ProxyFixture::new(settings)?;

    match cli.command {
        Commands::Run { options, command } => run(&mut fixture, &options, &command).await,
        Commands::Up { options } => up(&mut fixture, &options).await,
    }
}

/// Bring the fixture up; on failure release whatever was started
async fn start(fixture: &mut ProxyFixture, options: &Value) -> Result<TaskData> {
    let task = fixture.setup_proxy(options).await?;
    if let Err(e) = fixture.setup_proxy_test(&task).await {
        if let Err(cleanup) = fixture.teardown_proxy(&task).await {
            tracing::warn!(error = %cleanup, "Cleanup after failed setup also failed");
        }
        return Err(e).context("proxy fixture setup failed");
    }
    Ok(task)
}

async fn stop(fixture: &mut ProxyFixture, task: &TaskData) -> Result<()> {
    fixture.teardown_proxy_test(task).await?;
    fixture.teardown_proxy(task).await?;
    Ok(())
}

async fn run(fixture: &mut ProxyFixture, options: &Value, command: &[String]) -> Result<ExitCode> {
    let (program, args) = command.split_first().context("no command given")?;
    let task = start(fixture, options).await?;
    let proxy_url = fixture.config().proxy_url().unwrap_or_default().to_string();

    let status = match absolute_path(&task.temp_dir) {
        Ok(repo_dir) => Command::new(program)
            .args(args)
            .env("PROXY_URL", &proxy_url)
            .env(GIT_REPO_DIRECTORY_ENV, &repo_dir)
            .status()
            .await
            .with_context(|| format!("failed to run {program}")),
        Err(e) => Err(e.into()),
    };

    // Tear down regardless of how the command went
    stop(fixture, &task).await?;

    let status = status?;
    tracing::info!(?status, "Command finished");
    let code = status.code().unwrap_or(1);
    Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
}

async fn up(fixture: &mut ProxyFixture, options: &Value) -> Result<ExitCode> {
    let task = start(fixture, options).await?;

    let summary = json!({
        "tempDir": task.temp_dir,
        "proxyUrl": fixture.config().proxy_url(),
    });
    println!("{}", serde_json::to_string(&summary)?);

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    tracing::info!("Shutting down proxy fixture");

    stop(fixture, &task).await?;
    Ok(ExitCode::SUCCESS)
}
