use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    reqscout::logging::init().context("init logging")?;

    let cli = reqscout::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        reqscout::cli::Command::Run(args) => {
            reqscout::pipeline::run(args).await.context("run")?;
        }
        reqscout::cli::Command::Cursor {
            command: reqscout::cli::CursorCommand::Show,
        } => {
            let config = reqscout::config::Config::from_env().context("load config")?;
            let cursor = reqscout::store::CursorStore::open(config.cursor_path())
                .await
                .context("open cursor")?;
            println!("{}", cursor.value());
        }
        reqscout::cli::Command::Session {
            command: reqscout::cli::SessionCommand::Set(args),
        } => {
            let token = args.mam_id.trim();
            if token.is_empty() {
                anyhow::bail!("mam_id must not be empty");
            }
            let config = reqscout::config::Config::from_env().context("load config")?;
            reqscout::store::SessionStore::new(config.session_path())
                .save(token)
                .await
                .context("session set")?;
            tracing::info!(path = %config.session_path().display(), "stored tracker session");
        }
    }

    Ok(())
}
