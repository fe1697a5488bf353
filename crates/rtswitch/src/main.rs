mod app;
mod cli;
mod error;
mod logging;
mod menu;
mod report;
mod settings;
mod single_instance;

use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use clap::Parser;
use log::{error, warn};
use rtswitch_env::EnvironmentSynchronizer;
use rtswitch_platform::{AppPaths, SystemEnvStore};
use rtswitch_scoop::ScoopProvider;

use crate::app::App;
use crate::cli::Cli;
use crate::error::AppError;
use crate::menu::Menu;
use crate::settings::Settings;
use crate::single_instance::SingleInstance;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut settings = Settings::load();
    if let Some(root) = cli.scoop_root.clone() {
        settings.scoop_root = Some(root);
    }
    logging::init_logging(
        cli.debug || settings.debug_logging,
        settings.max_log_size_bytes,
    );

    let mut menu = Menu::new(io::stdin().lock(), io::stdout());
    match run(cli, settings, &mut menu).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            eprintln!("rtswitch: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}

async fn run<R: BufRead, W: Write>(
    cli: Cli,
    settings: Settings,
    menu: &mut Menu<R, W>,
) -> Result<(), AppError> {
    let _instance = SingleInstance::acquire()?;

    let env = SystemEnvStore::new(AppPaths::new()?.environment_file());
    if let Err(err) = EnvironmentSynchronizer::new(&env).refresh() {
        warn!("Could not refresh the process environment: {err}");
    }

    let mut provider = ScoopProvider::new();
    if let Some(root) = settings.scoop_root.clone() {
        provider = provider.with_root(root);
    }

    let mut app = App::new(settings, Box::new(provider), Box::new(env));
    match cli.command {
        Some(command) => app.run(command.into(), menu).await,
        None => app.interactive(menu).await,
    }
}
