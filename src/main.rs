pub mod models {
    pub mod appliance;
}

pub mod cli;
pub mod config;
pub mod db {
    pub mod memory;
    pub mod models;
    pub mod sqlite;
    pub mod storage;
}
pub mod error;
pub mod schema;
pub mod utils;
pub mod services {
    pub mod appliances;
    pub mod chart;
    pub mod consumption;
    pub mod settings;
    pub mod validation;
}

use crate::cli::{Cli, Command, Output};
use crate::config::Config;
use crate::db::storage;
use crate::error::ServiceError;
use crate::services::appliances::ApplianceRepository;
use log::{info, warn};
use std::path::{Path, PathBuf};

#[derive(Debug)]
struct LoadedEnvFile {
    path: PathBuf,
    explicit: bool,
}

/// How a run ended, once the logger is up.
enum Failure {
    Fatal(String),
    Service(ServiceError),
}

impl From<String> for Failure {
    fn from(value: String) -> Self {
        Failure::Fatal(value)
    }
}

impl From<ServiceError> for Failure {
    fn from(value: ServiceError) -> Self {
        Failure::Service(value)
    }
}

fn print_output(output: Output) -> Result<(), String> {
    match output {
        Output::Json(value) => {
            let text = serde_json::to_string_pretty(&value).map_err(|e| format!("encoding output failed: {}", e))?;
            println!("{}", text);
        }
        Output::Text(text) => print!("{}", text),
    }
    Ok(())
}

fn run(command: &Command) -> Result<(), Failure> {
    if *command == Command::Help {
        println!("{}", cli::USAGE);
        return Ok(());
    }

    // 1) Load config
    let cfg = Config::from_env()?;
    info!(
        "Config loaded (storage_backend={}, database_url={})",
        cfg.storage_backend.as_str(),
        cfg.database_url
    );

    // 2) Open storage (migrations run here for SQLite)
    let store = storage::open(cfg.storage_backend, &cfg.database_url)
        .map_err(|e| format!("opening {} storage failed: {}", cfg.storage_backend.as_str(), e))?;
    let mut repo = ApplianceRepository::new(store);
    info!("Storage ready ({})", repo.storage().backend().as_str());

    // 3) Execute, then release storage whatever the outcome
    let result = cli::execute(command, &mut repo);
    if let Err(e) = repo.close() {
        warn!("Closing storage failed: {}", e);
    }

    print_output(result?)?;
    Ok(())
}

fn load_env_file(env_file: Option<PathBuf>) -> Result<Option<LoadedEnvFile>, String> {
    if let Some(path) = env_file {
        if !path.is_file() {
            return Err(format!("env file not found: {}", path.display()));
        }
        load_from(&path)?;
        Ok(Some(LoadedEnvFile { path, explicit: true }))
    } else {
        let cwd = std::env::current_dir().map_err(|e| format!("unable to read current directory: {}", e))?;
        let default_path = cwd.join(".env");
        if default_path.is_file() {
            load_from(&default_path)?;
            Ok(Some(LoadedEnvFile {
                path: default_path,
                explicit: false,
            }))
        } else {
            Ok(None)
        }
    }
}

// Values already in the process environment win over the file.
fn load_from(path: &Path) -> Result<(), String> {
    dotenvy::from_path(path).map_err(|e| format!("failed to load {}: {}", path.display(), e))
}

fn main() {
    let cli = match Cli::parse(std::env::args().skip(1)) {
        Ok(cli) => cli,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };
    let loaded_env = match load_env_file(cli.env_file.clone()) {
        Ok(info) => info,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };

    // Init logging after environment so RUST_LOG from .env is respected.
    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    if let Some(info) = loaded_env.as_ref() {
        let origin = if info.explicit { "CLI-specified" } else { "default" };
        info!("Environment loaded from {} .env file: {}", origin, info.path.display());
    }

    info!(
        "household-power {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );
    match run(&cli.command) {
        Ok(()) => {}
        Err(Failure::Fatal(e)) => {
            eprintln!("fatal: {}", e);
            std::process::exit(1);
        }
        Err(Failure::Service(e)) => {
            warn!("{}", e);
            match serde_json::to_string_pretty(&e) {
                Ok(payload) => println!("{}", payload),
                Err(_) => println!("{{\"error\":\"{}\",\"message\":\"{}\"}}", e.error, e.message),
            }
            std::process::exit(1);
        }
    }
}
