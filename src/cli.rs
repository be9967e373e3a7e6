//! Command-line surface: argument parsing and dispatch onto the services.
//!
//! Parsing only shapes arguments. Ids, rates and JSON bodies are handed to
//! the services as text so their checks produce the usual error payloads.

use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

use crate::error::{ErrorKind, ServiceError};
use crate::models::appliance::ApplianceDraft;
use crate::services::appliances::ApplianceRepository;
use crate::services::chart::{ChartMode, ChartSeries};
use crate::services::consumption::{ConsumptionEngine, CostOptions};
use crate::services::settings::Settings;
use crate::services::validation::Mode;

pub const USAGE: &str = "\
usage: household-power [--env-file <path>] <command>

commands:
  list                                  all appliances with estimates
  show <id>                             one appliance with estimates
  add --json <object>                   create an appliance
  update <id> --json <object>           change some fields of an appliance
  delete <id>                           remove an appliance
  daily <id> | weekly <id> | monthly <id>
                                        consumption for one appliance
  total                                 household daily total with breakdown
  cost <id> [--rate <per-kwh>]          cost estimate (default: stored rate)
  chart-data <daily|weekly|breakdown> [--csv]
                                        chart records for a render mode
  settings                              list preferences
  settings get <key>
  settings set <key> <value>
  help";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    List,
    Show { id: String },
    Add { json: String },
    Update { id: String, json: String },
    Delete { id: String },
    Daily { id: String },
    Weekly { id: String },
    Monthly { id: String },
    Total,
    Cost { id: String, rate: Option<String> },
    ChartData { mode: String, csv: bool },
    Settings,
    SettingsGet { key: String },
    SettingsSet { key: String, value: String },
    Help,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cli {
    pub env_file: Option<PathBuf>,
    pub command: Command,
}

/// What a successful command prints.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Json(Value),
    Text(String),
}

fn take_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String, String> {
    args.next().ok_or_else(|| format!("`{}` requires a value", flag))
}

fn positional(rest: &[String], index: usize, what: &str, command: &str) -> Result<String, String> {
    rest.get(index)
        .cloned()
        .ok_or_else(|| format!("`{}` requires {}", command, what))
}

impl Cli {
    /// Parse arguments, program name excluded.
    pub fn parse(args: impl IntoIterator<Item = String>) -> Result<Cli, String> {
        let mut args = args.into_iter();
        let mut env_file: Option<PathBuf> = None;
        let mut json: Option<String> = None;
        let mut rate: Option<String> = None;
        let mut csv = false;
        let mut rest: Vec<String> = Vec::new();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--env-file" => {
                    if env_file.is_some() {
                        return Err("`--env-file` provided more than once".to_string());
                    }
                    env_file = Some(PathBuf::from(take_value(&mut args, "--env-file")?));
                }
                s if s.starts_with("--env-file=") => {
                    if env_file.is_some() {
                        return Err("`--env-file` provided more than once".to_string());
                    }
                    let path = &s["--env-file=".len()..];
                    if path.is_empty() {
                        return Err("`--env-file` requires a value".to_string());
                    }
                    env_file = Some(PathBuf::from(path));
                }
                "--json" => json = Some(take_value(&mut args, "--json")?),
                "--rate" => rate = Some(take_value(&mut args, "--rate")?),
                "--csv" => csv = true,
                "-h" | "--help" => rest.insert(0, "help".to_string()),
                s if s.starts_with("--") => return Err(format!("unrecognised argument: {}", s)),
                other => rest.push(other.to_string()),
            }
        }

        let Some((name, rest)) = rest.split_first() else {
            return Err(format!("missing command\n\n{}", USAGE));
        };
        let command = match name.as_str() {
            "list" => Command::List,
            "show" => Command::Show {
                id: positional(rest, 0, "an appliance id", name)?,
            },
            "add" => Command::Add {
                json: json.take().ok_or("`add` requires --json <object>")?,
            },
            "update" => Command::Update {
                id: positional(rest, 0, "an appliance id", name)?,
                json: json.take().ok_or("`update` requires --json <object>")?,
            },
            "delete" => Command::Delete {
                id: positional(rest, 0, "an appliance id", name)?,
            },
            "daily" => Command::Daily {
                id: positional(rest, 0, "an appliance id", name)?,
            },
            "weekly" => Command::Weekly {
                id: positional(rest, 0, "an appliance id", name)?,
            },
            "monthly" => Command::Monthly {
                id: positional(rest, 0, "an appliance id", name)?,
            },
            "total" => Command::Total,
            "cost" => Command::Cost {
                id: positional(rest, 0, "an appliance id", name)?,
                rate: rate.take(),
            },
            "chart-data" => Command::ChartData {
                mode: positional(rest, 0, "a mode (daily, weekly or breakdown)", name)?,
                csv,
            },
            "settings" => match rest.first().map(String::as_str) {
                None => Command::Settings,
                Some("get") => Command::SettingsGet {
                    key: positional(rest, 1, "a key", "settings get")?,
                },
                Some("set") => Command::SettingsSet {
                    key: positional(rest, 1, "a key", "settings set")?,
                    value: positional(rest, 2, "a value", "settings set")?,
                },
                Some(other) => return Err(format!("unknown settings action: {}", other)),
            },
            "help" => Command::Help,
            other => return Err(format!("unknown command: {}\n\n{}", other, USAGE)),
        };

        if json.is_some() || rate.is_some() {
            return Err(format!("option not accepted by `{}`", name));
        }
        Ok(Cli { env_file, command })
    }
}

fn to_json(value: &impl Serialize) -> Result<Output, ServiceError> {
    serde_json::to_value(value).map(Output::Json).map_err(|e| ServiceError {
        error: ErrorKind::CalculationError,
        message: "Failed to encode result".to_string(),
        field: None,
        details: Some(Value::String(e.to_string())),
        id: None,
    })
}

fn parse_body(json: &str, mode: Mode) -> Result<ApplianceDraft, ServiceError> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| ServiceError::validation("body", format!("Request body must be valid JSON: {}", e)))?;
    ApplianceDraft::from_json(&value, mode)
}

fn parse_rate(raw: &str) -> Result<f64, ServiceError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| ServiceError::validation("rate_per_kwh", "Rate per kWh must be positive"))
}

/// Run one command against the repository.
pub fn execute(command: &Command, repo: &mut ApplianceRepository) -> Result<Output, ServiceError> {
    match command {
        Command::List => to_json(&repo.get_all()?),
        Command::Show { id } => to_json(&repo.get_by_id(id)?),
        Command::Add { json } => {
            let draft = parse_body(json, Mode::Create)?;
            to_json(&repo.create(&draft)?)
        }
        Command::Update { id, json } => {
            let draft = parse_body(json, Mode::Update)?;
            to_json(&repo.update(id, &draft)?)
        }
        Command::Delete { id } => to_json(&repo.delete(id)?),
        Command::Daily { id } => to_json(&ConsumptionEngine::new(repo).calculate_daily(id)?),
        Command::Weekly { id } => to_json(&ConsumptionEngine::new(repo).calculate_weekly(id)?),
        Command::Monthly { id } => to_json(&ConsumptionEngine::new(repo).calculate_monthly(id)?),
        Command::Total => to_json(&ConsumptionEngine::new(repo).calculate_total_daily()?),
        Command::Cost { id, rate } => {
            let rate_per_kwh = match rate {
                Some(raw) => parse_rate(raw)?,
                None => Settings::new(repo.storage()).rate_per_kwh()?,
            };
            to_json(&ConsumptionEngine::new(repo).calculate_cost(id, CostOptions { rate_per_kwh })?)
        }
        Command::ChartData { mode, csv } => {
            let mode = mode.parse::<ChartMode>()?;
            let household = ConsumptionEngine::new(repo).household()?;
            let series = ChartSeries::build(mode, &household);
            if *csv { Ok(Output::Text(series.to_csv()?)) } else { to_json(&series) }
        }
        Command::Settings => to_json(&Settings::new(repo.storage()).list()?),
        Command::SettingsGet { key } => to_json(&Settings::new(repo.storage()).get(key)?),
        Command::SettingsSet { key, value } => to_json(&Settings::new(repo.storage()).set(key, value)?),
        Command::Help => Ok(Output::Text(format!("{}\n", USAGE))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStorage;
    use serde_json::json;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_string).collect()
    }

    fn run(repo: &mut ApplianceRepository, argv: Vec<String>) -> Result<Output, ServiceError> {
        let cli = Cli::parse(argv).unwrap();
        execute(&cli.command, repo)
    }

    fn json_of(output: Output) -> Value {
        match output {
            Output::Json(v) => v,
            Output::Text(t) => panic!("expected JSON, got text: {}", t),
        }
    }

    fn add_fridge(repo: &mut ApplianceRepository) -> i64 {
        let body = r#"{"name":"Refrigerator","power_watts":150,"daily_hours":24,"usage_days":[0,1,2,3,4,5,6]}"#;
        let created = json_of(run(repo, vec!["add".into(), "--json".into(), body.into()]).unwrap());
        created["id"].as_i64().unwrap()
    }

    #[test]
    fn parses_commands_and_options() {
        let cli = Cli::parse(args("--env-file test.env cost 3 --rate 0.2")).unwrap();
        assert_eq!(cli.env_file, Some(PathBuf::from("test.env")));
        assert_eq!(
            cli.command,
            Command::Cost {
                id: "3".to_string(),
                rate: Some("0.2".to_string())
            }
        );
        assert_eq!(
            Cli::parse(args("chart-data breakdown --csv")).unwrap().command,
            Command::ChartData {
                mode: "breakdown".to_string(),
                csv: true
            }
        );
        assert_eq!(
            Cli::parse(args("settings set currency EUR")).unwrap().command,
            Command::SettingsSet {
                key: "currency".to_string(),
                value: "EUR".to_string()
            }
        );
        assert_eq!(Cli::parse(args("--help")).unwrap().command, Command::Help);
    }

    #[test]
    fn parse_errors_are_plain_text() {
        assert!(Cli::parse(args("")).is_err());
        assert!(Cli::parse(args("show")).is_err());
        assert!(Cli::parse(args("add")).is_err());
        assert!(Cli::parse(args("list --rate 2")).is_err());
        assert!(Cli::parse(args("explode")).is_err());
        assert!(Cli::parse(args("--env-file a --env-file b list")).is_err());
    }

    #[test]
    fn add_show_and_estimates() {
        let mut repo = ApplianceRepository::new(Box::new(MemoryStorage::new()));
        let id = add_fridge(&mut repo);

        let shown = json_of(run(&mut repo, args(&format!("show {}", id))).unwrap());
        assert_eq!(shown["name"], "Refrigerator");
        assert_eq!(shown["usage_days"], json!([0, 1, 2, 3, 4, 5, 6]));
        assert_eq!(shown["consumption_estimates"]["daily_kwh"], json!(3.6));

        let daily = json_of(run(&mut repo, args(&format!("daily {}", id))).unwrap());
        assert_eq!(daily["daily_kwh"], json!(3.6));

        let cost = json_of(run(&mut repo, args(&format!("cost {}", id))).unwrap());
        assert_eq!(cost["rate_per_kwh"], json!(0.12));
        assert_eq!(cost["daily_cost"], json!(0.43));
    }

    #[test]
    fn cost_uses_stored_rate_unless_given() {
        let mut repo = ApplianceRepository::new(Box::new(MemoryStorage::new()));
        let id = add_fridge(&mut repo);
        run(&mut repo, args("settings set rate_per_kwh 0.5")).unwrap();
        let cost = json_of(run(&mut repo, args(&format!("cost {}", id))).unwrap());
        assert_eq!(cost["daily_cost"], json!(1.8));
        let cost = json_of(run(&mut repo, args(&format!("cost {} --rate 1", id))).unwrap());
        assert_eq!(cost["daily_cost"], json!(3.6));

        let err = run(&mut repo, args(&format!("cost {} --rate abc", id))).unwrap_err();
        assert_eq!(err.field.as_deref(), Some("rate_per_kwh"));
    }

    #[test]
    fn bad_bodies_and_ids_become_validation_errors() {
        let mut repo = ApplianceRepository::new(Box::new(MemoryStorage::new()));
        let err = run(&mut repo, vec!["add".into(), "--json".into(), "{not json".into()]).unwrap_err();
        assert_eq!(err.error, ErrorKind::ValidationError);
        assert_eq!(err.field.as_deref(), Some("body"));

        let body = r#"{"name":"Heater","power_watts":"2000","daily_hours":2,"usage_days":[1]}"#;
        let err = run(&mut repo, vec!["add".into(), "--json".into(), body.into()]).unwrap_err();
        assert_eq!(err.field.as_deref(), Some("power_watts"));

        let err = run(&mut repo, vec!["update".into(), "1".into(), "--json".into(), "{}".into()]).unwrap_err();
        assert_eq!(err.field.as_deref(), Some("update"));

        let err = run(&mut repo, args("show abc")).unwrap_err();
        assert_eq!(err.field.as_deref(), Some("id"));
        let err = run(&mut repo, args("delete 42")).unwrap_err();
        assert_eq!(err.error, ErrorKind::NotFound);
    }

    #[test]
    fn update_and_delete_round() {
        let mut repo = ApplianceRepository::new(Box::new(MemoryStorage::new()));
        let id = add_fridge(&mut repo);
        let body = r#"{"daily_hours":12}"#;
        let updated = json_of(
            run(&mut repo, vec!["update".into(), id.to_string(), "--json".into(), body.into()]).unwrap(),
        );
        assert_eq!(updated["daily_hours"], json!(12.0));
        assert_eq!(updated["consumption_estimates"]["daily_kwh"], json!(1.8));

        let deleted = json_of(run(&mut repo, args(&format!("delete {}", id))).unwrap());
        assert_eq!(deleted["success"], json!(true));
        let list = json_of(run(&mut repo, args("list")).unwrap());
        assert_eq!(list["appliances"], json!([]));
    }

    #[test]
    fn chart_data_as_csv() {
        let mut repo = ApplianceRepository::new(Box::new(MemoryStorage::new()));
        add_fridge(&mut repo);
        match run(&mut repo, args("chart-data daily --csv")).unwrap() {
            Output::Text(csv) => assert_eq!(csv, "Name,Daily Consumption (kWh)\nRefrigerator,3.6\n"),
            Output::Json(v) => panic!("expected CSV, got {}", v),
        }
        let err = run(&mut repo, args("chart-data pie")).unwrap_err();
        assert_eq!(err.field.as_deref(), Some("mode"));
    }
}
