use std::path::Path;

use anyhow::{anyhow, bail};
use colored::Colorize;
use obus_conf::{BusSettings, ConfigStore, Entry, EntryRef, KeyPresence, LoadStatus};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let path = cli.config_path();
    let role = cli.role();
    let format = cli.format;
    let store = ConfigStore::new();
    let status = store.load(&path);

    match cli.command {
        Command::Check => cmd_check(&store, &path, status, format),
        Command::Get(args) => {
            ensure_usable(&path, status)?;
            cmd_get(&store, &args.key, format)
        }
        Command::Has(args) => {
            ensure_usable(&path, status)?;
            cmd_has(&store, &args.key, format)
        }
        Command::Keys => {
            ensure_usable(&path, status)?;
            cmd_keys(&store, format)
        }
        Command::Dump => {
            ensure_usable(&path, status)?;
            cmd_dump(&store, format)
        }
        Command::Settings => {
            ensure_usable(&path, status)?;
            let settings = BusSettings::resolve(role, &store, cli.host, cli.port);
            cmd_settings(&settings, format)
        }
    }
}

fn ensure_usable(path: &Path, status: LoadStatus) -> anyhow::Result<()> {
    match status {
        LoadStatus::Ok => Ok(()),
        LoadStatus::Warning => {
            eprintln!(
                "{} Failed to read configuration file {}. Using defaults.",
                "warning:".yellow().bold(),
                path.display()
            );
            Ok(())
        }
        LoadStatus::Fatal => bail!("configuration file {} is malformed", path.display()),
    }
}

fn cmd_check(
    store: &ConfigStore,
    path: &Path,
    status: LoadStatus,
    format: OutputFormat,
) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        let report = json!({
            "path": path.display().to_string(),
            "status": status.to_string(),
            "keys": store.len(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        match status {
            LoadStatus::Ok => println!(
                "{} {}: {} keys loaded",
                "✓".green().bold(),
                path.display(),
                store.len().to_string().bold()
            ),
            LoadStatus::Warning => println!(
                "{} {} could not be read; defaults apply",
                "!".yellow().bold(),
                path.display()
            ),
            LoadStatus::Fatal => {}
        }
    }
    if status.is_fatal() {
        bail!("configuration file {} is malformed", path.display());
    }
    Ok(())
}

fn cmd_get(store: &ConfigStore, key: &str, format: OutputFormat) -> anyhow::Result<()> {
    let entry = store.get(key).ok_or_else(|| missing(store, key))?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(entry.entry())?),
        OutputFormat::Text => println!("{}", entry_line(&entry)),
    }
    store.release(entry);
    Ok(())
}

fn cmd_has(store: &ConfigStore, key: &str, format: OutputFormat) -> anyhow::Result<()> {
    let presence = presence_label(store.lookup(key));
    match format {
        OutputFormat::Json => {
            let report = json!({ "key": key, "presence": presence });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => println!("{}: {}", key.bold(), presence),
    }
    Ok(())
}

fn cmd_keys(store: &ConfigStore, format: OutputFormat) -> anyhow::Result<()> {
    let keys = store.keys();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&keys)?),
        OutputFormat::Text if keys.is_empty() => println!("No configuration keys set."),
        OutputFormat::Text => {
            for key in &keys {
                println!("{key}");
            }
        }
    }
    Ok(())
}

fn cmd_dump(store: &ConfigStore, format: OutputFormat) -> anyhow::Result<()> {
    let entries: Vec<EntryRef> = store.keys().iter().filter_map(|k| store.get(k)).collect();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&dump_json(&entries)?)?),
        OutputFormat::Text if entries.is_empty() => println!("No configuration keys set."),
        OutputFormat::Text => {
            for entry in &entries {
                println!("{}", entry_line(entry));
            }
        }
    }
    for entry in entries {
        store.release(entry);
    }
    Ok(())
}

#[derive(Serialize)]
struct SettingsReport<'a> {
    #[serde(flatten)]
    settings: &'a BusSettings,
    request_endpoint: String,
    publish_endpoint: Option<String>,
}

fn cmd_settings(settings: &BusSettings, format: OutputFormat) -> anyhow::Result<()> {
    let report = SettingsReport {
        settings,
        request_endpoint: settings.request_endpoint(),
        publish_endpoint: settings.publish_endpoint(),
    };
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            println!("Role:     {}", settings.role.to_string().cyan());
            println!("Host:     {}", settings.host.bold());
            println!("Port:     {}", settings.port.to_string().bold());
            println!("Request:  {}", report.request_endpoint.blue());
            match &report.publish_endpoint {
                Some(endpoint) => println!("Publish:  {}", endpoint.blue()),
                None => println!("Publish:  {}", "unavailable (port out of range)".red()),
            }
        }
    }
    Ok(())
}

fn missing(store: &ConfigStore, key: &str) -> anyhow::Error {
    match store.lookup(key) {
        KeyPresence::NotLoaded => anyhow!("no configuration loaded; `{key}` is unavailable"),
        _ => anyhow!("key `{key}` is not configured"),
    }
}

fn presence_label(presence: KeyPresence) -> &'static str {
    match presence {
        KeyPresence::NotLoaded => "not loaded",
        KeyPresence::Absent => "absent",
        KeyPresence::Present => "present",
    }
}

/// One entry as `key (kind) = value`; multi-line strings continue indented.
fn entry_line(entry: &EntryRef) -> String {
    let value = match entry.entry() {
        Entry::String(_) => entry.entry().to_string().replace('\n', "\n    "),
        other => other.to_string(),
    };
    format!("{} ({}) = {}", entry.key(), entry.kind(), value)
}

fn dump_json(entries: &[EntryRef]) -> anyhow::Result<Value> {
    let mut map = Map::new();
    for entry in entries {
        map.insert(entry.key().to_owned(), serde_json::to_value(entry.entry())?);
    }
    Ok(Value::Object(map))
}
