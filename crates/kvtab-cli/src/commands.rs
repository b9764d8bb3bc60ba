use std::collections::BTreeMap;

use anyhow::{bail, Context};
use colored::Colorize;
use serde_json::json;

use kvtab_sdk::{FieldValues, Kvtab, ShardHealth, StoreConfig, Ttl, UpdateOptions};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    let kv = Kvtab::open(&config).context("opening store")?;
    let store = kv.store();
    let json = matches!(cli.format, OutputFormat::Json);

    match cli.command {
        Command::CreateTable(a) => {
            let created = store.create_table(&a.database, &a.table)?;
            report(json, created, &format!("table {}.{}", a.database, a.table), "created", "already exists");
        }
        Command::DropTable(a) => {
            let dropped = store.drop_table(&a.database, &a.table)?;
            report(json, dropped, &format!("table {}.{}", a.database, a.table), "dropped", "not found");
        }
        Command::DropDatabase(a) => {
            let dropped = store.drop_database(&a.database)?;
            report(json, dropped, &format!("database {}", a.database), "dropped", "not found");
        }
        Command::Truncate(a) => {
            let n = store.truncate(&a.database, &a.table)?;
            count(json, n, "rows removed");
        }
        Command::Delete(a) => {
            let n = store.delete(&a.database, &a.table, &a.id)?;
            count(json, n, "rows removed");
        }
        Command::Insert(a) => {
            let fields: FieldValues = a.fields.into_iter().map(|(f, v)| (f, Some(v))).collect();
            let n = store.insert_row(&a.row.database, &a.row.table, &a.row.id, &fields)?;
            count(json, n, "fields written");
        }
        Command::Update(a) => cmd_update(store, a, json)?,
        Command::Get(a) => {
            let Some(row) = store.get_row_in(&a.database, &a.table, &a.id)? else {
                bail!("row {} not found in {}.{}", a.id, a.database, a.table);
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&row)?);
            } else {
                print_fields(&row, "");
            }
        }
        Command::Rows(a) => {
            let rows = store.get_rows(&a.database, &a.table)?;
            if json {
                let rows: BTreeMap<String, _> =
                    rows.into_iter().map(|(k, v)| (k.into_string(), v)).collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if rows.is_empty() {
                println!("No rows.");
            } else {
                for (key, fields) in &rows {
                    println!("{}", key.as_str().yellow().bold());
                    print_fields(fields, "  ");
                }
            }
        }
        Command::Tables(a) => {
            let tables = store.get_tables(&a.database)?;
            if json {
                let tables: BTreeMap<String, String> = tables
                    .iter()
                    .map(|(id, at)| (id.to_string(), at.render()))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&tables)?);
            } else if tables.is_empty() {
                println!("No tables.");
            } else {
                for (id, created) in &tables {
                    println!("{}  {}", id.as_str().yellow(), created.to_string().dimmed());
                }
            }
        }
        Command::Ttl(a) => {
            let ttl = store.time_to_live(&a.database, &a.table, &a.id)?;
            let text = match ttl {
                Ttl::Missing => "missing".to_string(),
                Ttl::Persistent => "persistent".to_string(),
                Ttl::Seconds(s) => format!("{s}s"),
            };
            if json {
                println!("{}", json!({ "ttl": text }));
            } else {
                println!("{text}");
            }
        }
        Command::Ping => {
            let results = kv.ping();
            let mut failed = 0;
            for (name, result) in &results {
                let quarantined = kv.health(name) == Some(ShardHealth::Quarantined);
                match result {
                    Ok(()) => println!("{} {}", "✓".green().bold(), name.bold()),
                    Err(e) => {
                        failed += 1;
                        let state = if quarantined { " (quarantined)" } else { "" };
                        println!("{} {}{}: {}", "✗".red().bold(), name.bold(), state.yellow(), e);
                    }
                }
            }
            if failed > 0 {
                bail!("{failed} of {} shards unreachable", results.len());
            }
        }
    }
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<StoreConfig> {
    let mut config = if cli.endpoints.is_empty() {
        StoreConfig::load(&cli.config)
            .with_context(|| format!("loading {}", cli.config.display()))?
    } else {
        StoreConfig::with_endpoints(cli.endpoints.iter().cloned())
    };
    if let Some(mode) = cli.mode {
        config.mode = Some(mode);
    }
    if let Some(key_mode) = cli.key_mode {
        config.key_mode = key_mode;
    }
    config.validate()?;
    Ok(config)
}

fn cmd_update(store: &kvtab_sdk::TableStore, a: UpdateArgs, json: bool) -> anyhow::Result<()> {
    let mut fields: FieldValues = a.fields.into_iter().map(|(f, v)| (f, Some(v))).collect();
    for field in a.unset {
        fields.insert(field, None);
    }
    let options = UpdateOptions {
        expire_seconds: a.expire,
        ..UpdateOptions::default()
    };
    let n = store.update_row(&a.row.database, &a.row.table, &a.row.id, &fields, options)?;
    count(json, n, "fields changed");
    Ok(())
}

fn report(json: bool, done: bool, what: &str, yes: &str, no: &str) {
    if json {
        println!("{}", json!({ "ok": done }));
    } else if done {
        println!("{} {} {}", "✓".green().bold(), what.bold(), yes);
    } else {
        println!("{} {}", what.bold(), no.dimmed());
    }
}

fn count(json: bool, n: u64, what: &str) {
    if json {
        println!("{}", json!({ "count": n }));
    } else {
        println!("{} {} {}", "✓".green().bold(), n.to_string().bold(), what);
    }
}

fn print_fields(fields: &kvtab_sdk::FieldMap, indent: &str) {
    for (field, value) in fields {
        println!("{indent}{} = {}", field.cyan(), value);
    }
}
