//! InfluxQL connector command-line tool
//!
//! Browses store metadata and runs scans through the connector, printing one
//! JSON object per line. Connection settings come from `INFLUXQL_*`
//! environment variables.

use influxql_connector::connector::{Connector, TableHandle};
use influxql_connector::predicate::ScalarValue;
use influxql_connector::telemetry::{init_logging, LogFormat};
use influxql_connector::{ConnectorConfig, Error};

use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use std::io::Write;
use tracing::info;

/// InfluxQL connector CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log level
    #[arg(long, env = "INFLUXQL_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List schemas (databases)
    Schemas,
    /// List tables (measurements) of a schema
    Tables { schema: String },
    /// Describe the columns of a table
    Columns { schema: String, table: String },
    /// Scan a table
    Scan {
        schema: String,
        /// Table name, optionally `<retention policy>.<table>`
        table: String,
        /// Comma-separated columns to project; all columns when omitted
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,
        /// Maximum number of rows
        #[arg(long)]
        limit: Option<u64>,
        /// Newest rows first
        #[arg(long)]
        desc: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let format = if args.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Plain
    };
    init_logging(&args.log_level, format)?;

    let config = ConnectorConfig::from_env()?;
    info!(endpoint = %config.endpoint, "Starting InfluxQL connector CLI");
    let connector = Connector::new(config);
    connector.session().ensure_connected().await?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match args.command {
        Command::Schemas => {
            for schema in connector.metadata().list_schema_names().await? {
                writeln!(out, "{}", json!({ "schema": schema }))?;
            }
        }
        Command::Tables { schema } => {
            for table in connector.metadata().list_tables(Some(schema.as_str())).await? {
                writeln!(out, "{}", json!({ "schema": table.schema, "table": table.table }))?;
            }
        }
        Command::Columns { schema, table } => {
            let handle = resolve(&connector, &schema, &table).await?;
            for column in connector.metadata().column_handles(&handle).await? {
                writeln!(
                    out,
                    "{}",
                    json!({
                        "name": column.name,
                        "type": column.column_type.as_str(),
                        "kind": column.kind.as_str(),
                    })
                )?;
            }
        }
        Command::Scan {
            schema,
            table,
            columns,
            limit,
            desc,
        } => {
            let mut handle = resolve(&connector, &schema, &table).await?;
            let available = connector.metadata().column_handles(&handle).await?;
            let projection = if columns.is_empty() {
                available
            } else {
                columns
                    .iter()
                    .map(|name| {
                        available
                            .iter()
                            .find(|c| &c.name == name)
                            .cloned()
                            .ok_or_else(|| {
                                Error::InvalidArgument(format!("unknown column {name} in {handle}"))
                            })
                    })
                    .collect::<Result<Vec<_>, _>>()?
            };

            if let Some(limit) = limit {
                if let Some(limited) = connector.metadata().apply_limit(&handle, limit) {
                    handle = limited;
                }
            }
            if desc {
                handle = handle.with_ascending(false);
            }

            let mut cursor = connector
                .record_sets()
                .open_cursor(&handle, &projection)
                .await?;
            while cursor.advance().await? {
                let mut row = Map::new();
                for (field, column) in projection.iter().enumerate() {
                    let value = cursor.get_value(field)?.map_or(Value::Null, to_json);
                    row.insert(column.name.clone(), value);
                }
                writeln!(out, "{}", Value::Object(row))?;
            }
            info!(rows = cursor.rows_read(), table = %handle, "Scan complete");
        }
    }
    out.flush()?;
    Ok(())
}

async fn resolve(connector: &Connector, schema: &str, table: &str) -> Result<TableHandle, Error> {
    connector
        .metadata()
        .get_table_handle(schema, table)
        .await?
        .ok_or_else(|| Error::TableNotFound {
            schema: schema.to_string(),
            table: table.to_string(),
        })
}

fn to_json(value: ScalarValue) -> Value {
    match value {
        ScalarValue::Utf8(s) => Value::String(s),
        ScalarValue::Int64(v) => json!(v),
        ScalarValue::Float64(v) => json!(v),
        ScalarValue::Boolean(v) => Value::Bool(v),
        ScalarValue::TimestampTz(ts) => match ts.to_datetime() {
            Some(dt) => Value::String(dt.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)),
            None => json!(ts),
        },
    }
}
