//! hartodb CLI
//!
//! Command-line entry point over a database root. Every command prints a
//! status line (`200`, `406` or `500`) followed by its message.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use hartodb::{
    Config, Constraint, Engine, Field, FieldType, FieldValues, HartoError, Record, Response,
    SyncStrategy, Table, Value,
};
use tracing_subscriber::{fmt, EnvFilter};

/// hartodb CLI
#[derive(Parser, Debug)]
#[command(name = "hartodb-cli")]
#[command(about = "Embedded file-backed tabular storage engine")]
#[command(version)]
struct Args {
    /// Database root directory
    #[arg(short, long, default_value = "./hartoDB")]
    root: PathBuf,

    /// Extension of every file the engine writes
    #[arg(short, long, default_value = "htdb")]
    ext: String,

    /// fsync after every write
    #[arg(long)]
    sync: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a schema
    CreateSchema {
        /// Schema name
        name: String,
    },

    /// List schemas, or the tables of one schema
    List {
        /// Schema whose tables to list
        schema: Option<String>,
    },

    /// Create a table
    CreateTable {
        schema: String,
        table: String,

        /// Field definitions as name:type[:width][:constraint,...]
        /// e.g. name:string:16:not_null age:int bio:ref
        #[arg(required = true)]
        fields: Vec<String>,
    },

    /// Delete a table
    DropTable { schema: String, table: String },

    /// Insert a record from field=value pairs
    Insert {
        schema: String,
        table: String,
        #[arg(required = true)]
        values: Vec<String>,
    },

    /// Print every live record as JSON
    Scan { schema: String, table: String },

    /// Update fields of the record with the given id
    Update {
        schema: String,
        table: String,
        id: u64,
        #[arg(required = true)]
        values: Vec<String>,
    },

    /// Delete the record with the given id
    Delete {
        schema: String,
        table: String,
        id: u64,
    },

    /// Run one cleanup cycle now
    Compact,
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hartodb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut builder = Config::builder()
        .root_dir(&args.root)
        .file_extension(&args.ext);
    if args.sync {
        builder = builder.sync_strategy(SyncStrategy::EveryWrite);
    }

    let engine = match Engine::open(builder.build()) {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!("Failed to open database: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let response = run(&engine, args.command);
    println!("{}", response);

    if let Err(e) = engine.close() {
        tracing::error!("Failed to close database: {}", e);
    }

    if response.status.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn run(engine: &Engine, command: Commands) -> Response {
    match command {
        Commands::CreateSchema { name } => Response::from_result(engine.create_schema(&name), |_| {
            format!("schema {} created", name)
        }),

        Commands::List { schema: None } => {
            Response::from_result(engine.list_schemas(), |names| names.join("\n"))
        }

        Commands::List {
            schema: Some(schema),
        } => Response::from_result(engine.list_tables(&schema), |names| names.join("\n")),

        Commands::CreateTable {
            schema,
            table,
            fields,
        } => {
            let result = fields
                .iter()
                .map(|spec| parse_field(spec))
                .collect::<hartodb::Result<Vec<_>>>()
                .and_then(|fields| engine.create_table(&schema, &table, fields));
            Response::from_result(result, |t| {
                format!("table {} created ({} bytes per record)", t.qualified_name(), t.record_width())
            })
        }

        Commands::DropTable { schema, table } => {
            Response::from_result(engine.delete_table(&schema, &table), |_| {
                format!("table {}.{} deleted", schema, table)
            })
        }

        Commands::Insert {
            schema,
            table,
            values,
        } => {
            let result = engine.table(&schema, &table).and_then(|t| {
                let values = parse_values(&t, &values)?;
                engine.insert(&t, values)
            });
            Response::from_result(result, |record| record_json(&record).to_string())
        }

        Commands::Scan { schema, table } => {
            let result = engine.table(&schema, &table).and_then(|t| {
                let mut rows = Vec::new();
                for record in engine.current_records(&t)? {
                    match record {
                        Ok(record) => rows.push(record_json(&record)),
                        Err(e) => tracing::warn!("Skipping corrupt record: {}", e),
                    }
                }
                Ok(rows)
            });
            Response::from_result(result, |rows| {
                rows.iter()
                    .map(serde_json::Value::to_string)
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }

        Commands::Update {
            schema,
            table,
            id,
            values,
        } => {
            let result = engine.table(&schema, &table).and_then(|t| {
                let changes = parse_values(&t, &values)?;
                let record = engine.get(&t, id)?.ok_or(HartoError::RecordNotFound(id))?;
                engine.update(&t, &record, changes)
            });
            Response::from_result(result, |record| record_json(&record).to_string())
        }

        Commands::Delete { schema, table, id } => {
            let result = engine.table(&schema, &table).and_then(|t| {
                let record = engine.get(&t, id)?.ok_or(HartoError::RecordNotFound(id))?;
                engine.delete(&t, &record)
            });
            Response::from_result(result, |_| format!("record {} deleted", id))
        }

        Commands::Compact => Response::from_result(engine.compact(), |stats| {
            format!(
                "{} tables scanned, {} rewritten, {} slots removed, {} ref bytes reclaimed",
                stats.tables_scanned,
                stats.tables_rewritten,
                stats.slots_removed,
                stats.ref_bytes_reclaimed
            )
        }),
    }
}

/// Parse `name:type[:width][:constraint,...]`
fn parse_field(spec: &str) -> hartodb::Result<Field> {
    let invalid = |reason: &str| HartoError::InvalidName(format!("field '{}': {}", spec, reason));

    let mut parts = spec.split(':');
    let name = parts.next().filter(|n| !n.is_empty()).ok_or_else(|| invalid("missing name"))?;
    let field_type = parts
        .next()
        .and_then(FieldType::parse)
        .ok_or_else(|| invalid("unknown type"))?;

    let mut rest: Vec<&str> = parts.collect();
    let width = match rest.first().map(|w| w.parse::<usize>()) {
        Some(Ok(width)) => {
            rest.remove(0);
            width
        }
        _ => field_type
            .fixed_width()
            .ok_or_else(|| invalid("string fields need a width"))?,
    };

    let mut field = Field::new(name, field_type, width);
    for constraint in rest.iter().flat_map(|c| c.split(',')).filter(|c| !c.is_empty()) {
        let constraint = Constraint::parse(constraint).ok_or_else(|| invalid("unknown constraint"))?;
        field = field.with_constraint(constraint);
    }
    Ok(field)
}

/// Parse `field=value` pairs using the table's field types
fn parse_values(table: &Table, pairs: &[String]) -> hartodb::Result<FieldValues> {
    let mut values = FieldValues::new();

    for pair in pairs {
        let (name, raw) = pair
            .split_once('=')
            .ok_or_else(|| HartoError::InvalidName(format!("expected field=value, got '{}'", pair)))?;
        let field = table
            .definition()
            .field(name)
            .ok_or_else(|| HartoError::UnknownField(name.to_string()))?;

        let mismatch = |expected| HartoError::TypeMismatch {
            field: name.to_string(),
            expected,
            actual: "text",
        };
        let value = match field.field_type {
            FieldType::String | FieldType::Ref => Value::Text(raw.to_string()),
            FieldType::Int => Value::Int(raw.parse().map_err(|_| mismatch("int"))?),
            FieldType::Float => Value::Float(raw.parse().map_err(|_| mismatch("float"))?),
            FieldType::TimeId => Value::TimeId(raw.parse().map_err(|_| mismatch("timeID"))?),
        };
        values.insert(name.to_string(), value);
    }

    Ok(values)
}

fn record_json(record: &Record) -> serde_json::Value {
    let mut object = serde_json::Map::new();
    for (name, value) in record.values() {
        let json = match value {
            Value::Text(s) => serde_json::Value::from(s.as_str()),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Value::from(*f),
            Value::TimeId(t) => serde_json::Value::from(*t),
            Value::Ref(span) => serde_json::json!({ "start": span.start, "end": span.end }),
        };
        object.insert(name.clone(), json);
    }
    object.insert("id_datetime".to_string(), record.id_datetime().into());
    serde_json::Value::Object(object)
}
