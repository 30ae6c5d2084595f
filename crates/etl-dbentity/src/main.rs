//! etl-table-manager CLI
//!
//! Parses table definitions, discovers live tables and prints the SQL
//! needed to bring one in line with the other.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use serde_json::{Map, Value};
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use etl_dbentity::prelude::*;

/// Variable set to the aggregation unit unless given explicitly.
const AGGREGATION_UNIT_VARIABLE: &str = "AGGREGATION_UNIT";

/// Manage ETL warehouse table definitions.
#[derive(Parser)]
#[command(name = "etl-table-manager")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Operation to perform.
    #[arg(short, long, value_enum)]
    operation: Operation,

    /// Table definition file to parse.
    #[arg(short, long)]
    table_config: Option<PathBuf>,

    /// Existing table (`table` or `schema.table`) to discover.
    #[arg(short, long)]
    discover_table: Option<String>,

    /// MySQL connection URL used for discovery.
    #[arg(short = 'D', long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Default schema for unqualified table names.
    #[arg(short, long, env = "ETL_SCHEMA")]
    schema: Option<String>,

    /// Model options file (quote character, macro directory).
    #[arg(long)]
    options_file: Option<PathBuf>,

    /// Directory query macro files are resolved against.
    #[arg(short, long)]
    macro_dir: Option<PathBuf>,

    /// Treat the definition as an aggregation table for this unit.
    #[arg(short, long)]
    aggregation_unit: Option<String>,

    /// Variable applied to aggregation tables and the generated SELECT.
    #[arg(long = "variable", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    variables: Vec<(String, String)>,

    /// Value for a declared query restriction.
    #[arg(long = "restriction", value_name = "NAME=VALUE", value_parser = parse_key_value)]
    restrictions: Vec<(String, String)>,

    /// Include the schema in table and trigger names.
    #[arg(short, long)]
    include_schema: bool,

    /// Use the positional array form for columns and indexes in JSON output.
    #[arg(long)]
    succinct: bool,

    /// Key the JSON output is nested under.
    #[arg(short = 'k', long)]
    table_key: Option<String>,

    /// Output file (stdout if not specified).
    #[arg(short = 'f', long)]
    output_file: Option<PathBuf>,

    /// Output format.
    #[arg(short = 'x', long, value_enum, default_value_t = OutputFormat::Json)]
    output_format: OutputFormat,

    /// Log verbosity.
    #[arg(short, long, value_enum, default_value_t = Verbosity::Info)]
    verbosity: Verbosity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Operation {
    /// Dump the parsed table.
    DumpParsed,
    /// Dump the discovered table.
    DumpDiscovered,
    /// Dump the ALTER SQL bringing the discovered table in line with the parsed one.
    DumpAlter,
    /// Dump the SELECT populating an aggregation table.
    DumpSelect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Sql,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Verbosity {
    Debug,
    Info,
    Warn,
    Error,
    Quiet,
}

impl Verbosity {
    const fn level(self) -> Option<Level> {
        match self {
            Self::Debug => Some(Level::DEBUG),
            Self::Info => Some(Level::INFO),
            Self::Warn => Some(Level::WARN),
            Self::Error => Some(Level::ERROR),
            Self::Quiet => None,
        }
    }
}

fn parse_key_value(arg: &str) -> std::result::Result<(String, String), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{arg}'")),
    }
}

/// Wraps statements so they can be fed to the mysql client as-is.
fn delimited(statements: &[String]) -> String {
    format!("DELIMITER ;;\n{}\n;;", statements.join("\n;;\n"))
}

fn keyed(value: Value, table_key: Option<&str>) -> Value {
    match table_key {
        Some(key) => {
            let mut map = Map::new();
            map.insert(key.to_string(), value);
            Value::Object(map)
        }
        None => value,
    }
}

fn qualified_name(table: &Table) -> String {
    match table.schema() {
        Some(schema) => format!("{schema}.{}", table.name()),
        None => table.name().to_string(),
    }
}

/// The parsed definition: a table plus, for aggregation tables, the
/// query that populates it.
struct Parsed {
    table: Table,
    query: Option<Query>,
}

fn parse_definition(
    cli: &Cli,
    path: &Path,
    options: &ModelOptions,
    variables: &VariableMap,
) -> anyhow::Result<Parsed> {
    let parsed = match &cli.aggregation_unit {
        Some(unit) => {
            let mut aggregation = AggregationTable::from_file(path, options)
                .with_context(|| format!("Failed to parse '{}'", path.display()))?;
            aggregation.set_aggregation_unit(unit.clone())?;
            let aggregation = aggregation.copy_and_apply_variables(variables)?;
            aggregation.verify()?;
            Parsed {
                table: aggregation.table()?.clone(),
                query: aggregation.query().cloned(),
            }
        }
        None => Parsed {
            table: Table::from_file(path, options)
                .with_context(|| format!("Failed to parse '{}'", path.display()))?,
            query: None,
        },
    };
    debug!(table = %parsed.table.name(), "Parsed table definition");
    Ok(parsed)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(level) = cli.verbosity.level() {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    let mut options = match &cli.options_file {
        Some(path) => ModelOptions::from_file(path)?,
        None => ModelOptions::default(),
    };
    if let Some(dir) = &cli.macro_dir {
        options = options.with_macro_dir(dir.clone());
    }

    let mut variables: VariableMap = cli.variables.iter().cloned().collect();
    if let Some(unit) = &cli.aggregation_unit {
        variables
            .entry(AGGREGATION_UNIT_VARIABLE.to_string())
            .or_insert_with(|| unit.clone());
    }

    let endpoint = match &cli.database_url {
        Some(url) => Some(MysqlEndpoint::connect(url, cli.schema.clone())?),
        None => None,
    };
    let default_schema = endpoint
        .as_ref()
        .map(|endpoint| endpoint.default_schema().to_string())
        .or_else(|| cli.schema.clone());

    let parsed = match &cli.table_config {
        Some(path) => {
            let mut parsed = parse_definition(&cli, path, &options, &variables)?;
            if parsed.table.schema().is_none() {
                parsed.table.set_schema(default_schema.clone());
            }
            parsed.table.verify()?;
            Some(parsed)
        }
        None => None,
    };

    let discover_name = cli.discover_table.clone().or_else(|| {
        (cli.operation == Operation::DumpAlter)
            .then(|| parsed.as_ref().map(|parsed| qualified_name(&parsed.table)))
            .flatten()
    });
    let discovered = match &discover_name {
        Some(name) => {
            let Some(endpoint) = &endpoint else {
                bail!("A database URL is required to discover table '{name}'");
            };
            let discovery_options = options.clone().with_quote_char(endpoint.quote_char());
            match Table::discover(name, endpoint, &discovery_options)? {
                Some(table) => Some(table),
                None => bail!("Table '{name}' not found"),
            }
        }
        None => None,
    };
    if let Some(endpoint) = endpoint {
        endpoint.close();
    }

    let output = render(&cli, parsed, discovered.as_ref(), &variables)?;
    let Some(output) = output else {
        return Ok(());
    };
    match &cli.output_file {
        Some(path) => std::fs::write(path, format!("{output}\n"))
            .with_context(|| format!("Failed to write '{}'", path.display()))?,
        None => println!("{output}"),
    }
    Ok(())
}

fn render(
    cli: &Cli,
    parsed: Option<Parsed>,
    discovered: Option<&Table>,
    variables: &VariableMap,
) -> anyhow::Result<Option<String>> {
    match cli.operation {
        Operation::DumpParsed | Operation::DumpDiscovered => {
            let (table, what) = if cli.operation == Operation::DumpParsed {
                (parsed.as_ref().map(|parsed| &parsed.table), "--table-config")
            } else {
                (discovered, "--discover-table")
            };
            let Some(table) = table else {
                bail!("{what} is required for this operation");
            };
            match cli.output_format {
                OutputFormat::Json => {
                    let value = keyed(
                        table.to_json_obj(cli.succinct, cli.include_schema),
                        cli.table_key.as_deref(),
                    );
                    Ok(Some(serde_json::to_string(&value)?))
                }
                OutputFormat::Sql => Ok(Some(delimited(&table.create_sql(cli.include_schema)?))),
            }
        }
        Operation::DumpAlter => {
            if cli.output_format == OutputFormat::Json {
                bail!("JSON format not supported for ALTER TABLE");
            }
            let (Some(parsed), Some(discovered)) = (&parsed, discovered) else {
                bail!("dump-alter requires --table-config and a discoverable table");
            };
            let statements = discovered.alter_sql(&parsed.table, cli.include_schema);
            if statements.is_empty() {
                info!(table = %discovered.name(), "Table is up to date");
                Ok(None)
            } else {
                Ok(Some(delimited(&statements)))
            }
        }
        Operation::DumpSelect => {
            if cli.output_format == OutputFormat::Json {
                bail!("JSON format not supported for SELECT");
            }
            let Some(mut query) = parsed.and_then(|parsed| parsed.query) else {
                bail!("dump-select requires --table-config with --aggregation-unit and a query");
            };
            let restrictions: VariableMap = cli.restrictions.iter().cloned().collect();
            let applied = query.apply_overseer_restrictions(&restrictions)?;
            debug!(applied, "Applied query restrictions");
            let sql = substitute_variables(&query.select_sql(cli.include_schema)?, variables);
            Ok(Some(delimited(&[sql])))
        }
    }
}
