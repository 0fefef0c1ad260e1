#![cfg(not(target_family = "wasm"))]

use std::env;
use std::io::{Read, Write};
use std::path::Path;
use std::process::exit;

use anstream::{eprint, eprintln, println};
use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum, ValueHint};
use clio::Output;
use is_terminal::IsTerminal;
use itertools::Itertools;
use schemars::schema_for;

use dialectic::functions::{Origin, Overload, ReturnType};
use dialectic::ir::{Expr, Query};
use dialectic::{compile, compile_expr, json, registry, Options};

/// Entrypoint called by [`crate::main`]
pub fn main() -> color_eyre::eyre::Result<()> {
    let mut cli = Cli::parse();

    static LOGGER: StderrLogger = StderrLogger;
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level_filter(cli.verbose));
    }

    color_eyre::install()?;
    cli.color.write_global();

    if let Err(error) = cli.command.run() {
        eprintln!("{error}");
        if backtrace_enabled() {
            eprintln!("{:#}", error.backtrace());
        }

        exit(1)
    }

    Ok(())
}

fn backtrace_enabled() -> bool {
    match env::var("RUST_LIB_BACKTRACE") {
        Ok(s) => s != "0",
        Err(_) => match env::var("RUST_BACKTRACE") {
            Ok(s) => s != "0",
            Err(_) => false,
        },
    }
}

#[derive(Parser, Debug, Clone)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    #[command(flatten)]
    color: colorchoice_clap::Color,

    /// Log more; repeat for more detail (-v warnings, -vvvv everything)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug, Clone)]
#[command(name = env!("CARGO_PKG_NAME"), about, version)]
enum Command {
    /// Compile a query, given as IR JSON, to SQL
    #[command(name = "compile")]
    Compile {
        #[command(flatten)]
        io_args: IoArgs,

        /// Exclude the signature comment containing the compiler version
        #[arg(long = "hide-signature-comment", action = clap::ArgAction::SetFalse)]
        signature_comment: bool,

        /// Emit unformatted, dense SQL
        #[arg(long = "no-format", action = clap::ArgAction::SetFalse)]
        format: bool,

        /// Dialect to compile to
        #[arg(short, long, default_value = "duckdb", env = "DIALECTIC_DIALECT")]
        dialect: String,

        /// Longest array unnested by backends which join a number series
        #[arg(long, default_value_t = 100_000)]
        unnest_bound: u64,

        /// Timezone for calendar units, unless the query names its own
        #[arg(long, env = "DIALECTIC_TIMEZONE")]
        timezone: Option<String>,

        #[arg(value_enum, long, default_value = "sql")]
        emit: Emit,
    },

    /// Show available dialect names
    #[command(name = "list-dialects")]
    ListDialects,

    /// Show the merged function catalog of a dialect
    #[command(name = "list-functions")]
    ListFunctions {
        #[arg(short, long, default_value = "duckdb", env = "DIALECTIC_DIALECT")]
        dialect: String,
    },

    #[command(subcommand)]
    Debug(DebugCommand),
}

/// Commands meant for debugging, prone to change
#[derive(Subcommand, Debug, Clone)]
enum DebugCommand {
    /// Render a single expression, given as IR JSON
    Expr {
        #[command(flatten)]
        io_args: IoArgs,

        #[arg(short, long, default_value = "duckdb", env = "DIALECTIC_DIALECT")]
        dialect: String,
    },

    /// Print JSON Schema of the query IR
    JsonSchema,
}

#[derive(clap::Args, Default, Debug, Clone)]
pub struct IoArgs {
    #[arg(value_parser, default_value = "-", value_hint(ValueHint::FilePath))]
    input: clio::ClioPath,

    #[arg(value_parser, default_value = "-", value_hint(ValueHint::FilePath))]
    output: Output,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Emit {
    /// Only the SQL
    Sql,
    /// SQL with the output fields and diagnostics, as JSON
    Json,
}

impl Command {
    /// Entrypoint called by [`main`]
    pub fn run(&mut self) -> Result<()> {
        match self {
            Command::ListDialects => {
                println!("{}", registry()?.names().join("\n"));
                Ok(())
            }
            Command::ListFunctions { dialect } => {
                let entry = registry()?.get(dialect)?;
                println!("{}", entry.catalog.iter().map(describe_overload).join("\n"));
                Ok(())
            }
            Command::Debug(DebugCommand::JsonSchema) => {
                println!("{}", serde_json::to_string_pretty(&schema_for!(Query))?);
                Ok(())
            }
            Command::Compile { .. } | Command::Debug(DebugCommand::Expr { .. }) => {
                let source = self.read_input()?;
                let buf = self.execute(&source)?;
                self.write_output(&buf)?;
                Ok(())
            }
        }
    }

    fn execute(&self, source: &str) -> Result<Vec<u8>> {
        Ok(match self {
            Command::Compile {
                signature_comment,
                format,
                dialect,
                unnest_bound,
                timezone,
                emit,
                ..
            } => {
                let query = json::to_query(source)?;
                let mut options = Options::default()
                    .with_dialect(dialect)
                    .with_format(*format)
                    .with_signature_comment(*signature_comment)
                    .with_unnest_bound(*unnest_bound);
                options.timezone = timezone.clone();
                let compiled = compile(&query, &options)?;
                for diagnostic in &compiled.diagnostics {
                    eprint!("{diagnostic}");
                }
                match emit {
                    Emit::Sql => compiled.sql.into_bytes(),
                    Emit::Json => serde_json::to_string_pretty(&compiled)?.into_bytes(),
                }
            }
            Command::Debug(DebugCommand::Expr { dialect, .. }) => {
                let expr: Expr = serde_json::from_str(source)?;
                let options = Options::default().with_dialect(dialect);
                compile_expr(&expr, &options)?.into_bytes()
            }
            _ => unreachable!("{self:?} doesn't read input"),
        })
    }

    fn io_args(&mut self) -> &mut IoArgs {
        match self {
            Command::Compile { io_args, .. }
            | Command::Debug(DebugCommand::Expr { io_args, .. }) => io_args,
            _ => unreachable!(),
        }
    }

    fn read_input(&mut self) -> Result<String> {
        let input = &self.io_args().input;

        // Don't wait without a prompt when reading from an interactive
        // terminal.
        if input.path() == Path::new("-") && std::io::stdin().is_terminal() {
            #[cfg(unix)]
            eprintln!("Enter query JSON, then press ctrl-d to compile:\n");
            #[cfg(windows)]
            eprintln!("Enter query JSON, then press ctrl-z to compile:\n");
        }

        let mut source = String::new();
        input.clone().open()?.read_to_string(&mut source)?;
        Ok(source)
    }

    fn write_output(&mut self, data: &[u8]) -> std::io::Result<()> {
        let output = &mut self.io_args().output;
        output.write_all(data)?;
        if !data.ends_with(b"\n") {
            output.write_all(b"\n")?;
        }
        output.flush()
    }
}

fn describe_overload(overload: &Overload) -> String {
    let def = &overload.def;
    let returns = match def.returns {
        ReturnType::SameAs(param) => format!("typeof({param})"),
        other => format!("{other:?}").to_lowercase(),
    };
    let origin = match overload.origin {
        Origin::Base => "",
        Origin::Override => " (override)",
        Origin::Dialect => " (dialect)",
    };
    let aggregate = if def.aggregate { "aggregate " } else { "" };
    format!("{aggregate}{} -> {returns}{origin}", def.signature())
}

fn level_filter(verbose: u8) -> log::LevelFilter {
    match verbose {
        0 => log::LevelFilter::Error,
        1 => log::LevelFilter::Warn,
        2 => log::LevelFilter::Info,
        3 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

/// Writes log records to stderr, one per line.
struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        eprintln!(
            "[{} {}] {}",
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use dialectic::ir::{AggregateFunc, FieldRef, RelationKind, Segment, SemanticType};
    use insta::assert_snapshot;

    use super::*;

    fn totals() -> String {
        let amount = Expr::field(
            FieldRef::new("orders", RelationKind::Table, "amount"),
            SemanticType::float(),
        );
        let root = Segment::new("totals").measure(
            "total",
            Expr::aggregate(AggregateFunc::Sum, Some(amount), SemanticType::float()),
        );
        json::from_query(&Query::new("orders", "orders", root)).unwrap()
    }

    fn compile_command(dialect: &str, emit: Emit) -> Command {
        Command::Compile {
            io_args: IoArgs::default(),
            signature_comment: false,
            format: false,
            dialect: dialect.to_string(),
            unnest_bound: 100_000,
            timezone: None,
            emit,
        }
    }

    #[test]
    fn compile_sql() {
        let output = compile_command("postgres", Emit::Sql)
            .execute(&totals())
            .unwrap();
        assert_snapshot!(
            String::from_utf8(output).unwrap(),
            @"SELECT SUM(orders.amount) AS total FROM orders AS orders"
        );
    }

    #[test]
    fn compile_json() {
        let output = compile_command("postgres", Emit::Json)
            .execute(&totals())
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(
            value["sql"],
            "SELECT SUM(orders.amount) AS total FROM orders AS orders"
        );
        assert_eq!(value["diagnostics"], serde_json::json!([]));
    }

    /// Check we get an error on a bad input
    #[test]
    fn compile_bad() {
        anstream::ColorChoice::Never.write_global();

        let error = compile_command("duckdb", Emit::Sql)
            .execute("{")
            .unwrap_err();
        assert!(error.to_string().starts_with("Error: "));

        let error = compile_command("oracle", Emit::Sql)
            .execute(&totals())
            .unwrap_err();
        assert!(error
            .to_string()
            .starts_with("[E0301] Error: unknown dialect `oracle`"));
    }

    #[test]
    fn describe_overloads() {
        let registry = registry().unwrap();
        let catalog = &registry.get("duckdb").unwrap().catalog;
        let lines = catalog.iter().map(describe_overload).collect_vec();
        assert!(lines.iter().any(|l| l.starts_with("concat(")));
        assert!(lines
            .iter()
            .any(|l| l.starts_with("aggregate median(") && l.ends_with("(dialect)")));
    }

    #[test]
    fn verbosity() {
        assert_eq!(level_filter(0), log::LevelFilter::Error);
        assert_eq!(level_filter(2), log::LevelFilter::Info);
        assert_eq!(level_filter(9), log::LevelFilter::Trace);
    }

    #[test]
    fn parse_args() {
        let cli = Cli::try_parse_from([
            "dialectic",
            "compile",
            "--no-format",
            "-d",
            "snowflake",
            "--timezone",
            "Europe/Paris",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Command::Compile {
            format,
            signature_comment,
            dialect,
            timezone,
            emit,
            ..
        } = cli.command
        else {
            panic!("expected compile");
        };
        assert!(!format);
        assert!(signature_comment);
        assert_eq!(dialect, "snowflake");
        assert_eq!(timezone.as_deref(), Some("Europe/Paris"));
        assert_eq!(emit, Emit::Sql);
    }
}
