use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use schemark::accessor::synthesize;
use schemark::config::{CompileOptions, Redefinition};
use schemark::serializer;
use schemark::{CompiledSchema, Compiler};

/// Compile marker-grammar schema documents into tables and associations.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a schema document and print the result.
    Compile(CompileArgs),
    /// List the association accessors synthesized for one table.
    Accessors(AccessorArgs),
}

#[derive(Args)]
struct SchemaArgs {
    /// Schema document (JSON).
    input: PathBuf,

    /// TOML file with compile options.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Force `timestamps: false` on every table.
    #[arg(long)]
    disable_timestamps: bool,

    /// Fail on unknown type names.
    #[arg(long)]
    strict_types: bool,

    /// Let a later table definition replace an earlier one.
    #[arg(long)]
    overwrite: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Args)]
struct CompileArgs {
    #[command(flatten)]
    schema: SchemaArgs,

    #[arg(short, long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Output file (default: stdout).
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct AccessorArgs {
    #[command(flatten)]
    schema: SchemaArgs,

    /// Table whose accessors are listed.
    table: String,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Compile(args) => {
            let schema = load_schema(&args.schema)?;
            let rendered = match args.format {
                Format::Text => serializer::serialize(&schema),
                Format::Json => serializer::to_json(&schema)? + "\n",
            };
            match args.output {
                Some(path) => fs::write(&path, rendered)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => print!("{rendered}"),
            }
        }
        Commands::Accessors(args) => {
            let schema = load_schema(&args.schema)?;
            if schema.table(&args.table).is_none() {
                bail!("Unknown table {}", args.table);
            }
            print!("{}", serializer::serialize_accessors(&synthesize(&schema, &args.table)));
        }
    }

    Ok(())
}

fn load_schema(args: &SchemaArgs) -> Result<CompiledSchema> {
    let mut options = CompileOptions::load(args.config.as_deref())?;
    options.disable_timestamps |= args.disable_timestamps;
    options.strict_types |= args.strict_types;
    if args.overwrite {
        options.redefinition = Redefinition::Overwrite;
    }

    let source = fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let schema = Compiler::new(options)
        .compile_str(&source)
        .with_context(|| format!("Failed to compile {}", args.input.display()))?;
    Ok(schema)
}
