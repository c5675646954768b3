use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cmds;

#[derive(Parser)]
#[command(name = "sol-abi")]
#[command(about = "Generates Yul transcoders and packed accessors for Solidity ABI types")]
#[command(version)]
struct Cli {
    /// Generator config (YAML, or JSON by extension)
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Write the generated code here instead of stdout
    #[arg(short = 'o', long = "output", value_name = "FILE", global = true)]
    output: Option<PathBuf>,

    /// Log generation decisions to stderr
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Emit parameter decoders for the functions and errors of a JSON ABI
    Decode {
        /// Solidity JSON ABI file
        #[arg(short = 'a', long = "abi", value_name = "FILE")]
        abi: PathBuf,

        /// Only this function or error
        #[arg(short = 'f', long = "function", value_name = "NAME")]
        function: Option<String>,
    },

    /// Emit return-value, error and event-data encoders for a JSON ABI
    Encode {
        /// Solidity JSON ABI file
        #[arg(short = 'a', long = "abi", value_name = "FILE")]
        abi: PathBuf,

        /// Only this function, error or event
        #[arg(short = 'f', long = "function", value_name = "NAME")]
        function: Option<String>,
    },

    /// Pack a type into slots and emit its field accessors
    Pack {
        /// YAML or JSON file with a list of type definitions
        #[arg(short = 't', long = "types", value_name = "FILE")]
        types: PathBuf,

        /// Name of the type definition to pack
        #[arg(long = "type", value_name = "NAME")]
        type_name: String,

        /// Where the packed words live
        #[arg(short = 's', long = "source", value_enum, default_value = "storage")]
        source: Source,
    },

    /// Decode call data with the generated decoder and print the arguments as JSON
    Reflect {
        /// Solidity JSON ABI file
        #[arg(short = 'a', long = "abi", value_name = "FILE")]
        abi: PathBuf,

        /// Function the call data is for
        #[arg(short = 'f', long = "function", value_name = "NAME")]
        function: String,

        /// Hex call data, selector included
        #[arg(short = 'd', long = "calldata", value_name = "HEX")]
        calldata: String,

        /// Pretty print JSON output
        #[arg(short = 'p', long = "pretty")]
        pretty: bool,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Source {
    Storage,
    Memory,
    Stack,
}

impl From<Source> for sol_abi_gen::WordSource {
    fn from(source: Source) -> Self {
        match source {
            Source::Storage => sol_abi_gen::WordSource::Storage,
            Source::Memory => sol_abi_gen::WordSource::Memory,
            Source::Stack => sol_abi_gen::WordSource::Stack,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    /* RUST_LOG wins over -v */
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let config = cmds::common::load_config(cli.config.as_deref())?;
    let output = cli.output.as_deref();

    match cli.command {
        Commands::Decode { abi, function } => {
            cmds::transcode::run(&abi, function.as_deref(), cmds::transcode::Direction::Decode, &config, output)?;
        }

        Commands::Encode { abi, function } => {
            cmds::transcode::run(&abi, function.as_deref(), cmds::transcode::Direction::Encode, &config, output)?;
        }

        Commands::Pack { types, type_name, source } => {
            cmds::pack::run(&types, &type_name, source.into(), &config, output)?;
        }

        Commands::Reflect {
            abi,
            function,
            calldata,
            pretty,
        } => {
            cmds::reflect::run(&abi, &function, &calldata, pretty, &config, output)?;
        }
    }

    Ok(())
}
