use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::access::AccessModifier;

#[derive(Debug, Clone, Parser)]
#[command(name = "jar-mapper")]
#[command(about = "Index obfuscated jars and maintain deobfuscation mappings for them")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, value_name = "FILE", global = true)]
    pub profile: Option<PathBuf>,

    #[arg(long, value_name = "FILE", global = true)]
    pub cache: Option<PathBuf>,

    #[arg(long, global = true)]
    pub no_cache: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    Index {
        jar: PathBuf,

        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    Refs {
        jar: PathBuf,

        entry: String,

        #[arg(short = 'm', long, value_name = "PATH")]
        mappings: Option<PathBuf>,

        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    Check {
        jar: PathBuf,

        mappings: PathBuf,

        #[arg(long)]
        write: bool,
    },
    Convert { input: PathBuf, output: PathBuf },
    Rename {
        jar: PathBuf,

        mappings: PathBuf,

        entry: String,

        #[arg(required_unless_present_any = ["clear", "access"])]
        name: Option<String>,

        #[arg(long, conflicts_with = "name")]
        clear: bool,

        #[arg(long, value_name = "MODIFIER")]
        access: Option<AccessModifier>,
    },
    Port {
        source: PathBuf,

        dest: PathBuf,

        mappings: PathBuf,

        #[arg(short = 'o', long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    Compare { left: PathBuf, right: PathBuf },
    Stats,
    Clear,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}
