use clap::{Parser, Subcommand, ValueEnum};
use cloudranger::Provider;
use std::path::PathBuf;

/*-------------------------------------------------------------------------------------------------
  Command Line Interface (CLI) Arguments
-------------------------------------------------------------------------------------------------*/

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Identify the cloud provider and region of IP addresses.",
    long_about = None
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Logging verbosity
    #[command(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Look up the provider and region owning IP addresses
    Lookup {
        /// Load ranges from a `cidr,provider,region` CSV file instead of the embedded dataset
        #[arg(short = 'd', long)]
        data: Option<PathBuf>,

        /// Output format
        #[arg(short = 'o', long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,

        /// List every range containing each address, not only the most specific one
        #[arg(short = 'a', long)]
        all: bool,

        /// IP addresses to look up
        #[arg(required = true)]
        addresses: Vec<String>,
    },

    /// Summarize the providers, regions, and ranges in the dataset
    Providers {
        /// Load ranges from a `cidr,provider,region` CSV file instead of the embedded dataset
        #[arg(short = 'd', long)]
        data: Option<PathBuf>,
    },

    /// Fetch the published provider feeds and write a `cidr,provider,region` CSV dataset
    Fetch {
        /// Fetch only these providers (aws, azure, cloudflare, gcp, linode, oracle)
        #[arg(short = 'p', long = "provider")]
        providers: Vec<Provider>,

        /// Write the dataset to this file instead of stdout
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },
}

/*--------------------------------------------------------------------------------------
  Output Format
--------------------------------------------------------------------------------------*/

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table of lookup results
    Table,

    /// JSON array of lookup results
    Json,

    /// CSV lookup results
    Csv,
}
