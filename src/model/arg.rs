use clap::{Parser, Subcommand, ValueEnum};

use crate::admin::types::ExportFormat;

/// kiro.rs credential pool admin console
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Server base URL, overrides `baseUrl` from the config file
    #[arg(long)]
    pub base_url: Option<String>,

    /// Admin API key, overrides `adminApiKey` from the config file
    #[arg(long)]
    pub api_key: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show one page of the credential pool
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Defaults to `pageSize` from the config file
        #[arg(long)]
        page_size: Option<u32>,
    },

    /// Show a page and keep it refreshed
    Watch {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        page_size: Option<u32>,
    },

    /// Enable a credential
    Enable { id: u64 },

    /// Disable a credential
    Disable { id: u64 },

    /// Set credential priority (lower number = higher priority)
    Priority { id: u64, priority: u32 },

    /// Reset failure count and re-enable
    Reset { id: u64 },

    /// Query credential balance
    Balance { id: u64 },

    /// Add a single credential
    Add {
        #[arg(long)]
        refresh_token: String,
        #[arg(long, value_enum, default_value_t = AuthMethodArg::Social)]
        auth_method: AuthMethodArg,
        #[arg(long)]
        client_id: Option<String>,
        #[arg(long)]
        client_secret: Option<String>,
        #[arg(long)]
        priority: Option<u32>,
        #[arg(long)]
        region: Option<String>,
    },

    /// Delete a credential
    Delete { id: u64 },

    /// Import credentials from a .json or .csv file
    Import { file: String },

    /// Delete several credentials at once
    BatchDelete {
        #[arg(required = true)]
        ids: Vec<u64>,
    },

    /// Export every credential (including secrets) to credentials.<format>
    Export {
        #[arg(long, value_enum, default_value_t = ExportFormatArg::Json)]
        format: ExportFormatArg,
        /// Defaults to `exportDir` from the config file
        #[arg(long)]
        output_dir: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthMethodArg {
    Social,
    Idc,
}

impl AuthMethodArg {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethodArg::Social => "social",
            AuthMethodArg::Idc => "idc",
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormatArg {
    Json,
    Csv,
}

impl From<ExportFormatArg> for ExportFormat {
    fn from(value: ExportFormatArg) -> Self {
        match value {
            ExportFormatArg::Json => ExportFormat::Json,
            ExportFormatArg::Csv => ExportFormat::Csv,
        }
    }
}
