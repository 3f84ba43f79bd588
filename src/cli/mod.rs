pub mod config;
pub mod dashboard;
pub mod options;
pub mod report;
pub mod sheets;

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::error::{DescontosError, Result};
use crate::filters::{parse_cli_date, DateSelection, Filter};
use crate::settings::{pick_sheet, Settings};
use crate::sheet::{sheet_names, SourceFile};

#[derive(Parser)]
#[command(
    name = "descontos",
    version,
    about = "Discount-policy reports for billing spreadsheets."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the sheets of a workbook.
    Sheets {
        /// Spreadsheet (xlsx, xls, ods) or CSV file
        file: PathBuf,
    },
    /// Overview, policy analysis, charts and detail for one sheet.
    Report {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        filter: FilterArgs,
        /// Detail rows to print (0 = all; default from settings)
        #[arg(long)]
        limit: Option<usize>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Rows that break the discount policy, per category.
    Policy {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        filter: FilterArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Filter choices for the current selection.
    Options {
        #[command(flatten)]
        source: SourceArgs,
        /// Narrow the responsible choices to this sector
        #[arg(long)]
        sector: Option<String>,
        /// Narrow the date bounds to this responsible
        #[arg(long)]
        responsible: Option<String>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Interactive dashboard with live filters.
    Dashboard {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Show or change preferences.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Print a shell completion script.
    Completions {
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the current settings.
    Show,
    /// Change a setting: default_sheet or detail_limit.
    Set { key: String, value: String },
}

#[derive(Args, Clone)]
pub struct SourceArgs {
    /// Spreadsheet (xlsx, xls, ods) or CSV file
    pub file: PathBuf,
    /// Sheet to analyze (default: configured sheet, else the first)
    #[arg(long)]
    pub sheet: Option<String>,
}

#[derive(Args, Clone, Default)]
pub struct FilterArgs {
    /// Only this sector (exact match)
    #[arg(long)]
    pub sector: Option<String>,
    /// Only this responsible (exact match)
    #[arg(long)]
    pub responsible: Option<String>,
    /// Start date: YYYY-MM-DD or DD/MM/YYYY
    #[arg(long = "from")]
    pub from_date: Option<String>,
    /// End date: YYYY-MM-DD or DD/MM/YYYY
    #[arg(long = "to")]
    pub to_date: Option<String>,
}

impl FilterArgs {
    pub fn to_filter(&self) -> Result<Filter> {
        Ok(Filter {
            sector: self.sector.clone(),
            responsible: self.responsible.clone(),
            dates: DateSelection {
                from: self.from_date.as_deref().map(parse_cli_date).transpose()?,
                to: self.to_date.as_deref().map(parse_cli_date).transpose()?,
            },
        })
    }
}

#[derive(Args, Clone, Default)]
pub struct OutputArgs {
    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

/// Read the file and settle which sheet to analyze.
pub(crate) fn open_source(
    file: &Path,
    sheet: Option<&str>,
    settings: &Settings,
) -> Result<(SourceFile, String)> {
    let source = SourceFile::read(file)?;
    let sheet = match sheet {
        Some(s) => s.to_string(),
        None => {
            let names = sheet_names(&source)?;
            pick_sheet(settings, &names).ok_or_else(|| {
                DescontosError::Other(format!("{} has no sheets", source.name))
            })?
        }
    };
    Ok((source, sheet))
}
