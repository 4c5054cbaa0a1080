//! Shared CLI definitions for tabviz.
//!
//! Used by the main application and by the build script (manpage) and
//! gen_docs binary (command-line-options markdown).

use clap::{Command as ClapCommand, CommandFactory, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// File format for uploaded data (used to bypass extension-based detection).
/// When `--format` is not specified, format is detected from the file extension.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum FileFormat {
    /// Comma-separated values
    Csv,
    /// Tab-separated values
    Tsv,
    /// Excel (.xls, .xlsx, .xlsm, .xlsb)
    Excel,
}

impl FileFormat {
    /// Detect file format from path extension. Returns None when extension is missing or unknown.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Parse format from extension string (e.g. "csv", "xlsx").
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "tsv" => Some(Self::Tsv),
            "xls" | "xlsx" | "xlsm" | "xlsb" => Some(Self::Excel),
            _ => None,
        }
    }

    /// Field delimiter for delimited text formats.
    pub fn delimiter(&self) -> Option<u8> {
        match self {
            Self::Csv => Some(b','),
            Self::Tsv => Some(b'\t'),
            Self::Excel => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Tsv => "tsv",
            Self::Excel => "excel",
        }
    }
}

/// Chart kind produced by the `chart` subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Bar,
    Line,
    Pie,
    Scatter,
}

/// Reduction applied to the y values of each label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    #[default]
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl Aggregate {
    /// Capitalized name used in series labels.
    pub fn title(&self) -> &'static str {
        match self {
            Aggregate::Count => "Count",
            Aggregate::Sum => "Sum",
            Aggregate::Avg => "Avg",
            Aggregate::Min => "Min",
            Aggregate::Max => "Max",
        }
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title().to_lowercase())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Command-line arguments for tabviz
#[derive(Clone, Parser, Debug)]
#[command(
    name = "tabviz",
    version,
    about = "Tabular dataset ingestion, querying and chart aggregation",
    long_about = include_str!("../long_about.txt"),
    arg_required_else_help = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Directory holding stored datasets (overrides config [store] data_dir)
    #[arg(long = "data-dir", value_name = "DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level filter (error, warn, info, debug, trace). RUST_LOG takes precedence.
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines on stderr
    #[arg(long = "log-json", global = true, action)]
    pub log_json: bool,

    /// Generate default configuration file at ~/.config/tabviz/config.toml
    #[arg(long = "generate-config", action)]
    pub generate_config: bool,

    /// Force overwrite existing config file when using --generate-config
    #[arg(long = "force", requires = "generate_config", action)]
    pub force: bool,
}

#[derive(Clone, Subcommand, Debug)]
pub enum Command {
    /// Ingest a CSV, TSV or Excel file as a new dataset
    Ingest {
        /// Path to the data file
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Display name for the dataset
        #[arg(long = "name")]
        name: String,

        /// Optional free-text description
        #[arg(long = "description")]
        description: Option<String>,

        /// Force file format (csv, tsv, excel) instead of detecting it from the extension
        #[arg(long = "format", value_enum)]
        format: Option<FileFormat>,

        /// Excel sheet to load: 0-based index (e.g. 0) or sheet name (e.g. "Sales")
        #[arg(long = "sheet", value_name = "SHEET")]
        sheet: Option<String>,
    },

    /// List stored datasets, newest first
    List,

    /// Show row, column, type and missing-value statistics for a dataset
    Stats {
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Show the detected domain, insights and suggested charts for a dataset
    Insights {
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Filter, search, sort and paginate the rows of a dataset
    Query {
        #[arg(value_name = "ID")]
        id: String,

        /// Page number (1-based)
        #[arg(long = "page", default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
        page: u64,

        /// Rows per page (default from config [query] default_limit)
        #[arg(long = "limit", value_parser = clap::value_parser!(u64).range(1..=100))]
        limit: Option<u64>,

        /// Column to sort by
        #[arg(long = "sort-by", value_name = "COL")]
        sort_by: Option<String>,

        /// Sort direction
        #[arg(long = "sort-order", value_enum, default_value_t = SortOrder::Asc)]
        sort_order: SortOrder,

        /// Case-insensitive text matched against every column
        #[arg(long = "search", value_name = "TEXT")]
        search: Option<String>,

        /// Row filter as COL:OP:VALUE (OP is eq, ne, contains, gt, lt, gte, lte or in; `in` takes a comma-separated list). Repeatable.
        #[arg(long = "filter", value_name = "COL:OP:VALUE")]
        filters: Vec<String>,
    },

    /// Aggregate a dataset into chart series
    Chart {
        #[arg(value_name = "ID")]
        id: String,

        /// Chart type
        #[arg(long = "type", value_enum)]
        chart_type: ChartType,

        /// Column for the x axis (labels)
        #[arg(long = "x", value_name = "COL")]
        x_axis: String,

        /// Column for the y axis (values)
        #[arg(long = "y", value_name = "COL")]
        y_axis: Option<String>,

        /// Column whose values split bar and line charts into series
        #[arg(long = "group-by", value_name = "COL")]
        group_by: Option<String>,

        /// Aggregate applied to y values per label
        #[arg(long = "aggregate", value_enum, default_value_t = Aggregate::Count)]
        aggregate: Aggregate,
    },

    /// Delete a stored dataset
    Delete {
        #[arg(value_name = "ID")]
        id: String,
    },
}

/// Escape `|` and newlines for use in markdown table cells.
fn escape_table_cell(s: &str) -> String {
    s.replace('|', "\\|").replace(['\n', '\r'], " ")
}

fn value_placeholder(arg: &clap::Arg) -> String {
    arg.get_value_names()
        .map(|names| {
            names
                .iter()
                .map(|n: &clap::builder::Str| format!("<{}>", n.as_ref() as &str))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default()
}

fn render_args_table(cmd: &ClapCommand, out: &mut String) {
    out.push_str("| Option | Description |\n");
    out.push_str("|--------|-------------|\n");

    for arg in cmd.get_arguments() {
        let id = arg.get_id().as_ref().to_string();
        if id == "help" || id == "version" {
            continue;
        }

        let option_str = if arg.is_positional() {
            let placeholder = value_placeholder(arg);
            if arg.is_required_set() {
                placeholder
            } else {
                format!("[{placeholder}]")
            }
        } else {
            let mut parts = Vec::new();
            if let Some(s) = arg.get_short() {
                parts.push(format!("-{s}"));
            }
            if let Some(l) = arg.get_long() {
                parts.push(format!("--{l}"));
            }
            let op = parts.join(", ");
            let placeholder = if arg.get_action().takes_values() {
                value_placeholder(arg)
            } else {
                String::new()
            };
            if placeholder.is_empty() {
                op
            } else {
                format!("{op} {placeholder}")
            }
        };

        let help = arg
            .get_help()
            .map(|h| escape_table_cell(&h.to_string()))
            .unwrap_or_else(|| "-".to_string());

        out.push_str(&format!("| `{option_str}` | {help} |\n"));
    }
}

/// Render command-line options as markdown.
///
/// Used by the gen_docs binary; global options first, then one section per subcommand.
pub fn render_options_markdown() -> String {
    let mut cmd = Args::command();
    cmd.build();

    let mut out = String::from("# Command Line Options\n\n");

    out.push_str("## Usage\n\n```\n");
    out.push_str(&cmd.render_usage().to_string());
    out.push_str("\n```\n\n");

    out.push_str("## Options\n\n");
    render_args_table(&cmd, &mut out);

    for sub in cmd.get_subcommands() {
        if sub.get_name() == "help" {
            continue;
        }
        out.push_str(&format!("\n## `{}`\n\n", sub.get_name()));
        if let Some(about) = sub.get_about() {
            out.push_str(&format!("{about}\n\n"));
        }
        render_args_table(sub, &mut out);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_format_from_path() {
        assert_eq!(
            FileFormat::from_path(Path::new("data.csv")),
            Some(FileFormat::Csv)
        );
        assert_eq!(
            FileFormat::from_path(Path::new("data.TSV")),
            Some(FileFormat::Tsv)
        );
        assert_eq!(
            FileFormat::from_path(Path::new("book.XLSX")),
            Some(FileFormat::Excel)
        );
        assert_eq!(
            FileFormat::from_path(Path::new("legacy.xls")),
            Some(FileFormat::Excel)
        );
        assert_eq!(FileFormat::from_path(Path::new("notes.txt")), None);
        assert_eq!(FileFormat::from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_delimiters() {
        assert_eq!(FileFormat::Csv.delimiter(), Some(b','));
        assert_eq!(FileFormat::Tsv.delimiter(), Some(b'\t'));
        assert_eq!(FileFormat::Excel.delimiter(), None);
    }

    #[test]
    fn test_args_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_query_command() {
        let args = Args::try_parse_from([
            "tabviz",
            "query",
            "abc",
            "--page",
            "2",
            "--filter",
            "amt:gt:5",
            "--filter",
            "cat:in:A,B",
            "--sort-by",
            "amt",
            "--sort-order",
            "desc",
        ])
        .unwrap();
        match args.command {
            Some(Command::Query {
                id,
                page,
                limit,
                sort_order,
                filters,
                ..
            }) => {
                assert_eq!(id, "abc");
                assert_eq!(page, 2);
                assert_eq!(limit, None);
                assert_eq!(sort_order, SortOrder::Desc);
                assert_eq!(filters, vec!["amt:gt:5", "cat:in:A,B"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_limit_out_of_range_rejected() {
        assert!(Args::try_parse_from(["tabviz", "query", "abc", "--limit", "101"]).is_err());
        assert!(Args::try_parse_from(["tabviz", "query", "abc", "--page", "0"]).is_err());
    }

    #[test]
    fn test_chart_type_validated() {
        assert!(Args::try_parse_from(["tabviz", "chart", "abc", "--type", "radar", "--x", "a"]).is_err());
        let args =
            Args::try_parse_from(["tabviz", "chart", "abc", "--type", "pie", "--x", "a"]).unwrap();
        match args.command {
            Some(Command::Chart {
                chart_type,
                aggregate,
                ..
            }) => {
                assert_eq!(chart_type, ChartType::Pie);
                assert_eq!(aggregate, Aggregate::Count);
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let args = Args::try_parse_from([
            "tabviz", "chart", "abc", "--type", "bar", "--x", "a", "--y", "b", "--aggregate", "avg",
        ])
        .unwrap();
        match args.command {
            Some(Command::Chart { aggregate, .. }) => assert_eq!(aggregate, Aggregate::Avg),
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(Args::try_parse_from([
            "tabviz", "chart", "abc", "--type", "bar", "--x", "a", "--aggregate", "median",
        ])
        .is_err());
    }

    #[test]
    fn test_aggregate_display() {
        assert_eq!(Aggregate::Avg.to_string(), "avg");
        assert_eq!(Aggregate::Count.title(), "Count");
    }

    #[test]
    fn test_render_options_markdown_lists_subcommands() {
        let md = render_options_markdown();
        assert!(md.contains("## `query`"));
        assert!(md.contains("--generate-config"));
        assert!(md.contains("--filter"));
    }
}
