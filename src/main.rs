use clap::Parser;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde::Serialize;
use std::path::PathBuf;
use tabviz::error_display::user_message_from_report;
use tabviz::{
    Aggregate, AppConfig, Args, ChartSpec, ChartType, ConfigManager, DatasetService, Filter,
    FsDatastore, LoadOptions, NewDataset, Query, SortOrder, APP_NAME,
};
use tabviz_cli::Command;

/// Build a row query from `query` subcommand arguments.
fn build_query(
    page: u64,
    limit: Option<u64>,
    sort_by: &Option<String>,
    sort_order: SortOrder,
    search: &Option<String>,
    filters: &[String],
    default_limit: usize,
) -> Result<Query> {
    let filters = filters
        .iter()
        .map(|expr| {
            Filter::parse_expr(expr).map_err(|e| eyre!("Invalid --filter '{}': {}", expr, e))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Query {
        page: page as usize,
        limit: limit.map(|l| l as usize).unwrap_or(default_limit),
        sort_by: sort_by.clone(),
        sort_order,
        search: search.clone().filter(|s| !s.is_empty()),
        filters,
    })
}

fn build_chart_spec(
    chart_type: ChartType,
    x_axis: &str,
    y_axis: &Option<String>,
    group_by: &Option<String>,
    aggregate: Aggregate,
) -> ChartSpec {
    let mut spec = ChartSpec::new(chart_type, x_axis).with_aggregate(aggregate);
    if let Some(y) = y_axis {
        spec = spec.with_y_axis(y.clone());
    }
    if let Some(group) = group_by {
        spec = spec.with_group_by(group.clone());
    }
    spec
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Apply `ingest` flags over the configured load options.
fn ingest_options(base: &LoadOptions, command: &Command) -> LoadOptions {
    let mut opts = base.clone();
    if let Command::Ingest { format, sheet, .. } = command {
        if let Some(format) = format {
            opts = opts.with_format(*format);
        }
        if let Some(sheet) = sheet {
            opts = opts.with_excel_sheet(sheet.clone());
        }
    }
    opts
}

fn run(command: &Command, data_dir: PathBuf, config: &AppConfig) -> Result<()> {
    let store = FsDatastore::new(data_dir);
    let mut service = DatasetService::from_config(store, config)?;

    match command {
        Command::Ingest {
            path,
            name,
            description,
            ..
        } => {
            let bytes = std::fs::read(path)?;
            let filename = path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            let mut upload = NewDataset::new(name.clone(), filename, bytes);
            if let Some(description) = description {
                upload = upload.with_description(description.clone());
            }
            let options = ingest_options(service.load_options(), command);
            let record = service.upload_with_options(upload, &options)?;
            print_json(&record.summary())
        }
        Command::List => print_json(&service.list()?),
        Command::Stats { id } => print_json(&service.stats(id)?),
        Command::Insights { id } => print_json(&service.insights(id)?),
        Command::Query {
            id,
            page,
            limit,
            sort_by,
            sort_order,
            search,
            filters,
        } => {
            let query = build_query(
                *page,
                *limit,
                sort_by,
                *sort_order,
                search,
                filters,
                service.default_limit(),
            )?;
            print_json(&service.query(id, &query)?)
        }
        Command::Chart {
            id,
            chart_type,
            x_axis,
            y_axis,
            group_by,
            aggregate,
        } => {
            let spec = build_chart_spec(*chart_type, x_axis, y_axis, group_by, *aggregate);
            print_json(&service.chart(id, &spec)?)
        }
        Command::Delete { id } => {
            service.delete(id)?;
            println!("Deleted dataset {}", id);
            Ok(())
        }
    }
}

fn handle_early_exit_flags(args: &Args) -> Result<Option<()>> {
    if args.generate_config {
        match ConfigManager::new(APP_NAME) {
            Ok(config_manager) => match config_manager.write_default_config(args.force) {
                Ok(config_path) => {
                    println!("Configuration file written to: {}", config_path.display());
                    return Ok(Some(()));
                }
                Err(e) => {
                    eprintln!("Error writing configuration file: {}", e);
                    std::process::exit(1);
                }
            },
            Err(e) => {
                eprintln!("Error initializing config manager: {}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(None)
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(()) = handle_early_exit_flags(&args)? {
        return Ok(());
    }

    color_eyre::install()?;

    let config = match AppConfig::load(APP_NAME) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    tabviz::logging::init(&level, args.log_json || config.logging.json)?;

    let Some(command) = &args.command else {
        return Ok(());
    };

    let data_dir = match &args.data_dir {
        Some(dir) => dir.clone(),
        None => config.store.resolve_data_dir(APP_NAME)?,
    };

    if let Err(e) = run(command, data_dir, &config) {
        let path = match command {
            Command::Ingest { path, .. } => Some(path.as_path()),
            _ => None,
        };
        eprintln!("Error: {}", user_message_from_report(&e, path));
        std::process::exit(1);
    }
    Ok(())
}
