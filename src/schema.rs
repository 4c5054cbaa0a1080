//! Schema inference: raw upload bytes to a typed [`Dataset`].
//!
//! Delimited text is read with polars (every column as text, header taken from
//! the first row) and workbooks with calamine. Both readers produce the same
//! intermediate grid, so header normalization, missing-value counting and
//! column typing behave identically whatever the source format was.

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;
use polars::prelude::{CsvParseOptions, CsvReadOptions, CsvReader, SerReader};
use std::collections::HashSet;
use std::io::Cursor;
use tracing::debug;

use crate::dataset::{Catalog, Column, ColumnKind, Dataset, Row};
use crate::error::EngineError;
use crate::error_display::user_message_from_polars;
use crate::source::{FileFormat, LoadOptions};
use crate::value::{parse_number, Value};

/// Parse `bytes` using the format implied by `filename`.
pub fn infer(bytes: &[u8], filename: &str) -> Result<Dataset, EngineError> {
    infer_with_options(bytes, filename, &LoadOptions::default())
}

/// Parse `bytes` with explicit load options (format override, delimiter, sheet).
pub fn infer_with_options(
    bytes: &[u8],
    filename: &str,
    options: &LoadOptions,
) -> Result<Dataset, EngineError> {
    let format = options.resolve_format(filename)?;
    let table = match format {
        FileFormat::Csv | FileFormat::Tsv => {
            let delimiter = options
                .delimiter
                .or_else(|| format.delimiter())
                .unwrap_or(b',');
            read_delimited(bytes, delimiter, format.name())?
        }
        FileFormat::Excel => read_workbook(bytes, options.excel_sheet.as_deref())?,
    };
    let dataset = build_dataset(table);
    debug!(
        filename,
        format = format.name(),
        rows = dataset.rows.len(),
        columns = dataset.catalog.len(),
        "inferred dataset schema"
    );
    Ok(dataset)
}

/// A source cell before typing.
#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Missing,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(String),
}

impl Cell {
    fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    fn number(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) => Some(*f),
            Cell::Text(s) => parse_number(s),
            _ => None,
        }
    }

    fn integer(&self) -> Option<i64> {
        match self {
            Cell::Int(i) => Some(*i),
            Cell::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Some(*f as i64),
            Cell::Text(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Cell::Missing => Value::missing(),
            Cell::Text(s) | Cell::DateTime(s) => Value::Text(s),
            Cell::Int(i) => Value::Int(i),
            Cell::Float(f) => Value::Float(f),
            Cell::Bool(b) => Value::Bool(b),
        }
    }
}

/// Header plus data rows, as read from the source.
struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

fn read_delimited(bytes: &[u8], delimiter: u8, format: &'static str) -> Result<RawTable, EngineError> {
    // infer_schema_length of 0 reads every column as text; typing happens later.
    let read_options = CsvReadOptions::default()
        .with_has_header(false)
        .with_infer_schema_length(Some(0))
        .with_parse_options(CsvParseOptions::default().with_separator(delimiter));
    let df = CsvReader::new(Cursor::new(bytes.to_vec()))
        .with_options(read_options)
        .finish()
        .map_err(|e| EngineError::parse(format, user_message_from_polars(&e)))?;

    let height = df.height();
    let mut grid: Vec<Vec<Cell>> = (0..height)
        .map(|_| Vec::with_capacity(df.width()))
        .collect();
    for column in df.get_columns() {
        let values = column
            .as_materialized_series()
            .str()
            .map_err(|e| EngineError::parse(format, user_message_from_polars(&e)))?;
        for (row_idx, value) in values.into_iter().enumerate() {
            grid[row_idx].push(match value {
                Some(s) if !s.is_empty() => Cell::Text(s.to_string()),
                _ => Cell::Missing,
            });
        }
    }

    let mut rows = grid.into_iter();
    let headers = rows
        .next()
        .ok_or_else(|| EngineError::parse(format, "no header row"))?
        .into_iter()
        .map(|cell| match cell {
            Cell::Text(s) => s,
            _ => String::new(),
        })
        .collect();
    Ok(RawTable {
        headers,
        rows: rows.collect(),
    })
}

fn read_workbook(bytes: &[u8], sheet: Option<&str>) -> Result<RawTable, EngineError> {
    let excel_err = |e: calamine::Error| EngineError::parse("excel", e);
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).map_err(excel_err)?;
    if workbook.sheet_names().is_empty() {
        return Err(EngineError::parse("excel", "workbook has no worksheets"));
    }
    let range = match sheet {
        Some(sheet_sel) => match sheet_sel.parse::<usize>() {
            Ok(idx) => workbook
                .worksheet_range_at(idx)
                .ok_or_else(|| EngineError::parse("excel", format!("no sheet at index {}", idx)))?
                .map_err(excel_err)?,
            Err(_) => workbook.worksheet_range(sheet_sel).map_err(excel_err)?,
        },
        None => workbook
            .worksheet_range_at(0)
            .ok_or_else(|| EngineError::parse("excel", "no first sheet"))?
            .map_err(excel_err)?,
    };

    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(header_row) => header_row
            .iter()
            .map(|c| calamine::DataType::as_string(c).unwrap_or_else(|| c.to_string()))
            .collect(),
        None => Vec::new(),
    };
    let rows = rows
        .map(|row| row.iter().map(excel_cell).collect())
        .collect();
    Ok(RawTable { headers, rows })
}

fn excel_cell(cell: &Data) -> Cell {
    match cell {
        Data::Empty | Data::Error(_) => Cell::Missing,
        Data::Int(i) => Cell::Int(*i),
        Data::Float(f) if f.is_nan() => Cell::Missing,
        Data::Float(f) => Cell::Float(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::String(s) if s.is_empty() => Cell::Missing,
        Data::String(s) => Cell::Text(s.clone()),
        Data::DateTime(_) | Data::DateTimeIso(_) => match excel_cell_to_naive_datetime(cell) {
            Some(dt) if dt.time() == NaiveTime::MIN => {
                Cell::DateTime(dt.format("%Y-%m-%d").to_string())
            }
            Some(dt) => Cell::DateTime(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => Cell::Text(cell.to_string()),
        },
        Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

/// Converts a calamine cell to NaiveDateTime (Excel serial or DateTimeIso).
fn excel_cell_to_naive_datetime(cell: &Data) -> Option<NaiveDateTime> {
    use calamine::DataType;
    if let Some(dt) = cell.as_datetime() {
        return Some(dt);
    }
    parse_naive_datetime_str(cell.get_datetime_iso()?)
}

/// Parses a date or datetime string; tries FORMATS in order, then date-only forms.
pub(crate) fn parse_naive_datetime_str(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    const FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M",
    ];
    for fmt in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d %B %Y", "%B %d, %Y"];
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d.and_time(NaiveTime::MIN));
        }
    }
    chrono::DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.naive_utc())
}

/// Trim, replace spaces with underscores, name blanks by position and
/// suffix repeats (`a`, `a_2`, `a_3`) so no column is lost.
fn normalize_headers(raw: &[String]) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::with_capacity(raw.len());
    let mut names = Vec::with_capacity(raw.len());
    for (idx, header) in raw.iter().enumerate() {
        let trimmed = header.trim();
        let base = if trimmed.is_empty() {
            format!("column_{}", idx + 1)
        } else {
            trimmed.replace(' ', "_")
        };
        let mut name = base.clone();
        let mut suffix = 2;
        while used.contains(&name) {
            name = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        used.insert(name.clone());
        names.push(name);
    }
    names
}

struct TypedColumn {
    kind: ColumnKind,
    dtype: &'static str,
    missing: usize,
    values: Vec<Value>,
}

fn type_column(cells: Vec<Cell>) -> TypedColumn {
    let missing = cells.iter().filter(|c| c.is_missing()).count();
    let present = || cells.iter().filter(|c| !c.is_missing());
    let non_missing = cells.len() - missing;

    if present().all(|c| c.number().is_some()) {
        // a column with gaps cannot be stored as integers
        let integral = missing == 0 && present().all(|c| c.integer().is_some());
        let values = cells
            .iter()
            .map(|cell| {
                if cell.is_missing() {
                    Value::missing()
                } else if integral {
                    cell.integer().map(Value::Int).unwrap_or_else(Value::missing)
                } else {
                    cell.number().map(Value::Float).unwrap_or_else(Value::missing)
                }
            })
            .collect();
        return TypedColumn {
            kind: ColumnKind::Numeric,
            dtype: if integral { "int64" } else { "float64" },
            missing,
            values,
        };
    }

    let dtype = if non_missing > 0 && missing == 0 && present().all(|c| matches!(c, Cell::Bool(_))) {
        "bool"
    } else if non_missing > 0 && present().all(|c| matches!(c, Cell::DateTime(_))) {
        "datetime"
    } else {
        "str"
    };
    TypedColumn {
        kind: ColumnKind::Categorical,
        dtype,
        missing,
        values: cells.into_iter().map(Cell::into_value).collect(),
    }
}

fn build_dataset(table: RawTable) -> Dataset {
    let names = normalize_headers(&table.headers);
    let n_rows = table.rows.len();

    let mut cells_by_column: Vec<Vec<Cell>> =
        names.iter().map(|_| Vec::with_capacity(n_rows)).collect();
    for row in table.rows {
        let mut cells = row.into_iter();
        for column in cells_by_column.iter_mut() {
            column.push(cells.next().unwrap_or(Cell::Missing));
        }
    }

    let mut columns = Vec::with_capacity(names.len());
    let mut missing_values = IndexMap::with_capacity(names.len());
    let mut data_types = IndexMap::with_capacity(names.len());
    let mut value_columns = Vec::with_capacity(names.len());
    for (name, cells) in names.iter().zip(cells_by_column) {
        let typed = type_column(cells);
        columns.push(Column::new(name.clone(), typed.kind));
        missing_values.insert(name.clone(), typed.missing);
        data_types.insert(name.clone(), typed.dtype.to_string());
        value_columns.push(typed.values.into_iter());
    }

    let rows = (0..n_rows)
        .map(|_| {
            names
                .iter()
                .zip(value_columns.iter_mut())
                .map(|(name, values)| (name.clone(), values.next().unwrap_or_else(Value::missing)))
                .collect::<Row>()
        })
        .collect();

    Dataset {
        catalog: Catalog::new(columns),
        rows,
        missing_values,
        data_types,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_inference() {
        let csv = b"Product Name,price,qty\nWidget,9.99,3\nGadget,,2\n";
        let ds = infer(csv, "items.csv").unwrap();
        let names: Vec<&str> = ds.catalog.names().collect();
        assert_eq!(names, vec!["Product_Name", "price", "qty"]);
        assert_eq!(ds.catalog.get("Product_Name").unwrap().kind, ColumnKind::Categorical);
        assert_eq!(ds.catalog.get("price").unwrap().kind, ColumnKind::Numeric);
        assert_eq!(ds.data_types["price"], "float64");
        assert_eq!(ds.data_types["qty"], "int64");
        assert_eq!(ds.missing_values["price"], 1);
        assert_eq!(ds.missing_values["qty"], 0);
        assert_eq!(ds.rows[0]["price"], Value::Float(9.99));
        assert_eq!(ds.rows[1]["price"], Value::missing());
        assert_eq!(ds.rows[1]["qty"], Value::Int(2));
    }

    #[test]
    fn test_every_row_has_every_column() {
        let csv = b"a,b,c\n1,,\n,,x\n";
        let ds = infer(csv, "gaps.csv").unwrap();
        for row in &ds.rows {
            assert_eq!(row.len(), 3);
            for name in ds.catalog.names() {
                assert!(row.contains_key(name));
            }
        }
        // all-missing column is vacuously numeric
        assert_eq!(ds.catalog.get("b").unwrap().kind, ColumnKind::Numeric);
        assert_eq!(ds.missing_values["b"], 2);
    }

    #[test]
    fn test_duplicate_headers_kept() {
        let csv = b"a,a ,b,a\n1,2,3,4\n";
        let ds = infer(csv, "dupes.csv").unwrap();
        let names: Vec<&str> = ds.catalog.names().collect();
        assert_eq!(names, vec!["a", "a_2", "b", "a_3"]);
        assert_eq!(ds.rows[0]["a_3"], Value::Int(4));
    }

    #[test]
    fn test_blank_header_named_by_position() {
        assert_eq!(
            normalize_headers(&["x".to_string(), "  ".to_string(), "first name".to_string()]),
            vec!["x", "column_2", "first_name"]
        );
    }

    #[test]
    fn test_tsv_uses_tab_delimiter() {
        let tsv = b"name\tscore\nann\t4.5\n";
        let ds = infer(tsv, "scores.tsv").unwrap();
        assert_eq!(ds.rows[0]["score"], Value::Float(4.5));
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(matches!(
            infer(b"a,b\n1,2\n", "data.json"),
            Err(EngineError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_corrupt_workbook_is_parse_error() {
        assert!(matches!(
            infer(b"definitely not a zip archive", "book.xlsx"),
            Err(EngineError::Parse { .. })
        ));
    }

    #[test]
    fn test_type_column_mixed_text_is_categorical() {
        let typed = type_column(vec![
            Cell::Text("1".into()),
            Cell::Text("two".into()),
            Cell::Missing,
        ]);
        assert_eq!(typed.kind, ColumnKind::Categorical);
        assert_eq!(typed.dtype, "str");
        assert_eq!(typed.missing, 1);
        assert_eq!(typed.values[0], Value::from("1"));
        assert_eq!(typed.values[2], Value::missing());
    }

    #[test]
    fn test_type_column_whole_floats_are_integers() {
        let typed = type_column(vec![Cell::Float(2.0), Cell::Int(3)]);
        assert_eq!(typed.dtype, "int64");
        assert_eq!(typed.values, vec![Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn test_type_column_bool_and_dates() {
        let bools = type_column(vec![Cell::Bool(true), Cell::Bool(false)]);
        assert_eq!(bools.dtype, "bool");
        assert_eq!(bools.kind, ColumnKind::Categorical);

        let dates = type_column(vec![
            Cell::DateTime("2024-01-01".into()),
            Cell::Missing,
        ]);
        assert_eq!(dates.dtype, "datetime");
    }

    #[test]
    fn test_parse_naive_datetime_str() {
        assert!(parse_naive_datetime_str("2024-03-05").is_some());
        assert!(parse_naive_datetime_str("2024-03-05 10:11:12").is_some());
        assert!(parse_naive_datetime_str("03/05/2024").is_some());
        assert!(parse_naive_datetime_str("2024-03-05T10:11:12Z").is_some());
        assert!(parse_naive_datetime_str("yesterday").is_none());
        assert!(parse_naive_datetime_str("").is_none());
    }
}
