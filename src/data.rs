use std::collections::HashSet;
use std::fs;
use std::io::{Cursor, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use encoding_rs::WINDOWS_1252;
use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::domain::DashError;

/// A single tabular value. Numeric columns produce `Number`, everything else
/// `Text`; nulls and blank fields become `Missing`. `as_number` is the only
/// place a `Text` cell is ever coerced to a number.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(String),
    Missing,
}

impl Cell {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => s.trim().parse().ok(),
            Cell::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    /// Rendering used for the table, filter matching and CSV export.
    /// Integral floats print without a decimal point so count columns
    /// survive a load/export round trip.
    pub fn display(&self) -> String {
        match self {
            Cell::Number(n) => format!("{n}"),
            Cell::Text(s) => s.clone(),
            Cell::Missing => String::new(),
        }
    }
}

pub struct Column {
    pub name: String,
    pub cells: Vec<Cell>,
}

impl Column {
    pub fn as_string(&self) -> String {
        format!("\"{}\", # rows {}", self.name, self.cells.len())
    }
}

/// The loaded report. Immutable after `load`; filtered views are row-index
/// vectors into it, never copies.
pub struct Table {
    columns: Vec<Column>,
    height: usize,
}

impl Table {
    pub fn load(path: &Path, separator: u8) -> Result<Self, DashError> {
        check_is_file(path)?;

        let start_time = Instant::now();
        let frame = match load_csv_utf8(path, separator) {
            Ok(df) => df,
            Err(e) => {
                // One retry decoding the raw bytes as Windows-1252 before
                // giving up. Reports like these regularly arrive re-exported
                // from spreadsheets in a legacy encoding.
                warn!("CSV load failed ({e}), retrying as Windows-1252");
                load_csv_latin1(path, separator)?
            }
        };
        let table = Self::from_frame(&frame)?;
        info!(
            "Loaded {} rows, {} columns in {}ms",
            table.height(),
            table.columns.len(),
            start_time.elapsed().as_millis()
        );
        for c in table.columns.iter() {
            debug!("Column: {}", c.as_string());
        }
        Ok(table)
    }

    /// Converts a polars frame into the owned cell store. Each column is
    /// converted in its own rayon task.
    pub fn from_frame(df: &DataFrame) -> Result<Self, DashError> {
        let c_: Result<Vec<Column>, PolarsError> = df
            .get_column_names()
            .par_iter()
            .map(|name| convert_column(df, name))
            .collect();
        let columns = c_?;

        let mut seen = HashSet::new();
        for c in columns.iter() {
            if !seen.insert(c.name.as_str()) {
                return Err(DashError::LoadingFailed(format!(
                    "duplicate column \"{}\" after trimming",
                    c.name
                )));
            }
        }

        let height = columns.first().map(|c| c.cells.len()).unwrap_or(0);
        Ok(Table { columns, height })
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Writes the given rows as CSV, header first, columns in table order,
    /// no index column.
    pub fn write_csv<W: Write>(&self, rows: &[usize], out: &mut W) -> std::io::Result<()> {
        let header = self
            .columns
            .iter()
            .map(|c| csv_field(&c.name))
            .collect::<Vec<String>>()
            .join(",");
        writeln!(out, "{header}")?;
        for &row in rows {
            writeln!(out, "{}", self.row_as_csv(row))?;
        }
        Ok(())
    }

    pub fn row_as_csv(&self, row: usize) -> String {
        self.columns
            .iter()
            .map(|c| csv_field(&c.cells[row].display()))
            .collect::<Vec<String>>()
            .join(",")
    }
}

fn csv_field(value: &str) -> String {
    let needs_escaping = value.contains('"');
    let needs_wrapping =
        needs_escaping || value.contains(',') || value.contains('\n') || value.contains('\r');
    let mut out = String::from(value);

    if needs_escaping {
        out = out.replace('"', "\"\"");
    }
    if needs_wrapping {
        out = format!("\"{out}\"");
    }
    out
}

fn check_is_file(path: &Path) -> Result<(), DashError> {
    let metadata = fs::metadata(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => DashError::FileNotFound,
        ErrorKind::PermissionDenied => DashError::PermissionDenied,
        _ => DashError::IoError(e),
    })?;
    if !metadata.is_file() {
        return Err(DashError::LoadingFailed("Not a file!".into()));
    }
    Ok(())
}

fn load_csv_utf8(path: &Path, separator: u8) -> Result<DataFrame, PolarsError> {
    let pathbuf = PathBuf::from(path);
    LazyCsvReader::new(PlPath::Local(pathbuf.as_path().into()))
        .with_has_header(true)
        .with_separator(separator)
        .finish()?
        .collect()
}

fn load_csv_latin1(path: &Path, separator: u8) -> Result<DataFrame, DashError> {
    let bytes = fs::read(path)?;
    let (text, _, _) = WINDOWS_1252.decode(&bytes);
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .map_parse_options(|opts| opts.with_separator(separator))
        .into_reader_with_file_handle(Cursor::new(text.into_owned().into_bytes()))
        .finish()?;
    Ok(df)
}

fn convert_column(df: &DataFrame, col_name: &str) -> Result<Column, PolarsError> {
    let name = col_name.trim().to_string();

    if is_numeric_type(df.column(col_name)?.dtype()) {
        let col = df.column(col_name)?.cast(&DataType::Float64)?;
        let series = col.f64()?;
        let cells = series
            .into_iter()
            .map(|v| match v {
                Some(n) => Cell::Number(n),
                None => Cell::Missing,
            })
            .collect();
        return Ok(Column { name, cells });
    }

    let col = df.column(col_name)?.cast(&DataType::String)?;
    let series = col.str()?;
    let mut cells = Vec::with_capacity(series.len());
    for value in series.into_iter() {
        let cell = match value {
            Some(s) if !s.trim().is_empty() => Cell::Text(s.to_string()),
            _ => Cell::Missing,
        };
        cells.push(cell);
    }
    Ok(Column { name, cells })
}

fn is_numeric_type(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> DataFrame {
        df![
            " Employee Name " => ["Asha", "Bela", "Chandra"],
            "Level" => ["L1", "L2", "L1"],
            "Total Connected" => [Some(10i64), None, Some(4)],
            "Notes" => [Some("ok"), Some("  "), None]
        ]
        .unwrap()
    }

    #[test]
    fn from_frame_trims_headers_and_tags_cells() {
        let table = Table::from_frame(&sample_frame()).unwrap();
        assert_eq!(table.height(), 3);
        assert_eq!(
            table.column_names(),
            vec!["Employee Name", "Level", "Total Connected", "Notes"]
        );

        let connected = table.column("Total Connected").unwrap();
        assert_eq!(connected.cells[0], Cell::Number(10.0));
        assert_eq!(connected.cells[1], Cell::Missing);

        // Blank and null strings both collapse to Missing.
        let notes = table.column("Notes").unwrap();
        assert_eq!(notes.cells[0], Cell::Text("ok".to_string()));
        assert_eq!(notes.cells[1], Cell::Missing);
        assert_eq!(notes.cells[2], Cell::Missing);
    }

    #[test]
    fn duplicate_trimmed_headers_are_rejected() {
        let df = df![
            "Level " => ["L1"],
            " Level" => ["L2"]
        ]
        .unwrap();
        assert!(matches!(
            Table::from_frame(&df),
            Err(DashError::LoadingFailed(_))
        ));
    }

    #[test]
    fn as_number_is_the_single_coercion_point() {
        assert_eq!(Cell::Number(2.5).as_number(), Some(2.5));
        assert_eq!(Cell::Text(" 10 ".into()).as_number(), Some(10.0));
        assert_eq!(Cell::Text("n/a".into()).as_number(), None);
        assert_eq!(Cell::Missing.as_number(), None);
    }

    #[test]
    fn display_keeps_counts_integral() {
        assert_eq!(Cell::Number(10.0).display(), "10");
        assert_eq!(Cell::Number(2.5).display(), "2.5");
        assert_eq!(Cell::Missing.display(), "");
    }

    #[test]
    fn csv_fields_are_quoted_when_needed() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn load_reads_the_fixture() {
        let table = Table::load(Path::new("tests/fixtures/employees.csv"), b',').unwrap();
        assert_eq!(table.height(), 6);
        assert!(table.column("Employee Name").is_some());
        assert!(table.column("Total Talktime").is_some());
    }

    #[test]
    fn load_falls_back_to_latin1() {
        let mut path = std::env::temp_dir();
        path.push("perfdash_latin1_test.csv");
        // 0xE9 is "é" in Latin-1 and invalid UTF-8 on its own.
        let bytes = b"Employee Name,Total Connected\nRen\xe9e,5\n";
        fs::write(&path, bytes).unwrap();

        let table = Table::load(&path, b',').unwrap();
        let names = table.column("Employee Name").unwrap();
        assert_eq!(names.cells[0], Cell::Text("Ren\u{e9}e".to_string()));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn export_round_trips_cell_values() {
        let table = Table::from_frame(&sample_frame()).unwrap();
        let rows: Vec<usize> = (0..table.height()).collect();

        let mut path = std::env::temp_dir();
        path.push("perfdash_roundtrip_test.csv");
        let mut buffer = Vec::new();
        table.write_csv(&rows, &mut buffer).unwrap();
        fs::write(&path, &buffer).unwrap();

        let reloaded = Table::load(&path, b',').unwrap();
        assert_eq!(reloaded.column_names(), table.column_names());
        assert_eq!(reloaded.height(), table.height());
        for (orig, back) in table.columns().iter().zip(reloaded.columns()) {
            assert_eq!(orig.cells, back.cells, "column {}", orig.name);
        }
        let _ = fs::remove_file(&path);
    }
}
