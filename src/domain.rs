use std::io::Error;

use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;

use crate::filter::Dimension;

#[derive(Debug)]
pub enum DashError {
    IoError(Error),
    PolarsError(PolarsError),
    LoadingFailed(String),
    FileNotFound,
    PermissionDenied,
}

impl From<Error> for DashError {
    fn from(err: Error) -> Self {
        DashError::IoError(err)
    }
}

impl From<PolarsError> for DashError {
    fn from(err: PolarsError) -> Self {
        DashError::PolarsError(err)
    }
}

/// Runtime settings, passed explicitly instead of living in module scope.
#[derive(Debug, Clone, Setters)]
#[setters(into)]
pub struct DashConfig {
    /// Terminal event poll timeout in milliseconds.
    pub event_poll_time: u64,
    /// Hard cap on rendered column width.
    pub max_column_width: usize,
    /// File name the filtered view is exported under, next to the input file.
    pub export_file_name: String,
}

impl Default for DashConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            max_column_width: 40,
            export_file_name: "filtered_employee_data.csv".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    ToggleView,
    OpenPicker(Dimension),
    Search,
    ResetFilters,
    Export,
    CopyRow,
    Help,
    NextChartKpi,
    PrevChartKpi,
    ToggleSelect,
    Enter,
    Exit,
    Resize(usize, usize),
    RawKey(KeyEvent),
}

pub const HELP_TEXT: &str = "
 Employee performance dashboard

 Tab          switch between table and cards view
 Up/Down      move the row selection
 PgUp/PgDn    move a page at a time
 Home/End     jump to the first / last row
 Left/Right   scroll columns (table view)

 e s l o      pick employees / supervisors / levels / locations
 /            search by employee name
 r            reset all filters

 [ ]          change the chart KPI (cards view)
 d            export the filtered rows as CSV
 y            copy the selected row to the clipboard

 ?            toggle this help
 q            quit
";
