use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use tracing::{error, info, trace};

use crate::data::Table;
use crate::domain::{DashConfig, DashError, Message};
use crate::filter::{self, Dimension, DimensionBindings, Selection};
use crate::input::{InputState, SearchInput};
use crate::kpi::{self, ResolvedKpi};
use crate::ui::TABLE_CHROME_HEIGHT;

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    DASHBOARD,
    PICKER,
    SEARCH,
    HELP,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewMode {
    TABLE,
    CARDS,
}

/// Multi select popup over the distinct values of one dimension column.
pub struct PickerState {
    pub dimension: Dimension,
    pub values: Vec<(String, usize)>,
    pub checked: BTreeSet<String>,
    pub cursor: usize,
}

pub struct Model {
    config: DashConfig,
    pub status: Status,
    source: PathBuf,
    table: Table,
    bindings: DimensionBindings,
    kpis: Vec<ResolvedKpi>,
    selection: Selection,
    rows: Vec<usize>,
    modus: Modus,
    view: ViewMode,
    selected: usize,
    offset_row: usize,
    offset_col: usize,
    chart_kpi: usize,
    picker: Option<PickerState>,
    input: SearchInput,
    last_input: InputState,
    clipboard: Option<Clipboard>,
    width: usize,
    height: usize,
    status_message: String,
    last_status_message_update: Instant,
}

impl Model {
    pub fn load(path: PathBuf, separator: u8, config: &DashConfig) -> Result<Self, DashError> {
        let table = Table::load(&path, separator)?;
        Self::from_table(table, path, config)
    }

    pub fn from_table(
        table: Table,
        source: PathBuf,
        config: &DashConfig,
    ) -> Result<Self, DashError> {
        let bindings = DimensionBindings::resolve(&table);
        let kpis = kpi::resolve_kpis(&table);
        for dim in Dimension::ALL {
            if bindings.column(dim).is_none() {
                info!("No column found for the {} dimension", dim.label());
            }
        }
        for k in kpis.iter().filter(|k| k.column.is_none()) {
            info!("KPI \"{}\" did not resolve to a column", k.def.label);
        }

        let rows = (0..table.height()).collect();
        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            source,
            table,
            bindings,
            kpis,
            selection: Selection::default(),
            rows,
            modus: Modus::DASHBOARD,
            view: ViewMode::TABLE,
            selected: 0,
            offset_row: 0,
            offset_col: 0,
            chart_kpi: 0,
            picker: None,
            input: SearchInput::default(),
            last_input: InputState::default(),
            clipboard: None,
            width: 80,
            height: 24,
            status_message: String::new(),
            last_status_message_update: Instant::now(),
        };
        model.set_status_message(format!("Loaded {} rows", model.table.height()));
        Ok(model)
    }

    // -------------------- Accessors for the view ---------------------- //

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn kpis(&self) -> &[ResolvedKpi] {
        &self.kpis
    }

    pub fn bindings(&self) -> &DimensionBindings {
        &self.bindings
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn view(&self) -> ViewMode {
        self.view
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    /// Absolute table row behind the current selection.
    pub fn selected_row(&self) -> Option<usize> {
        self.rows.get(self.selected).copied()
    }

    pub fn offset_row(&self) -> usize {
        self.offset_row
    }

    pub fn offset_col(&self) -> usize {
        self.offset_col
    }

    pub fn chart_kpi(&self) -> &ResolvedKpi {
        &self.kpis[self.chart_kpi]
    }

    pub fn picker(&self) -> Option<&PickerState> {
        self.picker.as_ref()
    }

    pub fn show_help(&self) -> bool {
        self.modus == Modus::HELP
    }

    pub fn searching(&self) -> bool {
        self.modus == Modus::SEARCH
    }

    pub fn input_state(&self) -> &InputState {
        &self.last_input
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    /// Time since the status message last changed; the view fades stale
    /// messages back to the key hints.
    pub fn status_age(&self) -> std::time::Duration {
        self.last_status_message_update.elapsed()
    }

    pub fn source_name(&self) -> String {
        self.source
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string()
    }

    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::SEARCH
    }

    pub fn visible_rows(&self) -> usize {
        std::cmp::max(self.height.saturating_sub(TABLE_CHROME_HEIGHT), 1)
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    // -------------------- Update ---------------------- //

    pub fn update(&mut self, message: Message) -> Result<(), DashError> {
        match self.modus {
            Modus::DASHBOARD => match message {
                Message::Quit => self.quit(),
                Message::MoveDown => self.select_down(1),
                Message::MoveUp => self.select_up(1),
                Message::MovePageDown => self.select_down(self.visible_rows()),
                Message::MovePageUp => self.select_up(self.visible_rows()),
                Message::MoveBeginning => {
                    self.selected = 0;
                    self.scroll_into_view();
                }
                Message::MoveEnd => {
                    self.selected = self.rows.len().saturating_sub(1);
                    self.scroll_into_view();
                }
                Message::MoveLeft => self.offset_col = self.offset_col.saturating_sub(1),
                Message::MoveRight => {
                    let last = self.table.columns().len().saturating_sub(1);
                    self.offset_col = std::cmp::min(self.offset_col + 1, last);
                }
                Message::ToggleView => self.toggle_view(),
                Message::OpenPicker(dim) => self.open_picker(dim),
                Message::Search => self.enter_search(),
                Message::ResetFilters => {
                    self.selection.clear();
                    self.refilter();
                }
                Message::Export => self.export(),
                Message::CopyRow => self.copy_row(),
                Message::Help => self.modus = Modus::HELP,
                Message::NextChartKpi => self.chart_kpi = (self.chart_kpi + 1) % self.kpis.len(),
                Message::PrevChartKpi => {
                    self.chart_kpi = (self.chart_kpi + self.kpis.len() - 1) % self.kpis.len()
                }
                Message::Resize(width, height) => self.resize(width, height),
                _ => (),
            },
            Modus::PICKER => match message {
                Message::Quit => self.quit(),
                Message::MoveDown => self.move_picker_cursor(1),
                Message::MoveUp => self.move_picker_cursor(-1),
                Message::MovePageDown => self.move_picker_cursor(10),
                Message::MovePageUp => self.move_picker_cursor(-10),
                Message::ToggleSelect => self.toggle_picker_value(),
                Message::Enter => self.commit_picker(),
                Message::Exit => {
                    self.picker = None;
                    self.modus = Modus::DASHBOARD;
                }
                Message::Resize(width, height) => self.resize(width, height),
                _ => (),
            },
            Modus::SEARCH => match message {
                Message::RawKey(key) => self.raw_input(key),
                Message::Resize(width, height) => self.resize(width, height),
                _ => (),
            },
            Modus::HELP => match message {
                Message::Quit => self.quit(),
                Message::Help | Message::Enter | Message::Exit => self.modus = Modus::DASHBOARD,
                Message::Resize(width, height) => self.resize(width, height),
                _ => (),
            },
        }
        Ok(())
    }

    // -------------------- Control handling functions ---------------------- //

    fn resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.width, width, self.height, height
        );
        self.width = width;
        self.height = height;
        self.scroll_into_view();
    }

    fn toggle_view(&mut self) {
        self.view = match self.view {
            ViewMode::TABLE => ViewMode::CARDS,
            ViewMode::CARDS => ViewMode::TABLE,
        };
        trace!("Switched to {:?} view", self.view);
    }

    fn select_down(&mut self, step: usize) {
        if self.rows.is_empty() {
            return;
        }
        self.selected = std::cmp::min(self.selected + step, self.rows.len() - 1);
        self.scroll_into_view();
    }

    fn select_up(&mut self, step: usize) {
        self.selected = self.selected.saturating_sub(step);
        self.scroll_into_view();
    }

    fn scroll_into_view(&mut self) {
        let visible = self.visible_rows();
        if self.selected < self.offset_row {
            self.offset_row = self.selected;
        } else if self.selected >= self.offset_row + visible {
            self.offset_row = self.selected + 1 - visible;
        }
    }

    fn refilter(&mut self) {
        self.rows = filter::apply(&self.table, &self.bindings, &self.selection);
        self.selected = 0;
        self.offset_row = 0;
        self.set_status_message(format!(
            "{} of {} rows",
            self.rows.len(),
            self.table.height()
        ));
    }

    fn open_picker(&mut self, dim: Dimension) {
        let Some(column) = self.bindings.column(dim).map(str::to_string) else {
            self.set_status_message(format!("{} column unavailable", dim.label()));
            return;
        };
        let values = filter::distinct_values(&self.table, &column);
        if values.is_empty() {
            self.set_status_message(format!("No {} values to pick from", dim.label()));
            return;
        }
        self.picker = Some(PickerState {
            dimension: dim,
            values,
            checked: self.selection.picks(dim).clone(),
            cursor: 0,
        });
        self.modus = Modus::PICKER;
    }

    fn move_picker_cursor(&mut self, step: i32) {
        if let Some(picker) = self.picker.as_mut() {
            let last = picker.values.len().saturating_sub(1) as i32;
            picker.cursor = (picker.cursor as i32 + step).clamp(0, last) as usize;
        }
    }

    fn toggle_picker_value(&mut self) {
        if let Some(picker) = self.picker.as_mut()
            && let Some((value, _)) = picker.values.get(picker.cursor)
        {
            if !picker.checked.remove(value) {
                picker.checked.insert(value.clone());
            }
        }
    }

    fn commit_picker(&mut self) {
        if let Some(picker) = self.picker.take() {
            *self.selection.picks_mut(picker.dimension) = picker.checked;
            self.refilter();
        }
        self.modus = Modus::DASHBOARD;
    }

    fn enter_search(&mut self) {
        self.modus = Modus::SEARCH;
        self.input.reset(&self.selection.name_query);
        self.last_input = self.input.state();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        self.last_input = self.input.read(key);
        if self.last_input.finished {
            self.modus = Modus::DASHBOARD;
            if !self.last_input.canceled {
                self.selection.name_query = self.last_input.text.clone();
                self.refilter();
            }
        }
    }

    fn export(&mut self) {
        let path = self.source.with_file_name(&self.config.export_file_name);
        match self.write_export(&path) {
            Ok(_) => {
                info!("Exported {} rows to {}", self.rows.len(), path.display());
                self.set_status_message(format!(
                    "Exported {} rows to {}",
                    self.rows.len(),
                    path.display()
                ));
            }
            Err(e) => {
                error!("Export to {} failed: {:?}", path.display(), e);
                self.set_status_message(format!("Export failed: {e:?}"));
            }
        }
    }

    fn write_export(&self, path: &Path) -> Result<(), DashError> {
        let file = File::create(path)?;
        let mut out = BufWriter::new(file);
        self.table.write_csv(&self.rows, &mut out)?;
        out.flush()?;
        Ok(())
    }

    fn copy_row(&mut self) {
        let Some(row) = self.selected_row() else {
            self.set_status_message("Nothing to copy");
            return;
        };
        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(clipboard) => self.clipboard = Some(clipboard),
                Err(e) => {
                    self.set_status_message(format!("Clipboard unavailable: {e}"));
                    return;
                }
            }
        }
        let Some(clipboard) = self.clipboard.as_mut() else {
            return;
        };
        match clipboard.set_text(self.table.row_as_csv(row)) {
            Ok(_) => self.set_status_message("Copied row to clipboard"),
            Err(e) => self.set_status_message(format!("Copy failed: {e}")),
        }
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};
    // Disambiguate from `polars::prelude::Dimension`, also glob-imported above.
    use crate::filter::Dimension;

    fn spec_model() -> Model {
        let df = df![
            "Employee Name" => ["A", "B"],
            "Level" => ["L1", "L2"],
            "Total Connected" => [Some("10"), Some("")]
        ]
        .unwrap();
        let table = Table::from_frame(&df).unwrap();
        Model::from_table(table, PathBuf::from("report.csv"), &DashConfig::default()).unwrap()
    }

    fn connected_column(model: &Model) -> Option<String> {
        model
            .kpis()
            .iter()
            .find(|k| k.def.label == "Total Connected")
            .and_then(|k| k.column.clone())
    }

    #[test]
    fn level_filter_scenario() {
        let mut model = spec_model();
        let column = connected_column(&model);
        assert_eq!(column.as_deref(), Some("Total Connected"));
        assert_eq!(
            kpi::safe_sum(model.table(), model.rows(), column.as_deref()),
            10.0
        );

        // Pick Level = L2 through the picker flow.
        model.update(Message::OpenPicker(Dimension::Level)).unwrap();
        model.update(Message::MoveDown).unwrap();
        model.update(Message::ToggleSelect).unwrap();
        model.update(Message::Enter).unwrap();

        assert_eq!(model.rows(), &[1]);
        assert_eq!(
            kpi::safe_sum(model.table(), model.rows(), column.as_deref()),
            0.0
        );
        assert!(kpi::value_for(model.table(), 1, column.as_deref()).is_missing());
    }

    #[test]
    fn search_flow_narrows_and_reset_restores() {
        let mut model = spec_model();
        model.update(Message::Search).unwrap();
        assert!(model.raw_keyevents());
        model
            .update(Message::RawKey(KeyEvent::new(
                KeyCode::Char('b'),
                KeyModifiers::NONE,
            )))
            .unwrap();
        model
            .update(Message::RawKey(KeyEvent::new(
                KeyCode::Enter,
                KeyModifiers::NONE,
            )))
            .unwrap();
        assert_eq!(model.rows(), &[1]);

        model.update(Message::ResetFilters).unwrap();
        assert_eq!(model.rows(), &[0, 1]);
    }

    #[test]
    fn canceled_search_leaves_the_rows_alone() {
        let mut model = spec_model();
        model.update(Message::Search).unwrap();
        model
            .update(Message::RawKey(KeyEvent::new(
                KeyCode::Char('x'),
                KeyModifiers::NONE,
            )))
            .unwrap();
        model
            .update(Message::RawKey(KeyEvent::new(
                KeyCode::Esc,
                KeyModifiers::NONE,
            )))
            .unwrap();
        assert!(!model.raw_keyevents());
        assert_eq!(model.rows(), &[0, 1]);
    }

    #[test]
    fn picker_for_unavailable_dimension_degrades_to_a_message() {
        let mut model = spec_model();
        model
            .update(Message::OpenPicker(Dimension::Location))
            .unwrap();
        assert!(model.picker().is_none());
        assert!(model.status_message().contains("unavailable"));
    }

    #[test]
    fn export_writes_the_filtered_view() {
        let df = df![
            "Employee Name" => ["A", "B"],
            "Level" => ["L1", "L2"],
            "Total Connected" => [Some(10i64), None]
        ]
        .unwrap();
        let table = Table::from_frame(&df).unwrap();
        let mut source = std::env::temp_dir();
        source.push("perfdash_export_source.csv");
        let config = DashConfig::default().export_file_name("perfdash_export_out.csv");
        let mut model = Model::from_table(table, source.clone(), &config).unwrap();

        model.update(Message::OpenPicker(Dimension::Level)).unwrap();
        model.update(Message::ToggleSelect).unwrap();
        model.update(Message::Enter).unwrap();
        assert_eq!(model.rows(), &[0]);

        model.update(Message::Export).unwrap();
        let exported = source.with_file_name("perfdash_export_out.csv");
        let reloaded = Table::load(&exported, b',').unwrap();
        assert_eq!(reloaded.height(), 1);
        assert_eq!(
            reloaded.column("Employee Name").unwrap().cells[0],
            crate::data::Cell::Text("A".to_string())
        );
        let _ = std::fs::remove_file(&exported);
    }

    #[test]
    fn quit_from_any_modus() {
        let mut model = spec_model();
        model.update(Message::Help).unwrap();
        model.update(Message::Quit).unwrap();
        assert_eq!(model.status, Status::QUITTING);
    }
}
