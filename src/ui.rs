use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::{Style, Stylize},
    symbols::border,
    text::{Line, Span},
    widgets::{
        Bar, BarChart, BarGroup, Block, Clear, List, ListItem, ListState, Paragraph, Row, Table,
        TableState,
    },
};

use crate::domain::{DashConfig, HELP_TEXT};
use crate::filter::Dimension;
use crate::kpi::{self, ResolvedKpi};
use crate::model::{Model, PickerState, ViewMode};

pub const TILE_ROW_HEIGHT: u16 = 5;
pub const TABLE_HEADER_HEIGHT: u16 = 1;
pub const STATUS_LINE_HEIGHT: u16 = 1;
pub const SIDEBAR_WIDTH: u16 = 30;
pub const CARD_HEIGHT: u16 = 11;
// Vertical space around the data rows, used by the model for paging.
pub const TABLE_CHROME_HEIGHT: usize =
    (TILE_ROW_HEIGHT + TABLE_HEADER_HEIGHT + STATUS_LINE_HEIGHT) as usize;

pub struct DashUI {
    config: DashConfig,
}

impl DashUI {
    pub fn new(cfg: &DashConfig) -> Self {
        Self {
            config: cfg.clone(),
        }
    }

    pub fn draw(&self, model: &Model, frame: &mut Frame) {
        let [tiles, main, status] = Layout::vertical([
            Constraint::Length(TILE_ROW_HEIGHT),
            Constraint::Min(0),
            Constraint::Length(STATUS_LINE_HEIGHT),
        ])
        .areas(frame.area());

        self.draw_tiles(model, frame, tiles);

        let [sidebar, content] =
            Layout::horizontal([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(0)]).areas(main);
        self.draw_sidebar(model, frame, sidebar);
        match model.view() {
            ViewMode::TABLE => self.draw_table(model, frame, content),
            ViewMode::CARDS => self.draw_cards(model, frame, content),
        }

        self.draw_status(model, frame, status);

        if let Some(picker) = model.picker() {
            self.draw_picker(picker, frame);
        }
        if model.show_help() {
            self.draw_help(frame);
        }
    }

    fn draw_tiles(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let tiles: Vec<&ResolvedKpi> = model.kpis().iter().filter(|k| k.def.tile).collect();
        if tiles.is_empty() {
            return;
        }
        let slots = Layout::horizontal(vec![
            Constraint::Ratio(1, tiles.len() as u32);
            tiles.len()
        ])
        .split(area);

        for (tile, slot) in tiles.iter().zip(slots.iter()) {
            let block = Block::bordered().title(Line::from(tile.def.label).centered());
            let value = match tile.column.as_deref() {
                Some(column) => {
                    let sum = kpi::safe_sum(model.table(), model.rows(), Some(column));
                    Paragraph::new(tile.def.format.render(sum)).bold()
                }
                None => Paragraph::new("n/a").dim(),
            };
            frame.render_widget(value.centered().block(block), *slot);
        }
    }

    fn draw_sidebar(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let selection = model.selection();
        let mut lines: Vec<Line> = Vec::new();

        for dim in Dimension::ALL {
            let summary: Span = if model.bindings().column(dim).is_none() {
                "unavailable".dim()
            } else {
                match selection.picks(dim).len() {
                    0 => Span::from("all"),
                    n => format!("{n} selected").bold(),
                }
            };
            lines.push(Line::from(vec![
                Span::from(dim.label()).bold(),
                Span::from(": "),
                summary,
            ]));
        }

        let query = selection.name_query.trim();
        lines.push(Line::from(vec![
            Span::from("Search").bold(),
            Span::from(": "),
            if query.is_empty() {
                Span::from("-")
            } else {
                Span::from(query.to_string()).bold()
            },
        ]));
        lines.push(Line::default());
        let rows_line = format!("Rows: {} / {}", model.rows().len(), model.table().height());
        lines.push(if selection.is_active() {
            Line::from(rows_line.bold())
        } else {
            Line::from(rows_line)
        });
        lines.push(Line::default());
        lines.push("e/s/l/o pick values".dim().into());
        lines.push("/ search   r reset".dim().into());
        lines.push("Tab cards  ? help".dim().into());

        let block = Block::bordered().title(" Filters ");
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn draw_table(&self, model: &Model, frame: &mut Frame, area: Rect) {
        if model.rows().is_empty() {
            let block = Block::bordered().title(format!(" {} ", model.source_name()));
            frame.render_widget(
                Paragraph::new("No rows match the current filters")
                    .dim()
                    .centered()
                    .block(block),
                area,
            );
            return;
        }

        let visible = (area.height.saturating_sub(TABLE_HEADER_HEIGHT)) as usize;
        let begin = model.offset_row();
        let end = std::cmp::min(begin + visible, model.rows().len());
        let window = &model.rows()[begin..end];

        let columns = &model.table().columns()[model.offset_col()..];
        let widths: Vec<Constraint> = columns
            .iter()
            .map(|c| {
                let content = window
                    .iter()
                    .map(|&r| c.cells[r].display().len())
                    .max()
                    .unwrap_or(0);
                let width = std::cmp::max(c.name.len(), content);
                Constraint::Length(std::cmp::min(width, self.config.max_column_width) as u16)
            })
            .collect();

        let header = Row::new(columns.iter().map(|c| c.name.clone())).style(Style::new().bold());
        let rows = window.iter().map(|&r| {
            Row::new(
                columns
                    .iter()
                    .map(|c| c.cells[r].display().replace('\n', " ")),
            )
        });

        let table = Table::new(rows, widths)
            .header(header)
            .column_spacing(1)
            .row_highlight_style(Style::new().reversed());
        let mut state = TableState::default();
        state.select(model.selected().checked_sub(begin));
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn draw_cards(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let [cards_area, chart_area] =
            Layout::vertical([Constraint::Min(0), Constraint::Length(10)]).areas(area);

        let per_row = std::cmp::max((cards_area.width / 28) as usize, 1);
        let card_rows = std::cmp::max((cards_area.height / CARD_HEIGHT) as usize, 1);
        let capacity = per_row * card_rows;

        let begin = std::cmp::min(model.offset_row(), model.rows().len());
        let end = std::cmp::min(begin + capacity, model.rows().len());
        let window = &model.rows()[begin..end];

        let row_slots = Layout::vertical(vec![Constraint::Length(CARD_HEIGHT); card_rows])
            .split(cards_area);
        for (chunk, row_slot) in window.chunks(per_row).zip(row_slots.iter()) {
            let col_slots =
                Layout::horizontal(vec![Constraint::Ratio(1, per_row as u32); per_row])
                    .split(*row_slot);
            for (&row, slot) in chunk.iter().zip(col_slots.iter()) {
                self.draw_card(model, frame, *slot, row);
            }
        }
        if window.is_empty() {
            frame.render_widget(
                Paragraph::new("No rows match the current filters")
                    .dim()
                    .centered(),
                cards_area,
            );
        }

        self.draw_chart(model, frame, chart_area);
    }

    fn draw_card(&self, model: &Model, frame: &mut Frame, area: Rect, row: usize) {
        let name = employee_name(model, row);
        let selected = model.selected_row() == Some(row);
        let mut block = Block::bordered().title(format!(" {name} "));
        if selected {
            block = block.border_set(border::THICK);
        }

        let lines: Vec<Line> = model
            .kpis()
            .iter()
            .map(|k| {
                let cell = kpi::value_for(model.table(), row, k.column.as_deref());
                let value = match cell.as_number() {
                    Some(n) => k.def.format.render(n),
                    None if cell.is_missing() => "-".to_string(),
                    None => cell.display(),
                };
                Line::from(vec![
                    Span::from(format!("{:<22}", k.def.label)).dim(),
                    Span::from(value),
                ])
            })
            .collect();
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn draw_chart(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let chart_kpi = model.chart_kpi();
        let title = format!(" {} by employee  ([/] to change) ", chart_kpi.def.label);
        let block = Block::bordered().title(title);

        let Some(column) = chart_kpi.column.as_deref() else {
            frame.render_widget(
                Paragraph::new("KPI unavailable in this report")
                    .dim()
                    .centered()
                    .block(block),
                area,
            );
            return;
        };

        let mut ranked: Vec<(String, f64)> = model
            .rows()
            .iter()
            .map(|&row| {
                let value = kpi::value_for(model.table(), row, Some(column))
                    .as_number()
                    .unwrap_or(0.0);
                (employee_name(model, row), value)
            })
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(area.height.saturating_sub(2) as usize);

        let bars: Vec<Bar> = ranked
            .iter()
            .map(|(name, value)| {
                Bar::default()
                    .value(value.round() as u64)
                    .label(Line::from(name.clone()))
                    .text_value(chart_kpi.def.format.render(*value))
            })
            .collect();

        let chart = BarChart::default()
            .block(block)
            .direction(Direction::Horizontal)
            .bar_width(1)
            .bar_gap(0)
            .data(BarGroup::default().bars(&bars));
        frame.render_widget(chart, area);
    }

    fn draw_picker(&self, picker: &PickerState, frame: &mut Frame) {
        let height = std::cmp::min(
            picker.values.len() as u16 + 2,
            frame.area().height.saturating_sub(4),
        );
        let popup = centered_rect(frame.area(), 44, height);

        let items: Vec<ListItem> = picker
            .values
            .iter()
            .map(|(value, count)| {
                let mark = if picker.checked.contains(value) {
                    "[x]"
                } else {
                    "[ ]"
                };
                ListItem::new(format!("{mark} {value}  ({count})"))
            })
            .collect();

        let list = List::new(items)
            .block(
                Block::bordered()
                    .border_set(border::THICK)
                    .title(format!(" Filter by {} ", picker.dimension.label()))
                    .title_bottom(Line::from(" space toggle · enter apply · esc cancel ").centered()),
            )
            .highlight_style(Style::new().reversed());
        let mut state = ListState::default();
        state.select(Some(picker.cursor));

        frame.render_widget(Clear, popup);
        frame.render_stateful_widget(list, popup, &mut state);
    }

    fn draw_help(&self, frame: &mut Frame) {
        let popup = centered_rect(frame.area(), 46, 24);
        let block = Block::bordered()
            .border_set(border::THICK)
            .title(" Help ")
            .title_bottom(Line::from(" esc to close ").centered());
        frame.render_widget(Clear, popup);
        frame.render_widget(Paragraph::new(HELP_TEXT).block(block), popup);
    }

    fn draw_status(&self, model: &Model, frame: &mut Frame, area: Rect) {
        if model.searching() {
            let input = model.input_state();
            let prompt = "Search: ";
            frame.render_widget(
                Paragraph::new(Line::from(vec![
                    Span::from(prompt).bold(),
                    Span::from(input.text.clone()),
                ])),
                area,
            );
            frame.set_cursor_position(Position::new(
                area.x + (prompt.len() + input.cursor) as u16,
                area.y,
            ));
            return;
        }

        let view = match model.view() {
            ViewMode::TABLE => "table",
            ViewMode::CARDS => "cards",
        };
        let right = format!("{} · {} ", model.source_name(), view);
        let left = if model.status_age().as_secs() < 10 {
            Span::from(model.status_message().to_string())
        } else {
            "? for help".dim()
        };
        let left_width = (area.width as usize).saturating_sub(right.chars().count());
        let line = Line::from(vec![
            Span::styled(format!("{:<left_width$}", left.content), left.style),
            Span::from(right).dim(),
        ]);
        frame.render_widget(Paragraph::new(line), area);
    }
}

fn employee_name(model: &Model, row: usize) -> String {
    model
        .bindings()
        .column(Dimension::Employee)
        .and_then(|name| model.table().column(name))
        .map(|column| column.cells[row].display())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| format!("Row {}", row + 1))
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = std::cmp::min(width, area.width);
    let height = std::cmp::min(height, area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
