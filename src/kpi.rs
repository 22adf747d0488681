use crate::data::{Cell, Table};

static MISSING_CELL: Cell = Cell::Missing;

/// Case, space and underscore insensitive form used for header matching.
pub fn normalize(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| !matches!(c, ' ' | '_'))
        .collect()
}

/// Finds the actual column for a logical KPI. Aliases are tried in priority
/// order; the first alias matching any column wins. `None` means the KPI is
/// unavailable, not an error.
pub fn resolve<'a>(columns: &[&'a str], aliases: &[&str]) -> Option<&'a str> {
    for alias in aliases {
        let wanted = normalize(alias);
        if let Some(hit) = columns.iter().find(|c| normalize(c) == wanted) {
            return Some(hit);
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KpiFormat {
    /// Whole counts (calls, visits, meetings).
    Count,
    /// Talk time, reported with two decimals.
    Duration,
}

impl KpiFormat {
    pub fn render(&self, value: f64) -> String {
        match self {
            KpiFormat::Count => format!("{}", value.round() as i64),
            KpiFormat::Duration => format!("{value:.2}"),
        }
    }
}

pub struct KpiDef {
    pub label: &'static str,
    pub aliases: &'static [&'static str],
    pub format: KpiFormat,
    /// Whether the KPI gets a tile in the summary row.
    pub tile: bool,
}

/// The report's logical KPIs. Alias lists cover the exact headers plus the
/// spellings seen in older exports of the same report.
pub const KPIS: &[KpiDef] = &[
    KpiDef {
        label: "Total Talktime",
        aliases: &["Total Talktime", "Total Talk Time", "talktime"],
        format: KpiFormat::Duration,
        tile: true,
    },
    KpiDef {
        label: "Total Connected",
        aliases: &["Total Connected", "total_connected"],
        format: KpiFormat::Count,
        tile: true,
    },
    KpiDef {
        label: "Calls > 3 mins",
        aliases: &["Calls(>3 mins)", "Calls (>3 mins)", "Calls(>3mins)", "Calls >3 mins"],
        format: KpiFormat::Count,
        tile: true,
    },
    KpiDef {
        label: "Site Visit Done",
        aliases: &["Site Visit Done", "Site Visits Done", "sv_done"],
        format: KpiFormat::Count,
        tile: true,
    },
    KpiDef {
        label: "SV Planned",
        aliases: &["SV Planned", "Site Visit Planned", "sv_planned"],
        format: KpiFormat::Count,
        tile: true,
    },
    KpiDef {
        label: "Total Cold Connected",
        aliases: &["Total Cold Connected", "Cold Connected"],
        format: KpiFormat::Count,
        tile: false,
    },
    KpiDef {
        label: "Unique Cold Connected",
        aliases: &["Unique Cold Connected", "Unique Cold"],
        format: KpiFormat::Count,
        tile: false,
    },
    KpiDef {
        label: "Meetings Done",
        aliases: &["Meetings Done", "Meeting Done", "meetings"],
        format: KpiFormat::Count,
        tile: false,
    },
];

/// A logical KPI bound to the column it resolved to, if any.
pub struct ResolvedKpi {
    pub def: &'static KpiDef,
    pub column: Option<String>,
}

pub fn resolve_kpis(table: &Table) -> Vec<ResolvedKpi> {
    let columns = table.column_names();
    KPIS.iter()
        .map(|def| ResolvedKpi {
            def,
            column: resolve(&columns, def.aliases).map(str::to_string),
        })
        .collect()
}

/// Sums a KPI column over the given rows. An unresolved or unknown column
/// sums to 0, as does every cell that does not coerce to a number. This can
/// not fail, whatever the column contains.
pub fn safe_sum(table: &Table, rows: &[usize], column: Option<&str>) -> f64 {
    let Some(col) = column.and_then(|name| table.column(name)) else {
        return 0.0;
    };
    rows.iter()
        .map(|&row| col.cells[row].as_number().unwrap_or(0.0))
        .sum()
}

/// One row's raw value for a KPI; `Missing` when the column is unresolved.
pub fn value_for<'a>(table: &'a Table, row: usize, column: Option<&str>) -> &'a Cell {
    column
        .and_then(|name| table.column(name))
        .and_then(|col| col.cells.get(row))
        .unwrap_or(&MISSING_CELL)
}
