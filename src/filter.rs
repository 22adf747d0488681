use std::collections::BTreeSet;

use crate::data::{Cell, Table};
use crate::kpi;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Employee,
    Supervisor,
    Level,
    Location,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::Employee,
        Dimension::Supervisor,
        Dimension::Level,
        Dimension::Location,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Dimension::Employee => "Employee",
            Dimension::Supervisor => "Supervisor",
            Dimension::Level => "Level",
            Dimension::Location => "Location",
        }
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Dimension::Employee => &["Employee Name", "Employee", "emp_name"],
            Dimension::Supervisor => &["Supervisor Name", "Supervisor", "Team Lead"],
            Dimension::Level => &["Level", "Designation Level"],
            Dimension::Location => &["Location", "Branch", "Site"],
        }
    }
}

/// The actual column each dimension resolved to in the loaded table.
/// An unresolved dimension simply never constrains the row set.
#[derive(Debug, Default)]
pub struct DimensionBindings {
    employee: Option<String>,
    supervisor: Option<String>,
    level: Option<String>,
    location: Option<String>,
}

impl DimensionBindings {
    pub fn resolve(table: &Table) -> Self {
        let columns = table.column_names();
        let bind = |dim: Dimension| kpi::resolve(&columns, dim.aliases()).map(str::to_string);
        Self {
            employee: bind(Dimension::Employee),
            supervisor: bind(Dimension::Supervisor),
            level: bind(Dimension::Level),
            location: bind(Dimension::Location),
        }
    }

    pub fn column(&self, dim: Dimension) -> Option<&str> {
        match dim {
            Dimension::Employee => self.employee.as_deref(),
            Dimension::Supervisor => self.supervisor.as_deref(),
            Dimension::Level => self.level.as_deref(),
            Dimension::Location => self.location.as_deref(),
        }
    }
}

/// What the user currently filters on. Empty sets and an empty query mean
/// "no constraint".
#[derive(Debug, Clone, Default)]
pub struct Selection {
    employees: BTreeSet<String>,
    supervisors: BTreeSet<String>,
    levels: BTreeSet<String>,
    locations: BTreeSet<String>,
    pub name_query: String,
}

impl Selection {
    pub fn picks(&self, dim: Dimension) -> &BTreeSet<String> {
        match dim {
            Dimension::Employee => &self.employees,
            Dimension::Supervisor => &self.supervisors,
            Dimension::Level => &self.levels,
            Dimension::Location => &self.locations,
        }
    }

    pub fn picks_mut(&mut self, dim: Dimension) -> &mut BTreeSet<String> {
        match dim {
            Dimension::Employee => &mut self.employees,
            Dimension::Supervisor => &mut self.supervisors,
            Dimension::Level => &mut self.levels,
            Dimension::Location => &mut self.locations,
        }
    }

    pub fn clear(&mut self) {
        for dim in Dimension::ALL {
            self.picks_mut(dim).clear();
        }
        self.name_query.clear();
    }

    pub fn is_active(&self) -> bool {
        !self.name_query.trim().is_empty()
            || Dimension::ALL.iter().any(|d| !self.picks(*d).is_empty())
    }
}

/// Applies the selection to the table and returns the matching row indices
/// in table order. Value sets are exact matches OR-ed within a dimension;
/// dimensions combine with AND; the name query is a case insensitive
/// substring match that drops rows without a name. Rows with a missing
/// dimension value never match a value selection.
pub fn apply(table: &Table, bindings: &DimensionBindings, selection: &Selection) -> Vec<usize> {
    let mut rows: Vec<usize> = (0..table.height()).collect();

    for dim in Dimension::ALL {
        let picked = selection.picks(dim);
        if picked.is_empty() {
            continue;
        }
        let Some(column) = bindings.column(dim).and_then(|name| table.column(name)) else {
            continue;
        };
        rows.retain(|&row| match &column.cells[row] {
            Cell::Missing => false,
            cell => picked.contains(&cell.display()),
        });
    }

    let query = selection.name_query.trim();
    if !query.is_empty()
        && let Some(column) = bindings
            .column(Dimension::Employee)
            .and_then(|name| table.column(name))
    {
        let needle = query.to_lowercase();
        rows.retain(|&row| match &column.cells[row] {
            Cell::Missing => false,
            cell => cell.display().to_lowercase().contains(&needle),
        });
    }

    rows
}

/// Distinct non-missing values of a column over the whole table, with
/// occurrence counts, sorted ascending by value. Feeds the picker popups.
pub fn distinct_values(table: &Table, column: &str) -> Vec<(String, usize)> {
    let Some(column) = table.column(column) else {
        return Vec::new();
    };
    let mut counts: Vec<(String, usize)> = Vec::new();
    for cell in column.cells.iter() {
        if cell.is_missing() {
            continue;
        }
        let value = cell.display();
        match counts.iter_mut().find(|(v, _)| *v == value) {
            Some((_, n)) => *n += 1,
            None => counts.push((value, 1)),
        }
    }
    counts.sort_unstable_by(|a, b| a.0.cmp(&b.0));
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;
    // Disambiguate from `polars::prelude::Dimension`, also glob-imported above.
    use crate::filter::Dimension;

    fn sample() -> (Table, DimensionBindings) {
        let df = df![
            "Employee Name" => [Some("Asha Rao"), Some("Bela Shah"), None, Some("Chandra Rao")],
            "Supervisor Name" => ["Meera", "Meera", "Vikram", "Vikram"],
            "Level" => ["L1", "L2", "L2", "L1"],
            "Location" => ["Pune", "Delhi", "Pune", "Delhi"],
            "Total Connected" => [Some(10i64), None, Some(3), Some(7)]
        ]
        .unwrap();
        let table = Table::from_frame(&df).unwrap();
        let bindings = DimensionBindings::resolve(&table);
        (table, bindings)
    }

    #[test]
    fn empty_selection_keeps_every_row_in_order() {
        let (table, bindings) = sample();
        let rows = apply(&table, &bindings, &Selection::default());
        assert_eq!(rows, vec![0, 1, 2, 3]);
    }

    #[test]
    fn values_or_within_a_dimension() {
        let (table, bindings) = sample();
        let mut selection = Selection::default();
        selection.picks_mut(Dimension::Level).insert("L1".into());
        assert_eq!(apply(&table, &bindings, &selection), vec![0, 3]);

        selection.picks_mut(Dimension::Level).insert("L2".into());
        assert_eq!(apply(&table, &bindings, &selection), vec![0, 1, 2, 3]);
    }

    #[test]
    fn dimensions_and_across() {
        let (table, bindings) = sample();
        let mut selection = Selection::default();
        selection.picks_mut(Dimension::Level).insert("L1".into());
        selection
            .picks_mut(Dimension::Location)
            .insert("Delhi".into());
        assert_eq!(apply(&table, &bindings, &selection), vec![3]);
    }

    #[test]
    fn name_query_is_case_insensitive_and_drops_missing_names() {
        let (table, bindings) = sample();
        let mut selection = Selection::default();
        selection.name_query = "rao".into();
        // Row 2 has no name and is excluded while the query is active.
        assert_eq!(apply(&table, &bindings, &selection), vec![0, 3]);
    }

    #[test]
    fn value_match_is_case_sensitive() {
        let (table, bindings) = sample();
        let mut selection = Selection::default();
        selection.picks_mut(Dimension::Level).insert("l1".into());
        assert!(apply(&table, &bindings, &selection).is_empty());
    }

    #[test]
    fn unresolved_dimension_contributes_no_constraint() {
        let df = df![
            "Employee Name" => ["Asha", "Bela"],
            "Level" => ["L1", "L2"]
        ]
        .unwrap();
        let table = Table::from_frame(&df).unwrap();
        let bindings = DimensionBindings::resolve(&table);
        assert!(bindings.column(Dimension::Location).is_none());

        let mut selection = Selection::default();
        selection
            .picks_mut(Dimension::Location)
            .insert("Pune".into());
        assert_eq!(apply(&table, &bindings, &selection), vec![0, 1]);
    }

    #[test]
    fn apply_is_idempotent() {
        let (table, bindings) = sample();
        let mut selection = Selection::default();
        selection.picks_mut(Dimension::Supervisor).insert("Meera".into());
        let once = apply(&table, &bindings, &selection);
        // Re-applying the same selection to the already filtered rows
        // removes nothing further.
        let again: Vec<usize> = apply(&table, &bindings, &selection)
            .into_iter()
            .filter(|r| once.contains(r))
            .collect();
        assert_eq!(once, again);
    }

    #[test]
    fn widening_a_selection_never_shrinks_the_result() {
        let (table, bindings) = sample();
        let mut selection = Selection::default();
        selection.picks_mut(Dimension::Location).insert("Pune".into());
        let narrow = apply(&table, &bindings, &selection).len();

        selection
            .picks_mut(Dimension::Location)
            .insert("Delhi".into());
        let wider = apply(&table, &bindings, &selection).len();
        assert!(wider >= narrow);

        selection.picks_mut(Dimension::Location).clear();
        let unconstrained = apply(&table, &bindings, &selection).len();
        assert!(unconstrained >= wider);
    }

    #[test]
    fn distinct_values_sorted_with_counts() {
        let (table, _) = sample();
        assert_eq!(
            distinct_values(&table, "Level"),
            vec![("L1".to_string(), 2), ("L2".to_string(), 2)]
        );
        assert_eq!(
            distinct_values(&table, "Supervisor Name"),
            vec![("Meera".to_string(), 2), ("Vikram".to_string(), 2)]
        );
        assert!(distinct_values(&table, "No Such Column").is_empty());
    }
}
