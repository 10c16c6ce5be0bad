//! Table and plain-text rendering of plates, queues and records.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use labtrack_core::TransitionOutcome;
use labtrack_model::{
    Batch, Case, PlateGeometry, Sample, TransitionRecord, Well, WellAssignment, WellMap, WellType,
    WorkflowState,
};

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(140);
}

/// Rebuilds a full well map from the persisted (non-empty) wells of a batch.
pub fn well_map_from_assignments(geometry: PlateGeometry, wells: &[WellAssignment]) -> WellMap {
    let mut map = WellMap::empty(geometry);
    for assignment in wells {
        if let Some(well) = map
            .wells
            .iter_mut()
            .find(|well| well.position == assignment.position)
        {
            well.well_type = assignment.well_type;
            well.sample_id = assignment.sample_id;
            well.label.clone_from(&assignment.label);
            well.comment.clone_from(&assignment.comment);
        }
    }
    map
}

/// Short text shown for a well in plate views.
pub fn well_code(well: &Well) -> String {
    match well.well_type {
        WellType::Sample => well.label.clone(),
        WellType::AllelicLadder => "LAD".to_string(),
        WellType::PositiveControl => "POS".to_string(),
        WellType::NegativeControl => "NEG".to_string(),
        WellType::Blank => "BLK".to_string(),
        WellType::Empty => ".".to_string(),
    }
}

/// Plate as a rows x columns grid, one line per row.
pub fn plate_text(map: &WellMap) -> String {
    let geometry = map.geometry;
    let width = map
        .wells
        .iter()
        .map(|well| well_code(well).len())
        .max()
        .unwrap_or(1)
        .max(2);
    let mut lines = Vec::with_capacity(usize::from(geometry.rows()) + 1);
    let mut header = String::from(" ");
    for column in 1..=geometry.columns() {
        let _ = write!(header, " {:<width$}", format!("{column:02}"));
    }
    lines.push(header.trim_end().to_string());
    for row in 0..geometry.rows() {
        let mut line = String::new();
        for column in 1..=geometry.columns() {
            let Some(position) = geometry.position_at(
                usize::from(column - 1) * usize::from(geometry.rows()) + usize::from(row),
            ) else {
                continue;
            };
            if line.is_empty() {
                line.push(position.row_letter());
            }
            let code = map.get(position).map_or_else(|| "?".to_string(), well_code);
            let _ = write!(line, " {code:<width$}");
        }
        lines.push(line.trim_end().to_string());
    }
    lines.join("\n")
}

pub fn plate_table(map: &WellMap) -> Table {
    let geometry = map.geometry;
    let mut table = Table::new();
    let mut header = vec![header_cell("")];
    header.extend((1..=geometry.columns()).map(|column| header_cell(&format!("{column:02}"))));
    table.set_header(header);
    apply_table_style(&mut table);
    for row in 0..geometry.rows() {
        let mut cells = Vec::with_capacity(usize::from(geometry.columns()) + 1);
        for column in 1..=geometry.columns() {
            let index = usize::from(column - 1) * usize::from(geometry.rows()) + usize::from(row);
            let Some(position) = geometry.position_at(index) else {
                continue;
            };
            if cells.is_empty() {
                cells.push(header_cell(&position.row_letter().to_string()));
            }
            cells.push(match map.get(position) {
                Some(well) => well_cell(well),
                None => dim_cell("?"),
            });
        }
        table.add_row(cells);
    }
    for index in 1..=usize::from(geometry.columns()) {
        align_column(&mut table, index, CellAlignment::Center);
    }
    table
}

pub fn queue_table(counts: &BTreeMap<WorkflowState, usize>) -> Table {
    let mut table = Table::new();
    table.set_header(vec![header_cell("Stage"), header_cell("Samples")]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    let mut total = 0usize;
    for state in WorkflowState::ALL {
        let count = counts.get(&state).copied().unwrap_or(0);
        total += count;
        table.add_row(vec![Cell::new(state.as_str()), count_cell(count)]);
    }
    table.add_row(vec![
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        Cell::new(total).add_attribute(Attribute::Bold),
    ]);
    table
}

pub fn samples_table(samples: &[Sample]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Lab number"),
        header_cell("Relation"),
        header_cell("Stage"),
        header_cell("Status"),
        header_cell("Batch well"),
    ]);
    apply_table_style(&mut table);
    for sample in samples {
        let well = sample
            .well_position
            .map_or_else(|| dim_cell("-"), Cell::new);
        table.add_row(vec![
            Cell::new(&sample.lab_number),
            Cell::new(&sample.relation),
            Cell::new(sample.state),
            status_cell(sample.status.as_str(), sample.is_cancelled()),
            well,
        ]);
    }
    table
}

pub fn case_table(case: &Case) -> Table {
    let mut table = Table::new();
    table.set_header(vec![header_cell("Field"), header_cell("Value")]);
    apply_table_style(&mut table);
    table.add_row(vec![Cell::new("Case number"), Cell::new(&case.case_number)]);
    table.add_row(vec![Cell::new("Category"), Cell::new(case.category)]);
    table.add_row(vec![Cell::new("Submitted"), Cell::new(case.submitted_on)]);
    table.add_row(vec![
        Cell::new("Mother present"),
        Cell::new(if case.mother_present { "yes" } else { "no" }),
    ]);
    table.add_row(vec![Cell::new("Status"), Cell::new(case.status)]);
    table.add_row(vec![
        Cell::new("Comment"),
        case.comment
            .as_deref()
            .map_or_else(|| dim_cell("-"), Cell::new),
    ]);
    table
}

pub fn batches_table(batches: &[Batch]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Batch"),
        header_cell("Kind"),
        header_cell("Operator"),
        header_cell("Samples"),
        header_cell("Status"),
        header_cell("Created"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 3, CellAlignment::Right);
    for batch in batches {
        table.add_row(vec![
            Cell::new(&batch.batch_number),
            Cell::new(batch.kind),
            Cell::new(&batch.operator),
            Cell::new(batch.total_samples),
            Cell::new(batch.status),
            Cell::new(batch.created_at.format("%Y-%m-%d %H:%M")),
        ]);
    }
    table
}

pub fn history_table(history: &[TransitionRecord]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("At"),
        header_cell("From"),
        header_cell("To"),
        header_cell("Batch"),
    ]);
    apply_table_style(&mut table);
    for record in history {
        table.add_row(vec![
            Cell::new(record.at.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(record.from),
            Cell::new(record.to),
            record
                .batch_id
                .map_or_else(|| dim_cell("-"), Cell::new),
        ]);
    }
    table
}

/// One-line summary of a multi-sample transition.
pub fn outcome_line(outcome: &TransitionOutcome, state: WorkflowState) -> String {
    if outcome.rejected.is_empty() {
        format!("{} sample(s) moved to {state}", outcome.updated_count)
    } else {
        format!(
            "{} sample(s) moved to {state}, {} rejected",
            outcome.updated_count,
            outcome.rejected.len()
        )
    }
}

fn well_cell(well: &Well) -> Cell {
    let cell = Cell::new(well_code(well));
    match well.well_type {
        WellType::Sample => cell,
        WellType::Empty => cell.fg(Color::DarkGrey),
        WellType::AllelicLadder => cell.fg(Color::Cyan).add_attribute(Attribute::Bold),
        WellType::PositiveControl => cell.fg(Color::Green).add_attribute(Attribute::Bold),
        WellType::NegativeControl => cell.fg(Color::Red).add_attribute(Attribute::Bold),
        WellType::Blank => cell.fg(Color::Yellow),
    }
}

fn status_cell(status: &str, closed: bool) -> Cell {
    if closed {
        Cell::new(status).fg(Color::Red)
    } else {
        Cell::new(status)
    }
}

fn count_cell(count: usize) -> Cell {
    if count > 0 {
        Cell::new(count).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
