use std::path::PathBuf;

use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use crate::types::RunResult;

pub fn print_summary(result: &RunResult) {
    println!("Pipeline: {}", result.pipeline.display());
    if !result.stages.is_empty() {
        println!("Stages: {}", result.stages.join(" > "));
    }
    match &result.output_dir {
        Some(dir) => println!("Output: {}", dir.display()),
        None => println!("Output: (dry run, nothing written)"),
    }
    println!("{}", summary_table(result));
}

/// One row per table plus a total row.
pub fn summary_table(result: &RunResult) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Table"),
        header_cell("Rows in"),
        header_cell("Rows out"),
        header_cell("Cols in"),
        header_cell("Cols out"),
        header_cell("Output"),
    ]);
    apply_summary_table_style(&mut table);
    for index in 1..=4 {
        align_column(&mut table, index, CellAlignment::Right);
    }

    let mut rows_in = 0usize;
    let mut rows_out = 0usize;
    for summary in &result.tables {
        rows_in += summary.rows_in;
        rows_out += summary.rows_out;
        table.add_row(vec![
            Cell::new(&summary.name).fg(Color::Green),
            Cell::new(summary.rows_in),
            change_cell(summary.rows_in, summary.rows_out),
            Cell::new(summary.cols_in),
            change_cell(summary.cols_in, summary.cols_out),
            output_cell(summary.output.as_ref()),
        ]);
    }
    table.add_row(vec![
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        Cell::new(rows_in).add_attribute(Attribute::Bold),
        change_cell(rows_in, rows_out).add_attribute(Attribute::Bold),
        dim_cell("-"),
        dim_cell("-"),
        dim_cell("-"),
    ]);
    table
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

/// Highlights counts that changed during processing.
fn change_cell(before: usize, after: usize) -> Cell {
    match after.cmp(&before) {
        std::cmp::Ordering::Equal => Cell::new(after),
        std::cmp::Ordering::Greater => Cell::new(after).fg(Color::Green),
        std::cmp::Ordering::Less => Cell::new(after).fg(Color::Yellow),
    }
}

fn output_cell(path: Option<&PathBuf>) -> Cell {
    match path {
        Some(path) => Cell::new(path.display()),
        None => dim_cell("-"),
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label).add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value.to_string()).fg(Color::DarkGrey)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TableSummary;

    fn result() -> RunResult {
        RunResult {
            pipeline: PathBuf::from("pipeline.json"),
            output_dir: None,
            stages: vec!["DropDuplicates".to_string()],
            tables: vec![
                TableSummary {
                    name: "train".to_string(),
                    rows_in: 4,
                    cols_in: 3,
                    rows_out: 3,
                    cols_out: 3,
                    output: None,
                },
                TableSummary {
                    name: "test".to_string(),
                    rows_in: 2,
                    cols_in: 2,
                    rows_out: 2,
                    cols_out: 2,
                    output: None,
                },
            ],
        }
    }

    #[test]
    fn summary_has_a_row_per_table_and_a_total() {
        let mut table = summary_table(&result());
        table.force_no_tty();
        assert_eq!(table.row_count(), 3);
        let rendered = table.to_string();
        assert!(rendered.contains("train"));
        assert!(rendered.contains("TOTAL"));
        assert!(!rendered.contains('\u{1b}'));
    }
}
