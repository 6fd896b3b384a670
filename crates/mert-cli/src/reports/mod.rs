use comfy_table::presets::ASCII_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use mert_core::tuner::{PointReport, PointStatus};
use mert_core::WeightVector;

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Final weights, largest magnitude first.
pub fn print_weights(weights: &WeightVector) {
    let mut rows: Vec<(&str, f64)> = weights.iter().collect();
    rows.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()).then_with(|| a.0.cmp(b.0)));

    let mut table = new_table();
    table.set_header(vec![
        Cell::new("Feature").add_attribute(Attribute::Bold),
        Cell::new("Weight").add_attribute(Attribute::Bold),
    ]);
    if let Some(col) = table.column_mut(1) {
        col.set_cell_alignment(CellAlignment::Right);
    }

    for (name, value) in rows {
        let color = if value < 0.0 { Color::Red } else { Color::Green };
        table.add_row(vec![Cell::new(name), Cell::new(format!("{:.6}", value)).fg(color)]);
    }
    println!("\n{}", table);
}

pub fn print_points(points: &[PointReport]) {
    let mut table = new_table();
    table.set_header(vec![
        Cell::new("Point").add_attribute(Attribute::Bold),
        Cell::new("Start"),
        Cell::new("Final").fg(Color::Cyan),
        Cell::new("Status"),
        Cell::new("ms"),
    ]);
    for i in 0..=4 {
        if let Some(col) = table.column_mut(i) {
            col.set_cell_alignment(CellAlignment::Right);
        }
    }

    for r in points {
        let status = match r.status {
            PointStatus::Ok if r.became_best => Cell::new("best").fg(Color::Green),
            PointStatus::Ok => Cell::new("ok"),
            PointStatus::ZeroNorm => Cell::new("zero-norm").fg(Color::Yellow),
            PointStatus::Failed => Cell::new("failed").fg(Color::Red),
        };
        table.add_row(vec![
            Cell::new(r.point),
            Cell::new(format!("{:.6}", r.start_score)),
            Cell::new(format!("{:.6}", r.final_score)).fg(Color::Cyan),
            status,
            Cell::new(r.millis),
        ]);
    }
    println!("{}", table);
}
