use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Row, Table};

use crate::accounts::{Permission, User};
use crate::calc::LeaderboardEntry;
use crate::output::{row_values, totals_values, MATERIAL_COLUMNS, TOTALS_COLUMNS};
use crate::report::{ChartPayload, TablePayload};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn number_cell(value: f64) -> Cell {
    let cell = Cell::new(format!("{value:.2}")).set_alignment(CellAlignment::Right);
    if value < 0.0 {
        cell.fg(Color::Red)
    } else {
        cell
    }
}

/// Per-material rows followed by a separate totals table.
pub fn render_material_table(payload: &TablePayload) -> String {
    let mut table = new_table();
    table.set_header(MATERIAL_COLUMNS.to_vec());
    for row in &payload.rows {
        let mut cells = vec![Cell::new(&row.material)];
        cells.extend(row_values(row).into_iter().map(number_cell));
        table.add_row(Row::from(cells));
    }

    let mut totals = new_table();
    let mut header = TOTALS_COLUMNS.to_vec();
    header.remove(0);
    totals.set_header(header);
    totals.add_row(Row::from(
        totals_values(&payload.totals)
            .into_iter()
            .map(number_cell)
            .collect::<Vec<_>>(),
    ));

    format!("{table}\n{totals}")
}

pub fn render_leaderboard_table(entries: &[LeaderboardEntry]) -> String {
    let mut table = new_table();
    table.set_header(vec!["Rank", "User", "Total CO2 Reduction [ton]", "Average Recycling [%]"]);
    for (idx, entry) in entries.iter().enumerate() {
        table.add_row(Row::from(vec![
            Cell::new(idx + 1),
            Cell::new(&entry.user_id),
            number_cell(entry.total_reduction),
            number_cell(entry.average_recyc),
        ]));
    }
    table.to_string()
}

pub fn render_chart_table(payload: &ChartPayload) -> String {
    let mut table = new_table();
    match payload {
        ChartPayload::Series(series) => {
            table.set_header(vec!["Material", "Value"]);
            for (material, value) in series.materials.iter().zip(&series.values) {
                table.add_row(Row::from(vec![Cell::new(material), number_cell(*value)]));
            }
        }
        ChartPayload::Pie(slices) => {
            table.set_header(vec!["Label", "Value"]);
            for slice in slices {
                table.add_row(Row::from(vec![
                    Cell::new(&slice.label),
                    number_cell(slice.value),
                ]));
            }
        }
    }
    table.to_string()
}

pub fn render_users_table(users: &[User]) -> String {
    let mut table = new_table();
    table.set_header(vec!["Id", "Name", "Email", "Role", "Created"]);
    for user in users {
        let role = match user.permission {
            Permission::Admin => Cell::new("admin").fg(Color::Yellow),
            Permission::User => Cell::new("user"),
        };
        table.add_row(Row::from(vec![
            Cell::new(&user.id),
            Cell::new(&user.name),
            Cell::new(&user.email),
            role,
            Cell::new(user.created_at.format("%Y-%m-%d %H:%M").to_string()),
        ]));
    }
    table.to_string()
}
