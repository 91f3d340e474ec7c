use anyhow::Result;

use crate::calc::LeaderboardEntry;
use crate::output::{row_values, totals_values, MATERIAL_COLUMNS, TOTALS_COLUMNS};
use crate::report::{ChartPayload, TablePayload};

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

/// Material rows, then a blank line, then the totals row labelled "Totals".
pub fn material_table_to_csv(payload: &TablePayload) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(vec![]);
    writer.write_record(MATERIAL_COLUMNS)?;
    for row in &payload.rows {
        let mut record = vec![row.material.clone()];
        record.extend(row_values(row).iter().map(|v| format!("{v:.2}")));
        writer.write_record(&record)?;
    }
    writer.write_record([""])?;
    writer.write_record(TOTALS_COLUMNS)?;
    let mut totals = vec!["Totals".to_string()];
    totals.extend(
        totals_values(&payload.totals)
            .iter()
            .map(|v| format!("{v:.2}")),
    );
    writer.write_record(&totals)?;
    finish(writer)
}

pub fn leaderboard_to_csv(entries: &[LeaderboardEntry]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["rank", "user", "total_reduction", "average_recyc"])?;
    for (idx, entry) in entries.iter().enumerate() {
        writer.write_record([
            (idx + 1).to_string(),
            entry.user_id.clone(),
            format!("{:.2}", entry.total_reduction),
            format!("{:.2}", entry.average_recyc),
        ])?;
    }
    finish(writer)
}

pub fn chart_to_csv(payload: &ChartPayload) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    match payload {
        ChartPayload::Series(series) => {
            writer.write_record(["material", "value"])?;
            for (material, value) in series.materials.iter().zip(&series.values) {
                writer.write_record([material.clone(), format!("{value:.2}")])?;
            }
        }
        ChartPayload::Pie(slices) => {
            writer.write_record(["label", "value"])?;
            for slice in slices {
                writer.write_record([slice.label.clone(), format!("{:.2}", slice.value)])?;
            }
        }
    }
    finish(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::PieSlice;

    #[test]
    fn leaderboard_csv_has_header_and_ranked_rows() {
        let csv = leaderboard_to_csv(&[
            LeaderboardEntry {
                user_id: "bob".to_string(),
                total_reduction: 24.84,
                average_recyc: 50.0,
            },
            LeaderboardEntry {
                user_id: "alice, ltd".to_string(),
                total_reduction: 12.42,
                average_recyc: 50.0,
            },
        ])
        .unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines[0], "rank,user,total_reduction,average_recyc");
        assert_eq!(lines[1], "1,bob,24.84,50.00");
        assert_eq!(lines[2], "2,\"alice, ltd\",12.42,50.00");
    }

    #[test]
    fn pie_csv_uses_label_column() {
        let csv = chart_to_csv(&ChartPayload::Pie(vec![PieSlice {
            label: "Recycling".to_string(),
            value: 50.0,
        }]))
        .unwrap();
        assert_eq!(csv, "label,value\nRecycling,50.00\n");
    }
}
