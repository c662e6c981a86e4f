use crate::reports::{build_summary, recent_applications};
use crate::types::{ApplicationRecord, ApplicationRow};
use serde::Serialize;
use std::error::Error;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};

pub fn write_csv<T: Serialize>(path: impl AsRef<Path>, rows: &[T]) -> Result<(), Box<dyn Error>> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<(), Box<dyn Error>> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// Print up to `max_rows` rows as a markdown table.
pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

/// `spray-report-<month>` with the month lowercased, or `all` without one.
pub fn report_stem(month: Option<&str>) -> String {
    let month = month.map(str::to_lowercase).unwrap_or_else(|| "all".to_string());
    format!("spray-report-{}", month)
}

/// Write the JSON summary and the CSV of all applications (newest first)
/// for one month into `dir`. Returns the two paths written.
pub fn export_report(
    dir: impl AsRef<Path>,
    month: Option<&str>,
    records: &[ApplicationRecord],
) -> Result<(PathBuf, PathBuf), Box<dyn Error>> {
    std::fs::create_dir_all(dir.as_ref())?;
    let stem = report_stem(month);
    let json_path = dir.as_ref().join(format!("{stem}.json"));
    let csv_path = dir.as_ref().join(format!("{stem}.csv"));

    write_json(&json_path, &build_summary(month, records))?;
    let rows: Vec<ApplicationRow> = recent_applications(records)
        .into_iter()
        .map(ApplicationRow::from)
        .collect();
    write_csv(&csv_path, &rows)?;
    Ok((json_path, csv_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Bays, DateCode};

    fn record(week: u32, chemical: &str, price: f64) -> ApplicationRecord {
        ApplicationRecord {
            spray_chemicals: [Some(chemical.to_string()), None, None],
            fog_chemicals: [None, Some("Pyrethrin".to_string()), None],
            date: DateCode {
                week,
                day: 1,
                formatted: format!("Week {week}, Day 1"),
            },
            bays: Bays {
                count: 3.0,
                is_full: true,
            },
            price,
            monthly_budget: 500.0,
            month: "August".to_string(),
        }
    }

    #[test]
    fn report_stem_lowercases_month() {
        assert_eq!(report_stem(Some("August")), "spray-report-august");
        assert_eq!(report_stem(None), "spray-report-all");
    }

    #[test]
    fn export_writes_summary_and_applications() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![record(31, "Bifenthrin", 12.5), record(33, "Malathion", 7.5)];
        let (json_path, csv_path) = export_report(dir.path(), Some("August"), &records).unwrap();
        assert!(json_path.ends_with("spray-report-august.json"));

        let summary: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(summary["month"], "August");
        assert_eq!(summary["totalApplications"], 4);
        assert_eq!(summary["spent"], 20.0);
        assert_eq!(summary["budgetStatus"], "OnTrack");
        assert_eq!(summary["topChemicals"][0]["chemical"], "Pyrethrin");

        let csv = std::fs::read_to_string(&csv_path).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("Date,Chemicals,Method,Bays,Price"));
        assert_eq!(
            lines.next(),
            Some("\"Week 33, Day 1\",\"Malathion, Pyrethrin\",Spray & Fog,3,$7.50")
        );
        assert_eq!(lines.count(), 1);
    }
}
