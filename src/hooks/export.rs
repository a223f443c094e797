//! CSV rendering of the activity feed.

use chrono::{DateTime, SecondsFormat, Utc};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use thiserror::Error;

use super::activity::ActivityItem;

pub const CSV_HEADER: [&str; 7] = ["Timestamp", "Type", "Action", "Details", "Duration", "User", "Status"];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to flush csv output: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// One header line plus one line per item. Fields are never quoted, so
/// commas inside `details` are turned into semicolons.
pub fn export_csv(items: &[ActivityItem]) -> Result<String, ExportError> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Never)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(CSV_HEADER)?;
    for item in items {
        let timestamp = item.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true);
        let details = item.details.replace(',', ";");
        writer.write_record([
            timestamp.as_str(),
            item.kind.as_str(),
            item.action.as_str(),
            details.as_str(),
            item.duration.as_str(),
            item.user.as_str(),
            item.status.as_str(),
        ])?;
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

/// `irrigation_history_<YYYY-MM-DD>.csv`
pub fn export_file_name(now: DateTime<Utc>) -> String {
    format!("irrigation_history_{}.csv", now.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::hooks::activity::{ActivityKind, ActivityStatus};

    fn item(details: &str) -> ActivityItem {
        ActivityItem {
            id: "a".to_owned(),
            timestamp: Utc.with_ymd_and_hms(2025, 6, 1, 7, 30, 0).unwrap(),
            kind: ActivityKind::Irrigation,
            action: "Auto watering completed".to_owned(),
            details: details.to_owned(),
            duration: "3 min".to_owned(),
            user: "System".to_owned(),
            status: ActivityStatus::Completed,
        }
    }

    #[test]
    fn header_only_for_empty_feed() {
        let csv = export_csv(&[]).unwrap();
        assert_eq!(csv.lines().collect::<Vec<_>>(), vec!["Timestamp,Type,Action,Details,Duration,User,Status"]);
    }

    #[test]
    fn row_layout() {
        let csv = export_csv(&[item("Scheduled irrigation - Tank: Water")]).unwrap();
        let rows: Vec<_> = csv.lines().collect();
        assert_eq!(
            rows[1],
            "2025-06-01T07:30:00.000Z,irrigation,Auto watering completed,Scheduled irrigation - Tank: Water,3 min,System,completed"
        );
    }

    #[test]
    fn commas_in_details_do_not_add_columns() {
        let csv = export_csv(&[item("a, b, c"), item("no commas")]).unwrap();
        for line in csv.lines() {
            assert_eq!(line.matches(',').count(), 6, "line: {line}");
        }
        assert!(csv.contains("a; b; c"));
        assert!(!csv.contains('"'));
    }

    #[test]
    fn file_name_uses_the_date() {
        let now = Utc.with_ymd_and_hms(2025, 1, 9, 23, 59, 0).unwrap();
        assert_eq!(export_file_name(now), "irrigation_history_2025-01-09.csv");
    }
}
