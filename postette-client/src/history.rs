use postette_shared::{HistoryEntryDto, Level, Record};
use serde::Serialize;
use tinytemplate::TinyTemplate;
use tracing::{error, info, warn};

use crate::AppError;

const HISTORY_TEMPLATE: &str = include_str!("../templates/history.txt");

/// Every accepted record, in acceptance order.
#[derive(Debug, Default)]
pub struct HistoryLog {
    entries: Vec<Record>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: Record) {
        self.entries.push(record);
    }

    /// Newest first.
    pub fn snapshot(&self) -> Vec<Record> {
        self.entries.iter().rev().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes every entry to the log sink, newest first.
    pub fn echo(&self) {
        for record in self.entries.iter().rev() {
            echo_record(record);
        }
    }
}

/// Logs one record at a severity matching its level.
pub fn echo_record(record: &Record) {
    let id = record.id.0;
    let user = record.user.as_str();
    let created = record.created.to_rfc3339();
    let href = record.href.as_str();
    match record.level {
        Level::Error => error!(id, user, %created, href, "{}", record.message),
        Level::Warning => warn!(id, user, %created, href, "{}", record.message),
        _ => info!(id, user, %created, href, level = %record.level, "{}", record.message),
    }
}

#[derive(Serialize)]
struct Row {
    marker: &'static str,
    id: u64,
    created: String,
    level: String,
    user: String,
    message: String,
    href: String,
}

#[derive(Serialize)]
struct TableCtx {
    empty: bool,
    rows: Vec<Row>,
}

/// Plain-text review table for `records`, which are expected newest first.
pub fn render_table(records: &[Record]) -> Result<String, AppError> {
    let rows = records
        .iter()
        .enumerate()
        .map(|(i, record)| Row {
            marker: if i == 0 { "Latest" } else { "      " },
            id: record.id.0,
            created: record.created.format("%Y-%m-%d %H:%M:%S").to_string(),
            level: record.level.to_string(),
            user: record.user.clone(),
            message: record.lines().collect::<Vec<_>>().join("\n    "),
            href: record.href.clone(),
        })
        .collect::<Vec<_>>();
    let ctx = TableCtx {
        empty: rows.is_empty(),
        rows,
    };

    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&tinytemplate::format_unescaped);
    tt.add_template("history", HISTORY_TEMPLATE)
        .map_err(|e| AppError::Template(format!("template error: {e}")))?;
    tt.render("history", &ctx)
        .map_err(|e| AppError::Template(format!("render error: {e}")))
}

/// History rows in their exchange form, newest first.
pub fn to_dtos(records: &[Record]) -> Vec<HistoryEntryDto> {
    records.iter().map(HistoryEntryDto::from).collect()
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    use chrono::Utc;
    use postette_shared::{Delay, Integrate, Pause, RecordId};

    use super::*;

    fn record(id: u64, level: Level, message: &str) -> Record {
        Record {
            id: RecordId(id),
            user: "ops".into(),
            message: message.into(),
            created: Utc::now(),
            created_at: Instant::now(),
            level,
            href: "/srv/app".into(),
            pause: Pause::Millis(3000),
            delay: Delay::Millis(400),
            integrate: Integrate::Auto,
            once: false,
        }
    }

    #[test]
    fn snapshot_is_newest_first() {
        let mut log = HistoryLog::new();
        log.append(record(1, Level::Alert, "one"));
        log.append(record(2, Level::Alert, "two"));
        let ids: Vec<u64> = log.snapshot().iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![2, 1]);
        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn table_marks_latest_entry() {
        let records = vec![
            record(2, Level::Error, "disk <full>\nretrying"),
            record(1, Level::Alert, "started"),
        ];
        let table = render_table(&records).unwrap();
        assert!(table.starts_with("Latest #2"));
        assert!(table.contains("disk <full>\n    retrying"));
        assert!(table.contains("       #1"));
        assert!(table.contains("from /srv/app"));
        let latest = table.find("#2").unwrap();
        let older = table.find("#1").unwrap();
        assert!(latest < older);
    }

    #[test]
    fn empty_table_says_so() {
        let table = render_table(&[]).unwrap();
        assert_eq!(table.trim(), "There have been no notifications yet!");
    }

    #[test]
    fn dtos_keep_order_and_fields() {
        let dtos = to_dtos(&[record(5, Level::Success, "ok")]);
        assert_eq!(dtos[0].id, RecordId(5));
        assert_eq!(dtos[0].level, Level::Success);
        assert_eq!(dtos[0].href, "/srv/app");
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn echo_includes_time_and_origin() {
        let out = Captured::default();
        let writer = out.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let entry = record(7, Level::Warning, "low disk");
        tracing::subscriber::with_default(subscriber, || echo_record(&entry));

        let text = String::from_utf8(out.0.lock().unwrap().clone()).unwrap();
        assert!(text.contains("id=7"));
        assert!(text.contains("user=\"ops\""));
        assert!(text.contains(&format!("created={}", entry.created.to_rfc3339())));
        assert!(text.contains("href=\"/srv/app\""));
        assert!(text.contains("low disk"));
    }
}
