//! Append-only usage history and the per-task summary derived from it.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::types::Snapshot;

pub const HISTORY_HEADER: &str = "timestamp,task,availableGB,cpuLoad,wsl2MB";
pub const DEFAULT_HISTORY_FILE: &str = "usage_history.csv";

/// Reported by the analyzer when the log is absent or holds no data rows.
pub const NO_HISTORY_SENTINEL: &str = "No usage history recorded yet.";

/// One row of the log: what the host looked like while `task` was running.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub task: String,
    pub available_gb: f64,
    pub cpu_load: f64,
    pub wsl2_mb: f64,
}

impl HistoryEntry {
    pub fn from_snapshot(snapshot: &Snapshot, task: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            task: task.to_string(),
            available_gb: snapshot.available_gib(),
            cpu_load: snapshot.cpu_load_percent,
            wsl2_mb: snapshot.wsl2_mib(),
        }
    }

    fn to_line(&self) -> String {
        format!(
            "{},{},{:.2},{:.1},{:.1}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            quote_task(&self.task),
            self.available_gb,
            self.cpu_load,
            self.wsl2_mb,
        )
    }
}

/// The task label is caller-supplied free text. Quoting keeps commas inside
/// it from shifting columns; control characters are flattened to spaces so a
/// label can never span rows.
fn quote_task(task: &str) -> String {
    let cleaned: String = task
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    format!("\"{}\"", cleaned.replace('"', "\"\""))
}

/// Append-only log. Rows are only ever added at the end; nothing rewrites or
/// truncates the file.
pub struct HistoryLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl HistoryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one row, writing the column header first when the file is new
    /// or empty. Failures are returned to the caller, who decides whether
    /// they matter; the snapshot path logs and moves on.
    pub fn record(&self, entry: &HistoryEntry) -> io::Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let fresh = match std::fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        if fresh {
            writeln!(file, "{HISTORY_HEADER}")?;
        }
        writeln!(file, "{}", entry.to_line())
    }

    /// Reads the whole log back and groups it by task label. `None` when the
    /// file does not exist yet or holds no data rows.
    pub fn summarize(&self) -> io::Result<Option<HistorySummary>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err),
        };
        let summary = HistorySummary::from_csv(&content);
        Ok((summary.entries > 0).then_some(summary))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskStats {
    pub task: String,
    pub samples: usize,
    pub avg_available_gb: f64,
    pub min_available_gb: f64,
    pub avg_cpu_load: f64,
    pub avg_wsl2_mb: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistorySummary {
    pub entries: usize,
    pub first: String,
    pub last: String,
    pub tasks: Vec<TaskStats>,
}

struct ParsedRow {
    timestamp: String,
    task: String,
    available_gb: f64,
    cpu_load: f64,
    wsl2_mb: f64,
}

/// Undoes `quote_task` plus the numeric columns. Returns `None` for rows
/// that do not parse; the analyzer skips those instead of failing the report.
fn parse_row(line: &str) -> Option<ParsedRow> {
    let (timestamp, rest) = line.split_once(',')?;
    let rest = rest.strip_prefix('"')?;

    let mut task = String::new();
    let mut end = None;
    let mut chars = rest.char_indices();
    while let Some((i, c)) = chars.next() {
        if c != '"' {
            task.push(c);
            continue;
        }
        if rest[i + 1..].starts_with('"') {
            task.push('"');
            chars.next();
        } else {
            end = Some(i);
            break;
        }
    }

    let tail = rest[end? + 1..].strip_prefix(',')?;
    let mut numbers = tail.split(',');
    let available_gb = numbers.next()?.trim().parse().ok()?;
    let cpu_load = numbers.next()?.trim().parse().ok()?;
    let wsl2_mb = numbers.next()?.trim().parse().ok()?;
    if numbers.next().is_some() {
        return None;
    }
    Some(ParsedRow {
        timestamp: timestamp.to_string(),
        task,
        available_gb,
        cpu_load,
        wsl2_mb,
    })
}

#[derive(Default)]
struct TaskAccumulator {
    samples: usize,
    sum_available: f64,
    min_available: f64,
    sum_cpu: f64,
    sum_wsl2: f64,
}

impl HistorySummary {
    fn from_csv(content: &str) -> Self {
        let mut by_task: HashMap<String, TaskAccumulator> = HashMap::new();
        let mut entries = 0usize;
        let mut first = String::new();
        let mut last = String::new();

        for line in content.lines() {
            if line.is_empty() || line == HISTORY_HEADER {
                continue;
            }
            let Some(row) = parse_row(line) else { continue };
            if entries == 0 {
                first = row.timestamp.clone();
            }
            last = row.timestamp;
            entries += 1;

            let acc = by_task.entry(row.task).or_default();
            if acc.samples == 0 || row.available_gb < acc.min_available {
                acc.min_available = row.available_gb;
            }
            acc.samples += 1;
            acc.sum_available += row.available_gb;
            acc.sum_cpu += row.cpu_load;
            acc.sum_wsl2 += row.wsl2_mb;
        }

        let mut tasks: Vec<TaskStats> = by_task
            .into_iter()
            .map(|(task, acc)| TaskStats {
                task,
                samples: acc.samples,
                avg_available_gb: acc.sum_available / acc.samples as f64,
                min_available_gb: acc.min_available,
                avg_cpu_load: acc.sum_cpu / acc.samples as f64,
                avg_wsl2_mb: acc.sum_wsl2 / acc.samples as f64,
            })
            .collect();
        // Memory-starved tasks first; the report exists to point at them.
        tasks.sort_by(|a, b| {
            a.avg_available_gb
                .total_cmp(&b.avg_available_gb)
                .then_with(|| a.task.cmp(&b.task))
        });

        Self {
            entries,
            first,
            last,
            tasks,
        }
    }

    /// Plain-text report, one line per task label.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "Usage history: {} samples across {} tasks ({} .. {})\n\n",
            self.entries,
            self.tasks.len(),
            self.first,
            self.last,
        ));
        out.push_str(&format!(
            "{:<24} {:>8} {:>14} {:>14} {:>9} {:>11}\n",
            "TASK", "SAMPLES", "AVG_AVAIL_GB", "MIN_AVAIL_GB", "AVG_CPU%", "AVG_WSL_MB"
        ));
        for stats in &self.tasks {
            out.push_str(&format!(
                "{:<24} {:>8} {:>14.2} {:>14.2} {:>9.1} {:>11.1}\n",
                stats.task,
                stats.samples,
                stats.avg_available_gb,
                stats.min_available_gb,
                stats.avg_cpu_load,
                stats.avg_wsl2_mb,
            ));
        }
        out.push_str("\nTasks with the least available memory sort first.");
        out
    }
}
