use std::collections::HashMap;

/// Status of a job still known to the scheduler queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueStatus {
    Running,
    Pending,
    Unknown,
}

/// Snapshot of the scheduler queue, keyed by job id. Rebuilt from `bjobs`
/// output on every poll; never persisted.
pub type QueueSnapshot = HashMap<u64, QueueStatus>;

/// Parse the plain-text `bjobs` queue table.
///
/// The header row is located by the literal column token `STAT`; without one
/// the queue is treated as empty (no jobs tracked), not as an error. Each
/// following line that begins with an integer job id contributes one entry;
/// the status keyword is read at the column offset where `STAT` began and
/// classified by prefix. Wrapped continuation lines do not start with an
/// integer and are skipped.
pub fn parse(output: &str) -> QueueSnapshot {
    let mut lines = output.lines();

    let stat_column = loop {
        match lines.next() {
            Some(line) => {
                if let Some(col) = line.find("STAT") {
                    break col;
                }
            }
            None => return QueueSnapshot::new(),
        }
    };

    let mut snapshot = QueueSnapshot::new();
    for line in lines {
        let job_id = match line.split_whitespace().next().and_then(|t| t.parse::<u64>().ok()) {
            Some(id) => id,
            None => continue,
        };

        let keyword = line
            .get(stat_column..)
            .unwrap_or("")
            .split_whitespace()
            .next()
            .unwrap_or("");

        let status = if keyword.starts_with("RUN") {
            QueueStatus::Running
        } else if keyword.starts_with("PEND") {
            QueueStatus::Pending
        } else {
            // The scheduler's status vocabulary is not fully enumerable.
            tracing::warn!(job_id, keyword, "unrecognized scheduler status");
            QueueStatus::Unknown
        };
        snapshot.insert(job_id, status);
    }
    snapshot
}
