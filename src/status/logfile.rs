use chrono::NaiveDateTime;

/// Marker the model writes on a clean finish.
const COMPLETED_SENTINEL: &str = "Run completed successfully";
/// Tag on fatal model errors.
const FATAL_ERROR_TAG: &str = "[FATAL ERROR]";
/// Tag on errors from the post-processing step.
const POST_PROCESSING_TAG: &str = "post-processing error";
const START_TIME_PREFIX: &str = "Start Time: ";
const END_TIME_PREFIX: &str = "End Time: ";

/// What a finished run's log says happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutcome {
    Completed,
    Failed(String),
}

/// Everything extracted from one scan of a run's completion log.
#[derive(Debug, Clone, PartialEq)]
pub struct LogSummary {
    pub outcome: LogOutcome,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub storage_mb: u64,
}

/// Parse a completion log in a single pass.
///
/// Outcome precedence: an empty log fails outright; the completion sentinel
/// wins over everything else; post-processing errors outrank fatal model
/// errors; a log with no sentinel and no recognized error line fails with a
/// generic message. Timestamps and the storage figure are extracted while
/// scanning; a line that fails to parse degrades to "unset", never to an
/// error — scientific log output is not guaranteed well-formed.
pub fn parse(content: &str) -> LogSummary {
    let mut completed = false;
    let mut fatal_errors: Vec<String> = Vec::new();
    let mut post_processing_errors: Vec<String> = Vec::new();
    let mut start_time = None;
    let mut end_time = None;
    let mut storage_mb = 0u64;
    let mut any_lines = false;

    for line in content.lines() {
        any_lines = true;
        let line = line.trim_end();

        if line.contains(COMPLETED_SENTINEL) {
            completed = true;
        }
        if let Some(idx) = line.find(FATAL_ERROR_TAG) {
            fatal_errors.push(message_after(line, idx + FATAL_ERROR_TAG.len()));
        }
        if let Some(idx) = line.find(POST_PROCESSING_TAG) {
            post_processing_errors.push(message_after(line, idx + POST_PROCESSING_TAG.len()));
        }
        if let Some(rest) = line.strip_prefix(START_TIME_PREFIX) {
            start_time = parse_timestamp(rest);
        }
        if let Some(rest) = line.strip_prefix(END_TIME_PREFIX) {
            end_time = parse_timestamp(rest);
        }
        if let Some(mb) = parse_storage_line(line) {
            storage_mb = mb;
        }
    }

    let outcome = if !any_lines {
        LogOutcome::Failed("empty output".to_string())
    } else if completed {
        LogOutcome::Completed
    } else if !post_processing_errors.is_empty() {
        LogOutcome::Failed(format!(
            "Post processing error:{}",
            post_processing_errors.join(" ")
        ))
    } else if !fatal_errors.is_empty() {
        LogOutcome::Failed(format!("Jules error:{}", fatal_errors.join(" ")))
    } else {
        LogOutcome::Failed("Unknown error".to_string())
    };

    LogSummary {
        outcome,
        start_time,
        end_time,
        storage_mb,
    }
}

/// Message text after a tag: trimmed, with any leading separator dropped;
/// falls back to the whole line when nothing follows the tag.
fn message_after(line: &str, from: usize) -> String {
    let rest = line[from..].trim_start_matches([':', '-', ' ']).trim();
    if rest.is_empty() {
        line.trim().to_string()
    } else {
        rest.to_string()
    }
}

/// Permissive timestamp parsing: several known formats are tried in turn.
/// Unparseable dates are logged and dropped.
fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    const FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%a %b %e %H:%M:%S %Y",
        "%d/%m/%Y %H:%M:%S",
    ];
    for format in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    tracing::warn!(text, "could not parse log timestamp");
    None
}

/// Storage figure in megabytes, `du -sm` convention: a line whose first
/// token is an integer.
fn parse_storage_line(line: &str) -> Option<u64> {
    let mut tokens = line.split_whitespace();
    let first = tokens.next()?;
    // A bare number with nothing after it is not a du line.
    tokens.next()?;
    first.parse().ok()
}
