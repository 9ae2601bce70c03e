use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Directory name prefix for a model run on disk (`run123`).
pub const RUN_DIR_PREFIX: &str = "run";

/// Identifier of one model run.
///
/// Run ids are opaque non-negative integers. Because the inner value is a
/// `u64`, a run id can only ever render to a directory name made of the
/// `run` prefix plus digits — no separator or `..` can reach a path builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Deserialize)]
pub struct RunId(u64);

impl RunId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    /// Directory name for this run (`run<id>`).
    pub fn dir_name(self) -> String {
        format!("{RUN_DIR_PREFIX}{}", self.0)
    }

    /// Parse a local directory name of the form `run<digits>`.
    ///
    /// Returns `None` for anything else; callers scanning a directory listing
    /// silently skip names that do not match.
    pub fn from_dir_name(name: &str) -> Option<Self> {
        let digits = name.strip_prefix(RUN_DIR_PREFIX)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().map(Self)
    }
}

impl FromStr for RunId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Build the local directory path for a run under `root`.
pub fn run_path(root: &Path, id: RunId) -> PathBuf {
    root.join(id.dir_name())
}
