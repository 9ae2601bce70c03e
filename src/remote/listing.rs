use std::io;
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;

use crate::config::FileServerConfig;
use crate::error::UserError;

/// One entry parsed out of a remote directory index.
///
/// The server marks directories with a trailing slash in the anchor text;
/// there is no separate metadata field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
}

impl FileEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn is_directory(&self) -> bool {
        self.name.ends_with('/')
    }

    /// Name without the directory marker.
    pub fn file_name(&self) -> &str {
        self.name.trim_end_matches('/')
    }
}

/// Read access to the remote file server, as the copier sees it.
pub trait RemoteListing {
    /// List the entries of the directory at `path` (relative to the root).
    fn list_contents(&self, path: &str) -> Result<Vec<FileEntry>>;

    /// Stream the file at `path` into `sink` without buffering the whole body.
    fn download(&self, path: &str, sink: &mut dyn io::Write) -> Result<()>;
}

/// Client for an Apache-style directory index over HTTP basic auth.
pub struct HttpFileServer {
    http: reqwest::blocking::Client,
    base_url: String,
    username: String,
    password: String,
}

impl HttpFileServer {
    pub fn new(config: &FileServerConfig) -> Result<Self> {
        let timeout = Duration::from_secs_f64(config.timeout_secs);
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn url_for(&self, path: &str) -> String {
        let path = path.trim_matches('/');
        if path.is_empty() {
            format!("{}/", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response> {
        let resp = self
            .http
            .get(url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .map_err(|e| UserError::from_request(&e, url))?;

        if !resp.status().is_success() {
            return Err(UserError::client(format!(
                "Request to {url} failed with status {}",
                resp.status()
            ))
            .into());
        }
        Ok(resp)
    }
}

impl RemoteListing for HttpFileServer {
    fn list_contents(&self, path: &str) -> Result<Vec<FileEntry>> {
        let url = format!("{}/", self.url_for(path).trim_end_matches('/'));
        let body = self
            .get(&url)
            .with_context(|| format!("Failed to list {url}"))?
            .text()
            .map_err(|e| UserError::from_request(&e, &url))?;
        Ok(parse_directory_index(&body))
    }

    fn download(&self, path: &str, sink: &mut dyn io::Write) -> Result<()> {
        let url = self.url_for(path);
        let mut resp = self.get(&url)?;
        // Response implements Read; io::copy streams in fixed-size chunks.
        io::copy(&mut resp, sink)
            .map_err(|e| UserError::client(format!("Download of {url} failed: {e}")))?;
        Ok(())
    }
}

/// Extract the anchor entries of an Apache directory index.
///
/// Only anchors inside table-data cells are taken, and the literal
/// "Parent Directory" navigation entry is dropped.
pub fn parse_directory_index(html: &str) -> Vec<FileEntry> {
    static ANCHOR: OnceLock<Regex> = OnceLock::new();
    let anchor = ANCHOR
        .get_or_init(|| Regex::new(r#"<a\s+href="[^"]*"[^>]*>([^<]+)</a>"#).expect("static regex"));

    let mut entries = Vec::new();
    for line in html.lines() {
        if !line.contains("<td") {
            continue;
        }
        for cap in anchor.captures_iter(line) {
            let name = cap[1].trim();
            if name.is_empty() || name.eq_ignore_ascii_case("Parent Directory") {
                continue;
            }
            entries.push(FileEntry::new(name));
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    const APACHE_INDEX: &str = r#"<html>
 <head><title>Index of /jules_runs/run12</title></head>
 <body>
<h1>Index of /jules_runs/run12</h1>
  <table>
   <tr><th><img src="/icons/blank.gif" alt="[ICO]"></th><th><a href="?C=N;O=D">Name</a></th></tr>
   <tr><th colspan="5"><hr></th></tr>
<tr><td valign="top"><img src="/icons/back.gif" alt="[PARENTDIR]"></td><td><a href="/jules_runs/">Parent Directory</a></td><td>&nbsp;</td></tr>
<tr><td valign="top"><img src="/icons/folder.gif" alt="[DIR]"></td><td><a href="output/">output/</a></td><td align="right">2014-03-10 09:21</td></tr>
<tr><td valign="top"><img src="/icons/unknown.gif" alt="[   ]"></td><td><a href="out.log">out.log</a></td><td align="right">2014-03-10 09:40</td></tr>
   <tr><th colspan="5"><hr></th></tr>
</table>
</body></html>
"#;

    #[test]
    fn test_parse_index_entries() {
        let entries = parse_directory_index(APACHE_INDEX);
        assert_eq!(
            entries,
            vec![FileEntry::new("output/"), FileEntry::new("out.log")]
        );
    }

    #[test]
    fn test_parent_directory_excluded() {
        let entries = parse_directory_index(APACHE_INDEX);
        assert!(entries.iter().all(|e| e.name != "Parent Directory"));
    }

    #[test]
    fn test_anchor_outside_table_cell_ignored() {
        let html = r#"<h1><a href="/home">Index of /runs</a></h1>"#;
        assert!(parse_directory_index(html).is_empty());
    }

    #[test]
    fn test_directory_classification_by_trailing_slash() {
        let entries = parse_directory_index(APACHE_INDEX);
        assert!(entries[0].is_directory());
        assert_eq!(entries[0].file_name(), "output");
        assert!(!entries[1].is_directory());
        assert_eq!(entries[1].file_name(), "out.log");
    }

    #[test]
    fn test_empty_index() {
        assert!(parse_directory_index("<html><body></body></html>").is_empty());
    }
}
