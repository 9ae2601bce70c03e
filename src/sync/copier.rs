use anyhow::Result;
use regex::Regex;

use crate::config::LocalConfig;
use crate::remote::RemoteListing;
use crate::run_id::run_path;
use crate::store::LocalFileStore;

use super::reconciler::Reconciliation;

/// Counts reported by one synchronisation pass. `created` counts one per
/// directory visited plus one per file copied — callers log these numbers,
/// so the counting rule is part of the contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncTotals {
    pub created: u64,
    pub updated: u64,
    pub deleted: u64,
}

/// Copies new run directories down from the remote listing and removes runs
/// the authority no longer knows about.
pub struct DirectoryCopier<'a> {
    remote: &'a dyn RemoteListing,
    store: &'a LocalFileStore,
    extensions: Vec<String>,
    ignore: Option<Regex>,
}

impl<'a> DirectoryCopier<'a> {
    pub fn new(
        remote: &'a dyn RemoteListing,
        store: &'a LocalFileStore,
        config: &LocalConfig,
    ) -> Result<Self> {
        Ok(Self {
            remote,
            store,
            extensions: config
                .extension_tokens()
                .into_iter()
                .map(str::to_string)
                .collect(),
            ignore: config.ignore_regex()?,
        })
    }

    /// Apply a reconciliation result: copy every new run directory, then
    /// delete every removed one.
    ///
    /// Deletions are fail-fast: the first failure aborts the remaining
    /// deletions for this pass. Directories copied earlier in the pass stand;
    /// there is no rollback.
    pub fn synchronise_all(&self, reconciliation: &Reconciliation) -> Result<SyncTotals> {
        let mut totals = SyncTotals::default();

        for id in &reconciliation.new_runs {
            let copied = self.copy_tree(&id.dir_name())?;
            tracing::info!(run = %id, entities = copied, "copied new run directory");
            totals.created += copied;
        }

        for id in &reconciliation.deleted_runs {
            let path = run_path(self.store.root(), *id);
            self.store.delete_dir(&path)?;
            tracing::info!(run = %id, "deleted local run directory");
            totals.deleted += 1;
        }

        Ok(totals)
    }

    /// Copy one remote directory tree into the mirror.
    ///
    /// Uses an explicit worklist rather than recursion so arbitrarily deep
    /// remote trees cannot exhaust the stack. Sub-directories (entries with
    /// the trailing-slash marker) are always traversed; files are downloaded
    /// only when their extension is in the allow-list. Existing files are
    /// never compared or re-copied.
    ///
    /// Returns the number of entities created: one per directory visited plus
    /// one per file copied.
    pub fn copy_tree(&self, name: &str) -> Result<u64> {
        let name = name.trim_end_matches('/');
        let top = self.store.root().join(name);
        if top.exists() {
            // Leftover from an interrupted pass; it will be filled in but
            // files already present are not reconciled.
            tracing::warn!(path = %top.display(), "target directory already exists (partial copy?)");
        }

        let mut copied = 0u64;
        let mut work: Vec<String> = vec![name.to_string()];

        while let Some(rel) = work.pop() {
            self.store.create_dir(&self.store.root().join(&rel))?;
            copied += 1;

            for entry in self.remote.list_contents(&rel)? {
                let file_name = entry.file_name();
                if file_name.is_empty() || file_name == ".." || file_name.contains('/') {
                    tracing::warn!(entry = %entry.name, "skipping suspicious listing entry");
                    continue;
                }
                if let Some(ignore) = &self.ignore {
                    if ignore.is_match(file_name) {
                        tracing::debug!(entry = file_name, "ignored by pattern");
                        continue;
                    }
                }

                let child = format!("{rel}/{file_name}");
                if entry.is_directory() {
                    work.push(child);
                } else if self.extension_allowed(file_name) {
                    let mut sink = self.store.create_file(&self.store.root().join(&child))?;
                    self.remote.download(&child, &mut sink)?;
                    copied += 1;
                } else {
                    tracing::debug!(entry = %child, "extension not in allow-list");
                }
            }
        }

        self.store.apply_permissions(&top)?;
        Ok(copied)
    }

    /// Exact, case-sensitive match of the final-dot extension against the
    /// configured tokens. A file without a dot is never copied.
    fn extension_allowed(&self, name: &str) -> bool {
        match name.rfind('.') {
            Some(i) => self.extensions.iter().any(|t| t == &name[i..]),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io;
    use std::path::PathBuf;

    use super::*;
    use crate::config::LocalConfig;
    use crate::remote::FileEntry;
    use crate::run_id::RunId;
    use crate::sync::reconciler::reconcile;

    /// In-memory remote: directory listings plus file bodies.
    struct FakeRemote {
        dirs: HashMap<String, Vec<FileEntry>>,
        files: HashMap<String, Vec<u8>>,
    }

    impl FakeRemote {
        fn new() -> Self {
            Self {
                dirs: HashMap::new(),
                files: HashMap::new(),
            }
        }

        fn dir(mut self, path: &str, entries: &[&str]) -> Self {
            self.dirs.insert(
                path.to_string(),
                entries.iter().map(|e| FileEntry::new(*e)).collect(),
            );
            self
        }

        fn file(mut self, path: &str, body: &[u8]) -> Self {
            self.files.insert(path.to_string(), body.to_vec());
            self
        }
    }

    impl RemoteListing for FakeRemote {
        fn list_contents(&self, path: &str) -> Result<Vec<FileEntry>> {
            self.dirs
                .get(path)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no such remote directory: {path}"))
        }

        fn download(&self, path: &str, sink: &mut dyn io::Write) -> Result<()> {
            let body = self
                .files
                .get(path)
                .ok_or_else(|| anyhow::anyhow!("no such remote file: {path}"))?;
            sink.write_all(body)?;
            Ok(())
        }
    }

    fn local_config(root: PathBuf, extensions: &str) -> LocalConfig {
        LocalConfig {
            root_path: root,
            allowed_extensions: extensions.to_string(),
            extra_directories: Vec::new(),
            ignore_pattern: None,
            delete_script: None,
            permission_script: None,
            job_id_file_name: "jules_job_id".into(),
            log_file_name: "out.log".into(),
        }
    }

    #[test]
    fn test_copy_tree_counts_dirs_and_files() {
        let tmp = tempfile::tempdir().unwrap();
        let remote = FakeRemote::new()
            .dir("run12", &["output/", "out.log", "notes.txt"])
            .dir("run12/output", &["daily.nc"])
            .file("run12/out.log", b"Run completed successfully")
            .file("run12/notes.txt", b"n")
            .file("run12/output/daily.nc", b"netcdf");
        let cfg = local_config(tmp.path().to_path_buf(), ".nc .log .txt");
        let store = LocalFileStore::new(&cfg);
        let copier = DirectoryCopier::new(&remote, &store, &cfg).unwrap();

        // 2 directories + 3 files
        assert_eq!(copier.copy_tree("run12").unwrap(), 5);
        assert!(tmp.path().join("run12/output/daily.nc").is_file());
        assert_eq!(
            std::fs::read(tmp.path().join("run12/out.log")).unwrap(),
            b"Run completed successfully"
        );
    }

    #[test]
    fn test_extension_filter_is_exact_and_case_sensitive() {
        let tmp = tempfile::tempdir().unwrap();
        let remote = FakeRemote::new()
            .dir("run1", &["a.nc", "b.NC", "c.txt", "README"])
            .file("run1/a.nc", b"x")
            .file("run1/b.NC", b"x")
            .file("run1/c.txt", b"x");
        let cfg = local_config(tmp.path().to_path_buf(), ".nc");
        let store = LocalFileStore::new(&cfg);
        let copier = DirectoryCopier::new(&remote, &store, &cfg).unwrap();

        assert_eq!(copier.copy_tree("run1").unwrap(), 2); // dir + a.nc
        assert!(tmp.path().join("run1/a.nc").is_file());
        assert!(!tmp.path().join("run1/b.NC").exists());
        assert!(!tmp.path().join("run1/c.txt").exists());
        assert!(!tmp.path().join("run1/README").exists());
    }

    #[test]
    fn test_directories_traversed_regardless_of_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let remote = FakeRemote::new()
            .dir("run1", &["output.d/"])
            .dir("run1/output.d", &["a.nc"])
            .file("run1/output.d/a.nc", b"x");
        let cfg = local_config(tmp.path().to_path_buf(), ".nc");
        let store = LocalFileStore::new(&cfg);
        let copier = DirectoryCopier::new(&remote, &store, &cfg).unwrap();

        copier.copy_tree("run1").unwrap();
        assert!(tmp.path().join("run1/output.d/a.nc").is_file());
    }

    #[test]
    fn test_ignore_pattern_skips_files_and_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let remote = FakeRemote::new()
            .dir("run1", &["checkpoint/", "a.nc", "a.nc.tmp"])
            .file("run1/a.nc", b"x")
            .file("run1/a.nc.tmp", b"x");
        let mut cfg = local_config(tmp.path().to_path_buf(), ".nc .tmp");
        cfg.ignore_pattern = Some(r"^checkpoint$|\.tmp$".to_string());
        let store = LocalFileStore::new(&cfg);
        let copier = DirectoryCopier::new(&remote, &store, &cfg).unwrap();

        // checkpoint/ is never listed, a.nc.tmp never downloaded
        assert_eq!(copier.copy_tree("run1").unwrap(), 2);
        assert!(!tmp.path().join("run1/checkpoint").exists());
        assert!(!tmp.path().join("run1/a.nc.tmp").exists());
    }

    #[test]
    fn test_deep_tree_does_not_recurse() {
        // 300 nested directories; would overflow naive recursion in debug.
        let tmp = tempfile::tempdir().unwrap();
        let mut remote = FakeRemote::new();
        let mut rel = "run1".to_string();
        for depth in 0..300 {
            remote = remote.dir(&rel, &["d/"]);
            rel = format!("{rel}/d");
            let _ = depth;
        }
        remote = remote.dir(&rel, &[]);
        let cfg = local_config(tmp.path().to_path_buf(), ".nc");
        let store = LocalFileStore::new(&cfg);
        let copier = DirectoryCopier::new(&remote, &store, &cfg).unwrap();

        assert_eq!(copier.copy_tree("run1").unwrap(), 301);
    }

    #[test]
    fn test_synchronise_then_rescan_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let remote = FakeRemote::new()
            .dir("run12", &["a.nc"])
            .file("run12/a.nc", b"x");
        let cfg = local_config(tmp.path().to_path_buf(), ".nc");
        let store = LocalFileStore::new(&cfg);
        let copier = DirectoryCopier::new(&remote, &store, &cfg).unwrap();

        let remote_ids = [RunId::new(12)].into_iter().collect();
        let first = reconcile(&store.scan_run_ids().unwrap(), &remote_ids);
        assert_eq!(first.new_runs.len(), 1);

        let totals = copier.synchronise_all(&first).unwrap();
        assert!(totals.created >= 1);

        // A second pass over the now-populated mirror has nothing to do.
        let second = reconcile(&store.scan_run_ids().unwrap(), &remote_ids);
        assert!(second.is_empty());
    }

    #[test]
    fn test_failed_delete_aborts_remaining_deletions() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = local_config(tmp.path().to_path_buf(), "");
        let store = LocalFileStore::new(&cfg);
        let remote = FakeRemote::new();
        let copier = DirectoryCopier::new(&remote, &store, &cfg).unwrap();

        // run1 is absent so its deletion fails; run2 exists and must survive.
        std::fs::create_dir(tmp.path().join("run2")).unwrap();
        let reconciliation = Reconciliation {
            new_runs: Default::default(),
            deleted_runs: [RunId::new(1), RunId::new(2)].into_iter().collect(),
        };

        let err = copier.synchronise_all(&reconciliation).unwrap_err();
        assert_eq!(crate::error::exit_code(&err), 1);
        assert!(tmp.path().join("run2").is_dir());
    }

    #[test]
    fn test_suspicious_entries_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let remote = FakeRemote::new().dir("run1", &["../evil.nc", "ok.nc"]).file(
            "run1/ok.nc",
            b"x",
        );
        let cfg = local_config(tmp.path().to_path_buf(), ".nc");
        let store = LocalFileStore::new(&cfg);
        let copier = DirectoryCopier::new(&remote, &store, &cfg).unwrap();

        assert_eq!(copier.copy_tree("run1").unwrap(), 2);
        assert!(!tmp.path().join("evil.nc").exists());
    }
}
