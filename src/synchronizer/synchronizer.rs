use std::path::{Path, PathBuf};

use derive_more::Display;
use snafu::ResultExt;
use tracing::{debug, warn};

use super::directory_listing::{DirectoryListing, EntryKind};
use super::operations::{self, Outcome, SyncAction};
use super::sync_error::{FileAccessSnafu, LogSnafu, RootMissingSnafu, SyncError};
use super::tree_path_pair::TreePathPair;
use crate::change_detection::is_stale;
use crate::log_sink::LogSink;

/// Per-entry classification, recomputed on every pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SyncDecision {
    Create,
    Update,
    NoOp,
    Delete,
}

/// Counters for one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Display)]
#[display(
    "{directories_created} directories created, {files_copied} files copied, \
     {files_updated} files updated, {files_deleted} files deleted, \
     {directories_deleted} directories deleted, {skipped} skipped, {} conflicts",
    conflicts.len()
)]
pub struct PassReport {
    pub directories_created: usize,
    pub files_copied: usize,
    pub files_updated: usize,
    pub files_deleted: usize,
    pub directories_deleted: usize,
    pub skipped: usize,
    pub conflicts: Vec<PathBuf>,
}

impl PassReport {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Done(SyncAction::CreateDirectory) => self.directories_created += 1,
            Outcome::Done(SyncAction::CopyFile) => self.files_copied += 1,
            Outcome::Done(SyncAction::UpdateFile) => self.files_updated += 1,
            Outcome::Done(SyncAction::DeleteFile) => self.files_deleted += 1,
            Outcome::Done(SyncAction::DeleteDirectory) => self.directories_deleted += 1,
            Outcome::Skipped(_) => self.skipped += 1,
        }
    }

    /// Number of mutating operations applied to the replica.
    pub fn mutations(&self) -> usize {
        self.directories_created
            + self.files_copied
            + self.files_updated
            + self.files_deleted
            + self.directories_deleted
    }
}

/// Mirrors `source` onto `replica`, one pass at a time.
///
/// Holds no state between passes apart from the log sink it owns.
pub struct Synchronizer<S> {
    roots: TreePathPair,
    sink: S,
}

impl<S: LogSink> Synchronizer<S> {
    pub fn new(source: impl Into<PathBuf>, replica: impl Into<PathBuf>, sink: S) -> Self {
        Self {
            roots: TreePathPair::new(source, replica),
            sink,
        }
    }

    pub fn roots(&self) -> &TreePathPair {
        &self.roots
    }

    #[cfg(test)]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Runs one full pass and reports what it changed.
    ///
    /// Any error aborts the pass where it happened. The replica is then
    /// partially synchronized and the next pass picks up from there.
    pub async fn run_pass(&mut self) -> Result<PassReport, SyncError> {
        self.check_roots()?;

        let mut report = PassReport::default();
        self.reconcile_directories(&mut report).await?;
        self.reconcile_contents(&mut report).await?;

        debug!("Synchronization pass finished: {report}");
        Ok(report)
    }

    fn check_roots(&self) -> Result<(), SyncError> {
        for root in [&self.roots.source, &self.roots.replica] {
            if !root.is_dir() {
                return RootMissingSnafu { path: root.clone() }.fail();
            }
        }
        Ok(())
    }

    /// Creates every missing replica directory, parents before children.
    async fn reconcile_directories(&mut self, report: &mut PassReport) -> Result<(), SyncError> {
        let mut pending = vec![self.roots.clone()];

        while let Some(pair) = pending.pop() {
            let source = DirectoryListing::read(&pair.source)?;
            let replica = DirectoryListing::read(&pair.replica)?;

            for source_dir in source.of_kind(EntryKind::Directory) {
                let replica_name = match replica.counterpart_of(source_dir, &source) {
                    Some(existing) => existing.name.clone(),
                    None => {
                        let target = pair.replica.join(&source_dir.name);
                        match operations::create_directory(&target, &mut self.sink).await {
                            Ok(outcome) => report.record(outcome),
                            Err(SyncError::PathConflictError { path }) => {
                                self.report_conflict(path, report)?;
                                continue;
                            }
                            Err(error) => return Err(error),
                        }
                        source_dir.name.clone()
                    }
                };

                pending.push(pair.descend(&source_dir.name, &replica_name));
            }
        }

        Ok(())
    }

    /// Deletes extras, then copies and updates files, directory by directory.
    async fn reconcile_contents(&mut self, report: &mut PassReport) -> Result<(), SyncError> {
        let mut pending = vec![self.roots.clone()];

        while let Some(pair) = pending.pop() {
            let source = DirectoryListing::read(&pair.source)?;
            let replica = DirectoryListing::read(&pair.replica)?;

            self.remove_extras(&source, &replica, report).await?;
            self.mirror_files(&pair, &source, &replica, report).await?;

            for source_dir in source.of_kind(EntryKind::Directory) {
                match replica.counterpart_of(source_dir, &source) {
                    Some(replica_dir) => {
                        pending.push(pair.descend(&source_dir.name, &replica_dir.name))
                    }
                    None => debug!(
                        "No replica directory for {}, skipping it this pass",
                        source_dir.path.display()
                    ),
                }
            }
        }

        Ok(())
    }

    async fn remove_extras(
        &mut self,
        source: &DirectoryListing,
        replica: &DirectoryListing,
        report: &mut PassReport,
    ) -> Result<(), SyncError> {
        for entry in replica.entries() {
            let decision = if replica.is_mirrored(entry, source) {
                SyncDecision::NoOp
            } else {
                SyncDecision::Delete
            };

            let outcome = match (decision, entry.kind) {
                (SyncDecision::Delete, EntryKind::File | EntryKind::Special) => {
                    operations::delete_file(&entry.path, &mut self.sink).await?
                }
                (SyncDecision::Delete, EntryKind::Directory) => {
                    operations::delete_directory(&entry.path, &mut self.sink).await?
                }
                _ => continue,
            };
            report.record(outcome);
        }

        Ok(())
    }

    async fn mirror_files(
        &mut self,
        pair: &TreePathPair,
        source: &DirectoryListing,
        replica: &DirectoryListing,
        report: &mut PassReport,
    ) -> Result<(), SyncError> {
        for source_file in source.of_kind(EntryKind::File) {
            let counterpart = replica.counterpart_of(source_file, source);
            let replica_path = counterpart
                .map(|entry| entry.path.clone())
                .unwrap_or_else(|| pair.replica.join(&source_file.name));

            let decision = match counterpart {
                None => SyncDecision::Create,
                Some(_) => classify_existing(&source_file.path, &replica_path).await?,
            };

            let outcome = match decision {
                SyncDecision::Create => {
                    operations::copy_file(&source_file.path, &replica_path, &mut self.sink).await?
                }
                SyncDecision::Update => {
                    operations::update_file(&source_file.path, &replica_path, &mut self.sink)
                        .await?
                }
                SyncDecision::NoOp | SyncDecision::Delete => continue,
            };
            report.record(outcome);
        }

        Ok(())
    }

    fn report_conflict(&mut self, path: PathBuf, report: &mut PassReport) -> Result<(), SyncError> {
        warn!(
            "Another kind of entry occupies directory name {}, skipping its subtree this pass",
            path.display()
        );
        self.sink
            .append(&format!(
                "Path conflict, skipped this pass: {}",
                path.display()
            ))
            .context(LogSnafu)?;
        report.conflicts.push(path);
        Ok(())
    }
}

async fn classify_existing(source: &Path, replica: &Path) -> Result<SyncDecision, SyncError> {
    let stale = is_stale(source, replica).await.context(FileAccessSnafu {
        replica: replica.to_path_buf(),
    })?;

    Ok(if stale {
        SyncDecision::Update
    } else {
        SyncDecision::NoOp
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_sink::testing::MemoryLogSink;
    use std::collections::BTreeMap;
    use std::fs;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;
    use walkdir::WalkDir;

    struct Fixture {
        _temp_dir: TempDir,
        source: PathBuf,
        replica: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let temp_dir = TempDir::new().expect("Failed to create temp directory");
            let source = temp_dir.path().join("source");
            let replica = temp_dir.path().join("replica");
            fs::create_dir(&source).unwrap();
            fs::create_dir(&replica).unwrap();
            Self {
                _temp_dir: temp_dir,
                source,
                replica,
            }
        }

        fn synchronizer(&self) -> Synchronizer<MemoryLogSink> {
            Synchronizer::new(&self.source, &self.replica, MemoryLogSink::default())
        }
    }

    fn write_file(root: &Path, relative: &str, content: &str) -> PathBuf {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    fn set_mtime(path: &Path, seconds: u64) {
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(seconds))
            .unwrap();
    }

    /// Relative path (case-folded) to file content, `None` for directories.
    fn snapshot(root: &Path) -> BTreeMap<String, Option<String>> {
        WalkDir::new(root)
            .min_depth(1)
            .into_iter()
            .map(|entry| entry.unwrap())
            .map(|entry| {
                let relative = entry
                    .path()
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
                    .to_lowercase();
                let content = entry
                    .file_type()
                    .is_file()
                    .then(|| fs::read_to_string(entry.path()).unwrap());
                (relative, content)
            })
            .collect()
    }

    #[compio::test]
    async fn missing_file_is_copied_with_one_record() {
        let fixture = Fixture::new();
        let source_file = write_file(&fixture.source, "f1.txt", "hello");
        let mut synchronizer = fixture.synchronizer();

        let report = synchronizer.run_pass().await.unwrap();

        let replica_file = fixture.replica.join("f1.txt");
        assert_eq!(fs::read_to_string(&replica_file).unwrap(), "hello");
        assert_eq!(report.files_copied, 1);
        assert_eq!(report.mutations(), 1);
        assert_eq!(
            synchronizer.sink().messages(),
            vec![format!(
                "File copied: {} -> {}",
                source_file.display(),
                replica_file.display()
            )]
        );
    }

    #[compio::test]
    async fn different_content_with_same_timestamp_is_updated() {
        let fixture = Fixture::new();
        let source_file = write_file(&fixture.source, "f1.txt", "hello");
        let replica_file = write_file(&fixture.replica, "f1.txt", "world");
        set_mtime(&source_file, 1_700_000_000);
        set_mtime(&replica_file, 1_700_000_000);
        let mut synchronizer = fixture.synchronizer();

        let report = synchronizer.run_pass().await.unwrap();

        assert_eq!(fs::read_to_string(&replica_file).unwrap(), "hello");
        assert_eq!(report.files_updated, 1);
        assert_eq!(
            synchronizer.sink().messages(),
            vec![format!(
                "File updated: {} -> {}",
                source_file.display(),
                replica_file.display()
            )]
        );
    }

    #[compio::test]
    async fn newer_source_with_identical_content_is_still_updated() {
        let fixture = Fixture::new();
        let source_file = write_file(&fixture.source, "f1.txt", "same");
        let replica_file = write_file(&fixture.replica, "f1.txt", "same");
        set_mtime(&replica_file, 1_700_000_000);
        set_mtime(&source_file, 1_700_000_060);
        let mut synchronizer = fixture.synchronizer();

        let report = synchronizer.run_pass().await.unwrap();

        assert_eq!(report.files_updated, 1);
        assert_eq!(report.mutations(), 1);
    }

    #[compio::test]
    async fn identical_file_with_newer_replica_is_left_alone() {
        let fixture = Fixture::new();
        let source_file = write_file(&fixture.source, "f1.txt", "same");
        let replica_file = write_file(&fixture.replica, "f1.txt", "same");
        set_mtime(&source_file, 1_700_000_000);
        set_mtime(&replica_file, 1_700_000_060);
        let mut synchronizer = fixture.synchronizer();

        let report = synchronizer.run_pass().await.unwrap();

        assert_eq!(report.mutations(), 0);
        assert!(synchronizer.sink().records.is_empty());
    }

    #[compio::test]
    async fn extras_are_deleted_with_one_record_each() {
        let fixture = Fixture::new();
        write_file(&fixture.replica, "stale.txt", "x");
        write_file(&fixture.replica, "oldDir/nested/deep.txt", "y");
        let mut synchronizer = fixture.synchronizer();

        let report = synchronizer.run_pass().await.unwrap();

        assert!(snapshot(&fixture.replica).is_empty());
        assert_eq!(report.files_deleted, 1);
        assert_eq!(report.directories_deleted, 1);
        assert_eq!(
            synchronizer.sink().messages(),
            vec![
                format!(
                    "Directory deleted: {}",
                    fixture.replica.join("oldDir").display()
                ),
                format!("File deleted: {}", fixture.replica.join("stale.txt").display()),
            ]
        );
    }

    #[compio::test]
    async fn empty_nested_directories_are_all_created() {
        let fixture = Fixture::new();
        fs::create_dir_all(fixture.source.join("A").join("B").join("C")).unwrap();
        let mut synchronizer = fixture.synchronizer();

        let report = synchronizer.run_pass().await.unwrap();

        assert!(fixture.replica.join("A").is_dir());
        assert!(fixture.replica.join("A").join("B").is_dir());
        assert!(fixture.replica.join("A").join("B").join("C").is_dir());
        assert_eq!(report.directories_created, 3);
    }

    #[compio::test]
    async fn directories_are_created_before_any_file_is_copied() {
        let fixture = Fixture::new();
        write_file(&fixture.source, "top.txt", "top");
        write_file(&fixture.source, "a/one.txt", "one");
        write_file(&fixture.source, "a/b/two.txt", "two");
        write_file(&fixture.source, "z/three.txt", "three");
        let mut synchronizer = fixture.synchronizer();

        synchronizer.run_pass().await.unwrap();

        let messages = synchronizer.sink().messages();
        let last_created = messages
            .iter()
            .rposition(|m| m.starts_with("Directory created"))
            .unwrap();
        let first_copied = messages
            .iter()
            .position(|m| m.starts_with("File copied"))
            .unwrap();
        assert!(last_created < first_copied);
        assert_eq!(messages.len(), 3 + 4);
    }

    #[compio::test]
    async fn arbitrary_replica_converges_and_second_pass_is_idle() {
        let fixture = Fixture::new();
        write_file(&fixture.source, "readme.md", "# mirror");
        write_file(&fixture.source, "docs/guide.md", "guide");
        write_file(&fixture.source, "docs/api/index.html", "<html/>");
        write_file(&fixture.source, "assets/logo.svg", "<svg/>");
        fs::create_dir_all(fixture.source.join("empty").join("inner")).unwrap();

        write_file(&fixture.replica, "readme.md", "outdated");
        write_file(&fixture.replica, "docs/guide.md", "guide");
        write_file(&fixture.replica, "docs/removed.md", "gone");
        write_file(&fixture.replica, "docs/api/old/page.html", "old");
        write_file(&fixture.replica, "tmp/cache.bin", "cache");

        let mut synchronizer = fixture.synchronizer();

        synchronizer.run_pass().await.unwrap();
        assert_eq!(snapshot(&fixture.replica), snapshot(&fixture.source));

        let records_after_first = synchronizer.sink().records.len();
        let second = synchronizer.run_pass().await.unwrap();
        assert_eq!(second.mutations(), 0);
        assert_eq!(synchronizer.sink().records.len(), records_after_first);
    }

    #[compio::test]
    async fn replica_directory_in_place_of_source_file_is_replaced() {
        let fixture = Fixture::new();
        write_file(&fixture.source, "entry", "file content");
        write_file(&fixture.replica, "entry/nested.txt", "old");
        let mut synchronizer = fixture.synchronizer();

        let report = synchronizer.run_pass().await.unwrap();

        assert_eq!(report.directories_deleted, 1);
        assert_eq!(report.files_copied, 1);
        assert_eq!(snapshot(&fixture.replica), snapshot(&fixture.source));
    }

    #[compio::test]
    async fn replica_file_in_place_of_source_directory_converges_next_pass() {
        let fixture = Fixture::new();
        write_file(&fixture.source, "entry/inner.txt", "inner");
        write_file(&fixture.replica, "entry", "blocking file");
        let mut synchronizer = fixture.synchronizer();

        let first = synchronizer.run_pass().await.unwrap();

        assert_eq!(first.conflicts, vec![fixture.replica.join("entry")]);
        assert_eq!(first.files_deleted, 1);
        assert!(!fixture.replica.join("entry").exists());

        let second = synchronizer.run_pass().await.unwrap();

        assert!(second.conflicts.is_empty());
        assert_eq!(snapshot(&fixture.replica), snapshot(&fixture.source));
    }

    #[compio::test]
    async fn case_variant_in_replica_is_updated_instead_of_duplicated() {
        let fixture = Fixture::new();
        write_file(&fixture.source, "Docs/Report.TXT", "new");
        let replica_file = write_file(&fixture.replica, "docs/report.txt", "old");
        let mut synchronizer = fixture.synchronizer();

        let report = synchronizer.run_pass().await.unwrap();

        assert_eq!(report.directories_created, 0);
        assert_eq!(report.files_updated, 1);
        assert_eq!(fs::read_to_string(&replica_file).unwrap(), "new");
        assert_eq!(snapshot(&fixture.replica), snapshot(&fixture.source));
    }

    #[compio::test]
    async fn vanished_replica_root_fails_the_pass() {
        let fixture = Fixture::new();
        write_file(&fixture.source, "f1.txt", "hello");
        fs::remove_dir(&fixture.replica).unwrap();
        let mut synchronizer = fixture.synchronizer();

        let result = synchronizer.run_pass().await;

        assert!(matches!(
            result,
            Err(SyncError::RootMissingError { ref path }) if *path == fixture.replica
        ));
        assert!(synchronizer.sink().records.is_empty());
    }

    #[cfg(unix)]
    #[compio::test]
    async fn replica_symlinks_are_removed_and_never_written_through() {
        let fixture = Fixture::new();
        let outside = fixture.replica.with_file_name("outside.txt");
        fs::write(&outside, "untouched").unwrap();
        std::os::unix::fs::symlink(&outside, fixture.replica.join("f1.txt")).unwrap();
        std::os::unix::fs::symlink(&outside, fixture.replica.join("extra.lnk")).unwrap();
        write_file(&fixture.source, "f1.txt", "hello");
        let mut synchronizer = fixture.synchronizer();

        let first = synchronizer.run_pass().await.unwrap();

        assert_eq!(fs::read_to_string(&outside).unwrap(), "untouched");
        assert_eq!(first.files_deleted, 2);
        assert_eq!(first.files_copied, 1);
        let replica_file = fs::symlink_metadata(fixture.replica.join("f1.txt")).unwrap();
        assert!(replica_file.file_type().is_file());
        assert!(fs::symlink_metadata(fixture.replica.join("extra.lnk")).is_err());
        assert_eq!(snapshot(&fixture.replica), snapshot(&fixture.source));

        let second = synchronizer.run_pass().await.unwrap();
        assert_eq!(second.mutations(), 0);
    }

    #[cfg(unix)]
    #[compio::test]
    async fn replica_symlink_in_place_of_source_directory_converges_next_pass() {
        let fixture = Fixture::new();
        let elsewhere = fixture.replica.with_file_name("elsewhere");
        write_file(&elsewhere, "keep.txt", "keep");
        std::os::unix::fs::symlink(&elsewhere, fixture.replica.join("docs")).unwrap();
        write_file(&fixture.source, "docs/a.txt", "a");
        let mut synchronizer = fixture.synchronizer();

        let first = synchronizer.run_pass().await.unwrap();

        assert_eq!(first.conflicts, vec![fixture.replica.join("docs")]);
        assert_eq!(first.files_deleted, 1);
        assert!(fs::symlink_metadata(fixture.replica.join("docs")).is_err());
        assert!(elsewhere.join("keep.txt").is_file());
        assert!(!elsewhere.join("a.txt").exists());

        let second = synchronizer.run_pass().await.unwrap();

        assert!(second.conflicts.is_empty());
        assert_eq!(second.directories_created, 1);
        assert_eq!(second.files_copied, 1);
        assert_eq!(snapshot(&fixture.replica), snapshot(&fixture.source));

        let third = synchronizer.run_pass().await.unwrap();
        assert_eq!(third.mutations(), 0);
    }

    #[cfg(unix)]
    #[compio::test]
    async fn source_symlinks_are_not_mirrored() {
        let fixture = Fixture::new();
        let target = write_file(&fixture.source, "real.txt", "real");
        std::os::unix::fs::symlink(&target, fixture.source.join("alias.txt")).unwrap();
        let mut synchronizer = fixture.synchronizer();

        let report = synchronizer.run_pass().await.unwrap();

        assert_eq!(report.files_copied, 1);
        assert!(fixture.replica.join("real.txt").is_file());
        assert!(fs::symlink_metadata(fixture.replica.join("alias.txt")).is_err());
    }
}
