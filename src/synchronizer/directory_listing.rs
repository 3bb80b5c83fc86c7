use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};

use derive_more::Display;
use hashlink::LinkedHashMap;
use snafu::ResultExt;
use tracing::trace;

use super::sync_error::{ReadDirectorySnafu, SyncError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum EntryKind {
    #[display("file")]
    File,
    #[display("directory")]
    Directory,
    /// Symlink, device, socket or fifo. Never followed and never paired.
    #[display("special entry")]
    Special,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub name: OsString,
    pub path: PathBuf,
    pub kind: EntryKind,
}

/// Snapshot of one directory's entries, grouped by case-folded name.
///
/// Special entries are listed but have no counterpart on either side, so the
/// source's are ignored and the replica's are removed as extras.
#[derive(Debug, Clone, Default)]
pub struct DirectoryListing {
    groups: LinkedHashMap<String, Vec<TreeEntry>>,
}

fn fold_name(name: &OsStr) -> String {
    name.to_string_lossy().to_lowercase()
}

impl DirectoryListing {
    pub fn read(dir: &Path) -> Result<Self, SyncError> {
        let mut entries = Vec::new();

        for entry in fs::read_dir(dir).context(ReadDirectorySnafu { path: dir })? {
            let entry = entry.context(ReadDirectorySnafu { path: dir })?;
            let file_type = entry
                .file_type()
                .context(ReadDirectorySnafu { path: entry.path() })?;

            let kind = if file_type.is_dir() {
                EntryKind::Directory
            } else if file_type.is_file() {
                EntryKind::File
            } else {
                trace!("Found special entry {}", entry.path().display());
                EntryKind::Special
            };

            entries.push(TreeEntry {
                name: entry.file_name(),
                path: entry.path(),
                kind,
            });
        }

        Ok(Self::from_entries(entries))
    }

    pub fn from_entries(mut entries: Vec<TreeEntry>) -> Self {
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        let mut groups: LinkedHashMap<String, Vec<TreeEntry>> = LinkedHashMap::new();
        for entry in entries {
            groups
                .entry(fold_name(&entry.name))
                .or_insert_with(Vec::new)
                .push(entry);
        }

        Self { groups }
    }

    pub fn entries(&self) -> impl Iterator<Item = &TreeEntry> {
        self.groups.values().flatten()
    }

    pub fn of_kind(&self, kind: EntryKind) -> impl Iterator<Item = &TreeEntry> {
        self.entries().filter(move |entry| entry.kind == kind)
    }

    fn same_name(&self, name: &OsStr, kind: EntryKind) -> impl Iterator<Item = &TreeEntry> {
        self.groups
            .get(&fold_name(name))
            .into_iter()
            .flatten()
            .filter(move |entry| entry.kind == kind)
    }

    /// Entry of `self` (the replica side) that mirrors `source_entry`.
    ///
    /// An exact name match always wins. A case-variant only pairs up when the
    /// source directory has no other case-variant of the same name, otherwise
    /// two source entries would fight over one replica entry.
    pub fn counterpart_of(
        &self,
        source_entry: &TreeEntry,
        source: &DirectoryListing,
    ) -> Option<&TreeEntry> {
        if source_entry.kind == EntryKind::Special {
            return None;
        }

        if let Some(exact) = self
            .same_name(&source_entry.name, source_entry.kind)
            .find(|candidate| candidate.name == source_entry.name)
        {
            return Some(exact);
        }

        let ambiguous = source
            .same_name(&source_entry.name, source_entry.kind)
            .nth(1)
            .is_some();
        if ambiguous {
            return None;
        }

        self.same_name(&source_entry.name, source_entry.kind).next()
    }

    /// Whether `replica_entry`, taken from `self`, mirrors some entry of `source`.
    pub fn is_mirrored(&self, replica_entry: &TreeEntry, source: &DirectoryListing) -> bool {
        if replica_entry.kind == EntryKind::Special {
            return false;
        }

        source
            .same_name(&replica_entry.name, replica_entry.kind)
            .filter_map(|source_entry| self.counterpart_of(source_entry, source))
            .any(|counterpart| counterpart.path == replica_entry.path)
    }
}
