//! Directory listing for choosing a task file.
//!
//! [`list_directory`] returns what a file chooser shows for one directory:
//! a `..` entry when there is a parent, every readable subdirectory, and
//! the readable files accepted by an [`ExtensionFilter`], sorted by name.
//!
//! # Examples
//!
//! ```no_run
//! use camino::Utf8Path;
//! use todofs_store::browse::{list_directory, ExtensionFilter};
//!
//! let listing = list_directory(Utf8Path::new("/home/me"), &ExtensionFilter::text());
//! for entry in listing.entries() {
//!     println!("{entry}");
//! }
//! ```

use std::fmt;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use ignore::WalkBuilder;

/// Name of the parent-directory entry.
pub const PARENT_ENTRY: &str = "..";

/// Directory listed when the requested one cannot be read.
pub const FALLBACK_DIR: &str = "/";

/// Which files a listing includes. Directories are always included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionFilter {
    /// Every readable file.
    All,
    /// Files whose name ends in `.<ext>`, compared case-insensitively.
    Only(String),
}

impl ExtensionFilter {
    /// Filter for `.txt` task files.
    #[must_use]
    pub fn text() -> Self {
        Self::Only("txt".to_owned())
    }

    /// Returns `true` if a file called `name` is listed.
    #[must_use]
    pub fn accepts(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(ext) => {
                let ext = ext.trim_start_matches('.');
                name.rsplit_once('.')
                    .is_some_and(|(_, found)| found.eq_ignore_ascii_case(ext))
            }
        }
    }
}

/// What a listing entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntryKind {
    /// The parent directory (`..`).
    Parent,
    /// A subdirectory.
    Directory,
    /// A file.
    File,
}

/// One row of a [`DirectoryListing`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Display name (`..` for the parent).
    pub name: String,
    /// Full path of the entry.
    pub path: Utf8PathBuf,
    /// Entry kind.
    pub kind: EntryKind,
}

impl DirEntry {
    /// Returns `true` for entries that can be descended into.
    #[must_use]
    pub const fn is_dir(&self) -> bool {
        matches!(self.kind, EntryKind::Parent | EntryKind::Directory)
    }
}

impl fmt::Display for DirEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            EntryKind::Parent => f.write_str(PARENT_ENTRY),
            EntryKind::Directory => write!(f, "{}/", self.name),
            EntryKind::File => f.write_str(&self.name),
        }
    }
}

/// The entries of one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryListing {
    dir: Utf8PathBuf,
    entries: Vec<DirEntry>,
    fell_back: bool,
}

impl DirectoryListing {
    /// The directory that was actually listed.
    #[must_use]
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    /// The entries in display order.
    #[must_use]
    pub fn entries(&self) -> &[DirEntry] {
        &self.entries
    }

    /// Returns `true` if the requested directory was unusable and
    /// [`FALLBACK_DIR`] was listed instead.
    #[must_use]
    pub const fn fell_back(&self) -> bool {
        self.fell_back
    }
}

impl fmt::Display for DirectoryListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{entry}")?;
        }
        Ok(())
    }
}

/// Lists `dir` for a file chooser.
///
/// Falls back to [`FALLBACK_DIR`] when `dir` is missing or unreadable.
#[must_use]
pub fn list_directory(dir: &Utf8Path, filter: &ExtensionFilter) -> DirectoryListing {
    if let Some(entries) = read_entries(dir, filter) {
        return DirectoryListing {
            dir: dir.to_owned(),
            entries,
            fell_back: false,
        };
    }

    tracing::warn!(dir = %dir, fallback = FALLBACK_DIR, "Directory not readable");
    let fallback = Utf8Path::new(FALLBACK_DIR);
    DirectoryListing {
        dir: fallback.to_owned(),
        entries: read_entries(fallback, filter).unwrap_or_default(),
        fell_back: true,
    }
}

fn read_entries(dir: &Utf8Path, filter: &ExtensionFilter) -> Option<Vec<DirEntry>> {
    if !dir.is_dir() || fs::read_dir(dir).is_err() {
        return None;
    }

    let walker = WalkBuilder::new(dir)
        // A chooser shows hidden and ignored files too.
        .standard_filters(false)
        .max_depth(Some(1))
        .follow_links(true)
        .threads(1)
        .build();

    let mut entries = Vec::new();
    for result in walker {
        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                tracing::debug!(dir = %dir, error = %err, "Skipping unreadable entry");
                continue;
            }
        };
        if entry.depth() == 0 {
            continue;
        }
        let Some(path) = Utf8Path::from_path(entry.path()) else {
            tracing::warn!(path = %entry.path().display(), "Skipping non-UTF-8 path");
            continue;
        };
        let Some(name) = path.file_name() else {
            continue;
        };
        let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());

        let listed = if is_dir {
            fs::read_dir(path).is_ok()
        } else {
            filter.accepts(name) && fs::File::open(path).is_ok()
        };
        if listed {
            entries.push(DirEntry {
                name: name.to_owned(),
                path: path.to_owned(),
                kind: if is_dir {
                    EntryKind::Directory
                } else {
                    EntryKind::File
                },
            });
        }
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    if let Some(parent) = dir.parent() {
        entries.insert(
            0,
            DirEntry {
                name: PARENT_ENTRY.to_owned(),
                path: parent.to_owned(),
                kind: EntryKind::Parent,
            },
        );
    }
    Some(entries)
}
