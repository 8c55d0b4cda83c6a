//! Domain types shared by the store and its consumers.

use std::fmt;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

/// One record of the task file.
///
/// Lines are opaque at this layer: order matters, content is never parsed.
pub type TaskLine = String;

/// Line separator written after every task line.
///
/// # Examples
///
/// ```
/// use todofs_core::LineEnding;
///
/// assert_eq!(LineEnding::Lf.as_str(), "\n");
/// assert_eq!(LineEnding::CrLf.as_str(), "\r\n");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    /// Unix line ending (`\n`).
    #[default]
    Lf,
    /// Windows line ending (`\r\n`).
    CrLf,
}

impl LineEnding {
    /// Returns the separator as a string slice.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
        }
    }

    /// Renders `lines` with this separator after every line.
    ///
    /// An empty slice renders as an empty string.
    ///
    /// # Examples
    ///
    /// ```
    /// use todofs_core::LineEnding;
    ///
    /// let lines = vec!["a".to_owned(), "b".to_owned()];
    /// assert_eq!(LineEnding::Lf.render(&lines), "a\nb\n");
    /// assert_eq!(LineEnding::CrLf.render(&[]), "");
    /// ```
    #[must_use]
    pub fn render(self, lines: &[TaskLine]) -> String {
        // Terminator per line, not a separator: no lines render as "", never
        // as a lone `eol`, so an emptied task file reads back as zero lines.
        let eol = self.as_str();
        let capacity = lines.iter().map(|l| l.len() + eol.len()).sum();
        let mut out = String::with_capacity(capacity);
        for line in lines {
            out.push_str(line);
            out.push_str(eol);
        }
        out
    }
}

impl fmt::Display for LineEnding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lf => f.write_str("lf"),
            Self::CrLf => f.write_str("crlf"),
        }
    }
}

/// Kind of backing store.
///
/// The store interface is shared with network-backed implementations; this
/// crate only provides the local one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum StoreKind {
    /// A plain file on local storage.
    Local,
}

/// The lines of a task file as read at one instant.
///
/// Snapshots are immutable once produced; every read creates a new one.
///
/// # Examples
///
/// ```
/// use todofs_core::FileSnapshot;
/// use camino::Utf8PathBuf;
///
/// let snapshot = FileSnapshot::parse(Utf8PathBuf::from("todo.txt"), "a\r\nb\n");
/// assert_eq!(snapshot.lines(), ["a", "b"]);
/// ```
#[derive(Debug, Clone)]
pub struct FileSnapshot {
    path: Utf8PathBuf,
    lines: Vec<TaskLine>,
    read_at: Instant,
}

impl FileSnapshot {
    /// Creates a snapshot from already split lines.
    #[must_use]
    pub fn new(path: Utf8PathBuf, lines: Vec<TaskLine>) -> Self {
        Self {
            path,
            lines,
            read_at: Instant::now(),
        }
    }

    /// Splits raw file contents into a snapshot.
    ///
    /// A leading byte order mark is dropped. Both `\n` and `\r\n` end a line;
    /// a missing final terminator does not produce an extra empty line.
    #[must_use]
    pub fn parse(path: Utf8PathBuf, contents: &str) -> Self {
        let contents = contents.strip_prefix('\u{feff}').unwrap_or(contents);
        Self::new(path, contents.lines().map(str::to_owned).collect())
    }

    /// Returns the path the lines were read from.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns the lines in file order.
    #[inline]
    #[must_use]
    pub fn lines(&self) -> &[TaskLine] {
        &self.lines
    }

    /// Consumes the snapshot, returning its lines.
    #[inline]
    #[must_use]
    pub fn into_lines(self) -> Vec<TaskLine> {
        self.lines
    }

    /// Returns when the snapshot was taken.
    #[inline]
    #[must_use]
    pub const fn read_at(&self) -> Instant {
        self.read_at
    }

    /// Returns the number of lines.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Returns `true` if the file held no lines.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Joins the lines with `\n`, without a trailing separator.
    ///
    /// This is the form handed to backup collaborators.
    #[must_use]
    pub fn joined(&self) -> String {
        self.lines.join("\n")
    }
}

impl PartialEq for FileSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.lines == other.lines
    }
}

impl Eq for FileSnapshot {}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(contents: &str) -> FileSnapshot {
        FileSnapshot::parse(Utf8PathBuf::from("todo.txt"), contents)
    }

    #[test]
    fn test_line_ending_render() {
        let lines = vec!["x".to_owned(), "y".to_owned()];
        assert_eq!(LineEnding::Lf.render(&lines), "x\ny\n");
        assert_eq!(LineEnding::CrLf.render(&lines), "x\r\ny\r\n");
        assert_eq!(LineEnding::Lf.render(&[]), "");
    }

    #[test]
    fn test_line_ending_serde() {
        assert_eq!(serde_json::to_string(&LineEnding::CrLf).expect("serialize"), r#""crlf""#);
        let parsed: LineEnding = serde_json::from_str(r#""lf""#).expect("valid JSON");
        assert_eq!(parsed, LineEnding::Lf);
    }

    #[test]
    fn test_snapshot_parse_mixed_endings() {
        let snap = snapshot("a\r\nb\nc");
        assert_eq!(snap.lines(), ["a", "b", "c"]);
        assert_eq!(snap.len(), 3);
    }

    #[test]
    fn test_snapshot_parse_strips_bom() {
        let snap = snapshot("\u{feff}(A) call mom\n");
        assert_eq!(snap.lines(), ["(A) call mom"]);
    }

    #[test]
    fn test_snapshot_parse_empty() {
        let snap = snapshot("");
        assert!(snap.is_empty());
        assert_eq!(snap.joined(), "");
    }

    #[test]
    fn test_snapshot_keeps_blank_lines() {
        let snap = snapshot("a\n\nb\n");
        assert_eq!(snap.lines(), ["a", "", "b"]);
        assert_eq!(snap.joined(), "a\n\nb");
    }

    #[test]
    fn test_snapshot_equality_ignores_read_time() {
        let first = snapshot("a\n");
        let second = snapshot("a\n");
        assert_eq!(first, second);
        assert_eq!(first.path().as_str(), "todo.txt");
    }
}
