// Flat-file record store: KEY=VALUE lines mutated in place by byte-offset
// splicing. Every operation is a full read-modify-write against the file.
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::core::error::{Error, ErrorKind};

/// Key under which the cookie conveniences persist their value.
pub const COOKIE_KEY: &str = "COOKIE";
/// Key under which the CLI caches the last edited request.
pub const LAST_REQUEST_KEY: &str = "LAST_REQUEST";

/// One `KEY=VALUE` line located inside the raw file buffer.
///
/// `value_end` is the index of the line's terminating `\n`, or the buffer
/// length when the entry is the final line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct EntrySpan {
    line_start: usize,
    value_start: usize,
    value_end: usize,
}

/// Persistent record store over a single flat text file.
///
/// The on-disk format is one `KEY=VALUE` entry per line, entries separated
/// by a single `\n` and no trailing newline after the last entry. Values
/// are opaque; repeated [`Store::append`] calls on one key build a
/// `"; "`-joined history inside that key's single value field.
///
/// The store assumes it is the only writer for the file's lifetime: there
/// is no locking, and concurrent processes would race read-modify-write
/// cycles with last-writer-wins results. Callers construct one `Store` and
/// thread it through explicitly.
///
/// Lines containing no `=` cannot be split into a key/value pair; every
/// scan skips them, so a partially corrupted file degrades to its readable
/// entries instead of failing whole operations.
pub struct Store {
    path: PathBuf,
    file: File,
}

impl Store {
    /// Opens the backing file read/write, creating it (mode `0o755` on
    /// unix) if absent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o755);
        }
        let file = options.open(&path).map_err(|err| {
            Error::new(map_io_error_kind(&err))
                .with_message("failed to open config store")
                .with_path(&path)
                .with_source(err)
        })?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Releases the file handle. Terminal lifecycle step; consuming `self`
    /// makes use-after-close unrepresentable.
    pub fn close(self) {}

    /// Returns the value stored under `key`, or the empty string when the
    /// key is absent (or the file is empty). First match wins if external
    /// corruption produced duplicate keys.
    pub fn get(&mut self, key: &str) -> Result<String, Error> {
        let data = self.read_data()?;
        match find_entry(&data, key) {
            Some(span) => {
                Ok(String::from_utf8_lossy(&data[span.value_start..span.value_end]).into_owned())
            }
            None => Ok(String::new()),
        }
    }

    /// Appends `value` under `key` and returns the full resulting value.
    ///
    /// When the key already exists, `"; "` plus the new value is spliced in
    /// directly after the existing value's last byte and the whole joined
    /// history comes back. When it does not, a new `KEY=value` line is
    /// added at the end of the file and `value` comes back unchanged.
    pub fn append(&mut self, key: &str, value: &str) -> Result<String, Error> {
        let data = self.read_data()?;
        let (new_data, full_value) = match find_entry(&data, key) {
            Some(span) => {
                let mut buf = Vec::with_capacity(data.len() + value.len() + 2);
                buf.extend_from_slice(&data[..span.value_end]);
                buf.extend_from_slice(b"; ");
                buf.extend_from_slice(value.as_bytes());
                buf.extend_from_slice(&data[span.value_end..]);
                let new_end = span.value_end + 2 + value.len();
                let full = String::from_utf8_lossy(&buf[span.value_start..new_end]).into_owned();
                (buf, full)
            }
            None => {
                let mut buf = data;
                if !buf.is_empty() {
                    buf.push(b'\n');
                }
                buf.extend_from_slice(key.as_bytes());
                buf.push(b'=');
                buf.extend_from_slice(value.as_bytes());
                (buf, value.to_string())
            }
        };
        // The buffer never shrinks on append, so overwriting from offset 0
        // needs no truncation.
        self.write_data(&new_data)?;
        tracing::debug!(key, file_len = new_data.len(), "store append");
        Ok(full_value)
    }

    /// Removes the entry for `key`. Returns `false` (file untouched) when
    /// the key is absent.
    ///
    /// This is the only shrinking operation, so the rewrite ends with a
    /// truncate to the new length. The write and the truncate are not
    /// atomic: a crash between the two leaves stale bytes beyond the
    /// intended end of file.
    pub fn remove(&mut self, key: &str) -> Result<bool, Error> {
        let data = self.read_data()?;
        let Some(span) = find_entry(&data, key) else {
            return Ok(false);
        };
        // A mid-file entry takes its leading separator with it; a first-line
        // entry takes its terminating one, so no stray `\n` survives.
        let (cut_start, cut_end) = if span.line_start == 0 {
            let end = if span.value_end < data.len() {
                span.value_end + 1
            } else {
                span.value_end
            };
            (0, end)
        } else {
            (span.line_start - 1, span.value_end)
        };
        let mut new_data = Vec::with_capacity(data.len() - (cut_end - cut_start));
        new_data.extend_from_slice(&data[..cut_start]);
        new_data.extend_from_slice(&data[cut_end..]);
        self.write_data(&new_data)?;
        let Self { path, file } = self;
        file.set_len(new_data.len() as u64)
            .map_err(|err| io_error(path, "failed to truncate config store", err))?;
        tracing::debug!(key, file_len = new_data.len(), "store remove");
        Ok(true)
    }

    /// Remove-then-append: replaces any existing history for `key` with
    /// exactly `value`.
    pub fn replace(&mut self, key: &str, value: &str) -> Result<String, Error> {
        self.remove(key)?;
        self.append(key, value)
    }

    pub fn cookie(&mut self) -> Result<String, Error> {
        self.get(COOKIE_KEY)
    }

    pub fn set_cookie(&mut self, value: &str) -> Result<String, Error> {
        self.append(COOKIE_KEY, value)
    }

    pub fn clear_cookie(&mut self) -> Result<bool, Error> {
        self.remove(COOKIE_KEY)
    }

    fn read_data(&mut self) -> Result<Vec<u8>, Error> {
        let Self { path, file } = self;
        file.seek(SeekFrom::Start(0))
            .map_err(|err| io_error(path, "failed to seek config store", err))?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|err| io_error(path, "failed to read config store", err))?;
        Ok(data)
    }

    fn write_data(&mut self, data: &[u8]) -> Result<(), Error> {
        let Self { path, file } = self;
        file.seek(SeekFrom::Start(0))
            .map_err(|err| io_error(path, "failed to seek config store", err))?;
        file.write_all(data)
            .map_err(|err| io_error(path, "failed to write config store", err))?;
        file.flush()
            .map_err(|err| io_error(path, "failed to flush config store", err))?;
        Ok(())
    }
}

/// Scans line by line for the first entry whose key (the bytes before the
/// line's first `=`) equals `key`. Lines without `=` are skipped.
fn find_entry(data: &[u8], key: &str) -> Option<EntrySpan> {
    let key = key.as_bytes();
    let mut line_start = 0;
    loop {
        let line_end = data[line_start..]
            .iter()
            .position(|&byte| byte == b'\n')
            .map(|offset| line_start + offset)
            .unwrap_or(data.len());
        let line = &data[line_start..line_end];
        if let Some(eq) = line.iter().position(|&byte| byte == b'=') {
            if &line[..eq] == key {
                return Some(EntrySpan {
                    line_start,
                    value_start: line_start + eq + 1,
                    value_end: line_end,
                });
            }
        }
        if line_end == data.len() {
            return None;
        }
        line_start = line_end + 1;
    }
}

fn io_error(path: &Path, message: &str, err: io::Error) -> Error {
    Error::new(map_io_error_kind(&err))
        .with_message(message.to_string())
        .with_path(path)
        .with_source(err)
}

fn map_io_error_kind(err: &io::Error) -> ErrorKind {
    match err.kind() {
        io::ErrorKind::PermissionDenied => ErrorKind::Permission,
        _ => ErrorKind::Io,
    }
}

#[cfg(test)]
mod tests {
    use super::{COOKIE_KEY, Store};
    use std::path::Path;

    fn open_store(dir: &tempfile::TempDir) -> Store {
        Store::open(dir.path().join(".quillconfig")).expect("open store")
    }

    fn raw(path: &Path) -> String {
        std::fs::read_to_string(path).expect("read raw store file")
    }

    #[test]
    fn get_on_empty_store_returns_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = open_store(&dir);
        assert_eq!(store.get("MISSING").expect("get"), "");
    }

    #[test]
    fn append_to_empty_store_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = open_store(&dir);
        let full = store.append("TEST", "my test value").expect("append");
        assert_eq!(full, "my test value");
        assert_eq!(store.get("TEST").expect("get"), "my test value");
        assert_eq!(raw(store.path()), "TEST=my test value");
    }

    #[test]
    fn append_new_key_adds_line_with_separator() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = open_store(&dir);
        store.append("A", "1").expect("append A");
        let full = store.append("B", "2").expect("append B");
        assert_eq!(full, "2");
        assert_eq!(store.get("A").expect("get A"), "1");
        assert_eq!(store.get("B").expect("get B"), "2");
        assert_eq!(raw(store.path()), "A=1\nB=2");
    }

    #[test]
    fn append_existing_key_joins_history() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = open_store(&dir);
        store.append("TEST", "v1").expect("append v1");
        let full = store.append("TEST", "v2").expect("append v2");
        assert_eq!(full, "v1; v2");
        assert_eq!(store.get("TEST").expect("get"), "v1; v2");
        assert_eq!(raw(store.path()), "TEST=v1; v2");
    }

    #[test]
    fn append_to_mid_file_entry_keeps_successors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = open_store(&dir);
        store.append("A", "1").expect("append A");
        store.append("B", "2").expect("append B");
        store.append("C", "3").expect("append C");
        let full = store.append("B", "again").expect("append B again");
        assert_eq!(full, "2; again");
        assert_eq!(raw(store.path()), "A=1\nB=2; again\nC=3");
    }

    #[test]
    fn remove_absent_key_returns_false_and_leaves_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = open_store(&dir);
        store.append("A", "1").expect("append");
        assert!(!store.remove("MISSING").expect("remove"));
        assert_eq!(raw(store.path()), "A=1");
    }

    #[test]
    fn remove_then_get_returns_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = open_store(&dir);
        store.append("TEST", "value").expect("append");
        assert!(store.remove("TEST").expect("remove"));
        assert_eq!(store.get("TEST").expect("get"), "");
        assert_eq!(raw(store.path()), "");
    }

    #[test]
    fn remove_middle_entry_keeps_neighbors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = open_store(&dir);
        store.append("A", "1").expect("append A");
        store.append("B", "2").expect("append B");
        store.append("C", "3").expect("append C");
        assert!(store.remove("B").expect("remove B"));
        assert_eq!(raw(store.path()), "A=1\nC=3");
        assert_eq!(store.get("A").expect("get A"), "1");
        assert_eq!(store.get("C").expect("get C"), "3");
    }

    #[test]
    fn remove_first_entry_consumes_separator() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = open_store(&dir);
        store.append("A", "1").expect("append A");
        store.append("B", "2").expect("append B");
        assert!(store.remove("A").expect("remove A"));
        assert_eq!(raw(store.path()), "B=2");
    }

    #[test]
    fn remove_last_entry_truncates_trailing_bytes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = open_store(&dir);
        store.append("A", "1").expect("append A");
        store.append("B", "longer value").expect("append B");
        assert!(store.remove("B").expect("remove B"));
        assert_eq!(raw(store.path()), "A=1");
    }

    #[test]
    fn file_length_matches_entries_plus_separators() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = open_store(&dir);
        store.append("A", "1").expect("append A");
        store.append("B", "2").expect("append B");
        store.append("B", "22").expect("append B again");
        store.append("C", "3").expect("append C");
        store.remove("A").expect("remove A");

        let contents = raw(store.path());
        let entries: Vec<&str> = contents.split('\n').collect();
        assert_eq!(entries, vec!["B=2; 22", "C=3"]);
        let expected: usize =
            entries.iter().map(|entry| entry.len()).sum::<usize>() + entries.len() - 1;
        assert_eq!(contents.len(), expected);
    }

    #[test]
    fn get_skips_line_without_equals() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".quillconfig");
        std::fs::write(&path, "garbage\nA=1").expect("seed file");
        let mut store = Store::open(&path).expect("open store");
        assert_eq!(store.get("A").expect("get A"), "1");
        assert_eq!(store.get("garbage").expect("get garbage"), "");
    }

    #[test]
    fn append_and_remove_ignore_malformed_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".quillconfig");
        std::fs::write(&path, "garbage\nA=1").expect("seed file");
        let mut store = Store::open(&path).expect("open store");

        let full = store.append("A", "2").expect("append A");
        assert_eq!(full, "1; 2");
        assert_eq!(raw(store.path()), "garbage\nA=1; 2");

        assert!(store.remove("A").expect("remove A"));
        assert_eq!(raw(store.path()), "garbage");
    }

    #[test]
    fn first_match_wins_on_duplicate_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".quillconfig");
        std::fs::write(&path, "A=first\nA=second").expect("seed file");
        let mut store = Store::open(&path).expect("open store");
        assert_eq!(store.get("A").expect("get A"), "first");
    }

    #[test]
    fn value_keeps_equals_signs_after_first() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = open_store(&dir);
        store.append("COOKIE", "session=abc123").expect("append");
        assert_eq!(store.get("COOKIE").expect("get"), "session=abc123");
        assert_eq!(raw(store.path()), "COOKIE=session=abc123");
    }

    #[test]
    fn replace_overwrites_history() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = open_store(&dir);
        store.append("K", "v1").expect("append v1");
        store.append("K", "v2").expect("append v2");
        let full = store.replace("K", "v3").expect("replace");
        assert_eq!(full, "v3");
        assert_eq!(raw(store.path()), "K=v3");
    }

    #[test]
    fn reopen_persists_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".quillconfig");
        {
            let mut store = Store::open(&path).expect("open store");
            store.append("TEST", "kept").expect("append");
            store.close();
        }
        let mut store = Store::open(&path).expect("reopen store");
        assert_eq!(store.get("TEST").expect("get"), "kept");
    }

    #[test]
    fn cookie_conveniences_share_one_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = open_store(&dir);
        store.set_cookie("session=abc").expect("set cookie");
        assert_eq!(store.cookie().expect("cookie"), "session=abc");
        assert_eq!(store.get(COOKIE_KEY).expect("get"), "session=abc");
        assert!(store.clear_cookie().expect("clear cookie"));
        assert_eq!(store.cookie().expect("cookie after clear"), "");
        assert!(!store.clear_cookie().expect("clear absent cookie"));
    }
}
