//! Page store
//!
//! A table lives in `<root>/<table>/` as a run of page files `1.csv`,
//! `2.csv`, ... each holding a header row plus at most `tuples_limit` data
//! rows. Next to the pages sit `<table>_pk_sequence` (the next primary key)
//! and `<table>_lock` (`locked` / `unlocked`).

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Lines, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use common::sanitize_value;
use config::TableSchema;
use fs2::FileExt;
use tracing::{debug, error, info};

use crate::error::{io_error, StorageError};
use crate::Result;

const LOCKED: &str = "locked";
const UNLOCKED: &str = "unlocked";

/// What to do with one row during a rewrite
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowEdit {
    Keep,
    Update(Vec<String>),
    Remove,
}

/// Counters from a rewrite pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteStats {
    pub updated: usize,
    pub removed: usize,
    pub pages_rewritten: usize,
}

impl RewriteStats {
    pub fn changed(&self) -> bool {
        self.updated + self.removed > 0
    }
}

/// How far a rewrite goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteScope {
    /// Every page
    All,
    /// Stop after the first page in which a row changed
    FirstChange,
}

#[derive(Debug, Clone)]
pub struct PageStore {
    root: PathBuf,
    tuples_limit: usize,
}

impl PageStore {
    /// `root` is the schema directory, `<data_dir>/<schema name>`
    pub fn new(root: impl Into<PathBuf>, tuples_limit: usize) -> Self {
        Self {
            root: root.into(),
            tuples_limit: tuples_limit.max(1),
        }
    }

    pub fn table_dir(&self, table: &str) -> PathBuf {
        self.root.join(table)
    }

    pub fn page_path(&self, table: &str, page: usize) -> PathBuf {
        self.table_dir(table).join(format!("{}.csv", page))
    }

    fn pk_path(&self, table: &str) -> PathBuf {
        self.table_dir(table).join(format!("{}_pk_sequence", table))
    }

    fn lock_path(&self, table: &str) -> PathBuf {
        self.table_dir(table).join(format!("{}_lock", table))
    }

    /// Header row of every page: primary key followed by the columns
    pub fn header(schema: &TableSchema) -> String {
        std::iter::once(schema.pk_column())
            .chain(schema.columns.iter().cloned())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Create the directory, first page, key counter and lock flag of a
    /// table. Returns false when the table directory already exists.
    pub fn create_table(&self, schema: &TableSchema) -> Result<bool> {
        let dir = self.table_dir(&schema.name);
        if dir.is_dir() {
            return Ok(false);
        }

        fs::create_dir_all(&dir).map_err(io_error(&dir))?;

        let page = self.page_path(&schema.name, 1);
        fs::write(&page, format!("{}\n", Self::header(schema))).map_err(io_error(&page))?;
        self.write_pk(&schema.name, 1)?;
        self.write_lock_flag(&schema.name, false)?;

        info!(table = %schema.name, path = %dir.display(), "Table created");
        Ok(true)
    }

    /// Next primary key to hand out. A missing counter starts at 1.
    pub fn read_pk(&self, table: &str) -> Result<u64> {
        let path = self.pk_path(table);
        match fs::read_to_string(&path) {
            Ok(raw) => raw.trim().parse::<u64>().map_err(|_| StorageError::Corrupt {
                path: path.clone(),
                message: format!("invalid key counter '{}'", raw.trim()),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(1),
            Err(e) => Err(io_error(&path)(e)),
        }
    }

    fn write_pk(&self, table: &str, next: u64) -> Result<()> {
        let path = self.pk_path(table);
        fs::write(&path, next.to_string()).map_err(io_error(&path))
    }

    pub fn read_lock_flag(&self, table: &str) -> Result<bool> {
        let path = self.lock_path(table);
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(raw.trim() == LOCKED),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(&path)(e)),
        }
    }

    fn write_lock_flag(&self, table: &str, locked: bool) -> Result<()> {
        let path = self.lock_path(table);
        fs::write(&path, flag_text(locked)).map_err(io_error(&path))
    }

    /// Set the lock flag of `table` and return the value it held before.
    ///
    /// The read and the write happen under an exclusive advisory lock on the
    /// flag file, so handles in other processes observe one order of swaps.
    pub fn swap_lock_flag(&self, table: &str, locked: bool) -> Result<bool> {
        let path = self.lock_path(table);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(io_error(&path))?;

        file.lock_exclusive().map_err(io_error(&path))?;
        let swapped = swap_flag(&mut file, locked);
        if let Err(e) = FileExt::unlock(&file) {
            debug!(path = %path.display(), error = %e, "Advisory unlock failed; released on close");
        }
        swapped.map_err(io_error(&path))
    }

    /// Number of existing pages, counting from `1.csv` up to the first gap
    pub fn page_count(&self, table: &str) -> usize {
        let mut count = 0;
        while self.page_path(table, count + 1).is_file() {
            count += 1;
        }
        count
    }

    /// Number of data rows in one page, or None when the page is absent
    /// or has no header yet
    pub fn page_rows(&self, table: &str, page: usize) -> Result<Option<usize>> {
        let path = self.page_path(table, page);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path)(e)),
        };

        let mut lines = BufReader::new(file).lines();
        match lines.next() {
            None => Ok(None),
            Some(header) => {
                header.map_err(io_error(&path))?;
                let mut rows = 0;
                for line in lines {
                    if !line.map_err(io_error(&path))?.trim().is_empty() {
                        rows += 1;
                    }
                }
                Ok(Some(rows))
            }
        }
    }

    /// Append a row, assigning the next primary key.
    ///
    /// Missing trailing values are stored empty. Pages are filled in order;
    /// a full page moves the write to the next one, created on demand.
    pub fn append(&self, schema: &TableSchema, values: &[String]) -> Result<u64> {
        if values.len() > schema.columns.len() {
            error!(
                table = %schema.name,
                given = values.len(),
                expected = schema.columns.len(),
                "Insert rejected: more values than columns"
            );
            return Err(StorageError::TooManyValues {
                table: schema.name.clone(),
                given: values.len(),
                expected: schema.columns.len(),
            });
        }

        let (page, needs_header) = self.writable_page(&schema.name)?;
        let pk = self.read_pk(&schema.name)?;

        let mut row = Vec::with_capacity(schema.columns.len() + 1);
        row.push(pk.to_string());
        row.extend(values.iter().map(|v| sanitize_value(v)));
        row.resize(schema.columns.len() + 1, String::new());

        let path = self.page_path(&schema.name, page);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_error(&path))?;
        if needs_header {
            writeln!(file, "{}", Self::header(schema)).map_err(io_error(&path))?;
        }
        writeln!(file, "{}", row.join(",")).map_err(io_error(&path))?;

        self.write_pk(&schema.name, pk + 1)?;

        debug!(table = %schema.name, page, pk, "Row appended");
        Ok(pk)
    }

    fn writable_page(&self, table: &str) -> Result<(usize, bool)> {
        let mut page = 1;
        loop {
            match self.page_rows(table, page)? {
                None => return Ok((page, true)),
                Some(rows) if rows < self.tuples_limit => return Ok((page, false)),
                Some(_) => page += 1,
            }
        }
    }

    /// Restartable cursor over every row of a table
    pub fn scan(&self, table: &str) -> TableCursor {
        TableCursor::new(self.table_dir(table))
    }

    /// Stream every page through `edit`, swapping in a rewritten copy of
    /// each page where a row changed.
    ///
    /// Each page is written to `<n>.csv.tmp` and renamed over the original;
    /// the rename is the commit point. An error from `edit` discards the
    /// temporary file of the page being processed and is returned as is.
    pub fn rewrite<F, E>(
        &self,
        table: &str,
        scope: RewriteScope,
        mut edit: F,
    ) -> std::result::Result<RewriteStats, E>
    where
        F: FnMut(&[String]) -> std::result::Result<RowEdit, E>,
        E: From<StorageError>,
    {
        let mut stats = RewriteStats::default();
        let mut page = 1;

        loop {
            let path = self.page_path(table, page);
            let file = match File::open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => break,
                Err(e) => return Err(io_error(&path)(e).into()),
            };

            let tmp = path.with_extension("csv.tmp");
            let page_stats = match self.rewrite_page(file, &path, &tmp, &mut edit) {
                Ok(page_stats) => page_stats,
                Err(e) => {
                    let _ = fs::remove_file(&tmp);
                    return Err(e);
                }
            };

            if page_stats.changed() {
                fs::rename(&tmp, &path).map_err(io_error(&path))?;
                stats.updated += page_stats.updated;
                stats.removed += page_stats.removed;
                stats.pages_rewritten += 1;
                debug!(
                    table,
                    page,
                    updated = page_stats.updated,
                    removed = page_stats.removed,
                    "Page rewritten"
                );
                if scope == RewriteScope::FirstChange {
                    break;
                }
            } else {
                fs::remove_file(&tmp).map_err(io_error(&tmp))?;
            }

            page += 1;
        }

        Ok(stats)
    }

    fn rewrite_page<F, E>(
        &self,
        file: File,
        path: &Path,
        tmp: &Path,
        edit: &mut F,
    ) -> std::result::Result<RewriteStats, E>
    where
        F: FnMut(&[String]) -> std::result::Result<RowEdit, E>,
        E: From<StorageError>,
    {
        let mut stats = RewriteStats::default();
        let out = File::create(tmp).map_err(io_error(tmp))?;
        let mut out = BufWriter::new(out);

        let mut lines = BufReader::new(file).lines();
        if let Some(header) = lines.next() {
            let header = header.map_err(io_error(path))?;
            writeln!(out, "{}", header).map_err(io_error(tmp))?;
        }

        for line in lines {
            let line = line.map_err(io_error(path))?;
            if line.trim().is_empty() {
                continue;
            }
            let row = split_row(&line);
            match edit(&row)? {
                RowEdit::Keep => writeln!(out, "{}", line).map_err(io_error(tmp))?,
                RowEdit::Update(values) => {
                    let values: Vec<String> = values.iter().map(|v| sanitize_value(v)).collect();
                    writeln!(out, "{}", values.join(",")).map_err(io_error(tmp))?;
                    stats.updated += 1;
                }
                RowEdit::Remove => stats.removed += 1,
            }
        }

        out.flush().map_err(io_error(tmp))?;
        Ok(stats)
    }

    /// Keep only the rows for which `keep` returns true; returns the
    /// number of removed rows. Emptied pages keep their header.
    pub fn rewrite_filtered<F>(&self, table: &str, mut keep: F) -> Result<usize>
    where
        F: FnMut(&[String]) -> bool,
    {
        let stats = self.rewrite(table, RewriteScope::All, |row| {
            Ok::<_, StorageError>(if keep(row) { RowEdit::Keep } else { RowEdit::Remove })
        })?;
        Ok(stats.removed)
    }
}

fn flag_text(locked: bool) -> &'static str {
    if locked {
        LOCKED
    } else {
        UNLOCKED
    }
}

fn swap_flag(file: &mut File, locked: bool) -> std::io::Result<bool> {
    let mut raw = String::new();
    file.read_to_string(&mut raw)?;
    let was_locked = raw.trim() == LOCKED;

    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(flag_text(locked).as_bytes())?;
    file.sync_data()?;
    Ok(was_locked)
}

/// Split a stored line into trimmed fields
pub fn split_row(line: &str) -> Vec<String> {
    line.split(',').map(|cell| cell.trim().to_string()).collect()
}

/// Lazy cursor over the rows of every page of one table, in page order
pub struct TableCursor {
    dir: PathBuf,
    page: usize,
    lines: Option<Lines<BufReader<File>>>,
    finished: bool,
}

impl TableCursor {
    fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            page: 0,
            lines: None,
            finished: false,
        }
    }

    /// Start again from the first page
    pub fn rewind(&mut self) {
        self.page = 0;
        self.lines = None;
        self.finished = false;
    }

    fn open_next_page(&mut self) -> Result<bool> {
        self.page += 1;
        let path = self.dir.join(format!("{}.csv", self.page));
        match File::open(&path) {
            Ok(file) => {
                let mut lines = BufReader::new(file).lines();
                // header
                if let Some(header) = lines.next() {
                    header.map_err(io_error(&path))?;
                }
                self.lines = Some(lines);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(&path)(e)),
        }
    }
}

impl Iterator for TableCursor {
    type Item = Result<Vec<String>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.finished {
                return None;
            }

            if let Some(lines) = self.lines.as_mut() {
                match lines.next() {
                    Some(Ok(line)) if line.trim().is_empty() => continue,
                    Some(Ok(line)) => return Some(Ok(split_row(&line))),
                    Some(Err(e)) => {
                        self.finished = true;
                        let path = self.dir.join(format!("{}.csv", self.page));
                        return Some(Err(io_error(&path)(e)));
                    }
                    None => self.lines = None,
                }
            }

            match self.open_next_page() {
                Ok(true) => {}
                Ok(false) => {
                    self.finished = true;
                    return None;
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    fn schema() -> TableSchema {
        TableSchema::new("item", vec!["name".to_string(), "qty".to_string()])
    }

    fn values(name: &str, qty: &str) -> Vec<String> {
        vec![name.to_string(), qty.to_string()]
    }

    #[test]
    fn test_create_table_layout() {
        let dir = TempDir::new().unwrap();
        let store = PageStore::new(dir.path(), 3);

        assert!(store.create_table(&schema()).unwrap());
        assert!(!store.create_table(&schema()).unwrap());

        let table_dir = dir.path().join("item");
        assert_eq!(
            fs::read_to_string(table_dir.join("1.csv")).unwrap(),
            "item_id,name,qty\n"
        );
        assert_eq!(fs::read_to_string(table_dir.join("item_pk_sequence")).unwrap(), "1");
        assert_eq!(fs::read_to_string(table_dir.join("item_lock")).unwrap(), "unlocked");
    }

    #[test]
    fn test_swap_lock_flag_reports_previous() {
        let dir = TempDir::new().unwrap();
        let store = PageStore::new(dir.path(), 3);
        store.create_table(&schema()).unwrap();
        let flag = dir.path().join("item/item_lock");

        assert!(!store.swap_lock_flag("item", true).unwrap());
        assert_eq!(fs::read_to_string(&flag).unwrap(), "locked");
        assert!(store.swap_lock_flag("item", true).unwrap());
        assert!(store.read_lock_flag("item").unwrap());

        assert!(store.swap_lock_flag("item", false).unwrap());
        assert_eq!(fs::read_to_string(&flag).unwrap(), "unlocked");
    }

    #[test]
    fn test_page_rotation() {
        let dir = TempDir::new().unwrap();
        let store = PageStore::new(dir.path(), 3);
        store.create_table(&schema()).unwrap();

        for i in 0..4 {
            store.append(&schema(), &values(&format!("n{}", i), "1")).unwrap();
        }

        assert_eq!(store.page_count("item"), 2);
        assert_eq!(store.page_rows("item", 1).unwrap(), Some(3));
        assert_eq!(store.page_rows("item", 2).unwrap(), Some(1));
        assert_eq!(
            fs::read_to_string(store.page_path("item", 2)).unwrap(),
            "item_id,name,qty\n4,n3,1\n"
        );
    }

    #[test]
    fn test_keys_never_reused() {
        let dir = TempDir::new().unwrap();
        let store = PageStore::new(dir.path(), 10);
        store.create_table(&schema()).unwrap();

        assert_eq!(store.append(&schema(), &values("a", "1")).unwrap(), 1);
        assert_eq!(store.append(&schema(), &values("b", "2")).unwrap(), 2);
        store.rewrite_filtered("item", |_| false).unwrap();
        assert_eq!(store.append(&schema(), &values("c", "3")).unwrap(), 3);
        assert_eq!(store.read_pk("item").unwrap(), 4);
    }

    #[test]
    fn test_append_pads_and_rejects() {
        let dir = TempDir::new().unwrap();
        let store = PageStore::new(dir.path(), 10);
        store.create_table(&schema()).unwrap();

        store.append(&schema(), &["only".to_string()]).unwrap();
        let rows: Vec<_> = store.scan("item").collect::<Result<_>>().unwrap();
        assert_eq!(rows, vec![vec!["1".to_string(), "only".to_string(), String::new()]]);

        let too_many = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_matches!(
            store.append(&schema(), &too_many),
            Err(StorageError::TooManyValues { given: 3, expected: 2, .. })
        );
        assert_eq!(store.read_pk("item").unwrap(), 2);
    }

    #[test]
    fn test_append_writes_header_into_empty_page() {
        let dir = TempDir::new().unwrap();
        let store = PageStore::new(dir.path(), 10);
        store.create_table(&schema()).unwrap();
        fs::write(store.page_path("item", 1), "").unwrap();

        store.append(&schema(), &values("a", "1")).unwrap();
        assert_eq!(
            fs::read_to_string(store.page_path("item", 1)).unwrap(),
            "item_id,name,qty\n1,a,1\n"
        );
    }

    #[test]
    fn test_scan_trims_and_rewinds() {
        let dir = TempDir::new().unwrap();
        let store = PageStore::new(dir.path(), 1);
        store.create_table(&schema()).unwrap();
        store.append(&schema(), &values("a", "1")).unwrap();
        store.append(&schema(), &values("b", "2")).unwrap();

        let mut cursor = store.scan("item");
        assert_eq!(cursor.next().unwrap().unwrap()[1], "a");
        assert_eq!(cursor.next().unwrap().unwrap()[1], "b");
        assert!(cursor.next().is_none());
        assert!(cursor.next().is_none());

        cursor.rewind();
        assert_eq!(cursor.count(), 2);

        assert_eq!(split_row(" 1 , x ,"), vec!["1", "x", ""]);
    }

    #[test]
    fn test_rewrite_first_change_only() {
        let dir = TempDir::new().unwrap();
        let store = PageStore::new(dir.path(), 1);
        store.create_table(&schema()).unwrap();
        store.append(&schema(), &values("a", "1")).unwrap();
        store.append(&schema(), &values("a", "2")).unwrap();

        let stats = store
            .rewrite("item", RewriteScope::FirstChange, |row| {
                if row[1] == "a" {
                    Ok::<_, StorageError>(RowEdit::Update(vec![
                        row[0].clone(),
                        "z".to_string(),
                        row[2].clone(),
                    ]))
                } else {
                    Ok(RowEdit::Keep)
                }
            })
            .unwrap();

        assert_eq!(stats.updated, 1);
        assert_eq!(stats.pages_rewritten, 1);
        let names: Vec<String> = store.scan("item").map(|r| r.unwrap()[1].clone()).collect();
        assert_eq!(names, vec!["z", "a"]);
        assert!(!store.page_path("item", 1).with_extension("csv.tmp").exists());
    }

    #[test]
    fn test_rewrite_error_leaves_page_intact() {
        let dir = TempDir::new().unwrap();
        let store = PageStore::new(dir.path(), 10);
        store.create_table(&schema()).unwrap();
        store.append(&schema(), &values("a", "1")).unwrap();

        let result: Result<RewriteStats> = store.rewrite("item", RewriteScope::All, |_| {
            Err(StorageError::malformed("boom"))
        });
        assert!(result.is_err());
        assert_eq!(store.scan("item").count(), 1);
        assert!(!store.page_path("item", 1).with_extension("csv.tmp").exists());
    }

    #[test]
    fn test_emptied_page_keeps_header() {
        let dir = TempDir::new().unwrap();
        let store = PageStore::new(dir.path(), 10);
        store.create_table(&schema()).unwrap();
        store.append(&schema(), &values("a", "1")).unwrap();

        assert_eq!(store.rewrite_filtered("item", |_| false).unwrap(), 1);
        assert_eq!(
            fs::read_to_string(store.page_path("item", 1)).unwrap(),
            "item_id,name,qty\n"
        );
    }

    #[test]
    fn test_corrupt_counter() {
        let dir = TempDir::new().unwrap();
        let store = PageStore::new(dir.path(), 10);
        store.create_table(&schema()).unwrap();
        fs::write(dir.path().join("item").join("item_pk_sequence"), "x").unwrap();
        assert_matches!(store.read_pk("item"), Err(StorageError::Corrupt { .. }));
    }
}
