//! Input normalization and chunk splitting.
//!
//! Accepts CSV or spreadsheet uploads and produces header-carrying CSV
//! chunk files with cleaned `name,email` rows, ready for the parallel
//! staging loader.

use std::path::{Path, PathBuf};

use calamine::{Reader, open_workbook_auto};
use mailspool_common::{AppError, AppResult};
use once_cell::sync::Lazy;
use regex::Regex;
use tempfile::TempDir;
use tracing::debug;

#[allow(clippy::expect_used)] // pattern is a literal, checked by tests
static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid email pattern")
});

/// Whether a cleaned (trimmed, lowercased) email address is acceptable.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

/// Whether the input is a spreadsheet rather than CSV, by extension.
#[must_use]
pub fn is_spreadsheet(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| {
            let e = e.to_ascii_lowercase();
            e == "xlsx" || e == "xls"
        })
}

/// Normalized chunk files plus counters.
///
/// Dropping the set deletes the chunk directory.
#[derive(Debug)]
pub struct ChunkSet {
    /// Temp directory holding the chunk files; removed on drop.
    pub dir: TempDir,
    /// Chunk file paths, each carrying its own `name,email` header.
    pub paths: Vec<PathBuf>,
    /// Rows written across all chunks.
    pub rows: u64,
    /// Rows dropped for missing or malformed emails.
    pub invalid_rows: u64,
}

/// Normalize an upload into chunk files of at most `chunk_rows` rows.
///
/// Emails are trimmed and lowercased; rows whose email is missing or fails
/// validation are dropped and counted, never imported. Synchronous by
/// design: run it on a blocking thread.
pub fn split_into_chunks(input: &Path, chunk_rows: usize) -> AppResult<ChunkSet> {
    let dir = TempDir::new()?;
    let mut writer = ChunkWriter::new(&dir, chunk_rows);

    if is_spreadsheet(input) {
        split_spreadsheet(input, &mut writer)?;
    } else {
        split_csv(input, &mut writer)?;
    }

    let (paths, rows, invalid_rows) = writer.finish()?;
    debug!(chunks = paths.len(), rows, invalid_rows, "Split ingest input");

    Ok(ChunkSet {
        dir,
        paths,
        rows,
        invalid_rows,
    })
}

fn split_csv(input: &Path, writer: &mut ChunkWriter) -> AppResult<()> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(input)
        .map_err(|e| AppError::Validation(format!("Unreadable CSV input: {e}")))?;

    let headers = reader
        .headers()
        .map_err(|e| AppError::Validation(format!("Missing CSV header row: {e}")))?;
    let (name_idx, email_idx) = column_indices(headers.iter())?;

    for record in reader.records() {
        let record =
            record.map_err(|e| AppError::Validation(format!("Malformed CSV row: {e}")))?;
        let name = name_idx.and_then(|i| record.get(i)).unwrap_or("");
        let email = record.get(email_idx).unwrap_or("");
        writer.push(name, email)?;
    }

    Ok(())
}

fn split_spreadsheet(input: &Path, writer: &mut ChunkWriter) -> AppResult<()> {
    let mut workbook = open_workbook_auto(input)
        .map_err(|e| AppError::Validation(format!("Unreadable spreadsheet input: {e}")))?;

    let (_, range) = workbook
        .worksheets()
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Validation("Spreadsheet has no sheets".to_string()))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| AppError::Validation("Spreadsheet has no header row".to_string()))?
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let (name_idx, email_idx) = column_indices(headers.iter().map(String::as_str))?;

    for row in rows {
        let name = name_idx
            .and_then(|i| row.get(i))
            .map(std::string::ToString::to_string)
            .unwrap_or_default();
        let email = row
            .get(email_idx)
            .map(std::string::ToString::to_string)
            .unwrap_or_default();
        writer.push(&name, &email)?;
    }

    Ok(())
}

/// Locate the `name` and `email` columns, case-insensitively.
fn column_indices<'a, I>(headers: I) -> AppResult<(Option<usize>, usize)>
where
    I: Iterator<Item = &'a str>,
{
    let mut name_idx = None;
    let mut email_idx = None;

    for (i, header) in headers.enumerate() {
        match header.trim().to_ascii_lowercase().as_str() {
            "name" => name_idx = Some(i),
            "email" => email_idx = Some(i),
            _ => {}
        }
    }

    let email_idx =
        email_idx.ok_or_else(|| AppError::Validation("Input has no email column".to_string()))?;
    Ok((name_idx, email_idx))
}

/// Rotating chunk writer; opens a fresh header-carrying file every
/// `chunk_rows` rows.
struct ChunkWriter<'a> {
    dir: &'a TempDir,
    chunk_rows: usize,
    current: Option<csv::Writer<std::fs::File>>,
    rows_in_chunk: usize,
    paths: Vec<PathBuf>,
    rows: u64,
    invalid_rows: u64,
}

impl<'a> ChunkWriter<'a> {
    fn new(dir: &'a TempDir, chunk_rows: usize) -> Self {
        Self {
            dir,
            chunk_rows: chunk_rows.max(1),
            current: None,
            rows_in_chunk: 0,
            paths: Vec::new(),
            rows: 0,
            invalid_rows: 0,
        }
    }

    fn push(&mut self, name: &str, email: &str) -> AppResult<()> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || !is_valid_email(&email) {
            self.invalid_rows += 1;
            return Ok(());
        }

        if self.current.is_none() || self.rows_in_chunk >= self.chunk_rows {
            self.rotate()?;
        }

        if let Some(writer) = self.current.as_mut() {
            writer
                .write_record([name.trim(), &email])
                .map_err(|e| AppError::Internal(format!("Failed to write chunk row: {e}")))?;
        }
        self.rows_in_chunk += 1;
        self.rows += 1;
        Ok(())
    }

    fn rotate(&mut self) -> AppResult<()> {
        self.flush_current()?;

        let path = self.dir.path().join(format!("chunk{}.csv", self.paths.len()));
        let mut writer = csv::Writer::from_path(&path)
            .map_err(|e| AppError::Internal(format!("Failed to create chunk file: {e}")))?;
        writer
            .write_record(["name", "email"])
            .map_err(|e| AppError::Internal(format!("Failed to write chunk header: {e}")))?;

        self.paths.push(path);
        self.current = Some(writer);
        self.rows_in_chunk = 0;
        Ok(())
    }

    fn flush_current(&mut self) -> AppResult<()> {
        if let Some(mut writer) = self.current.take() {
            writer
                .flush()
                .map_err(|e| AppError::Internal(format!("Failed to flush chunk file: {e}")))?;
        }
        Ok(())
    }

    fn finish(mut self) -> AppResult<(Vec<PathBuf>, u64, u64)> {
        self.flush_current()?;
        Ok((self.paths, self.rows, self.invalid_rows))
    }
}
