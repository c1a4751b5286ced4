//! CSV export reader with encoding and delimiter auto-detection.
//!
//! Turns a relational export (one joined row per roster entry) into
//! [`FlatRecord`]s. Cells stay strings; empty cells become null.

use serde_json::Value;
use std::path::Path;

use crate::models::FlatRecord;

/// CSV parsing error with context
#[derive(Debug, Clone)]
pub struct CsvError {
    pub line: usize,
    pub column: Option<String>,
    pub message: String,
}

impl std::fmt::Display for CsvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.column {
            Some(col) => write!(f, "Line {}, column '{}': {}", self.line, col, self.message),
            None => write!(f, "Line {}: {}", self.line, self.message),
        }
    }
}

impl std::error::Error for CsvError {}

impl CsvError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column: None,
            message: message.into(),
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }
}

/// Parsed export with detection metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// One record per data line
    pub records: Vec<FlatRecord>,
    /// Detected encoding
    pub encoding: String,
    /// Detected delimiter
    pub delimiter: char,
    /// Column headers, in file order
    pub headers: Vec<String>,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to a string using the given encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        // UTF-8 and anything unknown: lossy UTF-8, BOM stripped
        _ => {
            let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let mut best_sep = ',';
    let mut best_count = 0;

    for sep in [',', ';', '\t', '|'] {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse CSV text with an explicit delimiter.
///
/// # Example
/// ```ignore
/// use matchrecon::parser::parse_str;
///
/// let rows = parse_str("SHIRT_NUMBER;IS_HOME\n7;1", ';')?.records;
/// assert_eq!(rows[0].get("SHIRT_NUMBER"), Some(&"7".into()));
/// ```
pub fn parse_str(content: &str, delimiter: char) -> Result<ParseResult, CsvError> {
    if content.trim().is_empty() {
        return Err(CsvError::new(1, "Empty CSV file"));
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| CsvError::new(1, format!("Cannot read header: {}", e)))?
        .iter()
        .map(str::to_string)
        .collect();

    if let Some(pos) = headers.iter().position(String::is_empty) {
        return Err(CsvError::new(1, format!("Empty header at position {}", pos + 1)));
    }
    for (pos, header) in headers.iter().enumerate() {
        if headers[..pos].contains(header) {
            return Err(CsvError::new(1, "Duplicate header").with_column(header.clone()));
        }
    }

    let mut records = Vec::new();
    for (idx, row) in reader.records().enumerate() {
        let line_num = idx + 2;
        let row = row.map_err(|e| CsvError::new(line_num, e.to_string()))?;

        if row.iter().all(str::is_empty) {
            continue;
        }
        if row.len() > headers.len() {
            return Err(CsvError::new(
                line_num,
                format!("{} values for {} columns", row.len(), headers.len()),
            ));
        }

        let record = headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let cell = match row.get(i) {
                    Some(s) if !s.is_empty() => Value::String(s.to_string()),
                    _ => Value::Null,
                };
                (header.clone(), cell)
            })
            .collect::<FlatRecord>();

        records.push(record);
    }

    Ok(ParseResult {
        records,
        encoding: "utf-8".to_string(),
        delimiter,
        headers,
    })
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> Result<ParseResult, CsvError> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);

    let mut result = parse_str(&content, delimiter)?;
    result.encoding = encoding;
    Ok(result)
}

/// Parse a CSV file with auto-detection of encoding and delimiter.
pub fn parse_file_auto<P: AsRef<Path>>(path: P) -> Result<ParseResult, CsvError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .map_err(|e| CsvError::new(0, format!("Cannot read '{}': {}", path.display(), e)))?;

    parse_bytes_auto(&bytes)
}
