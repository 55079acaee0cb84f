//! Delimited-text reader and writer with encoding and delimiter auto-detection.
//!
//! Converts header+rows text into JSON objects and back. Cells are
//! type-inferred (integer, then float, then string); empty or
//! whitespace-only cells become JSON null so that missingness survives a
//! round trip through staged files. No dataset-specific logic here.

pub mod sensor;

use serde_json::{Map, Value};
use std::path::Path;

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

/// A parsed dataset with metadata
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Records as JSON objects keyed by column header
    pub records: Vec<Value>,
    /// Column headers in file order
    pub headers: Vec<String>,
    /// Detected encoding
    pub encoding: String,
    /// Detected delimiter
    pub delimiter: char,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.to_string(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.to_string(),
        _ => String::from_utf8_lossy(bytes).to_string(),
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Infer a JSON value from one cell. Empty cells are missing, not `""`.
fn infer_cell(cell: &str) -> Value {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        return Value::from(int);
    }
    if let Ok(float) = trimmed.parse::<f64>() {
        if float.is_finite() {
            return Value::from(float);
        }
    }
    Value::String(trimmed.to_string())
}

/// Read a delimited file with auto-detection of encoding and delimiter.
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Dataset, CsvError> {
    let bytes = std::fs::read(path.as_ref())
        .map_err(|e| CsvError::new(0, format!("Cannot read file: {}", e)))?;
    read_bytes(&bytes)
}

/// Read delimited bytes with auto-detection of encoding and delimiter.
pub fn read_bytes(bytes: &[u8]) -> Result<Dataset, CsvError> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);
    read_str(&content, delimiter, encoding)
}

/// Read delimited text with an explicit delimiter.
pub fn read_str(content: &str, delimiter: char, encoding: String) -> Result<Dataset, CsvError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| CsvError::new(1, format!("Cannot read header: {}", e)))?
        .iter()
        .map(|h| h.trim_matches('"').to_string())
        .collect();

    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(CsvError::new(1, "No headers found"));
    }

    let mut records = Vec::new();
    for (idx, row) in reader.records().enumerate() {
        let line_num = idx + 2; // +1 for 0-index, +1 for header
        let row = row.map_err(|e| CsvError::new(line_num, format!("Cannot read row: {}", e)))?;

        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let mut obj = Map::new();
        for (i, header) in headers.iter().enumerate() {
            let cell = row.get(i).unwrap_or("");
            obj.insert(header.clone(), infer_cell(cell));
        }
        records.push(Value::Object(obj));
    }

    Ok(Dataset {
        records,
        headers,
        encoding,
        delimiter,
    })
}

/// Render one value as a CSV cell. Null becomes an empty cell.
fn render_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Write records as comma-delimited text with the given column order.
/// Columns absent from a record are written as empty cells.
pub fn write_records(records: &[Value], columns: &[String]) -> Result<String, CsvError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(columns)
        .map_err(|e| CsvError::new(1, format!("Cannot write header: {}", e)))?;

    for (idx, record) in records.iter().enumerate() {
        let obj = record
            .as_object()
            .ok_or_else(|| CsvError::new(idx + 2, "Record is not a JSON object"))?;
        let row: Vec<String> = columns.iter().map(|c| render_cell(obj.get(c))).collect();
        writer
            .write_record(&row)
            .map_err(|e| CsvError::new(idx + 2, format!("Cannot write row: {}", e)))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| CsvError::new(0, format!("Cannot flush writer: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| CsvError::new(0, format!("Invalid UTF-8: {}", e)))
}

/// Write records to a file, creating parent directories as needed.
pub fn write_file<P: AsRef<Path>>(
    path: P,
    records: &[Value],
    columns: &[String],
) -> Result<(), CsvError> {
    let content = write_records(records, columns)?;
    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| CsvError::new(0, format!("Cannot create directory: {}", e)))?;
    }
    std::fs::write(path.as_ref(), content)
        .map_err(|e| CsvError::new(0, format!("Cannot write file: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_csv() {
        let csv = "name,age\nAlice,30\nBob,25";
        let dataset = read_str(csv, ',', "utf-8".into()).unwrap();

        assert_eq!(dataset.records.len(), 2);
        assert_eq!(dataset.records[0]["name"], "Alice");
        assert_eq!(dataset.records[0]["age"], 30);
        assert_eq!(dataset.records[1]["name"], "Bob");
    }

    #[test]
    fn test_type_inference() {
        let csv = "a,b,c,d\n1,2.5,text, ";
        let dataset = read_str(csv, ',', "utf-8".into()).unwrap();

        let rec = &dataset.records[0];
        assert_eq!(rec["a"], 1);
        assert_eq!(rec["b"], 2.5);
        assert_eq!(rec["c"], "text");
        assert_eq!(rec["d"], Value::Null);
    }

    #[test]
    fn test_empty_cell_is_null_not_empty_string() {
        let csv = "a,b\n1,\n,2";
        let dataset = read_str(csv, ',', "utf-8".into()).unwrap();

        assert_eq!(dataset.records[0]["b"], Value::Null);
        assert_eq!(dataset.records[1]["a"], Value::Null);
    }

    #[test]
    fn test_blank_lines_skipped() {
        let csv = "a,b\n1,2\n\n3,4\n";
        let dataset = read_str(csv, ',', "utf-8".into()).unwrap();
        assert_eq!(dataset.records.len(), 2);
    }

    #[test]
    fn test_short_rows_padded_with_null() {
        let csv = "a,b,c\n1,2";
        let dataset = read_str(csv, ',', "utf-8".into()).unwrap();
        assert_eq!(dataset.records[0]["c"], Value::Null);
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
    }

    #[test]
    fn test_auto_read() {
        let csv = "name;score\nAlice;30\nBob;25";
        let dataset = read_bytes(csv.as_bytes()).unwrap();

        assert_eq!(dataset.delimiter, ';');
        assert_eq!(dataset.headers, vec!["name", "score"]);
        assert_eq!(dataset.records.len(), 2);
    }

    #[test]
    fn test_empty_csv_error() {
        let result = read_str("", ',', "utf-8".into());
        assert!(result.is_err());
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1");
        assert!(decoded.starts_with("Soci"));
    }

    #[test]
    fn test_write_round_trip() {
        let records = vec![
            serde_json::json!({"city": "Delhi", "pm10": 42.5, "note": Value::Null}),
            serde_json::json!({"city": "Pune", "pm10": 7}),
        ];
        let columns = vec!["city".to_string(), "pm10".to_string(), "note".to_string()];
        let text = write_records(&records, &columns).unwrap();

        let dataset = read_str(&text, ',', "utf-8".into()).unwrap();
        assert_eq!(dataset.records.len(), 2);
        assert_eq!(dataset.records[0]["city"], "Delhi");
        assert_eq!(dataset.records[0]["pm10"], 42.5);
        assert_eq!(dataset.records[0]["note"], Value::Null);
        assert_eq!(dataset.records[1]["pm10"], 7);
    }

    #[test]
    fn test_error_message_format() {
        let err = CsvError::new(5, "bad cell").with_column("age");
        let msg = err.to_string();
        assert!(msg.contains("Line 5"));
        assert!(msg.contains("column 'age'"));
    }
}
