//! CSV import with encoding and delimiter auto-detection.
//!
//! Turns spreadsheet exports into [`RawRecord`]s. Header text is kept as
//! written (only a UTF-8 BOM is removed): matching against mappings is the
//! normalizer's job, not the parser's.

use serde_json::Value;
use std::io::Read;
use std::path::Path;

use crate::error::{CsvError, CsvResult};
use crate::models::RawRecord;

/// Delimiters tried by [`detect_delimiter`], in tie-break order.
const CANDIDATE_DELIMITERS: [char; 4] = [';', ',', '\t', '|'];

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// One raw record per data row, keys in header order
    pub records: Vec<RawRecord>,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
    /// Column headers
    pub headers: Vec<String>,
}

/// Detect the encoding of raw bytes using chardet.
///
/// Valid UTF-8 is always reported as UTF-8.
pub fn detect_encoding(bytes: &[u8]) -> String {
    if std::str::from_utf8(bytes).is_ok() {
        return "utf-8".to_string();
    }

    let (charset, _confidence, _language) = chardet::detect(bytes);

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "utf-8-sig" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes to a string using the given encoding label.
///
/// Latin-1 is decoded as Windows-1252, its superset. Unknown labels fall back
/// to lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> CsvResult<String> {
    let codec = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => encoding_rs::UTF_8,
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" | "windows-1252" | "cp1252" => {
            encoding_rs::WINDOWS_1252
        }
        label => match encoding_rs::Encoding::for_label(label.as_bytes()) {
            Some(codec) => codec,
            None => return Ok(String::from_utf8_lossy(bytes).into_owned()),
        },
    };

    let (text, _, had_errors) = codec.decode(bytes);
    if had_errors && codec != encoding_rs::UTF_8 {
        return Err(CsvError::Encoding(format!(
            "content is not valid {}",
            codec.name()
        )));
    }
    Ok(text.into_owned())
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let mut best = CANDIDATE_DELIMITERS[0];
    let mut best_count = 0;
    for sep in CANDIDATE_DELIMITERS {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best = sep;
        }
    }
    best
}

/// Parse CSV text into raw records with an explicit delimiter.
///
/// # Example
/// ```ignore
/// use leadnorm::csv_to_records;
///
/// let rows = csv_to_records("Nome;Telefone\nAna;1199", ';').unwrap();
/// assert_eq!(rows[0]["Nome"], "Ana");
/// ```
pub fn csv_to_records(csv: &str, delimiter: char) -> CsvResult<Vec<RawRecord>> {
    parse_csv(csv.as_bytes(), delimiter).map(|(_, records)| records)
}

/// Parse CSV from a reader, returning headers and records.
///
/// Short rows are padded with empty strings, extra cells are ignored, and a
/// repeated header keeps its first column.
pub fn parse_csv<R: Read>(reader: R, delimiter: char) -> CsvResult<(Vec<String>, Vec<RawRecord>)> {
    if !delimiter.is_ascii() {
        return Err(CsvError::parse(1, format!("delimiter '{}' is not ASCII", delimiter)));
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .flexible(true)
        .trim(csv::Trim::Fields)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            if i == 0 {
                h.trim_start_matches('\u{feff}').to_string()
            } else {
                h.to_string()
            }
        })
        .collect();

    if headers.is_empty() {
        return Err(CsvError::EmptyFile);
    }
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(CsvError::NoHeaders);
    }

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        if row.iter().all(str::is_empty) {
            continue;
        }

        let mut record = RawRecord::new();
        for (i, header) in headers.iter().enumerate() {
            let value = row.get(i).unwrap_or("");
            record
                .entry(header.clone())
                .or_insert_with(|| Value::String(value.to_string()));
        }
        records.push(record);
    }

    Ok((headers, records))
}

/// Parse a CSV file with auto-detection of encoding and delimiter.
pub fn parse_csv_file_auto<P: AsRef<Path>>(path: P) -> CsvResult<ParseResult> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_bytes_auto(&bytes)
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> CsvResult<ParseResult> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(CsvError::EmptyFile);
    }

    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let delimiter = detect_delimiter(content.trim_start_matches('\u{feff}'));

    parse_str_with_metadata(&content, delimiter, encoding)
}

/// Parse CSV text with an explicit delimiter and return metadata.
pub fn parse_str_with_metadata(
    content: &str,
    delimiter: char,
    encoding: String,
) -> CsvResult<ParseResult> {
    let (headers, records) = parse_csv(content.as_bytes(), delimiter)?;
    Ok(ParseResult {
        records,
        encoding,
        delimiter,
        headers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_csv() {
        let rows = csv_to_records("Nome;Idade\nAna;30\nBruno;25", ';').unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["Nome"], "Ana");
        assert_eq!(rows[0]["Idade"], "30");
        assert_eq!(rows[1]["Nome"], "Bruno");
    }

    #[test]
    fn test_header_order_preserved() {
        let rows = csv_to_records("z,a,m\n1,2,3", ',').unwrap();
        let keys: Vec<&String> = rows[0].keys().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_quoted_values_with_delimiter() {
        let csv = "Nome;Valor Ficha\n\"Silva; Ana\";\"R$ 1.234,56\"";
        let rows = csv_to_records(csv, ';').unwrap();

        assert_eq!(rows[0]["Nome"], "Silva; Ana");
        assert_eq!(rows[0]["Valor Ficha"], "R$ 1.234,56");
    }

    #[test]
    fn test_empty_lines_skipped() {
        let rows = csv_to_records("a;b\n1;2\n\n3;4\n;\n", ';').unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_short_and_long_rows() {
        let rows = csv_to_records("a;b;c\n1;;3\n1\n1;2;3;4", ';').unwrap();

        assert_eq!(rows[0]["b"], "");
        assert_eq!(rows[1]["c"], "");
        assert_eq!(rows[2].len(), 3);
    }

    #[test]
    fn test_duplicate_header_keeps_first() {
        let rows = csv_to_records("Nome,Nome,nome\nA,B,C", ',').unwrap();
        assert_eq!(rows[0]["Nome"], "A");
        assert_eq!(rows[0]["nome"], "C");
        assert_eq!(rows[0].len(), 2);
    }

    #[test]
    fn test_empty_csv_error() {
        assert!(matches!(csv_to_records("", ';'), Err(CsvError::EmptyFile)));
        assert!(matches!(parse_bytes_auto(b"  \n"), Err(CsvError::EmptyFile)));
    }

    #[test]
    fn test_non_ascii_delimiter_rejected() {
        assert!(csv_to_records("a§b", '§').is_err());
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
        assert_eq!(detect_delimiter("single"), ';');
    }

    #[test]
    fn test_auto_parse() {
        let result = parse_bytes_auto("Nome,Telefone\nAna,1199\nBruno,2199".as_bytes()).unwrap();

        assert_eq!(result.delimiter, ',');
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.headers, vec!["Nome", "Telefone"]);
    }

    #[test]
    fn test_bom_stripped_from_first_header() {
        let result = parse_bytes_auto("\u{feff}Nome;Cidade\nAna;SP".as_bytes()).unwrap();
        assert_eq!(result.headers[0], "Nome");
        assert_eq!(result.records[0]["Nome"], "Ana");
    }

    #[test]
    fn test_latin1_decoding() {
        // "Observação" in ISO-8859-1
        let bytes: &[u8] = &[0x4F, 0x62, 0x73, 0x65, 0x72, 0x76, 0x61, 0xE7, 0xE3, 0x6F];
        let decoded = decode_content(bytes, "iso-8859-1").unwrap();
        assert_eq!(decoded, "Observação");
    }
}
