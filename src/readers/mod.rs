pub mod archive_reader;
pub mod series_reader;
pub mod table_reader;

pub use archive_reader::ArchiveReader;
pub use series_reader::SeriesReader;
pub use table_reader::TableReader;

use crate::error::Result;
use crate::models::RawTable;
use encoding_rs::{Encoding, WINDOWS_1252};

/// Decode file contents: BOM first, then UTF-8, falling back to Windows-1252
/// which is what the portal's archives are written in.
pub fn decode_text(bytes: &[u8]) -> String {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return text.into_owned();
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
            text.into_owned()
        }
    }
}

/// Parse delimited text whose first record is the header row. Rows are
/// padded or truncated to the header width; a trailing delimiter is common.
pub fn parse_delimited(text: &str, delimiter: u8) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let width = headers.len();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        let mut row: Vec<String> = record.iter().take(width).map(str::to_string).collect();
        row.resize(width, String::new());
        rows.push(row);
    }

    Ok(RawTable::new(headers, rows))
}
