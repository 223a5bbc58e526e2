use serde::{Deserialize, Serialize};
use url::Url;

/// Newest archive period known to be fully downloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArchiveMarker(pub i32);

impl std::fmt::Display for ArchiveMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivePeriod {
    /// Label as published on the listing page, e.g. "ANO 2023 (AUTOMÁTICA)".
    pub label: String,
    pub year: Option<i32>,
}

impl ArchivePeriod {
    /// Year is taken from the label, or from the filename when the label has none.
    pub fn parse(label: &str, filename: &str) -> Self {
        let year = first_year(label).or_else(|| first_year(filename));
        Self {
            label: label.trim().to_string(),
            year,
        }
    }

    pub fn marker(&self) -> Option<ArchiveMarker> {
        self.year.map(ArchiveMarker)
    }
}

fn first_year(text: &str) -> Option<i32> {
    let bytes = text.as_bytes();
    let mut start = 0;
    while start < bytes.len() {
        if !bytes[start].is_ascii_digit() {
            start += 1;
            continue;
        }
        let mut end = start;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        if end - start == 4 {
            return text[start..end].parse().ok();
        }
        start = end;
    }
    None
}

/// One bulk archive advertised by the listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub url: Url,
    pub filename: String,
    pub period: ArchivePeriod,
}

impl ArchiveEntry {
    pub fn new(url: Url, label: &str) -> Option<Self> {
        let filename = url
            .path_segments()
            .and_then(|segments| segments.last())
            .filter(|name| !name.is_empty())?
            .to_string();
        let period = ArchivePeriod::parse(label, &filename);
        Some(Self {
            url,
            filename,
            period,
        })
    }
}

/// Newest marker over a set of entries.
pub fn newest_marker(entries: &[ArchiveEntry]) -> Option<ArchiveMarker> {
    entries.iter().filter_map(|e| e.period.marker()).max()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_year_from_label() {
        let period = ArchivePeriod::parse("ANO 2023 (AUTOMÁTICA)", "2023.zip");
        assert_eq!(period.year, Some(2023));
        assert_eq!(period.marker(), Some(ArchiveMarker(2023)));
    }

    #[test]
    fn test_period_year_falls_back_to_filename() {
        let period = ArchivePeriod::parse("Dados históricos", "dados_2019.zip");
        assert_eq!(period.year, Some(2019));

        let period = ArchivePeriod::parse("sem data", "dados.zip");
        assert_eq!(period.year, None);
    }

    #[test]
    fn test_period_ignores_longer_numbers() {
        assert_eq!(first_year("id 123456 ano 2001"), Some(2001));
        assert_eq!(first_year("12"), None);
    }

    #[test]
    fn test_entry_filename_is_url_basename() {
        let url = Url::parse("https://portal.inmet.gov.br/uploads/dadoshistoricos/2020.zip").unwrap();
        let entry = ArchiveEntry::new(url, "ANO 2020").unwrap();
        assert_eq!(entry.filename, "2020.zip");

        let dir = Url::parse("https://portal.inmet.gov.br/uploads/").unwrap();
        assert!(ArchiveEntry::new(dir, "ANO 2020").is_none());
    }

    #[test]
    fn test_newest_marker() {
        let entries: Vec<ArchiveEntry> = ["2001", "2023", "2010"]
            .iter()
            .map(|y| {
                let url = Url::parse(&format!("https://example.org/{}.zip", y)).unwrap();
                ArchiveEntry::new(url, &format!("ANO {}", y)).unwrap()
            })
            .collect();

        assert_eq!(newest_marker(&entries), Some(ArchiveMarker(2023)));
        assert_eq!(newest_marker(&[]), None);
    }
}
