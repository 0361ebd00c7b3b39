use std::collections::HashMap;

use tracing::debug;

/// Bidirectional map between counter indices and their localized strings.
///
/// Immutable once built; share it freely between threads.
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    by_index: HashMap<u32, String>,
    by_name: HashMap<String, u32>,
}

impl NameTable {
    /// Parses a `REG_MULTI_SZ` blob of alternating `index\0name\0` strings
    /// encoded as UTF-16LE.
    pub fn parse(blob: &[u8]) -> Self {
        let units: Vec<u16> = blob
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Self::from_wide(&units)
    }

    /// Same as [`NameTable::parse`] for already decoded UTF-16 units.
    pub fn from_wide(units: &[u16]) -> Self {
        let mut table = Self::default();
        let mut strings = units
            .split(|&unit| unit == 0)
            .map(String::from_utf16_lossy);

        while let Some(index) = strings.next() {
            if index.is_empty() {
                break;
            }
            let Some(name) = strings.next().filter(|name| !name.is_empty()) else {
                break;
            };
            match index.trim().parse::<u32>() {
                Ok(index) => table.insert(index, name),
                Err(_) => debug!(index = %index, name = %name, "skipping name table entry"),
            }
        }
        table
    }

    fn insert(&mut self, index: u32, name: String) {
        self.by_name.insert(name.clone(), index);
        self.by_index.insert(index, name);
    }

    /// Index to string; `None` means the index is unknown.
    pub fn lookup_name(&self, index: u32) -> Option<&str> {
        self.by_index.get(&index).map(String::as_str)
    }

    /// String to index; `None` means the name is unknown.
    pub fn lookup_index(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.by_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_index.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(strings: &[&str]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for s in strings {
            for unit in s.encode_utf16().chain(std::iter::once(0)) {
                bytes.extend_from_slice(&unit.to_le_bytes());
            }
        }
        bytes.extend_from_slice(&[0, 0]);
        bytes
    }

    #[test]
    fn test_parse_pairs() {
        let table = NameTable::parse(&blob(&[
            "1",
            "1847",
            "2",
            "System",
            "4",
            "Memory",
            "238",
            "Processor",
        ]));

        assert_eq!(table.len(), 4);
        assert_eq!(table.lookup_name(2), Some("System"));
        assert_eq!(table.lookup_index("Processor"), Some(238));
        assert_eq!(table.lookup_name(3), None);
        assert_eq!(table.lookup_index("LogicalDisk"), None);
    }

    #[test]
    fn test_non_ascii_names() {
        let table = NameTable::parse(&blob(&["6", "% Temps processeur", "10", "Débit"]));
        assert_eq!(table.lookup_index("Débit"), Some(10));
        assert_eq!(table.lookup_name(6), Some("% Temps processeur"));
    }

    #[test]
    fn test_bad_index_is_skipped() {
        let table = NameTable::parse(&blob(&["x", "Broken", "4", "Memory"]));
        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup_index("Broken"), None);
        assert_eq!(table.lookup_name(4), Some("Memory"));
    }

    #[test]
    fn test_stops_at_empty_string() {
        let mut bytes = blob(&["2", "System"]);
        bytes.extend_from_slice(&blob(&["4", "Memory"]));
        let table = NameTable::parse(&bytes);
        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup_name(4), None);
    }

    #[test]
    fn test_duplicate_name_last_index_wins() {
        let table = NameTable::parse(&blob(&["10", "Bytes", "20", "Bytes"]));
        assert_eq!(table.lookup_index("Bytes"), Some(20));
        assert_eq!(table.lookup_name(10), Some("Bytes"));
        assert_eq!(table.lookup_name(20), Some("Bytes"));
    }

    #[test]
    fn test_truncated_input() {
        let mut bytes = blob(&["2", "System", "4"]);
        bytes.push(0x41);
        let table = NameTable::parse(&bytes);
        assert_eq!(table.len(), 1);

        assert!(NameTable::parse(&[]).is_empty());
        assert!(NameTable::parse(&[0x32]).is_empty());
    }
}
