//! # Store Status Reporting

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::keystore::KeyStore;

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Human readable byte count, e.g. `1.5 KB` or `1,023 B`
pub fn readable_file_size(size: u64) -> String {
    if size == 0 {
        return "0".to_string();
    }
    let group = ((size as f64).log10() / 1024f64.log10()).floor() as usize;
    let group = group.min(UNITS.len() - 1);
    let scaled = size as f64 / 1024f64.powi(group as i32);
    format!("{} {}", group_thousands(scaled), UNITS[group])
}

/// `#,##0.#` formatting
fn group_thousands(value: f64) -> String {
    let rounded = (value * 10.0).round() / 10.0;
    let whole = rounded.trunc() as u64;
    let tenth = ((rounded - rounded.trunc()) * 10.0).round() as u64;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    if tenth > 0 {
        grouped.push('.');
        grouped.push_str(&tenth.to_string());
    }
    grouped
}

/// Size report over named stores: `<name>`, `<name>_Raw` per store that
/// reports a size, plus `Total`/`Total_Raw` when anything was counted.
pub fn store_status(stores: &[(&str, &Arc<dyn KeyStore>)]) -> BTreeMap<String, String> {
    let mut status = BTreeMap::new();
    let mut total = 0u64;
    for (name, store) in stores {
        if let Some(size) = store.size() {
            status.insert(name.to_string(), readable_file_size(size));
            status.insert(format!("{}_Raw", name), size.to_string());
            total += size;
        }
    }
    if total != 0 {
        status.insert("Total".to_string(), readable_file_size(total));
        status.insert("Total_Raw".to_string(), total.to_string());
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::MemKeyStore;

    #[test]
    fn test_readable_file_size() {
        assert_eq!(readable_file_size(0), "0");
        assert_eq!(readable_file_size(512), "512 B");
        assert_eq!(readable_file_size(1023), "1,023 B");
        assert_eq!(readable_file_size(1024), "1 KB");
        assert_eq!(readable_file_size(1536), "1.5 KB");
        assert_eq!(readable_file_size(5 * 1024 * 1024), "5 MB");
    }

    #[test]
    fn test_store_status_totals() {
        let first: Arc<dyn KeyStore> = Arc::new(MemKeyStore::new());
        let second: Arc<dyn KeyStore> = Arc::new(MemKeyStore::new());
        first.put("ab", "cd").unwrap();
        second.put("x", "y").unwrap();

        let status = store_status(&[("Latest", &first), ("Meta", &second)]);
        assert_eq!(status.get("Latest_Raw").map(String::as_str), Some("4"));
        assert_eq!(status.get("Meta_Raw").map(String::as_str), Some("2"));
        assert_eq!(status.get("Total").map(String::as_str), Some("6 B"));
        assert_eq!(status.get("Total_Raw").map(String::as_str), Some("6"));
    }

    #[test]
    fn test_store_status_empty_has_no_total() {
        let empty: Arc<dyn KeyStore> = Arc::new(MemKeyStore::new());
        let status = store_status(&[("Latest", &empty)]);
        assert_eq!(status.get("Latest").map(String::as_str), Some("0"));
        assert!(!status.contains_key("Total"));
    }
}
