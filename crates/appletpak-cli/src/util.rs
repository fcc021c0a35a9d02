//! Shared helpers for CLI commands

use appletpak_core::{AppletInfo, PACKAGE_EXTENSION};
use std::path::{Path, PathBuf};

/// Format a byte size as a human-readable string
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}

/// First `max_len` characters of a hash or thumbprint
#[must_use]
pub fn short_hash(hash: &str, max_len: usize) -> &str {
    hash.get(..max_len).unwrap_or(hash)
}

/// `<dir>/<id>-<version>.pak`
#[must_use]
pub fn package_file_name(dir: &Path, info: &AppletInfo) -> PathBuf {
    dir.join(format!("{}-{}.{}", info.id, info.version, PACKAGE_EXTENSION))
}

/// Directory holding the certificates written by `keygen`
#[must_use]
pub fn default_key_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".appletpak"))
        .unwrap_or_else(|| PathBuf::from(".appletpak"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_size(1024 * 1024 * 1024), "1.00 GB");
        assert_eq!(format_size(2048 * 1024 * 1024 * 1024), "2048.00 GB");
    }

    #[test]
    fn test_short_hash() {
        assert_eq!(short_hash("abcdef1234567890", 8), "abcdef12");
        assert_eq!(short_hash("abc", 16), "abc");
        assert_eq!(short_hash("", 4), "");
    }

    #[test]
    fn test_package_file_name() {
        let info = AppletInfo {
            id: "org.example.app".to_string(),
            version: "1.0.2".to_string(),
            hash: String::new(),
            public_key_token: None,
        };
        assert_eq!(
            package_file_name(Path::new("/out"), &info),
            PathBuf::from("/out/org.example.app-1.0.2.pak")
        );
    }
}
