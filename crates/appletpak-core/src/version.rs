//! Applet version strings
//!
//! Applet versions are dotted numeric `major.minor.build[.revision]` strings.
//! A manifest may carry a `*` wildcard which is replaced by a build number
//! at compile time.

use chrono::{DateTime, Datelike, Local, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Token replaced by a time based build number
pub const VERSION_WILDCARD: char = '*';

/// A parsed `major.minor.build.revision` version
///
/// Missing components compare as zero, so `1.2.0` and `1.2.0.0` are equal
/// by value while still being distinct strings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppletVersion {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
    pub revision: u32,
}

impl AppletVersion {
    pub const fn new(major: u32, minor: u32, build: u32, revision: u32) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }

    /// Parse a version string, returning `None` when it is not well formed
    pub fn parse(version: &str) -> Option<Self> {
        version.parse().ok()
    }

    fn as_tuple(&self) -> (u32, u32, u32, u32) {
        (self.major, self.minor, self.build, self.revision)
    }
}

impl FromStr for AppletVersion {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidVersion {
            version: s.to_string(),
        };

        let parts: Vec<&str> = s.trim().split('.').collect();
        if !(2..=4).contains(&parts.len()) {
            return Err(invalid());
        }

        let mut numbers = [0u32; 4];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            *slot = part.parse().map_err(|_| invalid())?;
        }

        Ok(Self::new(numbers[0], numbers[1], numbers[2], numbers[3]))
    }
}

impl Ord for AppletVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_tuple().cmp(&other.as_tuple())
    }
}

impl PartialOrd for AppletVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for AppletVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.build)?;
        if self.revision != 0 {
            write!(f, ".{}", self.revision)?;
        }
        Ok(())
    }
}

/// Resolve the wildcard in a version string against the local clock
#[must_use]
pub fn apply_version(version: &str) -> String {
    apply_version_at(version, &Local::now())
}

/// Resolve the wildcard in a version string against a given instant
///
/// The build number is the number of seconds elapsed since January 1st of
/// the instant's year, modulo 100000, zero padded to five digits.
#[must_use]
pub fn apply_version_at<Tz: TimeZone>(version: &str, now: &DateTime<Tz>) -> String {
    if !version.contains(VERSION_WILDCARD) {
        return version.to_string();
    }

    let year_start = NaiveDate::from_ymd_opt(now.year(), 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default();
    let elapsed = now
        .naive_local()
        .signed_duration_since(year_start)
        .num_seconds()
        .max(0);

    let build = format!("{:05}", elapsed % 100_000);
    version.replace(VERSION_WILDCARD, &build)
}

/// Normalize a path for use as an asset name or markup reference
///
/// Lower-cases and turns backslashes into forward slashes.
pub fn translate_path(path: Option<&str>) -> Option<String> {
    path.map(|p| p.to_lowercase().replace('\\', "/"))
}
