//! Drive file and folder ids, parsed from raw ids or sharing URLs.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::DriveError;

/// Sharing URL shapes: `/drive/folders/<id>`, `/drive/u/<n>/folders/<id>`,
/// `/file/d/<id>` and `/open?id=<id>`.
static DRIVE_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https?://drive\.google\.com/(?:drive/(?:u/\d+/)?folders/|file/d/|open\?id=)([a-zA-Z0-9_-]+)",
    )
    .expect("Invalid Drive URL regex")
});

static ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("Invalid ID regex"));

/// An opaque Drive id.
///
/// ```
/// use drive_folder::DriveId;
///
/// let id: DriveId = "https://drive.google.com/drive/folders/1abc123?usp=sharing".parse().unwrap();
/// assert_eq!(id.as_str(), "1abc123");
///
/// let id: DriveId = " 1abc123 ".parse().unwrap();
/// assert_eq!(id.as_str(), "1abc123");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DriveId(String);

impl DriveId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl FromStr for DriveId {
    type Err = DriveError;

    fn from_str(url_or_id: &str) -> Result<Self, Self::Err> {
        let trimmed = url_or_id.trim();

        if let Some(id) = DRIVE_URL_REGEX.captures(trimmed).and_then(|c| c.get(1)) {
            return Ok(DriveId(id.as_str().to_string()));
        }

        if ID_REGEX.is_match(trimmed) {
            return Ok(DriveId(trimmed.to_string()));
        }

        Err(DriveError::InvalidUrlOrId(url_or_id.to_string()))
    }
}

impl fmt::Display for DriveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DriveId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
