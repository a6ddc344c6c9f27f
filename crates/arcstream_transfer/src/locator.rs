use std::{fmt, path::Path, str::FromStr};

use url::Url;

use crate::error::TransferError;

/// Identifies where to fetch a single archive from.
///
/// Operators pass either absolute URLs or plain filesystem paths. Paths are
/// turned into `file://` URLs so every locator can be handled the same way.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocator {
    raw: String,
    url: Url,
}

impl SourceLocator {
    /// Parses an operator supplied locator.
    pub fn parse(raw: impl Into<String>) -> Result<Self, TransferError> {
        let raw = raw.into();
        let url = match Url::parse(&raw) {
            // Single letter schemes are drive letters on windows.
            Ok(url) if url.scheme().len() > 1 => url,
            Ok(_) | Err(url::ParseError::RelativeUrlWithoutBase) => path_to_url(&raw)?,
            Err(err) => {
                return Err(TransferError::InvalidLocator {
                    locator: raw,
                    reason: err.to_string(),
                });
            }
        };
        Ok(Self { raw, url })
    }

    /// The URL bytes are fetched from.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The locator exactly as the operator provided it.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Last path segment of the URL, used to label progress bars.
    pub fn file_name(&self) -> String {
        self.url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|segment| !segment.is_empty())
            .map(|segment| segment.to_string())
            .unwrap_or_else(|| "download".to_string())
    }
}

fn path_to_url(raw: &str) -> Result<Url, TransferError> {
    let invalid = |reason: String| TransferError::InvalidLocator {
        locator: raw.to_string(),
        reason,
    };
    if raw.trim().is_empty() {
        return Err(invalid("locator is empty".to_string()));
    }
    let absolute = std::path::absolute(Path::new(raw)).map_err(|err| invalid(err.to_string()))?;
    Url::from_file_path(&absolute)
        .map_err(|()| invalid(format!("{} is not a valid path", absolute.display())))
}

impl FromStr for SourceLocator {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
