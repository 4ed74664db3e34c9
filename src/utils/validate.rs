//! Input validation for search URLs and output file names.

use thiserror::Error;
use url::Url;

/// Validation error types
#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("URL points at an item or resource page, not a search: {0}")]
    DetailPageUrl(String),

    #[error("Invalid filename: contains disallowed characters")]
    InvalidFilename,

    #[error("Path traversal detected: {0}")]
    PathTraversal(String),
}

/// Path segments that mark an item or resource detail page
const DETAIL_SEGMENTS: [&str; 2] = ["item", "resource"];

/// Check that `url` is a search or collection URL.
///
/// Rejects non-HTTP schemes and any URL with an `item` or `resource` path
/// segment, which is what callers pass by mistake when they copy a result
/// link instead of the search link.
pub fn validate_search_url(url: &Url) -> Result<(), ValidationError> {
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ValidationError::InvalidUrl(format!(
                "invalid scheme: {}",
                other
            )))
        }
    }

    let is_detail = url
        .path_segments()
        .map(|mut segments| segments.any(|s| DETAIL_SEGMENTS.contains(&s)))
        .unwrap_or(false);

    if is_detail {
        return Err(ValidationError::DetailPageUrl(url.to_string()));
    }

    Ok(())
}

/// Sanitize a filename to prevent path traversal and other attacks
///
/// Keeps alphanumerics, dash, underscore and dot; spaces become underscores.
pub fn sanitize_filename(filename: &str) -> Result<String, ValidationError> {
    let filename = filename.trim();

    if filename.is_empty() {
        return Err(ValidationError::InvalidFilename);
    }

    // Check for path traversal
    if filename.contains("..")
        || filename.starts_with('/')
        || filename.starts_with('\\')
        || filename.contains(":/")
        || filename.contains(":\\")
    {
        return Err(ValidationError::PathTraversal(filename.to_string()));
    }

    let mut sanitized: String = filename
        .chars()
        .filter_map(|ch| match ch {
            ' ' => Some('_'),
            c if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' => Some(c),
            _ => None,
        })
        .collect();

    const MAX_FILENAME_LENGTH: usize = 200;
    if sanitized.chars().count() > MAX_FILENAME_LENGTH {
        sanitized = sanitized.chars().take(MAX_FILENAME_LENGTH).collect();
    }

    if sanitized.is_empty() {
        return Err(ValidationError::InvalidFilename);
    }

    Ok(sanitized)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_search_urls_accepted() {
        assert!(validate_search_url(&url(
            "https://www.loc.gov/collections/chronicling-america/?qs=coolie&fo=json"
        ))
        .is_ok());
        assert!(validate_search_url(&url("https://www.loc.gov/search/?q=items")).is_ok());
    }

    #[test]
    fn test_detail_urls_rejected() {
        let err = validate_search_url(&url(
            "https://www.loc.gov/item/sn84026844/1872-01-04/ed-1/",
        ))
        .unwrap_err();
        assert!(matches!(err, ValidationError::DetailPageUrl(_)));

        assert!(validate_search_url(&url(
            "http://www.loc.gov/resource/sn84026844/1872-01-04/ed-1/?sp=2"
        ))
        .is_err());
    }

    #[test]
    fn test_non_http_rejected() {
        assert!(matches!(
            validate_search_url(&url("ftp://www.loc.gov/collections/")),
            Err(ValidationError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(
            sanitize_filename("coolie WV 1870-1874").unwrap(),
            "coolie_WV_1870-1874"
        );
        assert_eq!(sanitize_filename("a/b*c").unwrap(), "abc");
        assert!(matches!(
            sanitize_filename("../etc/passwd"),
            Err(ValidationError::PathTraversal(_))
        ));
        assert_eq!(sanitize_filename("  "), Err(ValidationError::InvalidFilename));
        assert_eq!(sanitize_filename("***"), Err(ValidationError::InvalidFilename));
    }
}
