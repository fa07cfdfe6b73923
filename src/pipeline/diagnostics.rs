// Resolution diagnostics - classifies why the metadata engine gave up
//
// The engine reports failures as free text on stderr. We map that text to a
// small set of reasons so the user gets a hint next to the raw message.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    /// Private video requiring authorization
    PrivateVideo,

    /// Video deleted, removed or otherwise gone
    VideoUnavailable,

    /// No extractor understands the URL
    UnsupportedUrl,

    /// Age-restricted content requiring login
    AgeRestricted,

    /// Geographic restriction
    GeoBlocked,

    /// 429 or similar throttling
    RateLimited,

    /// HTTP 403 Forbidden
    Forbidden,

    /// Network timeout or unreachable host
    NetworkTimeout,

    Unknown,
}

impl FailureReason {
    /// Whether trying again later may succeed without changing anything
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::NetworkTimeout | Self::Forbidden
        )
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::PrivateVideo => "Private video",
            Self::VideoUnavailable => "Video unavailable",
            Self::UnsupportedUrl => "Unsupported URL",
            Self::AgeRestricted => "Age-restricted content",
            Self::GeoBlocked => "Not available in your region",
            Self::RateLimited => "Rate limited by the site",
            Self::Forbidden => "Access denied (HTTP 403)",
            Self::NetworkTimeout => "Network timeout",
            Self::Unknown => "Metadata extraction failed",
        }
    }

    /// One-line suggestion shown under the error message
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::PrivateVideo => {
                Some("The video is private; only authorized accounts can access it.")
            }
            Self::VideoUnavailable => Some("It may have been deleted or made private."),
            Self::UnsupportedUrl => Some("Check that the link points to a single media page."),
            Self::AgeRestricted => Some("Age-restricted media cannot be resolved anonymously."),
            Self::GeoBlocked => Some("Try a proxy in a region where the media is available."),
            Self::RateLimited => Some("Wait a few minutes and try again."),
            Self::Forbidden => Some("Try again later or configure a proxy."),
            Self::NetworkTimeout => Some("Check your connection and try again."),
            Self::Unknown => None,
        }
    }
}

/// Analyze engine stderr and return the most specific reason
pub fn diagnose_error(error: &str) -> FailureReason {
    let lower = error.to_lowercase();

    if lower.contains("private video")
        || lower.contains("video is private")
        || lower.contains("sign in if you've been granted access")
    {
        return FailureReason::PrivateVideo;
    }

    if lower.contains("video unavailable")
        || lower.contains("has been removed")
        || lower.contains("no longer available")
        || lower.contains("video is unavailable")
    {
        return FailureReason::VideoUnavailable;
    }

    if lower.contains("unsupported url") || lower.contains("is not a valid url") {
        return FailureReason::UnsupportedUrl;
    }

    if lower.contains("age-restricted")
        || lower.contains("confirm your age")
        || lower.contains("age_verification")
    {
        return FailureReason::AgeRestricted;
    }

    if lower.contains("not available in your country")
        || lower.contains("blocked in your country")
        || lower.contains("geo restrict")
    {
        return FailureReason::GeoBlocked;
    }

    if lower.contains("429") || lower.contains("too many requests") || lower.contains("rate limit")
    {
        return FailureReason::RateLimited;
    }

    if lower.contains("403") || lower.contains("forbidden") {
        return FailureReason::Forbidden;
    }

    if lower.contains("timed out")
        || lower.contains("timeout")
        || lower.contains("connection refused")
        || lower.contains("network is unreachable")
    {
        return FailureReason::NetworkTimeout;
    }

    FailureReason::Unknown
}

/// First `ERROR:` line of the engine output, or the last non-empty line
pub fn first_error_line(error: &str) -> Option<String> {
    error
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| error.lines().map(str::trim).filter(|l| !l.is_empty()).last())
        .map(str::to_string)
}
