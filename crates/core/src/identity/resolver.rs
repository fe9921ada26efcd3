//! URL and format canonicalization.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use url::Url;

use super::types::{
    EncodingSpec, FormatRequest, FormatSelector, JobKey, MediaKind, ResolvedRequest, WorkSpec,
};
use super::IdentityError;

static VIDEO_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap());
static FORMAT_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_+\-]{1,64}$").unwrap());

/// Hosts serving the full site layout (`/watch`, `/shorts/<id>`, ...).
const SITE_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
    "youtube-nocookie.com",
    "www.youtube-nocookie.com",
];

/// Short-link host (`youtu.be/<id>`).
const SHORT_HOST: &str = "youtu.be";

/// Resolves a raw request into its job key and canonical work spec.
pub fn resolve(raw_url: &str, request: &FormatRequest) -> Result<ResolvedRequest, IdentityError> {
    let work = WorkSpec {
        source_url: normalize_source_url(raw_url)?,
        encoding: canonicalize_format(request)?,
    };
    Ok(ResolvedRequest {
        key: JobKey::derive(&work),
        work,
    })
}

/// Normalizes a source URL to `https://www.youtube.com/watch?v=<id>`.
///
/// Scheme and host casing are folded by the parser. Every query parameter
/// except the video id is dropped, as is the fragment.
pub fn normalize_source_url(raw_url: &str) -> Result<String, IdentityError> {
    let raw = raw_url.trim();
    if raw.is_empty() {
        return Err(IdentityError::InvalidUrl("URL is required".to_string()));
    }

    let url = Url::parse(raw).map_err(|e| IdentityError::InvalidUrl(format!("{raw}: {e}")))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(IdentityError::InvalidUrl(format!(
                "unsupported scheme: {other}"
            )))
        }
    }

    let host = url
        .host_str()
        .map(|h| h.trim_end_matches('.'))
        .ok_or_else(|| IdentityError::InvalidUrl(format!("{raw}: missing host")))?;

    let video_id = if host == SHORT_HOST {
        url.path_segments()
            .and_then(|mut segments| segments.next())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    } else if SITE_HOSTS.contains(&host) {
        site_video_id(&url)
    } else {
        return Err(IdentityError::UnsupportedSource(host.to_string()));
    };

    let video_id = video_id.ok_or_else(|| {
        IdentityError::UnsupportedSource(format!("no video id in {raw}"))
    })?;

    if !VIDEO_ID.is_match(&video_id) {
        return Err(IdentityError::UnsupportedSource(format!(
            "malformed video id: {video_id}"
        )));
    }

    Ok(format!("https://www.youtube.com/watch?v={video_id}"))
}

fn site_video_id(url: &Url) -> Option<String> {
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();

    match segments.as_slice() {
        ["watch"] => url
            .query_pairs()
            .find(|(name, _)| name == "v")
            .map(|(_, value)| value.into_owned()),
        ["shorts" | "embed" | "live" | "v", id, ..] => Some(id.to_string()),
        _ => None,
    }
}

/// Folds equivalent format spellings onto one canonical encoding.
pub fn canonicalize_format(request: &FormatRequest) -> Result<EncodingSpec, IdentityError> {
    let raw = request.format_id.as_deref().unwrap_or("").trim();
    let folded = raw
        .to_ascii_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let is_best = match request.kind {
        MediaKind::Audio => matches!(
            folded.as_str(),
            "" | "best" | "bestaudio" | "best audio" | "bestaudio/best"
        ),
        MediaKind::Video => matches!(
            folded.as_str(),
            "" | "best" | "best video" | "bestvideo+bestaudio" | "bestvideo+bestaudio/best"
        ),
    };

    let format = if is_best {
        FormatSelector::Best
    } else if FORMAT_ID.is_match(raw) {
        FormatSelector::Explicit(raw.to_string())
    } else {
        return Err(IdentityError::InvalidFormat(raw.to_string()));
    };

    Ok(EncodingSpec {
        kind: request.kind,
        format,
    })
}
