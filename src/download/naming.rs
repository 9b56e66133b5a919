//! Filesystem-safe names for downloaded files and link shortcuts.
//!
//! File names are resolved in two steps: the crawler's display name is split
//! into base and extension, and at fetch time the extension is completed from
//! the server's declared filename or content type.

use std::collections::HashMap;
use std::path::{Component, Path};

use url::Url;

/// Upper bound for `base + extension` of a downloaded file.
pub const MAX_FILE_NAME_CHARS: usize = 200;

/// Upper bound for the base of a `.url` shortcut (extension excluded).
pub const MAX_LINK_BASE_CHARS: usize = 195;

/// Base used when a file's name sanitizes to nothing.
pub const FILE_PLACEHOLDER: &str = "downloaded_file";

/// Base used when a link's name sanitizes to nothing.
pub const LINK_PLACEHOLDER: &str = "weblink_shortcut";

/// Path segment used when a folder, section or course name sanitizes to nothing.
pub const SEGMENT_PLACEHOLDER: &str = "untitled";

/// Extension of synthesized link shortcuts.
pub const LINK_EXTENSION: &str = ".url";

const MAX_EXTENSION_CHARS: usize = 4;

/// Server-side hints available once the response headers are in.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerHints<'a> {
    /// Filename from `Content-Disposition`, or the final URL's last segment.
    pub declared_filename: Option<&'a str>,
    /// Raw `Content-Type` header value.
    pub content_type: Option<&'a str>,
}

/// Content-type to extension lookup.
///
/// An entry mapped to the empty string means "known type, no extension".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeTable {
    entries: HashMap<String, String>,
}

impl Default for MimeTable {
    fn default() -> Self {
        const ENTRIES: &[(&str, &str)] = &[
            ("application/pdf", ".pdf"),
            ("application/vnd.ms-powerpoint", ".ppt"),
            (
                "application/vnd.openxmlformats-officedocument.presentationml.presentation",
                ".pptx",
            ),
            ("application/msword", ".doc"),
            (
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                ".docx",
            ),
            ("application/vnd.ms-excel", ".xls"),
            (
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                ".xlsx",
            ),
            ("application/zip", ".zip"),
            ("application/x-zip-compressed", ".zip"),
            ("application/x-rar-compressed", ".rar"),
            ("application/x-7z-compressed", ".7z"),
            ("application/x-tar", ".tar"),
            ("video/mp4", ".mp4"),
            ("video/quicktime", ".mov"),
            ("video/x-msvideo", ".avi"),
            ("video/x-matroska", ".mkv"),
            ("video/webm", ".webm"),
            ("image/jpeg", ".jpg"),
            ("image/png", ".png"),
            ("image/gif", ".gif"),
            ("text/plain", ".txt"),
            ("application/x-ipynb+json", ".ipynb"),
            ("application/octet-stream", ""),
        ];
        ENTRIES
            .iter()
            .fold(Self::empty(), |table, (mime, ext)| table.with_entry(mime, ext))
    }
}

impl MimeTable {
    /// A table with no entries.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Adds or replaces one mapping. `extension` includes the leading dot.
    #[must_use]
    pub fn with_entry(mut self, mime: &str, extension: &str) -> Self {
        self.entries
            .insert(mime.trim().to_ascii_lowercase(), extension.to_string());
        self
    }

    /// Extension for a `Content-Type` header value, parameters ignored.
    #[must_use]
    pub fn extension_for(&self, content_type: &str) -> Option<&str> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        self.entries
            .get(&mime)
            .map(String::as_str)
            .filter(|ext| !ext.is_empty())
    }
}

/// Splits `name` into base and dot-extension.
///
/// The extension (returned with its dot) is accepted only if it is 1-4 ASCII
/// alphanumeric characters and the base before it is non-empty; otherwise the
/// whole name is the base.
#[must_use]
pub fn split_display_name(name: &str) -> (&str, Option<&str>) {
    let trimmed = name.trim();
    if let Some(dot) = trimmed.rfind('.')
        && dot > 0
    {
        let ext = &trimmed[dot + 1..];
        let valid = !ext.is_empty()
            && ext.chars().count() <= MAX_EXTENSION_CHARS
            && ext.chars().all(|c| c.is_ascii_alphanumeric());
        if valid {
            return (&trimmed[..dot], Some(&trimmed[dot..]));
        }
    }
    (trimmed, None)
}

/// Replaces path-illegal characters with `_`, collapses underscore runs and
/// trims leading/trailing underscores and whitespace.
///
/// The result may be empty.
#[must_use]
pub fn sanitize_component(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_underscore = false;
    for ch in value.trim().chars() {
        let mapped = match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        };
        if mapped == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(mapped);
            prev_underscore = false;
        }
    }

    let trimmed = out.trim_matches(|c: char| c == '_' || c.is_whitespace());
    if is_safe_filename_segment(trimmed) {
        trimmed.to_string()
    } else {
        String::new()
    }
}

/// Sanitizes a directory segment (term, course, section or folder name).
#[must_use]
pub fn sanitize_segment(value: &str) -> String {
    let cleaned = sanitize_component(value);
    if cleaned.is_empty() {
        SEGMENT_PLACEHOLDER.to_string()
    } else {
        cleaned
    }
}

/// Dot-extension of a server-declared filename.
///
/// Unlike display names, any length of ASCII alphanumerics is accepted.
#[must_use]
pub fn declared_extension(declared: &str) -> Option<&str> {
    let trimmed = declared.trim();
    let dot = trimmed.rfind('.')?;
    let ext = &trimmed[dot + 1..];
    let valid = dot > 0 && !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then_some(&trimmed[dot..])
}

/// Resolves the on-disk name of a downloaded file.
///
/// Extension priority: the display name's own extension, then the server's
/// declared filename, then `mime`, then none.
#[must_use]
pub fn resolve_file_name(display_name: &str, hints: &ServerHints<'_>, mime: &MimeTable) -> String {
    let (base, own_ext) = split_display_name(display_name);
    let extension = own_ext
        .or_else(|| {
            hints
                .declared_filename
                .and_then(declared_extension)
        })
        .or_else(|| hints.content_type.and_then(|ct| mime.extension_for(ct)))
        .unwrap_or("");

    let mut base = strip_repeated_extension(&sanitize_component(base), extension);
    if base.is_empty() {
        base = FILE_PLACEHOLDER.to_string();
    }

    let budget = MAX_FILE_NAME_CHARS.saturating_sub(extension.chars().count());
    format!("{}{extension}", truncate_chars(&base, budget))
}

/// Resolves the on-disk name of a `.url` shortcut.
#[must_use]
pub fn resolve_link_name(display_name: &str) -> String {
    let mut base = strip_repeated_extension(&sanitize_component(display_name), LINK_EXTENSION);
    if base.is_empty() {
        base = LINK_PLACEHOLDER.to_string();
    }
    format!(
        "{}{LINK_EXTENSION}",
        truncate_chars(&base, MAX_LINK_BASE_CHARS)
    )
}

/// Parses a `Content-Disposition` header value to extract the filename.
///
/// Handles:
/// - `attachment; filename="example.pdf"`
/// - `attachment; filename=example.pdf`
/// - `attachment; filename*=UTF-8''example.pdf` (RFC 5987, percent-decoded)
#[must_use]
pub fn parse_content_disposition(header: &str) -> Option<String> {
    // Parameter names are case-insensitive; ASCII lowering keeps byte offsets.
    let lowered = header.to_ascii_lowercase();

    if let Some(pos) = lowered.find("filename*=") {
        let value = header[pos + 10..].trim();
        if let Some(quote_pos) = value.find("''") {
            let encoded = &value[quote_pos + 2..];
            let end = encoded.find(';').unwrap_or(encoded.len());
            let encoded_name = encoded[..end].trim().trim_matches('"');
            if let Ok(decoded) = urlencoding::decode(encoded_name)
                && !decoded.trim().is_empty()
            {
                return Some(decoded.into_owned());
            }
        }
    }

    if let Some(pos) = lowered.find("filename=") {
        let value = header[pos + 9..].trim();
        if let Some(stripped) = value.strip_prefix('"') {
            if let Some(end) = stripped.find('"')
                && end > 0
            {
                return Some(percent_decoded(&stripped[..end]));
            }
        } else {
            let end = value.find(';').unwrap_or(value.len());
            let filename = value[..end].trim();
            if !filename.is_empty() {
                return Some(percent_decoded(filename));
            }
        }
    }

    None
}

/// Percent-decoded last path segment of `url`, if non-empty.
#[must_use]
pub fn url_basename(url: &Url) -> Option<String> {
    let last = url.path_segments()?.next_back()?;
    if last.is_empty() {
        return None;
    }
    Some(percent_decoded(last))
}

fn percent_decoded(value: &str) -> String {
    urlencoding::decode(value).map_or_else(|_| value.to_string(), |d| d.into_owned())
}

fn strip_repeated_extension(base: &str, extension: &str) -> String {
    if extension.is_empty() {
        return base.to_string();
    }
    let mut current = base;
    while current.len() > extension.len()
        && current.is_char_boundary(current.len() - extension.len())
        && current[current.len() - extension.len()..].eq_ignore_ascii_case(extension)
    {
        current = current[..current.len() - extension.len()]
            .trim_end_matches(|c: char| c == '_' || c.is_whitespace());
    }
    current.to_string()
}

fn truncate_chars(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}
