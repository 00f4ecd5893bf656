//! Range-addressable byte serving per RFC 7233 (single range)
// Copyright 2025 Vodforge Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tracing::{debug, warn};

/// Fixed extension-to-MIME table with an explicit binary default. A lookup
/// table keeps the mapping total and easy to extend.
const MIME_TABLE: &[(&str, &str)] = &[
    ("mp4", "video/mp4"),
    ("m4v", "video/mp4"),
    ("webm", "video/webm"),
    ("mkv", "video/x-matroska"),
    ("mov", "video/quicktime"),
    ("avi", "video/x-msvideo"),
    ("ts", "video/mp2t"),
    ("m3u8", "application/vnd.apple.mpegurl"),
    ("mp3", "audio/mpeg"),
    ("aac", "audio/aac"),
    ("flac", "audio/flac"),
    ("wav", "audio/wav"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("vtt", "text/vtt"),
];

const DEFAULT_MIME: &str = "application/octet-stream";

/// Content type for a file path, derived from its extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return DEFAULT_MIME;
    };
    MIME_TABLE
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(ext))
        .map(|(_, mime)| *mime)
        .unwrap_or(DEFAULT_MIME)
}

/// A parsed `bytes=start-end` request, bounds still unclamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestedRange {
    pub start: u64,
    pub end: Option<u64>,
}

/// Parse a single-range `Range` header.
///
/// Either bound may be absent: a missing start defaults to 0 and a missing
/// end means end-of-file. Multiple ranges are not supported (no video
/// player client sends them). `None` means the header is malformed.
pub fn parse_range_header(header: &str) -> Option<RequestedRange> {
    let spec = header.strip_prefix("bytes=")?;
    if spec.contains(',') {
        return None;
    }
    let (start_raw, end_raw) = spec.split_once('-')?;

    let start = match start_raw.trim() {
        "" => 0,
        raw => raw.parse().ok()?,
    };
    let end = match end_raw.trim() {
        "" => None,
        raw => Some(raw.parse().ok()?),
    };
    if start_raw.trim().is_empty() && end_raw.trim().is_empty() {
        return None;
    }
    Some(RequestedRange { start, end })
}

/// Response produced by the byte server; the HTTP layer converts this into
/// a wire response unchanged.
#[derive(Debug)]
pub struct ServeReply {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
}

impl ServeReply {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn not_found() -> Self {
        Self {
            status: 404,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    fn not_satisfiable(file_size: u64) -> Self {
        Self {
            status: 416,
            headers: vec![("Content-Range", format!("bytes */{}", file_size))],
            body: Vec::new(),
        }
    }
}

/// Serve a byte window of a file per RFC 7233 single-range semantics.
///
/// The server only ever touches the specific file it is given and never
/// inspects encoding state; callers hand it completed rendition paths
/// only. Completed files are immutable, so successful responses carry a
/// public Cache-Control.
pub async fn serve_file(
    path: &Path,
    range_header: Option<&str>,
    cache_max_age_secs: u64,
) -> ServeReply {
    let file_size = match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => meta.len(),
        _ => {
            debug!(path = %path.display(), "Byte serve target not found");
            return ServeReply::not_found();
        }
    };

    let content_type = content_type_for(path);
    let cache_control = format!("public, max-age={}", cache_max_age_secs);

    let Some(header) = range_header else {
        // Full-body response.
        let body = match tokio::fs::read(path).await {
            Ok(body) => body,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read file for full response");
                return ServeReply::not_found();
            }
        };
        return ServeReply {
            status: 200,
            headers: vec![
                ("Accept-Ranges", "bytes".to_string()),
                ("Content-Length", body.len().to_string()),
                ("Content-Type", content_type.to_string()),
                ("Cache-Control", cache_control),
            ],
            body,
        };
    };

    let Some(range) = parse_range_header(header) else {
        return ServeReply::not_satisfiable(file_size);
    };

    let start = range.start;
    let end = range.end.unwrap_or(file_size.saturating_sub(1));
    if start > end || start >= file_size {
        return ServeReply::not_satisfiable(file_size);
    }
    let end = end.min(file_size - 1);
    let window = (end - start + 1) as usize;

    let mut file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to open file for range response");
            return ServeReply::not_found();
        }
    };
    if let Err(e) = file.seek(SeekFrom::Start(start)).await {
        warn!(path = %path.display(), error = %e, "Seek failed for range response");
        return ServeReply::not_satisfiable(file_size);
    }

    // Read exactly the window; a short read happens only at the tail or on
    // a racing write, in which case the advertised window shrinks to the
    // bytes actually read.
    let mut body = vec![0u8; window];
    let mut read_total = 0;
    loop {
        match file.read(&mut body[read_total..]).await {
            Ok(0) => break,
            Ok(n) => {
                read_total += n;
                if read_total == window {
                    break;
                }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Read failed for range response");
                return ServeReply::not_satisfiable(file_size);
            }
        }
    }
    if read_total == 0 {
        return ServeReply::not_satisfiable(file_size);
    }
    body.truncate(read_total);
    let actual_end = start + read_total as u64 - 1;

    ServeReply {
        status: 206,
        headers: vec![
            ("Accept-Ranges", "bytes".to_string()),
            (
                "Content-Range",
                format!("bytes {}-{}/{}", start, actual_end, file_size),
            ),
            ("Content-Length", read_total.to_string()),
            ("Content-Type", content_type.to_string()),
            ("Cache-Control", cache_control),
        ],
        body,
    }
}
