//! Content digests and the manifest text format.
//!
//! The digest is SHA-256, hex-encoded lowercase (64 chars). The algorithm is
//! fixed: local and remote manifests are only comparable when both sides
//! hash the same way.
//!
//! One manifest line per file:
//!
//! ```text
//! <hex digest>  <relative/path>\n
//! ```
//!
//! Parsing is lenient by line: anything not matching
//! `^[0-9a-f]{32,}[ \t][ *]?.+$` is skipped, never an error. The separator
//! is one space or tab plus an optional second space or `*` (the
//! `sha256sum` binary marker), so a path's own leading spaces survive.

use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::error::{io_err, SyncError};
use crate::manifest::Manifest;

/// Manifest file name, written at the output root and at the remote root.
pub const MANIFEST_FILE: &str = "digest.sha256";

const READ_BUFFER: usize = 64 * 1024;

fn line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([0-9a-f]{32,})[ \t][ *]?(.+)$").expect("manifest line pattern is valid")
    })
}

/// Hex SHA-256 of `bytes`.
pub fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Hex SHA-256 of a file's full content, read in fixed-size chunks.
pub fn digest_file(path: &Path) -> Result<String, SyncError> {
    let mut file = std::fs::File::open(path).map_err(|e| io_err(path, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_BUFFER];
    loop {
        let n = file.read(&mut buffer).map_err(|e| io_err(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Format one manifest line, newline included.
pub fn format_line(digest: &str, relative_path: &str) -> String {
    format!("{digest}  {relative_path}\n")
}

/// Parse one manifest line into `(relative_path, digest)`.
pub fn parse_line(line: &str) -> Option<(String, String)> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let caps = line_pattern().captures(line)?;
    Some((caps[2].to_string(), caps[1].to_string()))
}

/// Parse manifest text; malformed lines are skipped.
pub fn parse_manifest(text: &str) -> Manifest {
    let mut manifest = Manifest::new();
    for line in text.lines() {
        match parse_line(line) {
            Some((path, digest)) => {
                manifest.insert(path, digest);
            }
            None if line.trim().is_empty() => {}
            None => tracing::debug!("skipping manifest line: {line:?}"),
        }
    }
    manifest
}

/// Render a manifest as text, one sorted line per entry.
pub fn format_manifest(manifest: &Manifest) -> String {
    manifest
        .iter()
        .map(|(path, digest)| format_line(digest, path))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn digest_is_fixed_length_lowercase_hex() {
        assert_eq!(digest(b""), EMPTY_SHA256);
        let d = digest(b"hello");
        assert_eq!(d.len(), 64);
        assert!(d.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(d, digest(b"hello!"));
    }

    #[test]
    fn digest_file_matches_in_memory_digest() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("big.bin");
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();
        assert_eq!(digest_file(&path).unwrap(), digest(&data));
    }

    #[test]
    fn digest_file_missing_is_io_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = digest_file(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, SyncError::Io { .. }));
    }

    #[test]
    fn parse_line_accepts_md5_length_and_sha256sum_separators() {
        let md5 = "d41d8cd98f00b204e9800998ecf8427e";
        assert_eq!(
            parse_line(&format!("{md5}  blog/my post.html")),
            Some(("blog/my post.html".to_string(), md5.to_string()))
        );
        assert_eq!(
            parse_line(&format!("{md5} *logo.png")),
            Some(("logo.png".to_string(), md5.to_string()))
        );
        assert_eq!(
            parse_line(&format!("{md5}\tnotes.txt")),
            Some(("notes.txt".to_string(), md5.to_string()))
        );
        assert_eq!(
            parse_line(&format!("{EMPTY_SHA256}  a.html\r")),
            Some(("a.html".to_string(), EMPTY_SHA256.to_string()))
        );
    }

    #[test]
    fn parse_line_rejects_malformed_input() {
        assert_eq!(parse_line("not a digest  a.html"), None);
        assert_eq!(parse_line("abc123  a.html"), None, "too short");
        assert_eq!(parse_line(&format!("{}  a.html", EMPTY_SHA256.to_uppercase())), None);
        assert_eq!(parse_line(EMPTY_SHA256), None, "no path");
        assert_eq!(parse_line(&format!("{EMPTY_SHA256}a.html")), None, "no separator");
    }

    #[test]
    fn leading_spaces_in_a_path_survive_the_text_format() {
        let d = digest(b"x");
        let line = format_line(&d, "  padded.html");
        assert_eq!(
            parse_line(line.trim_end_matches('\n')),
            Some(("  padded.html".to_string(), d.clone()))
        );

        let manifest: Manifest = [(" a.html".to_string(), d.clone()), ("a.html".to_string(), d)]
            .into_iter()
            .collect();
        assert_eq!(parse_manifest(&format_manifest(&manifest)), manifest);
    }

    #[test]
    fn parse_manifest_skips_garbage_and_keeps_good_lines() {
        let text = format!("# header\n\n{EMPTY_SHA256}  a.html\n<html>404</html>\n");
        let manifest = parse_manifest(&text);
        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest.get("a.html"), Some(EMPTY_SHA256));
        assert!(parse_manifest("").is_empty());
        assert!(parse_manifest("<!doctype html>\n<p>Not Found</p>").is_empty());
    }

    #[test]
    fn format_manifest_is_sorted_and_newline_terminated() {
        let manifest: Manifest = [
            ("b.html".to_string(), digest(b"b")),
            ("a/x.html".to_string(), digest(b"x")),
        ]
        .into_iter()
        .collect();
        let text = format_manifest(&manifest);
        let lines: Vec<_> = text.lines().collect();
        assert!(lines[0].ends_with("  a/x.html"));
        assert!(lines[1].ends_with("  b.html"));
        assert!(text.ends_with('\n'));
        assert_eq!(parse_manifest(&text), manifest);
    }
}
