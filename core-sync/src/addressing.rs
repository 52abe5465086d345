//! # Canonical Addressing
//!
//! Maps drive-relative paths to stable identifiers and back.
//!
//! An identifier is the drive tag, `://`, then every path segment
//! percent-encoded and joined with `/`:
//!
//! ```text
//! local://Books/War%20and%20Peace.epub
//! icloud://Inbox/report%20%28draft%29.txt
//! ```
//!
//! Identifier resolvers registered on the
//! [`ResolverRegistry`](crate::resolvers::ResolverRegistry) may replace the
//! default; decoding only understands the two built-in prefixes.

use crate::drive::{Drive, DriveTag, RootRelativePath};
use crate::resolvers::ResolverRegistry;
use crate::{Result, SyncError};
use core_library::models::IDENTIFIER_SCHEME_SEPARATOR;

/// Percent-encode each segment of `path`.
pub fn encode_path(path: &RootRelativePath) -> String {
    path.segments()
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Default identifier for `path` on a drive with `tag`.
pub fn default_identifier(tag: DriveTag, path: &RootRelativePath) -> String {
    format!("{}{}{}", tag.as_str(), IDENTIFIER_SCHEME_SEPARATOR, encode_path(path))
}

/// Identifier for `path` on `drive`, after registered resolvers.
pub fn identifier_for(
    registry: &ResolverRegistry,
    drive: &Drive,
    path: &RootRelativePath,
) -> String {
    let default = default_identifier(drive.tag(), path);
    registry.resolve_identifier(&drive.absolute_path(path), &default)
}

/// Invert [`default_identifier`].
///
/// # Errors
///
/// [`SyncError::InvalidIdentifier`] for unknown prefixes, missing separators
/// or malformed percent-encoding.
pub fn decode_identifier(identifier: &str) -> Result<(DriveTag, RootRelativePath)> {
    let (prefix, encoded) = identifier
        .split_once(IDENTIFIER_SCHEME_SEPARATOR)
        .ok_or_else(|| SyncError::InvalidIdentifier(identifier.to_string()))?;
    let tag: DriveTag = prefix.parse()?;

    let mut segments = Vec::new();
    for segment in encoded.split('/').filter(|s| !s.is_empty()) {
        let decoded = urlencoding::decode(segment)
            .map_err(|_| SyncError::InvalidIdentifier(identifier.to_string()))?;
        if decoded.is_empty() || decoded == "." {
            return Err(SyncError::InvalidIdentifier(identifier.to_string()));
        }
        segments.push(decoded.into_owned());
    }

    let path = RootRelativePath::from_segments(segments)
        .map_err(|_| SyncError::InvalidIdentifier(identifier.to_string()))?;
    Ok((tag, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockFs;
    use std::path::Path;
    use std::sync::Arc;

    fn path(p: &str) -> RootRelativePath {
        RootRelativePath::new(p).unwrap()
    }

    #[test]
    fn test_default_identifier_encodes_segments() {
        assert_eq!(
            default_identifier(DriveTag::Local, &path("Books/War and Peace.epub")),
            "local://Books/War%20and%20Peace.epub"
        );
        assert_eq!(
            default_identifier(DriveTag::Cloud, &path("100% legit/a#b?.txt")),
            "icloud://100%25%20legit/a%23b%3F.txt"
        );
    }

    #[test]
    fn test_decode_inverts_encode() {
        for (tag, raw) in [
            (DriveTag::Local, "Books/War and Peace.epub"),
            (DriveTag::Cloud, "Ünïcødé/日本語 (1).pdf"),
            (DriveTag::Local, "plain.txt"),
        ] {
            let id = default_identifier(tag, &path(raw));
            let (decoded_tag, decoded_path) = decode_identifier(&id).unwrap();
            assert_eq!(decoded_tag, tag);
            assert_eq!(decoded_path, path(raw));
        }
    }

    #[test]
    fn test_backslash_stays_inside_its_segment() {
        let path = RootRelativePath::root().child("a\\b.zip").unwrap();
        let id = default_identifier(DriveTag::Local, &path);
        assert_eq!(id, "local://a%5Cb.zip");

        let (_, decoded) = decode_identifier(&id).unwrap();
        assert_eq!(decoded, path);
        assert_eq!(decoded.segments().count(), 1);
    }

    #[test]
    fn test_decode_rejects_unknown_or_malformed() {
        for bad in [
            "dropbox://a.txt",
            "no-separator",
            "local://a%2Fb.txt",
            "local://%2E%2E/escape",
            "local://%FF.txt",
        ] {
            assert!(
                matches!(decode_identifier(bad), Err(SyncError::InvalidIdentifier(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_identifier_resolvers_first_match_wins() {
        let drive = Drive::local("/data/local", Arc::new(MockFs::new()));
        let registry = ResolverRegistry::new()
            .with_identifier_resolver(|file: &Path, _default: &str| {
                file.extension()
                    .filter(|ext| *ext == "opml")
                    .map(|_| "feeds://subscriptions".to_string())
            })
            .with_identifier_resolver(|_: &Path, default: &str| {
                default.ends_with(".opml").then(|| "never".to_string())
            });

        assert_eq!(
            identifier_for(&registry, &drive, &path("Feeds/subs.opml")),
            "feeds://subscriptions"
        );
        assert_eq!(
            identifier_for(&registry, &drive, &path("Books/a.epub")),
            "local://Books/a.epub"
        );
    }
}
