//! Byte-level text encoding for the two eras of the file format.
use crate::codec::FormatVersion;
use encoding_rs::WINDOWS_1252;
use std::borrow::Cow;

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// Characters the legacy writers could not round trip, with their replacements.
const LEGACY_REPLACEMENTS: &[(char, &str)] = &[
    ('\u{a0}', " "),
    ('ä', "&#xe4;"),
    ('ö', "&#xf6;"),
    ('ü', "&#xfc;"),
    ('Ä', "&#xc4;"),
    ('Ö', "&#xd6;"),
    ('Ü', "&#xdc;"),
    ('ß', "&#xdf;"),
];

/// Decode file bytes. Legacy versions are windows-1252; everything else is UTF-8, with a
/// windows-1252 retry when the bytes are not valid UTF-8.
pub fn decode(bytes: &[u8], version: &FormatVersion) -> String {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if version.uses_legacy_encoding() {
        let (text, had_errors) = WINDOWS_1252.decode_without_bom_handling(bytes);
        if had_errors {
            tracing::warn!("replaced undecodable bytes while reading a {version} map");
        }
        return text.into_owned();
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(e) => {
            tracing::warn!("map is not valid UTF-8 ({e}), reading it as windows-1252");
            WINDOWS_1252.decode_without_bom_handling(bytes).0.into_owned()
        }
    }
}

/// Encode serialized text for the given version. Characters windows-1252 cannot represent are
/// written as numeric character references.
pub fn encode(text: &str, version: &FormatVersion) -> Vec<u8> {
    if version.uses_legacy_encoding() {
        let (bytes, _, unmappable) = WINDOWS_1252.encode(text);
        if unmappable {
            tracing::debug!("wrote unmappable characters as character references");
        }
        bytes.into_owned()
    } else {
        text.as_bytes().to_vec()
    }
}

/// Replace the non-breaking space and the German umlauts (and sharp s) for legacy readers.
pub fn legacy_escape(text: &str) -> Cow<'_, str> {
    if !text.chars().any(|c| LEGACY_REPLACEMENTS.iter().any(|(from, _)| *from == c)) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        match LEGACY_REPLACEMENTS.iter().find(|(from, _)| *from == c) {
            Some((_, to)) => out.push_str(to),
            None => out.push(c),
        }
    }
    Cow::Owned(out)
}
