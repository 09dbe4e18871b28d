/*!
Eddystone-URL frames.

A URL frame compresses its URL with two lookup tables: one byte selects the
scheme prefix, and body bytes `0x00..=0x0D` expand to common domain suffixes.
Every other body byte is a literal character.

```text
[0] 0x10  [1] tx power  [2] scheme code  [3..] encoded body
```
*/

use crate::error::{DecodeError, Result};
use crate::frame::{expect_frame_type, FrameType};
use crate::protocol::{FRAME_TYPE_URL, URL_FRAME_MIN_LEN, URL_SCHEME_OFFSET};
use serde::{Serialize, Serializer};
use std::fmt;
use std::ops::RangeInclusive;
use thiserror::Error;
use tracing::trace;
use url::Url;

/// Scheme prefixes, indexed by scheme code
pub const URL_SCHEMES: [&str; 4] = ["http://www.", "https://www.", "http://", "https://"];

/// Suffix expansions, indexed by body byte
pub const URL_ENCODINGS: [&str; 14] = [
    ".com/", ".org/", ".edu/", ".net/", ".info/", ".biz/", ".gov/",
    ".com", ".org", ".edu", ".net", ".info", ".biz", ".gov",
];

/// Look up the scheme prefix for a scheme code
pub fn url_scheme(code: u8) -> Option<&'static str> {
    URL_SCHEMES.get(usize::from(code)).copied()
}

/// Look up the suffix expansion for a body byte
pub fn url_expansion(code: u8) -> Option<&'static str> {
    URL_ENCODINGS.get(usize::from(code)).copied()
}

/// A URL reconstructed from an Eddystone-URL frame.
///
/// Keeps the text exactly as assembled from the frame alongside its parsed
/// form; the parser would otherwise normalize e.g. `https://www.` into
/// `https://www./`.
///
/// A frame with an empty body is a bare scheme prefix. Those are always
/// accepted, even `http://` and `https://` which have no host to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EddystoneUrl {
    text: String,
    parsed: Option<Url>,
}

impl EddystoneUrl {
    /// Validate and wrap an assembled URL string
    pub fn parse(text: String) -> Result<Self> {
        if URL_SCHEMES.contains(&text.as_str()) {
            let parsed = Url::parse(&text).ok();
            return Ok(Self { text, parsed });
        }

        match Url::parse(&text) {
            Ok(parsed) => Ok(Self { text, parsed: Some(parsed) }),
            Err(source) => Err(DecodeError::MalformedUrl { url: text, source }),
        }
    }

    /// The URL exactly as broadcast
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The parsed URL; `None` for a bare scheme without a host
    pub fn url(&self) -> Option<&Url> {
        self.parsed.as_ref()
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

impl fmt::Display for EddystoneUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Serialize for EddystoneUrl {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

/// Decode a URL frame into its full URL.
///
/// The body runs to the end of the buffer; a frame with no body bytes yields
/// the bare scheme prefix.
pub fn decode_url(service_data: &[u8]) -> Result<EddystoneUrl> {
    expect_frame_type(service_data, FrameType::Url)?;

    if service_data.len() < URL_FRAME_MIN_LEN {
        return Err(DecodeError::truncated(
            FrameType::Url,
            URL_FRAME_MIN_LEN,
            service_data.len(),
        ));
    }

    let scheme_code = service_data[URL_SCHEME_OFFSET];
    let scheme = url_scheme(scheme_code).ok_or(DecodeError::InvalidScheme(scheme_code))?;
    let body = &service_data[URL_FRAME_MIN_LEN..];

    let mut text = String::with_capacity(scheme.len() + body.len() * 2);
    text.push_str(scheme);
    for &byte in body {
        match url_expansion(byte) {
            Some(suffix) => text.push_str(suffix),
            None => text.push(char::from(byte)),
        }
    }

    trace!("URL frame decoded to {:?}", text);
    EddystoneUrl::parse(text)
}

/// Errors that can occur while compressing a URL into a URL frame
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UrlEncodeError {
    #[error("URL does not start with a supported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Character {0:?} cannot be encoded in a URL frame")]
    UnencodableCharacter(char),

    #[error("Invalid URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Body bytes that may appear literally in a URL frame
const LITERAL_BYTES: RangeInclusive<u8> = 0x21..=0x7e;

/// Compress a URL into a complete URL frame (`0x10`, tx power, scheme, body).
///
/// Uses the longest matching scheme prefix and, at each position, the
/// longest matching suffix expansion. Anything [`decode_url`] would not give
/// back unchanged is rejected: URLs that do not parse, and literal characters
/// outside printable ASCII (`0x21..=0x7E`).
pub fn encode_url(url: &str, tx_power: i8) -> std::result::Result<Vec<u8>, UrlEncodeError> {
    let (scheme_code, rest) = longest_match(url, &URL_SCHEMES)
        .map(|code| (code, &url[URL_SCHEMES[usize::from(code)].len()..]))
        .ok_or_else(|| UrlEncodeError::UnsupportedScheme(url.to_string()))?;

    if !rest.is_empty() {
        Url::parse(url).map_err(|source| UrlEncodeError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
    }

    let mut frame = Vec::with_capacity(URL_FRAME_MIN_LEN + rest.len());
    frame.push(FRAME_TYPE_URL);
    frame.push(tx_power as u8);
    frame.push(scheme_code);

    let mut remaining = rest;
    while let Some(c) = remaining.chars().next() {
        if let Some(code) = longest_match(remaining, &URL_ENCODINGS) {
            frame.push(code);
            remaining = &remaining[URL_ENCODINGS[usize::from(code)].len()..];
            continue;
        }

        if !c.is_ascii() || !LITERAL_BYTES.contains(&(c as u8)) {
            return Err(UrlEncodeError::UnencodableCharacter(c));
        }
        frame.push(c as u8);
        remaining = &remaining[1..];
    }

    Ok(frame)
}

/// Index of the longest table entry `text` starts with
fn longest_match(text: &str, table: &[&str]) -> Option<u8> {
    table
        .iter()
        .enumerate()
        .filter(|(_, entry)| text.starts_with(*entry))
        .max_by_key(|(_, entry)| entry.len())
        .map(|(code, _)| code as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_table() {
        assert_eq!(url_scheme(0x00), Some("http://www."));
        assert_eq!(url_scheme(0x01), Some("https://www."));
        assert_eq!(url_scheme(0x02), Some("http://"));
        assert_eq!(url_scheme(0x03), Some("https://"));
        assert_eq!(url_scheme(0x04), None);
    }

    #[test]
    fn test_encoding_table() {
        assert_eq!(url_expansion(0x00), Some(".com/"));
        assert_eq!(url_expansion(0x06), Some(".gov/"));
        assert_eq!(url_expansion(0x07), Some(".com"));
        assert_eq!(url_expansion(0x0d), Some(".gov"));
        assert_eq!(url_expansion(0x0e), None);
        assert_eq!(url_expansion(b'a'), None);

        let with_slash = URL_ENCODINGS.iter().filter(|s| s.ends_with('/')).count();
        assert_eq!(with_slash, 7);
    }

    #[test]
    fn test_decode_url_with_suffix() {
        let mut data = vec![0x10, 0x00, 0x02];
        data.extend_from_slice(b"example");
        data.push(0x00);

        let url = decode_url(&data).unwrap();
        assert_eq!(url.as_str(), "http://example.com/");
        assert_eq!(url.url().unwrap().host_str(), Some("example.com"));
    }

    #[test]
    fn test_decode_url_invalid_scheme() {
        assert_eq!(
            decode_url(&[0x10, 0x00, 0x05]),
            Err(DecodeError::InvalidScheme(0x05))
        );
    }

    #[test]
    fn test_decode_url_empty_body() {
        let url = decode_url(&[0x10, 0x00, 0x01]).unwrap();
        assert_eq!(url.as_str(), "https://www.");
        assert_eq!(url.to_string(), "https://www.");
    }

    #[test]
    fn test_decode_url_bare_scheme_for_every_code() {
        for (code, scheme) in URL_SCHEMES.iter().enumerate() {
            let url = decode_url(&[0x10, 0x00, code as u8]).unwrap();
            assert_eq!(url.as_str(), *scheme);
        }

        let http = decode_url(&[0x10, 0x00, 0x02]).unwrap();
        assert_eq!(http.as_str(), "http://");
        assert!(http.url().is_none());

        let https = decode_url(&[0x10, 0x00, 0x03]).unwrap();
        assert_eq!(https.as_str(), "https://");
        assert!(https.url().is_none());

        assert!(decode_url(&[0x10, 0x00, 0x00]).unwrap().url().is_some());
    }

    #[test]
    fn test_decode_url_truncated() {
        assert_eq!(
            decode_url(&[0x10, 0x00]),
            Err(DecodeError::TruncatedFrame {
                frame_type: FrameType::Url,
                expected: 3,
                actual: 2,
            })
        );
    }

    #[test]
    fn test_decode_url_path_and_suffix_mix() {
        let mut data = vec![0x10, 0xeb, 0x03];
        data.extend_from_slice(b"goo.gl/");
        data.extend_from_slice(b"abc");
        let url = decode_url(&data).unwrap();
        assert_eq!(url.as_str(), "https://goo.gl/abc");

        let mut data = vec![0x10, 0xeb, 0x00];
        data.extend_from_slice(b"uri");
        data.push(0x08);
        let url = decode_url(&data).unwrap();
        assert_eq!(url.as_str(), "http://www.uri.org");
    }

    #[test]
    fn test_decode_url_malformed() {
        let data = [0x10, 0x00, 0x02, b'e', b'x', b' ', b'a', 0x07];
        assert!(matches!(
            decode_url(&data),
            Err(DecodeError::MalformedUrl { ref url, .. }) if url == "http://ex a.com"
        ));
    }

    #[test]
    fn test_round_trip_https_www() {
        let frame = encode_url("https://www.example.com/", 0).unwrap();
        let mut expected = vec![0x10, 0x00, 0x01];
        expected.extend_from_slice(b"example");
        expected.push(0x00);
        assert_eq!(frame, expected);

        assert_eq!(decode_url(&frame).unwrap().as_str(), "https://www.example.com/");
    }

    #[test]
    fn test_encode_prefers_longest_matches() {
        let frame = encode_url("https://go.info/x", -20).unwrap();
        assert_eq!(frame[..3], [0x10, 0xec, 0x03]);
        assert_eq!(&frame[3..], &[b'g', b'o', 0x04, b'x']);
        assert_eq!(decode_url(&frame).unwrap().as_str(), "https://go.info/x");
    }

    #[test]
    fn test_encode_errors() {
        assert_eq!(
            encode_url("ftp://example.com", 0),
            Err(UrlEncodeError::UnsupportedScheme("ftp://example.com".to_string()))
        );
        assert_eq!(
            encode_url("https://exämple.com", 0),
            Err(UrlEncodeError::UnencodableCharacter('ä'))
        );
        assert_eq!(
            encode_url("https://ab.com/\u{1}", 0),
            Err(UrlEncodeError::UnencodableCharacter('\u{1}'))
        );
    }

    #[test]
    fn test_encode_rejects_unparseable_url() {
        assert!(matches!(
            encode_url("https://a b.com", 0),
            Err(UrlEncodeError::InvalidUrl { ref url, .. }) if url == "https://a b.com"
        ));
    }

    #[test]
    fn test_encode_rejects_non_printable_literals() {
        for c in ['\u{e}', '\u{1f}', '\u{7f}'] {
            let url = format!("https://ex.com/{}x", c);
            assert_eq!(
                encode_url(&url, 0),
                Err(UrlEncodeError::UnencodableCharacter(c)),
                "char {:?}",
                c
            );
        }
    }

    #[test]
    fn test_encoded_frames_decode_back() {
        let urls = [
            "http://www.example.org/path?q=1",
            "https://goo.gl/S6zT6P",
            "https://www.",
            "http://",
            "https://github.com",
        ];
        for url in urls {
            let frame = encode_url(url, -20).unwrap();
            assert!(frame[3..].iter().all(|b| *b <= 0x0d || LITERAL_BYTES.contains(b)));
            assert_eq!(decode_url(&frame).unwrap().as_str(), url);
        }
    }
}
