//! Codec registry for inline decoding.
//!
//! Mirrors the codec surface obfuscated code actually reaches for: text
//! transport encodings plus the binary-to-binary transforms (`base64`,
//! `zlib`, ...). Names are normalized the way Python's codec machinery
//! normalizes them, so `UTF_8`, `utf8` and `utf-8` all resolve.
//!
//! Text codecs honor the `strict` / `replace` / `ignore` error handlers;
//! binary codecs reject malformed input outright. Callers treat every
//! failure as "rule not applicable".

use std::io::Read;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use defog_error::{Error, Result};
use strum_macros::Display;

/// A recognized codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Codec {
    Utf8,
    Utf16,
    Latin1,
    Ascii,
    Base64,
    Base32,
    Base16,
    Hex,
    Rot13,
    Zlib,
}

/// Result of a decode: textual results become string nodes, binary results
/// become byte-string nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Text(String),
    Binary(Vec<u8>),
}

/// How malformed input is handled by text codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ErrorHandler {
    #[default]
    Strict,
    Replace,
    Ignore,
}

impl ErrorHandler {
    fn by_name(name: Option<&str>) -> Option<Self> {
        match name {
            None | Some("strict") => Some(ErrorHandler::Strict),
            Some("replace") => Some(ErrorHandler::Replace),
            Some("ignore") => Some(ErrorHandler::Ignore),
            Some(_) => None,
        }
    }
}

impl Codec {
    /// Resolve a codec by its (normalized) name. Returns `None` for names
    /// the registry does not recognize.
    pub fn by_name(name: &str) -> Option<Codec> {
        let normalized: String = name
            .trim()
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c == '_' || c == ' ' { '-' } else { c })
            .collect();
        match normalized.as_str() {
            "utf-8" | "utf8" | "u8" => Some(Codec::Utf8),
            "utf-16" | "utf16" | "u16" => Some(Codec::Utf16),
            "latin-1" | "latin1" | "latin" | "iso-8859-1" | "iso8859-1" | "8859" | "l1" => {
                Some(Codec::Latin1)
            }
            "ascii" | "us-ascii" | "646" => Some(Codec::Ascii),
            "base64" | "base-64" | "b64" => Some(Codec::Base64),
            "base32" | "b32" => Some(Codec::Base32),
            "base16" | "b16" => Some(Codec::Base16),
            "hex" => Some(Codec::Hex),
            "rot13" | "rot-13" => Some(Codec::Rot13),
            "zlib" | "zip" => Some(Codec::Zlib),
            _ => None,
        }
    }
}

/// Decode `data` with `codec`. `errors` is the Python-style error handler
/// name for text codecs; binary codecs ignore it.
pub fn decode(codec: Codec, data: &[u8], errors: Option<&str>) -> Result<Decoded> {
    match codec {
        Codec::Utf8 => {
            let handler = handler(errors)?;
            decode_utf8(data, handler).map(Decoded::Text)
        }
        Codec::Utf16 => {
            let handler = handler(errors)?;
            decode_utf16(data, handler).map(Decoded::Text)
        }
        Codec::Latin1 => Ok(Decoded::Text(
            data.iter().map(|&b| b as char).collect(),
        )),
        Codec::Ascii => {
            let handler = handler(errors)?;
            decode_ascii(data, handler).map(Decoded::Text)
        }
        Codec::Rot13 => {
            let text: String = data.iter().map(|&b| b as char).collect();
            Ok(Decoded::Text(rot13(&text)))
        }
        Codec::Base64 => {
            let stripped = strip_ascii_whitespace(data);
            BASE64_STANDARD
                .decode(&stripped)
                .map(Decoded::Binary)
                .map_err(|e| {
                    Error::decode_failed(e.to_string()).with_operation("codecs::base64")
                })
        }
        Codec::Base32 => decode_base32(&strip_ascii_whitespace(data)).map(Decoded::Binary),
        Codec::Base16 | Codec::Hex => {
            decode_base16(&strip_ascii_whitespace(data)).map(Decoded::Binary)
        }
        Codec::Zlib => {
            let mut out = Vec::new();
            flate2::read::ZlibDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(|e| {
                    Error::decode_failed(e.to_string()).with_operation("codecs::zlib")
                })?;
            Ok(Decoded::Binary(out))
        }
    }
}

fn handler(errors: Option<&str>) -> Result<ErrorHandler> {
    ErrorHandler::by_name(errors).ok_or_else(|| {
        Error::decode_failed(format!(
            "unknown error handler '{}'",
            errors.unwrap_or_default()
        ))
        .with_operation("codecs::handler")
    })
}

fn decode_utf8(data: &[u8], handler: ErrorHandler) -> Result<String> {
    let mut out = String::new();
    let mut rest = data;
    loop {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                out.push_str(valid);
                return Ok(out);
            }
            Err(err) => {
                let (valid, after) = rest.split_at(err.valid_up_to());
                out.push_str(std::str::from_utf8(valid).expect("validated prefix"));
                match handler {
                    ErrorHandler::Strict => {
                        return Err(Error::decode_failed("invalid utf-8 sequence")
                            .with_operation("codecs::utf8"));
                    }
                    ErrorHandler::Replace => out.push('\u{FFFD}'),
                    ErrorHandler::Ignore => {}
                }
                let skip = err.error_len().unwrap_or(after.len());
                rest = &after[skip..];
            }
        }
    }
}

fn decode_utf16(data: &[u8], handler: ErrorHandler) -> Result<String> {
    // BOM selects the byte order; without one, little-endian is assumed.
    let (encoding, payload) = match data {
        [0xFF, 0xFE, rest @ ..] => (encoding_rs::UTF_16LE, rest),
        [0xFE, 0xFF, rest @ ..] => (encoding_rs::UTF_16BE, rest),
        _ => (encoding_rs::UTF_16LE, data),
    };
    let (text, malformed) = encoding.decode_without_bom_handling(payload);
    match handler {
        ErrorHandler::Strict if malformed => {
            Err(Error::decode_failed("invalid utf-16 payload").with_operation("codecs::utf16"))
        }
        ErrorHandler::Ignore => Ok(text.chars().filter(|c| *c != '\u{FFFD}').collect()),
        _ => Ok(text.into_owned()),
    }
}

fn decode_ascii(data: &[u8], handler: ErrorHandler) -> Result<String> {
    let mut out = String::with_capacity(data.len());
    for &byte in data {
        if byte < 0x80 {
            out.push(byte as char);
        } else {
            match handler {
                ErrorHandler::Strict => {
                    return Err(Error::decode_failed(format!(
                        "byte 0x{byte:02x} is not ascii"
                    ))
                    .with_operation("codecs::ascii"));
                }
                ErrorHandler::Replace => out.push('\u{FFFD}'),
                ErrorHandler::Ignore => {}
            }
        }
    }
    Ok(out)
}

fn rot13(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'a'..='z' => (((c as u8 - b'a' + 13) % 26) + b'a') as char,
            'A'..='Z' => (((c as u8 - b'A' + 13) % 26) + b'A') as char,
            other => other,
        })
        .collect()
}

fn strip_ascii_whitespace(data: &[u8]) -> Vec<u8> {
    data.iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect()
}

/// RFC 4648 base32, case-insensitive, padding required to a 8-char quantum.
fn decode_base32(data: &[u8]) -> Result<Vec<u8>> {
    fn value(byte: u8) -> Result<u32> {
        match byte {
            b'A'..=b'Z' => Ok((byte - b'A') as u32),
            b'a'..=b'z' => Ok((byte - b'a') as u32),
            b'2'..=b'7' => Ok((byte - b'2' + 26) as u32),
            _ => Err(Error::decode_failed(format!(
                "invalid base32 byte 0x{byte:02x}"
            ))
            .with_operation("codecs::base32")),
        }
    }

    if data.len() % 8 != 0 {
        return Err(
            Error::decode_failed("base32 payload is not padded to 8 characters")
                .with_operation("codecs::base32"),
        );
    }
    let trimmed_len = data.iter().take_while(|&&b| b != b'=').count();
    if data[trimmed_len..].iter().any(|&b| b != b'=') {
        return Err(Error::decode_failed("base32 padding in the middle of payload")
            .with_operation("codecs::base32"));
    }

    let mut out = Vec::new();
    let mut buffer: u64 = 0;
    let mut bits = 0u32;
    for &byte in &data[..trimmed_len] {
        buffer = (buffer << 5) | u64::from(value(byte)?);
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
        }
    }
    Ok(out)
}

fn decode_base16(data: &[u8]) -> Result<Vec<u8>> {
    fn value(byte: u8) -> Result<u8> {
        match byte {
            b'0'..=b'9' => Ok(byte - b'0'),
            b'a'..=b'f' => Ok(byte - b'a' + 10),
            b'A'..=b'F' => Ok(byte - b'A' + 10),
            _ => Err(
                Error::decode_failed(format!("invalid hex byte 0x{byte:02x}"))
                    .with_operation("codecs::base16"),
            ),
        }
    }

    if data.len() % 2 != 0 {
        return Err(Error::decode_failed("odd-length hex payload")
            .with_operation("codecs::base16"));
    }
    data.chunks_exact(2)
        .map(|pair| Ok((value(pair[0])? << 4) | value(pair[1])?))
        .collect()
}
