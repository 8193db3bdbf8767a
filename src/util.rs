//! Input decoding helpers.

use std::borrow::Cow;

/// Decode an exported `ezxmltext` field (a file or stdin) to a string.
///
/// Exports are UTF-8 unless their XML declaration names another encoding.
/// Older installations stored Latin-1 text without saying so, so bytes that
/// are neither valid UTF-8 nor declared are read as Windows-1252.
pub fn decode_xml(bytes: &[u8]) -> Cow<'_, str> {
    let (text, _, malformed) = encoding_rs::UTF_8.decode(bytes);
    if !malformed {
        return text;
    }

    let encoding = declared_encoding(bytes)
        .and_then(|label| encoding_rs::Encoding::for_label(label.as_bytes()))
        .unwrap_or(encoding_rs::WINDOWS_1252);
    let (text, _, _) = encoding.decode(bytes);
    text
}

/// The `encoding` pseudo-attribute of a leading `<?xml ...?>` declaration.
/// Whitespace around `=` is allowed, as in XML itself.
fn declared_encoding(bytes: &[u8]) -> Option<&str> {
    let start = bytes.windows(5).take(64).position(|w| w == b"<?xml")?;
    let decl = &bytes[start..];
    let decl = &decl[..decl.windows(2).position(|w| w == b"?>")?];

    let name_at = decl.windows(8).position(|w| w == b"encoding")?;
    let rest = trim_start(&decl[name_at + 8..]);
    let rest = trim_start(rest.strip_prefix(b"=")?);

    let (&quote, value) = rest.split_first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let end = value.iter().position(|&b| b == quote)?;
    std::str::from_utf8(&value[..end]).ok()
}

fn trim_start(bytes: &[u8]) -> &[u8] {
    let skip = bytes.iter().take_while(|b| b.is_ascii_whitespace()).count();
    &bytes[skip..]
}
