//! Small shared helpers: text decoding and CFI string detection.

use std::borrow::Cow;

/// Decode bytes to a string, handling various encodings.
///
/// Tries UTF-8 first (handles BOM automatically via encoding_rs), then the
/// hint encoding (from `<?xml encoding="..."?>`), then falls back to
/// Windows-1252, which is common in old ebooks.
pub fn decode_text<'a>(bytes: &'a [u8], hint_encoding: Option<&str>) -> Cow<'a, str> {
    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);

    if !malformed {
        return result;
    }

    if let Some(name) = hint_encoding
        && let Some(encoding) = encoding_rs::Encoding::for_label(name.as_bytes())
    {
        let (result, _, _) = encoding.decode(bytes);
        return result;
    }

    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

/// Extract the declared encoding from an XML prolog, if any.
pub fn declared_encoding(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(256)];
    let head = String::from_utf8_lossy(head);
    let decl = head.strip_prefix("\u{feff}").unwrap_or(&head);
    if !decl.starts_with("<?xml") {
        return None;
    }
    let rest = &decl[..decl.find("?>")?];
    let pos = rest.find("encoding=")? + "encoding=".len();
    let rest = &rest[pos..];
    let quote = rest.chars().next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let rest = &rest[1..];
    let end = rest.find(quote)?;
    Some(rest[..end].to_string())
}

/// Whether a navigation target looks like a canonical CFI string.
pub fn is_cfi_string(s: &str) -> bool {
    s.starts_with("epubcfi(") && s.ends_with(')')
}

/// Resolve entity references like `&apos;` `&lt;` and numeric forms.
pub(crate) fn resolve_entity(entity: &str) -> Option<String> {
    let resolved = match entity {
        "apos" => "'",
        "quot" => "\"",
        "lt" => "<",
        "gt" => ">",
        "amp" => "&",
        "nbsp" => "\u{a0}",
        _ => {
            let code = entity.strip_prefix('#')?;
            let value = match code.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse().ok()?,
            };
            return char::from_u32(value).map(String::from);
        }
    };
    Some(resolved.to_string())
}
