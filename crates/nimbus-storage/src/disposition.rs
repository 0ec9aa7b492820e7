//! `Content-Disposition` values for downloads.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// RFC 5987 `attr-char` minus the alphanumerics.
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// Build an `attachment` disposition for a display name.
///
/// The quoted `filename` is an ASCII rendition with `\` and `"` escaped and
/// control characters dropped; `filename*` carries the exact UTF-8 name.
pub fn attachment(filename: &str) -> String {
    let mut quoted = String::with_capacity(filename.len());
    for ch in filename.chars() {
        match ch {
            '"' | '\\' => {
                quoted.push('\\');
                quoted.push(ch);
            }
            c if c.is_control() => {}
            c if c.is_ascii() => quoted.push(c),
            _ => quoted.push('_'),
        }
    }
    if quoted.trim().is_empty() {
        quoted = "download".to_string();
    }

    let clean: String = filename.chars().filter(|c| !c.is_control()).collect();
    format!(
        "attachment; filename=\"{quoted}\"; filename*=UTF-8''{}",
        utf8_percent_encode(&clean, ATTR_CHAR)
    )
}
