//! Content equality between an installed file and its package original.
//!
//! Binary content compares byte for byte. Text compares line by line,
//! ignoring any region stamped between license markers so that a
//! license-stamped copy still counts as unmodified.

const BINARY_PROBE_LEN: usize = 30;
const BEGIN_LICENSE_MARKER: &str = "begin license text";
const END_LICENSE_MARKER: &str = "end license text";
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// A zero byte among the first 30 bytes marks content as binary.
pub fn is_binary(bytes: &[u8]) -> bool {
    bytes.iter().take(BINARY_PROBE_LEN).any(|b| *b == 0)
}

/// Compare `actual` against `reference`. The reference decides whether the
/// comparison is binary or textual.
pub fn content_equals(actual: &[u8], reference: &[u8]) -> bool {
    if is_binary(reference) {
        return actual == reference;
    }
    let actual = significant_lines(actual);
    let reference = significant_lines(reference);
    actual == reference
}

fn significant_lines(bytes: &[u8]) -> Vec<String> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let text = String::from_utf8_lossy(bytes);

    let mut in_license = false;
    let mut lines = Vec::new();
    for line in split_lines(&text) {
        let lower = line.to_lowercase();
        if lower.contains(END_LICENSE_MARKER) {
            in_license = false;
        } else if lower.contains(BEGIN_LICENSE_MARKER) {
            in_license = true;
        } else if !in_license {
            lines.push(line.to_string());
        }
    }
    lines
}

/// Split on `\r\n`, `\n` or `\r`. A trailing terminator does not produce an
/// extra empty line.
fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(&text[start..i]);
                start = i + 1;
            }
            b'\r' => {
                lines.push(&text[start..i]);
                if bytes.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    if start < bytes.len() {
        lines.push(&text[start..]);
    }
    lines
}
