//! Comment and trailing-comma stripping for JSONC input.
//!
//! devcontainer.json officially allows JSON with Comments, so every parse in
//! this crate goes through [`strip`] first. Stripped regions are replaced
//! with spaces (newlines preserved) so byte offsets in parse errors still
//! point at the original document.

/// Strip `//` line comments, `/* */` block comments, and trailing commas
/// from a JSONC document, leaving valid JSON. String literals are left
/// untouched, including ones containing comment markers.
pub fn strip(input: &str) -> String {
    // Two passes: commas can only be judged "trailing" once comments are
    // out of the way (`"a": 1, // note` ahead of a closing brace).
    let without_comments = strip_comments(input);
    strip_trailing_commas(&without_comments)
}

fn strip_comments(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => i = copy_string(bytes, i, &mut out),
            b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'/' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    out.push(b' ');
                    i += 1;
                }
            }
            b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'*' => {
                i += 2;
                out.extend_from_slice(b"  ");
                while i < bytes.len() {
                    if bytes[i] == b'*' && i + 1 < bytes.len() && bytes[i + 1] == b'/' {
                        out.extend_from_slice(b"  ");
                        i += 2;
                        break;
                    }
                    out.push(if bytes[i] == b'\n' { b'\n' } else { b' ' });
                    i += 1;
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    // Input was valid UTF-8 and only ASCII bytes were replaced with ASCII.
    String::from_utf8(out).expect("strip preserves UTF-8")
}

fn strip_trailing_commas(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => i = copy_string(bytes, i, &mut out),
            b',' => {
                // Trailing iff the next non-whitespace closes the
                // containing object or array.
                let mut j = i + 1;
                while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                if j < bytes.len() && (bytes[j] == b'}' || bytes[j] == b']') {
                    out.push(b' ');
                } else {
                    out.push(b',');
                }
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8(out).expect("strip preserves UTF-8")
}

/// Copy a string literal starting at `bytes[start] == b'"'` verbatim,
/// honoring escapes. Returns the index just past the closing quote.
fn copy_string(bytes: &[u8], start: usize, out: &mut Vec<u8>) -> usize {
    let mut i = start;
    out.push(bytes[i]);
    i += 1;
    while i < bytes.len() {
        out.push(bytes[i]);
        match bytes[i] {
            b'\\' if i + 1 < bytes.len() => {
                out.push(bytes[i + 1]);
                i += 2;
            }
            b'"' => {
                i += 1;
                break;
            }
            _ => i += 1,
        }
    }
    i
}
