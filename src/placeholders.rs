//! Locate positional `?` parameter markers in SQL text.
//!
//! Markers inside quoted strings, quoted identifiers, comments and
//! dollar-quoted bodies do not count. A `$` that continues an identifier
//! (`a$b$c`) is part of the name, not a quote opener.

/// Byte offsets of every `?` marker outside literals and comments, in order.
#[must_use]
pub fn placeholder_positions(sql: &str) -> Vec<usize> {
    let bytes = sql.as_bytes();
    let mut positions = Vec::new();
    let mut idx = 0;

    while idx < bytes.len() {
        idx = match bytes[idx] {
            b'?' => {
                positions.push(idx);
                idx + 1
            }
            quote @ (b'\'' | b'"') => skip_quoted(bytes, idx, quote),
            b'-' if bytes.get(idx + 1) == Some(&b'-') => skip_line_comment(bytes, idx),
            b'/' if bytes.get(idx + 1) == Some(&b'*') => skip_block_comment(bytes, idx),
            b'$' if !continues_identifier(bytes, idx) => match dollar_opener(bytes, idx) {
                Some(opener) => skip_dollar_body(bytes, idx + opener.len(), opener),
                None => idx + 1,
            },
            _ => idx + 1,
        };
    }

    positions
}

/// Number of positional markers in `sql`.
#[must_use]
pub fn count_placeholders(sql: &str) -> usize {
    placeholder_positions(sql).len()
}

fn is_identifier_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || !b.is_ascii()
}

fn continues_identifier(bytes: &[u8], idx: usize) -> bool {
    idx > 0 && is_identifier_byte(bytes[idx - 1])
}

/// Index just past the closing quote; a doubled quote is an escape.
fn skip_quoted(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut idx = start + 1;
    while idx < bytes.len() {
        if bytes[idx] == quote {
            if bytes.get(idx + 1) != Some(&quote) {
                return idx + 1;
            }
            idx += 1;
        }
        idx += 1;
    }
    bytes.len()
}

fn skip_line_comment(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |offset| start + offset + 1)
}

/// Block comments nest.
fn skip_block_comment(bytes: &[u8], start: usize) -> usize {
    let mut depth = 0_u32;
    let mut idx = start;
    while idx + 1 < bytes.len() {
        match (bytes[idx], bytes[idx + 1]) {
            (b'/', b'*') => {
                depth += 1;
                idx += 2;
            }
            (b'*', b'/') => {
                depth -= 1;
                idx += 2;
                if depth == 0 {
                    return idx;
                }
            }
            _ => idx += 1,
        }
    }
    bytes.len()
}

/// The `$tag$` opener starting at `start`, dollars included. Tags are
/// identifier characters and may not begin with a digit, so `$1` is not one.
fn dollar_opener(bytes: &[u8], start: usize) -> Option<&[u8]> {
    let close = start + 1 + bytes[start + 1..].iter().position(|&b| b == b'$')?;
    let tag = &bytes[start + 1..close];
    let valid = tag.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'_')
        && !tag.first().is_some_and(u8::is_ascii_digit);
    valid.then(|| &bytes[start..=close])
}

fn skip_dollar_body(bytes: &[u8], body: usize, opener: &[u8]) -> usize {
    bytes[body..]
        .windows(opener.len())
        .position(|window| window == opener)
        .map_or(bytes.len(), |offset| body + offset + opener.len())
}
