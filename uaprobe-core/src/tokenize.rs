//! ## uaprobe-core::tokenize
//! **The one tokenization rule shared by the loader and the matcher**
//!
//! A User-Agent is split on ASCII separator characters into non-empty tokens.
//! Splitting on ASCII only keeps every token on a UTF-8 char boundary, so any
//! `&str` input is safe, however malformed its content.

/// Characters that delimit tokens.
pub const SEPARATORS: &[char] = &[' ', '\t', '\r', '\n', '(', ')', '[', ']', ';', ',', '/', '"'];

/// Iterator over the tokens of a User-Agent string.
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    inner: std::str::Split<'a, &'static [char]>,
}

impl<'a> Iterator for Tokens<'a> {
    type Item = &'a str;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.by_ref().find(|t| !t.is_empty())
    }
}

/// Splits `input` into tokens. Callers bound the count with `take`.
#[inline]
pub fn tokenize(input: &str) -> Tokens<'_> {
    Tokens {
        inner: input.split(SEPARATORS),
    }
}

/// Returns the longest prefix of `input` no longer than `max_len` bytes that
/// ends on a char boundary.
pub fn truncate_to_boundary(input: &str, max_len: usize) -> &str {
    if input.len() <= max_len {
        return input;
    }
    let mut end = max_len;
    while !input.is_char_boundary(end) {
        end -= 1;
    }
    &input[..end]
}

/// True when the token carries at least one ASCII digit.
#[inline]
pub fn has_digit(token: &str) -> bool {
    token.bytes().any(|b| b.is_ascii_digit())
}

/// True when `a` and `b` differ only in their digits, e.g. `120.0.6099`
/// against `119.0.6045`. Both must contain a digit.
pub fn same_shape(a: &str, b: &str) -> bool {
    if !has_digit(a) || !has_digit(b) {
        return false;
    }
    shape(a).eq(shape(b))
}

/// Token bytes with every run of digits collapsed to a single `#`.
fn shape(token: &str) -> impl Iterator<Item = u8> + '_ {
    let bytes = token.as_bytes();
    bytes.iter().enumerate().filter_map(move |(i, &b)| {
        if !b.is_ascii_digit() {
            Some(b)
        } else if i > 0 && bytes[i - 1].is_ascii_digit() {
            None
        } else {
            Some(b'#')
        }
    })
}
