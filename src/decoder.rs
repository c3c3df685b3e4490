//! Incremental decoder for JSON string literals.

use crate::error::{Error, Result};

const HIGH_SURROGATES: std::ops::RangeInclusive<u32> = 0xD800..=0xDBFF;
const LOW_SURROGATES: std::ops::RangeInclusive<u32> = 0xDC00..=0xDFFF;

/// Decodes a JSON string literal one character at a time, resolving
/// `\`-escapes and `\uXXXX` sequences including surrogate pairs.
///
/// The decoder is fed everything between the quotes; the caller detects the
/// closing quote with [`StringDecoder::is_terminating_quote`] before pushing.
#[derive(Debug, Default)]
pub struct StringDecoder {
    buffer: String,
    pending_escape: bool,
    parsing_unicode: bool,
    unicode_buffer: String,
    high_surrogate: Option<u32>,
}

impl StringDecoder {
    /// Creates an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes one character of the literal.
    ///
    /// Returns `Ok(Some(decoded))` when a decoded character landed in the
    /// buffer, `Ok(None)` while an escape sequence is still in flight.
    ///
    /// # Errors
    ///
    /// [`Error::StreamParse`] on a non-hex digit inside a `\u` sequence, on
    /// a high surrogate that is not followed by a low surrogate, and on a
    /// lone low surrogate.
    pub fn push(&mut self, ch: char) -> Result<Option<char>> {
        if self.parsing_unicode {
            return self.push_unicode(ch);
        }

        if self.pending_escape {
            self.pending_escape = false;
            if ch == 'u' {
                self.parsing_unicode = true;
                self.unicode_buffer.clear();
                return Ok(None);
            }
            let decoded = unescape(ch);
            self.buffer.push(decoded);
            return Ok(Some(decoded));
        }

        if ch == '\\' {
            self.pending_escape = true;
            return Ok(None);
        }
        self.buffer.push(ch);
        Ok(Some(ch))
    }

    fn push_unicode(&mut self, ch: char) -> Result<Option<char>> {
        if !ch.is_ascii_hexdigit() {
            return Err(Error::StreamParse {
                code_unit: ch as u32,
                context: "expected a hex digit in \\u escape",
            });
        }
        self.unicode_buffer.push(ch);
        if self.unicode_buffer.len() < 4 {
            return Ok(None);
        }

        let code_unit =
            u32::from_str_radix(&self.unicode_buffer, 16).map_err(|_| Error::StreamParse {
                code_unit: 0,
                context: "malformed \\u escape",
            })?;
        self.parsing_unicode = false;
        self.unicode_buffer.clear();

        if let Some(high) = self.high_surrogate.take() {
            if !LOW_SURROGATES.contains(&code_unit) {
                return Err(Error::StreamParse {
                    code_unit,
                    context: "expected a low surrogate after a high surrogate",
                });
            }
            let combined = 0x10000 + ((high - 0xD800) << 10) + (code_unit - 0xDC00);
            let decoded = char::from_u32(combined).ok_or(Error::StreamParse {
                code_unit: combined,
                context: "surrogate pair is not a unicode scalar value",
            })?;
            self.buffer.push(decoded);
            return Ok(Some(decoded));
        }

        if HIGH_SURROGATES.contains(&code_unit) {
            // Wait for the paired \uXXXX before emitting anything.
            self.high_surrogate = Some(code_unit);
            return Ok(None);
        }
        let decoded = char::from_u32(code_unit).ok_or(Error::StreamParse {
            code_unit,
            context: "low surrogate without a preceding high surrogate",
        })?;
        self.buffer.push(decoded);
        Ok(Some(decoded))
    }

    /// Whether `ch` would terminate the literal here.
    ///
    /// Always false while an escape or `\u` sequence is in flight.
    #[must_use]
    pub fn is_terminating_quote(&self, ch: char) -> bool {
        !self.pending_escape && !self.parsing_unicode && ch == '"'
    }

    /// The decoded characters accumulated so far.
    #[must_use]
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Moves the accumulated buffer out and resets the decoder.
    pub fn take_buffer(&mut self) -> String {
        let buffer = std::mem::take(&mut self.buffer);
        self.reset();
        buffer
    }

    /// Clears the buffer and all escape state.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.pending_escape = false;
        self.parsing_unicode = false;
        self.unicode_buffer.clear();
        self.high_surrogate = None;
    }
}

fn unescape(ch: char) -> char {
    match ch {
        'b' => '\u{0008}',
        'f' => '\u{000C}',
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        // '"', '\\' and '/' map to themselves; anything else falls back to
        // the literal character.
        other => other,
    }
}
