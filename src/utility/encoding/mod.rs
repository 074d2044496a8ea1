// procflow: Async Process Orchestration
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Text decoding and line splitting for captured process output.
//!
//! ```text
//! captured bytes --(Encoding::decode)--> UTF-8 text
//! live chunks    --(LineBuffer::push)--> complete lines + held partial tail
//! ```
//!
//! Uses `encoding_rs`. Invalid sequences → U+FFFD.

use encoding_rs::{IBM866, WINDOWS_1252};
use std::borrow::Cow;

/// Text encodings accepted by the result formatters.
///
/// `Other` carries any encoding `encoding_rs` knows by its WHATWG label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// UTF-8, the platform text default.
    #[default]
    Utf8,
    /// UTF-16 Little Endian.
    Utf16Le,
    /// Windows-1252 (Windows "ANSI" code page).
    Windows1252,
    /// IBM866 (Windows OEM code page).
    Ibm866,
    /// Any other label-addressable encoding.
    Other(&'static encoding_rs::Encoding),
}

impl Encoding {
    /// Looks an encoding up by label (`"utf-8"`, `"latin1"`, `"shift_jis"`, ...).
    #[must_use]
    pub fn for_label(label: &str) -> Option<Self> {
        let found = encoding_rs::Encoding::for_label(label.trim().as_bytes())?;
        Some(if found == encoding_rs::UTF_8 {
            Self::Utf8
        } else if found == encoding_rs::UTF_16LE {
            Self::Utf16Le
        } else if found == WINDOWS_1252 {
            Self::Windows1252
        } else if found == IBM866 {
            Self::Ibm866
        } else {
            Self::Other(found)
        })
    }

    /// Returns the canonical name of the encoding.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Utf16Le => "UTF-16LE",
            Self::Windows1252 => WINDOWS_1252.name(),
            Self::Ibm866 => IBM866.name(),
            Self::Other(encoding) => encoding.name(),
        }
    }

    /// Decodes bytes into UTF-8.
    ///
    /// # Example
    /// ```
    /// use procflow::utility::encoding::Encoding;
    ///
    /// let cp1252_bytes = b"caf\xe9"; // "café" in Windows-1252
    /// assert_eq!(Encoding::Windows1252.decode(cp1252_bytes), "café");
    /// ```
    #[must_use]
    pub fn decode(self, bytes: &[u8]) -> Cow<'_, str> {
        match self {
            Self::Utf8 => String::from_utf8_lossy(bytes),
            Self::Utf16Le => utf16_le_to_utf8(bytes),
            Self::Windows1252 => WINDOWS_1252.decode_without_bom_handling(bytes).0,
            Self::Ibm866 => IBM866.decode_without_bom_handling(bytes).0,
            Self::Other(encoding) => encoding.decode_without_bom_handling(bytes).0,
        }
    }
}

/// Converts UTF-16 LE bytes to UTF-8.
fn utf16_le_to_utf8(bytes: &[u8]) -> Cow<'static, str> {
    // Handle odd byte count by ignoring the last byte
    let len = bytes.len() & !1;
    if len == 0 {
        return Cow::Borrowed("");
    }

    let units: Vec<u16> = bytes[..len]
        .chunks_exact(2)
        .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
        .collect();

    Cow::Owned(String::from_utf16_lossy(&units))
}

/// Streaming splitter that turns byte chunks into delimited lines.
///
/// Empty segments between two delimiters are kept; a single empty segment
/// produced by a terminal delimiter is not. With the default `"\n"`
/// delimiter a trailing `'\r'` is stripped from each line.
///
/// # Example
/// ```
/// use procflow::utility::encoding::LineBuffer;
///
/// let mut buffer = LineBuffer::new("\n");
/// buffer.push(b"a\nb\nc\n");
/// let lines: Vec<String> = buffer.drain(true).collect();
/// assert_eq!(lines, vec!["a", "b", "c"]);
/// ```
#[derive(Debug, Clone)]
pub struct LineBuffer {
    delimiter: Vec<u8>,
    encoding: Encoding,
    bytes: Vec<u8>,
    /// Byte offset of the first unconsumed byte
    offset: usize,
}

impl LineBuffer {
    /// Creates a UTF-8 buffer splitting on `delimiter` (`"\n"` if empty).
    #[must_use]
    pub fn new(delimiter: &str) -> Self {
        Self::with_encoding(delimiter, Encoding::Utf8)
    }

    /// Creates a buffer that decodes each line with `encoding`.
    #[must_use]
    pub fn with_encoding(delimiter: &str, encoding: Encoding) -> Self {
        let delimiter = if delimiter.is_empty() { "\n" } else { delimiter };
        Self {
            delimiter: delimiter.as_bytes().to_vec(),
            encoding,
            bytes: Vec::new(),
            offset: 0,
        }
    }

    /// Appends bytes to the buffer.
    pub fn push(&mut self, bytes: &[u8]) {
        // Compact once the consumed prefix dominates the buffer
        if self.offset > 0 && self.offset * 2 >= self.bytes.len() {
            self.bytes.drain(..self.offset);
            self.offset = 0;
        }
        self.bytes.extend_from_slice(bytes);
    }

    /// Returns the complete lines buffered so far.
    ///
    /// When `finished` is true the unterminated tail is returned as a final
    /// line (if non-empty).
    pub fn drain(&mut self, finished: bool) -> impl Iterator<Item = String> + '_ {
        LineIter {
            buffer: self,
            finished,
        }
    }

    fn strips_carriage_return(&self) -> bool {
        self.delimiter == b"\n"
    }

    fn decode_line(&self, line: &[u8]) -> String {
        let line = if self.strips_carriage_return() {
            line.strip_suffix(b"\r").unwrap_or(line)
        } else {
            line
        };
        self.encoding.decode(line).into_owned()
    }
}

/// Iterator over the lines currently held by a [`LineBuffer`].
struct LineIter<'a> {
    buffer: &'a mut LineBuffer,
    finished: bool,
}

impl Iterator for LineIter<'_> {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        let buffer = &mut *self.buffer;
        let start = buffer.offset;
        let rest = &buffer.bytes[start..];
        if rest.is_empty() {
            return None;
        }

        let delimiter_len = buffer.delimiter.len();
        if let Some(pos) = rest
            .windows(delimiter_len)
            .position(|window| window == buffer.delimiter.as_slice())
        {
            buffer.offset = start + pos + delimiter_len;
            return Some(buffer.decode_line(&buffer.bytes[start..start + pos]));
        }

        if self.finished {
            buffer.offset = buffer.bytes.len();
            return Some(buffer.decode_line(&buffer.bytes[start..]));
        }
        None
    }
}

/// Splits complete text into lines on `delimiter`.
#[must_use]
pub fn split_lines(bytes: &[u8], delimiter: &str, encoding: Encoding) -> Vec<String> {
    let mut buffer = LineBuffer::with_encoding(delimiter, encoding);
    buffer.push(bytes);
    buffer.drain(true).collect()
}
