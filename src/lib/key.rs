//! Composite keys identifying an entity across every pipeline stage.
//!
//! A [`CompositeKey`] joins an entity's key parts (for pages: namespace and
//! title) with the [`SEPARATOR`] `::`. Every part is escaped before joining so
//! that neither the separator nor the artifact delimiters (tab, newline) can
//! occur inside an encoded part:
//!
//! | byte | encoded as |
//! |------|------------|
//! | `\`  | `\\`       |
//! | `:`  | `\:`       |
//! | tab  | `\t`       |
//! | LF   | `\n`       |
//! | CR   | `\r`       |
//!
//! The encoding is injective, so byte equality of encoded keys is equality of
//! the underlying part tuples, and the encoded string can be used verbatim as
//! the leading column that the sorter orders by.
//!
//! ```
//! use watchcount_lib::key::CompositeKey;
//!
//! let key = CompositeKey::from_parts(["0", "Apple"]);
//! assert_eq!(key.as_str(), "0::Apple");
//!
//! let tricky = CompositeKey::from_parts(["4", "Talk::Page"]);
//! assert_eq!(tricky.as_str(), r"4::Talk\:\:Page");
//! assert_eq!(tricky.parts().unwrap(), vec!["4", "Talk::Page"]);
//! ```

use std::fmt;

/// Separator placed between encoded key parts.
pub const SEPARATOR: &str = "::";

const ESCAPE: char = '\\';

/// An encoded, totally ordered entity key.
///
/// Ordering is byte-wise over the encoded form, which is the order produced by
/// `LC_ALL=C sort` on the leading artifact column.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompositeKey(String);

impl CompositeKey {
    /// Builds a key from its parts, escaping each one.
    pub fn from_parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut encoded = String::new();
        for (i, part) in parts.into_iter().enumerate() {
            if i > 0 {
                encoded.push_str(SEPARATOR);
            }
            escape_into(part.as_ref(), &mut encoded);
        }
        Self(encoded)
    }

    /// Wraps an already-encoded key read back from an artifact.
    ///
    /// No validation happens here; [`CompositeKey::parts`] reports malformed
    /// escapes when the parts are actually needed.
    #[must_use]
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// The encoded form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the key, returning the encoded form.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }

    /// Decodes the key back into its parts.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem when the key holds a dangling
    /// escape or an unknown escape sequence.
    pub fn parts(&self) -> Result<Vec<String>, String> {
        let mut parts = Vec::new();
        let mut current = String::new();
        let mut chars = self.0.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                ESCAPE => {
                    let escaped = match chars.next() {
                        Some('\\') => '\\',
                        Some(':') => ':',
                        Some('t') => '\t',
                        Some('n') => '\n',
                        Some('r') => '\r',
                        Some(other) => {
                            return Err(format!("unknown escape '\\{other}' in key '{}'", self.0));
                        }
                        None => return Err(format!("dangling escape in key '{}'", self.0)),
                    };
                    current.push(escaped);
                }
                ':' if chars.peek() == Some(&':') => {
                    chars.next();
                    parts.push(std::mem::take(&mut current));
                }
                _ => current.push(c),
            }
        }
        parts.push(current);
        Ok(parts)
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CompositeKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Escapes a single field so it contains no tab, newline or separator.
pub fn escape_into(part: &str, out: &mut String) {
    for c in part.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ':' => out.push_str("\\:"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
}

/// Escapes a single field, returning a new string.
#[must_use]
pub fn escape(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    escape_into(part, &mut out);
    out
}

/// Escapes a final output column.
///
/// Only tab, LF and CR are replaced; colons and backslashes are written as-is so
/// titles appear in the output exactly as stored.
#[must_use]
pub fn escape_output_field(field: &str) -> String {
    if !field.contains(['\t', '\n', '\r']) {
        return field.to_string();
    }
    let mut out = String::with_capacity(field.len() + 2);
    for c in field.chars() {
        match c {
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}
