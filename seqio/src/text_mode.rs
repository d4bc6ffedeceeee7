//! Line-ending translation for devices opened with [`OpenMode::TEXT`]
//!
//! Reading strips every `'\r'`. Backends that keep native `"\r\n"` endings
//! on storage use [`restore_carriage_returns`] when writing.
//!
//! [`OpenMode::TEXT`]: crate::OpenMode::TEXT

use std::borrow::Cow;

/// Remove every `'\r'` from `buf` in place, keeping the order of the other
/// bytes. Returns the new length.
pub fn strip_carriage_returns(buf: &mut [u8]) -> usize {
    let Some(first) = buf.iter().position(|&b| b == b'\r') else {
        return buf.len();
    };

    let mut write = first;
    for read in first + 1..buf.len() {
        let b = buf[read];
        if b != b'\r' {
            buf[write] = b;
            write += 1;
        }
    }
    write
}

/// Expand every `"\n"` into `"\r\n"`.
#[must_use]
pub fn restore_carriage_returns(data: &[u8]) -> Cow<'_, [u8]> {
    let newlines = data.iter().filter(|&&b| b == b'\n').count();
    if newlines == 0 {
        return Cow::Borrowed(data);
    }

    let mut out = Vec::with_capacity(data.len() + newlines);
    for &b in data {
        if b == b'\n' {
            out.push(b'\r');
        }
        out.push(b);
    }
    Cow::Owned(out)
}

/// Collapse a `"\r\n"` ending of the first `len` bytes of `line` into
/// `"\n"` and re-terminate. Returns the new length.
///
/// `line` must have room for the terminator at `len`.
pub fn collapse_crlf(line: &mut [u8], len: usize) -> usize {
    if len > 1 && line[len - 1] == b'\n' && line[len - 2] == b'\r' {
        line[len - 2] = b'\n';
        line[len - 1] = 0;
        return len - 1;
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_keeps_order() {
        let mut buf = *b"a\r\nb\r\r\nc";
        let n = strip_carriage_returns(&mut buf);
        assert_eq!(&buf[..n], b"a\nb\nc");
    }

    #[test]
    fn test_strip_without_cr_is_identity() {
        let mut buf = *b"plain\n";
        assert_eq!(strip_carriage_returns(&mut buf), 6);
        assert_eq!(&buf, b"plain\n");
    }

    #[test]
    fn test_restore() {
        assert_eq!(&*restore_carriage_returns(b"a\nb\n"), b"a\r\nb\r\n");
        assert!(matches!(restore_carriage_returns(b"ab"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_collapse_crlf() {
        let mut line = *b"ab\r\n\0";
        assert_eq!(collapse_crlf(&mut line, 4), 3);
        assert_eq!(&line[..4], b"ab\n\0");

        let mut line = *b"ab\n\0";
        assert_eq!(collapse_crlf(&mut line, 3), 3);
    }
}
