// UTF-8 decoding for the lexer. Invalid sequences decode to U+FFFD and
// consume a single byte so that lexing always makes progress.

/// Decode one UTF-8 code point starting at `offset`.
/// Returns (bytes_consumed, code_point). At the end of `string` nothing is
/// consumed and the code point is `None`.
#[inline]
pub fn utf8_next(string: &[u8], offset: usize) -> (u32, Option<char>) {
    if offset >= string.len() {
        return (0, None);
    }

    let b0 = string[offset];

    // Single byte (ASCII)
    if b0 < 0x80 {
        return (1, Some(char::from(b0)));
    }

    // Determine expected length from lead byte
    let (expected_len, mut code_point) = if b0 < 0xC2 {
        return (1, Some(char::REPLACEMENT_CHARACTER));
    } else if b0 < 0xE0 {
        (2, u32::from(b0 & 0x1F))
    } else if b0 < 0xF0 {
        (3, u32::from(b0 & 0x0F))
    } else if b0 < 0xF5 {
        (4, u32::from(b0 & 0x07))
    } else {
        return (1, Some(char::REPLACEMENT_CHARACTER));
    };

    if string.len() - offset < expected_len {
        return (1, Some(char::REPLACEMENT_CHARACTER));
    }

    for &b in &string[offset + 1..offset + expected_len] {
        if (b & 0xC0) != 0x80 {
            return (1, Some(char::REPLACEMENT_CHARACTER));
        }
        code_point = (code_point << 6) | u32::from(b & 0x3F);
    }

    // Overlong encodings and surrogates
    let valid = match expected_len {
        2 => code_point >= 0x80,
        3 => code_point >= 0x800,
        4 => (0x10000..=0x10FFFF).contains(&code_point),
        _ => false,
    };

    match char::from_u32(code_point) {
        Some(c) if valid => (expected_len as u32, Some(c)),
        _ => (1, Some(char::REPLACEMENT_CHARACTER)),
    }
}

#[cfg(test)]
mod tests {
    use super::utf8_next;

    #[test]
    fn decodes_multibyte_sequences() {
        let text = "aé€😀".as_bytes();
        assert_eq!(utf8_next(text, 0), (1, Some('a')));
        assert_eq!(utf8_next(text, 1), (2, Some('é')));
        assert_eq!(utf8_next(text, 3), (3, Some('€')));
        assert_eq!(utf8_next(text, 6), (4, Some('😀')));
        assert_eq!(utf8_next(text, 10), (0, None));
    }

    #[test]
    fn invalid_bytes_consume_one_byte() {
        assert_eq!(utf8_next(&[0xFF, b'a'], 0), (1, Some('\u{FFFD}')));
        assert_eq!(utf8_next(&[0xE2, 0x82], 0), (1, Some('\u{FFFD}')));
        assert_eq!(utf8_next(&[0xED, 0xA0, 0x80], 0), (1, Some('\u{FFFD}')));
    }
}
