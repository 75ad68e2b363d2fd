//! Text dumps of byte literals
//!
//! Some capture logs were saved by printing each raw read, giving one line per
//! read in the form `b'\x11\x00\x01\x00...'`. Lines that are not a complete
//! literal are skipped.

/// True if the dump starts with a byte literal
pub fn is_literal_dump(data: &[u8]) -> bool {
    let trimmed = data.trim_ascii_start();
    trimmed.starts_with(b"b'") || trimmed.starts_with(b"b\"")
}

/// Concatenate the bytes of every parseable literal line
pub fn parse_literal_dump(data: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for (number, line) in data.split(|&b| b == b'\n').enumerate() {
        let line = line.trim_ascii();
        if line.is_empty() {
            continue;
        }
        match parse_literal(line) {
            Some(decoded) => bytes.extend(decoded),
            None => log::debug!("Skipping unparseable dump line {}", number + 1),
        }
    }
    bytes
}

/// Parse a single `b'...'` or `b"..."` literal
pub fn parse_literal(line: &[u8]) -> Option<Vec<u8>> {
    let body = match line {
        [b'b' | b'B', quote @ (b'\'' | b'"'), body @ .., last] if last == quote => body,
        _ => return None,
    };

    let mut out = Vec::with_capacity(body.len());
    let mut i = 0;
    while i < body.len() {
        let c = body[i];
        if c != b'\\' {
            out.push(c);
            i += 1;
            continue;
        }

        let esc = *body.get(i + 1)?;
        i += 2;
        match esc {
            b'x' => {
                let hex = body.get(i..i + 2)?;
                out.push(u8::from_str_radix(std::str::from_utf8(hex).ok()?, 16).ok()?);
                i += 2;
            }
            b'0'..=b'7' => {
                let mut value = u32::from(esc - b'0');
                let mut digits = 1;
                while digits < 3 {
                    match body.get(i) {
                        Some(&d @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(d - b'0');
                            i += 1;
                            digits += 1;
                        }
                        _ => break,
                    }
                }
                out.push(u8::try_from(value).ok()?);
            }
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'a' => out.push(0x07),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0C),
            b'v' => out.push(0x0B),
            b'\\' | b'\'' | b'"' => out.push(esc),
            _ => {
                // Unknown escapes are kept verbatim
                out.push(b'\\');
                out.push(esc);
            }
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_escapes() {
        assert_eq!(
            parse_literal(br"b'\x11\x01\x01\x00\x14\x00\x00\x00'"),
            Some(vec![0x11, 0x01, 0x01, 0x00, 0x14, 0x00, 0x00, 0x00])
        );
    }

    #[test]
    fn test_parse_printable_and_named_escapes() {
        // repr() prints bytes like 0x41 as 'A' and 0x0A as '\n'
        assert_eq!(parse_literal(br"b'A\n\t\\'"), Some(vec![b'A', b'\n', b'\t', b'\\']));
        assert_eq!(parse_literal(br#"b"it's""#), Some(b"it's".to_vec()));
        assert_eq!(parse_literal(br"b'\0\101'"), Some(vec![0x00, 0x41]));
    }

    #[test]
    fn test_rejects_malformed_lines() {
        assert_eq!(parse_literal(b"'no prefix'"), None);
        assert_eq!(parse_literal(br"b'\x1'"), None);
        assert_eq!(parse_literal(b"b'unterminated"), None);
    }

    #[test]
    fn test_dump_skips_bad_lines() {
        let dump = b"b'\\x11\\x00'\r\ngarbage line\n\nb'\\x01\\x00'\n";
        assert!(is_literal_dump(dump));
        assert_eq!(parse_literal_dump(dump), vec![0x11, 0x00, 0x01, 0x00]);
        assert!(!is_literal_dump(&[0x11, 0x00, 0x01]));
    }
}
