//! UTF-8 decoding across chunk boundaries

/// Decodes byte chunks, holding back a trailing partial character until the
/// rest of it arrives. Invalid sequences decode to U+FFFD.
#[derive(Debug, Default)]
pub(crate) struct Utf8Carry {
    pending: Vec<u8>,
}

impl Utf8Carry {
    pub(crate) fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::with_capacity(self.pending.len());
        let mut consumed = 0;

        loop {
            let rest = &self.pending[consumed..];
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    consumed = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid_len = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&rest[..valid_len]));
                    match e.error_len() {
                        Some(bad_len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            consumed += valid_len + bad_len;
                        }
                        None => {
                            // Incomplete sequence at the end: wait for more bytes
                            consumed += valid_len;
                            break;
                        }
                    }
                }
            }
        }

        self.pending.drain(..consumed);
        out
    }

    /// Flush at end of stream; a dangling partial character becomes U+FFFD
    pub(crate) fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_multibyte_character() {
        let text = "µ→✓";
        let bytes = text.as_bytes();
        for cut in 0..=bytes.len() {
            let mut carry = Utf8Carry::default();
            let mut out = carry.decode(&bytes[..cut]);
            out.push_str(&carry.decode(&bytes[cut..]));
            out.push_str(&carry.finish());
            assert_eq!(out, text, "cut at {}", cut);
        }
    }

    #[test]
    fn test_invalid_bytes_are_replaced() {
        let mut carry = Utf8Carry::default();
        let out = carry.decode(b"a\xffb");
        assert_eq!(out, "a\u{FFFD}b");
    }

    #[test]
    fn test_dangling_prefix_at_end() {
        let mut carry = Utf8Carry::default();
        assert_eq!(carry.decode(&[b'x', 0xE2, 0x86]), "x");
        assert_eq!(carry.finish(), "\u{FFFD}");
        assert_eq!(carry.finish(), "");
    }
}
