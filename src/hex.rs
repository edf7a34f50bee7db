/// Lowercase hexadecimal encoding of binary data.
pub fn encode(bytes: &[u8]) -> String {
    fn hex_digit(b: u8) -> char {
        match b {
            0..=9 => (b + b'0') as char,
            10..=15 => (b - 10 + b'a') as char,
            _ => unreachable!("bad hex digit"),
        }
    }

    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(hex_digit(b >> 4));
        out.push(hex_digit(b & 0b00001111));
    }
    out
}

/// Whether `s` is made only of lowercase hexadecimal digits.
pub fn is_lower_hex(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[test]
fn test_encode() {
    assert_eq!(encode(b""), "");
    assert_eq!(encode(&[0x00, 0x0f, 0xa5, 0xff]), "000fa5ff");
}

#[test]
fn test_is_lower_hex() {
    assert!(is_lower_hex("0123456789abcdef"));
    assert!(!is_lower_hex("ABCDEF"));
    assert!(!is_lower_hex("xyz"));
}
