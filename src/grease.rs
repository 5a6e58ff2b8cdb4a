/// Canonical value every GREASE placeholder is folded into.
pub const GREASE_PLACEHOLDER: u16 = 0x0a0a;

/// Check if a value is a GREASE value according to RFC 8701.
///
/// Both bytes must have `0xA` as low nibble and share the same high nibble:
/// 0x0A0A, 0x1A1A, ..., 0xFAFA.
#[inline]
#[must_use]
pub fn is_grease(value: u16) -> bool {
    (value & 0x0f0f) == 0x0a0a && ((value & 0xf000) >> 8) == (value & 0x00f0)
}

/// Fold a GREASE value into [`GREASE_PLACEHOLDER`], leave anything else untouched.
#[inline]
#[must_use]
pub fn normalize(value: u16) -> u16 {
    if is_grease(value) {
        GREASE_PLACEHOLDER
    } else {
        value
    }
}

/// Read `bytes` as big-endian u16 values, normalize each one and flatten back to bytes.
///
/// A trailing odd byte does not form a value and is dropped.
#[must_use]
pub fn normalize_u16_bytes(bytes: &[u8]) -> Vec<u8> {
    bytes
        .chunks_exact(2)
        .flat_map(|pair| normalize(u16::from_be_bytes([pair[0], pair[1]])).to_be_bytes())
        .collect()
}

/// Flatten u16 values to big-endian bytes, normalizing GREASE on the way.
#[must_use]
pub fn normalize_u16_values(values: &[u16]) -> Vec<u8> {
    values.iter().flat_map(|&value| normalize(value).to_be_bytes()).collect()
}
