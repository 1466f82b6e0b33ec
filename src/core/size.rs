/*!
 * Payload size measurement and human-readable byte counts
 */

/// Unit suffixes, one per power of 1024. An i64 byte count tops out in EB.
const UNITS: [&str; 7] = ["B", "KB", "MB", "GB", "TB", "PB", "EB"];

/// Size of `text` as stored by the platform: two bytes per UTF-16 code unit.
///
/// Characters outside the Basic Multilingual Plane count as a surrogate pair
/// (four bytes); this is intentionally not the UTF-8 length.
pub fn utf16_byte_len(text: &str) -> u64 {
    text.encode_utf16().count() as u64 * 2
}

/// Format a byte count as `<value><unit>`, e.g. `1.5KB`, `-2KB`, `0B`.
///
/// The unit is the largest power of 1024 not exceeding `|bytes|`, the scaled
/// value is rounded to one decimal place (ties to even) and printed without
/// trailing zeros. The sign of the input is preserved.
///
/// Unit selection compares integers rather than taking `log1024`, so exact
/// powers of 1024 never land one unit too low.
pub fn bytes_to_string(bytes: i64) -> String {
    if bytes == 0 {
        return format!("0{}", UNITS[0]);
    }

    let magnitude = bytes.unsigned_abs();
    let mut place = 0usize;
    while place + 1 < UNITS.len() && magnitude >= 1u64 << (10 * (place + 1)) {
        place += 1;
    }

    let scaled = magnitude as f64 / (1u64 << (10 * place)) as f64;
    let rounded = (scaled * 10.0).round_ties_even() / 10.0;
    let signed = if bytes < 0 { -rounded } else { rounded };

    format!("{}{}", signed, UNITS[place])
}
