use encoding_rs::{UTF_16BE, UTF_16LE, WINDOWS_1257};

/// Decode a legacy export into Unicode text.
///
/// BOM-sniffs UTF-16 LE/BE and UTF-8; without a BOM the bytes are read as
/// UTF-8 and re-decoded under Windows-1257 when mojibake markers show up,
/// since the oldest exports came from Baltic-codepage spreadsheets.
pub(crate) fn decode_legacy(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xFF, 0xFE]) {
        return UTF_16LE.decode_without_bom_handling(&bytes[2..]).0.into_owned();
    }
    if bytes.starts_with(&[0xFE, 0xFF]) {
        return UTF_16BE.decode_without_bom_handling(&bytes[2..]).0.into_owned();
    }
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(&bytes[3..]).into_owned();
    }

    let as_utf8 = String::from_utf8_lossy(bytes);
    if looks_mojibake(&as_utf8) {
        WINDOWS_1257.decode(bytes).0.into_owned()
    } else {
        as_utf8.into_owned()
    }
}

fn looks_mojibake(text: &str) -> bool {
    text.chars()
        .any(|c| matches!(c, '\u{FFFD}' | 'Ã' | 'Â' | 'Ä' | 'Å'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_utf16_le_with_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "Liepa\tĀbele".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_legacy(&bytes), "Liepa\tĀbele");
    }

    #[test]
    fn decodes_utf16_be_with_bom() {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in "Ozols".encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        assert_eq!(decode_legacy(&bytes), "Ozols");
    }

    #[test]
    fn strips_utf8_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("Anna".as_bytes());
        assert_eq!(decode_legacy(&bytes), "Anna");
    }

    #[test]
    fn falls_back_to_windows_1257_on_mojibake() {
        // "Bērziņš" in Windows-1257: ē=0xE7, ņ=0xF2, š=0xF0 are invalid UTF-8
        // lead-ins, so the UTF-8 pass produces replacement characters.
        let bytes = [0x42, 0xE7, 0x72, 0x7A, 0x69, 0xF2, 0xF0];
        assert_eq!(decode_legacy(&bytes), "Bērziņš");
    }

    #[test]
    fn plain_ascii_passes_through() {
        assert_eq!(decode_legacy(b"plain,ascii"), "plain,ascii");
    }
}
