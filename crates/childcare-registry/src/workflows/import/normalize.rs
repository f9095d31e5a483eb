use chrono::NaiveDate;

/// Phone number in the two forms the registry stores and matches on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedPhone {
    /// Digits exactly as typed, punctuation stripped (`"29 11-22 33"` →
    /// `"29112233"`). This is what gets stored on a parent record.
    pub local_digits: Option<String>,
    /// Full international form (`"+37129112233"`). Its digits are the
    /// identity-key space, so a bare local number and its E.164 twin collide.
    pub e164: Option<String>,
}

impl NormalizedPhone {
    /// Key-space digits: the E.164 form without the plus.
    pub fn key_digits(&self) -> Option<&str> {
        self.e164.as_deref().map(|e| e.trim_start_matches('+'))
    }
}

/// Normalize free-text phone input. Strips everything but digits (keeping a
/// leading `+`); bare numbers of at least 8 digits get the default country
/// code prepended unless they already carry it. Shorter or empty input yields
/// `None` on both forms — never an error.
pub fn normalize_phone(raw: &str, default_cc: &str) -> NormalizedPhone {
    let trimmed = raw.trim();
    let has_plus = trimmed.starts_with('+');
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return NormalizedPhone::default();
    }

    if has_plus {
        return NormalizedPhone {
            local_digits: Some(digits.clone()),
            e164: Some(format!("+{digits}")),
        };
    }

    if digits.len() < 8 {
        return NormalizedPhone::default();
    }

    let e164 = if digits.len() > 8 && digits.starts_with(default_cc) {
        format!("+{digits}")
    } else {
        format!("+{default_cc}{digits}")
    };
    NormalizedPhone {
        local_digits: Some(digits),
        e164: Some(e164),
    }
}

/// Flexible date parse: `YYYY[.-/]M[.-/]D`, then `D[.-/]M[.-/]YYYY`, then a
/// generic ISO parse. Returns `None` on anything unparseable — callers treat
/// that as "unknown", not as an error.
pub fn parse_date_flexible(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    if let Some(date) = parse_separated(value) {
        return Some(date);
    }
    value.parse::<NaiveDate>().ok()
}

fn parse_separated(value: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = value.split(['.', '-', '/']).collect();
    if parts.len() != 3 {
        return None;
    }
    let numbers: Vec<u32> = parts
        .iter()
        .map(|part| part.parse::<u32>().ok())
        .collect::<Option<Vec<u32>>>()?;

    let (year, month, day) = if parts[0].len() == 4 {
        (numbers[0], numbers[1], numbers[2])
    } else if parts[2].len() == 4 {
        (numbers[2], numbers[1], numbers[0])
    } else {
        return None;
    };

    NaiveDate::from_ymd_opt(year as i32, month, day)
}

/// ISO `YYYY-MM-DD` rendering used everywhere a date is persisted.
pub fn format_iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Trimmed text, `None` when nothing is left.
pub fn clean(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// National personal code shape: six digits, a dash, five digits.
pub fn is_valid_personal_code(raw: &str) -> bool {
    let code = raw.trim().as_bytes();
    code.len() == 12
        && code[..6].iter().all(u8::is_ascii_digit)
        && code[6] == b'-'
        && code[7..].iter().all(u8::is_ascii_digit)
}
