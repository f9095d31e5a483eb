use super::normalize::is_valid_personal_code;

/// Identity key for a parent-like record. Derived from an ordered candidate
/// list, first match wins: personal code, phone digits, email, last name.
/// Two raw records with equal keys describe the same person.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParentKey {
    PersonalCode(String),
    Phone(String),
    Email(String),
    LastName(String),
}

impl ParentKey {
    pub fn derive(
        personal_code: Option<&str>,
        phone_digits: Option<&str>,
        email: Option<&str>,
        last_name: Option<&str>,
    ) -> Option<Self> {
        if let Some(code) = personal_code.map(str::trim).filter(|c| is_valid_personal_code(c)) {
            return Some(Self::PersonalCode(code.to_string()));
        }
        if let Some(digits) = phone_digits.map(str::trim).filter(|d| !d.is_empty()) {
            return Some(Self::Phone(digits.to_string()));
        }
        if let Some(email) = email.map(str::trim).filter(|e| e.contains('@')) {
            return Some(Self::Email(email.to_lowercase()));
        }
        if let Some(last) = last_name.map(str::trim).filter(|l| !l.is_empty()) {
            return Some(Self::LastName(last.to_lowercase()));
        }
        None
    }

    /// Tagged rendering for logs and dry-run output.
    pub fn render(&self) -> String {
        match self {
            Self::PersonalCode(code) => format!("pk:{code}"),
            Self::Phone(digits) => format!("ph:{digits}"),
            Self::Email(email) => format!("em:{email}"),
            Self::LastName(last) => format!("ln:{last}"),
        }
    }
}

/// Identity key for a child-like record: a valid personal code, else a
/// name-and-birthdate fingerprint so two rows describing the same child with
/// blank codes still collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChildKey {
    PersonalCode(String),
    Fingerprint {
        first: String,
        last: String,
        dob: String,
    },
}

impl ChildKey {
    /// `dob` must already be ISO-normalized (or empty when unknown).
    pub fn derive(
        personal_code: Option<&str>,
        first_name: Option<&str>,
        last_name: Option<&str>,
        dob: Option<&str>,
    ) -> Option<Self> {
        if let Some(code) = personal_code.map(str::trim).filter(|c| is_valid_personal_code(c)) {
            return Some(Self::PersonalCode(code.to_string()));
        }

        let first = first_name.map(str::trim).unwrap_or_default().to_lowercase();
        let last = last_name.map(str::trim).unwrap_or_default().to_lowercase();
        let dob = dob.map(str::trim).unwrap_or_default().to_lowercase();
        if first.is_empty() && last.is_empty() && dob.is_empty() {
            return None;
        }
        Some(Self::Fingerprint { first, last, dob })
    }

    /// The stored `fingerprint` field value, shared with the schema migration.
    pub fn fingerprint_value(&self) -> Option<String> {
        match self {
            Self::PersonalCode(_) => None,
            Self::Fingerprint { first, last, dob } => Some(fingerprint(first, last, dob)),
        }
    }

    pub fn render(&self) -> String {
        match self {
            Self::PersonalCode(code) => format!("cpk:{code}"),
            Self::Fingerprint { first, last, dob } => format!("c:{}", fingerprint(first, last, dob)),
        }
    }
}

/// Canonical fingerprint text: lower-cased components joined by `|`.
pub fn fingerprint(first: &str, last: &str, dob: &str) -> String {
    format!(
        "{}|{}|{}",
        first.trim().to_lowercase(),
        last.trim().to_lowercase(),
        dob.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_key_prefers_personal_code() {
        let key = ParentKey::derive(
            Some("120199-12345"),
            Some("37129112233"),
            Some("a@b.lv"),
            Some("Liepa"),
        );
        assert_eq!(key, Some(ParentKey::PersonalCode("120199-12345".to_string())));
    }

    #[test]
    fn parent_key_falls_through_the_candidate_order() {
        let key = ParentKey::derive(Some("not-a-code"), Some("37129112233"), None, Some("Liepa"));
        assert_eq!(key, Some(ParentKey::Phone("37129112233".to_string())));

        let key = ParentKey::derive(None, None, Some("Anna.Liepa@Example.LV"), Some("Liepa"));
        assert_eq!(
            key,
            Some(ParentKey::Email("anna.liepa@example.lv".to_string()))
        );

        let key = ParentKey::derive(None, None, Some("no-at-sign"), Some("Liepa"));
        assert_eq!(key, Some(ParentKey::LastName("liepa".to_string())));
    }

    #[test]
    fn parent_key_absent_when_nothing_usable() {
        assert_eq!(ParentKey::derive(None, None, None, None), None);
        assert_eq!(ParentKey::derive(Some(""), Some(""), Some(""), Some(" ")), None);
    }

    #[test]
    fn child_key_uses_personal_code_when_valid() {
        let key = ChildKey::derive(Some("120199-12345"), Some("Anna"), Some("Liepa"), None);
        assert_eq!(key, Some(ChildKey::PersonalCode("120199-12345".to_string())));
    }

    #[test]
    fn blank_codes_collide_on_identical_name_and_dob() {
        let a = ChildKey::derive(None, Some("Anna"), Some("Liepa"), Some("2019-05-01"));
        let b = ChildKey::derive(Some(""), Some("ANNA"), Some("liepa"), Some("2019-05-01"));
        assert_eq!(a, b);
        assert_eq!(
            a.unwrap().render(),
            "c:anna|liepa|2019-05-01"
        );
    }

    #[test]
    fn child_key_absent_when_every_component_is_blank() {
        assert_eq!(ChildKey::derive(None, None, None, None), None);
        assert_eq!(ChildKey::derive(Some("bad"), Some(" "), Some(""), None), None);
    }
}
