use std::collections::HashSet;

use super::identity::{ChildKey, ParentKey};

/// Slug-safe lowering: non-alphanumeric runs collapse to one hyphen, edges
/// trimmed. Unicode letters survive (Latvian names keep their diacritics).
pub fn slug(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.trim().to_lowercase().chars() {
        if c.is_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    out.trim_end_matches('-').to_string()
}

/// ASCII-only slug used for email local parts.
fn ascii_slug(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.trim().to_ascii_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    out.trim_end_matches('-').to_string()
}

fn digits_only(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Deterministic base id for a parent key. Same key, same base id, across
/// runs — re-running the pipeline updates instead of duplicating.
pub fn parent_base_id(key: &ParentKey, first_name: Option<&str>, last_name: Option<&str>) -> String {
    match key {
        ParentKey::PersonalCode(code) => format!("pk-{}", digits_only(code)),
        ParentKey::Phone(digits) => format!("ph-{}", digits_only(digits)),
        ParentKey::Email(email) => {
            let local_part = email.split('@').next().unwrap_or(email);
            format!("em-{}", ascii_slug(local_part))
        }
        ParentKey::LastName(last) => {
            let full = format!(
                "{} {}",
                first_name.unwrap_or_default(),
                last_name.unwrap_or_default()
            );
            let base = slug(&full);
            let base = if base.is_empty() { slug(last) } else { base };
            if base.is_empty() {
                "nm-parent".to_string()
            } else {
                format!("nm-{base}")
            }
        }
    }
}

/// Deterministic base id for a child key.
pub fn child_base_id(key: &ChildKey) -> String {
    match key {
        ChildKey::PersonalCode(code) => format!("cpk-{}", digits_only(code)),
        ChildKey::Fingerprint { first, last, dob } => {
            let mut parts = vec!["nm".to_string()];
            let name = slug(&format!("{first} {last}"));
            if !name.is_empty() {
                parts.push(name);
            }
            let dob_digits = digits_only(dob);
            if !dob_digits.is_empty() {
                parts.push(dob_digits);
            }
            parts.join("-")
        }
    }
}

/// Per-run set of claimed document ids. Collisions between distinct keys get
/// an incrementing numeric suffix, reserved immediately.
#[derive(Debug, Default)]
pub struct IdAllocator {
    used: HashSet<String>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-reserve ids already present in the store, so migration-created
    /// documents never collide with existing ones.
    pub fn reserve(&mut self, id: &str) {
        self.used.insert(id.to_string());
    }

    pub fn claim(&mut self, base: &str) -> String {
        if self.used.insert(base.to_string()) {
            return base.to_string();
        }
        let mut n = 2usize;
        loop {
            let candidate = format!("{base}-{n}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}
