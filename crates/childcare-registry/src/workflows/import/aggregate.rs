use std::collections::{BTreeSet, HashMap};

use serde_json::Value;

use crate::domain::{ChildEntity, ChildStatus, ParentEntity};
use crate::store::Document;

use super::docid::{child_base_id, parent_base_id, IdAllocator};
use super::identity::{ChildKey, ParentKey};
use super::normalize::{clean, format_iso, normalize_phone, parse_date_flexible, NormalizedPhone};
use super::parser::{RawParent, RawRecord};

/// Groups raw records by identity key and merges each group into one
/// canonical entity. Aggregation is a pure fold over the record sequence;
/// fields only ever move from empty to populated (fill-only), and a child's
/// `parentIds` set grows with every linked parent encountered.
pub struct DedupAggregator {
    default_cc: String,
    parents: HashMap<ParentKey, ParentDraft>,
    children: HashMap<ChildKey, ChildDraft>,
    parent_order: Vec<ParentKey>,
    child_order: Vec<ChildKey>,
    parent_ids: IdAllocator,
    child_ids: IdAllocator,
    rows: usize,
}

/// Canonical parent plus its claimed document id.
#[derive(Debug, Clone)]
pub struct ParentDraft {
    pub doc_id: String,
    pub entity: ParentEntity,
}

/// Canonical child plus its reference relations.
#[derive(Debug, Clone)]
pub struct ChildDraft {
    pub doc_id: String,
    pub entity: ChildEntity,
    pub parent_ids: BTreeSet<String>,
    /// Display-only convenience copy of linked parent names.
    pub parent_names: BTreeSet<String>,
}

impl DedupAggregator {
    pub fn new(default_cc: &str) -> Self {
        Self {
            default_cc: default_cc.to_string(),
            parents: HashMap::new(),
            children: HashMap::new(),
            parent_order: Vec::new(),
            child_order: Vec::new(),
            parent_ids: IdAllocator::new(),
            child_ids: IdAllocator::new(),
            rows: 0,
        }
    }

    /// Fold one raw record into the canonical maps. `now` is the timestamp
    /// stamped on entities created by this run.
    pub fn absorb(&mut self, record: &RawRecord, now: &str) {
        self.rows += 1;

        let dob_iso = record
            .child
            .dob
            .as_deref()
            .and_then(parse_date_flexible)
            .map(format_iso);
        let start_iso = record
            .start_date
            .as_deref()
            .and_then(parse_date_flexible)
            .map(format_iso);

        let child_key = ChildKey::derive(
            record.child.personal_code.as_deref(),
            record.child.first_name.as_deref(),
            record.child.last_name.as_deref(),
            dob_iso.as_deref(),
        );

        if let Some(key) = &child_key {
            self.absorb_child(key, record, dob_iso.as_deref(), start_iso.as_deref(), now);
        }

        let first = self.absorb_parent(&record.first_parent, now);
        let second = self.absorb_parent(&record.second_parent, now);

        if let Some(key) = &child_key {
            if let Some(child) = self.children.get_mut(key) {
                for (doc_id, display_name) in [first, second].into_iter().flatten() {
                    child.parent_ids.insert(doc_id);
                    if let Some(name) = display_name {
                        child.parent_names.insert(name);
                    }
                }
            }
        }
    }

    fn absorb_child(
        &mut self,
        key: &ChildKey,
        record: &RawRecord,
        dob_iso: Option<&str>,
        start_iso: Option<&str>,
        now: &str,
    ) {
        if !self.children.contains_key(key) {
            let doc_id = self.child_ids.claim(&child_base_id(key));
            let entity = ChildEntity {
                status: Some(ChildStatus::Finished),
                fingerprint: key.fingerprint_value(),
                created_at: Some(now.to_string()),
                updated_at: Some(now.to_string()),
                ..ChildEntity::default()
            };
            self.children.insert(
                key.clone(),
                ChildDraft {
                    doc_id,
                    entity,
                    parent_ids: BTreeSet::new(),
                    parent_names: BTreeSet::new(),
                },
            );
            self.child_order.push(key.clone());
        }

        let draft = self
            .children
            .get_mut(key)
            .expect("child draft inserted above");
        let entity = &mut draft.entity;
        fill(&mut entity.first_name, record.child.first_name.as_deref());
        fill(&mut entity.last_name, record.child.last_name.as_deref());
        if entity.full_name.is_none() {
            entity.full_name = join_name(
                record.child.first_name.as_deref(),
                record.child.last_name.as_deref(),
            );
        }
        let code = record
            .child
            .personal_code
            .as_deref()
            .filter(|c| super::normalize::is_valid_personal_code(c));
        fill(&mut entity.personal_code, code);
        fill(&mut entity.dob, dob_iso);
        fill(&mut entity.address, record.child.address.as_deref());
        fill(&mut entity.group, record.group.as_deref());
        fill(&mut entity.start_date, start_iso);
    }

    /// Returns the parent's document id and display name when the record
    /// yields an identity key; keyless parents are skipped entirely.
    fn absorb_parent(
        &mut self,
        raw: &RawParent,
        now: &str,
    ) -> Option<(String, Option<String>)> {
        let phone = raw
            .phone
            .as_deref()
            .map(|p| normalize_phone(p, &self.default_cc))
            .unwrap_or_default();

        let key = ParentKey::derive(
            raw.personal_code.as_deref(),
            phone.key_digits(),
            raw.email.as_deref(),
            raw.last_name.as_deref(),
        )?;

        if !self.parents.contains_key(&key) {
            let base = parent_base_id(&key, raw.first_name.as_deref(), raw.last_name.as_deref());
            let doc_id = self.parent_ids.claim(&base);
            let entity = ParentEntity {
                created_at: Some(now.to_string()),
                updated_at: Some(now.to_string()),
                ..ParentEntity::default()
            };
            self.parents.insert(key.clone(), ParentDraft { doc_id, entity });
            self.parent_order.push(key.clone());
        }

        let draft = self
            .parents
            .get_mut(&key)
            .expect("parent draft inserted above");
        let entity = &mut draft.entity;
        fill(&mut entity.first_name, raw.first_name.as_deref());
        fill(&mut entity.last_name, raw.last_name.as_deref());
        if entity.full_name.is_none() {
            entity.full_name = join_name(raw.first_name.as_deref(), raw.last_name.as_deref());
        }
        let code = raw
            .personal_code
            .as_deref()
            .filter(|c| super::normalize::is_valid_personal_code(c));
        fill(&mut entity.personal_code, code);
        fill(&mut entity.email, raw.email.as_deref().and_then(clean));
        fill_phone(entity, &phone);
        fill(&mut entity.address, raw.address.as_deref());

        let display_name = join_name(raw.first_name.as_deref(), raw.last_name.as_deref());
        Some((draft.doc_id.clone(), display_name))
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Canonical parents in first-seen order.
    pub fn parents(&self) -> impl Iterator<Item = &ParentDraft> {
        self.parent_order.iter().filter_map(|key| self.parents.get(key))
    }

    /// Canonical children in first-seen order.
    pub fn children(&self) -> impl Iterator<Item = &ChildDraft> {
        self.child_order.iter().filter_map(|key| self.children.get(key))
    }

    pub fn parent_count(&self) -> usize {
        self.parents.len()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}

/// Fill-only write: adopt the value only when the slot is empty.
fn fill<T: Into<String>>(slot: &mut Option<String>, value: Option<T>) {
    if slot.as_deref().is_some_and(|current| !current.is_empty()) {
        return;
    }
    if let Some(value) = value {
        let value = value.into();
        if !value.is_empty() {
            *slot = Some(value);
        }
    }
}

fn fill_phone(entity: &mut ParentEntity, phone: &NormalizedPhone) {
    fill(&mut entity.phone, phone.local_digits.as_deref());
    fill(&mut entity.phone_e164, phone.e164.as_deref());
}

fn join_name(first: Option<&str>, last: Option<&str>) -> Option<String> {
    let joined = [first, last]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

/// Attribute list behind the richness score. Each entry names the canonical
/// field and the legacy spellings still present on pre-import documents.
const RICHNESS_FIELDS: &[&[&str]] = &[
    &["firstName", "vards"],
    &["lastName", "uzvards"],
    &["email", "epasts"],
    &["phone"],
    &["address", "adrese"],
    &["personalCode", "personaskods"],
    &["contractNo", "ligumsnr"],
    &["status", "statuss"],
    &["billingInfo", "rek_info"],
];

/// Count of populated attributes. Ranks candidate donor records; it never
/// decides identity equality.
pub fn richness_score(doc: &Document) -> usize {
    RICHNESS_FIELDS
        .iter()
        .filter(|aliases| aliases.iter().any(|field| is_populated(doc.get(*field))))
        .count()
}

/// First non-empty value among a field's canonical and legacy spellings.
pub fn aliased_text<'a>(doc: &'a Document, aliases: &[&str]) -> Option<&'a str> {
    aliases
        .iter()
        .filter_map(|field| doc.get(*field))
        .filter_map(value_text)
        .find(|text| !text.trim().is_empty())
}

fn value_text(value: &Value) -> Option<&str> {
    value.as_str()
}

fn is_populated(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(text)) => !text.trim().is_empty(),
        Some(_) => true,
    }
}

/// Deterministic best-donor choice: highest richness, then latest
/// `updatedAt`, then smallest document id.
pub fn select_best_donor<'a>(hits: &'a [(String, Document)]) -> Option<&'a (String, Document)> {
    hits.iter().max_by(|a, b| {
        richness_score(&a.1)
            .cmp(&richness_score(&b.1))
            .then_with(|| updated_at(&a.1).cmp(&updated_at(&b.1)))
            .then_with(|| b.0.cmp(&a.0))
    })
}

fn updated_at(doc: &Document) -> Option<String> {
    doc.get("updatedAt")
        .and_then(Value::as_str)
        .map(str::to_string)
}
