use serde::Deserialize;
use serde_json::{json, Map, Value as JsonValue};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use steward_model::{
    identity_eq, Column, ColumnKind, JsonError, JsonModel, Jsonable, Model, ModelRegistry, Table,
    Value,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct User {
    id: i64,
    name: String,
    #[serde(default)]
    email: Option<String>,
}

static USERS: Table = Table::new(
    "users",
    &[
        Column::new("id", ColumnKind::Integer).primary_key(),
        Column::new("name", ColumnKind::Text),
        Column::new("email", ColumnKind::Text).nullable(),
    ],
);

impl Model for User {
    fn table() -> &'static Table {
        &USERS
    }

    fn value(&self, column: &str) -> Option<Value> {
        match column {
            "id" => Some(self.id.into()),
            "name" => Some(self.name.as_str().into()),
            "email" => Some(self.email.clone().into()),
            _ => None,
        }
    }
}

impl Jsonable for User {}
identity_eq!(User);

#[derive(Debug, Clone, Deserialize)]
struct Membership {
    group: String,
    member: i64,
    role: String,
    #[serde(default)]
    _synced: bool,
}

static MEMBERSHIPS: Table = Table::new(
    "memberships",
    &[
        Column::new("group", ColumnKind::Text).primary_key(),
        Column::new("member", ColumnKind::Integer).primary_key(),
        Column::new("role", ColumnKind::Text),
        Column::new("_synced", ColumnKind::Boolean),
    ],
);

impl Model for Membership {
    fn table() -> &'static Table {
        &MEMBERSHIPS
    }

    fn value(&self, column: &str) -> Option<Value> {
        match column {
            "group" => Some(self.group.as_str().into()),
            "member" => Some(self.member.into()),
            "role" => Some(self.role.as_str().into()),
            "_synced" => Some(self._synced.into()),
            _ => None,
        }
    }
}

impl Jsonable for Membership {}
identity_eq!(Membership);

/// Accepts the legacy `item_id` key in place of `id`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct Item {
    id: i64,
}

static ITEMS: Table = Table::new(
    "items",
    &[Column::new("id", ColumnKind::Integer).primary_key()],
);

impl Model for Item {
    fn table() -> &'static Table {
        &ITEMS
    }

    fn value(&self, column: &str) -> Option<Value> {
        match column {
            "id" => Some(self.id.into()),
            _ => None,
        }
    }
}

impl Jsonable for Item {
    fn from_json(mut data: Map<String, JsonValue>) -> Result<Self, JsonError> {
        if let Some(id) = data.remove("item_id") {
            data.insert("id".to_string(), id);
        }
        serde_json::from_value(JsonValue::Object(data)).map_err(|source| {
            JsonError::Construction {
                model: Self::table().name,
                source,
            }
        })
    }
}

#[derive(Debug, Clone)]
struct Reading {
    level: f64,
    note: String,
}

static READINGS: Table = Table::new(
    "readings",
    &[
        Column::new("level", ColumnKind::Real).primary_key(),
        Column::new("note", ColumnKind::Text),
    ],
);

impl Model for Reading {
    fn table() -> &'static Table {
        &READINGS
    }

    fn value(&self, column: &str) -> Option<Value> {
        match column {
            "level" => Some(self.level.into()),
            "note" => Some(self.note.as_str().into()),
            _ => None,
        }
    }
}

identity_eq!(Reading);

fn reading(level: f64, note: &str) -> Reading {
    Reading {
        level,
        note: note.to_string(),
    }
}

fn user(id: i64, name: &str) -> User {
    User {
        id,
        name: name.to_string(),
        email: None,
    }
}

fn hash_of<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

fn mapping(value: JsonValue) -> Map<String, JsonValue> {
    match value {
        JsonValue::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

// ── equality ─────────────────────────────────────────────────────────

#[test]
fn same_identity_different_fields_are_equal() {
    let u1 = user(1, "a");
    let u2 = user(1, "b");
    assert_eq!(u1, u2);
    assert_eq!(hash_of(&u1), hash_of(&u2));
}

#[test]
fn different_identity_is_not_equal() {
    let u1 = user(1, "a");
    let u3 = user(2, "a");
    assert_ne!(u1, u3);
}

#[test]
fn composite_identity_uses_every_key_column() {
    let a = Membership {
        group: "admins".to_string(),
        member: 7,
        role: "owner".to_string(),
        _synced: false,
    };
    let mut b = a.clone();
    b.role = "viewer".to_string();
    b._synced = true;
    assert_eq!(a, b);
    assert_eq!(hash_of(&a), hash_of(&b));

    let mut c = a.clone();
    c.member = 8;
    assert_ne!(a, c);
}

#[test]
fn identity_equal_instances_collapse_in_hash_set() {
    let set: HashSet<User> = [user(1, "a"), user(1, "b"), user(2, "c")]
        .into_iter()
        .collect();
    assert_eq!(set.len(), 2);
}

#[test]
fn nan_identity_is_reflexive() {
    let r = reading(f64::NAN, "unset");
    assert_eq!(r, r.clone());
    assert_eq!(r, reading(f64::NAN, "other"));
    assert_eq!(hash_of(&r), hash_of(&reading(f64::NAN, "other")));
    assert_ne!(r, reading(1.5, "unset"));

    let set: HashSet<Reading> = [r.clone(), r].into_iter().collect();
    assert_eq!(set.len(), 1);
}

#[test]
fn signed_zero_identity_is_equal() {
    assert_eq!(reading(0.0, "a"), reading(-0.0, "b"));
    assert_eq!(hash_of(&reading(0.0, "a")), hash_of(&reading(-0.0, "b")));
}

// ── json ─────────────────────────────────────────────────────────────

#[test]
fn to_json_contains_every_public_column() {
    let u = User {
        id: 3,
        name: "carol".to_string(),
        email: Some("carol@example.com".to_string()),
    };
    assert_eq!(
        JsonValue::Object(u.to_json()),
        json!({"id": 3, "name": "carol", "email": "carol@example.com"})
    );
}

#[test]
fn to_json_excluding_drops_only_excluded_keys() {
    let u = user(4, "dave");
    let data = u.to_json_excluding(&["email"]);
    assert!(!data.contains_key("email"));
    assert_eq!(data.get("id"), Some(&json!(4)));
    assert_eq!(data.get("name"), Some(&json!("dave")));
}

#[test]
fn to_json_skips_private_columns() {
    let m = Membership {
        group: "ops".to_string(),
        member: 1,
        role: "member".to_string(),
        _synced: true,
    };
    let data = m.to_json();
    assert!(!data.contains_key("_synced"));
    assert_eq!(data.len(), 3);
}

#[test]
fn round_trip_through_json_preserves_identity_and_fields() {
    let original = User {
        id: 9,
        name: "erin".to_string(),
        email: Some("erin@example.com".to_string()),
    };
    let loaded = User::from_json(original.to_json()).expect("round trip should succeed");
    assert_eq!(loaded, original);
    assert_eq!(loaded.name, original.name);
    assert_eq!(loaded.email, original.email);
}

#[test]
fn from_json_rejects_unknown_keys() {
    let err = User::from_json(mapping(json!({"id": 1, "name": "a", "age": 30})))
        .expect_err("unknown key should fail");
    assert!(matches!(err, JsonError::Construction { model: "users", .. }));
}

#[test]
fn from_json_rejects_missing_required_keys() {
    let err = User::from_json(mapping(json!({"name": "a"}))).expect_err("missing id should fail");
    assert!(matches!(err, JsonError::Construction { .. }));
}

#[test]
fn from_json_list_of_nothing_is_empty() {
    let users = User::from_json_list(Vec::new()).expect("empty list should load");
    assert!(users.is_empty());
}

#[test]
fn from_json_list_preserves_order() {
    let d1 = mapping(json!({"id": 1, "name": "first"}));
    let d2 = mapping(json!({"id": 2, "name": "second"}));
    let users = User::from_json_list(vec![d1, d2]).expect("list should load");
    assert_eq!(users.len(), 2);
    assert_eq!(users[0].name, "first");
    assert_eq!(users[1].name, "second");
}

#[test]
fn from_json_list_reports_failing_element() {
    let good = mapping(json!({"id": 1, "name": "ok"}));
    let bad = mapping(json!({"id": "not-a-number", "name": "bad"}));
    let err = User::from_json_list(vec![good, bad]).expect_err("bad element should fail");
    match err {
        JsonError::Element { index, model, .. } => {
            assert_eq!(index, 1);
            assert_eq!(model, "users");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn from_json_list_uses_overridden_from_json() {
    let items = Item::from_json_list(vec![
        mapping(json!({"item_id": 5})),
        mapping(json!({"id": 6})),
    ])
    .expect("legacy keys should load");
    assert_eq!(items.iter().map(|i| i.id).collect::<Vec<_>>(), vec![5, 6]);
}

#[test]
fn from_json_list_wraps_the_element_error() {
    let err = Item::from_json_list(vec![
        mapping(json!({"item_id": 5})),
        mapping(json!({"item_id": 6, "extra": true})),
    ])
    .expect_err("unknown key should fail");
    match err {
        JsonError::Element {
            index,
            model,
            source,
        } => {
            assert_eq!(index, 1);
            assert_eq!(model, "items");
            assert!(matches!(*source, JsonError::Construction { model: "items", .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn json_model_serializes_public_columns() {
    let u = User {
        id: 5,
        name: "fay".to_string(),
        email: None,
    };
    assert_eq!(
        serde_json::to_value(JsonModel(u.clone())).expect("should serialize"),
        JsonValue::Object(u.to_json())
    );

    let m = Membership {
        group: "ops".to_string(),
        member: 2,
        role: "member".to_string(),
        _synced: true,
    };
    assert_eq!(
        serde_json::to_value(vec![JsonModel(m)]).expect("should serialize"),
        json!([{"group": "ops", "member": 2, "role": "member"}])
    );
}

// ── registry ─────────────────────────────────────────────────────────

#[test]
fn registry_deduplicates_and_keeps_order() {
    let mut registry = ModelRegistry::new();
    registry.register::<User>().register::<Membership>().register::<User>();

    let names: Vec<&str> = registry.tables().map(|t| t.name).collect();
    assert_eq!(names, vec!["users", "memberships"]);
    assert!(registry.contains("memberships"));
    assert!(!registry.contains("groups"));
}
