//! Validation of values read back from the cache
//!
//! Anything that comes out of Redis is untrusted: another process, a bad
//! deploy or an attacker with store access may have written it. Object and
//! sequence payloads are checked before they are handed to callers:
//!
//! 1. `null` is rejected.
//! 2. Objects carrying prototype-pollution keys (`__proto__`, `constructor`,
//!    `prototype`) are rejected at any depth.
//! 3. The first registered namespace whose prefix matches the key checks
//!    required fields and their coarse types.
//! 4. Keys outside every namespace only need an object-typed payload.
//!
//! Scalar payloads pass unconditionally.

use crate::keys;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Keys that indicate a prototype-pollution payload
const FORBIDDEN_KEYS: [&str; 3] = ["__proto__", "constructor", "prototype"];

/// Reasons a cached payload is not trusted
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("payload is null")]
    Null,

    #[error("forbidden key '{key}' at {path}")]
    ForbiddenKey { path: String, key: String },

    #[error("{namespace}: expected an object")]
    NotAnObject { namespace: &'static str },

    #[error("{namespace}: missing required field '{field}'")]
    MissingField {
        namespace: &'static str,
        field: &'static str,
    },

    #[error("{namespace}: field '{field}' must be {expected}")]
    WrongType {
        namespace: &'static str,
        field: &'static str,
        expected: FieldKind,
    },

    #[error("{namespace}: {reason}")]
    Rejected {
        namespace: &'static str,
        reason: String,
    },
}

/// Coarse JSON type of a required field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Array,
    Object,
    /// Identifier fields come back as numbers or strings
    Id,
    /// Present, any type including null
    Any,
}

impl FieldKind {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Number => value.is_number(),
            FieldKind::Array => value.is_array(),
            FieldKind::Object => value.is_object(),
            FieldKind::Id => value.is_number() || value.is_string(),
            FieldKind::Any => true,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::String => "a string",
            FieldKind::Number => "a number",
            FieldKind::Array => "an array",
            FieldKind::Object => "an object",
            FieldKind::Id => "a number or string",
            FieldKind::Any => "present",
        };
        f.write_str(name)
    }
}

/// Caller-supplied check for namespaces that need more than field shapes
pub type CustomCheck = Arc<dyn Fn(&Value) -> Result<(), ValidationError> + Send + Sync>;

#[derive(Clone)]
enum Check {
    Fields(Vec<(&'static str, FieldKind)>),
    Custom(CustomCheck),
}

/// Validator bound to one key namespace
#[derive(Clone)]
pub struct NamespaceValidator {
    name: &'static str,
    prefix: String,
    check: Check,
}

impl fmt::Debug for NamespaceValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamespaceValidator")
            .field("name", &self.name)
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl NamespaceValidator {
    /// Validator requiring an object with the given fields
    pub fn fields(
        name: &'static str,
        prefix: impl Into<String>,
        fields: &[(&'static str, FieldKind)],
    ) -> Self {
        Self {
            name,
            prefix: prefix.into(),
            check: Check::Fields(fields.to_vec()),
        }
    }

    pub fn custom<F>(name: &'static str, prefix: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value) -> Result<(), ValidationError> + Send + Sync + 'static,
    {
        Self {
            name,
            prefix: prefix.into(),
            check: Check::Custom(Arc::new(check)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn matches(&self, key: &str) -> bool {
        key.starts_with(&self.prefix)
    }

    pub fn check(&self, value: &Value) -> Result<(), ValidationError> {
        match &self.check {
            Check::Fields(fields) => {
                let object = value.as_object().ok_or(ValidationError::NotAnObject {
                    namespace: self.name,
                })?;
                check_fields(self.name, object, fields)
            }
            Check::Custom(check) => check(value),
        }
    }
}

fn check_fields(
    namespace: &'static str,
    object: &Map<String, Value>,
    fields: &[(&'static str, FieldKind)],
) -> Result<(), ValidationError> {
    for &(field, kind) in fields {
        let value = object
            .get(field)
            .ok_or(ValidationError::MissingField { namespace, field })?;
        if !kind.accepts(value) {
            return Err(ValidationError::WrongType {
                namespace,
                field,
                expected: kind,
            });
        }
    }
    Ok(())
}

/// Ordered namespace validators with an object-type default
#[derive(Debug, Clone, Default)]
pub struct ValidatorRegistry {
    validators: Vec<NamespaceValidator>,
}

impl ValidatorRegistry {
    /// Registry with no namespace validators; only the generic checks apply
    pub fn empty() -> Self {
        Self::default()
    }

    /// Validators for the recipe application's namespaces, in dispatch order
    pub fn standard() -> Self {
        use FieldKind::{Any, Array, Id, Number, Object};

        let mut registry = Self::empty();
        registry
            .register(NamespaceValidator::fields(
                "user-profile",
                keys::USER_PROFILE,
                &[
                    ("id", Id),
                    ("username", FieldKind::String),
                    ("email", FieldKind::String),
                ],
            ))
            .register(NamespaceValidator::fields(
                "jwt",
                keys::JWT,
                &[
                    ("userId", Any),
                    ("payload", Object),
                    ("timestamp", Number),
                    ("expiresAt", Number),
                ],
            ))
            .register(NamespaceValidator::fields(
                "recipe-detail",
                keys::RECIPE_DETAIL,
                &[("id", Id), ("title", FieldKind::String)],
            ))
            .register(NamespaceValidator::fields(
                "recipe-list",
                keys::RECIPE_LIST,
                &[("recipes", Array), ("count", Number)],
            ))
            .register(NamespaceValidator::fields(
                "dashboard",
                keys::USER_DASHBOARD,
                &[("totalRecipes", Number), ("recentRecipes", Array)],
            ))
            .register(NamespaceValidator::fields(
                "search",
                keys::SEARCH,
                &[("query", FieldKind::String), ("results", Array)],
            ))
            .register(NamespaceValidator::fields(
                "categories",
                keys::CATEGORIES,
                &[("categories", Array)],
            ));
        registry
    }

    /// Append a validator; earlier registrations win on overlapping prefixes
    pub fn register(&mut self, validator: NamespaceValidator) -> &mut Self {
        self.validators.push(validator);
        self
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Validator names in dispatch order
    pub fn names(&self) -> Vec<&'static str> {
        self.validators.iter().map(|v| v.name()).collect()
    }

    /// Validator that would handle `key`, if any
    pub fn find(&self, key: &str) -> Option<&NamespaceValidator> {
        self.validators.iter().find(|v| v.matches(key))
    }

    /// Validate a payload read from `key` (store prefix already stripped)
    pub fn validate(&self, key: &str, value: &Value) -> Result<(), ValidationError> {
        match value {
            Value::Null => return Err(ValidationError::Null),
            Value::Object(_) | Value::Array(_) => {}
            _ => return Ok(()),
        }

        reject_forbidden_keys(value, "$")?;

        match self.find(key) {
            Some(validator) => validator.check(value),
            // Object-typed was established above
            None => Ok(()),
        }
    }
}

fn reject_forbidden_keys(value: &Value, path: &str) -> Result<(), ValidationError> {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if FORBIDDEN_KEYS.contains(&key.as_str()) {
                    return Err(ValidationError::ForbiddenKey {
                        path: path.to_string(),
                        key: key.clone(),
                    });
                }
                if child.is_object() || child.is_array() {
                    reject_forbidden_keys(child, &format!("{}.{}", path, key))?;
                }
            }
            Ok(())
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                if child.is_object() || child.is_array() {
                    reject_forbidden_keys(child, &format!("{}[{}]", path, index))?;
                }
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> ValidatorRegistry {
        ValidatorRegistry::standard()
    }

    #[test]
    fn scalars_pass_everywhere() {
        let registry = registry();
        assert!(registry.validate("recipe:detail:1", &json!(42)).is_ok());
        assert!(registry.validate("jwt:abc", &json!("token")).is_ok());
        assert!(registry.validate("anything", &json!(true)).is_ok());
    }

    #[test]
    fn null_is_rejected() {
        assert_eq!(
            registry().validate("misc:1", &Value::Null),
            Err(ValidationError::Null)
        );
    }

    #[test]
    fn pollution_keys_are_rejected_at_any_depth() {
        let registry = registry();
        let top = json!({"__proto__": {"isAdmin": true}});
        assert!(matches!(
            registry.validate("misc:1", &top),
            Err(ValidationError::ForbiddenKey { .. })
        ));

        let nested = json!({
            "id": 1,
            "title": "Soup",
            "steps": [{"constructor": {"prototype": {}}}]
        });
        let err = registry.validate("recipe:detail:1", &nested).unwrap_err();
        assert_eq!(
            err,
            ValidationError::ForbiddenKey {
                path: "$.steps[0]".to_string(),
                key: "constructor".to_string(),
            }
        );
    }

    #[test]
    fn recipe_detail_requires_id_and_title() {
        let registry = registry();
        assert!(registry
            .validate("recipe:detail:42", &json!({"id": 42, "title": "Soup"}))
            .is_ok());
        assert_eq!(
            registry.validate("recipe:detail:42", &json!({"id": 42})),
            Err(ValidationError::MissingField {
                namespace: "recipe-detail",
                field: "title"
            })
        );
        assert!(matches!(
            registry.validate("recipe:detail:42", &json!([1, 2])),
            Err(ValidationError::NotAnObject { .. })
        ));
    }

    #[test]
    fn recipe_list_requires_sequence_and_count() {
        let registry = registry();
        assert!(registry
            .validate("recipes:list:ab", &json!({"recipes": [], "count": 0}))
            .is_ok());
        assert_eq!(
            registry.validate("recipes:list:ab", &json!({"recipes": {}, "count": 0})),
            Err(ValidationError::WrongType {
                namespace: "recipe-list",
                field: "recipes",
                expected: FieldKind::Array
            })
        );
        assert!(registry
            .validate("recipes:list:ab", &json!({"recipes": [], "count": "3"}))
            .is_err());
    }

    #[test]
    fn jwt_requires_numeric_timestamps() {
        let registry = registry();
        let good = json!({
            "userId": 7,
            "payload": {"role": "user"},
            "timestamp": 1_700_000_000,
            "expiresAt": 1_700_003_600
        });
        assert!(registry.validate("jwt:token", &good).is_ok());

        let bad = json!({
            "userId": 7,
            "payload": {"role": "user"},
            "timestamp": "yesterday",
            "expiresAt": 1_700_003_600
        });
        assert!(matches!(
            registry.validate("jwt:token", &bad),
            Err(ValidationError::WrongType { field: "timestamp", .. })
        ));
    }

    #[test]
    fn remaining_namespaces_check_their_fields() {
        let registry = registry();
        assert!(registry
            .validate(
                "user:profile:1",
                &json!({"id": "u1", "username": "sam", "email": "s@x.io"})
            )
            .is_ok());
        assert!(registry
            .validate("user:profile:1", &json!({"id": "u1", "username": "sam"}))
            .is_err());
        assert!(registry
            .validate(
                "user:dashboard:1",
                &json!({"totalRecipes": 3, "recentRecipes": []})
            )
            .is_ok());
        assert!(registry
            .validate("search:abc", &json!({"query": "soup", "results": []}))
            .is_ok());
        assert!(registry
            .validate("categories:all", &json!({"categories": ["soup"]}))
            .is_ok());
        assert!(registry
            .validate("categories:all", &json!(["soup"]))
            .is_err());
    }

    #[test]
    fn unknown_namespace_accepts_any_object_or_sequence() {
        let registry = registry();
        assert!(registry.validate("api:/v1/x", &json!({"anything": 1})).is_ok());
        assert!(registry.validate("api:/v1/x", &json!([1, 2, 3])).is_ok());
    }

    #[test]
    fn dispatch_follows_registration_order() {
        let mut registry = ValidatorRegistry::empty();
        registry
            .register(NamespaceValidator::custom("strict", "recipe:", |_| {
                Err(ValidationError::Rejected {
                    namespace: "strict",
                    reason: "always".to_string(),
                })
            }))
            .register(NamespaceValidator::fields(
                "lenient",
                "recipe:detail:",
                &[],
            ));

        assert_eq!(registry.find("recipe:detail:1").map(|v| v.name()), Some("strict"));
        assert!(registry.validate("recipe:detail:1", &json!({})).is_err());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn standard_registry_dispatch_order() {
        assert_eq!(
            ValidatorRegistry::standard().names(),
            vec![
                "user-profile",
                "jwt",
                "recipe-detail",
                "recipe-list",
                "dashboard",
                "search",
                "categories",
            ]
        );
    }
}
