//! Key namespace convention
//!
//! Every cache key is `<store prefix><namespace><identifier>`. The store
//! prefix is applied by the manager; callers build the rest with these
//! helpers so the validator registry dispatches on the right namespace.

use std::collections::hash_map::DefaultHasher;
use std::fmt::Display;
use std::hash::{Hash, Hasher};

pub const JWT: &str = "jwt:";
pub const USER_PROFILE: &str = "user:profile:";
pub const USER_DASHBOARD: &str = "user:dashboard:";
pub const RECIPE_DETAIL: &str = "recipe:detail:";
pub const RECIPE_LIST: &str = "recipes:list:";
pub const SEARCH: &str = "search:";
pub const CATEGORIES: &str = "categories:";
pub const API: &str = "api:";

pub fn jwt(token_id: impl Display) -> String {
    format!("{}{}", JWT, token_id)
}

pub fn user_profile(user_id: impl Display) -> String {
    format!("{}{}", USER_PROFILE, user_id)
}

pub fn user_dashboard(user_id: impl Display) -> String {
    format!("{}{}", USER_DASHBOARD, user_id)
}

pub fn recipe_detail(recipe_id: impl Display) -> String {
    format!("{}{}", RECIPE_DETAIL, recipe_id)
}

/// List key for a set of filters; equal filters map to the same key
pub fn recipe_list<T: Hash>(filters: &T) -> String {
    format!("{}{}", RECIPE_LIST, query_hash(filters))
}

pub fn search<T: Hash>(query: &T) -> String {
    format!("{}{}", SEARCH, query_hash(query))
}

pub fn categories(scope: impl Display) -> String {
    format!("{}{}", CATEGORIES, scope)
}

pub fn api(path: impl Display) -> String {
    format!("{}{}", API, path)
}

/// Glob pattern matching every key in a namespace
pub fn namespace_pattern(namespace: &str) -> String {
    format!("{}*", namespace)
}

/// Generate hash for query parameters
pub fn query_hash<T: Hash>(query: &T) -> String {
    let mut hasher = DefaultHasher::new();
    query.hash(&mut hasher);
    format!("{:x}", hasher.finish())
}
