//! TTL policy table
//!
//! Static mapping from data category to expiry. Every write goes through
//! one of these unless the caller asks for a persistent key (`ttl = 0`).

use crate::keys;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Cache data category with its TTL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TtlPolicy {
    Jwt,
    UserProfile,
    RecipeDetail,
    RecipeList,
    Dashboard,
    Search,
    Categories,
    Api,
}

impl TtlPolicy {
    pub const ALL: [TtlPolicy; 8] = [
        TtlPolicy::Jwt,
        TtlPolicy::UserProfile,
        TtlPolicy::RecipeDetail,
        TtlPolicy::RecipeList,
        TtlPolicy::Dashboard,
        TtlPolicy::Search,
        TtlPolicy::Categories,
        TtlPolicy::Api,
    ];

    pub const fn seconds(&self) -> u64 {
        match self {
            TtlPolicy::Jwt => 3600,
            TtlPolicy::UserProfile => 1800,
            TtlPolicy::RecipeDetail => 3600,
            TtlPolicy::RecipeList => 1800,
            TtlPolicy::Dashboard => 900,
            TtlPolicy::Search => 600,
            TtlPolicy::Categories => 7200,
            TtlPolicy::Api => 300,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.seconds())
    }

    pub const fn name(&self) -> &'static str {
        match self {
            TtlPolicy::Jwt => "jwt",
            TtlPolicy::UserProfile => "userProfile",
            TtlPolicy::RecipeDetail => "recipeDetail",
            TtlPolicy::RecipeList => "recipeList",
            TtlPolicy::Dashboard => "dashboard",
            TtlPolicy::Search => "search",
            TtlPolicy::Categories => "categories",
            TtlPolicy::Api => "api",
        }
    }

    /// Infer the policy from a logical key's namespace
    pub fn for_key(key: &str) -> Option<TtlPolicy> {
        let policy = if key.starts_with(keys::USER_PROFILE) {
            TtlPolicy::UserProfile
        } else if key.starts_with(keys::USER_DASHBOARD) {
            TtlPolicy::Dashboard
        } else if key.starts_with(keys::JWT) {
            TtlPolicy::Jwt
        } else if key.starts_with(keys::RECIPE_DETAIL) {
            TtlPolicy::RecipeDetail
        } else if key.starts_with(keys::RECIPE_LIST) {
            TtlPolicy::RecipeList
        } else if key.starts_with(keys::SEARCH) {
            TtlPolicy::Search
        } else if key.starts_with(keys::CATEGORIES) {
            TtlPolicy::Categories
        } else if key.starts_with(keys::API) {
            TtlPolicy::Api
        } else {
            return None;
        };
        Some(policy)
    }

    /// Policy table as reported in stats
    pub fn table() -> BTreeMap<&'static str, u64> {
        Self::ALL.iter().map(|p| (p.name(), p.seconds())).collect()
    }
}
