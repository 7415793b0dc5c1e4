//! # Basic Cache Example
//!
//! This example walks through the cache manager:
//! - Connecting with configuration from env / `recipe_cache.toml`
//! - Writing with per-category TTL policies
//! - Hits, misses and the hit rate
//! - Poisoned entries being rejected and evicted
//! - Pattern invalidation and health checks
//!
//! Redis is used when reachable; otherwise the demo falls back to the
//! in-process backend.

use recipe_cache::prelude::*;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize)]
struct Recipe {
    id: u64,
    title: String,
    servings: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("🚀 Recipe Cache Basic Example");
    println!("=============================");

    let config = AppConfig::load()?;
    init_tracing(&config.logging)?;

    // 1. Connect
    println!("\n🗄️  Connecting");
    println!("-------------");
    let memory = Arc::new(MemoryBackend::new());
    let runtime = match CacheRuntime::start(config.clone()).await {
        Ok(runtime) => {
            println!("✅ Connected to Redis at {}:{}", config.cache.host, config.cache.port);
            runtime
        }
        Err(e) => {
            println!("⚠️  Redis unavailable ({}), using in-process backend", e);
            CacheRuntime::start_with_backend(config, memory.clone()).await?
        }
    };
    let cache = runtime.cache().clone();

    // 2. TTL policies
    println!("\n⏱️  TTL policies");
    println!("---------------");
    for (name, seconds) in TtlPolicy::table() {
        println!("   {:<14} {:>5}s", name, seconds);
    }

    // 3. Write and read back
    println!("\n📝 Write / read");
    println!("---------------");
    let key = keys::recipe_detail(42);
    let soup = Recipe {
        id: 42,
        title: "Lentil soup".to_string(),
        servings: 4,
    };
    cache.set_for(TtlPolicy::RecipeDetail, &key, &soup).await?;
    println!("   SET {} (ttl {}s)", key, cache.ttl(&key).await);

    let cached: Option<Recipe> = cache.get(&key).await?;
    println!("   HIT  {:?}", cached);
    let missing: Option<Recipe> = cache.get(&keys::recipe_detail(404)).await?;
    println!("   MISS {:?}", missing);

    // 4. Poisoned entries
    println!("\n🛡️  Poisoning defense");
    println!("---------------------");
    cache
        .set("recipe:detail:666", &json!({"id": 666, "title": "x", "__proto__": {"admin": true}}), 60)
        .await?;
    let poisoned: Option<serde_json::Value> = cache.get("recipe:detail:666").await?;
    println!(
        "   poisoned read -> {:?}, still stored: {}",
        poisoned,
        cache.exists("recipe:detail:666").await
    );

    // 5. Pattern invalidation
    println!("\n🧹 Pattern invalidation");
    println!("-----------------------");
    for id in 1..=3 {
        let recipe = Recipe {
            id,
            title: format!("Recipe {}", id),
            servings: 2,
        };
        cache
            .set_for(TtlPolicy::RecipeDetail, &keys::recipe_detail(id), &recipe)
            .await?;
    }
    println!("   matching: {:?}", cache.scan("recipe:detail:*").await);
    let deleted = cache.delete_by_pattern("recipe:detail:*").await;
    println!("   deleted {} keys", deleted);

    // 6. Health and stats
    println!("\n📊 Health & stats");
    println!("-----------------");
    let health = runtime.health().await;
    println!(
        "   healthy: {}, latency: {:?}ms",
        health.healthy, health.latency_ms
    );
    let stats = cache.stats();
    println!(
        "   hits: {}, misses: {}, errors: {}, hit rate: {:.1}%",
        stats.metrics.hits, stats.metrics.misses, stats.metrics.errors, stats.hit_rate
    );

    runtime.shutdown().await;
    println!("\n✅ Done");
    Ok(())
}
