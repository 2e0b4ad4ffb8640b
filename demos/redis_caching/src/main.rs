use std::time::Duration;

use synaptic_core::{Generation, Message, SynapticError};
use synaptic_redis::{CacheConfig, CredentialRecord, LlmCache, RedisCache};

#[tokio::main]
async fn main() -> Result<(), SynapticError> {
    tracing_subscriber::fmt::init();

    // Empty credential: everything comes from REDIS_URL / REDIS_HOST / ...
    let credential = CredentialRecord::default();
    let config = CacheConfig::default()
        .with_prefix("synaptic:demo:")
        .with_ttl(Duration::from_secs(60));
    let cache = RedisCache::init(&credential, config)?;

    let prompt = "What is the capital of France?";
    let model = "demo-model:temperature=0";

    // --- First lookup: cache miss ---
    println!("=== Lookup (before update) ===");
    match cache.lookup(prompt, model).await? {
        Some(generations) => println!("Hit: {} generation(s)", generations.len()),
        None => println!("Miss"),
    }

    // --- Store two generations ---
    println!("\n=== Update ===");
    let generations = vec![
        Generation::chat(Message::ai("Paris.")),
        Generation::plain("The capital of France is Paris."),
    ];
    cache.update(prompt, model, &generations).await?;
    println!("Stored {} generation(s)", generations.len());

    // --- Second lookup: cache hit ---
    println!("\n=== Lookup (after update) ===");
    if let Some(cached) = cache.lookup(prompt, model).await? {
        for (i, generation) in cached.iter().enumerate() {
            let kind = if generation.message().is_some() { "chat" } else { "text" };
            println!("[{i}] ({kind}) {}", generation.text());
        }
    }

    // --- Different model identity: separate entry ---
    println!("\n=== Lookup (other model) ===");
    let other = cache.lookup(prompt, "demo-model:temperature=1").await?;
    println!("Other model cached: {}", other.is_some());

    cache.invalidate(prompt, model).await?;
    println!("\nRedis caching demo completed successfully!");
    Ok(())
}
