use console_api_client::{ApiClient, MemoryTokenStore, StoredToken};
use serde_json::{json, Value};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let store = MemoryTokenStore::new();
    let token = StoredToken::new(store.clone());
    token.set(&std::env::var("CONSOLE_API_TOKEN")?);

    let client = ApiClient::from_env()
        .map_err(anyhow::Error::msg)?
        .with_token_store(store);

    let session = token.clone();
    client.session_guard().on_unauthorized(move || {
        eprintln!("session expired, signing out");
        session.clear();
    });

    let _progress = client.progress().subscribe(|status| {
        eprintln!(
            "[{}/{}] {}",
            status.attempt, status.max_retries, status.message
        );
    });

    client.warm_up("/health").await?;

    let customer: Value = client.get("/customers/42").await?;
    println!("{customer:#}");

    let balance: Value = client
        .post("/customers/42/points", &json!({ "delta": 150, "reason": "birthday" }))
        .await?;
    println!("{balance:#}");

    Ok(())
}
