use std::time::Duration;

use reqchain::prelude::{Agent, AgentConfig, TransportConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let agent = Agent::with_config(
        AgentConfig::from_env()
            .with_transport(TransportConfig::default().with_timeout(Duration::from_secs(3))),
    )?;

    let response = agent
        .post("https://api.example.com/v1/items")
        .send(r#"{"name": "demo"}"#)
        .send(serde_json::json!({"tags": ["a", "b"]}))
        .retry(2, Duration::from_millis(200), [502, 503])
        .end()?;

    println!(
        "status={} retries={}",
        response.status(),
        response.retry_count().unwrap_or_default()
    );
    Ok(())
}
