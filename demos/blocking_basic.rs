use std::time::Duration;

use mocha::prelude::{Client, RetryPolicy};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Slideshow {
    title: String,
    author: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client = Client::builder()
        .client_name("mocha-demo/0.1")
        .connect_timeout(Duration::from_secs(3))
        .read_timeout(Duration::from_secs(5))
        .retry_enabled(true)
        .retry_policy(
            RetryPolicy::standard()
                .base_backoff(Duration::from_millis(250))
                .max_backoff(Duration::from_secs(2)),
        )
        .build();

    let response = client
        .get("https://httpbin.org/json")
        .header("accept", "application/json")
        .execute()?;
    println!("status={}", response.status());

    let json = response.json_map()?;
    let slideshow = json.get("slideshow");
    println!("title={} author={}", slideshow.get("title"), slideshow.get("author"));

    let typed = response.decode_generic()?.get("slideshow").cloned();
    if let Some(value) = typed {
        let slideshow: Slideshow = serde_json::from_value(value)?;
        println!("typed: {slideshow:?}");
    }

    let echoed = mocha::post("https://httpbin.org/post")
        .json(&serde_json::json!({ "drink": "mocha", "size": "large" }))
        .execute()?;
    println!(
        "echoed drink={}",
        echoed.json_map()?.get("json").get("drink")
    );
    Ok(())
}
