use std::sync::mpsc;
use std::time::Duration;

use mocha::{Client, Error, Response};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client = Client::builder()
        .read_timeout(Duration::from_secs(5))
        .logging(true)
        .build();

    let pending: Vec<_> = ["tea", "coffee", "cocoa"]
        .into_iter()
        .map(|drink| {
            client
                .get("https://httpbin.org/get")
                .query("drink", drink)
                .execute_async()
        })
        .collect();
    for future in pending {
        let response = future.await?;
        println!("{}", response.json_map()?.get("args").get("drink"));
    }

    let (sender, receiver) = mpsc::channel();
    let error_sender = sender.clone();
    client.get("https://httpbin.org/status/503").execute_with_handlers(
        move |response: Response| {
            let _ = sender.send(format!("status {}", response.status()));
        },
        move |error: Error| {
            let _ = error_sender.send(format!("failed: {error}"));
        },
    );
    let outcome = tokio::task::spawn_blocking(move || receiver.recv_timeout(Duration::from_secs(10)))
        .await?;
    println!("{}", outcome.unwrap_or_else(|_| "no outcome".to_owned()));
    Ok(())
}
