//! Drives a seeded deployment through one full request lifecycle: public
//! submission, tracking lookup, org assignment, bank fulfilment, and a final
//! tracking lookup that should show the fulfilled state. Exits non-zero on
//! the first mismatch.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, bail, ensure};
use clap::Parser;
use reqwest::Client;
use serde_json::{Value, json};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Base address of the running server.
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    address: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let client = Client::new();
    let base = args.address.trim_end_matches('/');

    let health: Value = client
        .get(format!("{base}/api/health"))
        .send()
        .await
        .context("server unreachable")?
        .json()
        .await?;
    println!("Health: {health}");

    // Distinct IC per run so guest accounts never collide across runs.
    let run_id = SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis();
    let submission: Value = client
        .post(format!("{base}/api/public/requests"))
        .json(&json!({
            "first_name": "Smoke",
            "last_name": "Test",
            "ic_number": format!("smoke-{run_id}"),
            "address": "1 Jalan Ujian",
            "district": "Kuala Lumpur",
            "latitude": 3.16,
            "longitude": 101.7,
            "items": [{ "food_item_id": 1, "quantity": 1 }],
        }))
        .send()
        .await?
        .json()
        .await?;
    let Some(tracking) = submission["tracking_number"].as_str() else {
        bail!("submission did not return a tracking number: {submission}");
    };
    let request_id = submission["request_id"]
        .as_i64()
        .context("submission did not return a request id")?;
    println!("Submitted request {request_id}, tracking {tracking}");

    let tracked = track(&client, base, tracking).await?;
    ensure!(tracked["status"] == "Pending", "expected Pending, got {tracked}");
    println!("Tracked: Pending");

    let org_token = login(&client, base, "orgadmin").await?;

    // The seeded KL bank is the one the seeded foodbank1 account operates, so
    // fulfilment below works against the same assignment.
    let banks: Value = client
        .get(format!("{base}/api/public/foodbanks"))
        .query(&[("district", "Kuala Lumpur")])
        .send()
        .await?
        .json()
        .await?;
    let bank_id = banks[0]["id"]
        .as_i64()
        .context("no food bank seeded for Kuala Lumpur")?;

    let assigned = update(
        &client,
        base,
        request_id,
        &org_token,
        json!({ "status": "Assigned", "assigned_to_id": bank_id }),
    )
    .await?;
    ensure!(assigned["status"] == "Assigned", "assignment failed: {assigned}");
    println!("Assigned to bank {bank_id}");

    let bank_token = login(&client, base, "foodbank1").await?;
    let fulfilled = update(
        &client,
        base,
        request_id,
        &bank_token,
        json!({ "status": "Fulfilled" }),
    )
    .await?;
    ensure!(
        fulfilled["status"] == "Fulfilled" && !fulfilled["fulfilled_at"].is_null(),
        "fulfilment failed: {fulfilled}"
    );
    println!("Fulfilled");

    let tracked = track(&client, base, tracking).await?;
    ensure!(
        tracked["status"] == "Fulfilled" && tracked["foodbank"]["name"].is_string(),
        "tracking does not show fulfilment: {tracked}"
    );
    println!("Tracked: Fulfilled by {}", tracked["foodbank"]["name"]);

    println!("\nSmoke test passed.");
    Ok(())
}

async fn login(client: &Client, base: &str, username: &str) -> Result<String> {
    let response: Value = client
        .post(format!("{base}/token"))
        .form(&[("username", username), ("password", "password")])
        .send()
        .await?
        .json()
        .await?;
    response["access_token"]
        .as_str()
        .map(str::to_string)
        .with_context(|| format!("login failed for {username}: {response}"))
}

async fn track(client: &Client, base: &str, tracking: &str) -> Result<Value> {
    Ok(client
        .get(format!("{base}/api/public/track/{tracking}"))
        .send()
        .await?
        .json()
        .await?)
}

async fn update(
    client: &Client,
    base: &str,
    request_id: i64,
    token: &str,
    body: Value,
) -> Result<Value> {
    Ok(client
        .put(format!("{base}/api/requests/{request_id}"))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await?
        .json()
        .await?)
}
