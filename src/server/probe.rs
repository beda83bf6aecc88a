use anyhow::{Context, Result};
use serde_json::Value;

use crate::config::Config;
use crate::network::{Categorizer, LookupRequest};

const RULE: &str = "=================================";

/// Send one lookup for `url` and print the whole exchange, for debugging the
/// API token and response shape by hand.
pub async fn run(config: &Config, url: &str) -> Result<()> {
    let categorizer = Categorizer::new(&config.api)?;
    let request = LookupRequest::for_url(url);
    let body = serde_json::to_string(&request)?;

    println!("{RULE}\nCategorization API probe\n{RULE}");
    println!("API URL:  {}", categorizer.endpoint());
    println!("Test URL: {url}");
    println!("{RULE}\n\nRequest body:\n{body}\n\n{RULE}\n");

    let raw = categorizer
        .send(&request)
        .await
        .context("lookup request failed")?;

    println!("Response status: {}", raw.status);
    println!("Response headers:");
    for (name, value) in &raw.headers {
        println!("  {name}: {}", String::from_utf8_lossy(value.as_bytes()));
    }
    println!("\n{RULE}\n\nResponse body:\n{}\n\n{RULE}\n", raw.body);

    match serde_json::from_str::<Value>(&raw.body) {
        Ok(value) => {
            println!(
                "Parsed response:\n{}\n\n{RULE}\n",
                serde_json::to_string_pretty(&value)?
            );
            println!("{}", describe_categories(&value));
        }
        Err(err) => println!("Response is not valid JSON: {err}"),
    }
    Ok(())
}

/// Human-readable account of where `result[0].categories` is, or which
/// level of it is missing.
fn describe_categories(value: &Value) -> String {
    let results = value.get("result");
    let Some(first) = results.and_then(|r| r.get(0)) else {
        let mut out = String::from("No result[0] found in response");
        if let Some(list) = results.and_then(Value::as_array) {
            out.push_str(&format!("\nResult array length: {}", list.len()));
        }
        return out;
    };

    let first_pretty = serde_json::to_string_pretty(first).unwrap_or_else(|_| first.to_string());
    let mut out = format!("First result object:\n{first_pretty}\n\n{RULE}\n\n");

    match first.get("categories").and_then(Value::as_array) {
        Some(categories) => {
            out.push_str("Categories found:");
            for (idx, category) in categories.iter().enumerate() {
                let label = category
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| category.to_string());
                out.push_str(&format!("\n  {}. {label}", idx + 1));
            }
        }
        None => {
            let fields: Vec<&str> = first
                .as_object()
                .map(|obj| obj.keys().map(String::as_str).collect())
                .unwrap_or_default();
            out.push_str(&format!(
                "No categories array found in result[0]\nAvailable fields: {}",
                fields.join(", ")
            ));
        }
    }
    out
}
