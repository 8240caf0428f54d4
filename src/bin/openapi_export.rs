// Prints the OpenAPI document, including the problem document schema.
// Usage: cargo run --bin openapi_export > openapi.json

use anyhow::{Context, Result};
use problem_relay::api::openapi::ApiDoc;
use utoipa::OpenApi;

fn main() -> Result<()> {
    let json = ApiDoc::openapi()
        .to_pretty_json()
        .context("Failed to serialize OpenAPI document")?;
    println!("{}", json);
    Ok(())
}
