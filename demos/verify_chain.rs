//! Building, verifying and running a small chain.
//!
//! Run with `cargo run --example verify_chain`.

use serde_json::json;
use taskchain::prelude::*;

fn main() -> taskchain::Result<()> {
    let mut app = TaskRegistry::new();

    let fetch = app.task(
        TaskDef::new("fetch", |call| {
            let user = call.arg("user");
            Ok(json!([format!("profile of {}", user), 3]))
        })
        .arg("user")
        .returns(["profile", "visits"])?,
    );

    let summarize = app.task(
        TaskDef::new("summarize", |call| {
            Ok(json!(format!(
                "{} ({} visits, style {})",
                call.arg("text"),
                call.arg("visits"),
                call.arg("style")
            )))
        })
        .arg("text")
        .arg("visits")
        .arg_default("style", "short")
        .returns(["summary"])?,
    );

    // `text` is wired to fetch's `profile` output; `visits` is found by name.
    let chain = InjectArgs::new().with("user", "ada")
        | fetch.s()
        | summarize.s().with_ref("text", "profile");

    println!("Chain: {}", chain.get_label());
    chain.verify()?;

    let result = chain.apply()?;
    println!("Summary: {}", result.get("summary").unwrap_or(&ArgValue::Null));

    // Without the seed, the first step has no `user`.
    let broken = fetch.s() | summarize.s().with_ref("text", "profile");
    match broken.verify() {
        Ok(()) => println!("unexpectedly valid"),
        Err(e) => println!("Rejected: {}", e),
    }

    ChainVerifier::default().validate(&broken).log_summary();
    Ok(())
}
