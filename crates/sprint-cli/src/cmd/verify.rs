use crate::output::print_json;
use crate::tracker;
use anyhow::Context;
use sprint_core::types::BoardStatus;
use sprint_core::verify::{StatusVerifier, Verification};
use std::path::Path;

/// Exit code for a board that does not show the expected status.
const MISMATCH_EXIT: i32 = 2;

pub fn run(root: &Path, issue: u64, status: &str, json: bool) -> anyhow::Result<()> {
    let expected: BoardStatus = status
        .parse()
        .with_context(|| format!("unknown status '{status}'"))?;
    let result = tracker::with_store(root, |store| {
        Ok(StatusVerifier::new(store).verify(issue, expected)?)
    })?;

    if json {
        print_json(&serde_json::json!({
            "issue": issue,
            "expected": expected.label(),
            "result": result,
        }))?;
    } else {
        match &result {
            Verification::Verified => println!("#{issue}: {}", expected.label()),
            Verification::Mismatch { actual } => println!(
                "#{issue}: expected {}, board shows {}",
                expected.label(),
                actual.as_deref().unwrap_or("(not on board)")
            ),
        }
    }

    if !result.is_verified() {
        std::process::exit(MISMATCH_EXIT);
    }
    Ok(())
}
