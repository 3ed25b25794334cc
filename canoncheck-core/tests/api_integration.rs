//! Integration tests that call the real Claude API.
//!
//! These tests require ANTHROPIC_API_KEY to be set (via .env file or environment).
//! Run with: `cargo test -p canoncheck-core --test api_integration -- --ignored`

use canoncheck_core::oracle::Oracle;
use canoncheck_core::{
    AnalysisConfig, ClaimVerifier, ClaudeOracle, HashingEmbedder, Label, OracleClaimExtractor,
    Pipeline, Retrying,
};
use std::sync::Arc;

/// Load environment variables from .env file
fn setup() {
    let _ = dotenvy::dotenv();
}

/// Check if API key is available
fn has_api_key() -> bool {
    std::env::var("ANTHROPIC_API_KEY").is_ok()
}

#[tokio::test]
#[ignore]
async fn test_oracle_answers() {
    setup();
    if !has_api_key() {
        eprintln!("Skipping test: ANTHROPIC_API_KEY not set");
        return;
    }

    let oracle = ClaudeOracle::from_env().expect("Failed to create oracle");
    let answer = oracle.complete("Reply with the single word: ready").await.unwrap();
    assert!(answer.to_lowercase().contains("ready"), "got: {answer}");
}

#[tokio::test]
#[ignore]
async fn test_verifier_detects_contradiction() {
    setup();
    if !has_api_key() {
        eprintln!("Skipping test: ANTHROPIC_API_KEY not set");
        return;
    }

    let verifier = ClaimVerifier::new(Retrying::new(
        ClaudeOracle::from_env().expect("Failed to create oracle"),
    ));
    let evidence = vec!["Alice lived in Paris in 1990. She worked as a teacher.".to_string()];
    let verdict = verifier.verify("Alice was a doctor.", &evidence).await;

    println!("{verdict:?}");
    assert_ne!(verdict.label, Label::Support);
}

#[tokio::test]
#[ignore]
async fn test_full_analysis() {
    setup();
    if !has_api_key() {
        eprintln!("Skipping test: ANTHROPIC_API_KEY not set");
        return;
    }

    let oracle = Arc::new(Retrying::new(
        ClaudeOracle::from_env().expect("Failed to create oracle"),
    ));
    let pipeline = Pipeline::new(
        HashingEmbedder::default(),
        Arc::clone(&oracle),
        OracleClaimExtractor::new(oracle),
        AnalysisConfig::best(),
    )
    .expect("valid config");

    let analysis = pipeline
        .analyze(
            "Alice lived in Paris in 1990. She worked as a teacher at a small school.",
            "Alice lived in Paris and worked as a teacher.",
        )
        .await
        .unwrap();

    println!("{analysis}");
    assert!(!analysis.rows.is_empty());
    assert!((10.0..=95.0).contains(&analysis.decision.confidence));
}
