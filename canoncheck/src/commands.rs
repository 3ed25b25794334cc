//! Command handlers.

use crate::{BatchArgs, CheckArgs, TuningArgs};
use canoncheck_core::config::cache_dir_from_env;
use canoncheck_core::embedding::Embedder;
use canoncheck_core::oracle::Oracle;
use canoncheck_core::{
    AnalysisConfig, BackstoryInput, Cached, ClaudeOracle, HashingEmbedder, HttpEmbedder,
    IndexCache, JsonLinesStore, MemoryStore, OracleClaimExtractor, Pipeline, Retrying,
};
use std::error::Error;
use std::path::Path;
use std::sync::Arc;

type BoxError = Box<dyn Error>;

type CliPipeline =
    Pipeline<Arc<dyn Embedder>, Arc<dyn Oracle>, OracleClaimExtractor<Arc<dyn Oracle>>>;

pub async fn check(args: CheckArgs) -> Result<(), BoxError> {
    let (story_path, backstory_path) = match (&args.story, &args.backstory) {
        (Some(s), Some(b)) => (s, b),
        _ => return Err("both --story and --backstory are required".into()),
    };
    let story = read_text(story_path).await?;
    let backstory = read_text(backstory_path).await?;

    let pipeline = build_pipeline(&args.tuning)?;
    let analysis = pipeline.analyze(&story, &backstory).await?;

    let json = serde_json::to_string_pretty(&analysis)?;
    if args.json {
        println!("{json}");
    } else {
        print!("{analysis}");
    }
    if let Some(out) = &args.out {
        tokio::fs::write(out, json).await?;
        tracing::info!(path = %out.display(), "wrote analysis");
    }
    Ok(())
}

pub async fn batch(args: BatchArgs) -> Result<(), BoxError> {
    let story = read_text(&args.story).await?;
    let inputs = read_backstories(&args.input).await?;
    tracing::info!(count = inputs.len(), "loaded backstories");

    let pipeline = build_pipeline(&args.tuning)?;
    let records = pipeline.analyze_batch(&story, &inputs).await?;

    let mut lines = String::new();
    for record in &records {
        println!("{}\t{}\t{:.2}", record.id, record.flag, record.confidence);
        lines.push_str(&serde_json::to_string(record)?);
        lines.push('\n');
    }
    if let Some(out) = &args.out {
        tokio::fs::write(out, lines).await?;
        tracing::info!(path = %out.display(), records = records.len(), "wrote batch results");
    }
    Ok(())
}

fn build_config(tuning: &TuningArgs) -> AnalysisConfig {
    let mut config = AnalysisConfig::best();
    if let Some(k) = tuning.k {
        config = config.with_k(k);
    }
    if let Some(alpha) = tuning.alpha {
        config = config.with_alpha(alpha);
    }
    if tuning.chunk_size.is_some() || tuning.overlap.is_some() {
        let chunk_size = tuning.chunk_size.unwrap_or(config.chunk_size);
        let overlap = tuning.overlap.unwrap_or(config.chunk_overlap);
        config = config.with_chunking(chunk_size, overlap);
    }
    if let Some(concurrency) = tuning.concurrency {
        config = config.with_concurrency(concurrency);
    }
    config
}

fn build_embedder() -> Result<Arc<dyn Embedder>, BoxError> {
    match HttpEmbedder::from_env() {
        Some(embedder) => {
            let embedder = embedder?;
            tracing::info!(model = embedder.model_id(), "using HTTP embeddings");
            Ok(Arc::new(embedder))
        }
        None => {
            tracing::info!("no embedding provider configured, using local hashing embeddings");
            Ok(Arc::new(HashingEmbedder::default()))
        }
    }
}

fn build_oracle(tuning: &TuningArgs) -> Result<Arc<dyn Oracle>, BoxError> {
    let oracle = Retrying::new(ClaudeOracle::from_env()?);
    if tuning.no_cache {
        return Ok(Arc::new(Cached::new(oracle, MemoryStore::new())));
    }
    let path = cache_dir_from_env().join("responses.jsonl");
    Ok(Arc::new(Cached::new(oracle, JsonLinesStore::new(path))))
}

fn build_pipeline(tuning: &TuningArgs) -> Result<CliPipeline, BoxError> {
    let config = build_config(tuning);
    let oracle = build_oracle(tuning)?;
    let pipeline = Pipeline::new(
        build_embedder()?,
        Arc::clone(&oracle),
        OracleClaimExtractor::new(oracle),
        config,
    )?;

    if tuning.no_cache {
        return Ok(pipeline);
    }
    let dir = cache_dir_from_env().join("index");
    tracing::debug!(dir = %dir.display(), "persisting evidence indexes");
    Ok(pipeline.with_cache(Arc::new(IndexCache::with_dir(dir))))
}

async fn read_text(path: &Path) -> Result<String, BoxError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("cannot read {}: {e}", path.display()).into())
}

async fn read_backstories(path: &Path) -> Result<Vec<BackstoryInput>, BoxError> {
    let content = read_text(path).await?;
    let mut inputs = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let input: BackstoryInput = serde_json::from_str(line)
            .map_err(|e| format!("{}:{}: {e}", path.display(), line_no + 1))?;
        inputs.push(input);
    }
    Ok(inputs)
}
