// ============================================================================
// bond - command-line worker for the Bond profile matcher
// ============================================================================
// Usage:
//   bond ingest --bucket B --key K         Transcribe and store a profile
//   bond ingest --event event.json         Same, from an upload event
//   bond compare alice bob                 Similarity with enrichment
//   bond request req.json | -              Raw similarity request envelope
//   bond put --key uploads/a.mp3 --file a.mp3
//   bond show alice                        Print a stored profile
//   bond embed "text one" "text two"       Batch embeddings
// ============================================================================

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use bond_core::store::keys;
use bond_core::{
    handle_similarity_request, handle_upload_event, Artifacts, BedrockClient, BondConfig,
    EmbeddingGenerator, Enricher, IngestionPipeline, ProfileExtractor, RecordingRef, RedbBackend,
    SimilarityService, Transcriber, UploadEvent, WhisperApiEngine,
};
use bond_core::{ApiRequest, Profile, Vector};

/// Bond profile matcher worker
#[derive(Parser)]
#[command(name = "bond", version, about = "Ingest voice recordings and compare profiles")]
struct Cli {
    /// Path to the artifact database (default: ~/.bond/artifacts.redb)
    #[arg(long, global = true)]
    store_path: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ingestion pipeline for one recording
    Ingest {
        #[arg(long, requires = "key", conflicts_with = "event")]
        bucket: Option<String>,

        #[arg(long, requires = "bucket")]
        key: Option<String>,

        /// Upload event JSON file
        #[arg(long)]
        event: Option<String>,
    },

    /// Compare two stored profiles
    Compare { profile_a: String, profile_b: String },

    /// Handle a raw similarity request envelope (file path or '-' for stdin)
    Request { input: String },

    /// Store a local file in the artifact store
    Put {
        #[arg(long)]
        key: String,

        #[arg(long)]
        file: String,

        /// Defaults from the file extension
        #[arg(long)]
        content_type: Option<String>,
    },

    /// Print a stored profile and its vector size
    Show { id: String },

    /// Embed one or more texts in a single call
    Embed {
        #[arg(required = true)]
        texts: Vec<String>,
    },
}

/// Everything one invocation needs, built once
struct Worker {
    config: BondConfig,
    artifacts: Artifacts,
    embedder: EmbeddingGenerator,
    pipeline: IngestionPipeline,
    similarity: SimilarityService,
}

impl Worker {
    fn build(config: BondConfig, store_path: Option<&str>) -> Result<Self> {
        let backend = RedbBackend::open(store_path.or(config.store_path.as_deref()))?;
        info!("Artifact store: {}", backend.path().display());
        let artifacts = Artifacts::new(Arc::new(backend), config.bucket.clone());

        if config.bedrock_api_key.is_none() {
            warn!("AWS_BEARER_TOKEN_BEDROCK not set; Bedrock calls will be unauthenticated");
        }
        let bedrock = Arc::new(BedrockClient::from_config(&config));

        let engine = Arc::new(WhisperApiEngine::from_config(&config, artifacts.clone()));
        let transcriber = Arc::new(Transcriber::new(
            engine,
            artifacts.clone(),
            config.language_code.clone(),
        ));

        let pipeline = IngestionPipeline::new(
            artifacts.clone(),
            transcriber,
            ProfileExtractor::new(bedrock.clone()),
            EmbeddingGenerator::from_config(bedrock.clone(), &config),
        );
        let similarity = SimilarityService::new(artifacts.clone(), Enricher::new(bedrock.clone()));

        Ok(Self {
            embedder: EmbeddingGenerator::from_config(bedrock, &config),
            config,
            artifacts,
            pipeline,
            similarity,
        })
    }
}

fn init_logging() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("bond=info".parse()?)
                .add_directive("bond_core=debug".parse()?),
        )
        .init();
    Ok(())
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(input).with_context(|| format!("Failed to read {}", input))
}

fn guess_content_type(file: &str) -> &'static str {
    match Path::new(file)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("mp3") => "audio/mpeg",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Warning: Could not load .env file: {}", e);
    }
    init_logging()?;

    let cli = Cli::parse();
    let worker = Worker::build(BondConfig::from_env(), cli.store_path.as_deref())?;

    match cli.command {
        Commands::Ingest { bucket, key, event } => cmd_ingest(&worker, bucket, key, event).await,
        Commands::Compare {
            profile_a,
            profile_b,
        } => cmd_compare(&worker, &profile_a, &profile_b).await,
        Commands::Request { input } => cmd_request(&worker, &input).await,
        Commands::Put {
            key,
            file,
            content_type,
        } => cmd_put(&worker, &key, &file, content_type).await,
        Commands::Show { id } => cmd_show(&worker, &id).await,
        Commands::Embed { texts } => cmd_embed(&worker, &texts).await,
    }
}

async fn cmd_ingest(
    worker: &Worker,
    bucket: Option<String>,
    key: Option<String>,
    event: Option<String>,
) -> Result<()> {
    let response = match (bucket, key, event) {
        (_, _, Some(path)) => {
            let event: UploadEvent = serde_json::from_str(&read_input(&path)?)
                .with_context(|| format!("Invalid upload event in {}", path))?;
            handle_upload_event(&worker.pipeline, &event).await?
        }
        (Some(bucket), Some(key), None) => {
            let report = worker.pipeline.ingest(&RecordingRef::new(bucket, key)).await?;
            let mut body = serde_json::to_value(&report)?;
            body["ingested_at"] = serde_json::json!(Utc::now().to_rfc3339());
            println!("{}", serde_json::to_string_pretty(&body)?);
            return Ok(());
        }
        _ => anyhow::bail!("Provide --bucket and --key, or --event"),
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn cmd_compare(worker: &Worker, profile_a: &str, profile_b: &str) -> Result<()> {
    let report = worker.similarity.compare(profile_a, profile_b).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn cmd_request(worker: &Worker, input: &str) -> Result<()> {
    let request: ApiRequest =
        serde_json::from_str(&read_input(input)?).context("Invalid request envelope")?;
    let response = handle_similarity_request(&worker.similarity, &request).await;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn cmd_put(worker: &Worker, key: &str, file: &str, content_type: Option<String>) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {}", file))?;
    let content_type = content_type.unwrap_or_else(|| guess_content_type(file).to_string());
    let size = bytes.len();

    worker.artifacts.write_bytes(key, bytes, &content_type).await?;
    println!(
        "Stored s3://{}/{} ({} bytes, {})",
        worker.config.bucket, key, size, content_type
    );
    Ok(())
}

async fn cmd_show(worker: &Worker, id: &str) -> Result<()> {
    let id = bond_core::sanitize_id(id);
    if id.is_empty() {
        anyhow::bail!("Profile id must not be empty");
    }

    let profile: Profile = worker.artifacts.read_json(&keys::profile(&id)).await?;
    let dimensions = match worker.artifacts.read_json::<Vector>(&keys::vector(&id)).await {
        Ok(vector) => Some(vector.len()),
        Err(e) => {
            warn!("No usable vector for {}: {}", id, e);
            None
        }
    };

    let output = serde_json::json!({
        "id": id,
        "profile": profile,
        "flattened": bond_core::flatten_profile(&profile),
        "vector_dimensions": dimensions,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn cmd_embed(worker: &Worker, texts: &[String]) -> Result<()> {
    let vectors = worker.embedder.embed_texts(texts).await?;
    if vectors.is_empty() {
        return Err(anyhow!("No embeddings returned"));
    }

    let output: Vec<_> = texts
        .iter()
        .zip(vectors.iter())
        .map(|(text, vector)| {
            serde_json::json!({
                "text": text,
                "dimensions": vector.len(),
                "embedding": vector,
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type("alice.MP3"), "audio/mpeg");
        assert_eq!(guess_content_type("t/alice.json"), "application/json");
        assert_eq!(guess_content_type("blob"), "application/octet-stream");
    }

    #[test]
    fn test_cli_parses_commands() {
        let cli = Cli::try_parse_from(["bond", "--store-path", "/tmp/x.redb", "compare", "alice", "bob"]).unwrap();
        assert_eq!(cli.store_path.as_deref(), Some("/tmp/x.redb"));
        assert!(matches!(cli.command, Commands::Compare { .. }));

        let cli = Cli::try_parse_from(["bond", "ingest", "--bucket", "b", "--key", "k.mp3"]).unwrap();
        assert!(matches!(cli.command, Commands::Ingest { event: None, .. }));

        assert!(Cli::try_parse_from(["bond", "ingest", "--bucket", "b"]).is_err());
        assert!(Cli::try_parse_from(["bond", "embed"]).is_err());
    }
}
