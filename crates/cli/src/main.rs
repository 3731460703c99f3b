#![deny(warnings)]

mod input;

use anyhow::Context;
use clap::Parser;
use input::DecodedAudio;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use voice_biomarker_core::config::{
    resolve_parsed, resolve_parsed_with_default, Env, StdEnv, ENV_QUEUE_CAPACITY,
    ENV_SAMPLE_RATE, ENV_WORKERS,
};
use voice_biomarker_core::{
    session, AnalysisPool, AnalysisRequest, DetectionResult, EmotionEngine, EngineConfig,
    PoolConfig, SessionProfile,
};

#[derive(Parser, Debug)]
#[command(name = "voice-biomarker")]
#[command(about = "Emotion and medical-indicator analysis of recorded speech")]
struct Args {
    /// WAV files (or raw f32le files with --raw-f32) to analyze.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Treat inputs as headerless little-endian f32 mono samples.
    #[arg(long)]
    raw_f32: bool,

    /// Sample rate for raw input and the engine default.
    #[arg(long)]
    sample_rate: Option<u32>,

    #[arg(long)]
    no_temporal: bool,

    /// JSON engine configuration; unset fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    workers: Option<usize>,

    #[arg(long)]
    queue_capacity: Option<usize>,

    #[arg(long)]
    pretty: bool,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Serialize)]
struct FileReport<'a> {
    file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a DetectionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct ProfileReport<'a> {
    profile: &'a SessionProfile,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let env = StdEnv;
    let engine_config = build_engine_config(&args, &env)?;
    let pool_config = build_pool_config(&args, &env)?;

    tracing::info!(
        files = args.files.len(),
        sample_rate = engine_config.sample_rate,
        workers = pool_config.workers,
        queue_capacity = pool_config.queue_capacity,
        "config loaded"
    );

    run(args, engine_config, pool_config).await
}

async fn run(args: Args, engine_config: EngineConfig, pool_config: PoolConfig) -> anyhow::Result<()> {
    let default_rate = engine_config.sample_rate;
    let engine = Arc::new(EmotionEngine::new(engine_config).context("invalid engine config")?);
    let pool = AnalysisPool::start(engine, pool_config);

    let mut pending = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let submitted = match decode(path.clone(), args.raw_f32, default_rate).await {
            Ok(audio) => {
                let mut request =
                    AnalysisRequest::new(audio.samples).with_sample_rate(audio.sample_rate);
                if args.no_temporal {
                    request = request.with_temporal(false);
                }
                pool.submit(request).await.map_err(anyhow::Error::from)
            }
            Err(e) => Err(e),
        };
        pending.push((path.display().to_string(), submitted));
    }

    let mut results = Vec::new();
    let mut failures = 0usize;
    for (file, submitted) in pending {
        let outcome = match submitted {
            Ok(handle) => handle.wait().await.map_err(anyhow::Error::from),
            Err(e) => Err(e),
        };
        match outcome {
            Ok(result) => {
                emit(
                    &FileReport {
                        file,
                        result: Some(&result),
                        error: None,
                    },
                    args.pretty,
                )?;
                results.push(result);
            }
            Err(e) => {
                failures += 1;
                tracing::warn!(file = %file, error = %format!("{e:#}"), "analysis failed");
                emit(
                    &FileReport {
                        file,
                        result: None,
                        error: Some(format!("{e:#}")),
                    },
                    args.pretty,
                )?;
            }
        }
    }

    pool.shutdown().await;

    if args.files.len() >= 2 {
        if let Some(profile) = session::aggregate(&results) {
            emit(&ProfileReport { profile: &profile }, args.pretty)?;
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} of {} files failed", args.files.len());
    }
    Ok(())
}

/// Reads one input file on the blocking pool.
async fn decode(path: PathBuf, raw_f32: bool, sample_rate: u32) -> anyhow::Result<DecodedAudio> {
    tokio::task::spawn_blocking(move || {
        if raw_f32 {
            input::read_raw_f32(&path, sample_rate)
        } else {
            input::read_wav(&path)
        }
    })
    .await
    .context("decoder task failed")?
}

fn emit(value: &impl Serialize, pretty: bool) -> anyhow::Result<()> {
    let line = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{line}");
    Ok(())
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(
            level
                .parse()
                .with_context(|| format!("invalid --log-level: {level}"))?,
        )
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn build_engine_config(args: &Args, env: &impl Env) -> anyhow::Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            EngineConfig::from_json(&raw)
                .with_context(|| format!("invalid config {}", path.display()))?
        }
        None => EngineConfig::default(),
    };

    if let Some(rate) = resolve_parsed(args.sample_rate, ENV_SAMPLE_RATE, env)? {
        config.sample_rate = rate;
    }
    if args.no_temporal {
        config.enable_temporal_analysis = false;
    }
    config.validate()?;
    Ok(config)
}

fn build_pool_config(args: &Args, env: &impl Env) -> anyhow::Result<PoolConfig> {
    let defaults = PoolConfig::default();
    let workers = resolve_parsed_with_default(args.workers, ENV_WORKERS, env, defaults.workers)?;
    let queue_capacity = resolve_parsed_with_default(
        args.queue_capacity,
        ENV_QUEUE_CAPACITY,
        env,
        workers.saturating_mul(4),
    )?;
    Ok(PoolConfig::new(workers, queue_capacity)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_biomarker_core::config::MapEnv;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["voice-biomarker"];
        argv.extend_from_slice(extra);
        argv.push("clip.wav");
        Args::parse_from(argv)
    }

    #[test]
    fn requires_at_least_one_file() {
        assert!(Args::try_parse_from(["voice-biomarker"]).is_err());
    }

    #[test]
    fn sample_rate_flag_beats_env() {
        let env = MapEnv::default().with_var(ENV_SAMPLE_RATE, "8000");
        let config = build_engine_config(&args(&["--sample-rate", "22050"]), &env).unwrap();
        assert_eq!(config.sample_rate, 22_050);
        let config = build_engine_config(&args(&[]), &env).unwrap();
        assert_eq!(config.sample_rate, 8_000);
    }

    #[test]
    fn no_temporal_disables_segmentation() {
        let config = build_engine_config(&args(&["--no-temporal"]), &MapEnv::default()).unwrap();
        assert!(!config.enable_temporal_analysis);
    }

    #[test]
    fn zero_sample_rate_from_env_is_rejected() {
        let env = MapEnv::default().with_var(ENV_SAMPLE_RATE, "0");
        assert!(build_engine_config(&args(&[]), &env).is_err());
    }

    #[test]
    fn pool_sizing_from_env() {
        let env = MapEnv::default().with_var(ENV_WORKERS, "3");
        let pool = build_pool_config(&args(&[]), &env).unwrap();
        assert_eq!(pool.workers, 3);
        assert_eq!(pool.queue_capacity, 12);

        let pool = build_pool_config(&args(&["--queue-capacity", "5"]), &env).unwrap();
        assert_eq!(pool.queue_capacity, 5);
    }

    #[test]
    fn zero_workers_rejected() {
        assert!(build_pool_config(&args(&["--workers", "0"]), &MapEnv::default()).is_err());
    }

    #[tokio::test]
    async fn decodes_raw_input_off_the_runtime_thread() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.f32");
        let bytes: Vec<u8> = [0.25f32, -0.5].iter().flat_map(|s| s.to_le_bytes()).collect();
        std::fs::write(&path, bytes).unwrap();

        let audio = decode(path, true, 8_000).await.unwrap();
        assert_eq!(audio.samples, vec![0.25, -0.5]);
        assert_eq!(audio.sample_rate, 8_000);
    }

    #[tokio::test]
    async fn decode_failure_names_the_file() {
        let err = decode(PathBuf::from("/no/such/take.wav"), false, 16_000)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("take.wav"));
    }

    #[test]
    fn config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{"enable_medical_emotions": false, "pitch_max_hz": 500}"#).unwrap();
        let path_arg = path.display().to_string();
        let config = build_engine_config(&args(&["--config", &path_arg]), &MapEnv::default()).unwrap();
        assert!(!config.enable_medical_emotions);
        assert_eq!(config.pitch_max_hz, 500.0);
    }
}
