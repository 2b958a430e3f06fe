//! Sublate - subtitle generation and bilingual translation.
//!
//! Transcribes audio and video with whisper, extracts embedded subtitle
//! tracks with ffmpeg, and translates SRT files into bilingual subtitles
//! through an OpenAI-compatible LLM endpoint.

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{Level, info, warn};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use sublate::cli::{Args, Commands, ConfigAction};
use sublate::config::{self, Config};
use sublate::media::MediaProbe;
use sublate::subtitle::{parse_srt, to_bilingual_srt, to_srt};
use sublate::transcribe::Transcriber;
use sublate::translate::{LlmTranslator, translate_segments};

/// Video container extensions that may carry embedded subtitle streams.
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "webm"];

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.verbose)?;

    let config = load_config(args.config.as_deref())?;

    tokio::select! {
        result = run(args.command, config) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, shutting down");
            std::process::exit(130);
        }
    }
}

async fn run(command: Commands, mut config: Config) -> Result<()> {
    match command {
        Commands::Transcribe {
            input,
            output,
            model,
            force_transcribe,
            subtitle_stream,
        } => {
            run_transcribe(
                &config,
                &input,
                output.as_deref(),
                model.as_deref(),
                force_transcribe,
                subtitle_stream,
            )
            .await
        }
        Commands::Translate {
            input,
            output,
            target_language,
            api_base_url,
            api_key,
            model,
            max_workers,
            chunk_size_limit,
            list_models,
        } => {
            let translate = &mut config.translate;
            if let Some(value) = target_language {
                translate.target_language = value;
            }
            if let Some(value) = api_base_url {
                translate.api_base_url = value;
            }
            if let Some(value) = api_key {
                translate.api_key = value;
            }
            if let Some(value) = model {
                translate.model = value;
            }
            if let Some(value) = max_workers {
                translate.max_workers = value;
            }
            if let Some(value) = chunk_size_limit {
                translate.chunk_size_limit = value;
            }

            if list_models {
                return run_list_models(&config).await;
            }

            run_translate(&config, input.as_deref(), output.as_deref()).await
        }
        Commands::Config { action } => run_config(action),
    }
}

async fn run_transcribe(
    config: &Config,
    input: &Path,
    output: Option<&Path>,
    model: Option<&str>,
    force_transcribe: bool,
    subtitle_stream: Option<usize>,
) -> Result<()> {
    if !input.exists() {
        return Err(sublate::error::SublateError::FileNotFound(
            input.display().to_string(),
        )
        .into());
    }

    let probe = MediaProbe::new(config.media.clone());

    // An explicit stream selection skips transcription entirely.
    if let Some(stream_index) = subtitle_stream {
        let srt = probe.extract_subtitle(input, stream_index).await?;
        // Parse and re-serialize so the output is normalized SRT.
        let segments = parse_srt(&srt)?;
        return write_output(output, &to_srt(&segments));
    }

    // Video containers often already carry subtitles. List them and stop
    // so the operator can pick one, unless transcription was forced.
    if !force_transcribe && is_video_file(input) {
        let streams = probe.probe_subtitle_streams(input).await?;
        if !streams.is_empty() {
            println!("Embedded subtitle streams found in {}:", input.display());
            for stream in &streams {
                println!("  [{}] {} - {}", stream.index, stream.language, stream.title);
            }
            println!(
                "Re-run with --subtitle-stream <N> to extract one, or --force-transcribe to transcribe anyway."
            );
            return Ok(());
        }
    }

    let transcriber = Transcriber::new(config.transcriber.clone());
    let segments = transcriber.transcribe(input, model).await?;

    write_output(output, &to_srt(&segments))
}

async fn run_list_models(config: &Config) -> Result<()> {
    config.translate.validate_credentials()?;

    let translator = LlmTranslator::new(config.translate.clone())?;
    let models = translator.list_models().await?;

    println!("Available models:");
    for model in models {
        println!(" - {}", model);
    }
    Ok(())
}

async fn run_translate(
    config: &Config,
    input: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    config.translate.validate_credentials()?;

    let content = match input {
        Some(path) => {
            if !path.exists() {
                return Err(sublate::error::SublateError::FileNotFound(
                    path.display().to_string(),
                )
                .into());
            }
            tokio::fs::read_to_string(path).await?
        }
        None => {
            let mut buffer = String::new();
            tokio::io::stdin().read_to_string(&mut buffer).await?;
            buffer
        }
    };

    let segments = parse_srt(&content)?;
    info!("Parsed {} subtitle segments", segments.len());

    let translator = Arc::new(LlmTranslator::new(config.translate.clone())?);
    let bilingual = translate_segments(
        translator,
        &segments,
        &config.translate.target_language,
        config.translate.max_workers,
        config.translate.chunk_size_limit,
    )
    .await?;

    write_output(output, &to_bilingual_srt(&bilingual))
}

fn run_config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Path => {
            println!("{}", config::default_path().display());
        }
        ConfigAction::Init => {
            let path = config::default_path();
            if path.exists() {
                return Err(sublate::error::SublateError::Config(format!(
                    "{} already exists",
                    path.display()
                ))
                .into());
            }
            Config::default().save_to_file(&path)?;
            println!("Wrote default configuration to {}", path.display());
        }
    }
    Ok(())
}

/// Write subtitle content to a file, or to stdout when no path is given.
/// Stdout carries only subtitle data; diagnostics go to stderr.
fn write_output(output: Option<&Path>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)?;
            info!("Wrote {}", path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}

fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(path) => Ok(Config::from_file(path)?),
        None => {
            let default = config::default_path();
            if default.exists() {
                info!("Loading {}", default.display());
                Ok(Config::from_file(&default)?)
            } else {
                Ok(Config::default())
            }
        }
    }
}

/// Setup logging to console (stderr) and a daily-rotated file. Stdout is
/// reserved for subtitle output, so the console layer writes to stderr.
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = PathBuf::from(".sublate").join("log");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = rolling::daily(&log_dir, "sublate.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    let log_level = if verbose || std::env::var("SUBLATE_DEBUG").is_ok() {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
