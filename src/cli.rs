use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "Subtitle generation and bilingual translation", long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Transcribe an audio or video file to SRT
    Transcribe {
        /// Input audio or video file
        input: PathBuf,

        /// Output SRT file; prints to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Whisper model name (e.g. tiny, base, small, medium, large)
        #[arg(short, long)]
        model: Option<String>,

        /// Transcribe even when the video carries embedded subtitle streams
        #[arg(long)]
        force_transcribe: bool,

        /// Extract this embedded subtitle stream instead of transcribing
        #[arg(long)]
        subtitle_stream: Option<usize>,
    },

    /// Translate an SRT file into a bilingual SRT using an LLM
    Translate {
        /// Input SRT file; reads from stdin when omitted
        input: Option<PathBuf>,

        /// Output bilingual SRT file; prints to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Target language for translation (e.g. Chinese, Japanese)
        #[arg(short, long)]
        target_language: Option<String>,

        /// Base URL of an OpenAI-compatible chat-completions API
        #[arg(long)]
        api_base_url: Option<String>,

        /// API key for the LLM provider
        #[arg(long)]
        api_key: Option<String>,

        /// Model to use for translation
        #[arg(long)]
        model: Option<String>,

        /// Maximum number of concurrent translation requests
        #[arg(long)]
        max_workers: Option<usize>,

        /// Serialized-size budget per request chunk, in characters
        #[arg(long)]
        chunk_size_limit: Option<usize>,

        /// List the models available at the API endpoint and exit
        #[arg(long)]
        list_models: bool,
    },

    /// Manage configuration settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the configuration file path
    Path,

    /// Write a default configuration file
    Init,
}
