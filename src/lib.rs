//! Sublate - Subtitle Generation and Bilingual Translation
//!
//! A command-line tool that transcribes media files with a whisper CLI,
//! extracts embedded subtitle streams with ffmpeg, and translates SRT
//! subtitles into bilingual subtitles through an OpenAI-compatible
//! chat-completions endpoint.

pub mod cli;
pub mod config;
pub mod error;
pub mod media;
pub mod subtitle;
pub mod transcribe;
pub mod translate;
