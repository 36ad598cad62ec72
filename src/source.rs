//! Symbol sources — files on disk turned into observation streams
//!
//! The predictor never reads input itself. This module finds input files
//! (a single file or a directory walked recursively and filtered by a glob),
//! tokenizes them into symbols, and pairs consecutive symbols into
//! `(cause, effect)` observations.

use anyhow::Context;
use globset::Glob;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use walkdir::WalkDir;

/// How text is split into symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TokenMode {
    /// One symbol per character, whitespace included.
    #[default]
    Chars,
    /// Words and punctuation marks; whitespace is dropped.
    Words,
}

fn word_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\w+|[^\w\s]").expect("word pattern is valid"))
}

pub fn tokenize(text: &str, mode: TokenMode, lowercase: bool) -> Vec<String> {
    let text = if lowercase {
        text.to_lowercase()
    } else {
        text.to_string()
    };
    match mode {
        TokenMode::Chars => text.chars().map(String::from).collect(),
        TokenMode::Words => word_pattern()
            .find_iter(&text)
            .map(|m| m.as_str().to_string())
            .collect(),
    }
}

pub fn read_symbols(path: &Path, mode: TokenMode, lowercase: bool) -> anyhow::Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(tokenize(&text, mode, lowercase))
}

/// Input files under `path`, sorted. A file is returned as-is regardless of
/// the glob; directories are walked and filtered by file name.
pub fn collect_inputs(path: &Path, glob: &str) -> anyhow::Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        anyhow::bail!("input not found: {}", path.display());
    }

    let matcher = Glob::new(glob)
        .with_context(|| format!("invalid glob: {}", glob))?
        .compile_matcher();
    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| matcher.is_match(e.file_name()))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    Ok(files)
}

/// Tokenize every input under `path` and concatenate the streams in file order.
pub fn load_stream(
    path: &Path,
    glob: &str,
    mode: TokenMode,
    lowercase: bool,
) -> anyhow::Result<(Vec<PathBuf>, Vec<String>)> {
    let files = collect_inputs(path, glob)?;
    if files.is_empty() {
        anyhow::bail!("no files matching {} under {}", glob, path.display());
    }
    let mut symbols = Vec::new();
    for file in &files {
        let mut part = read_symbols(file, mode, lowercase)?;
        tracing::debug!("{}: {} symbols", file.display(), part.len());
        symbols.append(&mut part);
    }
    Ok((files, symbols))
}

/// Consecutive `(cause, effect)` pairs.
pub fn pairs<S>(symbols: &[S]) -> impl Iterator<Item = (&S, &S)> {
    symbols.windows(2).map(|w| (&w[0], &w[1]))
}
