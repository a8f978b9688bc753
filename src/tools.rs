//! External fetch and transcode collaborators.
//!
//! Both are plain subprocesses: a yt-dlp style downloader and ffmpeg. Failure is
//! signalled by nonzero exit status only; there are no timeouts. The command
//! lines can be overridden through the environment, which is also how tests swap
//! in stubs, so the override strings are parsed with shell quoting rules.
use crate::catalog::SourceType;
use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::Path;
use std::process::Command;
use tracing::debug;

pub const FETCH_CMD_ENV: &str = "CLIPKEEPER_FETCH_CMD";
pub const TRANSCODE_CMD_ENV: &str = "CLIPKEEPER_TRANSCODE_CMD";

/// Downloads source media, leaving a `.part` sentinel beside the destination
/// while the transfer is in progress (yt-dlp behavior; the pipeline's wait loop
/// relies on it).
pub trait MediaFetcher {
    fn fetch(
        &self,
        source_type: SourceType,
        source_id: &str,
        format_code: u32,
        dest: &Path,
    ) -> Result<()>;
}

/// One transcode invocation: trim, strip video, tag, write the artifact.
#[derive(Debug)]
pub struct TranscodeJob<'a> {
    pub source: &'a Path,
    pub output: &'a Path,
    pub trim_start: Option<&'a str>,
    pub trim_end: Option<&'a str>,
    pub title: &'a str,
    pub artist: &'a str,
    pub performer: &'a str,
}

pub trait Transcoder {
    fn transcode(&self, job: &TranscodeJob<'_>) -> Result<()>;
}

fn resolve_argv(env_key: &str, candidates: &[&str]) -> Result<Vec<String>> {
    if let Ok(raw) = env::var(env_key) {
        let argv = shell_words::split(&raw)
            .with_context(|| format!("parse {env_key}"))?;
        if argv.is_empty() {
            bail!("{env_key} is set but empty");
        }
        return Ok(argv);
    }
    for candidate in candidates {
        if let Ok(path) = which::which(candidate) {
            return Ok(vec![path.display().to_string()]);
        }
    }
    Err(anyhow!(
        "none of {candidates:?} found on PATH (set {env_key} to override)"
    ))
}

fn run_checked(mut cmd: Command, what: &str) -> Result<()> {
    debug!(?cmd, "run {what}");
    let output = cmd
        .output()
        .with_context(|| format!("spawn {what} command"))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("{what} exited with {}: {}", output.status, stderr.trim());
    }
    Ok(())
}

/// yt-dlp (or youtube-dl) behind [`MediaFetcher`].
pub struct CommandFetcher {
    argv: Vec<String>,
}

impl CommandFetcher {
    pub fn from_env() -> Result<Self> {
        let argv = resolve_argv(FETCH_CMD_ENV, &["yt-dlp", "youtube-dl"])?;
        Ok(Self { argv })
    }
}

impl MediaFetcher for CommandFetcher {
    fn fetch(
        &self,
        source_type: SourceType,
        source_id: &str,
        format_code: u32,
        dest: &Path,
    ) -> Result<()> {
        let mut cmd = Command::new(&self.argv[0]);
        cmd.args(&self.argv[1..])
            .arg("-f")
            .arg(format_code.to_string())
            .arg("-o")
            .arg(dest)
            .arg(source_type.watch_url(source_id));
        run_checked(cmd, "fetch")
    }
}

/// ffmpeg behind [`Transcoder`]: audio stream copied, video dropped, metadata
/// tags embedded, trim flags only when the catalog provides trim points.
pub struct CommandTranscoder {
    argv: Vec<String>,
}

impl CommandTranscoder {
    pub fn from_env() -> Result<Self> {
        let argv = resolve_argv(TRANSCODE_CMD_ENV, &["ffmpeg"])?;
        Ok(Self { argv })
    }
}

impl Transcoder for CommandTranscoder {
    fn transcode(&self, job: &TranscodeJob<'_>) -> Result<()> {
        let mut cmd = Command::new(&self.argv[0]);
        cmd.args(&self.argv[1..])
            .arg("-i")
            .arg(job.source)
            .args(["-acodec", "copy", "-vn"]);
        if let Some(start) = job.trim_start {
            cmd.args(["-ss", start]);
        }
        if let Some(end) = job.trim_end {
            cmd.args(["-to", end]);
        }
        cmd.arg("-metadata")
            .arg(format!("title={}", job.title))
            .arg("-metadata")
            .arg(format!("artist={}", job.artist));
        if !job.performer.is_empty() {
            cmd.arg("-metadata")
                .arg(format!("performer={}", job.performer));
        }
        cmd.arg(job.output);
        run_checked(cmd, "transcode")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_command_is_shell_split() {
        // Serialized env access is not worth the ceremony here; the key is
        // unique to this test.
        env::set_var("CLIPKEEPER_TEST_ARGV", "/bin/echo --quiet 'two words'");
        let argv = resolve_argv("CLIPKEEPER_TEST_ARGV", &[]).expect("parse");
        assert_eq!(argv, vec!["/bin/echo", "--quiet", "two words"]);
        env::remove_var("CLIPKEEPER_TEST_ARGV");
    }

    #[test]
    fn missing_tool_without_override_is_an_error() {
        let result = resolve_argv("CLIPKEEPER_TEST_UNSET", &["definitely-not-a-real-tool-name"]);
        assert!(result.is_err());
    }
}
