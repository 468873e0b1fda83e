use std::path::PathBuf;
use std::time::Duration;

use crate::Global;

/// Settings for one run, resolved from the command line and environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub ollama_url: String,
    pub model: String,
    pub report_dir: PathBuf,
    pub image_dir: PathBuf,
    pub log_file: PathBuf,
    pub summary: RetryPolicy,
    pub verbose: bool,
}

/// Bounds on every model call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    /// Total tries, at least one.
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn new(timeout: Duration, retries: u32) -> Self {
        Self {
            timeout,
            attempts: retries.saturating_add(1),
        }
    }
}

impl From<&Global> for Config {
    fn from(global: &Global) -> Self {
        Config {
            ollama_url: global.ollama_url.clone(),
            model: global.model.clone(),
            report_dir: global.report_dir.clone(),
            image_dir: global.image_dir.clone(),
            log_file: global.log_file.clone(),
            summary: RetryPolicy::new(
                Duration::from_secs(global.summary_timeout),
                global.summary_retries,
            ),
            verbose: global.verbose,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::App;

    #[test]
    fn test_defaults_from_single_positional_argument() {
        let app = App::try_parse_from(["pdfdigest", "docs/report.pdf"]).unwrap();
        let config = Config::from(&app.global);

        assert_eq!(app.path, PathBuf::from("docs/report.pdf"));
        assert_eq!(config.report_dir, PathBuf::from("utils"));
        assert_eq!(config.image_dir, PathBuf::from("images"));
        assert_eq!(config.log_file, PathBuf::from("utils/shared_log_file.log"));
        assert_eq!(config.summary.timeout, Duration::from_secs(300));
        assert_eq!(config.summary.attempts, 3);
    }

    #[test]
    fn test_flags_override_defaults() {
        let app = App::try_parse_from([
            "pdfdigest",
            "a.pdf",
            "--model",
            "llama3.2",
            "--summary-timeout",
            "5",
            "--summary-retries",
            "0",
            "--report-dir",
            "/tmp/out",
        ])
        .unwrap();
        let config = Config::from(&app.global);

        assert_eq!(config.model, "llama3.2");
        assert_eq!(config.report_dir, PathBuf::from("/tmp/out"));
        assert_eq!(
            config.summary,
            RetryPolicy {
                timeout: Duration::from_secs(5),
                attempts: 1
            }
        );
    }

    #[test]
    fn test_path_is_required() {
        assert!(App::try_parse_from(["pdfdigest"]).is_err());
    }
}
