use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::OnceLock;

static LOGGER: OnceLock<()> = OnceLock::new();

/// Route the `log` facade to `log_file`, appending
/// `<timestamp> - <target> - <LEVEL> - <message>` lines.
///
/// Everything from `debug` up is recorded unless `RUST_LOG` says otherwise.
/// Only the first call does anything; later calls return `Ok(())`.
pub fn init(log_file: &Path) -> std::io::Result<()> {
    if LOGGER.get().is_some() {
        return Ok(());
    }

    if let Some(parent) = log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(log_file)?;

    // Fails only if another logger is already installed, which is fine.
    let _ = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Debug)
        .parse_env("RUST_LOG")
        .target(env_logger::Target::Pipe(Box::new(file)))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
                record.target(),
                record.level(),
                record.args()
            )
        })
        .try_init();

    let _ = LOGGER.set(());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_creates_log_file_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("run.log");

        init(&path).unwrap();
        assert!(path.exists());
        init(&dir.path().join("other.log")).unwrap();
    }
}
