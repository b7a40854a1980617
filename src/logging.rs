//! Log sink setup for the binary.
//!
//! Every record goes to stderr and to `logs/test_run_<YYYYMMDD_HHMMSS>.log`,
//! formatted as `<timestamp> - <target> - <LEVEL> - <message>`.

use chrono::Local;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const DEFAULT_FILTER: &str = "info,cartwright=debug";

/// Writes every buffer to stderr and to a log file.
struct TeeWriter {
    file: File,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

/// `<dir>/test_run_<YYYYMMDD_HHMMSS>.log`
pub fn log_file_path(dir: &Path) -> PathBuf {
    dir.join(format!("test_run_{}.log", Local::now().format("%Y%m%d_%H%M%S")))
}

/// Install the global logger. `RUST_LOG` overrides the default filter.
///
/// Returns the path of the log file for this run.
pub fn init(logs_dir: &Path) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(logs_dir)?;
    let path = log_file_path(logs_dir);
    let file = File::create(&path)?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(DEFAULT_FILTER))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {} - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.target(),
                record.level(),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(TeeWriter { file })))
        .try_init()?;

    log::info!("Logging to {}", path.display());
    Ok(path)
}
