use anyhow::Result;
use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

pub const PIPELINE_LOG: &str = "transcast.log";

/// Append a timestamped pipeline description to transcast.log in the current directory
pub fn write_pipeline_log(message: &str) -> Result<()> {
    let log_path = std::env::current_dir()?.join(PIPELINE_LOG);
    append_log(&log_path, message)
}

pub fn append_log(path: &Path, message: &str) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;

    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    writeln!(file, "[{}] {}", timestamp, message)?;
    Ok(())
}
