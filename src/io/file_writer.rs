use crate::utils::util::Result;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

/// Buffered text writer with an explicit open/close lifecycle, mirroring
/// [`FileReader`](crate::io::file_reader::FileReader).
pub struct FileWriter {
    path: PathBuf,
    file_name: String,
    writer: Option<BufWriter<File>>,
}

impl FileWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        FileWriter {
            path,
            file_name,
            writer: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn open(&mut self) -> Result<()> {
        let file = File::create(&self.path).map_err(|error| {
            crate::jq_error!("Failed to create file {}: {error}", self.path.display())
        })?;
        self.writer = Some(BufWriter::new(file));
        Ok(())
    }

    pub fn write(&mut self, text: &str) -> Result<()> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            crate::jq_error!("FileWriter [{}] was written while closed", self.file_name)
        })?;
        writer.write_all(text.as_bytes()).map_err(|error| {
            crate::jq_error!("Failed to write to {}: {error}", self.file_name)
        })?;
        Ok(())
    }

    pub fn write_line(&mut self, line: &str) -> Result<()> {
        self.write(line)?;
        self.write("\n")
    }

    pub fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|error| {
                crate::jq_error!("Failed to flush {}: {error}", self.file_name)
            })?;
        }
        Ok(())
    }
}
