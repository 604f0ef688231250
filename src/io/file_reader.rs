use crate::utils::util::{natural_cmp, Result};
use flate2::read::MultiGzDecoder;
use std::{
    cmp::Ordering,
    fs::File,
    io::{BufRead, BufReader, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Line-oriented reader over a (possibly gzipped) text file with an explicit
/// open/close lifecycle. Reading while closed is an error, never a silent
/// end-of-stream.
pub struct FileReader {
    path: PathBuf,
    file_name: String,
    reader: Option<Box<dyn BufRead>>,
}

fn is_gzipped(path: &Path) -> bool {
    let path_str = path.to_string_lossy().to_lowercase();
    path_str.ends_with(".gz") || path_str.ends_with(".gzip")
}

impl FileReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        FileReader {
            path,
            file_name,
            reader: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn open(&mut self) -> Result<()> {
        let mut file = File::open(&self.path).map_err(|error| {
            crate::jq_error!("Failed to open file {}: {error}", self.path.display())
        })?;
        self.reader = if is_gzipped(&self.path) {
            let mut magic = [0u8; 2];
            let valid = file.read_exact(&mut magic).is_ok() && magic == GZIP_MAGIC;
            if !valid {
                return Err(crate::jq_error!(
                    "Invalid gzip header: {}",
                    self.path.display()
                ));
            }
            file.seek(SeekFrom::Start(0)).map_err(|error| {
                crate::jq_error!("Failed to read {}: {error}", self.path.display())
            })?;
            Some(Box::new(BufReader::new(MultiGzDecoder::new(file))))
        } else {
            Some(Box::new(BufReader::new(file)))
        };
        Ok(())
    }

    pub fn close(&mut self) {
        self.reader = None;
    }

    pub fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    /// Returns the next line without its trailing newline, or `None` at EOF.
    pub fn next_line(&mut self) -> Result<Option<String>> {
        let reader = self.reader.as_mut().ok_or_else(|| {
            crate::jq_error!("FileReader [{}] was read while closed", self.file_name)
        })?;
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).map_err(|error| {
            crate::jq_error!("Failed to read from {}: {error}", self.file_name)
        })?;
        if bytes_read == 0 {
            return Ok(None);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }
}

impl PartialEq for FileReader {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for FileReader {}

impl PartialOrd for FileReader {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FileReader {
    fn cmp(&self, other: &Self) -> Ordering {
        natural_cmp(&self.file_name, &other.file_name)
    }
}

impl std::fmt::Debug for FileReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileReader")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .finish()
    }
}
