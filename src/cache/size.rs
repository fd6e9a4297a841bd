use std::fmt;

const KB: u64 = 1_000;
const MB: u64 = 1_000_000;

/// Size of the cache file on disk, displayed with a decimal unit suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FileSize(pub u64);

impl FileSize {
    pub fn bytes(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FileSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0;
        if bytes >= MB {
            write!(f, "{} MB", bytes as f64 / MB as f64)
        } else if bytes >= KB {
            write!(f, "{} KB", bytes as f64 / KB as f64)
        } else {
            write!(f, "{} bytes", bytes)
        }
    }
}
