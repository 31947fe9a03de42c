use crate::core::config::Configuration;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Gzipped trajectory sink: a stream of configuration records, each frame
/// preceded by a `====<step>====` separator line.
pub struct TrajectoryWriter {
    encoder: GzEncoder<Box<dyn Write + Send>>,
}

impl TrajectoryWriter {
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::from_writer(file))
    }

    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            encoder: GzEncoder::new(Box::new(writer), Compression::default()),
        }
    }

    pub fn write_frame(&mut self, step: u64, config: &Configuration) -> io::Result<()> {
        writeln!(self.encoder, "===={step}====")?;
        config.write_to(&mut self.encoder)
    }

    /// Flush the compressed stream and close the frame. Dropping the
    /// writer finishes it as well, but only `finish` surfaces errors.
    pub fn finish(self) -> io::Result<()> {
        self.encoder.finish().map(|_| ())
    }
}

/// Derive the per-replica variant of a file name by inserting a
/// three-digit, zero-padded index before the extension.
pub fn replica_file_name(path: &Path, index: usize) -> PathBuf {
    debug_assert!(index < 1000);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(extension) => format!("{stem}{index:03}.{}", extension.to_string_lossy()),
        None => format!("{stem}{index:03}"),
    };
    path.with_file_name(name)
}
