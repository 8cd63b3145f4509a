use std::fs;
use std::io::{self, BufWriter, Stdout, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const WRITER_BUFFER_SIZE: usize = 256 * 1024;

enum Target {
    Stdout(BufWriter<Stdout>),
    /// Temp file next to `path`, renamed over it by `finish`.
    File {
        writer: BufWriter<NamedTempFile>,
        path: PathBuf,
    },
    Sink,
}

/// Output for a cleaned dump.
///
/// File output goes to a temporary file in the destination directory and only
/// replaces the destination once `finish` succeeds; dropping the writer
/// without finishing deletes the temporary file.
pub struct DumpWriter {
    target: Target,
    bytes_written: u64,
}

impl DumpWriter {
    pub fn to_file(path: &Path) -> io::Result<Self> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;
        let tmp = NamedTempFile::new_in(&dir)?;

        Ok(Self {
            target: Target::File {
                writer: BufWriter::with_capacity(WRITER_BUFFER_SIZE, tmp),
                path: path.to_path_buf(),
            },
            bytes_written: 0,
        })
    }

    pub fn to_stdout() -> Self {
        Self {
            target: Target::Stdout(BufWriter::with_capacity(WRITER_BUFFER_SIZE, io::stdout())),
            bytes_written: 0,
        }
    }

    /// Counts bytes but writes nothing (dry run).
    pub fn sink() -> Self {
        Self {
            target: Target::Sink,
            bytes_written: 0,
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Flush everything and move file output into place.
    pub fn finish(self) -> io::Result<u64> {
        match self.target {
            Target::Stdout(mut w) => w.flush()?,
            Target::File { writer, path } => {
                let tmp = writer.into_inner().map_err(|e| e.into_error())?;
                tmp.as_file().sync_all()?;
                tmp.persist(&path).map_err(|e| e.error)?;
            }
            Target::Sink => {}
        }
        Ok(self.bytes_written)
    }
}

impl Write for DumpWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = match &mut self.target {
            Target::Stdout(w) => w.write(buf)?,
            Target::File { writer, .. } => writer.write(buf)?,
            Target::Sink => buf.len(),
        };
        self.bytes_written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.target {
            Target::Stdout(w) => w.flush(),
            Target::File { writer, .. } => writer.flush(),
            Target::Sink => Ok(()),
        }
    }
}
