//! Input resolution for commands that take a path or a glob.

use crate::compression::Compression;
use std::path::{Path, PathBuf};

/// Dump files named on the command line.
#[derive(Debug)]
pub struct InputFiles {
    pub paths: Vec<PathBuf>,
    /// The argument was a pattern, even if it matched a single file.
    pub from_glob: bool,
}

impl InputFiles {
    /// A single literal path, processed without an output directory.
    pub fn is_single(&self) -> bool {
        !self.from_glob && self.paths.len() == 1
    }
}

pub fn looks_like_glob(arg: &str) -> bool {
    arg.bytes().any(|b| matches!(b, b'*' | b'?' | b'['))
}

/// Resolve `arg` to the files it names, sorted. Directories matched by a
/// glob are skipped.
pub fn resolve_inputs(arg: &Path) -> anyhow::Result<InputFiles> {
    let text = arg.to_string_lossy();

    if !looks_like_glob(&text) {
        anyhow::ensure!(arg.exists(), "input file does not exist: {}", arg.display());
        return Ok(InputFiles {
            paths: vec![arg.to_path_buf()],
            from_glob: false,
        });
    }

    let matches = glob::glob(&text)
        .map_err(|e| anyhow::anyhow!("invalid glob pattern '{}': {}", text, e))?;
    let mut paths = matches
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect::<Vec<_>>();
    anyhow::ensure!(!paths.is_empty(), "no files match pattern: {}", text);
    paths.sort();

    Ok(InputFiles {
        paths,
        from_glob: true,
    })
}

/// Where the cleaned copy of `input` goes inside `output_dir`. Compressed
/// inputs produce plain SQL, so their compression suffix is dropped.
pub fn output_path_for(input: &Path, output_dir: &Path, idx: usize) -> PathBuf {
    let name = match input.file_name() {
        Some(name) => Compression::from_path(input).strip_extension(&name.to_string_lossy()),
        None => format!("output_{}.sql", idx),
    };
    output_dir.join(name)
}

/// Per-file outcomes of a batch run.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub total: usize,
    pub ok: usize,
    pub failures: Vec<(PathBuf, String)>,
}

impl BatchSummary {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn succeeded(&mut self) {
        self.ok += 1;
    }

    pub fn failed(&mut self, path: &Path, error: impl ToString) {
        self.failures.push((path.to_path_buf(), error.to_string()));
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_looks_like_glob() {
        assert!(!looks_like_glob("dump.sql"));
        assert!(looks_like_glob("dumps/*.sql"));
        assert!(looks_like_glob("dump?.sql"));
        assert!(looks_like_glob("[ab].sql"));
    }

    #[test]
    fn test_glob_resolves_sorted_files_only() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.sql"), "").unwrap();
        fs::write(dir.path().join("a.sql"), "").unwrap();
        fs::create_dir(dir.path().join("c.sql")).unwrap();

        let inputs = resolve_inputs(&dir.path().join("*.sql")).unwrap();
        assert!(inputs.from_glob);
        assert!(!inputs.is_single());
        assert_eq!(
            inputs.paths,
            vec![dir.path().join("a.sql"), dir.path().join("b.sql")]
        );
    }

    #[test]
    fn test_resolve_errors() {
        let dir = TempDir::new().unwrap();
        assert!(resolve_inputs(&dir.path().join("missing.sql")).is_err());
        assert!(resolve_inputs(&dir.path().join("*.none")).is_err());
    }

    #[test]
    fn test_output_path_drops_compression_suffix() {
        let out = Path::new("out");
        assert_eq!(
            output_path_for(Path::new("in/shop.sql.gz"), out, 0),
            out.join("shop.sql")
        );
        assert_eq!(output_path_for(Path::new("shop.sql"), out, 0), out.join("shop.sql"));
    }

    #[test]
    fn test_batch_summary() {
        let mut summary = BatchSummary::new(3);
        summary.succeeded();
        summary.failed(Path::new("b.sql"), "boom");
        assert_eq!(summary.ok, 1);
        assert_eq!(summary.failed_count(), 1);
        assert_eq!(summary.failures[0].1, "boom");
    }
}
