use anyhow::{Context, Result};
use memmap2::Mmap;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::core::pipeline::PipelineError;
use crate::core::record::{Payload, parse_payload};

const MMAP_THRESHOLD: u64 = 1024 * 1024; // 1 MiB

pub enum FileContent
{
    Mapped(Mmap),
    Buffered(String),
}

impl AsRef<str> for FileContent
{
    fn as_ref(&self) -> &str
    {
        match self
        {
            // Validated in read_file_smart before construction
            FileContent::Mapped(mmap) => std::str::from_utf8(mmap).unwrap_or(""),
            FileContent::Buffered(s) => s.as_str(),
        }
    }
}

/// Read a UTF-8 file, memory-mapping it above 1 MiB
pub fn read_file_smart<P: AsRef<Path>>(path: P) -> Result<FileContent>
{
    let path = path.as_ref();
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Failed to read metadata for {}", path.display()))?;

    if metadata.len() > MMAP_THRESHOLD
    {
        let file =
            File::open(path).with_context(|| format!("Failed to open file {}", path.display()))?;

        // Safety: read-only mapping; the collector does not rewrite finished files
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("Failed to memory-map {}", path.display()))?;

        std::str::from_utf8(&mmap)
            .with_context(|| format!("{} is not valid UTF-8", path.display()))?;

        Ok(FileContent::Mapped(mmap))
    }
    else
    {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read file {}", path.display()))?;

        Ok(FileContent::Buffered(content))
    }
}

/// Load a collector payload. Returns the payload and the count of entries
/// that were not records.
pub fn load_payload(path: &Path) -> Result<(Payload, usize), PipelineError>
{
    let input_err = |reason: String| PipelineError::Input {
        path: path.to_path_buf(),
        reason,
    };

    let content = read_file_smart(path).map_err(|e| input_err(format!("{e:#}")))?;
    parse_payload(content.as_ref()).map_err(|e| input_err(e.to_string()))
}

fn output_err(
    path: &Path,
    source: std::io::Error,
) -> PipelineError
{
    PipelineError::Output { path: path.to_path_buf(), source }
}

/// A fully serialized JSON document waiting in a temp file next to its
/// destination. Dropping it without `commit` deletes the temp file and
/// leaves the destination untouched.
#[derive(Debug)]
pub struct StagedJson
{
    tmp: NamedTempFile,
    dest: PathBuf,
}

impl StagedJson
{
    /// Rename over the destination
    pub fn commit(self) -> Result<PathBuf, PipelineError>
    {
        self.tmp
            .persist(&self.dest)
            .map_err(|e| output_err(&self.dest, e.error))?;
        Ok(self.dest)
    }
}

/// Serialize `value` as pretty UTF-8 JSON into a temp file in `path`'s
/// directory, creating the directory if needed
pub fn stage_json<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<StagedJson, PipelineError>
{
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| output_err(path, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| output_err(path, e))?;
    {
        let mut out = BufWriter::new(&mut tmp);
        serde_json::to_writer_pretty(&mut out, value).map_err(|e| output_err(path, e.into()))?;
        out.flush()
            .map_err(|e| output_err(path, e))?;
    }
    tmp.as_file()
        .sync_all()
        .map_err(|e| output_err(path, e))?;

    Ok(StagedJson { tmp, dest: path.to_path_buf() })
}

/// Write one JSON file atomically
pub fn write_json<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), PipelineError>
{
    stage_json(path, value)?.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests
{
    use super::*;
    use assert_fs::prelude::*;
    use serde::Serializer;
    use serde::ser::{Error as _, SerializeMap};

    /// Emits one map entry, then fails
    struct BreaksAfterFirstEntry;

    impl Serialize for BreaksAfterFirstEntry
    {
        fn serialize<S: Serializer>(
            &self,
            serializer: S,
        ) -> Result<S::Ok, S::Error>
        {
            let mut map = serializer.serialize_map(None)?;
            map.serialize_entry("first", "written")?;
            Err(S::Error::custom("source went away"))
        }
    }

    #[test]
    fn small_files_are_buffered()
    {
        let tmp = assert_fs::TempDir::new().unwrap();
        let f = tmp.child("small.json");
        f.write_str("{}").unwrap();

        let content = read_file_smart(f.path()).unwrap();
        assert!(matches!(content, FileContent::Buffered(_)));
        assert_eq!(content.as_ref(), "{}");
    }

    #[test]
    fn large_files_are_mapped()
    {
        let tmp = assert_fs::TempDir::new().unwrap();
        let f = tmp.child("big.txt");
        f.write_str(&"x".repeat(MMAP_THRESHOLD as usize + 10))
            .unwrap();

        let content = read_file_smart(f.path()).unwrap();
        assert!(matches!(content, FileContent::Mapped(_)));
        assert_eq!(content.as_ref().len(), MMAP_THRESHOLD as usize + 10);
    }

    #[test]
    fn missing_payload_is_an_input_error()
    {
        let err = load_payload(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, PipelineError::Input { .. }));
    }

    #[test]
    fn write_json_keeps_utf8_and_creates_dirs()
    {
        let tmp = assert_fs::TempDir::new().unwrap();
        let path = tmp
            .path()
            .join("nested/dir/out.json");

        write_json(&path, &serde_json::json!({ "title": "Рынок 市场" })).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("Рынок 市场"));
    }

    #[test]
    fn failed_serialization_keeps_previous_file()
    {
        let tmp = assert_fs::TempDir::new().unwrap();
        let actors = tmp.child("actors");
        let previous = actors.child("email_map_2025-01-03.json");
        previous
            .write_str(r#"{"complete": ["http://a.onion"]}"#)
            .unwrap();

        let err = write_json(previous.path(), &BreaksAfterFirstEntry).unwrap_err();
        assert!(matches!(err, PipelineError::Output { .. }));

        previous.assert(r#"{"complete": ["http://a.onion"]}"#);

        // The temp file went away with the failed write
        let left: Vec<_> = std::fs::read_dir(actors.path())
            .unwrap()
            .collect();
        assert_eq!(left.len(), 1);
    }

    #[test]
    fn staged_file_is_invisible_until_commit()
    {
        let tmp = assert_fs::TempDir::new().unwrap();
        let path = tmp
            .path()
            .join("out.json");

        let staged = stage_json(&path, &[1, 2, 3]).unwrap();
        assert!(!path.exists());

        assert_eq!(staged.commit().unwrap(), path);
        let back: Vec<u32> = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, [1, 2, 3]);
    }
}
