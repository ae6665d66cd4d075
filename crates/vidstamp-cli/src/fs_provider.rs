use std::fs::{self, File};
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use chrono::DateTime;

use vidstamp_core::date::sequence;
use vidstamp_core::{FileAttributes, ProviderError, SiblingFile, StorageProvider};

/// Local-filesystem provider. File ids are paths, siblings are entries of
/// the same directory, and sibling timestamps come from mtimes.
pub struct FsProvider;

fn open(path: &str) -> Result<File, ProviderError> {
    File::open(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => ProviderError::NotFound(path.to_string()),
        _ => ProviderError::Io(err),
    })
}

impl StorageProvider for FsProvider {
    fn fetch_prefix(&self, file_id: &str, max_bytes: u64) -> Result<Vec<u8>, ProviderError> {
        let file = open(file_id)?;
        let mut buf = Vec::new();
        file.take(max_bytes).read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn file_attributes(&self, file_id: &str) -> Result<FileAttributes, ProviderError> {
        let meta = fs::metadata(file_id)?;
        let name = Path::new(file_id)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(file_id)
            .to_string();
        Ok(FileAttributes {
            name,
            size: meta.len(),
            created: meta.created().ok().map(DateTime::from),
            modified: meta.modified().ok().map(DateTime::from),
        })
    }

    fn list_siblings(&self, file_id: &str, prefix: &str) -> Result<Vec<SiblingFile>, ProviderError> {
        let path = Path::new(file_id);
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut siblings = Vec::new();
        for entry in fs::read_dir(parent)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.starts_with(prefix) {
                continue;
            }
            // Same naming run only: the parsed prefix must match exactly,
            // not just share leading characters.
            let Some(seq) = sequence::parse_sequence_name(name) else {
                continue;
            };
            if seq.prefix != prefix {
                continue;
            }
            let timestamp = entry
                .metadata()
                .ok()
                .and_then(|meta| meta.modified().ok())
                .map(DateTime::from);
            siblings.push(SiblingFile {
                sequence: seq.number,
                name: name.to_string(),
                timestamp,
            });
        }
        Ok(siblings)
    }
}

/// Expand CLI arguments into a flat, sorted list of files to process.
/// Directories contribute their immediate video children; explicitly named
/// files are taken as-is.
pub fn collect_video_files(paths: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in fs::read_dir(path)? {
                let entry = entry?;
                let child = entry.path();
                if child.is_file() && is_video(&child) {
                    files.push(child);
                }
            }
        } else {
            files.push(path.clone());
        }
    }
    files.sort();
    Ok(files)
}

fn is_video(path: &Path) -> bool {
    let is_video_mime = mime_guess::from_path(path)
        .first()
        .map(|mime| mime.type_() == mime_guess::mime::VIDEO)
        .unwrap_or(false);
    if is_video_mime {
        return true;
    }
    // AVCHD clips are video but often miss the mime table.
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.to_lowercase().ends_with(".mts"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;

    #[test]
    fn test_fetch_prefix_respects_cap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mov");
        fs::write(&path, vec![7u8; 100]).unwrap();

        let bytes = FsProvider
            .fetch_prefix(path.to_str().unwrap(), 10)
            .unwrap();
        assert_eq!(bytes.len(), 10);

        let bytes = FsProvider
            .fetch_prefix(path.to_str().unwrap(), 1000)
            .unwrap();
        assert_eq!(bytes.len(), 100);
    }

    #[test]
    fn test_missing_file_maps_to_not_found() {
        let err = FsProvider
            .fetch_prefix("/no/such/file.mov", 10)
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }

    #[test]
    fn test_file_attributes_name_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("holiday.mov");
        fs::write(&path, b"0123456789").unwrap();

        let attrs = FsProvider
            .file_attributes(path.to_str().unwrap())
            .unwrap();
        assert_eq!(attrs.name, "holiday.mov");
        assert_eq!(attrs.size, 10);
        assert!(attrs.modified.is_some());
    }

    #[test]
    fn test_list_siblings_same_naming_run_only() {
        let dir = tempfile::tempdir().unwrap();
        // DJIX0300 shares the leading characters of the DJI run but parses
        // to a different prefix, so it must not count as a neighbor.
        for name in ["DJI0100.MP4", "DJI0200.MP4", "DJIX0300.MP4", "notes.txt"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        // Pin a recognizable mtime on one neighbor.
        let pinned = FileTime::from_unix_time(1_699_185_600, 0);
        filetime::set_file_mtime(dir.path().join("DJI0100.MP4"), pinned).unwrap();

        let target = dir.path().join("DJI0150.MP4");
        let siblings = FsProvider
            .list_siblings(target.to_str().unwrap(), "DJI")
            .unwrap();

        let mut names: Vec<&str> = siblings.iter().map(|s| s.name.as_str()).collect();
        names.sort();
        assert_eq!(names, ["DJI0100.MP4", "DJI0200.MP4"]);
        let first = siblings.iter().find(|s| s.sequence == 100).unwrap();
        assert_eq!(first.timestamp.map(|ts| ts.timestamp()), Some(1_699_185_600));
    }

    #[test]
    fn test_collect_video_files_filters_directories() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.mp4", "b.txt", "c.MTS", "d.mov"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }

        let files = collect_video_files(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<String> = files
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(String::from))
            .collect();
        assert_eq!(names, ["a.mp4", "c.MTS", "d.mov"]);
    }

    #[test]
    fn test_explicit_files_taken_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let odd = dir.path().join("weird.bin");
        fs::write(&odd, b"x").unwrap();

        let files = collect_video_files(&[odd.clone()]).unwrap();
        assert_eq!(files, [odd]);
    }
}
