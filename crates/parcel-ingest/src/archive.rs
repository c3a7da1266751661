//! Zip extraction into a scoped working directory.
//!
//! The directory lives as long as the [`ExtractedArchive`] guard. It is removed
//! on `release()` or when the guard is dropped, whichever comes first.

use std::collections::HashSet;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::ArchiveError;

/// Extensions that may hold land-records data.
const DATA_EXTENSIONS: [&str; 4] = ["exp", "xls", "txt", "csv"];

/// Returns true for paths with a `.zip` extension (any case).
pub fn is_zip(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("zip"))
}

/// Returns true when the file name carries one of the data extensions.
pub fn is_data_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| DATA_EXTENSIONS.iter().any(|d| ext.eq_ignore_ascii_case(d)))
}

/// Extracted data files and the directory holding them.
#[derive(Debug)]
pub struct ExtractedArchive {
    dir: PathBuf,
    files: Vec<PathBuf>,
    released: bool,
}

impl ExtractedArchive {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Candidate data files, in archive order.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Deletes the extraction directory now.
    pub fn release(mut self) {
        self.remove_dir();
    }

    fn remove_dir(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => log::debug!("Removed extraction directory {}", self.dir.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!(
                "Failed to remove extraction directory {}: {}",
                self.dir.display(),
                e
            ),
        }
    }
}

impl Drop for ExtractedArchive {
    fn drop(&mut self) {
        self.remove_dir();
    }
}

/// Extracts the data entries of `archive_path`.
///
/// The extraction directory `extracted_<uuid>` is created under `work_dir`,
/// or beside the archive when no work directory is configured. Entries are
/// flattened to their base name; duplicates get a numeric suffix.
pub fn extract(archive_path: &Path, work_dir: Option<&Path>) -> Result<ExtractedArchive, ArchiveError> {
    let file = File::open(archive_path).map_err(|e| ArchiveError::Open {
        path: archive_path.to_path_buf(),
        source: e,
    })?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| ArchiveError::Corrupt {
        path: archive_path.to_path_buf(),
        source: e,
    })?;

    let parent = match work_dir {
        Some(dir) => dir.to_path_buf(),
        None => archive_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    let dir = parent.join(format!("extracted_{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).map_err(|e| ArchiveError::CreateDirectory {
        path: dir.clone(),
        source: e,
    })?;

    // From here on the guard owns the directory, so any early return cleans up.
    let mut extracted = ExtractedArchive {
        dir,
        files: Vec::new(),
        released: false,
    };
    let mut taken: HashSet<String> = HashSet::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| ArchiveError::Corrupt {
            path: archive_path.to_path_buf(),
            source: e,
        })?;
        if entry.is_dir() {
            continue;
        }

        let Some(base) = entry
            .enclosed_name()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        else {
            log::warn!("Skipping archive entry with unsafe name: {}", entry.name());
            continue;
        };
        if !is_data_file(&base) {
            log::debug!("Skipping non-data archive entry: {}", base);
            continue;
        }

        let name = unique_name(&base, &mut taken);
        let target = extracted.dir.join(&name);
        let mut out = File::create(&target).map_err(|e| ArchiveError::ExtractEntry {
            entry: base.clone(),
            path: target.clone(),
            source: e,
        })?;
        io::copy(&mut entry, &mut out).map_err(|e| ArchiveError::ExtractEntry {
            entry: base.clone(),
            path: target.clone(),
            source: e,
        })?;

        extracted.files.push(target);
    }

    if extracted.files.is_empty() {
        return Err(ArchiveError::NoDataFiles(archive_path.to_path_buf()));
    }

    log::info!(
        "Extracted {} data file(s) into {}",
        extracted.files.len(),
        extracted.dir.display()
    );
    Ok(extracted)
}

fn unique_name(base: &str, taken: &mut HashSet<String>) -> String {
    if taken.insert(base.to_lowercase()) {
        return base.to_string();
    }
    let path = Path::new(base);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(base);
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
    let mut n = 1;
    loop {
        let candidate = format!("{}_{}.{}", stem, n, ext);
        if taken.insert(candidate.to_lowercase()) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_zip(dir: &Path, entries: &[(&str, &str)]) -> PathBuf {
        let path = dir.join("bundle.zip");
        let file = File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, body) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
        path
    }

    #[test]
    fn test_extracts_only_data_files() {
        let tmp = TempDir::new().unwrap();
        let zip = write_zip(
            tmp.path(),
            &[
                ("daily/RECORDS.EXP", "a^b"),
                ("readme.pdf", "x"),
                ("roll.csv", "FOLIO,OWNER"),
            ],
        );

        let extracted = extract(&zip, None).unwrap();
        let names: Vec<String> = extracted
            .files()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["RECORDS.EXP", "roll.csv"]);
        assert!(extracted.dir().starts_with(tmp.path()));
        assert_eq!(std::fs::read_to_string(&extracted.files()[0]).unwrap(), "a^b");
    }

    #[test]
    fn test_colliding_names_get_suffix() {
        let tmp = TempDir::new().unwrap();
        let zip = write_zip(tmp.path(), &[("a/data.txt", "1"), ("b/data.txt", "2")]);

        let extracted = extract(&zip, None).unwrap();
        assert_eq!(extracted.files().len(), 2);
        assert!(extracted.files()[1].ends_with("data_1.txt"));
    }

    #[test]
    fn test_release_and_drop_remove_directory() {
        let tmp = TempDir::new().unwrap();
        let zip = write_zip(tmp.path(), &[("a.exp", "1")]);

        let extracted = extract(&zip, None).unwrap();
        let dir = extracted.dir().to_path_buf();
        extracted.release();
        assert!(!dir.exists());

        let work = tmp.path().join("work");
        let dir = {
            let extracted = extract(&zip, Some(&work)).unwrap();
            assert!(extracted.dir().starts_with(&work));
            extracted.dir().to_path_buf()
        };
        assert!(!dir.exists());
    }

    #[test]
    fn test_archive_without_data_files_fails_and_cleans_up() {
        let tmp = TempDir::new().unwrap();
        let zip = write_zip(tmp.path(), &[("notes.md", "hello")]);

        let err = extract(&zip, None).unwrap_err();
        assert!(matches!(err, ArchiveError::NoDataFiles(_)));
        let leftovers = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .starts_with("extracted_")
            })
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_corrupt_archive() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.zip");
        std::fs::write(&path, b"not a zip at all").unwrap();
        assert!(matches!(
            extract(&path, None),
            Err(ArchiveError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_extension_checks() {
        assert!(is_zip(Path::new("x/Records.ZIP")));
        assert!(!is_zip(Path::new("records.exp")));
        assert!(is_data_file("A.XLS"));
        assert!(!is_data_file("a.pdf"));
        assert!(!is_data_file("noext"));
    }
}
