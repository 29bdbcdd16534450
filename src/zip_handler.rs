//! ZIP Handler Module
//!
//! This module unpacks DMARC report archives in place so the analyzer can find
//! the XML inside. ZIP archives are extracted into their containing directory;
//! GZIP (`.gz`, `.tgz`) files are decompressed to a sibling file with the last
//! extension stripped.
//!
//! Security measures carried over from the report reader: archive size limit,
//! maximum number of entries, path traversal prevention, filename length,
//! compression ratio, and a cap on the bytes actually written per archive.
//! A failing archive is reported and skipped; it never stops the batch.
use crate::config::Config;
use crate::discovery::{find_files, has_extension};
use crate::error::{DmarcError, Result};
use flate2::read::MultiGzDecoder;
use log::{error, info};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use zip::ZipArchive;

pub const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "gz", "tgz"];

/// Result of one extraction run over a directory tree.
#[derive(Debug, Default)]
pub struct ExtractionSummary {
    /// Archives processed successfully.
    pub extracted: Vec<PathBuf>,
    /// Archives that failed, with the reason.
    pub failures: Vec<(PathBuf, DmarcError)>,
}

/// Extracts every archive found below `dir`.
///
/// The archive list is collected before anything is written, so files
/// produced by this run are not themselves picked up.
///
/// # Errors
///
/// Only a missing `dir` is an error; per-archive failures are collected in
/// the summary.
pub fn extract_archives(dir: &Path, config: &Config) -> Result<ExtractionSummary> {
    let archives = find_files(dir, ARCHIVE_EXTENSIONS)?;
    let mut summary = ExtractionSummary::default();

    for archive in archives {
        match extract_archive(&archive, config) {
            Ok(outputs) => {
                info!("Extracted {} -> {} file(s)", archive.display(), outputs.len());
                summary.extracted.push(archive);
            }
            Err(e) => {
                error!("Error extracting {}: {}", archive.display(), e);
                summary.failures.push((archive, e));
            }
        }
    }

    info!(
        "Extraction complete. {} archive(s) processed, {} failed.",
        summary.extracted.len(),
        summary.failures.len()
    );
    Ok(summary)
}

/// Extracts one archive and returns the paths it wrote.
pub fn extract_archive(path: &Path, config: &Config) -> Result<Vec<PathBuf>> {
    let file = File::open(path)?;
    let file_size = file.metadata()?.len();
    if file_size > config.max_file_size as u64 {
        return Err(DmarcError::FileTooLarge(format!(
            "Archive size {} bytes exceeds limit of {} bytes",
            file_size, config.max_file_size
        )));
    }

    if has_extension(path, &["zip"]) {
        extract_zip(file, path, config)
    } else if has_extension(path, &["gz", "tgz"]) {
        extract_gzip(file, path, config).map(|out| vec![out])
    } else {
        Err(DmarcError::UnsupportedFile(path.display().to_string()))
    }
}

fn extract_zip(file: File, path: &Path, config: &Config) -> Result<Vec<PathBuf>> {
    let target_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut archive = ZipArchive::new(file)?;
    if archive.len() > config.max_files_in_zip {
        return Err(DmarcError::Format(format!(
            "Too many files in archive: {}",
            archive.len()
        )));
    }

    // Validate every entry before writing anything.
    let mut entries = Vec::with_capacity(archive.len());
    let mut declared_total: u64 = 0;
    for i in 0..archive.len() {
        let file_in_zip = archive.by_index(i)?;
        let inner_name = file_in_zip.name().to_string();
        if inner_name.len() > config.max_filename_length {
            return Err(DmarcError::Format("Filename too long".to_string()));
        }
        let relative = match file_in_zip.enclosed_name() {
            Some(p) => p,
            None => {
                return Err(DmarcError::Format(format!(
                    "Path traversal attempt detected: {}",
                    inner_name
                )))
            }
        };
        let compressed_size = file_in_zip.compressed_size();
        let uncompressed_size = file_in_zip.size();
        if compressed_size > 0 {
            let compression_ratio = uncompressed_size as f64 / compressed_size as f64;
            if compression_ratio > config.max_compression_ratio {
                return Err(DmarcError::Format(format!(
                    "Suspicious compression ratio: {:.2}",
                    compression_ratio
                )));
            }
        }
        declared_total = declared_total.saturating_add(uncompressed_size);
        if declared_total > config.max_decompressed_size as u64 {
            return Err(DmarcError::FileTooLarge(
                "Total decompressed size too large".to_string(),
            ));
        }
        entries.push((i, relative, file_in_zip.is_dir()));
    }

    let mut written = Vec::new();
    let mut budget = config.max_decompressed_size as u64;
    for (i, relative, is_dir) in entries {
        let out_path = target_dir.join(relative);
        if is_dir {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file_in_zip = archive.by_index(i)?;
        let copied = copy_limited(file_in_zip, &out_path, budget)?;
        budget -= copied;
        written.push(out_path);
    }
    Ok(written)
}

fn extract_gzip(file: File, path: &Path, config: &Config) -> Result<PathBuf> {
    let out_path = path.with_extension("");
    // Concatenated gzip members decode as one stream.
    let decoder = MultiGzDecoder::new(file);
    copy_limited(decoder, &out_path, config.max_decompressed_size as u64)?;
    Ok(out_path)
}

/// Copies `reader` into a new file at `out_path`, failing (and removing the
/// partial output) once more than `limit` bytes would be written.
fn copy_limited<R: Read>(reader: R, out_path: &Path, limit: u64) -> Result<u64> {
    let result = (|| -> Result<u64> {
        let mut out = File::create(out_path)?;
        let copied = io::copy(&mut reader.take(limit.saturating_add(1)), &mut out)?;
        out.flush()?;
        if copied > limit {
            return Err(DmarcError::FileTooLarge(format!(
                "Decompressed size exceeds limit of {} bytes",
                limit
            )));
        }
        Ok(copied)
    })();
    if result.is_err() {
        let _ = fs::remove_file(out_path);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) -> Result<()> {
        let mut zip = zip::ZipWriter::new(File::create(path)?);
        for (name, data) in entries {
            zip.start_file(*name, SimpleFileOptions::default())?;
            zip.write_all(data.as_bytes())?;
        }
        zip.finish()?;
        Ok(())
    }

    fn write_gz(path: &Path, data: &[u8]) -> Result<()> {
        let mut gz = GzEncoder::new(File::create(path)?, Compression::default());
        gz.write_all(data)?;
        gz.finish()?;
        Ok(())
    }

    #[test]
    fn test_zip_extracted_in_place() -> Result<()> {
        let dir = tempdir()?;
        let sub = dir.path().join("google");
        fs::create_dir(&sub)?;
        write_zip(
            &sub.join("report.zip"),
            &[("google.com!example.com.xml", "<feedback/>"), ("inner/b.xml", "<feedback/>")],
        )?;

        let summary = extract_archives(dir.path(), &Config::default())?;
        assert_eq!(summary.extracted.len(), 1);
        assert!(summary.failures.is_empty());
        assert_eq!(
            fs::read_to_string(sub.join("google.com!example.com.xml"))?,
            "<feedback/>"
        );
        assert!(sub.join("inner/b.xml").is_file());
        Ok(())
    }

    #[test]
    fn test_gzip_and_tgz_stripped_to_sibling() -> Result<()> {
        let dir = tempdir()?;
        write_gz(&dir.path().join("yahoo.xml.gz"), b"<feedback>y</feedback>")?;
        write_gz(&dir.path().join("bundle.tgz"), b"payload")?;

        let summary = extract_archives(dir.path(), &Config::default())?;
        assert_eq!(summary.extracted.len(), 2);
        assert_eq!(
            fs::read_to_string(dir.path().join("yahoo.xml"))?,
            "<feedback>y</feedback>"
        );
        assert_eq!(fs::read_to_string(dir.path().join("bundle"))?, "payload");
        Ok(())
    }

    #[test]
    fn test_dotted_entry_name_is_not_traversal() -> Result<()> {
        let dir = tempdir()?;
        write_zip(&dir.path().join("report.zip"), &[("report..xml", "<feedback/>")])?;

        let written = extract_archive(&dir.path().join("report.zip"), &Config::default())?;
        assert_eq!(written, vec![dir.path().join("report..xml")]);
        assert_eq!(fs::read_to_string(dir.path().join("report..xml"))?, "<feedback/>");
        Ok(())
    }

    #[test]
    fn test_multi_member_gzip_fully_decoded() -> Result<()> {
        let dir = tempdir()?;
        let gz_path = dir.path().join("split.xml.gz");
        let mut first = GzEncoder::new(File::create(&gz_path)?, Compression::default());
        first.write_all(b"<feedback>")?;
        let mut second = GzEncoder::new(first.finish()?, Compression::default());
        second.write_all(b"</feedback>")?;
        second.finish()?;

        extract_archive(&gz_path, &Config::default())?;
        assert_eq!(
            fs::read_to_string(dir.path().join("split.xml"))?,
            "<feedback></feedback>"
        );
        Ok(())
    }

    #[test]
    fn test_corrupt_archive_does_not_stop_batch() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("a_broken.zip"), b"this is not a zip")?;
        fs::write(dir.path().join("b_broken.gz"), b"nor a gzip")?;
        write_gz(&dir.path().join("c_good.xml.gz"), b"<feedback/>")?;

        let summary = extract_archives(dir.path(), &Config::default())?;
        assert_eq!(summary.extracted, vec![dir.path().join("c_good.xml.gz")]);
        assert_eq!(summary.failures.len(), 2);
        assert!(!dir.path().join("b_broken").exists());
        assert!(dir.path().join("c_good.xml").is_file());
        Ok(())
    }

    #[test]
    fn test_gzip_output_limit() -> Result<()> {
        let dir = tempdir()?;
        let gz_path = dir.path().join("big.xml.gz");
        write_gz(&gz_path, "A".repeat(4096).as_bytes())?;
        let config = Config {
            max_decompressed_size: 1024,
            ..Config::default()
        };
        let result = extract_archive(&gz_path, &config);
        assert!(matches!(result, Err(DmarcError::FileTooLarge(_))));
        assert!(!dir.path().join("big.xml").exists());
        Ok(())
    }

    #[test]
    fn test_too_many_entries() -> Result<()> {
        let dir = tempdir()?;
        let zip_path = dir.path().join("many.zip");
        write_zip(&zip_path, &[("a.xml", "a"), ("b.xml", "b"), ("c.xml", "c")])?;
        let config = Config {
            max_files_in_zip: 2,
            ..Config::default()
        };
        assert!(extract_archive(&zip_path, &config).is_err());
        assert!(!dir.path().join("a.xml").exists());
        Ok(())
    }

    #[test]
    fn test_missing_directory() {
        let result = extract_archives(Path::new("/no/such/reports"), &Config::default());
        assert!(matches!(result, Err(DmarcError::MissingInput(_))));
    }
}
