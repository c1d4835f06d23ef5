use std::fs;
use std::io::{Read, Write, BufReader};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use crossbeam::channel::{bounded, Receiver};
use log::{debug, info, warn};
use walkdir::WalkDir;
use zip::{write::FileOptions, ZipWriter};

use crate::constants::ARCHIVE_FILE_MODE;

const CHUNK_SIZE: usize = 256 * 1024;

/// A file queued for compression.
struct FileEntry {
    rel_path: String,
    abs_path: PathBuf,
}

fn file_options() -> FileOptions {
    FileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(ARCHIVE_FILE_MODE)
}

/// Worker loop: read queued files and append them to the shared zip.
fn compression_worker(receiver: Receiver<FileEntry>, zip: Arc<Mutex<ZipWriter<fs::File>>>) -> Result<()> {
    let mut buffer = vec![0u8; CHUNK_SIZE];

    // The channel closes once the producer is done.
    while let Ok(entry) = receiver.recv() {
        let start = Instant::now();
        let file = fs::File::open(&entry.abs_path)
            .with_context(|| format!("Failed to open {}", entry.abs_path.display()))?;
        let mut reader = BufReader::new(file);

        let mut zip = zip.lock().unwrap_or_else(PoisonError::into_inner);
        zip.start_file(entry.rel_path.clone(), file_options())
            .with_context(|| format!("Failed to start zip entry for {}", entry.rel_path))?;
        loop {
            let bytes_read = reader
                .read(&mut buffer)
                .with_context(|| format!("Failed to read {}", entry.abs_path.display()))?;
            if bytes_read == 0 {
                break;
            }
            zip.write_all(&buffer[..bytes_read])
                .with_context(|| format!("Failed to write {} to zip", entry.rel_path))?;
        }
        drop(zip);

        debug!("Compressed {} in {:?}", entry.rel_path, start.elapsed());
    }

    Ok(())
}

/// Pack the archive directory `source_dir` into `<source_dir>.zip`.
///
/// Entries are stored beneath the directory's own name, so extracting the
/// zip recreates the archive directory.
pub fn compress_archive(source_dir: &Path) -> Result<PathBuf> {
    let start = Instant::now();
    let dir_name = source_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("{} has no directory name", source_dir.display()))?;
    let zip_path = source_dir.with_file_name(format!("{}.zip", dir_name));
    info!("Compressing {} to {}", source_dir.display(), zip_path.display());

    let zip_file = fs::File::create(&zip_path)
        .with_context(|| format!("Failed to create {}", zip_path.display()))?;
    let zip = Arc::new(Mutex::new(ZipWriter::new(zip_file)));

    let (sender, receiver) = bounded::<FileEntry>(256);
    let thread_count = num_cpus::get().clamp(1, 8);

    let mut workers = Vec::with_capacity(thread_count);
    for i in 0..thread_count {
        let worker_receiver = receiver.clone();
        let worker_zip = Arc::clone(&zip);
        let handle = std::thread::Builder::new()
            .name(format!("compression-{}", i))
            .spawn(move || compression_worker(worker_receiver, worker_zip))
            .context("Failed to spawn compression worker")?;
        workers.push(handle);
    }
    drop(receiver);

    let mut dirs = Vec::new();
    for entry in WalkDir::new(source_dir).min_depth(1).sort_by_file_name() {
        let entry = entry.context("Failed to walk archive directory")?;
        let rel = entry
            .path()
            .strip_prefix(source_dir)
            .context("walked outside the archive directory")?;
        let rel_path = format!("{}/{}", dir_name, rel.to_string_lossy());

        if entry.file_type().is_dir() {
            dirs.push(format!("{}/", rel_path));
        } else if entry.file_type().is_file() {
            sender
                .send(FileEntry {
                    rel_path,
                    abs_path: entry.path().to_path_buf(),
                })
                .map_err(|_| anyhow!("compression workers exited early"))?;
        }
    }
    drop(sender);

    let mut failures = 0;
    for worker in workers {
        match worker.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Compression worker failed: {:#}", e);
                failures += 1;
            }
            Err(_) => {
                warn!("Compression worker panicked");
                failures += 1;
            }
        }
    }
    if failures > 0 {
        return Err(anyhow!("{} compression worker(s) failed", failures));
    }

    let mut zip = Arc::try_unwrap(zip)
        .map_err(|_| anyhow!("zip writer still shared after workers finished"))?
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner);
    for dir in dirs {
        zip.add_directory(dir, FileOptions::default())?;
    }
    zip.finish().context("Failed to finalize zip file")?;

    info!("Compressed archive in {:?}", start.elapsed());
    Ok(zip_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use zip::read::ZipArchive;

    #[test]
    fn test_compress_archive_layout() {
        let temp_dir = TempDir::new().unwrap();
        let archive_dir = temp_dir.path().join("diag-collector-web-01.example.com-20260101");
        fs::create_dir_all(archive_dir.join("insights_commands")).unwrap();
        fs::create_dir_all(archive_dir.join("meta_data")).unwrap();
        fs::write(archive_dir.join("insights_commands/ps_auxww"), b"USER PID\n").unwrap();
        fs::write(archive_dir.join("meta_data/collection.jsonl"), b"{}\n").unwrap();

        let zip_path = compress_archive(&archive_dir).unwrap();
        assert_eq!(zip_path, temp_dir.path().join("diag-collector-web-01.example.com-20260101.zip"));

        let mut archive = ZipArchive::new(fs::File::open(&zip_path).unwrap()).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        for expected in [
            "diag-collector-web-01.example.com-20260101/insights_commands/ps_auxww",
            "diag-collector-web-01.example.com-20260101/meta_data/collection.jsonl",
            "diag-collector-web-01.example.com-20260101/insights_commands/",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {}", expected);
        }

        let mut content = String::new();
        archive
            .by_name("diag-collector-web-01.example.com-20260101/insights_commands/ps_auxww")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "USER PID\n");
    }

    #[test]
    fn test_compress_empty_archive() {
        let temp_dir = TempDir::new().unwrap();
        let archive_dir = temp_dir.path().join("empty");
        fs::create_dir_all(&archive_dir).unwrap();

        let zip_path = compress_archive(&archive_dir).unwrap();
        let archive = ZipArchive::new(fs::File::open(&zip_path).unwrap()).unwrap();
        assert_eq!(archive.len(), 0);
    }
}
