use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use sha2::{Digest, Sha256};

const BUFFER_SIZE: usize = 64 * 1024;

/// SHA-256 of an in-memory buffer, lowercase hex.
pub fn sha256_bytes(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// SHA-256 of a file, streamed in chunks.
pub fn calculate_sha256(path: &Path) -> io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HELLO_SHA256: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn test_sha256_bytes() {
        assert_eq!(sha256_bytes(b"hello world"), HELLO_SHA256);
    }

    #[test]
    fn test_file_and_buffer_agree() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        file.flush().unwrap();
        assert_eq!(calculate_sha256(file.path()).unwrap(), HELLO_SHA256);
    }

    #[test]
    fn test_missing_file() {
        assert!(calculate_sha256(Path::new("/nonexistent/file")).is_err());
    }
}
