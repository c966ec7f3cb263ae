use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::{DEFAULT_CHUNK_SIZE, FINGERPRINT_PREFIX_LEN, TransferError};

/// Number of fixed-size parts a file of `size` bytes splits into.
///
/// A zero-byte file still occupies one (empty) part so the session has
/// something to complete.
pub fn part_count(size: u64, chunk_size: usize) -> u32 {
    if size == 0 {
        return 1;
    }
    size.div_ceil(chunk_size as u64) as u32
}

/// SHA-256 of `data`'s first 64 KiB, hex-encoded.
///
/// Used to guard resume pointers against two distinct files sharing a name
/// and size.
pub fn fingerprint_bytes(data: &[u8]) -> String {
    let prefix = &data[..data.len().min(FINGERPRINT_PREFIX_LEN)];
    let mut hasher = Sha256::new();
    hasher.update(prefix);
    hex::encode(hasher.finalize())
}

/// SHA-256 of the first 64 KiB of the file at `path`, hex-encoded.
pub fn prefix_fingerprint(path: &Path) -> Result<String, TransferError> {
    let mut file = std::fs::File::open(path)?;
    let mut buf = vec![0u8; FINGERPRINT_PREFIX_LEN];
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(fingerprint_bytes(&buf))
}

/// Random-access reader over a file's numbered parts.
///
/// Parts are 1-based; any order is fine, which lets resume skip the parts
/// the remote side already holds.
pub struct ChunkReader {
    file: std::fs::File,
    chunk_size: usize,
    file_size: u64,
}

impl ChunkReader {
    /// Opens `path` for part reads.
    ///
    /// If `chunk_size` is 0, [`DEFAULT_CHUNK_SIZE`] (10 MiB) is used.
    pub fn new(path: &Path, chunk_size: usize) -> Result<Self, TransferError> {
        let file = std::fs::File::open(path)?;
        let file_size = file.metadata()?.len();
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        Ok(Self {
            file,
            chunk_size,
            file_size,
        })
    }

    /// Total file size in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Number of parts in this file.
    pub fn part_count(&self) -> u32 {
        part_count(self.file_size, self.chunk_size)
    }

    /// Reads part `part_number` (1-based). The final part may be short.
    pub fn read_part(&mut self, part_number: u32) -> Result<Vec<u8>, TransferError> {
        let offset = (part_number as u64 - 1) * self.chunk_size as u64;
        let remaining = self.file_size.saturating_sub(offset);
        let read_size = remaining.min(self.chunk_size as u64) as usize;

        self.file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; read_size];
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(data).unwrap();
        path
    }

    #[test]
    fn part_count_rounds_up() {
        assert_eq!(part_count(1, 10), 1);
        assert_eq!(part_count(10, 10), 1);
        assert_eq!(part_count(11, 10), 2);
        assert_eq!(part_count(25, 10), 3);
    }

    #[test]
    fn part_count_empty_file_is_one() {
        assert_eq!(part_count(0, 10), 1);
    }

    #[test]
    fn reader_reads_numbered_parts() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "test.bin", b"AABBCCDDEE");

        let mut reader = ChunkReader::new(&path, 4).unwrap();
        assert_eq!(reader.file_size(), 10);
        assert_eq!(reader.part_count(), 3);

        assert_eq!(reader.read_part(1).unwrap(), b"AABB");
        assert_eq!(reader.read_part(2).unwrap(), b"CCDD");
        assert_eq!(reader.read_part(3).unwrap(), b"EE");
    }

    #[test]
    fn reader_supports_out_of_order_reads() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "test.bin", b"0123456789");

        let mut reader = ChunkReader::new(&path, 4).unwrap();
        assert_eq!(reader.read_part(3).unwrap(), b"89");
        assert_eq!(reader.read_part(1).unwrap(), b"0123");
        assert_eq!(reader.read_part(1).unwrap(), b"0123");
    }

    #[test]
    fn reader_default_chunk_size() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "test.bin", b"x");
        let reader = ChunkReader::new(&path, 0).unwrap();
        assert_eq!(reader.part_count(), 1);
    }

    #[test]
    fn fingerprint_deterministic_and_prefix_bound() {
        let a = fingerprint_bytes(b"hello world");
        let b = fingerprint_bytes(b"hello world");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        // Bytes beyond the prefix don't change the fingerprint.
        let mut long = vec![7u8; FINGERPRINT_PREFIX_LEN];
        let base = fingerprint_bytes(&long);
        long.extend_from_slice(b"trailing");
        assert_eq!(fingerprint_bytes(&long), base);
    }

    #[test]
    fn file_fingerprint_matches_bytes() {
        let dir = TempDir::new().unwrap();
        let data = b"some photo bytes";
        let path = create_test_file(dir.path(), "photo.jpg", data);

        assert_eq!(prefix_fingerprint(&path).unwrap(), fingerprint_bytes(data));
    }

    #[test]
    fn different_content_different_fingerprint() {
        assert_ne!(fingerprint_bytes(b"one"), fingerprint_bytes(b"two"));
    }
}
