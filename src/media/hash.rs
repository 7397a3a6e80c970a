use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{Result, SubtitleError};

const CHUNK_SIZE: u64 = 65536;
const WORD_SIZE: usize = 8;

/// Files smaller than this cannot be fingerprinted.
pub const MINIMUM_SIZE: u64 = CHUNK_SIZE * 2;

/// Computes the "movie hash" of a file: its size plus every little-endian
/// 64-bit word of the first and last 64 KiB, wrapping on overflow.
pub fn fingerprint(path: &Path) -> Result<u64> {
    let file = File::open(path)?;
    let size = file.metadata()?.len();
    if size < MINIMUM_SIZE {
        return Err(SubtitleError::FileTooSmall {
            path: path.to_path_buf(),
            size,
        });
    }

    let mut reader = BufReader::new(file);
    let mut hash = size;
    hash = hash.wrapping_add(sum_words(&mut reader)?);
    reader.seek(SeekFrom::Start(size - CHUNK_SIZE))?;
    hash = hash.wrapping_add(sum_words(&mut reader)?);

    Ok(hash)
}

/// Fingerprint rendered the way the service expects it.
pub fn fingerprint_hex(path: &Path) -> Result<String> {
    fingerprint(path).map(|hash| format!("{hash:016x}"))
}

fn sum_words(reader: &mut impl Read) -> Result<u64> {
    let mut chunk = vec![0u8; CHUNK_SIZE as usize];
    reader.read_exact(&mut chunk)?;

    let sum = chunk
        .chunks_exact(WORD_SIZE)
        .map(|word| {
            let mut bytes = [0u8; WORD_SIZE];
            bytes.copy_from_slice(word);
            u64::from_le_bytes(bytes)
        })
        .fold(0u64, u64::wrapping_add);

    Ok(sum)
}
