use std::fs;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use tempfile::TempDir;
use tracing::debug;

use crate::error::{Result, SubtitleError};

/// Fetches gzip-compressed subtitle payloads.
pub trait Downloader: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpDownloader {
    client: reqwest::blocking::Client,
}

impl HttpDownloader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Downloader for HttpDownloader {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send()?;
        if !response.status().is_success() {
            return Err(SubtitleError::Download(format!(
                "{url}: HTTP {}",
                response.status()
            )));
        }
        Ok(response.bytes()?.to_vec())
    }
}

/// Fetches `url` and writes the decompressed subtitle to `target`. The
/// compressed payload is staged in a private temp dir that is removed
/// whether or not decompression succeeds.
pub fn download_subtitle(downloader: &dyn Downloader, url: &str, target: &Path) -> Result<()> {
    let compressed = downloader
        .fetch(url)
        .map_err(|e| SubtitleError::Download(format!("{url}: {e}")))?;
    save_subtitle(&compressed, url, target)
}

pub fn save_subtitle(compressed: &[u8], url: &str, target: &Path) -> Result<()> {
    let temp_dir = TempDir::new()?;
    let basename = url
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("subtitle.gz");
    let staged = temp_dir.path().join(basename);
    fs::write(&staged, compressed)?;

    let mut contents = Vec::new();
    GzDecoder::new(fs::File::open(&staged)?)
        .read_to_end(&mut contents)
        .map_err(|e| SubtitleError::Download(format!("could not decompress {url}: {e}")))?;

    fs::write(target, &contents)?;
    debug!("Wrote {} bytes to {target:?}", contents.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    struct StaticDownloader(Vec<u8>);

    impl Downloader for StaticDownloader {
        fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_download_subtitle_keeps_raw_bytes() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("subtitle.srt");
        let contents = vec![0xffu8; 10];

        let downloader = StaticDownloader(gzip(&contents));
        download_subtitle(&downloader, "http://server.com/foo.gz", &target).unwrap();

        assert_eq!(fs::read(&target).unwrap(), contents);
    }

    #[test]
    fn test_corrupt_payload_is_download_error() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("subtitle.srt");

        let downloader = StaticDownloader(b"not gzip at all".to_vec());
        let err = download_subtitle(&downloader, "http://server.com/foo.gz", &target).unwrap_err();

        assert!(matches!(err, SubtitleError::Download(_)));
        assert!(!target.exists());
    }
}
