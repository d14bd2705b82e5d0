// Media probing using lofty with an id3 fallback for problematic MP3 files

use anyhow::Result;
use id3::TagLike;
use lofty::prelude::{Accessor, AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use std::path::Path;
use std::time::Duration;

/// What the player surface needs to know about a resource before playing it.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    pub title: String,
    /// None when the container does not declare a usable length
    pub duration: Option<Duration>,
    pub sample_rate: Option<u32>,
    pub bitrate: Option<u32>,
}

/// Probe a local file. An error here means the resource is not playable.
pub fn probe(path: &Path) -> Result<MediaInfo> {
    let tagged_file = match Probe::open(path)?.guess_file_type()?.read() {
        Ok(f) => f,
        Err(e) => {
            log::warn!("lofty failed to read {:?}: {}", path, e);
            // Fallback: try id3 for MP3 files with malformed tags
            return probe_with_fallback(path);
        }
    };

    let tag = tagged_file.primary_tag().or(tagged_file.first_tag());
    let properties = tagged_file.properties();

    let title = tag
        .and_then(|t| t.title().map(|s| s.to_string()))
        .unwrap_or_else(|| title_from_stem(path));

    let duration = properties.duration();
    let duration = (!duration.is_zero()).then_some(duration);

    Ok(MediaInfo {
        title,
        duration,
        sample_rate: properties.sample_rate(),
        bitrate: properties.audio_bitrate(),
    })
}

fn probe_with_fallback(path: &Path) -> Result<MediaInfo> {
    let is_mp3 = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("mp3"))
        .unwrap_or(false);
    if !is_mp3 {
        anyhow::bail!("unreadable media file: {:?}", path);
    }

    let tag = id3::Tag::read_from_path(path)?;
    let title = tag
        .title()
        .map(|s| s.to_string())
        .unwrap_or_else(|| title_from_stem(path));

    Ok(MediaInfo {
        title,
        // TLEN is in milliseconds
        duration: tag.duration().map(|ms| Duration::from_millis(ms as u64)),
        sample_rate: None,
        bitrate: None,
    })
}

fn title_from_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Unknown")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_probe_wav_reports_duration_and_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("three seconds.wav");

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..(8000 * 3) {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let info = probe(&path).unwrap();
        // Untagged file falls back to the file stem
        assert_eq!(info.title, "three seconds");
        assert_eq!(info.sample_rate, Some(8000));
        let duration = info.duration.expect("wav declares its length");
        assert!((duration.as_secs_f64() - 3.0).abs() < 0.1);
    }

    #[test]
    fn test_probe_missing_file_fails() {
        assert!(probe(Path::new("/nonexistent/track.flac")).is_err());
    }

    #[test]
    fn test_probe_garbage_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.ogg");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(&[0u8; 64]).unwrap();

        assert!(probe(&path).is_err());
    }
}
