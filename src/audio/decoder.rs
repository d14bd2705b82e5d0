// Audio decoder using Symphonia
// Decodes audio files to interleaved f32 PCM for the engine controller

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use std::fs::File;
use std::path::Path;
use std::time::Duration;

use crate::error::AudioError;

pub struct AudioDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: usize,
    duration: Option<Duration>,
    sample_buf: Option<SampleBuffer<f32>>,
}

impl std::fmt::Debug for AudioDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioDecoder")
            .field("track_id", &self.track_id)
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("duration", &self.duration)
            .finish_non_exhaustive()
    }
}

impl AudioDecoder {
    /// Open an audio file and prepare for decoding
    pub fn open(path: &Path) -> Result<Self, AudioError> {
        let file = File::open(path)
            .map_err(|e| AudioError::Unplayable(format!("{}: {}", path.display(), e)))?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Create a hint using the file extension
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        // Probe the media source
        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| AudioError::Unplayable(format!("unrecognized format: {}", e)))?;

        let format = probed.format;

        // Find the first audio track
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| AudioError::Unplayable("no audio track found".to_string()))?;

        let track_id = track.id;
        let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
        let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(2);

        let duration = track
            .codec_params
            .n_frames
            .map(|frames| Duration::from_secs_f64(frames as f64 / sample_rate as f64));

        // Create decoder for the track
        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| AudioError::Unplayable(format!("no decoder for track: {}", e)))?;

        Ok(Self {
            format,
            decoder,
            track_id,
            sample_rate,
            channels,
            duration,
            sample_buf: None,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Total length of the track, if the container declares it
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Decode the next packet into interleaved f32 samples.
    /// Returns None when end of stream is reached.
    pub fn decode_next(&mut self) -> Result<Option<Vec<f32>>, AudioError> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None); // End of stream
                }
                Err(SymphoniaError::ResetRequired) => {
                    // Reset the decoder and try again
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(AudioError::Decode(format!("failed to read packet: {}", e))),
            };

            // Skip packets from other tracks
            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    // The sample buffer is sized on first use; packet capacity
                    // is fixed per track
                    if self.sample_buf.is_none() {
                        let spec = *decoded.spec();
                        let capacity = decoded.capacity() as u64;
                        self.sample_buf = Some(SampleBuffer::new(capacity, spec));
                    }

                    let buf = self.sample_buf.as_mut().unwrap();
                    buf.copy_interleaved_ref(decoded);
                    return Ok(Some(buf.samples().to_vec()));
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    // Bad packets are skipped, not fatal
                    log::warn!("decode error (skipping packet): {}", e);
                    continue;
                }
                Err(e) => return Err(AudioError::Decode(e.to_string())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_test_wav(path: &Path, seconds: u32) {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for n in 0..(8000 * seconds) {
            let sample = ((n % 100) as i16 - 50) * 200;
            writer.write_sample(sample).unwrap();
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_open_reports_track_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_test_wav(&path, 2);

        let decoder = AudioDecoder::open(&path).unwrap();
        assert_eq!(decoder.sample_rate(), 8000);
        assert_eq!(decoder.channels(), 2);

        let duration = decoder.duration().expect("wav declares its length");
        assert!((duration.as_secs_f64() - 2.0).abs() < 0.05);
    }

    #[test]
    fn test_decode_to_end_of_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_test_wav(&path, 1);

        let mut decoder = AudioDecoder::open(&path).unwrap();
        let mut total_samples = 0usize;
        while let Some(samples) = decoder.decode_next().unwrap() {
            assert!(samples.iter().all(|s| s.is_finite()));
            total_samples += samples.len();
        }
        // 1 second of stereo at 8 kHz
        assert_eq!(total_samples, 8000 * 2);
    }

    #[test]
    fn test_open_missing_file_is_unplayable() {
        let err = AudioDecoder::open(Path::new("/nonexistent/audio.flac")).unwrap_err();
        assert!(matches!(err, AudioError::Unplayable(_)));
    }

    #[test]
    fn test_open_non_audio_file_is_unplayable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        let mut f = File::create(&path).unwrap();
        f.write_all(b"not audio at all").unwrap();

        let err = AudioDecoder::open(&path).unwrap_err();
        assert!(matches!(err, AudioError::Unplayable(_)));
    }
}
