// sound.rs - Decoded PCM sound data
//
// Only RIFF/WAVE with 16-bit integer PCM is accepted. Samples are stored
// interleaved as f32 in [-1, 1].

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AudioError {
    #[error("not a RIFF/WAVE file")]
    NotWave,

    #[error("WAV file has no `{0}` chunk")]
    MissingChunk(&'static str),

    #[error("unsupported WAV encoding: format tag {format_tag}, {bits_per_sample} bits per sample")]
    UnsupportedFormat { format_tag: u16, bits_per_sample: u16 },

    #[error("unsupported channel count {0} (expected 1 or 2)")]
    UnsupportedChannels(u16),

    #[error("invalid sample rate {0}")]
    InvalidSampleRate(u32),

    #[error("WAV data is truncated")]
    Truncated,
}

const PCM_FORMAT: u16 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct Sound {
    sample_rate: u32,
    channels: u16,
    samples: Vec<f32>,
}

impl Sound {
    /// # Panics
    /// If `sample_rate` is zero, `channels` is not 1 or 2, or `samples` is not
    /// a whole number of frames.
    pub fn from_samples(sample_rate: u32, channels: u16, samples: Vec<f32>) -> Self {
        assert!(sample_rate > 0, "sound sample rate must be non-zero");
        assert!(
            channels == 1 || channels == 2,
            "sound must be mono or stereo, got {channels} channels"
        );
        assert_eq!(
            samples.len() % channels as usize,
            0,
            "sample count must be a multiple of the channel count"
        );
        Self {
            sample_rate,
            channels,
            samples,
        }
    }

    /// Zero-length sound, used as a stand-in when a sound asset is missing.
    pub fn silence(sample_rate: u32) -> Self {
        Self::from_samples(sample_rate, 1, Vec::new())
    }

    /// Decode a 16-bit PCM WAV file.
    pub fn from_wav(bytes: &[u8]) -> Result<Self, AudioError> {
        if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
            return Err(AudioError::NotWave);
        }

        let mut format = None;
        let mut data = None;
        let mut rest = &bytes[12..];
        while rest.len() >= 8 {
            let id = &rest[0..4];
            let size = read_u32(&rest[4..8]) as usize;
            let end = 8usize.checked_add(size).ok_or(AudioError::Truncated)?;
            let body = rest.get(8..end).ok_or(AudioError::Truncated)?;
            match id {
                b"fmt " => format = Some(Format::parse(body)?),
                b"data" => data = Some(body),
                _ => {}
            }
            // Chunks are padded to an even length.
            let advance = end.saturating_add(size & 1).min(rest.len());
            rest = &rest[advance..];
        }

        let format = format.ok_or(AudioError::MissingChunk("fmt "))?;
        let data = data.ok_or(AudioError::MissingChunk("data"))?;

        let frame_bytes = 2 * format.channels as usize;
        let usable = data.len() - data.len() % frame_bytes;
        let samples = data[..usable]
            .chunks_exact(2)
            .map(|pair| {
                let sample: i16 = bytemuck::pod_read_unaligned(pair);
                i16::from_le(sample) as f32 / 32768.0
            })
            .collect();

        tracing::trace!(
            sample_rate = format.sample_rate,
            channels = format.channels,
            bytes = data.len(),
            "decoded wav"
        );
        Ok(Self::from_samples(format.sample_rate, format.channels, samples))
    }

    /// [`from_wav`](Self::from_wav) taking ownership, for use as an asset decoder.
    pub fn decode(bytes: Vec<u8>) -> Result<Self, AudioError> {
        Self::from_wav(&bytes)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Interleaved samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Left/right sample pair for `frame`; mono is duplicated.
    #[inline]
    pub(crate) fn stereo_frame(&self, frame: usize) -> (f32, f32) {
        match self.channels {
            1 => {
                let s = self.samples[frame];
                (s, s)
            }
            _ => (self.samples[frame * 2], self.samples[frame * 2 + 1]),
        }
    }
}

struct Format {
    channels: u16,
    sample_rate: u32,
}

impl Format {
    fn parse(body: &[u8]) -> Result<Self, AudioError> {
        if body.len() < 16 {
            return Err(AudioError::Truncated);
        }
        let format_tag = read_u16(&body[0..2]);
        let channels = read_u16(&body[2..4]);
        let sample_rate = read_u32(&body[4..8]);
        let bits_per_sample = read_u16(&body[14..16]);

        if format_tag != PCM_FORMAT || bits_per_sample != 16 {
            return Err(AudioError::UnsupportedFormat {
                format_tag,
                bits_per_sample,
            });
        }
        if channels != 1 && channels != 2 {
            return Err(AudioError::UnsupportedChannels(channels));
        }
        if sample_rate == 0 {
            return Err(AudioError::InvalidSampleRate(sample_rate));
        }
        Ok(Self {
            channels,
            sample_rate,
        })
    }
}

fn read_u16(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Minimal 16-bit PCM WAV encoder for tests.
    pub(crate) fn wav_bytes(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
        let data_len = (samples.len() * 2) as u32;
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&PCM_FORMAT.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&(sample_rate * channels as u32 * 2).to_le_bytes());
        out.extend_from_slice(&(channels * 2).to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        for sample in samples {
            out.extend_from_slice(&sample.to_le_bytes());
        }
        out
    }

    #[test]
    fn decodes_mono_pcm() {
        let sound = Sound::from_wav(&wav_bytes(8000, 1, &[0, 16384, -32768])).unwrap();
        assert_eq!(sound.sample_rate(), 8000);
        assert_eq!(sound.channels(), 1);
        assert_eq!(sound.samples(), [0.0, 0.5, -1.0]);
        assert_eq!(sound.frames(), 3);
    }

    #[test]
    fn decodes_stereo_pcm() {
        let sound = Sound::from_wav(&wav_bytes(44_100, 2, &[16384, -16384, 0, 0])).unwrap();
        assert_eq!(sound.frames(), 2);
        assert_eq!(sound.stereo_frame(0), (0.5, -0.5));
        assert_eq!(sound.duration(), Duration::from_secs_f64(2.0 / 44_100.0));
    }

    #[test]
    fn skips_unknown_chunks() {
        let mut bytes = wav_bytes(8000, 1, &[100]);
        // Insert an odd-sized LIST chunk (padded) before `fmt `.
        let list = [b"LIST".as_slice(), &3u32.to_le_bytes(), b"abc\0"].concat();
        bytes.splice(12..12, list);
        assert_eq!(Sound::from_wav(&bytes).unwrap().frames(), 1);
    }

    #[test]
    fn rejects_unsupported_input() {
        assert_eq!(Sound::from_wav(b"not a wav"), Err(AudioError::NotWave));

        let mut eight_bit = wav_bytes(8000, 1, &[0]);
        eight_bit[34] = 8;
        assert_eq!(
            Sound::from_wav(&eight_bit),
            Err(AudioError::UnsupportedFormat {
                format_tag: 1,
                bits_per_sample: 8
            })
        );

        let surround = wav_bytes(8000, 6, &[0; 6]);
        assert_eq!(Sound::from_wav(&surround), Err(AudioError::UnsupportedChannels(6)));

        let truncated = wav_bytes(8000, 1, &[1, 2, 3]);
        assert_eq!(
            Sound::from_wav(&truncated[..truncated.len() - 2]),
            Err(AudioError::Truncated)
        );

        let no_data = &wav_bytes(8000, 1, &[])[..36];
        assert_eq!(Sound::from_wav(no_data), Err(AudioError::MissingChunk("data")));

        let mut oversized = wav_bytes(8000, 1, &[1, 2]);
        oversized[40..44].copy_from_slice(&u32::MAX.to_le_bytes());
        assert_eq!(Sound::from_wav(&oversized), Err(AudioError::Truncated));
    }

    #[test]
    #[should_panic(expected = "sample rate must be non-zero")]
    fn zero_sample_rate_is_rejected() {
        Sound::from_samples(0, 1, vec![0.0]);
    }
}
