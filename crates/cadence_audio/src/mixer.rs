// mixer.rs - Software mixer over cached sounds
//
// Output is interleaved stereo f32 at the mixer's sample rate. Sounds at a
// different rate are stepped with nearest-neighbour resampling.

use crate::sound::Sound;
use cadence_asset::ResourceHandle;

pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

struct Voice {
    sound: ResourceHandle<Sound>,
    /// Position in source frames.
    cursor: f64,
    step: f64,
    volume: f32,
}

impl Voice {
    fn finished(&self) -> bool {
        self.cursor as usize >= self.sound.frames()
    }
}

pub struct Mixer {
    sample_rate: u32,
    master_volume: f32,
    voices: Vec<Voice>,
}

impl Mixer {
    /// # Panics
    /// If `sample_rate` is zero.
    pub fn new(sample_rate: u32) -> Self {
        assert!(sample_rate > 0, "mixer sample rate must be non-zero");
        Self {
            sample_rate,
            master_volume: 1.0,
            voices: Vec::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    /// Clamped to `[0, 1]`.
    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
    }

    /// Start playing `sound` at full volume.
    pub fn play(&mut self, sound: ResourceHandle<Sound>) {
        self.play_with_volume(sound, 1.0);
    }

    pub fn play_with_volume(&mut self, sound: ResourceHandle<Sound>, volume: f32) {
        if sound.frames() == 0 {
            return;
        }
        let step = sound.sample_rate() as f64 / self.sample_rate as f64;
        tracing::trace!(key = %sound.key(), frames = sound.frames(), "voice started");
        self.voices.push(Voice {
            sound,
            cursor: 0.0,
            step,
            volume: volume.max(0.0),
        });
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    /// Drop every voice, releasing their sounds.
    pub fn stop_all(&mut self) {
        self.voices.clear();
    }

    /// Overwrite `out` (interleaved stereo) with the next block of audio.
    ///
    /// Finished voices are retired afterwards. Returns the number of voices
    /// still playing.
    pub fn mix(&mut self, out: &mut [f32]) -> usize {
        out.fill(0.0);
        for voice in &mut self.voices {
            for frame in out.chunks_exact_mut(2) {
                if voice.finished() {
                    break;
                }
                let (left, right) = voice.sound.stereo_frame(voice.cursor as usize);
                frame[0] += left * voice.volume;
                frame[1] += right * voice.volume;
                voice.cursor += voice.step;
            }
        }

        let master = self.master_volume;
        for sample in out.iter_mut() {
            *sample = (*sample * master).clamp(-1.0, 1.0);
        }

        let before = self.voices.len();
        self.voices.retain(|voice| !voice.finished());
        if self.voices.len() != before {
            tracing::trace!(retired = before - self.voices.len(), "voices finished");
        }
        self.voices.len()
    }
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE)
    }
}
