#[cfg(feature = "audio")]
use rodio::Source;
use std::time::Duration;

/// Short square-wave beep played when a session completes.
pub struct Chime {
    frequency: f32,
    amplitude: f32,
    sample_rate: u32,
    num_sample: usize,
    total_samples: usize,
}

impl Chime {
    pub fn new(frequency: f32, duration: Duration, amplitude: f32) -> Self {
        let sample_rate = 44100;
        Self {
            frequency,
            amplitude: amplitude.clamp(0.0, 1.0),
            sample_rate,
            num_sample: 0,
            total_samples: (duration.as_secs_f32() * sample_rate as f32) as usize,
        }
    }

    /// 880 Hz for 200 ms.
    pub fn completion() -> Self {
        Self::new(880.0, Duration::from_millis(200), 0.3)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.total_samples as f64 / f64::from(self.sample_rate))
    }
}

impl Iterator for Chime {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_sample >= self.total_samples {
            return None;
        }
        let t = self.num_sample as f32 / self.sample_rate as f32;
        self.num_sample += 1;

        // High for the first half of each period, low for the second.
        let phase = (t * self.frequency).fract();
        let sample = if phase < 0.5 { 1.0 } else { -1.0 };
        Some(sample * self.amplitude)
    }
}

#[cfg(feature = "audio")]
impl Source for Chime {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.total_samples - self.num_sample)
    }

    fn channels(&self) -> u16 {
        1 // Mono
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(self.duration())
    }
}
