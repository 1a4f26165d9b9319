pub mod chime;

use anyhow::Result;
use log::debug;

/// Plays the "session finished" cue. Fire and forget: the engine logs a
/// failure and carries on.
pub trait CuePlayer: Send + Sync {
    fn play_completion_cue(&self) -> Result<()>;

    /// Cuts off a cue that is still playing.
    fn stop(&self) {}
}

/// Used when no audio output is wanted or available.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentCuePlayer;

impl CuePlayer for SilentCuePlayer {
    fn play_completion_cue(&self) -> Result<()> {
        debug!("completion cue (silent)");
        Ok(())
    }
}

#[cfg(feature = "audio")]
pub use engine::AudioCuePlayer;

#[cfg(feature = "audio")]
mod engine {
    use super::chime::Chime;
    use super::CuePlayer;

    use anyhow::{anyhow, Result};
    use log::warn;
    use rodio::{OutputStream, Sink};
    use std::sync::{
        mpsc::{self, Sender},
        Arc, Mutex,
    };
    use std::thread;

    const CUE_VOLUME: f32 = 0.7;

    enum AudioCommand {
        PlayChime,
        Stop,
    }

    /// Owns a dedicated audio thread; rodio's stream is not `Send`, so it
    /// never leaves that thread.
    pub struct AudioCuePlayer {
        tx: Arc<Mutex<Option<Sender<AudioCommand>>>>,
    }

    impl Default for AudioCuePlayer {
        fn default() -> Self {
            Self::new()
        }
    }

    impl AudioCuePlayer {
        pub fn new() -> Self {
            Self {
                tx: Arc::new(Mutex::new(None)),
            }
        }

        fn ensure_thread(&self) -> Result<Sender<AudioCommand>> {
            let mut guard = self
                .tx
                .lock()
                .map_err(|e| anyhow!("audio sender lock poisoned: {e}"))?;
            if let Some(tx) = guard.as_ref() {
                return Ok(tx.clone());
            }

            let (tx, rx) = mpsc::channel::<AudioCommand>();

            thread::Builder::new()
                .name("audio-cue".to_string())
                .spawn(move || {
                    let mut _stream: Option<OutputStream> = None;
                    let mut sink: Option<Sink> = None;

                    fn fresh_sink(
                        stream: &mut Option<OutputStream>,
                        sink: &mut Option<Sink>,
                    ) -> Result<(), String> {
                        let (s, handle) = OutputStream::try_default()
                            .map_err(|e| format!("Failed to create audio output stream: {}", e))?;
                        let new_sink = Sink::try_new(&handle)
                            .map_err(|e| format!("Failed to create audio sink: {}", e))?;
                        new_sink.set_volume(CUE_VOLUME);
                        *stream = Some(s);
                        *sink = Some(new_sink);
                        Ok(())
                    }

                    while let Ok(cmd) = rx.recv() {
                        match cmd {
                            AudioCommand::PlayChime => {
                                // Cut off a chime that is still playing.
                                if let Some(old) = sink.take() {
                                    old.stop();
                                }
                                if let Err(err) = fresh_sink(&mut _stream, &mut sink) {
                                    warn!("completion cue unavailable: {err}");
                                    continue;
                                }
                                if let Some(ref s) = sink {
                                    s.append(Chime::completion());
                                }
                            }
                            AudioCommand::Stop => {
                                if let Some(old) = sink.take() {
                                    old.stop();
                                }
                                _stream = None;
                            }
                        }
                    }
                })
                .map_err(|e| anyhow!("failed to spawn audio thread: {e}"))?;

            *guard = Some(tx.clone());
            Ok(tx)
        }
    }

    impl CuePlayer for AudioCuePlayer {
        fn play_completion_cue(&self) -> Result<()> {
            let tx = self.ensure_thread()?;
            tx.send(AudioCommand::PlayChime)
                .map_err(|e| anyhow!("audio thread gone: {e}"))
        }

        fn stop(&self) {
            // Never spawns the thread just to stop it.
            if let Ok(Some(tx)) = self.tx.lock().map(|g| g.clone()) {
                let _ = tx.send(AudioCommand::Stop);
            }
        }
    }
}
