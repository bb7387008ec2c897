//! Local audio source seam
//!
//! The negotiator acquires the local audio source before any network step
//! and owns it for the lifetime of the session. Devices sit behind
//! [`AudioCapture`] so the engine stays buildable headless; the cpal-backed
//! implementation is feature-gated (`device-cpal`) because it needs platform
//! audio libraries at build time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::VoiceResult;

/// One encoded audio frame ready for the outbound track
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Encoded payload (Opus for the default track configuration)
    pub payload: Bytes,
    /// Wall-clock duration the frame covers
    pub duration: Duration,
}

/// Shared control surface of an open capture
///
/// Cloneable so the negotiator can keep it for mute handling while the
/// frame stream is consumed elsewhere.
#[derive(Debug, Clone, Default)]
pub struct CaptureControl {
    enabled: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
}

impl CaptureControl {
    /// Create a control with input enabled
    pub fn new() -> Self {
        let control = Self::default();
        control.enabled.store(true, Ordering::SeqCst);
        control
    }

    /// Enable or disable the local input (the local half of muting)
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Whether input is currently enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Stop the capture; the producer ends and the frame stream closes
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Whether the capture has been stopped
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// An open local audio source
pub struct CaptureHandle {
    /// Control surface shared with the producer
    pub control: CaptureControl,
    /// Stream of encoded frames
    pub frames: mpsc::Receiver<AudioFrame>,
}

/// Injected seam for acquiring the local audio source
#[async_trait]
pub trait AudioCapture: Send + Sync {
    /// Open the device and start producing frames
    ///
    /// Fails with [`crate::VoiceError::MicrophoneUnavailable`] when no
    /// device can be acquired.
    async fn open(&self) -> VoiceResult<CaptureHandle>;
}

/// Capture that opens successfully but produces no frames
///
/// Used in tests and in deployments where media input is wired externally.
pub struct SilenceCapture;

#[async_trait]
impl AudioCapture for SilenceCapture {
    async fn open(&self) -> VoiceResult<CaptureHandle> {
        // Keep a sender alive in a background task so the stream stays open
        // until the control is stopped.
        let control = CaptureControl::new();
        let (tx, rx) = mpsc::channel(8);
        let watch = control.clone();
        tokio::spawn(async move {
            while !watch.is_stopped() {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            drop(tx);
        });
        Ok(CaptureHandle { control, frames: rx })
    }
}

#[cfg(feature = "device-cpal")]
pub use device::CpalCapture;

#[cfg(feature = "device-cpal")]
mod device {
    //! cpal-backed microphone capture
    //!
    //! cpal streams are `!Send`, so the stream lives on a dedicated thread
    //! that forwards PCM into an Opus encoder and pushes encoded frames over
    //! the channel. Only 48 kHz devices are accepted.
    //! TODO: resample non-48 kHz devices instead of rejecting them.

    use super::*;
    use crate::error::VoiceError;
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use tracing::{debug, warn};

    const SAMPLE_RATE: u32 = 48_000;
    /// 20 ms at 48 kHz mono
    const FRAME_SAMPLES: usize = 960;
    const FRAME_DURATION: Duration = Duration::from_millis(20);

    /// [`AudioCapture`] over the default system input device
    pub struct CpalCapture;

    #[async_trait]
    impl AudioCapture for CpalCapture {
        async fn open(&self) -> VoiceResult<CaptureHandle> {
            let control = CaptureControl::new();
            let (tx, rx) = mpsc::channel::<AudioFrame>(32);
            let watch = control.clone();

            // Device and stream setup happen on the capture thread; the
            // outcome is reported back over a one-shot channel.
            let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), String>>();

            std::thread::Builder::new()
                .name("helpline-capture".to_string())
                .spawn(move || run_capture(watch, tx, ready_tx))
                .map_err(|e| VoiceError::microphone(e.to_string()))?;

            match ready_rx.recv() {
                Ok(Ok(())) => Ok(CaptureHandle { control, frames: rx }),
                Ok(Err(message)) => Err(VoiceError::microphone(message)),
                Err(_) => Err(VoiceError::microphone("capture thread exited during setup")),
            }
        }
    }

    fn run_capture(
        control: CaptureControl,
        frames: mpsc::Sender<AudioFrame>,
        ready: std::sync::mpsc::Sender<Result<(), String>>,
    ) {
        let setup = (|| -> Result<cpal::Stream, String> {
            let host = cpal::default_host();
            let device = host
                .default_input_device()
                .ok_or_else(|| "no default input device".to_string())?;
            let supported = device.default_input_config().map_err(|e| e.to_string())?;
            if supported.sample_rate().0 != SAMPLE_RATE {
                return Err(format!(
                    "input device runs at {} Hz, only {} Hz is supported",
                    supported.sample_rate().0,
                    SAMPLE_RATE
                ));
            }
            let channels = supported.channels() as usize;

            let encoder = audiopus::coder::Encoder::new(
                audiopus::SampleRate::Hz48000,
                audiopus::Channels::Mono,
                audiopus::Application::Voip,
            )
            .map_err(|e| e.to_string())?;

            let mut pcm: Vec<i16> = Vec::with_capacity(FRAME_SAMPLES * 2);
            let mut encoded = vec![0u8; 4000];
            let mut encoder = encoder;

            let stream = device
                .build_input_stream(
                    &supported.config(),
                    move |data: &[f32], _| {
                        // Downmix to mono and convert to s16
                        for chunk in data.chunks(channels) {
                            let sum: f32 = chunk.iter().sum();
                            let sample = (sum / channels as f32).clamp(-1.0, 1.0);
                            pcm.push((sample * i16::MAX as f32) as i16);
                        }
                        while pcm.len() >= FRAME_SAMPLES {
                            let frame: Vec<i16> = pcm.drain(..FRAME_SAMPLES).collect();
                            match encoder.encode(&frame, &mut encoded) {
                                Ok(len) => {
                                    let frame = AudioFrame {
                                        payload: Bytes::copy_from_slice(&encoded[..len]),
                                        duration: FRAME_DURATION,
                                    };
                                    // Never block the audio callback
                                    let _ = frames.try_send(frame);
                                }
                                Err(e) => warn!("opus encode failed: {}", e),
                            }
                        }
                    },
                    |e| warn!("input stream error: {}", e),
                    None,
                )
                .map_err(|e| e.to_string())?;
            stream.play().map_err(|e| e.to_string())?;
            Ok(stream)
        })();

        match setup {
            Ok(stream) => {
                let _ = ready.send(Ok(()));
                debug!("capture started");
                while !control.is_stopped() {
                    std::thread::sleep(Duration::from_millis(50));
                }
                drop(stream);
                debug!("capture stopped");
            }
            Err(message) => {
                let _ = ready.send(Err(message));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn silence_capture_opens_and_stops() {
        let mut handle = SilenceCapture.open().await.unwrap();
        assert!(handle.control.is_enabled());

        handle.control.stop();
        // Stream closes once the producer observes the stop flag
        assert!(handle.frames.recv().await.is_none());
    }

    #[test]
    fn control_toggles_enabled() {
        let control = CaptureControl::new();
        assert!(control.is_enabled());
        control.set_enabled(false);
        assert!(!control.is_enabled());
        control.set_enabled(true);
        assert!(control.is_enabled());
    }
}
