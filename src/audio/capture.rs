//! Microphone capture via `cpal`.
//!
//! [`AudioSource`] is the lifecycle contract the detector relies on:
//! acquire the device ([`initialize`](AudioSource::initialize)), start
//! delivering mono quanta to a sink on the audio thread
//! ([`start`](AudioSource::start)), pause/resume without releasing the
//! device, and [`dispose`](AudioSource::dispose) everything.
//!
//! [`CpalSource`] is the production implementation on top of the default
//! cpal host.

#[cfg(test)]
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
#[cfg(test)]
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};
use thiserror::Error;

use crate::audio::mailbox::{mailbox, MailboxReceiver, MailboxSender};
use crate::audio::resample::stereo_to_mono;

// ---------------------------------------------------------------------------
// AudioSink / StreamInfo
// ---------------------------------------------------------------------------

/// Real-time callback receiving one mono `f32` quantum at a time.
///
/// Runs on the platform audio thread: it must not block or wait on the
/// detector.
pub type AudioSink = Box<dyn FnMut(&[f32]) + Send + 'static>;

/// Format of the stream delivered to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    /// Actual device rate in Hz (e.g. 44 100, 48 000).
    pub sample_rate: u32,
    /// Channels the device delivers before the mono downmix.
    pub channels: u16,
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while acquiring or running the microphone.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("microphone access denied: {0}")]
    PermissionDenied(String),

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("failed to pause audio stream: {0}")]
    PauseStream(#[from] cpal::PauseStreamError),

    #[error("unsupported input sample format {0:?}")]
    UnsupportedFormat(SampleFormat),

    #[error("audio stream failed: {0}")]
    Stream(String),

    #[error("audio source used before initialize()")]
    NotInitialized,
}

impl CaptureError {
    /// `true` for errors caused by the user or OS refusing microphone access.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, CaptureError::PermissionDenied(_))
    }
}

impl From<cpal::BuildStreamError> for CaptureError {
    fn from(err: cpal::BuildStreamError) -> Self {
        // cpal reports OS access refusals as backend-specific errors; the
        // backends phrase them consistently enough to recognise.
        let text = err.to_string();
        let lower = text.to_lowercase();
        if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized") {
            CaptureError::PermissionDenied(text)
        } else {
            CaptureError::BuildStream(err)
        }
    }
}

// ---------------------------------------------------------------------------
// AudioSource
// ---------------------------------------------------------------------------

/// Microphone lifecycle.
///
/// At most one live acquisition exists per source; `dispose` is idempotent
/// and the source may be initialised again afterwards.
pub trait AudioSource {
    /// Acquire the input device and report its stream format.
    fn initialize(&mut self) -> Result<StreamInfo, CaptureError>;

    /// Start delivering quanta to `sink` on the audio thread.
    fn start(&mut self, sink: AudioSink) -> Result<(), CaptureError>;

    /// Pause processing without releasing the device.
    fn suspend(&mut self) -> Result<(), CaptureError>;

    /// Resume after [`suspend`](Self::suspend).
    fn resume(&mut self) -> Result<(), CaptureError>;

    /// Stop the stream and release the device.
    fn dispose(&mut self);

    /// Format reported by the last successful `initialize`.
    fn stream_info(&self) -> Option<StreamInfo>;

    /// A failure the running stream reported since the last call, if any.
    /// Polled from the detector thread.
    fn take_error(&mut self) -> Option<CaptureError>;
}

// ---------------------------------------------------------------------------
// Sample conversion
// ---------------------------------------------------------------------------

/// Convert device samples of any cpal format to `f32` in `[-1, 1]` into
/// `out`, which is cleared first and reused across callbacks.
///
/// ```rust
/// use vowel_detect::audio::capture::samples_to_f32;
///
/// let mut out = Vec::new();
/// samples_to_f32(&[0_i16, i16::MIN], &mut out);
/// assert_eq!(out, vec![0.0, -1.0]);
/// ```
pub fn samples_to_f32<T>(data: &[T], out: &mut Vec<f32>)
where
    T: Sample,
    f32: FromSample<T>,
{
    out.clear();
    out.extend(data.iter().map(|&s| f32::from_sample(s)));
}

// ---------------------------------------------------------------------------
// CpalSource
// ---------------------------------------------------------------------------

/// Default-input-device capture built on `cpal`.
///
/// # Example
///
/// ```rust,no_run
/// use vowel_detect::audio::{AudioSource, CpalSource};
///
/// let mut mic = CpalSource::new(Some(44_100));
/// let info = mic.initialize().unwrap();
/// mic.start(Box::new(move |quantum: &[f32]| {
///     // audio thread: keep this short
///     let _ = quantum.len();
/// }))
/// .unwrap();
/// println!("capturing at {} Hz", info.sample_rate);
/// ```
pub struct CpalSource {
    preferred_rate: Option<u32>,
    device: Option<(cpal::Device, cpal::StreamConfig, SampleFormat)>,
    stream: Option<cpal::Stream>,
    info: Option<StreamInfo>,
    faults: Option<MailboxReceiver<String>>,
}

impl CpalSource {
    /// `preferred_rate` is used when the device supports it; otherwise the
    /// device default rate is kept.
    pub fn new(preferred_rate: Option<u32>) -> Self {
        Self {
            preferred_rate,
            device: None,
            stream: None,
            info: None,
            faults: None,
        }
    }

    fn pick_config(
        device: &cpal::Device,
        preferred_rate: Option<u32>,
    ) -> Result<(cpal::StreamConfig, SampleFormat), CaptureError> {
        let supported = device.default_input_config()?;
        let format = supported.sample_format();
        let mut config = supported.config();

        if let Some(rate) = preferred_rate {
            let channels = config.channels;
            let supports_rate = device
                .supported_input_configs()
                .map(|mut ranges| {
                    ranges.any(|r| {
                        r.channels() == channels
                            && r.sample_format() == format
                            && r.min_sample_rate().0 <= rate
                            && rate <= r.max_sample_rate().0
                    })
                })
                .unwrap_or(false);
            if supports_rate {
                config.sample_rate = cpal::SampleRate(rate);
            } else {
                log::debug!(
                    "capture: {rate} Hz unsupported, using device default {} Hz",
                    config.sample_rate.0
                );
            }
        }

        Ok((config, format))
    }

    /// Build a stream for device samples of type `T`, converting to mono
    /// `f32` in scratch buffers that are reused across callbacks.
    fn build_stream<T>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        mut sink: AudioSink,
        faults: MailboxSender<String>,
    ) -> Result<cpal::Stream, CaptureError>
    where
        T: SizedSample,
        f32: FromSample<T>,
    {
        let channels = config.channels;
        let mut converted = Vec::with_capacity(4096);
        let mut mono = Vec::with_capacity(4096);

        let stream = device.build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                samples_to_f32(data, &mut converted);
                stereo_to_mono(&converted, channels, &mut mono);
                sink(&mono);
            },
            move |err: cpal::StreamError| {
                log::error!("cpal stream error: {err}");
                faults.publish(err.to_string());
            },
            None,
        )?;
        Ok(stream)
    }
}

impl AudioSource for CpalSource {
    fn initialize(&mut self) -> Result<StreamInfo, CaptureError> {
        if let Some(info) = self.info {
            return Ok(info);
        }

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(CaptureError::NoDevice)?;
        let (config, format) = Self::pick_config(&device, self.preferred_rate)?;

        let info = StreamInfo {
            sample_rate: config.sample_rate.0,
            channels: config.channels,
        };
        log::info!(
            "capture: input device ready ({} Hz, {} ch, {format:?})",
            info.sample_rate,
            info.channels
        );

        self.device = Some((device, config, format));
        self.info = Some(info);
        Ok(info)
    }

    fn start(&mut self, sink: AudioSink) -> Result<(), CaptureError> {
        let (device, config, format) = self.device.as_ref().ok_or(CaptureError::NotInitialized)?;
        let (fault_tx, fault_rx) = mailbox();

        let stream = match *format {
            SampleFormat::F32 => Self::build_stream::<f32>(device, config, sink, fault_tx)?,
            SampleFormat::I16 => Self::build_stream::<i16>(device, config, sink, fault_tx)?,
            SampleFormat::U16 => Self::build_stream::<u16>(device, config, sink, fault_tx)?,
            SampleFormat::I32 => Self::build_stream::<i32>(device, config, sink, fault_tx)?,
            SampleFormat::U8 => Self::build_stream::<u8>(device, config, sink, fault_tx)?,
            other => return Err(CaptureError::UnsupportedFormat(other)),
        };

        stream.play()?;
        self.stream = Some(stream);
        self.faults = Some(fault_rx);
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), CaptureError> {
        let stream = self.stream.as_ref().ok_or(CaptureError::NotInitialized)?;
        stream.pause()?;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), CaptureError> {
        let stream = self.stream.as_ref().ok_or(CaptureError::NotInitialized)?;
        stream.play()?;
        Ok(())
    }

    fn dispose(&mut self) {
        if self.stream.take().is_some() {
            log::info!("capture: stream released");
        }
        self.device = None;
        self.info = None;
        self.faults = None;
    }

    fn stream_info(&self) -> Option<StreamInfo> {
        self.info
    }

    fn take_error(&mut self) -> Option<CaptureError> {
        self.faults.as_ref()?.take().map(CaptureError::Stream)
    }
}

// ---------------------------------------------------------------------------
// ManualSource  (tests)
// ---------------------------------------------------------------------------

/// In-memory [`AudioSource`] driven by the test through a shared handle.
#[cfg(test)]
pub struct ManualSource {
    pub info: StreamInfo,
    pub sink: Arc<Mutex<Option<AudioSink>>>,
    pub fail_with: Option<fn() -> CaptureError>,
    pub suspended: Arc<AtomicBool>,
    pub disposed: Arc<AtomicUsize>,
    /// Set to simulate a failure reported by the running stream.
    pub fault: Arc<Mutex<Option<String>>>,
    initialized: bool,
}

#[cfg(test)]
impl ManualSource {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            info: StreamInfo {
                sample_rate,
                channels: 1,
            },
            sink: Arc::new(Mutex::new(None)),
            fail_with: None,
            suspended: Arc::new(AtomicBool::new(false)),
            disposed: Arc::new(AtomicUsize::new(0)),
            fault: Arc::new(Mutex::new(None)),
            initialized: false,
        }
    }

    /// Handle used to feed quanta as if the audio thread delivered them.
    pub fn feeder(&self) -> Arc<Mutex<Option<AudioSink>>> {
        Arc::clone(&self.sink)
    }
}

#[cfg(test)]
impl AudioSource for ManualSource {
    fn initialize(&mut self) -> Result<StreamInfo, CaptureError> {
        if let Some(fail) = self.fail_with {
            return Err(fail());
        }
        self.initialized = true;
        Ok(self.info)
    }

    fn start(&mut self, sink: AudioSink) -> Result<(), CaptureError> {
        if !self.initialized {
            return Err(CaptureError::NotInitialized);
        }
        *self.sink.lock().unwrap() = Some(sink);
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), CaptureError> {
        self.suspended.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn resume(&mut self) -> Result<(), CaptureError> {
        self.suspended.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn dispose(&mut self) {
        *self.sink.lock().unwrap() = None;
        self.initialized = false;
        self.disposed.fetch_add(1, Ordering::SeqCst);
    }

    fn stream_info(&self) -> Option<StreamInfo> {
        self.initialized.then_some(self.info)
    }

    fn take_error(&mut self) -> Option<CaptureError> {
        self.fault.lock().unwrap().take().map(CaptureError::Stream)
    }
}

/// Push one quantum through a [`ManualSource`] feeder.
#[cfg(test)]
pub fn feed(feeder: &Arc<Mutex<Option<AudioSink>>>, quantum: &[f32]) {
    if let Some(sink) = feeder.lock().unwrap().as_mut() {
        sink(quantum);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<AudioSink>();
    }

    #[test]
    fn permission_error_is_recognised() {
        let err = CaptureError::PermissionDenied("denied by user".into());
        assert!(err.is_permission_denied());
        assert!(!CaptureError::NoDevice.is_permission_denied());
    }

    #[test]
    fn build_error_with_access_text_maps_to_permission() {
        let err: CaptureError = cpal::BuildStreamError::BackendSpecific {
            err: cpal::BackendSpecificError {
                description: "Permission denied (os error 13)".into(),
            },
        }
        .into();
        assert!(err.is_permission_denied());

        let err: CaptureError = cpal::BuildStreamError::DeviceNotAvailable.into();
        assert!(matches!(err, CaptureError::BuildStream(_)));
    }

    #[test]
    fn integer_samples_are_scaled_to_unit_range() {
        let mut out = vec![9.0; 16];
        samples_to_f32(&[0_i16, i16::MIN, 16_384], &mut out);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], 0.0);
        assert_eq!(out[1], -1.0);
        assert!((out[2] - 0.5).abs() < 1e-6);

        // Unsigned formats are centred on the midpoint.
        samples_to_f32(&[32_768_u16, 0, u16::MAX], &mut out);
        assert_eq!(out[0], 0.0);
        assert_eq!(out[1], -1.0);
        assert!(out[2] > 0.999);
    }

    #[test]
    fn conversion_reuses_the_scratch_buffer() {
        let mut out = Vec::with_capacity(64);
        let ptr = out.as_ptr();
        for _ in 0..4 {
            samples_to_f32(&[1_000_i16; 48], &mut out);
        }
        assert_eq!(out.len(), 48);
        assert_eq!(out.as_ptr(), ptr);
    }

    #[test]
    fn stream_fault_is_reported_once() {
        let mut src = ManualSource::new(48_000);
        src.initialize().unwrap();
        assert!(src.take_error().is_none());

        *src.fault.lock().unwrap() = Some("device unplugged".into());
        let err = src.take_error().unwrap();
        assert!(matches!(err, CaptureError::Stream(ref m) if m == "device unplugged"));
        assert_eq!(err.to_string(), "audio stream failed: device unplugged");
        assert!(src.take_error().is_none());
    }

    #[test]
    fn manual_source_lifecycle() {
        let mut src = ManualSource::new(48_000);
        assert!(matches!(
            src.start(Box::new(|_: &[f32]| {})),
            Err(CaptureError::NotInitialized)
        ));

        let info = src.initialize().unwrap();
        assert_eq!(info.sample_rate, 48_000);

        let seen = Arc::new(Mutex::new(0usize));
        let seen_cb = Arc::clone(&seen);
        src.start(Box::new(move |q: &[f32]| *seen_cb.lock().unwrap() += q.len()))
            .unwrap();
        feed(&src.feeder(), &[0.0; 128]);
        assert_eq!(*seen.lock().unwrap(), 128);

        src.dispose();
        src.dispose();
        assert_eq!(src.disposed.load(Ordering::SeqCst), 2);
        assert!(src.stream_info().is_none());
        feed(&src.feeder(), &[0.0; 128]);
        assert_eq!(*seen.lock().unwrap(), 128);
    }
}
