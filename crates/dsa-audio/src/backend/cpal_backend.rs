//! cpal audio backend
//!
//! Audio output using the cpal (Cross-Platform Audio Library). A cpal
//! stream cannot leave the thread that built it, so the backend owns the
//! stream on a dedicated thread and drives it through a command channel.

use super::{AudioOutput, OutputState};
use crate::bridge::AudioBridge;
use crate::convert::{RateConverter, StereoFrame, CORE_SAMPLE_RATE};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use crossbeam::channel::{bounded, unbounded, Receiver, Sender};
use dsa_core::error::AudioError;
use std::sync::Arc;
use std::thread::JoinHandle;

enum Command {
    Play(Sender<Result<(), AudioError>>),
    Pause(Sender<Result<(), AudioError>>),
    Close,
}

/// Device parameters reported by the audio thread
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub sample_rate: u32,
    pub channels: u16,
}

/// cpal audio backend
pub struct CpalAudioBackend {
    volume: f32,
    commands: Option<Sender<Command>>,
    thread: Option<JoinHandle<()>>,
    device: Option<DeviceInfo>,
    state: OutputState,
}

impl CpalAudioBackend {
    /// Create a backend; the device is opened on `start`
    pub fn new(volume: f32) -> Self {
        Self {
            volume: volume.clamp(0.0, 1.0),
            commands: None,
            thread: None,
            device: None,
            state: OutputState::Idle,
        }
    }

    pub fn device(&self) -> Option<&DeviceInfo> {
        self.device.as_ref()
    }

    fn request(
        &self,
        make: impl FnOnce(Sender<Result<(), AudioError>>) -> Command,
    ) -> Result<(), AudioError> {
        let commands = self.commands.as_ref().ok_or(AudioError::ThreadGone)?;
        let (reply_tx, reply_rx) = bounded(1);
        commands
            .send(make(reply_tx))
            .map_err(|_| AudioError::ThreadGone)?;
        reply_rx.recv().map_err(|_| AudioError::ThreadGone)?
    }
}

/// Open the default device and build a stream pulling from `bridge`
fn build_stream(bridge: Arc<AudioBridge>, volume: f32) -> Result<(Stream, DeviceInfo), AudioError> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(AudioError::NoDevice)?;
    let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    tracing::info!("Audio device: {}", name);

    let supported = device
        .default_output_config()
        .map_err(|e| AudioError::Config(e.to_string()))?;
    tracing::info!("Audio config: {:?}", supported);

    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.into();
    let channels = config.channels as usize;
    let info = DeviceInfo {
        name,
        sample_rate: config.sample_rate.0,
        channels: config.channels,
    };

    let mut converter = RateConverter::new(CORE_SAMPLE_RATE, info.sample_rate);
    let error_callback = |err: cpal::StreamError| tracing::error!("Audio stream error: {}", err);

    let stream = match sample_format {
        SampleFormat::F32 => {
            let mut frames: Vec<StereoFrame> = Vec::new();
            device.build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    render(&bridge, &mut converter, volume, channels, &mut frames, data, |v| v);
                },
                error_callback,
                None,
            )
        }
        SampleFormat::I16 => {
            let mut frames: Vec<StereoFrame> = Vec::new();
            device.build_output_stream(
                &config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    render(&bridge, &mut converter, volume, channels, &mut frames, data, |v| {
                        (v * 32767.0) as i16
                    });
                },
                error_callback,
                None,
            )
        }
        other => {
            return Err(AudioError::Config(format!(
                "Unsupported sample format {:?}",
                other
            )))
        }
    }
    .map_err(|e| AudioError::Stream(e.to_string()))?;

    Ok((stream, info))
}

/// Fill an interleaved device buffer from the bridge
fn render<T: Copy + Default>(
    bridge: &AudioBridge,
    converter: &mut RateConverter,
    volume: f32,
    channels: usize,
    frames: &mut Vec<StereoFrame>,
    data: &mut [T],
    to_device: impl Fn(f32) -> T,
) {
    if channels == 0 {
        return;
    }
    frames.resize(data.len() / channels, [0.0; 2]);
    converter.fill(bridge, frames, volume);

    for (out, frame) in data.chunks_mut(channels).zip(frames.iter()) {
        match channels {
            1 => out[0] = to_device((frame[0] + frame[1]) * 0.5),
            _ => {
                out[0] = to_device(frame[0]);
                out[1] = to_device(frame[1]);
                out[2..].fill(T::default());
            }
        }
    }
}

fn audio_thread(stream: Stream, commands: Receiver<Command>) {
    for command in commands.iter() {
        match command {
            Command::Play(reply) => {
                let result = stream
                    .play()
                    .map_err(|e| AudioError::Playback(e.to_string()));
                let _ = reply.send(result);
            }
            Command::Pause(reply) => {
                let result = stream
                    .pause()
                    .map_err(|e| AudioError::Playback(e.to_string()));
                let _ = reply.send(result);
            }
            Command::Close => break,
        }
    }
    drop(stream);
    tracing::info!("Audio stream closed");
}

impl AudioOutput for CpalAudioBackend {
    fn start(&mut self, bridge: Arc<AudioBridge>) -> Result<(), AudioError> {
        match self.state {
            OutputState::Closed => {
                return Err(AudioError::Playback("output is closed".to_string()))
            }
            OutputState::Running | OutputState::Suspended => return Ok(()),
            OutputState::Idle => {}
        }

        let (command_tx, command_rx) = unbounded();
        let (ready_tx, ready_rx) = bounded(1);
        let volume = self.volume;

        let thread = std::thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || match build_stream(bridge, volume) {
                Ok((stream, info)) => {
                    let _ = ready_tx.send(Ok(info));
                    audio_thread(stream, command_rx);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| AudioError::Stream(e.to_string()))?;

        let info = ready_rx.recv().map_err(|_| AudioError::ThreadGone)??;
        tracing::info!(
            "Audio output on {} at {} Hz, {} channels",
            info.name,
            info.sample_rate,
            info.channels
        );
        self.device = Some(info);
        self.commands = Some(command_tx);
        self.thread = Some(thread);

        self.request(Command::Play)?;
        self.state = OutputState::Running;
        tracing::info!("Audio stream started");
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), AudioError> {
        if self.state != OutputState::Running {
            return Ok(());
        }
        self.request(Command::Pause)?;
        self.state = OutputState::Suspended;
        tracing::info!("Audio stream suspended");
        Ok(())
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        if self.state != OutputState::Suspended {
            return Ok(());
        }
        self.request(Command::Play)?;
        self.state = OutputState::Running;
        tracing::info!("Audio stream resumed");
        Ok(())
    }

    fn close(&mut self) {
        if let Some(commands) = self.commands.take() {
            let _ = commands.send(Command::Close);
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Audio thread panicked");
            }
        }
        self.state = OutputState::Closed;
    }

    fn state(&self) -> OutputState {
        self.state
    }

    fn name(&self) -> &str {
        "cpal"
    }
}

impl Drop for CpalAudioBackend {
    fn drop(&mut self) {
        self.close();
    }
}
