//! # Audio Capture Module
//!
//! Real-time audio capture using CPAL (Cross-Platform Audio Library).
//! Selects an input device, configures an f32 stream near the target
//! sample rate, and delivers fixed-size mono blocks to the analysis thread
//! over a channel. The capture callback never blocks: if the channel is
//! full the block is dropped.
//!
//! Mono devices are preferred; on stereo devices each block keeps the
//! louder channel rather than mixing, so a signal on one channel is not
//! diluted by the other's noise floor.

use anyhow::{Result, anyhow};
use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Sender;

use crate::window::louder_channel;

/// Number of samples per delivered audio block.
///
/// Smaller than the analysis window on purpose: blocks only feed the ring
/// buffer, the window is re-extracted on every hop.
pub const BLOCK_SIZE: usize = 2048;

/// Target sample rate for device selection.
pub const TARGET_SAMPLE_RATE: u32 = 44100;

/// Starts audio capture from the default input device.
///
/// Streams fixed-size mono blocks into `sender`. Returns the live stream
/// handle (capture stops when it is dropped) and the configured sample
/// rate, which is the *nominal* rate: the analyzer's drift tracker measures
/// what actually arrives.
pub fn start_capture(sender: Sender<Vec<f32>>) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    eprintln!("[AUDIO] Using input device: {}", device.name()?);

    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, TARGET_SAMPLE_RATE)
        .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

    let sample_rate = clamp_rate(&supported_config, TARGET_SAMPLE_RATE);
    let config = supported_config.with_sample_rate(cpal::SampleRate(sample_rate));

    let channels = config.channels() as usize;
    let sample_rate_val = config.sample_rate().0;
    let config: cpal::StreamConfig = config.into();

    eprintln!(
        "[AUDIO] Selected {} Hz, {} channel(s)",
        sample_rate_val, channels
    );

    let err_fn = |err| eprintln!("[AUDIO] Stream error: {}", err);

    // Accumulates callback data until a full block is ready.
    let mut block_buffer: Vec<f32> = Vec::with_capacity(BLOCK_SIZE * 2);
    // Deinterleave scratch, reused across callbacks.
    let mut left: Vec<f32> = Vec::new();
    let mut right: Vec<f32> = Vec::new();

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            match channels {
                1 => block_buffer.extend_from_slice(data),
                2 => {
                    left.clear();
                    right.clear();
                    for pair in data.chunks_exact(2) {
                        left.push(pair[0]);
                        right.push(pair[1]);
                    }
                    block_buffer.extend_from_slice(louder_channel(&left, &right));
                }
                n => {
                    // Rare multi-channel layouts: keep the first channel.
                    block_buffer.extend(data.iter().step_by(n));
                }
            }

            while block_buffer.len() >= BLOCK_SIZE {
                let block = block_buffer[..BLOCK_SIZE].to_vec();
                // Drop the block rather than block the audio callback.
                let _ = sender.try_send(block);
                block_buffer.drain(..BLOCK_SIZE);
            }
        },
        err_fn,
        None,
    )?;

    stream.play()?;

    Ok((stream, sample_rate_val))
}

/// Finds the best supported configuration: f32 format, mono preferred over
/// stereo, closest available rate to the target.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| {
            (c.channels() == 1 || c.channels() == 2)
                && c.sample_format() == cpal::SampleFormat::F32
        })
        .min_by_key(|c| {
            let min_diff = (c.min_sample_rate().0 as i64 - target_rate as i64).abs();
            let max_diff = (c.max_sample_rate().0 as i64 - target_rate as i64).abs();
            // Rate proximity first, then prefer mono.
            (min_diff.min(max_diff), c.channels())
        })
}

/// Clamps the target rate into the range the config actually supports.
fn clamp_rate(config: &SupportedStreamConfigRange, target_rate: u32) -> u32 {
    target_rate.clamp(config.min_sample_rate().0, config.max_sample_rate().0)
}
