//! # Clearpitch - Terminal Tuner Frontend
//!
//! Thin display collaborator for the core pipeline.
//!
//! ## Architecture
//! - **Audio Thread**: owns the capture stream and the `Analyzer`; pushes
//!   blocks, polls for hops, and sends one `PitchEstimate` per hop.
//! - **Main Thread**: owns the `NoteStabilizer`; turns estimates into
//!   `TunerEvent`s and renders them.
//! - **Communication**: crossbeam channels, one direction each.

use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use cpal::traits::StreamTrait;
use crossbeam_channel::{Receiver, Sender};

use clearpitch_core::analyzer::Analyzer;
use clearpitch_core::audio;
use clearpitch_core::config::TunerConfig;
use clearpitch_core::stabilizer::NoteStabilizer;
use clearpitch_core::{PitchEstimate, TunerEvent};

/// Handle to the audio worker thread for graceful shutdown.
struct AudioWorker {
    shutdown_tx: Sender<()>,
    thread_handle: Option<JoinHandle<()>>,
}

fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => {
            eprintln!("[MAIN] Loading config from {}", path);
            load_config(&path)?
        }
        None => TunerConfig::default(),
    };
    config.validate()?;

    let (estimate_tx, estimate_rx) = crossbeam_channel::unbounded::<PitchEstimate>();
    let (ready_tx, ready_rx) = crossbeam_channel::bounded::<(u32, usize)>(1);
    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);

    eprintln!("[MAIN] Starting audio worker...");
    let worker_config = config.clone();
    let thread_handle = thread::spawn(move || {
        audio_worker(worker_config, estimate_tx, ready_tx, shutdown_rx);
    });
    let mut worker = AudioWorker {
        shutdown_tx,
        thread_handle: Some(thread_handle),
    };

    let (sample_rate, ring_capacity) = ready_rx
        .recv()
        .context("audio worker exited before becoming ready")?;
    render(&TunerEvent::Ready {
        sample_rate,
        buffer_capacity: ring_capacity,
    });

    // Quit on Enter; the reading stream itself never ends on its own.
    let quit_rx = spawn_stdin_watcher();
    eprintln!("[MAIN] Listening. Press Enter to quit.");

    let mut stabilizer = NoteStabilizer::new(&config);
    loop {
        crossbeam_channel::select! {
            recv(estimate_rx) -> msg => match msg {
                Ok(estimate) => render(&stabilizer.process(estimate)),
                Err(_) => {
                    eprintln!("[MAIN] Audio worker stopped; exiting.");
                    break;
                }
            },
            recv(quit_rx) -> _ => {
                eprintln!("[MAIN] Quit requested.");
                break;
            }
        }
    }

    let _ = worker.shutdown_tx.send(());
    if let Some(handle) = worker.thread_handle.take() {
        let _ = handle.join();
    }
    eprintln!("[MAIN] Done.");
    Ok(())
}

/// The audio worker: capture stream in, pitch estimates out.
///
/// Owns the ring buffer, drift tracker, gate, and detector exclusively; the
/// only thing that crosses back to the main thread is the estimate channel.
fn audio_worker(
    config: TunerConfig,
    estimate_tx: Sender<PitchEstimate>,
    ready_tx: Sender<(u32, usize)>,
    shutdown_rx: Receiver<()>,
) {
    let (block_tx, block_rx) = crossbeam_channel::unbounded::<Vec<f32>>();

    let (stream, sample_rate) = match audio::start_capture(block_tx) {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("[AUDIO-THREAD] Fatal error starting capture: {}", e);
            return;
        }
    };

    let mut analyzer = match Analyzer::new(&config, sample_rate) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("[AUDIO-THREAD] Invalid configuration: {}", e);
            return;
        }
    };
    let _ = ready_tx.send((sample_rate, analyzer.ring_capacity()));

    loop {
        crossbeam_channel::select! {
            recv(block_rx) -> msg => match msg {
                Ok(block) => {
                    analyzer.push_block(&block);
                    if let Some(estimate) = analyzer.poll() {
                        if estimate_tx.send(estimate).is_err() {
                            break;
                        }
                    }
                }
                Err(_) => {
                    eprintln!("[AUDIO-THREAD] Capture channel closed");
                    break;
                }
            },
            recv(shutdown_rx) -> _ => {
                eprintln!("[AUDIO-THREAD] Shutdown signal received");
                break;
            }
        }
    }

    if let Err(e) = stream.pause() {
        eprintln!("[AUDIO-THREAD] Error pausing stream: {}", e);
    }
    drop(stream);
    eprintln!("[AUDIO-THREAD] Finished");
}

/// Renders one event as a single terminal line.
fn render(event: &TunerEvent) {
    match event {
        TunerEvent::Ready {
            sample_rate,
            buffer_capacity,
        } => {
            eprintln!(
                "[MAIN] Ready: {} Hz nominal, ring of {} samples",
                sample_rate, buffer_capacity
            );
        }
        TunerEvent::Reading {
            note_name,
            cents_offset,
        } => {
            println!("{:>4}  {:+6.1} cents", note_name, cents_offset);
        }
        TunerEvent::Silence { rms, confidence } => {
            println!("  --  (rms={:.4} conf={:.2})", rms, confidence);
        }
    }
}

/// Sends one message when the user presses Enter.
fn spawn_stdin_watcher() -> Receiver<()> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    thread::spawn(move || {
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
        let _ = tx.send(());
    });
    rx
}

/// Loads a pipeline configuration from a JSON file.
///
/// Missing fields fall back to the defaults, so a config file only needs
/// to name the values it overrides.
fn load_config(path: &str) -> Result<TunerConfig> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path))?;
    let config: TunerConfig =
        serde_json::from_str(&data).with_context(|| format!("invalid config in {}", path))?;
    Ok(config)
}
