//! Producer/consumer handoff of file jobs through a lock-free queue.
//!
//! A loader thread queues the next files of a playlist; the playback thread
//! pops them without blocking and parks on a [`Lock`] with a timeout only
//! when nothing is pending.
//!
//! Run with: cargo run -p plank-core --example file_handoff --features tracing

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use plank_core::{BoxedQueue, CasBackend, Lock, SharedPtr};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct FileJob {
    path: PathBuf,
    frames: usize,
}

fn main() -> plank_core::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "debug".into()))
        .init();

    tracing::info!(backend = CasBackend::current().name(), "starting file handoff");

    let pending = Arc::new(BoxedQueue::<FileJob>::new());
    let wake = Arc::new(Lock::new());
    let done = Arc::new(AtomicBool::new(false));
    let mix_bus = SharedPtr::new(vec![0.0f32; 256])?;

    let loader = {
        let pending = Arc::clone(&pending);
        let wake = Arc::clone(&wake);
        let done = Arc::clone(&done);
        thread::spawn(move || -> plank_core::Result<()> {
            for take in 1..=5 {
                let job = FileJob {
                    path: PathBuf::from(format!("takes/take{take}.wav")),
                    frames: take * 48_000,
                };
                tracing::debug!(path = %job.path.display(), "queued");
                pending.push(job)?;
                wake.signal();
                thread::sleep(Duration::from_millis(20));
            }
            done.store(true, Ordering::Release);
            wake.signal();
            Ok(())
        })
    };

    let player = {
        let pending = Arc::clone(&pending);
        let wake = Arc::clone(&wake);
        let done = Arc::clone(&done);
        let bus = mix_bus.clone();
        thread::spawn(move || {
            let mut played = 0usize;
            loop {
                if let Some(job) = pending.pop() {
                    tracing::info!(
                        path = %job.path.display(),
                        frames = job.frames,
                        bus_len = bus.len(),
                        "playing"
                    );
                    played += 1;
                    continue;
                }
                if done.load(Ordering::Acquire) && pending.is_empty() {
                    break;
                }
                if !wake.wait_timeout(Duration::from_millis(100)) {
                    tracing::debug!("no pending file");
                }
            }
            played
        })
    };

    loader.join().expect("loader thread panicked")?;
    let played = player.join().expect("player thread panicked");

    tracing::info!(
        played,
        bus_refs = SharedPtr::live_count(&mix_bus),
        "handoff finished"
    );
    Ok(())
}
