//! Frame pacing: drive a particle simulation off a 60 Hz tick and sample the achieved rate.

use std::time::{Duration, Instant};

use anyhow::{ensure, Result};
use rand::Rng;
use tokio::time::MissedTickBehavior;

use super::{Details, Workload};

const FRAME_INTERVAL: Duration = Duration::from_micros(16_667);
const WIDTH: f32 = 800.0;
const HEIGHT: f32 = 600.0;

#[derive(Debug, Clone, Copy)]
struct Particle {
    x: f32,
    y: f32,
    vx: f32,
    vy: f32,
}

impl Particle {
    fn step(&mut self) {
        self.x += self.vx;
        self.y += self.vy;
        if !(0.0..=WIDTH).contains(&self.x) {
            self.vx = -self.vx;
        }
        if !(0.0..=HEIGHT).contains(&self.y) {
            self.vy = -self.vy;
        }
    }
}

fn spawn_particles(count: usize) -> Vec<Particle> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| Particle {
            x: rng.gen_range(0.0..WIDTH),
            y: rng.gen_range(0.0..HEIGHT),
            vx: rng.gen_range(-2.0..2.0),
            vy: rng.gen_range(-2.0..2.0),
        })
        .collect()
}

#[derive(Debug, PartialEq)]
struct FrameStats {
    frames: usize,
    avg_fps: f64,
    min_fps: f64,
    max_fps: f64,
}

/// Per-frame rates from the gaps between consecutive frame timestamps (ms).
fn frame_stats(frame_gaps_ms: &[f64]) -> Option<FrameStats> {
    let rates: Vec<f64> = frame_gaps_ms
        .iter()
        .filter(|gap| **gap > 0.0)
        .map(|gap| 1000.0 / gap)
        .collect();
    if rates.is_empty() {
        return None;
    }
    Some(FrameStats {
        frames: rates.len(),
        avg_fps: rates.iter().sum::<f64>() / rates.len() as f64,
        min_fps: rates.iter().copied().fold(f64::INFINITY, f64::min),
        max_fps: rates.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    })
}

pub struct FrameWorkload {
    window: Duration,
    particles: usize,
}

impl FrameWorkload {
    pub fn new(window_ms: u64, particles: usize) -> Self {
        Self {
            window: Duration::from_millis(window_ms),
            particles,
        }
    }
}

#[async_trait::async_trait]
impl Workload for FrameWorkload {
    fn id(&self) -> &'static str {
        "frames"
    }

    fn display_name(&self) -> &'static str {
        "FPS Benchmark"
    }

    fn description(&self) -> &'static str {
        "Animate particles on a 60 Hz tick and measure the frame rate actually achieved"
    }

    async fn execute(&self) -> Result<Details> {
        ensure!(!self.window.is_zero(), "frame window must be positive");

        let mut particles = spawn_particles(self.particles);
        let mut ticker = tokio::time::interval(FRAME_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let start = Instant::now();
        let mut last = start;
        let mut gaps = Vec::new();
        while start.elapsed() < self.window {
            ticker.tick().await;
            for p in particles.iter_mut() {
                p.step();
            }
            let now = Instant::now();
            gaps.push(now.duration_since(last).as_secs_f64() * 1000.0);
            last = now;
        }

        // The first tick fires immediately and measures nothing.
        let stats = frame_stats(gaps.get(1..).unwrap_or_default())
            .ok_or_else(|| anyhow::anyhow!("no frames were rendered in {:?}", self.window))?;

        Ok(Details::new("FPS Benchmark Results")
            .line("Particles Animated", particles.len())
            .line("Frames Recorded", stats.frames)
            .line("Average FPS", format!("{:.2}", stats.avg_fps))
            .line("Min FPS", format!("{:.2}", stats.min_fps))
            .line("Max FPS", format!("{:.2}", stats.max_fps)))
    }
}
