//! CPU-bound pixel filtering over a random RGBA image.

use anyhow::{ensure, Result};
use rand::Rng;

use super::{Details, Workload};

pub struct CpuWorkload {
    image_size: usize,
}

impl CpuWorkload {
    pub fn new(image_size: usize) -> Self {
        Self { image_size }
    }
}

type Filter = fn(&mut [u8]);

fn grayscale(image: &mut [u8]) {
    for px in image.chunks_exact_mut(4) {
        let avg = ((px[0] as u16 + px[1] as u16 + px[2] as u16) / 3) as u8;
        px[0] = avg;
        px[1] = avg;
        px[2] = avg;
    }
}

fn brighten(image: &mut [u8]) {
    for px in image.chunks_exact_mut(4) {
        for c in &mut px[..3] {
            *c = (*c as f32 * 1.2).min(255.0) as u8;
        }
    }
}

fn invert(image: &mut [u8]) {
    for px in image.chunks_exact_mut(4) {
        for c in &mut px[..3] {
            *c = 255 - *c;
        }
    }
}

const FILTERS: [Filter; 3] = [grayscale, brighten, invert];

/// Fill a `size x size` RGBA image with noise and run every filter over it.
/// Returns the mean of the red channel afterwards.
fn process(size: usize) -> f64 {
    let mut rng = rand::thread_rng();
    let mut image = vec![255u8; size * size * 4];
    for px in image.chunks_exact_mut(4) {
        rng.fill(&mut px[..3]);
    }

    for filter in FILTERS {
        filter(&mut image);
    }

    let sum: u64 = image.chunks_exact(4).map(|px| px[0] as u64).sum();
    sum as f64 / (size * size) as f64
}

#[async_trait::async_trait]
impl Workload for CpuWorkload {
    fn id(&self) -> &'static str {
        "cpu"
    }

    fn display_name(&self) -> &'static str {
        "CPU Processing"
    }

    fn description(&self) -> &'static str {
        "Grayscale, brighten and invert filters over a random RGBA image"
    }

    async fn execute(&self) -> Result<Details> {
        let size = self.image_size;
        ensure!(size > 0, "image size must be positive");

        let mean = tokio::task::spawn_blocking(move || process(size)).await?;

        Ok(Details::new("Image Processing Results")
            .line("Image Size", format!("{size}x{size}"))
            .line("Pixels Processed", size * size)
            .line("Filters Applied", FILTERS.len())
            .line("Mean Red Channel", format!("{mean:.2}")))
    }
}
