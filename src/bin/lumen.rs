use std::time::Instant;

use clap::Parser;
use log::{error, info};
use rand::rngs::StdRng;
use rand::SeedableRng;

use lumen::{App, CameraSettings, DisplaySink, Scene};

/// Progressive path tracer, rendered headless for a fixed number of frames.
#[derive(Parser, Debug)]
#[command(name = "lumen", version)]
struct Args {
    #[arg(long, default_value_t = 800)]
    width: u32,

    #[arg(long, default_value_t = 600)]
    height: u32,

    /// Number of frames to accumulate.
    #[arg(long, default_value_t = 100)]
    frames: u32,

    #[arg(long)]
    single_thread: bool,

    #[arg(long)]
    no_accumulate: bool,

    #[arg(long)]
    no_skylight: bool,

    #[arg(long)]
    no_gamma: bool,

    /// Extra small spheres scattered over the ground.
    #[arg(long, default_value_t = 0)]
    random_spheres: u32,

    #[arg(long, default_value_t = 0)]
    seed: u64,
}

/// Keeps the average brightness of the last presented frame.
#[derive(Default)]
struct Brightness {
    mean: f32,
}

impl DisplaySink for Brightness {
    fn present(&mut self, _width: u32, _height: u32, pixels: &[u32]) {
        let total: u64 = pixels
            .iter()
            .map(|p| ((p & 0xFF) + ((p >> 8) & 0xFF) + ((p >> 16) & 0xFF)) as u64)
            .sum();
        self.mean = total as f32 / (pixels.len() as f32 * 3.0 * 255.0);
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let mut scene = Scene::demo();
    if args.random_spheres > 0 {
        let mut rng = StdRng::seed_from_u64(args.seed);
        scene.scatter_random_spheres(&mut rng, args.random_spheres);
    }

    let mut app = match App::new(scene, CameraSettings::default(), args.width, args.height) {
        Ok(app) => app,
        Err(err) => {
            error!("{err}");
            std::process::exit(1);
        }
    };
    app.renderer.settings.multithreaded = !args.single_thread;
    app.renderer.settings.accumulate = !args.no_accumulate;
    app.renderer.settings.skylight = !args.no_skylight;
    app.renderer.settings.gamma_correct = !args.no_gamma;

    info!(
        "Rendering {} frames at {}x{} ({} spheres)",
        args.frames,
        args.width,
        args.height,
        app.scene.spheres().len()
    );

    let mut sink = Brightness::default();
    let started = Instant::now();
    let mut last_frame = Instant::now();

    for _ in 0..args.frames {
        let delta_time = last_frame.elapsed().as_secs_f32();
        last_frame = Instant::now();
        app.update(delta_time);

        if let Err(err) = app.render_to(&mut sink) {
            error!("{err}");
            std::process::exit(1);
        }

        // 50 프레임마다 FPS 계산
        if app.frame_count() % 50 == 1 {
            let frame_time = last_frame.elapsed().as_secs_f32();
            info!(
                "Frame {}: {:.2}ms ({} fps), mean brightness {:.4}",
                app.frame_count(),
                frame_time * 1000.0,
                (1.0 / frame_time.max(f32::EPSILON)) as u32,
                sink.mean
            );
        }
    }

    info!(
        "Finished {} frames in {:.2}s, frame index {}, mean brightness {:.4}",
        app.frame_count(),
        started.elapsed().as_secs_f32(),
        app.renderer.frame_index(),
        sink.mean
    );
}
