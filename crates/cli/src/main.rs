use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::Parser;

use faceoverlay_core::camera::camera_source::CameraSource;
use faceoverlay_core::camera::domain::frame_sink::FrameSink;
use faceoverlay_core::camera::domain::frame_source::FrameSource;
use faceoverlay_core::camera::infrastructure::ffmpeg_frame_source::FfmpegFrameSource;
use faceoverlay_core::camera::infrastructure::image_directory_source::{
    is_image_path, ImageDirectorySource,
};
use faceoverlay_core::detection::domain::detector_options::{
    DetectorKind, DetectorOptions, PerformanceMode,
};
use faceoverlay_core::detection::domain::face_detector::FaceDetector;
use faceoverlay_core::detection::infrastructure::detector_factory::{
    create_detector, DetectorBackend,
};
use faceoverlay_core::detection::infrastructure::model_resolver::{self, ModelSource};
use faceoverlay_core::overlay::domain::graphic_overlay::GraphicOverlay;
use faceoverlay_core::overlay::infrastructure::bitmap_loader::load_overlay_bitmap;
use faceoverlay_core::overlay::infrastructure::image_canvas::load_font;
use faceoverlay_core::overlay::infrastructure::png_surface::PngSurface;
use faceoverlay_core::overlay::infrastructure::recording_canvas::RecordingCanvas;
use faceoverlay_core::pipeline::frame_processor::FrameProcessor;
use faceoverlay_core::pipeline::pipeline_logger::LogPipelineLogger;
use faceoverlay_core::pipeline::presenter::{
    DetectionPresenter, FaceContourPresenter, FaceDetectionPresenter,
};
use faceoverlay_core::settings::Settings;
use faceoverlay_core::shared::constants::{BLAZEFACE_MODEL_NAME, DEFAULT_SOURCE_FPS};
use faceoverlay_core::shared::frame_metadata::CameraFacing;

/// Live face detection overlay for videos, capture devices and images.
///
/// Options left unset fall back to the saved settings file.
#[derive(Parser)]
#[command(name = "faceoverlay")]
struct Cli {
    /// Input video, capture device URL, image, or directory of images.
    input: PathBuf,

    /// Input used when the front camera is selected (defaults to INPUT).
    #[arg(long)]
    front_input: Option<PathBuf>,

    /// Directory that receives one overlay PNG per detection.
    #[arg(long, default_value = "overlay")]
    output: PathBuf,

    /// Camera facing: back or front.
    #[arg(long)]
    facing: Option<CameraFacing>,

    /// Overlay style: landmarks or contours.
    #[arg(long)]
    detector: Option<DetectorKind>,

    /// Use the accurate performance mode.
    #[arg(long)]
    accurate: bool,

    /// Path to the BlazeFace ONNX model.
    #[arg(long)]
    model: Option<PathBuf>,

    /// URL to download the model from when it is not cached.
    #[arg(long)]
    model_url: Option<String>,

    /// Replay recorded detections from a JSON file instead of running a model.
    #[arg(long)]
    detections: Option<PathBuf>,

    /// Restart replayed detections when they run out.
    #[arg(long = "loop")]
    looping: bool,

    /// Assign tracking ids to faces.
    #[arg(long)]
    tracking: Option<bool>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long)]
    confidence: Option<f32>,

    /// Smallest face to report, as a fraction of the image width (0.0-1.0).
    #[arg(long)]
    min_face_size: Option<f32>,

    /// Bitmap drawn over the nose base of each face.
    #[arg(long)]
    overlay_bitmap: Option<PathBuf>,

    /// TrueType/OpenType font for overlay text. Text is skipped without one.
    #[arg(long)]
    font: Option<PathBuf>,

    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<usize>,

    /// Deliver frames at the source frame rate instead of as fast as possible.
    #[arg(long)]
    realtime: Option<bool>,

    /// Render only the graphics, without the camera image underneath.
    #[arg(long)]
    no_camera_image: bool,

    /// Write the final overlay's draw operations as JSON.
    #[arg(long)]
    dump_json: Option<PathBuf>,

    /// Persist the effective options as the new defaults.
    #[arg(long)]
    save_settings: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;
    let settings = merge_settings(&cli, Settings::load());
    settings.validate()?;

    if cli.save_settings {
        let path = settings.save()?;
        log::info!("Settings saved to {}", path.display());
    }

    let overlay = Arc::new(GraphicOverlay::new());
    let processor = Arc::new(build_processor(&cli, &settings, Arc::clone(&overlay))?);
    let font = match &settings.font {
        Some(path) => Some(Arc::new(load_font(path)?)),
        None => None,
    };
    let surface = PngSurface::new(&cli.output, font)?;

    if cli.input.is_file() && is_image_path(&cli.input) {
        run_single_image(&cli, &settings, &processor, &overlay, &surface)?;
    } else {
        run_stream(&cli, &settings, &processor, &overlay, surface)?;
    }

    if let Some(path) = &cli.dump_json {
        dump_overlay(&overlay, path)?;
    }
    Ok(())
}

fn run_single_image(
    cli: &Cli,
    settings: &Settings,
    processor: &FrameProcessor,
    overlay: &GraphicOverlay,
    surface: &PngSurface,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut source = ImageDirectorySource::new(cli.input.clone());
    let info = source.open(settings.facing)?;
    overlay.set_camera_info(info.width, info.height, info.facing);
    let frame = source
        .next_frame()?
        .ok_or_else(|| format!("Cannot read image {}", cli.input.display()))?;
    source.close();

    let faces = processor.process_image(&frame)?;
    processor.stop();
    let path = surface.render(overlay, overlay.generation())?;
    log::info!("Found {faces} faces; overlay written to {}", path.display());
    Ok(())
}

fn run_stream(
    cli: &Cli,
    settings: &Settings,
    processor: &Arc<FrameProcessor>,
    overlay: &Arc<GraphicOverlay>,
    surface: PngSurface,
) -> Result<(), Box<dyn std::error::Error>> {
    let output_dir = surface.output_dir().to_path_buf();
    let renderer = surface.spawn(Arc::clone(overlay), overlay.subscribe());

    let sink: Arc<dyn FrameSink> = Arc::clone(processor) as Arc<dyn FrameSink>;
    let mut camera = CameraSource::new(open_source(cli), Arc::clone(overlay));
    camera.set_frame_processor(sink);
    camera.set_realtime(settings.realtime);
    camera.set_max_frames(cli.max_frames);
    camera.set_facing(settings.facing)?;
    camera.start()?;

    let summary = camera.wait();
    processor.stop();
    overlay.unsubscribe();
    camera.release();

    let written = renderer
        .join()
        .map_err(|_| "Overlay renderer thread panicked")??;
    let stats = processor.stats();
    log::info!(
        "Wrote {written} overlay images to {} ({} frames captured, {} dropped)",
        output_dir.display(),
        stats.submitted,
        stats.dropped
    );

    match summary.and_then(|s| s.error) {
        Some(error) => Err(format!("Capture stopped early: {error}").into()),
        None => Ok(()),
    }
}

fn open_source(cli: &Cli) -> Box<dyn FrameSource> {
    if cli.input.is_dir() {
        Box::new(ImageDirectorySource::new(cli.input.clone()).with_fps(Some(DEFAULT_SOURCE_FPS)))
    } else {
        Box::new(
            FfmpegFrameSource::new(cli.input.clone()).with_front_input(cli.front_input.clone()),
        )
    }
}

fn build_processor(
    cli: &Cli,
    settings: &Settings,
    overlay: Arc<GraphicOverlay>,
) -> Result<FrameProcessor, Box<dyn std::error::Error>> {
    let detector = build_detector(cli, settings)?;
    let presenter: Box<dyn DetectionPresenter> = match settings.detector {
        DetectorKind::Landmarks => {
            let bitmap = match &settings.overlay_bitmap {
                Some(path) => Some(Arc::new(load_overlay_bitmap(path)?)),
                None => None,
            };
            Box::new(FaceDetectionPresenter::new(bitmap))
        }
        DetectorKind::Contours => Box::new(FaceContourPresenter),
    };

    Ok(FrameProcessor::new(detector, presenter, overlay)
        .with_logger(Box::new(LogPipelineLogger::default()))
        .with_camera_image(!cli.no_camera_image))
}

fn build_detector(
    cli: &Cli,
    settings: &Settings,
) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    let options = detector_options(settings);
    let backend = match &cli.detections {
        Some(path) => DetectorBackend::Replay {
            path: path.clone(),
            looping: cli.looping,
        },
        None => {
            log::info!("Resolving model: {BLAZEFACE_MODEL_NAME}");
            let bundled = bundled_model_dir();
            let model_path = model_resolver::resolve(
                BLAZEFACE_MODEL_NAME,
                ModelSource {
                    explicit: cli.model.as_deref(),
                    bundled_dir: bundled.as_deref(),
                    url: settings.model_url.as_deref(),
                },
                Some(Box::new(download_progress)),
            )?;
            DetectorBackend::Onnx { model_path }
        }
    };
    create_detector(&backend, options)
}

fn detector_options(settings: &Settings) -> DetectorOptions {
    let base = settings.detector.default_options();
    DetectorOptions::builder()
        .performance_mode(settings.performance_mode)
        .landmarks(base.landmarks)
        .classifications(base.classifications)
        .contours(base.contours)
        .min_face_size(settings.min_face_size)
        .tracking(settings.tracking)
        .confidence(settings.confidence)
        .build()
}

fn merge_settings(cli: &Cli, mut settings: Settings) -> Settings {
    if let Some(facing) = cli.facing {
        settings.facing = facing;
    }
    if let Some(kind) = cli.detector {
        settings.detector = kind;
    }
    if cli.accurate {
        settings.performance_mode = PerformanceMode::Accurate;
    }
    if let Some(tracking) = cli.tracking {
        settings.tracking = tracking;
    }
    if let Some(confidence) = cli.confidence {
        settings.confidence = confidence;
    }
    if let Some(size) = cli.min_face_size {
        settings.min_face_size = size;
    }
    if let Some(realtime) = cli.realtime {
        settings.realtime = realtime;
    }
    if cli.overlay_bitmap.is_some() {
        settings.overlay_bitmap = cli.overlay_bitmap.clone();
    }
    if cli.font.is_some() {
        settings.font = cli.font.clone();
    }
    if cli.model_url.is_some() {
        settings.model_url = cli.model_url.clone();
    }
    settings
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.input.exists() && !is_device_url(&cli.input) {
        return Err(format!("Input not found: {}", cli.input.display()).into());
    }
    if let Some(front) = &cli.front_input {
        if !front.exists() && !is_device_url(front) {
            return Err(format!("Front input not found: {}", front.display()).into());
        }
    }
    if cli.max_frames == Some(0) {
        return Err("Max frames must be at least 1".into());
    }
    if cli.looping && cli.detections.is_none() {
        return Err("--loop requires --detections".into());
    }
    if cli.detections.is_some() && cli.model.is_some() {
        return Err("--detections and --model are mutually exclusive".into());
    }
    if cli.output.is_file() {
        return Err(format!("Output must be a directory: {}", cli.output.display()).into());
    }
    Ok(())
}

/// ffmpeg accepts URLs such as `rtsp://...` and device names that are not
/// files on disk.
fn is_device_url(path: &Path) -> bool {
    path.to_str().is_some_and(|s| s.contains("://"))
}

fn bundled_model_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("models")))
}

fn dump_overlay(overlay: &GraphicOverlay, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let (width, height) = overlay.view_size();
    let mut canvas = RecordingCanvas::new(width, height);
    overlay.draw(&mut canvas);
    std::fs::write(path, canvas.to_json()?)?;
    log::info!("Draw operations written to {}", path.display());
    Ok(())
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face detection model... {pct}%");
    } else {
        eprint!("\rDownloading face detection model... {downloaded} bytes");
    }
}
