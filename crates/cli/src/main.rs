use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;

use faceage_core::annotation::domain::frame_annotator::FrameAnnotator;
use faceage_core::annotation::infrastructure::imageproc_annotator::{
    ImageprocAnnotator, DEFAULT_FONT_SIZE,
};
use faceage_core::cropping::domain::region_extractor::RegionExtractor;
use faceage_core::detection::infrastructure::rustface_detector::{
    DetectorSettings, RustfaceDetector,
};
use faceage_core::estimation::infrastructure::onnx_age_gender_predictor::{
    ChannelOrder, OnnxAgeGenderPredictor,
};
use faceage_core::persistence::infrastructure::csv_label_log::CsvLabelLog;
use faceage_core::pipeline::estimate_frame_use_case::EstimateFrameUseCase;
use faceage_core::pipeline::live_estimation_use_case::{LiveEstimationUseCase, LoopSettings};
use faceage_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use faceage_core::shared::constants::{
    DEFAULT_CSV_PATH, DEFAULT_MIN_FACE_SIZE, DEFAULT_PYRAMID_SCALE, DEFAULT_SCORE_THRESHOLD,
    DEFAULT_WINDOW_STEP, IMAGE_EXTENSIONS,
};
use faceage_core::video::domain::frame_display::FrameDisplay;
use faceage_core::video::infrastructure::ffmpeg_capture::{
    is_stream_url, CaptureSettings, FfmpegCapture,
};
use faceage_core::video::infrastructure::headless_display::HeadlessDisplay;
use faceage_core::video::infrastructure::snapshot_display::{is_image_path, SnapshotDisplay};

/// How long a stop request may take before the process is killed.
const STOP_GRACE_PERIOD: Duration = Duration::from_secs(10);
const PROGRESS_EVERY_FRAMES: usize = 100;

/// Live age and gender estimation on a video file or stream.
#[derive(Parser)]
#[command(name = "faceage")]
struct Cli {
    /// Video file or stream URL (rtsp://, http://, ...).
    input: String,

    /// SeetaFace detection model file.
    #[arg(long)]
    detector_model: PathBuf,

    /// Age/gender ONNX model file.
    #[arg(long)]
    predictor_model: PathBuf,

    /// CSV file that receives one `age,gender` row per labeled face.
    #[arg(long, default_value = DEFAULT_CSV_PATH)]
    csv: PathBuf,

    /// Keep an image file updated with the latest annotated frame.
    #[arg(long)]
    display: Option<PathBuf>,

    /// Write the display image every Nth frame.
    #[arg(long, default_value = "1")]
    display_every: usize,

    /// TrueType font for label text (default: bundled DejaVu Sans Mono).
    #[arg(long)]
    font: Option<PathBuf>,

    /// Label text height in pixels.
    #[arg(long, default_value_t = DEFAULT_FONT_SIZE)]
    font_size: f32,

    /// Smallest face to detect, in pixels.
    #[arg(long, default_value_t = DEFAULT_MIN_FACE_SIZE)]
    min_face_size: u32,

    /// Detector score threshold; higher means fewer, surer faces.
    #[arg(long, default_value_t = DEFAULT_SCORE_THRESHOLD)]
    score_threshold: f64,

    /// Scale ratio between image pyramid levels (0.01-0.99).
    #[arg(long, default_value_t = DEFAULT_PYRAMID_SCALE)]
    pyramid_scale: f32,

    /// Detector sliding window step, in pixels.
    #[arg(long, default_value_t = DEFAULT_WINDOW_STEP)]
    window_step: u32,

    /// Channel order the age/gender model was trained with: rgb or bgr.
    #[arg(long, default_value = "bgr")]
    channel_order: String,

    /// Wait before retrying an unavailable or failing source.
    #[arg(long, default_value = "5000")]
    retry_backoff_ms: u64,

    /// Upper bound on a single blocking read from the source.
    #[arg(long, default_value = "5000")]
    read_timeout_ms: u64,

    /// Stop after this many frames (0 = run until the source ends).
    #[arg(long, default_value = "0")]
    max_frames: usize,
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

    let stop = Arc::new(AtomicBool::new(false));
    install_stop_handler(Arc::clone(&stop))?;

    let estimator = build_estimator(&cli)?;
    let display = build_display(&cli, Arc::clone(&stop))?;
    let source = FfmpegCapture::new(
        cli.input.clone(),
        CaptureSettings {
            read_timeout: Duration::from_millis(cli.read_timeout_ms),
        },
    );
    let settings = LoopSettings {
        retry_backoff: Duration::from_millis(cli.retry_backoff_ms),
        max_frames: (cli.max_frames > 0).then_some(cli.max_frames),
    };

    log::info!("Estimating ages and genders on {}", cli.input);
    let mut use_case =
        LiveEstimationUseCase::new(Box::new(source), display, estimator, settings);
    let mut logger = StdoutPipelineLogger::new(PROGRESS_EVERY_FRAMES);
    let report = use_case.run(&mut logger);

    log::info!(
        "{} faces from {} frames written to {}",
        report.faces,
        report.frames,
        cli.csv.display()
    );
    Ok(())
}

fn build_estimator(cli: &Cli) -> Result<EstimateFrameUseCase, Box<dyn std::error::Error>> {
    let settings = DetectorSettings {
        min_face_size: cli.min_face_size,
        score_threshold: cli.score_threshold,
        pyramid_scale: cli.pyramid_scale,
        window_step: cli.window_step,
    };
    let detector = RustfaceDetector::new(&cli.detector_model, &settings)?;

    let channel_order: ChannelOrder = cli.channel_order.parse()?;
    let predictor = OnnxAgeGenderPredictor::new(&cli.predictor_model, channel_order)?;

    let annotator: Box<dyn FrameAnnotator> = match &cli.font {
        Some(font) => Box::new(ImageprocAnnotator::from_font_file(font, cli.font_size)?),
        None => Box::new(ImageprocAnnotator::with_default_font(cli.font_size)?),
    };

    Ok(EstimateFrameUseCase::new(
        Box::new(detector),
        Box::new(predictor),
        RegionExtractor::default(),
        annotator,
        Box::new(CsvLabelLog::new(cli.csv.clone())),
    ))
}

fn build_display(
    cli: &Cli,
    stop: Arc<AtomicBool>,
) -> Result<Box<dyn FrameDisplay>, Box<dyn std::error::Error>> {
    match &cli.display {
        Some(path) => {
            log::info!("Writing annotated frames to {}", path.display());
            Ok(Box::new(SnapshotDisplay::new(
                path.clone(),
                cli.display_every,
                stop,
            )?))
        }
        None => Ok(Box::new(HeadlessDisplay::new(stop))),
    }
}

/// First Ctrl-C asks the loop to stop and arms a watchdog; a second one, or
/// the watchdog firing, exits immediately.
fn install_stop_handler(stop: Arc<AtomicBool>) -> Result<(), Box<dyn std::error::Error>> {
    ctrlc::set_handler(move || {
        if stop.swap(true, Ordering::SeqCst) {
            log::warn!("Second interrupt, exiting now");
            process::exit(130);
        }
        log::info!("Interrupt received, finishing the current frame...");
        thread::spawn(|| {
            thread::sleep(STOP_GRACE_PERIOD);
            log::warn!("Loop did not stop within {STOP_GRACE_PERIOD:?}, forcing exit");
            process::exit(130);
        });
    })?;
    Ok(())
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !is_stream_url(&cli.input) && !Path::new(&cli.input).exists() {
        return Err(format!("Input not found: {}", cli.input).into());
    }
    if !cli.detector_model.exists() {
        return Err(format!(
            "Detector model not found: {}",
            cli.detector_model.display()
        )
        .into());
    }
    if !cli.predictor_model.exists() {
        return Err(format!(
            "Predictor model not found: {}",
            cli.predictor_model.display()
        )
        .into());
    }
    if let Some(display) = &cli.display {
        if !is_image_path(display) {
            return Err(format!(
                "Display path must be an image file ({}), got {}",
                IMAGE_EXTENSIONS.join(", "),
                display.display()
            )
            .into());
        }
    }
    if cli.display_every == 0 {
        return Err("Display interval must be at least 1".into());
    }
    if !cli.font_size.is_finite() || cli.font_size <= 0.0 {
        return Err(format!("Font size must be positive, got {}", cli.font_size).into());
    }
    cli.channel_order.parse::<ChannelOrder>()?;
    DetectorSettings {
        min_face_size: cli.min_face_size,
        score_threshold: cli.score_threshold,
        pyramid_scale: cli.pyramid_scale,
        window_step: cli.window_step,
    }
    .validate()?;
    if cli.read_timeout_ms == 0 {
        return Err("Read timeout must be positive".into());
    }
    Ok(())
}

