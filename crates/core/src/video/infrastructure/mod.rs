pub mod ffmpeg_capture;
pub mod headless_display;
pub mod snapshot_display;
