use std::time::Duration;

use crate::shared::constants::DEFAULT_READ_TIMEOUT;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::frame_source::{CaptureError, FrameSource};

/// Failed reads in a row after which a local file is treated as finished.
const MAX_CONSECUTIVE_FILE_FAILURES: usize = 3;

/// Network sources (`rtsp://`, `http://`, ...) as opposed to local files.
pub fn is_stream_url(source: &str) -> bool {
    source.contains("://")
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureSettings {
    /// Upper bound on one blocking network read (ffmpeg `rw_timeout`).
    pub read_timeout: Duration,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// Decodes a file or stream URL via ffmpeg-next into RGB24 frames.
///
/// The input is opened lazily on the first `read` and again after any
/// failed read, so a dropped stream recovers on its own once the caller
/// retries. A reopened local file resumes after the last delivered frame,
/// and keeps failing only up to a fixed number of times in a row.
pub struct FfmpegCapture {
    source: String,
    settings: CaptureSettings,
    stream: Option<OpenStream>,
    metadata: Option<VideoMetadata>,
    next_index: usize,
    consecutive_failures: usize,
}

struct OpenStream {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
    width: u32,
    height: u32,
    flushing: bool,
}

impl FfmpegCapture {
    pub fn new(source: impl Into<String>, settings: CaptureSettings) -> Self {
        Self {
            source: source.into(),
            settings,
            stream: None,
            metadata: None,
            next_index: 0,
            consecutive_failures: 0,
        }
    }

    /// Metadata of the most recently opened stream.
    #[cfg(test)]
    pub(crate) fn metadata(&self) -> Option<&VideoMetadata> {
        self.metadata.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn is_local_file(&self) -> bool {
        !is_stream_url(&self.source)
    }

    /// Drops the broken stream and classifies the failure.
    fn read_failed(&mut self, reason: String) -> CaptureError {
        self.stream = None;
        self.consecutive_failures += 1;
        if self.is_local_file() && self.consecutive_failures >= MAX_CONSECUTIVE_FILE_FAILURES {
            log::warn!(
                "{} failed {} reads in a row, giving up: {reason}",
                self.source,
                self.consecutive_failures
            );
            return CaptureError::Exhausted;
        }
        CaptureError::ReadFailed(reason)
    }

    /// Opens the input; a local file is fast-forwarded past frames already
    /// delivered. Returns `false` if the file ends before that point.
    fn reopen(&mut self) -> Result<bool, Box<dyn std::error::Error>> {
        self.open()?;
        if !self.is_local_file() || self.next_index == 0 {
            return Ok(true);
        }
        let Some(stream) = self.stream.as_mut() else {
            return Ok(false);
        };
        log::debug!("Skipping {} already delivered frames", self.next_index);
        stream.skip(self.next_index)
    }

    fn open(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let mut options = ffmpeg_next::Dictionary::new();
        options.set(
            "rw_timeout",
            &self.settings.read_timeout.as_micros().to_string(),
        );
        let ictx = ffmpeg_next::format::input_with_dictionary(&self.source, options)?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;
        let stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };

        let width = decoder.width();
        let height = decoder.height();
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        let metadata = VideoMetadata {
            width,
            height,
            fps,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            source: self.source.clone(),
        };
        log::info!("Capture opened: {metadata}");

        self.metadata = Some(metadata);
        self.stream = Some(OpenStream {
            ictx,
            decoder,
            scaler,
            stream_index,
            width,
            height,
            flushing: false,
        });
        Ok(())
    }
}

impl FrameSource for FfmpegCapture {
    fn read(&mut self) -> Result<Frame, CaptureError> {
        if self.stream.is_none() {
            match self.reopen() {
                Ok(true) => {}
                Ok(false) => {
                    self.stream = None;
                    return Err(CaptureError::Exhausted);
                }
                Err(e) if self.stream.is_some() => return Err(self.read_failed(e.to_string())),
                Err(e) => {
                    return Err(CaptureError::Unavailable(format!("{}: {e}", self.source)));
                }
            }
        }
        let Some(stream) = self.stream.as_mut() else {
            return Err(CaptureError::Unavailable(self.source.clone()));
        };

        match stream.next_frame(self.next_index) {
            Ok(Some(frame)) => {
                self.next_index += 1;
                self.consecutive_failures = 0;
                Ok(frame)
            }
            Ok(None) => {
                let source = self
                    .metadata
                    .as_ref()
                    .map_or(self.source.as_str(), |m| m.source.as_str());
                log::info!(
                    "Capture reached end of {source} after {} frames",
                    self.next_index
                );
                self.stream = None;
                Err(CaptureError::Exhausted)
            }
            Err(e) => Err(self.read_failed(e.to_string())),
        }
    }

    fn release(&mut self) {
        if self.stream.take().is_some() {
            log::debug!("Capture released: {}", self.source);
        }
    }
}

impl OpenStream {
    /// Decodes and discards `count` frames. `false` if the stream ends first.
    fn skip(&mut self, count: usize) -> Result<bool, Box<dyn std::error::Error>> {
        for index in 0..count {
            if self.next_frame(index)?.is_none() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Next decoded frame, `None` at end of stream.
    fn next_frame(&mut self, index: usize) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        loop {
            if let Some(frame) = self.try_receive(index)? {
                return Ok(Some(frame));
            }
            if self.flushing {
                return Ok(None);
            }

            let mut packet = ffmpeg_next::Packet::empty();
            match packet.read(&mut self.ictx) {
                Ok(()) => {}
                Err(ffmpeg_next::Error::Eof) => {
                    // Drain frames still buffered in the decoder.
                    if let Err(e) = self.decoder.send_eof() {
                        log::debug!("Decoder flush failed: {e}");
                    }
                    self.flushing = true;
                    continue;
                }
                Err(e) => return Err(Box::new(e)),
            }

            if packet.stream() != self.stream_index {
                continue;
            }
            if let Err(e) = self.decoder.send_packet(&packet) {
                log::debug!("Dropping undecodable packet: {e}");
            }
        }
    }

    fn try_receive(&mut self, index: usize) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }
        let mut rgb = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler.run(&decoded, &mut rgb)?;
        let pixels = packed_rgb(&rgb, self.width, self.height);
        Ok(Some(Frame::new(pixels, self.width, self.height, 3, index)))
    }
}

/// Copies an RGB24 frame into a tightly packed buffer, dropping row padding.
fn packed_rgb(rgb: &ffmpeg_next::util::frame::video::Video, width: u32, height: u32) -> Vec<u8> {
    let stride = rgb.stride(0);
    let data = rgb.data(0);
    let row_bytes = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in data.chunks(stride).take(height as usize) {
        pixels.extend_from_slice(&row[..row_bytes]);
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    /// Encodes `num_frames` flat gray MPEG-4 frames.
    fn write_test_video(path: &Path, num_frames: usize, width: u32, height: u32) {
        use ffmpeg_next::{codec, encoder, format, software, util, Rational};

        ffmpeg_next::init().unwrap();
        let mut octx = format::output(&path).unwrap();
        let global_header = octx.format().flags().contains(format::Flags::GLOBAL_HEADER);

        let mpeg4 = encoder::find(codec::Id::MPEG4).unwrap();
        let mut ost = octx.add_stream(Some(mpeg4)).unwrap();
        let mut ctx = codec::context::Context::new_with_codec(mpeg4)
            .encoder()
            .video()
            .unwrap();
        ctx.set_width(width);
        ctx.set_height(height);
        ctx.set_format(format::Pixel::YUV420P);
        ctx.set_time_base(Rational(1, 25));
        ctx.set_frame_rate(Some(Rational(25, 1)));
        if global_header {
            ctx.set_flags(codec::Flags::GLOBAL_HEADER);
        }
        let mut enc = ctx.open_with(ffmpeg_next::Dictionary::new()).unwrap();
        ost.set_parameters(&enc);
        octx.write_header().unwrap();
        let out_tb = octx.stream(0).unwrap().time_base();

        let mut scaler = software::scaling::Context::get(
            format::Pixel::RGB24,
            width,
            height,
            format::Pixel::YUV420P,
            width,
            height,
            software::scaling::Flags::BILINEAR,
        )
        .unwrap();

        for i in 0..num_frames {
            let mut rgb = util::frame::video::Video::new(format::Pixel::RGB24, width, height);
            rgb.data_mut(0).fill(((i * 40) % 256) as u8);
            let mut yuv = util::frame::video::Video::empty();
            scaler.run(&rgb, &mut yuv).unwrap();
            yuv.set_pts(Some(i as i64));
            enc.send_frame(&yuv).unwrap();
            drain(&mut enc, &mut octx, out_tb);
        }
        enc.send_eof().unwrap();
        drain(&mut enc, &mut octx, out_tb);
        octx.write_trailer().unwrap();
    }

    fn drain(
        enc: &mut ffmpeg_next::encoder::video::Encoder,
        octx: &mut ffmpeg_next::format::context::Output,
        out_tb: ffmpeg_next::Rational,
    ) {
        let mut pkt = ffmpeg_next::Packet::empty();
        while enc.receive_packet(&mut pkt).is_ok() {
            pkt.set_stream(0);
            pkt.rescale_ts(ffmpeg_next::Rational(1, 25), out_tb);
            pkt.write_interleaved(octx).unwrap();
        }
    }

    fn read_all(capture: &mut FfmpegCapture) -> (Vec<Frame>, CaptureError) {
        let mut frames = Vec::new();
        loop {
            match capture.read() {
                Ok(frame) => frames.push(frame),
                Err(e) => return (frames, e),
            }
        }
    }

    #[test]
    fn test_missing_source_is_unavailable() {
        let mut capture = FfmpegCapture::new("/nonexistent/clip.mp4", CaptureSettings::default());
        let err = capture.read().unwrap_err();
        assert!(matches!(err, CaptureError::Unavailable(_)));
        assert!(err.is_retryable());
        assert!(!capture.is_open());
    }

    #[test]
    fn test_reads_every_frame_then_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        write_test_video(&path, 5, 160, 120);

        let mut capture =
            FfmpegCapture::new(path.to_string_lossy(), CaptureSettings::default());
        let (frames, end) = read_all(&mut capture);

        assert_eq!(frames.len(), 5);
        assert_eq!(end, CaptureError::Exhausted);
        assert!(!end.is_retryable());
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.index(), i);
            assert_eq!(frame.channels(), 3);
            assert_eq!(frame.data().len(), 160 * 120 * 3);
        }
    }

    #[test]
    fn test_metadata_after_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        write_test_video(&path, 2, 160, 120);

        let mut capture =
            FfmpegCapture::new(path.to_string_lossy(), CaptureSettings::default());
        assert!(capture.metadata().is_none());
        capture.read().unwrap();

        let meta = capture.metadata().unwrap();
        assert_eq!((meta.width, meta.height), (160, 120));
        assert!(meta.fps > 0.0);
        assert_eq!(meta.source, path.to_string_lossy());
    }

    #[test]
    fn test_release_then_read_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        write_test_video(&path, 3, 64, 48);

        let mut capture =
            FfmpegCapture::new(path.to_string_lossy(), CaptureSettings::default());
        capture.read().unwrap();
        capture.release();
        capture.release();
        assert!(!capture.is_open());

        let frame = capture.read().unwrap();
        assert!(capture.is_open());
        // indices keep counting across reopen
        assert_eq!(frame.index(), 1);
        assert!(frame.data()[0].abs_diff(40) <= 10);
    }

    #[test]
    fn test_reopened_file_resumes_after_last_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        write_test_video(&path, 5, 64, 48);

        let mut capture =
            FfmpegCapture::new(path.to_string_lossy(), CaptureSettings::default());
        capture.read().unwrap();
        capture.read().unwrap();
        // as after a failed read
        capture.stream = None;

        let (frames, end) = read_all(&mut capture);
        assert_eq!(end, CaptureError::Exhausted);
        let indices: Vec<usize> = frames.iter().map(|f| f.index()).collect();
        assert_eq!(indices, vec![2, 3, 4]);
        assert!(frames[0].data()[0].abs_diff(80) <= 10);
    }

    #[test]
    fn test_reopen_past_end_of_file_is_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        write_test_video(&path, 2, 64, 48);

        let mut capture =
            FfmpegCapture::new(path.to_string_lossy(), CaptureSettings::default());
        capture.next_index = 10;
        assert_eq!(capture.read().unwrap_err(), CaptureError::Exhausted);
        assert!(!capture.is_open());
    }

    #[test]
    fn test_repeated_file_failures_end_capture() {
        let mut capture = FfmpegCapture::new("clip.mp4", CaptureSettings::default());
        let errors: Vec<CaptureError> = (0..MAX_CONSECUTIVE_FILE_FAILURES)
            .map(|_| capture.read_failed("corrupt packet".into()))
            .collect();

        assert!(errors[..MAX_CONSECUTIVE_FILE_FAILURES - 1]
            .iter()
            .all(|e| matches!(e, CaptureError::ReadFailed(_))));
        assert_eq!(errors.last(), Some(&CaptureError::Exhausted));
    }

    #[test]
    fn test_stream_failures_stay_retryable() {
        let mut capture = FfmpegCapture::new("rtsp://cam/stream", CaptureSettings::default());
        for _ in 0..MAX_CONSECUTIVE_FILE_FAILURES * 2 {
            let err = capture.read_failed("connection reset".into());
            assert!(matches!(err, CaptureError::ReadFailed(_)));
            assert!(err.is_retryable());
        }
    }

    #[test]
    fn test_is_stream_url() {
        assert!(is_stream_url("rtsp://10.0.0.2/live"));
        assert!(is_stream_url("http://host/feed.mjpg"));
        assert!(!is_stream_url("/videos/clip.mp4"));
        assert!(!is_stream_url("clip.mp4"));
    }

    #[test]
    fn test_default_read_timeout() {
        assert_eq!(CaptureSettings::default().read_timeout, Duration::from_secs(5));
    }
}
