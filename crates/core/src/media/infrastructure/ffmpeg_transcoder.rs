use std::path::Path;

use ffmpeg_next::format::sample::Type as SampleType;
use ffmpeg_next::format::Sample;
use ffmpeg_next::util::frame::audio::Audio as AudioFrame;
use ffmpeg_next::ChannelLayout;

use crate::media::domain::media_error::ProcessError;
use crate::media::domain::media_transcoder::{AudioCodec, MediaTranscoder, OutputSpec};

/// Every decode is resampled to interleaved 16-bit PCM before encoding.
const PCM_FORMAT: Sample = Sample::I16(SampleType::Packed);
const FALLBACK_FRAME_SIZE: usize = 4096;

/// Transcodes and cuts audio in-process using ffmpeg-next.
///
/// Each call opens its own demuxer/decoder/encoder, so one instance can be
/// shared by every materializer worker.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegTranscoder;

impl MediaTranscoder for FfmpegTranscoder {
    fn transcode(
        &self,
        input: &Path,
        spec: &OutputSpec,
        output: &Path,
    ) -> Result<(), ProcessError> {
        ffmpeg_next::init()?;

        let mut source = AudioSource::open(input, Some((spec.sample_rate, spec.channels)))?;
        let mut sink = EncodedSink::create(output, spec)?;

        source.decode(|samples| {
            sink.push(samples)?;
            Ok(true)
        })?;

        sink.finish()
    }

    fn extract_segment(
        &self,
        input: &Path,
        start_seconds: f64,
        duration_seconds: f64,
        output: &Path,
    ) -> Result<(), ProcessError> {
        let valid = start_seconds.is_finite()
            && duration_seconds.is_finite()
            && start_seconds >= 0.0
            && duration_seconds >= 0.0;
        if !valid {
            return Err(ProcessError::InvalidWindow {
                start_seconds,
                duration_seconds,
            });
        }

        ffmpeg_next::init()?;

        let mut source = AudioSource::open(input, None)?;
        let spec = OutputSpec {
            sample_rate: source.rate,
            channels: source.channels,
            codec: codec_for_path(output),
        };
        let channels = usize::from(source.channels.max(1));
        let rate = f64::from(source.rate);
        let first = (start_seconds * rate).round() as u64;
        let last = first + (duration_seconds * rate).round() as u64;

        let mut sink = EncodedSink::create(output, &spec)?;
        let mut position: u64 = 0;

        source.decode(|samples| {
            let frames = (samples.len() / channels) as u64;
            let chunk_start = position;
            let chunk_end = position + frames;
            position = chunk_end;

            if last <= chunk_start {
                return Ok(false);
            }
            if chunk_end <= first {
                return Ok(true);
            }

            let lo = first.saturating_sub(chunk_start) as usize;
            let hi = (last.min(chunk_end) - chunk_start) as usize;
            if hi > lo {
                sink.push(&samples[lo * channels..hi * channels])?;
            }
            Ok(chunk_end < last)
        })?;

        sink.finish()
    }
}

fn codec_for_path(path: &Path) -> AudioCodec {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("wav") => AudioCodec::Pcm,
        _ => AudioCodec::Flac,
    }
}

/// Some containers leave the layout unset; fall back to the default for the channel count.
fn source_layout(decoder: &ffmpeg_next::decoder::Audio) -> ChannelLayout {
    let layout = decoder.channel_layout();
    if layout.is_empty() {
        ChannelLayout::default(i32::from(decoder.channels()))
    } else {
        layout
    }
}

/// Demuxer + decoder + resampler for the best audio stream of one file.
struct AudioSource {
    ictx: ffmpeg_next::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg_next::decoder::Audio,
    resampler: ffmpeg_next::software::resampling::Context,
    source_layout: ChannelLayout,
    rate: u32,
    channels: u16,
}

impl AudioSource {
    /// Open `path`, resampling to `target` (rate, channels) or to the
    /// source's own rate and channel count when `None`.
    fn open(path: &Path, target: Option<(u32, u16)>) -> Result<Self, ProcessError> {
        let ictx = ffmpeg_next::format::input(path)?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Audio)
            .ok_or_else(|| ProcessError::NoAudioStream(path.to_path_buf()))?;
        let stream_index = stream.index();

        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().audio()?;

        let source_layout = source_layout(&decoder);
        let (rate, channels) =
            target.unwrap_or((decoder.rate(), source_layout.channels().max(1) as u16));

        let resampler = ffmpeg_next::software::resampling::Context::get(
            decoder.format(),
            source_layout,
            decoder.rate(),
            PCM_FORMAT,
            ChannelLayout::default(i32::from(channels)),
            rate,
        )?;

        Ok(Self {
            ictx,
            stream_index,
            decoder,
            resampler,
            source_layout,
            rate,
            channels,
        })
    }

    /// Feed resampled interleaved samples to `on_samples` until the stream
    /// ends or the callback returns `Ok(false)`.
    fn decode<F>(&mut self, mut on_samples: F) -> Result<(), ProcessError>
    where
        F: FnMut(&[i16]) -> Result<bool, ProcessError>,
    {
        let mut stage = DecodeStage {
            decoder: &mut self.decoder,
            resampler: &mut self.resampler,
            source_layout: self.source_layout,
            channels: usize::from(self.channels.max(1)),
            decoded: AudioFrame::empty(),
            resampled: AudioFrame::empty(),
            buffer: Vec::new(),
        };

        for (stream, packet) in self.ictx.packets() {
            if stream.index() != self.stream_index {
                continue;
            }
            stage.decoder.send_packet(&packet)?;
            if !stage.drain(&mut on_samples)? {
                return Ok(());
            }
        }

        stage.decoder.send_eof()?;
        if !stage.drain(&mut on_samples)? {
            return Ok(());
        }

        // The resampler may still hold buffered samples
        if let Ok(Some(delay)) = stage.resampler.flush(&mut stage.resampled) {
            if delay.output > 0 {
                stage.copy_resampled();
                on_samples(&stage.buffer)?;
            }
        }

        Ok(())
    }
}

struct DecodeStage<'a> {
    decoder: &'a mut ffmpeg_next::decoder::Audio,
    resampler: &'a mut ffmpeg_next::software::resampling::Context,
    source_layout: ChannelLayout,
    channels: usize,
    decoded: AudioFrame,
    resampled: AudioFrame,
    buffer: Vec<i16>,
}

impl DecodeStage<'_> {
    fn drain<F>(&mut self, on_samples: &mut F) -> Result<bool, ProcessError>
    where
        F: FnMut(&[i16]) -> Result<bool, ProcessError>,
    {
        while self.decoder.receive_frame(&mut self.decoded).is_ok() {
            if self.decoded.channel_layout().is_empty() {
                self.decoded.set_channel_layout(self.source_layout);
            }
            self.resampler.run(&self.decoded, &mut self.resampled)?;
            self.copy_resampled();
            if !self.buffer.is_empty() && !on_samples(&self.buffer)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn copy_resampled(&mut self) {
        self.buffer.clear();
        let count = self.resampled.samples() * self.channels;
        if count == 0 {
            return;
        }
        let bytes = &self.resampled.data(0)[..count * 2];
        self.buffer.extend(
            bytes
                .chunks_exact(2)
                .map(|b| i16::from_ne_bytes([b[0], b[1]])),
        );
    }
}

/// Encoder + muxer writing interleaved 16-bit samples to a file.
struct EncodedSink {
    octx: ffmpeg_next::format::context::Output,
    encoder: ffmpeg_next::encoder::Audio,
    stream_index: usize,
    encoder_time_base: ffmpeg_next::Rational,
    stream_time_base: ffmpeg_next::Rational,
    layout: ChannelLayout,
    rate: u32,
    channels: usize,
    frame_size: usize,
    pending: Vec<i16>,
    pts: i64,
}

impl EncodedSink {
    fn create(path: &Path, spec: &OutputSpec) -> Result<Self, ProcessError> {
        let codec_id = match spec.codec {
            AudioCodec::Flac => ffmpeg_next::codec::Id::FLAC,
            AudioCodec::Pcm => ffmpeg_next::codec::Id::PCM_S16LE,
        };
        let codec = ffmpeg_next::encoder::find(codec_id)
            .ok_or(ProcessError::EncoderUnavailable(spec.codec.name()))?;
        let layout = ChannelLayout::default(i32::from(spec.channels));

        let mut octx = ffmpeg_next::format::output(path)?;
        let mut stream = octx.add_stream(Some(codec))?;
        let stream_index = stream.index();

        let mut encoder = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .audio()?;
        encoder.set_rate(spec.sample_rate as i32);
        encoder.set_channel_layout(layout);
        encoder.set_format(PCM_FORMAT);
        encoder.set_time_base((1, spec.sample_rate as i32));

        let encoder = encoder.open_as(codec)?;
        stream.set_parameters(&encoder);

        let encoder_time_base = encoder.time_base();
        let frame_size = match encoder.frame_size() {
            0 => FALLBACK_FRAME_SIZE,
            n => n as usize,
        };

        octx.write_header()?;

        let stream_time_base = octx
            .stream(stream_index)
            .map(|s| s.time_base())
            .ok_or(ffmpeg_next::Error::StreamNotFound)?;

        Ok(Self {
            octx,
            encoder,
            stream_index,
            encoder_time_base,
            stream_time_base,
            layout,
            rate: spec.sample_rate,
            channels: usize::from(spec.channels.max(1)),
            frame_size,
            pending: Vec::new(),
            pts: 0,
        })
    }

    fn push(&mut self, samples: &[i16]) -> Result<(), ProcessError> {
        self.pending.extend_from_slice(samples);
        let block = self.frame_size * self.channels;
        while self.pending.len() >= block {
            let rest = self.pending.split_off(block);
            let full = std::mem::replace(&mut self.pending, rest);
            self.send_frame(&full)?;
        }
        Ok(())
    }

    fn finish(mut self) -> Result<(), ProcessError> {
        if !self.pending.is_empty() {
            let tail = std::mem::take(&mut self.pending);
            self.send_frame(&tail)?;
        }
        self.encoder.send_eof()?;
        self.write_packets()?;
        self.octx.write_trailer()?;
        Ok(())
    }

    fn send_frame(&mut self, samples: &[i16]) -> Result<(), ProcessError> {
        let per_channel = samples.len() / self.channels;
        let mut frame = AudioFrame::new(PCM_FORMAT, per_channel, self.layout);
        frame.set_rate(self.rate);
        frame.set_pts(Some(self.pts));

        for (dst, sample) in frame.data_mut(0).chunks_exact_mut(2).zip(samples) {
            dst.copy_from_slice(&sample.to_ne_bytes());
        }

        self.encoder.send_frame(&frame)?;
        self.write_packets()?;
        self.pts += per_channel as i64;
        Ok(())
    }

    fn write_packets(&mut self) -> Result<(), ProcessError> {
        let mut encoded = ffmpeg_next::Packet::empty();
        while self.encoder.receive_packet(&mut encoded).is_ok() {
            encoded.set_stream(self.stream_index);
            encoded.rescale_ts(self.encoder_time_base, self.stream_time_base);
            encoded.write_interleaved(&mut self.octx)?;
        }
        Ok(())
    }
}
