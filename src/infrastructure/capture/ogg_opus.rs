//! Opus in an Ogg container, tuned for speech
//!
//! Input is resampled to 16 kHz and encoded as 20 ms VOIP frames at
//! 16 kbps. Every append closes the current Ogg page so each timeslice
//! yields complete pages.

use std::time::{SystemTime, UNIX_EPOCH};

use log::debug;
use ogg::writing::{PacketWriteEndInfo, PacketWriter};
use rubato::{FftFixedIn, Resampler};

use crate::application::ports::MediaError;

use super::stream_encoder::{ContainerTail, ContainerWriter};

/// Rate the Opus encoder runs at
pub const OPUS_SAMPLE_RATE: u32 = 16_000;

/// Samples per Opus frame (20 ms at 16 kHz)
pub const FRAME_SIZE: usize = 320;

const TARGET_BITRATE: i32 = 16_000;
const MAX_PACKET_LEN: usize = 4000;
const RESAMPLE_CHUNK: usize = 1024;

/// Ogg Opus granule positions count 48 kHz samples regardless of the coded rate
const GRANULE_PER_FRAME: u64 = FRAME_SIZE as u64 * 48_000 / OPUS_SAMPLE_RATE as u64;

const VENDOR: &[u8] = b"chat-voice";

pub struct OggOpusContainer {
    encoder: opus::Encoder,
    resampler: Option<FftFixedIn<f32>>,
    pages: PacketWriter<'static, Vec<u8>>,
    serial: u32,
    input_rate: u32,
    unresampled: Vec<f32>,
    frame: Vec<i16>,
    samples_in: u64,
    samples_out: u64,
    granule: u64,
    ended: bool,
}

impl OggOpusContainer {
    /// Encoder for mono PCM captured at `input_rate`
    pub fn new(input_rate: u32) -> Result<Self, MediaError> {
        let mut encoder = opus::Encoder::new(
            OPUS_SAMPLE_RATE,
            opus::Channels::Mono,
            opus::Application::Voip,
        )
        .map_err(opus_error)?;
        encoder
            .set_bitrate(opus::Bitrate::Bits(TARGET_BITRATE))
            .map_err(opus_error)?;
        encoder.set_vbr(true).map_err(opus_error)?;
        encoder.set_inband_fec(true).map_err(opus_error)?;

        let resampler = if input_rate == OPUS_SAMPLE_RATE {
            None
        } else {
            let resampler = FftFixedIn::<f32>::new(
                input_rate as usize,
                OPUS_SAMPLE_RATE as usize,
                RESAMPLE_CHUNK,
                2,
                1,
            )
            .map_err(|e| MediaError::Platform(format!("Resampler init failed: {}", e)))?;
            debug!("Resampling {} Hz capture to {} Hz", input_rate, OPUS_SAMPLE_RATE);
            Some(resampler)
        };

        Ok(Self {
            encoder,
            resampler,
            pages: PacketWriter::new(Vec::new()),
            serial: stream_serial(),
            input_rate,
            unresampled: Vec::new(),
            frame: Vec::new(),
            samples_in: 0,
            samples_out: 0,
            granule: 0,
            ended: false,
        })
    }

    /// Move input through the resampler into `frame`. With `flush`, the
    /// remainder is zero-padded and the output trimmed to the input length.
    fn resample(&mut self, flush: bool) -> Result<(), MediaError> {
        let Some(resampler) = self.resampler.as_mut() else {
            self.samples_out += self.unresampled.len() as u64;
            self.frame
                .extend(self.unresampled.drain(..).map(to_pcm16));
            return Ok(());
        };

        loop {
            let needed = resampler.input_frames_next();
            if self.unresampled.len() < needed {
                if !flush || self.unresampled.is_empty() {
                    break;
                }
                self.unresampled.resize(needed, 0.0);
            }

            let chunk: Vec<f32> = self.unresampled.drain(..needed).collect();
            let output = resampler
                .process(&[chunk], None)
                .map_err(|e| MediaError::Platform(format!("Resampling failed: {}", e)))?;
            if let Some(channel) = output.first() {
                self.samples_out += channel.len() as u64;
                self.frame.extend(channel.iter().copied().map(to_pcm16));
            }
        }

        if flush {
            let expected =
                self.samples_in * u64::from(OPUS_SAMPLE_RATE) / u64::from(self.input_rate);
            let excess = self.samples_out.saturating_sub(expected) as usize;
            let keep = self.frame.len() - excess.min(self.frame.len());
            self.frame.truncate(keep);
        }
        Ok(())
    }

    /// Encode every complete frame buffered so far
    fn encode_frames(&mut self) -> Result<Vec<Vec<u8>>, MediaError> {
        let mut packets = Vec::with_capacity(self.frame.len() / FRAME_SIZE);
        while self.frame.len() >= FRAME_SIZE {
            let pcm: Vec<i16> = self.frame.drain(..FRAME_SIZE).collect();
            let mut packet = vec![0u8; MAX_PACKET_LEN];
            let len = self
                .encoder
                .encode(&pcm, &mut packet)
                .map_err(opus_error)?;
            packet.truncate(len);
            packets.push(packet);
        }
        Ok(packets)
    }

    /// Write packets, closing the page (or stream) with the last one
    fn write_packets(
        &mut self,
        packets: Vec<Vec<u8>>,
        last: PacketWriteEndInfo,
    ) -> Result<(), MediaError> {
        let count = packets.len();
        for (index, packet) in packets.into_iter().enumerate() {
            self.granule += GRANULE_PER_FRAME;
            let info = if index + 1 == count {
                last
            } else {
                PacketWriteEndInfo::NormalPacket
            };
            self.pages
                .write_packet(packet, self.serial, info, self.granule)
                .map_err(ogg_error)?;
        }
        Ok(())
    }

    fn take_pages(&mut self) -> Vec<u8> {
        std::mem::take(self.pages.inner_mut())
    }

    fn ensure_open(&self) -> Result<(), MediaError> {
        if self.ended {
            return Err(MediaError::Internal("Opus stream already ended".into()));
        }
        Ok(())
    }
}

impl ContainerWriter for OggOpusContainer {
    fn begin(&mut self) -> Result<Vec<u8>, MediaError> {
        self.ensure_open()?;

        let mut head = Vec::with_capacity(19);
        head.extend_from_slice(b"OpusHead");
        head.push(1);
        head.push(1);
        head.extend_from_slice(&0u16.to_le_bytes());
        head.extend_from_slice(&self.input_rate.to_le_bytes());
        head.extend_from_slice(&0i16.to_le_bytes());
        head.push(0);
        self.pages
            .write_packet(head, self.serial, PacketWriteEndInfo::EndPage, 0)
            .map_err(ogg_error)?;

        let mut tags = Vec::with_capacity(16 + VENDOR.len());
        tags.extend_from_slice(b"OpusTags");
        tags.extend_from_slice(&(VENDOR.len() as u32).to_le_bytes());
        tags.extend_from_slice(VENDOR);
        tags.extend_from_slice(&0u32.to_le_bytes());
        self.pages
            .write_packet(tags, self.serial, PacketWriteEndInfo::EndPage, 0)
            .map_err(ogg_error)?;

        Ok(self.take_pages())
    }

    fn append(&mut self, pcm: &[i16]) -> Result<Vec<u8>, MediaError> {
        self.ensure_open()?;
        self.samples_in += pcm.len() as u64;
        self.unresampled
            .extend(pcm.iter().map(|&s| f32::from(s) / 32768.0));

        self.resample(false)?;
        let packets = self.encode_frames()?;
        self.write_packets(packets, PacketWriteEndInfo::EndPage)?;
        Ok(self.take_pages())
    }

    fn end(&mut self) -> Result<ContainerTail, MediaError> {
        self.ensure_open()?;
        self.resample(true)?;

        // The stream must end on a packet, so a partial or empty final
        // frame is padded with silence
        let padded = self.frame.len().div_ceil(FRAME_SIZE).max(1) * FRAME_SIZE;
        self.frame.resize(padded, 0);

        let packets = self.encode_frames()?;
        self.write_packets(packets, PacketWriteEndInfo::EndStream)?;
        self.ended = true;

        Ok(ContainerTail {
            bytes: self.take_pages(),
            header: None,
        })
    }
}

fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16
}

fn opus_error(err: opus::Error) -> MediaError {
    MediaError::Platform(format!("Opus encoding failed: {}", err))
}

fn ogg_error(err: std::io::Error) -> MediaError {
    MediaError::Platform(format!("Failed to write Ogg page: {}", err))
}

/// Ogg logical stream serial derived from the clock
fn stream_serial() -> u32 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (now.as_secs() as u32) ^ now.subsec_nanos()
}
