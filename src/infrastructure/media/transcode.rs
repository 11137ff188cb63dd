//! Capture-to-recognizer transcoding
//!
//! The recognizer accepts Ogg-framed Opus or raw PCM. Capture streams
//! deliver bare Opus packets, so the Ogg path wraps each run of packets in
//! a proper Ogg page sequence: an OpusHead page, an OpusTags page, then
//! audio pages with running granule positions and a closing EOS page.

use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use crate::domain::translation::AudioEncoding;
use bytes::Bytes;
use std::sync::OnceLock;

/// Opus frame duration produced by the capture encoder
const FRAME_MILLIS: u32 = 20;

/// Decoder pre-skip declared in OpusHead, in 48 kHz samples
const PRE_SKIP: u16 = 3840;

const HEADER_TYPE_NONE: u8 = 0x00;
const HEADER_TYPE_BOS: u8 = 0x02;
const HEADER_TYPE_EOS: u8 = 0x04;

/// Maximum lacing values per Ogg page
const MAX_PAGE_SEGMENTS: usize = 255;

/// Incremental transcoder from capture chunks to recognizer audio
pub trait StreamTranscoder: Send {
    /// Feed one capture chunk, returning any output ready to send
    fn push(&mut self, data: &[u8]) -> Result<Bytes>;

    /// Flush buffered output and close the stream
    fn finish(&mut self) -> Result<Bytes>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpusTranscodeConfig {
    pub sample_rate_hz: u32,
    pub channels: u8,
    /// Opus packets per emitted audio page
    pub frames_per_page: usize,
}

impl Default for OpusTranscodeConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 48_000,
            channels: 1,
            frames_per_page: 25,
        }
    }
}

impl OpusTranscodeConfig {
    pub fn validate(&self) -> Result<()> {
        const VALID_RATES: [u32; 5] = [8_000, 12_000, 16_000, 24_000, 48_000];
        if !VALID_RATES.contains(&self.sample_rate_hz) {
            return Err(DomainError::Validation(format!(
                "unsupported sample rate {} Hz",
                self.sample_rate_hz
            )));
        }
        if self.channels == 0 || self.channels > 2 {
            return Err(DomainError::Validation(format!(
                "unsupported channel count {}",
                self.channels
            )));
        }
        if self.frames_per_page == 0 {
            return Err(DomainError::Validation(
                "frames_per_page must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn samples_per_frame(&self) -> u64 {
        u64::from(self.sample_rate_hz * FRAME_MILLIS / 1000)
    }
}

pub struct OggOpusTranscoder {
    config: OpusTranscodeConfig,
    serial: u32,
    sequence: u32,
    granule: u64,
    pending: Vec<Vec<u8>>,
    headers_emitted: bool,
    finished: bool,
}

impl OggOpusTranscoder {
    pub fn new(config: OpusTranscodeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            serial: rand::random(),
            sequence: 0,
            granule: 0,
            pending: Vec::new(),
            headers_emitted: false,
            finished: false,
        })
    }

    fn header_pages(&mut self) -> Vec<u8> {
        let head = self.opus_head();
        let tags = self.opus_tags();
        let mut out = self.build_page(HEADER_TYPE_BOS, 0, &[head]);
        out.extend_from_slice(&self.build_page(HEADER_TYPE_NONE, 0, &[tags]));
        out
    }

    fn opus_head(&self) -> Vec<u8> {
        let mut head = Vec::with_capacity(19);
        head.extend_from_slice(b"OpusHead");
        head.push(1); // version
        head.push(self.config.channels);
        head.extend_from_slice(&PRE_SKIP.to_le_bytes());
        head.extend_from_slice(&self.config.sample_rate_hz.to_le_bytes());
        head.extend_from_slice(&0u16.to_le_bytes()); // output gain
        head.push(0); // channel mapping family
        head
    }

    fn opus_tags(&self) -> Vec<u8> {
        let vendor = b"voxbridge";
        let mut tags = Vec::with_capacity(8 + 4 + vendor.len() + 4);
        tags.extend_from_slice(b"OpusTags");
        tags.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
        tags.extend_from_slice(vendor);
        tags.extend_from_slice(&0u32.to_le_bytes()); // comment count
        tags
    }

    fn flush_pending(&mut self, out: &mut Vec<u8>, end_of_stream: bool) {
        let packets = std::mem::take(&mut self.pending);
        self.granule += packets.len() as u64 * self.config.samples_per_frame();
        let header_type = if end_of_stream {
            HEADER_TYPE_EOS
        } else {
            HEADER_TYPE_NONE
        };
        let page = self.build_page(header_type, self.granule, &packets);
        out.extend_from_slice(&page);
    }

    fn build_page(&mut self, header_type: u8, granule: u64, packets: &[Vec<u8>]) -> Vec<u8> {
        let mut lacing = Vec::new();
        for packet in packets {
            let mut remaining = packet.len();
            while remaining >= 255 {
                lacing.push(255u8);
                remaining -= 255;
            }
            lacing.push(remaining as u8);
        }
        debug_assert!(lacing.len() <= MAX_PAGE_SEGMENTS);

        let payload_len: usize = packets.iter().map(Vec::len).sum();
        let mut page = Vec::with_capacity(27 + lacing.len() + payload_len);
        page.extend_from_slice(b"OggS");
        page.push(0); // stream structure version
        page.push(header_type);
        page.extend_from_slice(&granule.to_le_bytes());
        page.extend_from_slice(&self.serial.to_le_bytes());
        page.extend_from_slice(&self.sequence.to_le_bytes());
        page.extend_from_slice(&[0u8; 4]); // CRC, patched below
        page.push(lacing.len() as u8);
        page.extend_from_slice(&lacing);
        for packet in packets {
            page.extend_from_slice(packet);
        }
        let crc = ogg_crc(&page);
        page[22..26].copy_from_slice(&crc.to_le_bytes());
        self.sequence += 1;
        page
    }

    /// Lacing values one more packet would add
    fn lacing_cost(packet_len: usize) -> usize {
        packet_len / 255 + 1
    }

    fn pending_lacing_len(&self) -> usize {
        self.pending.iter().map(|p| Self::lacing_cost(p.len())).sum()
    }
}

impl StreamTranscoder for OggOpusTranscoder {
    fn push(&mut self, data: &[u8]) -> Result<Bytes> {
        if self.finished {
            return Err(DomainError::Validation(
                "transcoder already finished".to_string(),
            ));
        }
        if data.is_empty() {
            return Ok(Bytes::new());
        }

        let mut out = Vec::new();
        if !self.headers_emitted {
            let headers = self.header_pages();
            out.extend_from_slice(&headers);
            self.headers_emitted = true;
        }

        // A packet that would overflow the segment table closes the page
        if self.pending_lacing_len() + Self::lacing_cost(data.len()) > MAX_PAGE_SEGMENTS {
            self.flush_pending(&mut out, false);
        }
        self.pending.push(data.to_vec());
        if self.pending.len() >= self.config.frames_per_page {
            self.flush_pending(&mut out, false);
        }
        Ok(Bytes::from(out))
    }

    fn finish(&mut self) -> Result<Bytes> {
        if self.finished {
            return Ok(Bytes::new());
        }
        self.finished = true;

        let mut out = Vec::new();
        if !self.headers_emitted {
            let headers = self.header_pages();
            out.extend_from_slice(&headers);
            self.headers_emitted = true;
        }
        self.flush_pending(&mut out, true);
        Ok(Bytes::from(out))
    }
}

/// Pass-through for captures already in recognizer PCM
pub struct PcmTranscoder;

impl PcmTranscoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PcmTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamTranscoder for PcmTranscoder {
    fn push(&mut self, data: &[u8]) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(data))
    }

    fn finish(&mut self) -> Result<Bytes> {
        Ok(Bytes::new())
    }
}

pub fn transcoder_for(
    encoding: AudioEncoding,
    config: OpusTranscodeConfig,
) -> Result<Box<dyn StreamTranscoder>> {
    match encoding {
        AudioEncoding::OggOpus => Ok(Box::new(OggOpusTranscoder::new(config)?)),
        AudioEncoding::Pcm => Ok(Box::new(PcmTranscoder::new())),
    }
}

/// Ogg page CRC: polynomial 0x04c11db7, no reflection, zero init and xorout
fn ogg_crc(data: &[u8]) -> u32 {
    static TABLE: OnceLock<[u32; 256]> = OnceLock::new();
    let table = TABLE.get_or_init(|| {
        let mut table = [0u32; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            let mut r = (i as u32) << 24;
            for _ in 0..8 {
                r = if r & 0x8000_0000 != 0 {
                    (r << 1) ^ 0x04c1_1db7
                } else {
                    r << 1
                };
            }
            *entry = r;
        }
        table
    });

    let mut crc = 0u32;
    for &byte in data {
        crc = (crc << 8) ^ table[(((crc >> 24) as u8) ^ byte) as usize];
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Page {
        header_type: u8,
        granule: u64,
        sequence: u32,
        packets: Vec<Vec<u8>>,
    }

    /// Walk a byte stream as Ogg pages, checking magic and CRC
    fn parse_pages(mut data: &[u8]) -> Vec<Page> {
        let mut pages = Vec::new();
        while !data.is_empty() {
            assert_eq!(&data[0..4], b"OggS", "page magic");
            assert_eq!(data[4], 0, "stream structure version");
            let header_type = data[5];
            let granule = u64::from_le_bytes(data[6..14].try_into().unwrap());
            let sequence = u32::from_le_bytes(data[18..22].try_into().unwrap());
            let stored_crc = u32::from_le_bytes(data[22..26].try_into().unwrap());
            let segment_count = data[26] as usize;
            let lacing = &data[27..27 + segment_count];
            let payload_len: usize = lacing.iter().map(|&l| l as usize).sum();
            let page_len = 27 + segment_count + payload_len;

            let mut zeroed = data[..page_len].to_vec();
            zeroed[22..26].fill(0);
            assert_eq!(ogg_crc(&zeroed), stored_crc, "page CRC");

            let mut packets = Vec::new();
            let mut packet = Vec::new();
            let mut offset = 27 + segment_count;
            for &lace in lacing {
                packet.extend_from_slice(&data[offset..offset + lace as usize]);
                offset += lace as usize;
                if lace < 255 {
                    packets.push(std::mem::take(&mut packet));
                }
            }
            pages.push(Page {
                header_type,
                granule,
                sequence,
                packets,
            });
            data = &data[page_len..];
        }
        pages
    }

    #[test]
    fn test_stream_structure_and_headers() {
        let mut transcoder = OggOpusTranscoder::new(OpusTranscodeConfig {
            frames_per_page: 2,
            ..Default::default()
        })
        .unwrap();

        let mut stream = Vec::new();
        stream.extend_from_slice(&transcoder.push(&[1u8; 40]).unwrap());
        stream.extend_from_slice(&transcoder.push(&[2u8; 40]).unwrap());
        stream.extend_from_slice(&transcoder.push(&[3u8; 40]).unwrap());
        stream.extend_from_slice(&transcoder.finish().unwrap());

        let pages = parse_pages(&stream);
        assert_eq!(pages.len(), 4);

        assert_eq!(pages[0].header_type, 0x02, "first page is BOS");
        assert_eq!(&pages[0].packets[0][0..8], b"OpusHead");
        assert_eq!(&pages[1].packets[0][0..8], b"OpusTags");

        assert_eq!(pages[2].packets, vec![vec![1u8; 40], vec![2u8; 40]]);
        assert_eq!(pages[3].packets, vec![vec![3u8; 40]]);
        assert_eq!(pages[3].header_type, 0x04, "last page is EOS");

        // Two 20 ms frames at 48 kHz, then one more
        assert_eq!(pages[2].granule, 1920);
        assert_eq!(pages[3].granule, 2880);

        let sequences: Vec<u32> = pages.iter().map(|p| p.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_opus_head_fields() {
        let mut transcoder = OggOpusTranscoder::new(OpusTranscodeConfig::default()).unwrap();
        let stream = transcoder.finish().unwrap();
        let pages = parse_pages(&stream);
        let head = &pages[0].packets[0];
        assert_eq!(head[8], 1, "version");
        assert_eq!(head[9], 1, "channels");
        assert_eq!(u16::from_le_bytes(head[10..12].try_into().unwrap()), 3840);
        assert_eq!(
            u32::from_le_bytes(head[12..16].try_into().unwrap()),
            48_000
        );
    }

    #[test]
    fn test_opus_tags_fields() {
        let mut transcoder = OggOpusTranscoder::new(OpusTranscodeConfig::default()).unwrap();
        let stream = transcoder.finish().unwrap();
        let pages = parse_pages(&stream);
        let tags = &pages[1].packets[0];
        assert_eq!(&tags[0..8], b"OpusTags");
        let vendor_len = u32::from_le_bytes(tags[8..12].try_into().unwrap()) as usize;
        let comments_at = 12 + vendor_len;
        assert_eq!(
            u32::from_le_bytes(tags[comments_at..comments_at + 4].try_into().unwrap()),
            0,
            "comment count"
        );
        assert_eq!(tags.len(), comments_at + 4);
    }

    #[test]
    fn test_large_packet_lacing() {
        let mut transcoder = OggOpusTranscoder::new(OpusTranscodeConfig {
            frames_per_page: 1,
            ..Default::default()
        })
        .unwrap();
        // 600 bytes laces as 255 + 255 + 90
        let packet = vec![7u8; 600];
        let mut stream = Vec::new();
        stream.extend_from_slice(&transcoder.push(&packet).unwrap());
        stream.extend_from_slice(&transcoder.finish().unwrap());

        let pages = parse_pages(&stream);
        assert_eq!(pages[2].packets, vec![packet]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let bad_rate = OpusTranscodeConfig {
            sample_rate_hz: 44_100,
            ..Default::default()
        };
        assert!(OggOpusTranscoder::new(bad_rate).is_err());

        let bad_channels = OpusTranscodeConfig {
            channels: 3,
            ..Default::default()
        };
        assert!(OggOpusTranscoder::new(bad_channels).is_err());
    }

    #[test]
    fn test_push_after_finish_fails() {
        let mut transcoder = OggOpusTranscoder::new(OpusTranscodeConfig::default()).unwrap();
        transcoder.finish().unwrap();
        assert!(transcoder.push(&[1u8; 10]).is_err());
    }

    #[test]
    fn test_pcm_is_passthrough() {
        let mut transcoder = PcmTranscoder::new();
        assert_eq!(
            transcoder.push(&[1, 2, 3]).unwrap(),
            Bytes::from_static(&[1, 2, 3])
        );
        assert!(transcoder.finish().unwrap().is_empty());
    }
}
