//! Codec Kernel (C1): table-driven μ-law/A-law decode, linear resample
//! (8→16 kHz), and bit-depth conversion. Pure functions over byte buffers,
//! no I/O — every function accepts an empty buffer and returns an empty
//! buffer without error.

pub mod g711;
pub mod resample;

use crate::error::CodecError;

/// Inbound media codec, as described by the telephony provider's
/// media-format descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceCodec {
    MuLaw,
    ALaw,
    Pcm,
}

impl SourceCodec {
    pub fn parse(name: &str) -> Result<Self, CodecError> {
        match name {
            "mulaw" | "PCMU" | "pcmu" => Ok(SourceCodec::MuLaw),
            "alaw" | "PCMA" | "pcma" => Ok(SourceCodec::ALaw),
            "pcm" | "PCM" | "linear16" => Ok(SourceCodec::Pcm),
            other => Err(CodecError::UnsupportedCodec(other.to_string())),
        }
    }
}

/// Describes the inbound media format as reported on the first frame of a
/// session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaFormat {
    pub codec: SourceCodec,
    pub sample_rate: u32,
    pub channels: u8,
    pub bit_depth: u8,
}

impl MediaFormat {
    pub const TARGET: MediaFormat = MediaFormat {
        codec: SourceCodec::Pcm,
        sample_rate: 16_000,
        channels: 1,
        bit_depth: 16,
    };
}

/// One step of a conversion path, cached per session once the inbound
/// format is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionStep {
    MuLawToPcm,
    ALawToPcm,
    Resample { src_hz: u32, dst_hz: u32, bits: u8 },
    BitDepth { src_bits: u8, dst_bits: u8 },
}

/// Compute the ordered conversion path from `source` to [`MediaFormat::TARGET`].
/// Returns an empty path when `source` already matches the target.
pub fn conversion_path(source: MediaFormat) -> Vec<ConversionStep> {
    if source == MediaFormat::TARGET {
        return Vec::new();
    }

    let mut steps = Vec::new();
    let mut rate = source.sample_rate;
    let mut bits = source.bit_depth;

    match source.codec {
        SourceCodec::MuLaw => {
            steps.push(ConversionStep::MuLawToPcm);
            bits = 16;
        }
        SourceCodec::ALaw => {
            steps.push(ConversionStep::ALawToPcm);
            bits = 16;
        }
        SourceCodec::Pcm => {}
    }

    if rate != MediaFormat::TARGET.sample_rate {
        steps.push(ConversionStep::Resample {
            src_hz: rate,
            dst_hz: MediaFormat::TARGET.sample_rate,
            bits,
        });
        rate = MediaFormat::TARGET.sample_rate;
    }

    if bits != MediaFormat::TARGET.bit_depth {
        steps.push(ConversionStep::BitDepth {
            src_bits: bits,
            dst_bits: MediaFormat::TARGET.bit_depth,
        });
    }

    let _ = rate;
    steps
}

/// Apply a cached conversion path to a raw inbound frame, producing linear
/// 16kHz mono 16-bit PCM (little-endian).
pub fn apply_conversion_path(path: &[ConversionStep], buf: &[u8]) -> Vec<u8> {
    let mut current = buf.to_vec();
    for step in path {
        current = match *step {
            ConversionStep::MuLawToPcm => g711::decode_ulaw(&current),
            ConversionStep::ALawToPcm => g711::decode_alaw(&current),
            ConversionStep::Resample { src_hz, dst_hz, bits } => {
                resample::resample_pcm(&current, src_hz, dst_hz, bits, bits)
            }
            ConversionStep::BitDepth { src_bits, dst_bits } => {
                convert_bit_depth(&current, src_bits, dst_bits)
            }
        };
    }
    current
}

/// Converts only 8↔16 bit depth; other combinations return the input
/// unchanged and log a single warning.
pub fn convert_bit_depth(buf: &[u8], src_bits: u8, dst_bits: u8) -> Vec<u8> {
    resample::convert_bit_depth(buf, src_bits, dst_bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_path_is_empty() {
        assert!(conversion_path(MediaFormat::TARGET).is_empty());
    }

    #[test]
    fn mulaw_8k_path_has_three_steps() {
        let source = MediaFormat {
            codec: SourceCodec::MuLaw,
            sample_rate: 8_000,
            channels: 1,
            bit_depth: 8,
        };
        let path = conversion_path(source);
        assert_eq!(
            path,
            vec![
                ConversionStep::MuLawToPcm,
                ConversionStep::Resample { src_hz: 8_000, dst_hz: 16_000, bits: 16 },
            ]
        );
    }

    #[test]
    fn empty_buffer_stays_empty_through_pipeline() {
        let source = MediaFormat {
            codec: SourceCodec::MuLaw,
            sample_rate: 8_000,
            channels: 1,
            bit_depth: 8,
        };
        let path = conversion_path(source);
        assert!(apply_conversion_path(&path, &[]).is_empty());
    }

    /// Raw 8-bit PCM at a non-16kHz rate must resample at its actual bit
    /// depth (8), not the hardcoded 16 the `Resample` step used to carry,
    /// before the trailing `BitDepth` step widens it to 16.
    #[test]
    fn raw_pcm_8bit_path_resamples_at_the_source_bit_depth() {
        let source = MediaFormat { codec: SourceCodec::Pcm, sample_rate: 8_000, channels: 1, bit_depth: 8 };
        let path = conversion_path(source);
        assert_eq!(
            path,
            vec![
                ConversionStep::Resample { src_hz: 8_000, dst_hz: 16_000, bits: 8 },
                ConversionStep::BitDepth { src_bits: 8, dst_bits: 16 },
            ]
        );

        let input = vec![10u8, 20, 30, 40, 50];
        let output = apply_conversion_path(&path, &input);
        // 2x rate doubles the sample count, then 8->16 bit doubles bytes/sample.
        assert_eq!(output.len(), input.len() * 2 * 2);
    }
}
