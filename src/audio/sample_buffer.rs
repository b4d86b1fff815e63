use std::io::Cursor;

// Decoded audio, planar, at the session sample rate. Buffers are immutable
// once loaded; the store hands them around behind an Arc.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed or unsupported audio data: {0}")]
    Wav(#[from] hound::Error),
    #[error("unsupported sample format: {bits}-bit {kind:?}")]
    Format { bits: u16, kind: hound::SampleFormat },
    #[error("audio data has no channels")]
    NoChannels,
    #[error("audio data has no frames")]
    Empty,
}

impl SampleBuffer {
    // All channels must have the same length; shorter ones are zero padded.
    pub fn from_channels(sample_rate: u32, mut channels: Vec<Vec<f32>>) -> Self {
        let len = channels.iter().map(Vec::len).max().unwrap_or(0);
        for ch in &mut channels {
            ch.resize(len, 0.0);
        }
        Self {
            sample_rate,
            channels,
        }
    }

    pub fn mono(sample_rate: u32, data: Vec<f32>) -> Self {
        Self::from_channels(sample_rate, vec![data])
    }

    // Decode an encoded WAV (int or float PCM, any channel count) and resample
    // it to the session rate
    pub fn decode(bytes: &[u8], target_rate: u32) -> Result<Self, DecodeError> {
        let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
        let spec = reader.spec();
        let num_channels = spec.channels as usize;
        if num_channels == 0 {
            return Err(DecodeError::NoChannels);
        }

        let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Float, 32) => reader
                .samples::<f32>()
                .collect::<Result<Vec<_>, _>>()?,
            (hound::SampleFormat::Int, bits @ 1..=32) => {
                let max = (1i64 << (bits - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|x| x as f32 / max))
                    .collect::<Result<Vec<_>, _>>()?
            }
            (kind, bits) => return Err(DecodeError::Format { bits, kind }),
        };

        let frames = samples.len() / num_channels;
        if frames == 0 {
            return Err(DecodeError::Empty);
        }

        // interleaved -> planar
        let mut channels = vec![Vec::with_capacity(frames); num_channels];
        for frame in samples.chunks_exact(num_channels) {
            for (ch, &s) in channels.iter_mut().zip(frame) {
                ch.push(s);
            }
        }

        Ok(Self {
            sample_rate: spec.sample_rate,
            channels,
        }
        .resampled(target_rate))
    }

    // Same audio at another rate. A no-op when the rates already match.
    pub fn resampled(self, target_rate: u32) -> Self {
        if self.sample_rate == target_rate || self.sample_rate == 0 {
            return self;
        }
        let channels = self
            .channels
            .iter()
            .map(|ch| resample_linear(ch, self.sample_rate, target_rate))
            .collect();
        Self {
            sample_rate: target_rate,
            channels,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    // frames per channel
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    // A full copy with every channel played back to front.
    pub fn reversed(&self) -> Self {
        Self {
            sample_rate: self.sample_rate,
            channels: self
                .channels
                .iter()
                .map(|ch| ch.iter().rev().copied().collect())
                .collect(),
        }
    }
}

fn resample_linear(data: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    // plain linear interpolation, good enough for one-shot pads
    if source_rate == target_rate || data.is_empty() {
        return data.to_vec();
    }
    let ratio = target_rate as f64 / source_rate as f64;
    let out_len = (data.len() as f64 * ratio).ceil() as usize;
    let last = data.len() - 1;

    (0..out_len)
        .map(|i| {
            let src_pos = i as f64 / ratio;
            let idx = src_pos.floor() as usize;
            if idx >= last {
                return data[last];
            }
            let frac = (src_pos - idx as f64) as f32;
            data[idx] * (1.0 - frac) + data[idx + 1] * frac
        })
        .collect()
}

#[cfg(test)]
pub(crate) fn wav_bytes(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}
