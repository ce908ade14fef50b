use crate::prelude::{Complex32, EstimationError, EstimationResult};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::io::Cursor;

/// Byte length of the `numChannels` + `numAngles` header.
const HEADER_LEN: usize = 8;

/// Per-site table of complex array responses, one row per calibrated bearing.
///
/// Angles are strictly increasing within `[0, 360)` and every row carries the
/// same number of channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SteeringVectorTable {
    channels: usize,
    angles: Vec<f32>,
    responses: Vec<Complex32>,
}

impl SteeringVectorTable {
    /// Builds a table from row angles and row-major responses.
    pub fn new(
        channels: usize,
        angles: Vec<f32>,
        responses: Vec<Complex32>,
    ) -> EstimationResult<Self> {
        if channels == 0 {
            return Err(EstimationError::MalformedCalibration(
                "channel count must be positive".into(),
            ));
        }
        encoded_count(channels, "channel")?;
        encoded_count(angles.len(), "angle")?;
        if angles.is_empty() {
            return Err(EstimationError::MalformedCalibration(
                "table has no angles".into(),
            ));
        }
        if responses.len() != angles.len() * channels {
            return Err(EstimationError::MalformedCalibration(format!(
                "expected {} responses for {} angles x {} channels, found {}",
                angles.len() * channels,
                angles.len(),
                channels,
                responses.len()
            )));
        }
        if let Some(bad) = angles.iter().find(|a| !(0.0..360.0).contains(*a)) {
            return Err(EstimationError::MalformedCalibration(format!(
                "angle {} outside [0, 360)",
                bad
            )));
        }
        if let Some(pair) = angles.windows(2).find(|pair| pair[1] <= pair[0]) {
            return Err(EstimationError::MalformedCalibration(format!(
                "angles not strictly increasing at {} -> {}",
                pair[0], pair[1]
            )));
        }

        Ok(Self {
            channels,
            angles,
            responses,
        })
    }

    /// Ideal uniform circular array: `p_k(theta) = exp(j 2 pi r cos(theta - 360 k / N))`.
    pub fn circular_array(
        channels: usize,
        radius_wavelengths: f32,
        step_deg: f32,
    ) -> EstimationResult<Self> {
        if !(step_deg > 0.0 && step_deg <= 360.0) {
            return Err(EstimationError::MalformedCalibration(format!(
                "invalid angle step {}",
                step_deg
            )));
        }
        let count = (360.0 / step_deg).round() as usize;
        let angles: Vec<f32> = (0..count).map(|i| i as f32 * step_deg).collect();
        let mut responses = Vec::with_capacity(count * channels);
        for &angle in &angles {
            for k in 0..channels {
                let element = 2.0 * PI * k as f32 / channels as f32;
                let phase = 2.0 * PI * radius_wavelengths * (angle.to_radians() - element).cos();
                responses.push(Complex32::from_polar(1.0, phase));
            }
        }
        Self::new(channels, angles, responses)
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn len(&self) -> usize {
        self.angles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.angles.is_empty()
    }

    pub fn angles(&self) -> &[f32] {
        &self.angles
    }

    pub fn response(&self, index: usize) -> &[Complex32] {
        &self.responses[index * self.channels..(index + 1) * self.channels]
    }

    /// Index of the row whose angle equals `angle_deg`.
    pub fn index_of(&self, angle_deg: f32) -> Option<usize> {
        self.angles.iter().position(|&a| a == angle_deg)
    }

    pub fn rows(&self) -> impl Iterator<Item = (f32, &[Complex32])> + '_ {
        self.angles
            .iter()
            .copied()
            .zip(self.responses.chunks_exact(self.channels))
    }

    /// Parses the little-endian calibration layout:
    /// `i32 channels, i32 angles, angles x {f32 angle, channels x (f32 re, f32 im)}`.
    pub fn from_bytes(bytes: &[u8]) -> EstimationResult<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(EstimationError::MalformedCalibration(format!(
                "header needs {} bytes, found {}",
                HEADER_LEN,
                bytes.len()
            )));
        }

        let mut cursor = Cursor::new(bytes);
        let channels = read_count(&mut cursor, "channel")?;
        let angle_count = read_count(&mut cursor, "angle")?;

        let expected = angle_count
            .checked_mul(4 + 8 * channels)
            .and_then(|body| body.checked_add(HEADER_LEN))
            .ok_or_else(|| {
                EstimationError::MalformedCalibration("declared size overflows".into())
            })?;
        if bytes.len() != expected {
            return Err(EstimationError::MalformedCalibration(format!(
                "{} channels x {} angles needs {} bytes, found {}",
                channels,
                angle_count,
                expected,
                bytes.len()
            )));
        }

        let mut angles = Vec::with_capacity(angle_count);
        let mut responses = Vec::with_capacity(angle_count * channels);
        for _ in 0..angle_count {
            angles.push(read_f32(&mut cursor)?);
            for _ in 0..channels {
                let re = read_f32(&mut cursor)?;
                let im = read_f32(&mut cursor)?;
                responses.push(Complex32::new(re, im));
            }
        }

        Self::new(channels, angles, responses)
    }

    /// Inverse of [`SteeringVectorTable::from_bytes`]; floats are written bit-exact.
    pub fn to_bytes(&self) -> EstimationResult<Vec<u8>> {
        let mut out =
            Vec::with_capacity(HEADER_LEN + self.angles.len() * (4 + 8 * self.channels));
        let channels = encoded_count(self.channels, "channel")?;
        let angles = encoded_count(self.angles.len(), "angle")?;
        write_table(&mut out, channels, angles, self)
            .map_err(|err| EstimationError::MalformedCalibration(err.to_string()))?;
        Ok(out)
    }
}

fn read_count(cursor: &mut Cursor<&[u8]>, what: &str) -> EstimationResult<usize> {
    let value = cursor
        .read_i32::<LittleEndian>()
        .map_err(|err| EstimationError::MalformedCalibration(format!("{} count: {}", what, err)))?;
    if value < 0 {
        return Err(EstimationError::MalformedCalibration(format!(
            "negative {} count {}",
            what, value
        )));
    }
    Ok(value as usize)
}

/// Counts are stored as `i32`; larger tables cannot be encoded.
fn encoded_count(count: usize, what: &str) -> EstimationResult<i32> {
    i32::try_from(count).map_err(|_| {
        EstimationError::MalformedCalibration(format!("{} count {} exceeds i32", what, count))
    })
}

fn read_f32(cursor: &mut Cursor<&[u8]>) -> EstimationResult<f32> {
    cursor
        .read_f32::<LittleEndian>()
        .map_err(|err| EstimationError::MalformedCalibration(err.to_string()))
}

fn write_table(
    out: &mut Vec<u8>,
    channels: i32,
    angles: i32,
    table: &SteeringVectorTable,
) -> std::io::Result<()> {
    out.write_i32::<LittleEndian>(channels)?;
    out.write_i32::<LittleEndian>(angles)?;
    for (angle, response) in table.rows() {
        out.write_f32::<LittleEndian>(angle)?;
        for value in response {
            out.write_f32::<LittleEndian>(value.re)?;
            out.write_f32::<LittleEndian>(value.im)?;
        }
    }
    Ok(())
}
