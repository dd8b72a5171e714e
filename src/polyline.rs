//! Decoder for the flexible polyline format used by the directions service.
//!
//! An encoded string is a header (format version, then a packed content word
//! holding precision and third dimension settings) followed by zig-zag signed
//! deltas for every coordinate, each written as 5-bit groups over a URL-safe
//! base64 alphabet. Bit 5 of a group marks that another group follows.

use thiserror::Error;

use crate::entities::Coordinates;

const ENCODING_TABLE: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

const DECODING_TABLE: [i8; 128] = decoding_table();

const FORMAT_VERSION: u64 = 1;

const fn decoding_table() -> [i8; 128] {
    let mut table = [-1; 128];
    let mut i = 0;
    while i < ENCODING_TABLE.len() {
        table[ENCODING_TABLE[i] as usize] = i as i8;
        i += 1;
    }
    table
}

#[derive(Error, Debug, PartialEq, Clone, Copy)]
pub enum DecodeError {
    #[error("Polyline character {character:?} at offset {offset} is not in the alphabet")]
    InvalidCharacter { character: char, offset: usize },
    #[error("Polyline is truncated at offset {offset}")]
    Truncated { offset: usize },
    #[error("Polyline value starting at offset {offset} overflows")]
    Overflow { offset: usize },
    #[error("Polyline coordinate is not valid: {latitude},{longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThirdDimension {
    Absent,
    Level,
    Altitude,
    Elevation,
    Reserved1,
    Reserved2,
    Custom1,
    Custom2,
}

impl ThirdDimension {
    const fn from_bits(bits: u64) -> Self {
        match bits & 0b111 {
            0 => Self::Absent,
            1 => Self::Level,
            2 => Self::Altitude,
            3 => Self::Elevation,
            4 => Self::Reserved1,
            5 => Self::Reserved2,
            6 => Self::Custom1,
            _ => Self::Custom2,
        }
    }

    pub const fn is_present(&self) -> bool {
        !matches!(self, Self::Absent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u64,
    pub precision: u32,
    pub third_dimension: ThirdDimension,
    pub third_dimension_precision: u32,
}

impl Header {
    fn from_content(version: u64, content: u64) -> Self {
        Self {
            version,
            precision: (content & 0xF) as u32,
            third_dimension: ThirdDimension::from_bits(content >> 4),
            third_dimension_precision: ((content >> 7) & 0xF) as u32,
        }
    }

    pub fn scale_factor(&self) -> f64 {
        10f64.powi(self.precision as i32)
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    cursor: usize,
}

impl<'a> Reader<'a> {
    const fn new(encoded: &'a str) -> Self {
        Self {
            bytes: encoded.as_bytes(),
            cursor: 0,
        }
    }

    const fn has_remaining(&self) -> bool {
        self.cursor < self.bytes.len()
    }

    fn next_group(&mut self) -> Result<u64, DecodeError> {
        let offset = self.cursor;
        let byte = *self
            .bytes
            .get(offset)
            .ok_or(DecodeError::Truncated { offset })?;

        let value = DECODING_TABLE
            .get(byte as usize)
            .copied()
            .filter(|value| *value >= 0)
            .ok_or(DecodeError::InvalidCharacter {
                character: byte as char,
                offset,
            })?;

        self.cursor += 1;
        Ok(value as u64)
    }

    fn read_unsigned(&mut self) -> Result<u64, DecodeError> {
        let start = self.cursor;
        let mut result = 0u64;
        let mut shift = 0u32;

        loop {
            let group = self.next_group()?;
            if shift >= 60 {
                return Err(DecodeError::Overflow { offset: start });
            }

            result |= (group & 0x1F) << shift;

            if group & 0x20 == 0 {
                return Ok(result);
            }

            shift += 5;
        }
    }

    fn read_signed(&mut self) -> Result<i64, DecodeError> {
        let value = self.read_unsigned()?;
        let folded = (value >> 1) as i64;

        if value & 1 == 1 {
            return Ok(!folded);
        }

        Ok(folded)
    }

    fn read_header(&mut self) -> Result<Header, DecodeError> {
        let version = self.read_unsigned()?;
        if version != FORMAT_VERSION {
            tracing::warn!("unsupported polyline version: {}", version);
        }

        let content = self.read_unsigned()?;
        Ok(Header::from_content(version, content))
    }
}

/// Reads only the header of an encoded polyline.
pub fn decode_header(encoded: &str) -> Result<Header, DecodeError> {
    Reader::new(encoded).read_header()
}

/// Decodes an encoded polyline into its ordered latitude/longitude pairs.
///
/// An empty input yields no coordinates. Third dimension values are read to keep
/// the stream aligned but are not returned.
pub fn decode(encoded: &str) -> Result<Vec<Coordinates>, DecodeError> {
    if encoded.is_empty() {
        return Ok(vec![]);
    }

    let mut reader = Reader::new(encoded);
    let header = reader.read_header()?;
    let factor = header.scale_factor();

    let mut coordinates = vec![];
    let mut lat = 0i64;
    let mut lng = 0i64;

    while reader.has_remaining() {
        lat += reader.read_signed()?;
        lng += reader.read_signed()?;

        let point = Coordinates {
            latitude: lat as f64 / factor,
            longitude: lng as f64 / factor,
        };

        if !point.is_valid() {
            return Err(DecodeError::InvalidCoordinate {
                latitude: point.latitude,
                longitude: point.longitude,
            });
        }

        coordinates.push(point);

        if header.third_dimension.is_present() {
            reader.read_signed()?;
        }
    }

    Ok(coordinates)
}

#[cfg(test)]
pub(crate) fn encode(
    points: &[(f64, f64, f64)],
    precision: u32,
    third: Option<(u64, u32)>,
) -> String {
    fn push_unsigned(out: &mut String, mut value: u64) {
        while value > 0x1F {
            out.push(ENCODING_TABLE[((value & 0x1F) | 0x20) as usize] as char);
            value >>= 5;
        }
        out.push(ENCODING_TABLE[value as usize] as char);
    }

    fn push_signed(out: &mut String, value: i64) {
        let mut folded = (value << 1) as u64;
        if value < 0 {
            folded = !folded;
        }
        push_unsigned(out, folded);
    }

    let (third_kind, third_precision) = third.unwrap_or((0, 0));
    let factor = 10f64.powi(precision as i32);
    let third_factor = 10f64.powi(third_precision as i32);

    let mut out = String::new();
    push_unsigned(&mut out, FORMAT_VERSION);
    push_unsigned(
        &mut out,
        precision as u64 | (third_kind << 4) | ((third_precision as u64) << 7),
    );

    let (mut last_lat, mut last_lng, mut last_z) = (0i64, 0i64, 0i64);
    for (lat, lng, z) in points {
        let lat = (lat * factor).round() as i64;
        let lng = (lng * factor).round() as i64;
        push_signed(&mut out, lat - last_lat);
        push_signed(&mut out, lng - last_lng);
        (last_lat, last_lng) = (lat, lng);

        if third_kind != 0 {
            let z = (z * third_factor).round() as i64;
            push_signed(&mut out, z - last_z);
            last_z = z;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRANKFURT: [(f64, f64); 4] = [
        (50.10228, 8.69821),
        (50.10201, 8.69567),
        (50.10063, 8.69150),
        (50.09878, 8.68752),
    ];

    fn assert_close(actual: &[Coordinates], expected: &[(f64, f64)], tolerance: f64) {
        assert_eq!(actual.len(), expected.len());
        for (point, (lat, lng)) in actual.iter().zip(expected) {
            assert!((point.latitude - lat).abs() < tolerance, "{point:?} vs {lat}");
            assert!((point.longitude - lng).abs() < tolerance, "{point:?} vs {lng}");
        }
    }

    #[test]
    fn decode_reference_polyline() {
        let header = decode_header("BFoz5xJ67i1B1B7PzIhaxL7Y").unwrap();
        assert_eq!(header.version, 1);
        assert_eq!(header.precision, 5);
        assert_eq!(header.third_dimension, ThirdDimension::Absent);

        let points = decode("BFoz5xJ67i1B1B7PzIhaxL7Y").unwrap();
        assert_close(&points, &FRANKFURT, 1e-5);
    }

    #[test]
    fn decode_skips_third_dimension() {
        let header = decode_header("BlBoz5xJ67i1BU1B7PUzIhaUxL7YU").unwrap();
        assert_eq!(header.third_dimension, ThirdDimension::Altitude);

        let points = decode("BlBoz5xJ67i1BU1B7PUzIhaUxL7YU").unwrap();
        assert_close(&points, &FRANKFURT, 1e-5);
    }

    #[test]
    fn decode_empty() {
        assert_eq!(decode(""), Ok(vec![]));
    }

    #[test]
    fn decode_truncated_group() {
        // the final group still has its continuation bit set
        assert_eq!(
            decode("BFoz5xJ67i1B1B7PzIhaxL7"),
            Err(DecodeError::Truncated { offset: 23 })
        );
        // longitude delta missing entirely
        assert!(matches!(
            decode("BFoz5xJ67i1B1B7PzIhaxL"),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn decode_invalid_character() {
        assert_eq!(
            decode("BFoz5xJ!7i1B"),
            Err(DecodeError::InvalidCharacter {
                character: '!',
                offset: 7
            })
        );
        assert!(matches!(
            decode("BFoz5xJé7i1B"),
            Err(DecodeError::InvalidCharacter { offset: 7, .. })
        ));
    }

    #[test]
    fn decode_overflowing_value() {
        let encoded = format!("BF{}A", "_".repeat(20));
        assert_eq!(decode(&encoded), Err(DecodeError::Overflow { offset: 2 }));
    }

    #[test]
    fn decode_out_of_range_coordinate() {
        let encoded = encode(&[(10.0, 10.0, 0.0)], 0, None);
        assert!(decode(&encoded).is_ok());

        // precision 0 with a 500 degree latitude
        let encoded = encode(&[(500.0, 10.0, 0.0)], 0, None);
        assert!(matches!(
            decode(&encoded),
            Err(DecodeError::InvalidCoordinate { .. })
        ));
    }

    #[test]
    fn round_trip_with_precision() {
        let points = [
            (21.0285, 105.8048, 0.0),
            (21.0261, 105.8123, 0.0),
            (-33.86785, 151.20732, 0.0),
            (21.0245, 105.8412, 0.0),
        ];

        for precision in [4, 5, 6] {
            let encoded = encode(&points, precision, None);
            let decoded = decode(&encoded).unwrap();
            let expected: Vec<(f64, f64)> = points.iter().map(|(a, b, _)| (*a, *b)).collect();
            assert_close(&decoded, &expected, 10f64.powi(-(precision as i32)));
        }

        let encoded = encode(
            &[(21.0285, 105.8048, 12.5), (21.0245, 105.8412, -3.0)],
            5,
            Some((3, 1)),
        );
        assert_eq!(decode_header(&encoded).unwrap().third_dimension_precision, 1);
        assert_close(
            &decode(&encoded).unwrap(),
            &[(21.0285, 105.8048), (21.0245, 105.8412)],
            1e-5,
        );
    }

    #[test]
    fn unsupported_version_still_decodes() {
        // version 2 header followed by the same body
        let points = decode("CFoz5xJ67i1B1B7PzIhaxL7Y").unwrap();
        assert_close(&points, &FRANKFURT, 1e-5);
    }
}
