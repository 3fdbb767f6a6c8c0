//! Measurement report payloads.
//!
//! A report is a run of fixed-size records, one per channel:
//! ```text
//! ┌─────────┬───────┬───────┬──────────────────────┐
//! │ Channel │ Power │ State │ Temperature          │
//! │ (1B)    │ (1B)  │ (1B)  │ (4B, i32 LE, 1/100)  │
//! └─────────┴───────┴───────┴──────────────────────┘
//! ```

use std::fmt;
use std::slice::ChunksExact;

use serde::{Serialize, Serializer};

use crate::error::{FrameError, Result};

/// Size of one measurement record.
pub const RECORD_SIZE: usize = 7;

/// Exact fixed-point temperature in hundredths of a degree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Temperature(i32);

impl Temperature {
    /// Build from a raw hundredths value.
    pub const fn from_centi(centi: i32) -> Self {
        Self(centi)
    }

    /// The raw value in hundredths.
    pub const fn centi(self) -> i32 {
        self.0
    }

    /// Integer part, truncated toward zero.
    pub const fn whole(self) -> i32 {
        self.0 / 100
    }

    /// Absolute fractional part in hundredths (0-99).
    pub const fn fraction(self) -> u8 {
        (self.0.unsigned_abs() % 100) as u8
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

// Serialized as the decimal string so consumers never see a float.
impl Serialize for Temperature {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One decoded per-channel sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Point {
    pub channel: u8,
    /// Nonzero signals a power fault.
    pub power_flag: u8,
    /// Nonzero signals a fault such as a disconnected probe.
    pub state_flag: u8,
    pub temperature: Temperature,
}

impl Point {
    /// Decode a single record.
    pub fn from_record(record: &[u8; RECORD_SIZE]) -> Self {
        // Stored least significant byte first.
        let raw = i32::from_le_bytes([record[3], record[4], record[5], record[6]]);
        Self {
            channel: record[0],
            power_flag: record[1],
            state_flag: record[2],
            temperature: Temperature::from_centi(raw),
        }
    }

    pub fn has_power_fault(&self) -> bool {
        self.power_flag != 0
    }

    pub fn is_disconnected(&self) -> bool {
        self.state_flag != 0
    }

    /// Returns true when neither flag reports a fault.
    pub fn is_ok(&self) -> bool {
        !self.has_power_fault() && !self.is_disconnected()
    }
}

/// Lazy iterator over the records of a validated payload.
#[derive(Debug, Clone)]
pub struct PointIter<'a> {
    records: ChunksExact<'a, u8>,
}

impl Iterator for PointIter<'_> {
    type Item = Point;

    fn next(&mut self) -> Option<Point> {
        self.records.next().map(|chunk| {
            let mut record = [0u8; RECORD_SIZE];
            record.copy_from_slice(chunk);
            Point::from_record(&record)
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.records.size_hint()
    }
}

impl ExactSizeIterator for PointIter<'_> {}

/// Iterate the records of a measurement payload.
///
/// Fails with [`FrameError::TruncatedRecord`] unless the payload is a whole
/// number of records.
pub fn points(payload: &[u8]) -> Result<PointIter<'_>> {
    if payload.len() % RECORD_SIZE != 0 {
        return Err(FrameError::TruncatedRecord {
            len: payload.len(),
            record_size: RECORD_SIZE,
        });
    }
    Ok(PointIter {
        records: payload.chunks_exact(RECORD_SIZE),
    })
}

/// Decode every record of a measurement payload.
pub fn decode_points(payload: &[u8]) -> Result<Vec<Point>> {
    Ok(points(payload)?.collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_single_record() {
        let payload = [0x01, 0x00, 0x00, 0x64, 0x00, 0x00, 0x00];
        let points = decode_points(&payload).unwrap();

        assert_eq!(
            points,
            vec![Point {
                channel: 1,
                power_flag: 0,
                state_flag: 0,
                temperature: Temperature::from_centi(100),
            }]
        );
        assert_eq!(points[0].temperature.to_string(), "1.00");
        assert!(points[0].is_ok());
    }

    #[test]
    fn decodes_negative_and_fractional_temperatures() {
        let minus = (-1234i32).to_le_bytes();
        let plus = 2_345_678i32.to_le_bytes();
        let mut payload = vec![0x03, 0x00, 0x01];
        payload.extend_from_slice(&minus);
        payload.extend_from_slice(&[0x04, 0x01, 0x00]);
        payload.extend_from_slice(&plus);

        let points = decode_points(&payload).unwrap();
        assert_eq!(points.len(), 2);

        assert_eq!(points[0].channel, 3);
        assert!(points[0].is_disconnected());
        assert_eq!(points[0].temperature.to_string(), "-12.34");
        assert_eq!(points[0].temperature.whole(), -12);
        assert_eq!(points[0].temperature.fraction(), 34);

        assert_eq!(points[1].channel, 4);
        assert!(points[1].has_power_fault());
        assert_eq!(points[1].temperature.to_string(), "23456.78");
    }

    #[test]
    fn small_negative_keeps_sign() {
        assert_eq!(Temperature::from_centi(-5).to_string(), "-0.05");
        assert_eq!(Temperature::from_centi(0).to_string(), "0.00");
        assert_eq!(Temperature::from_centi(i32::MIN).to_string(), "-21474836.48");
    }

    #[test]
    fn empty_payload_has_no_points() {
        assert!(decode_points(&[]).unwrap().is_empty());
    }

    #[test]
    fn truncated_payload_rejected() {
        let err = decode_points(&[0x01, 0x00, 0x00, 0x64, 0x00, 0x00]).unwrap_err();
        assert!(matches!(
            err,
            FrameError::TruncatedRecord {
                len: 6,
                record_size: RECORD_SIZE
            }
        ));
    }

    #[test]
    fn iterator_reports_exact_len() {
        let payload = [0u8; RECORD_SIZE * 3];
        assert_eq!(points(&payload).unwrap().len(), 3);
    }

    #[test]
    fn temperature_serializes_as_decimal_string() {
        let point = Point {
            channel: 2,
            power_flag: 0,
            state_flag: 0,
            temperature: Temperature::from_centi(-250),
        };
        let json = serde_json::to_string(&point).unwrap();
        assert_eq!(
            json,
            r#"{"channel":2,"power_flag":0,"state_flag":0,"temperature":"-2.50"}"#
        );
    }
}
