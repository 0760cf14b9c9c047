use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{FRAME_LEN, MESSAGE_TYPE_D1};

/// Number of bytes covered by the checksum
const CHECKSUM_SPAN: usize = FRAME_LEN - 1;

/// Rotation fixed-point divisor (15 fractional bits)
const ROTATION_SCALE: f32 = 32768.0;

/// Position fixed-point divisor (6 fractional bits)
const POSITION_SCALE: f32 = 64.0;

/// Extra divisor undoing the 8-bit left shift of the 24-bit field
const FIELD_SHIFT_SCALE: f32 = 256.0;

const PITCH: usize = 2;
const YAW: usize = 5;
const ROLL: usize = 8;
const POS_Z: usize = 11;
const POS_X: usize = 14;
const POS_Y: usize = 17;
const ZOOM: usize = 20;
const FOCUS: usize = 23;
const SPARE: usize = 26;

/// Reasons a datagram does not yield a FreeD frame.
///
/// Neither variant is fatal: the datagram is still relayed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("frame too short: {len} bytes, need 29")]
    TooShort { len: usize },

    #[error("checksum mismatch: computed {expected:#04x}, frame carries {found:#04x}")]
    ChecksumMismatch { expected: u8, found: u8 },
}

/// Decoded FreeD D1 camera position message
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FreeDFrame {
    /// Byte 0, `0xD1` for position messages
    pub message_type: u8,
    /// Byte 1, camera address
    pub camera_id: u8,
    /// Tilt in degrees
    pub pitch: f32,
    /// Pan in degrees
    pub yaw: f32,
    /// Roll in degrees
    pub roll: f32,
    /// Height in millimetres
    pub posz: f32,
    /// X position in millimetres
    pub posx: f32,
    /// Y position in millimetres
    pub posy: f32,
    /// Raw zoom encoder count
    pub zoom: u32,
    /// Raw focus encoder count
    pub focus: u32,
    /// Bytes 26-27, user defined
    pub spare: [u8; 2],
}

/// Computes the FreeD checksum of a frame.
///
/// Equal to `(64 - sum(frame[0..28])) mod 256`. The checksum byte itself is
/// not included.
pub fn checksum(frame: &[u8; FRAME_LEN]) -> u8 {
    frame[..CHECKSUM_SPAN]
        .iter()
        .fold(64u8, |acc, byte| acc.wrapping_sub(*byte))
}

/// Decodes a raw datagram into a FreeD frame.
///
/// Bytes past the 29th are ignored.
pub fn decode(raw: &[u8]) -> Result<FreeDFrame, DecodeError> {
    let head = raw
        .get(..FRAME_LEN)
        .and_then(|head| <&[u8; FRAME_LEN]>::try_from(head).ok());
    let raw = match head {
        Some(head) => head,
        None => return Err(DecodeError::TooShort { len: raw.len() }),
    };

    let expected = checksum(raw);
    let found = raw[CHECKSUM_SPAN];
    if expected != found {
        return Err(DecodeError::ChecksumMismatch { expected, found });
    }

    Ok(FreeDFrame {
        message_type: raw[0],
        camera_id: raw[1],
        pitch: rotation(field(raw, PITCH)),
        yaw: rotation(field(raw, YAW)),
        roll: rotation(field(raw, ROLL)),
        posz: position(field(raw, POS_Z)),
        posx: position(field(raw, POS_X)),
        posy: position(field(raw, POS_Y)),
        zoom: encoder(field(raw, ZOOM)),
        focus: encoder(field(raw, FOCUS)),
        spare: [raw[SPARE], raw[SPARE + 1]],
    })
}

fn field(raw: &[u8; FRAME_LEN], offset: usize) -> [u8; 3] {
    [raw[offset], raw[offset + 1], raw[offset + 2]]
}

/// Places the 24-bit field in the top three bytes so the sign comes from b0
fn shifted(bytes: [u8; 3]) -> i32 {
    i32::from_be_bytes([bytes[0], bytes[1], bytes[2], 0])
}

fn rotation(bytes: [u8; 3]) -> f32 {
    shifted(bytes) as f32 / ROTATION_SCALE / FIELD_SHIFT_SCALE
}

fn position(bytes: [u8; 3]) -> f32 {
    shifted(bytes) as f32 / POSITION_SCALE / FIELD_SHIFT_SCALE
}

// Unsigned and unscaled. Some FreeD profiles treat lens fields as signed or
// scaled; keep the raw reading until a reference says otherwise.
fn encoder(bytes: [u8; 3]) -> u32 {
    u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]])
}

/// Two's-complement 24-bit encoding of a fixed-point value, saturating
fn fixed_point(value: f32, scale: f32) -> [u8; 3] {
    const MIN: f32 = -(1 << 23) as f32;
    const MAX: f32 = ((1 << 23) - 1) as f32;
    let steps = (value * scale).round();
    let steps = if steps.is_nan() { 0 } else { steps.clamp(MIN, MAX) as i32 };
    let bytes = steps.to_be_bytes();
    [bytes[1], bytes[2], bytes[3]]
}

impl FreeDFrame {
    /// Creates a D1 frame for `camera_id` with all fields zeroed
    pub fn new(camera_id: u8) -> Self {
        FreeDFrame {
            message_type: MESSAGE_TYPE_D1,
            camera_id,
            ..Default::default()
        }
    }

    /// Encodes the frame into its 29-byte wire form, checksum included.
    ///
    /// Angles and positions are rounded to the nearest fixed-point step and
    /// saturate at the 24-bit range. Lens counts keep their low 24 bits.
    pub fn encode(&self) -> [u8; FRAME_LEN] {
        let mut out = [0u8; FRAME_LEN];
        out[0] = self.message_type;
        out[1] = self.camera_id;

        let fields = [
            (PITCH, fixed_point(self.pitch, ROTATION_SCALE)),
            (YAW, fixed_point(self.yaw, ROTATION_SCALE)),
            (ROLL, fixed_point(self.roll, ROTATION_SCALE)),
            (POS_Z, fixed_point(self.posz, POSITION_SCALE)),
            (POS_X, fixed_point(self.posx, POSITION_SCALE)),
            (POS_Y, fixed_point(self.posy, POSITION_SCALE)),
        ];
        for (offset, bytes) in fields {
            out[offset..offset + 3].copy_from_slice(&bytes);
        }
        out[ZOOM..ZOOM + 3].copy_from_slice(&self.zoom.to_be_bytes()[1..]);
        out[FOCUS..FOCUS + 3].copy_from_slice(&self.focus.to_be_bytes()[1..]);
        out[SPARE..SPARE + 2].copy_from_slice(&self.spare);
        out[CHECKSUM_SPAN] = checksum(&out);
        out
    }
}

impl fmt::Display for FreeDFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{},{},{}",
            self.pitch, self.yaw, self.roll, self.posz, self.posx, self.posy, self.zoom, self.focus
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Builds a frame around the given payload and fixes up the checksum
    fn fixture(offset: usize, bytes: [u8; 3]) -> [u8; FRAME_LEN] {
        let mut raw = [0u8; FRAME_LEN];
        raw[0] = MESSAGE_TYPE_D1;
        raw[1] = 0x01;
        raw[offset..offset + 3].copy_from_slice(&bytes);
        raw[CHECKSUM_SPAN] = checksum(&raw);
        raw
    }

    #[test]
    fn test_checksum_formula() {
        let raw = [0u8; FRAME_LEN];
        assert_eq!(checksum(&raw), 64);

        let mut raw = [0u8; FRAME_LEN];
        raw[0] = 0xD1;
        raw[5] = 0x10;
        // (64 - 0xD1 - 0x10) mod 256
        assert_eq!(checksum(&raw), ((64i32 - 0xD1 - 0x10).rem_euclid(256)) as u8);

        // The checksum byte does not feed into its own value
        raw[CHECKSUM_SPAN] = 0xFF;
        assert_eq!(checksum(&raw), ((64i32 - 0xD1 - 0x10).rem_euclid(256)) as u8);
    }

    #[test]
    fn test_pitch_fixture() {
        let raw = fixture(PITCH, [0x01, 0x00, 0x00]);
        let frame = decode(&raw).unwrap();
        let expected = (0x01i32 << 24) as f32 / 32768.0 / 256.0;
        assert_eq!(frame.pitch, expected);
        assert_eq!(frame.pitch, 2.0);
        assert_eq!(frame.yaw, 0.0);
        assert_eq!(frame.message_type, MESSAGE_TYPE_D1);
        assert_eq!(frame.camera_id, 0x01);
    }

    #[test]
    fn test_negative_rotation() {
        // 0xFF8000 is -32768 steps, i.e. -1 degree
        let raw = fixture(YAW, [0xFF, 0x80, 0x00]);
        assert_eq!(decode(&raw).unwrap().yaw, -1.0);

        let raw = fixture(ROLL, [0x80, 0x00, 0x00]);
        assert_eq!(decode(&raw).unwrap().roll, -256.0);
    }

    #[test]
    fn test_position_scale() {
        // 64 steps per millimetre
        let raw = fixture(POS_X, [0x00, 0x00, 0x40]);
        assert_eq!(decode(&raw).unwrap().posx, 1.0);

        let raw = fixture(POS_Y, [0xFF, 0xFF, 0xC0]);
        assert_eq!(decode(&raw).unwrap().posy, -1.0);

        let raw = fixture(POS_Z, [0x01, 0x00, 0x00]);
        assert_eq!(decode(&raw).unwrap().posz, 1024.0);
    }

    #[test]
    fn test_encoder_fields_are_unsigned_and_unscaled() {
        let raw = fixture(ZOOM, [0x80, 0x00, 0x01]);
        let frame = decode(&raw).unwrap();
        assert_eq!(frame.zoom, 0x0080_0001);
        assert_eq!(frame.focus, 0);

        let raw = fixture(FOCUS, [0xFF, 0xFF, 0xFF]);
        assert_eq!(decode(&raw).unwrap().focus, 0x00FF_FFFF);
    }

    #[test]
    fn test_too_short() {
        assert_eq!(decode(&[]), Err(DecodeError::TooShort { len: 0 }));
        let raw = fixture(PITCH, [0, 0, 0]);
        assert_eq!(
            decode(&raw[..FRAME_LEN - 1]),
            Err(DecodeError::TooShort { len: 28 })
        );
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let raw = fixture(PITCH, [0x00, 0x80, 0x00]);
        let mut long = raw.to_vec();
        long.extend_from_slice(&[0xAA; 16]);
        assert_eq!(decode(&long), decode(&raw));
    }

    #[test]
    fn test_checksum_mismatch_reports_values() {
        let mut raw = fixture(PITCH, [0x00, 0x00, 0x00]);
        let good = raw[CHECKSUM_SPAN];
        raw[CHECKSUM_SPAN] = good.wrapping_add(1);
        assert_eq!(
            decode(&raw),
            Err(DecodeError::ChecksumMismatch {
                expected: good,
                found: good.wrapping_add(1)
            })
        );
    }

    #[test]
    fn test_encode_decode() {
        let frame = FreeDFrame {
            pitch: -12.5,
            yaw: 179.25,
            roll: 0.5,
            posz: 1500.0,
            posx: -250.75,
            posy: 3.125,
            zoom: 0x1234,
            focus: 0xABCDEF,
            spare: [0x01, 0x02],
            ..FreeDFrame::new(7)
        };
        assert_eq!(decode(&frame.encode()).unwrap(), frame);
    }

    #[test]
    fn test_encode_saturates() {
        let frame = FreeDFrame {
            pitch: 1.0e6,
            posx: -1.0e9,
            zoom: 0xFF12_3456,
            ..FreeDFrame::new(1)
        };
        let decoded = decode(&frame.encode()).unwrap();
        assert_eq!(decoded.pitch, ((1 << 23) - 1) as f32 / 32768.0);
        assert_eq!(decoded.posx, -((1 << 23) as f32) / 64.0);
        assert_eq!(decoded.zoom, 0x12_3456);
    }

    #[test]
    fn test_display_matches_log_format() {
        let frame = FreeDFrame {
            pitch: 2.0,
            yaw: -1.0,
            posx: 1.5,
            zoom: 10,
            focus: 20,
            ..FreeDFrame::new(1)
        };
        assert_eq!(frame.to_string(), "2,-1,0,0,1.5,0,10,20");
    }

    proptest! {
        #[test]
        fn prop_short_input_is_too_short(raw in proptest::collection::vec(any::<u8>(), 0..FRAME_LEN)) {
            prop_assert_eq!(decode(&raw), Err(DecodeError::TooShort { len: raw.len() }));
        }

        #[test]
        fn prop_flipped_bit_fails_checksum(
            payload in proptest::collection::vec(any::<u8>(), CHECKSUM_SPAN),
            index in 0..CHECKSUM_SPAN,
            bit in 0u8..8,
        ) {
            let mut raw = [0u8; FRAME_LEN];
            raw[..CHECKSUM_SPAN].copy_from_slice(&payload);
            raw[CHECKSUM_SPAN] = checksum(&raw);
            prop_assert!(decode(&raw).is_ok());

            raw[index] ^= 1 << bit;
            let is_mismatch = matches!(decode(&raw), Err(DecodeError::ChecksumMismatch { .. }));
            prop_assert!(is_mismatch);
        }
    }
}
