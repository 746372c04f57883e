// Copyright 2024 Kevin Ludwig
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The DEC Multinational Character Set (DEC Std 170), the default text
//! encoding on RSTS.  GL is ASCII; GR mostly coincides with ISO Latin-1,
//! except for five repositioned letters and a number of unassigned codes.

use relic_err::{Error, Result};

/// Decode one DEC-MCS byte.  `None` for unassigned positions.
pub fn decode_byte(b: u8) -> Option<char> {
    match b {
        0x00..=0x7F => Some(b as char),
        0xA8 => Some('\u{a4}'),  // currency sign
        0xD7 => Some('\u{152}'), // capital ligature OE
        0xDD => Some('\u{178}'), // capital Y with diaeresis
        0xF7 => Some('\u{153}'), // small ligature oe
        0xFD => Some('\u{ff}'),  // small y with diaeresis
        0x80..=0xA0 | 0xA4 | 0xA6 | 0xAC..=0xAF | 0xB4 | 0xB8 | 0xBE | 0xD0 | 0xDE | 0xF0
        | 0xFE | 0xFF => None,
        _ => Some(b as char), // remaining GR positions coincide with Latin-1
    }
}

/// Encode one character as a DEC-MCS byte.  `None` if not representable.
pub fn encode_char(c: char) -> Option<u8> {
    match c {
        '\u{00}'..='\u{7f}' => Some(c as u8),
        '\u{a4}' => Some(0xA8),
        '\u{152}' => Some(0xD7),
        '\u{178}' => Some(0xDD),
        '\u{153}' => Some(0xF7),
        '\u{ff}' => Some(0xFD),
        _ => {
            let cp = c as u32;
            if !(0xA1..=0xFC).contains(&cp) {
                return None;
            }
            match cp as u8 {
                // Latin-1 positions that DEC-MCS leaves unassigned or
                // assigns to a different character.
                0xA6 | 0xA8 | 0xAC..=0xAF | 0xB4 | 0xB8 | 0xBE | 0xD0 | 0xD7 | 0xDD | 0xDE
                | 0xF0 | 0xF7 => None,
                b => Some(b),
            }
        }
    }
}

/// Decode a byte string, failing with `Corrupt` on unassigned codes.
pub fn decode(bytes: &[u8]) -> Result<String> {
    bytes
        .iter()
        .map(|&b| decode_byte(b).ok_or(Error::Corrupt))
        .collect()
}

/// Decode a byte string, substituting U+FFFD for unassigned codes.
pub fn decode_lossy(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| decode_byte(b).unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Encode a string; `None` if any character is not representable.
pub fn encode(s: &str) -> Option<Vec<u8>> {
    s.chars().map(encode_char).collect()
}
