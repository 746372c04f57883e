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

//! RAD-50: three characters per 16-bit word, radix 40.  Digit values 0-39
//! select from the alphabet below; the extra trailing space covers words
//! whose leading digit overflows to 40 (values above 0o174777).

use relic_err::{Error, Result};

const R50CHARS: &[u8; 41] = b" abcdefghijklmnopqrstuvwxyz$.?0123456789 ";

/// Encode up to three characters as a RAD-50 word.  Shorter input is
/// padded with trailing spaces; characters beyond the third are ignored.
/// `Badfn` if a character is not in the RAD-50 alphabet.
pub fn rad50(s: &str) -> Result<u16> {
    let mut ret: u32 = 0;
    let mut mul: u32 = 1600;
    for c in s.bytes().take(3) {
        let c = c.to_ascii_lowercase();
        let Some(i) = R50CHARS[..40].iter().position(|&r| r == c) else {
            return Err(Error::Badfn);
        };
        ret += i as u32 * mul;
        mul /= 40;
    }
    Ok(ret as u16)
}

/// Decode a RAD-50 word to its three characters.
pub fn r50toasc(r: u16) -> String {
    let mut r = r as usize;
    let mut ret = String::with_capacity(3);
    for d in [1600, 40, 1] {
        let i = r / d;
        r %= d;
        ret.push(R50CHARS[i] as char);
    }
    ret
}

/// Convert a RAD-50 `name.ext` pair to ASCII.  Note that name and ext are
/// padded with spaces to 6 and 3 characters respectively.
pub fn ascname(nam: [u16; 2], ext: u16) -> String {
    format!("{}{}.{}", r50toasc(nam[0]), r50toasc(nam[1]), r50toasc(ext))
}

/// Extensions that by default are treated as text.
const DEFTEXT: &[&str] = &[
    "txt", "lst", "map", "sid", "log", "lis", "rno", "doc", "mem", "bas", "b2s", "mac", "for",
    "ftn", "fth", "cbl", "dbl", "com", "cmd", "bat", "tec", "ctl", "odl", "ps ", "tes", "c  ",
    "h  ", "src", "alg",
];

/// Whether the decoded (3-character, space-padded) extension defaults to
/// text-mode transfer.
pub fn is_deftext(ext: &str) -> bool {
    DEFTEXT.contains(&ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        for s in ["abc", "mfd", "x1$", "?.z", "   ", "a", "09"] {
            let r = rad50(s).unwrap();
            let mut want = s.to_string();
            while want.len() < 3 {
                want.push(' ');
            }
            assert_eq!(r50toasc(r), want);
        }
    }

    #[test]
    fn case_folds() {
        assert_eq!(rad50("MFD").unwrap(), rad50("mfd").unwrap());
    }

    #[test]
    fn known_words() {
        // The directory label identification words.
        assert_eq!(rad50("mfd").unwrap(), 0o051064);
        assert_eq!(rad50("gfd").unwrap(), 0o026264);
        assert_eq!(rad50("ufd").unwrap(), 0o102064);
        assert_eq!(rad50("???").unwrap(), 0o134745);
    }

    #[test]
    fn bad_char() {
        assert_eq!(rad50("a-c"), Err(Error::Badfn));
    }

    #[test]
    fn overflow_digit_decodes_to_space() {
        // 40 * 1600 is not producible by rad50() but can appear on disk.
        assert_eq!(r50toasc(64000), "   ");
    }

    #[test]
    fn name_formatting() {
        let nam = [rad50("tst").unwrap(), rad50("").unwrap()];
        assert_eq!(ascname(nam, rad50("mac").unwrap()), "tst   .mac");
    }

    #[test]
    fn deftext_membership() {
        assert!(is_deftext("txt"));
        assert!(is_deftext("c  "));
        assert!(!is_deftext("sav"));
    }
}
