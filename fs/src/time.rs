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

//! RSTS date and time encodings.
//!
//! A date is `(year - 1970) * 1000 + day-of-year` (1-based).  A time is
//! `1440 - minutes-since-midnight`; only the low 11 bits are the time
//! field, the upper bits carry per-record flags.

use relic_err::{Error, Result};

/// Bits of a time word that hold the time-of-day field.
pub const TIME_MASK: u16 = 0o003777;

/// Midnight, start of the day.
pub const MIDNIGHT: u16 = 1440;

/// Convert a RSTS date (and optional time) to Unix seconds, UTC.
pub fn to_unix(rdate: u16, rtime: u16) -> i64 {
    let yr = (rdate / 1000) as i64;
    let mut day = (rdate % 1000) as i64;
    day += yr * 365 + (yr + 1) / 4 - 1;
    let minutes = 1440 - (rtime & TIME_MASK) as i64;
    day * 86400 + minutes * 60
}

/// Convert Unix seconds (UTC) to a RSTS `(date, time)` pair.  RSTS dates
/// run out in 2035; `Badfn` beyond that.
pub fn from_unix(t: i64) -> Result<(u16, u16)> {
    if t < 0 {
        return Err(Error::Badfn);
    }
    let mut day = t / 86400;
    let minutes = (t % 86400) / 60;
    // Walk out whole years, leap days included (1972 is the first).
    let mut yr = 0i64;
    loop {
        let ylen = if (yr + 2) % 4 == 0 { 366 } else { 365 };
        if day < ylen {
            break;
        }
        day -= ylen;
        yr += 1;
    }
    if yr > 65 {
        return Err(Error::Badfn);
    }
    Ok((
        (yr * 1000 + day + 1) as u16,
        (1440 - minutes) as u16,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch() {
        // 1-Jan-1970, midnight.
        assert_eq!(to_unix(1, MIDNIGHT), 0);
    }

    #[test]
    fn flags_are_masked() {
        assert_eq!(to_unix(1, MIDNIGHT | 0o014000), 0);
    }

    #[test]
    fn round_trip() {
        for t in [0, 86400, 86400 * 800 + 3600, 86400 * 365 * 20] {
            let (d, m) = from_unix(t).unwrap();
            assert_eq!(to_unix(d, m), t);
        }
    }

    #[test]
    fn out_of_range() {
        assert!(from_unix(86400 * 365 * 70).is_err());
    }
}
