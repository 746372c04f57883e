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

//! RSTS filespec parsing.
//!
//! A filespec is `ppn name.ext<prot>/switch...`, where every part is
//! optional and the PPN may be written `/proj/prog/`, `[proj,prog]`,
//! `(proj,prog)`, or one of the shorthand characters `$ ! % &`.
//! `*` in a PPN field means wildcard (encoded as 255); `?` in a name or
//! extension is a single-character wildcard and a trailing `*` expands
//! to all-wildcards.

use core::fmt;

use bitflags::bitflags;
use relic_err::{Error, Result};

use crate::rad50::{ascname, rad50};

bitflags! {
    /// Which components of a parsed filespec are wildcarded.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Wild: u8 {
        const PROJ = 1;
        const PROG = 2;
        const NAME = 4;
        const EXT = 8;
    }
}

/// Mode bit set by the `/ronly` switch.
pub const MODE_RONLY: u32 = 8192;

/// A parsed RSTS file name, roughly like a FIRQB structure in the actual
/// OS, which is why it keeps the name.
///
/// Special case: a PPN given Unix style with only the project element
/// (`/proj` or `/proj/`) is accepted provided nothing else follows, and
/// leaves `prog` as `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Firqb {
    pub proj: Option<u8>,
    pub prog: Option<u8>,
    /// File name as two RAD-50 words, space padded.
    pub name: Option<[u16; 2]>,
    /// Extension as one RAD-50 word, space padded.
    pub ext: Option<u16>,
    pub prot: Option<u8>,
    pub mode: Option<u32>,
    pub pos: Option<u32>,
    pub clusiz: Option<u32>,
    pub size: Option<u32>,
    pub wild: Wild,
}

// PPN shorthand characters.
fn ppnchar(c: u8) -> Option<(u8, u8)> {
    match c {
        b'$' => Some((1, 2)),
        b'!' => Some((1, 3)),
        b'%' => Some((1, 4)),
        b'&' => Some((1, 5)),
        _ => None,
    }
}

struct Scanner<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).map(|c| c.to_ascii_lowercase())
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn eat(&mut self, c: u8) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn at_end(&self) -> bool {
        self.pos == self.buf.len()
    }

    fn number(&mut self) -> Option<u32> {
        let start = self.pos;
        let mut value: u32 = 0;
        while let Some(c) = self.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            value = value.saturating_mul(10).saturating_add((c - b'0') as u32);
            self.pos += 1;
        }
        (self.pos > start).then_some(value)
    }

    /// A PPN field: `*` (wildcard, 255) or a number 0-254.
    fn ppn_field(&mut self) -> Result<Option<(u8, bool)>> {
        if self.eat(b'*') {
            return Ok(Some((255, true)));
        }
        match self.number() {
            None => Ok(None),
            Some(n) if n <= 254 => Ok(Some((n as u8, false))),
            Some(_) => Err(Error::Badfn),
        }
    }

    /// A name or extension component: `[a-z0-9?]*` with an optional
    /// trailing `*`.  Returns the component and whether `*` ended it.
    fn component(&mut self) -> (String, bool) {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == b'?' {
                s.push(c as char);
                self.pos += 1;
            } else {
                break;
            }
        }
        let star = self.eat(b'*');
        (s, star)
    }
}

impl Firqb {
    /// Parse a filespec.  Spaces are insignificant and removed first.
    pub fn new(spec: &str) -> Result<Self> {
        let mut fq = Firqb::default();
        let despaced: Vec<u8> = spec.bytes().filter(|&c| c != b' ').collect();
        if despaced.is_empty() {
            return Ok(fq);
        }
        let mut sc = Scanner { buf: &despaced, pos: 0 };

        fq.parse_ppn(&mut sc)?;

        let (n, star) = sc.component();
        if !n.is_empty() || star {
            let mut n = n;
            if star {
                n.push_str("??????");
            }
            fq.name = Some([
                rad50(&n[..n.len().min(3)])?,
                rad50(&n[n.len().min(3)..n.len().min(6)])?,
            ]);
            if n.contains('?') {
                fq.wild |= Wild::NAME;
            }
        }

        if sc.eat(b'.') {
            let (e, star) = sc.component();
            if !e.is_empty() || star {
                let mut e = e;
                if star {
                    e.push_str("???");
                }
                fq.ext = Some(rad50(&e[..e.len().min(3)])?);
                if e.contains('?') {
                    fq.wild |= Wild::EXT;
                }
            }
        }

        if sc.eat(b'<') {
            let Some(p) = sc.number() else {
                return Err(Error::Badfn);
            };
            if p > 255 || !sc.eat(b'>') {
                return Err(Error::Badfn);
            }
            fq.prot = Some(p as u8);
        }

        while sc.eat(b'/') {
            fq.parse_switch(&mut sc)?;
        }
        if !sc.at_end() {
            return Err(Error::Badfn);
        }
        Ok(fq)
    }

    fn parse_ppn(&mut self, sc: &mut Scanner) -> Result<()> {
        match sc.peek() {
            Some(b'[' | b'(') => {
                sc.pos += 1;
                let Some((proj, pwild)) = sc.ppn_field()? else {
                    return Err(Error::Badfn);
                };
                if !sc.eat(b',') {
                    return Err(Error::Badfn);
                }
                let Some((prog, gwild)) = sc.ppn_field()? else {
                    return Err(Error::Badfn);
                };
                if !matches!(sc.bump(), Some(b']' | b')')) {
                    return Err(Error::Badfn);
                }
                self.set_ppn(proj, pwild, prog, gwild);
            }
            Some(c) if ppnchar(c).is_some() => {
                sc.pos += 1;
                let (proj, prog) = ppnchar(c).unwrap();
                self.proj = Some(proj);
                self.prog = Some(prog);
            }
            Some(b'/') => {
                // Unix style.  If the whole spec is switches there is no
                // PPN at all; a PPN field must follow the slash.
                let mark = sc.pos;
                sc.pos += 1;
                let Some((proj, pwild)) = sc.ppn_field()? else {
                    sc.pos = mark;
                    return Ok(());
                };
                if sc.at_end() {
                    // Bare project, nothing follows.
                    self.proj = Some(proj);
                    if pwild {
                        self.wild |= Wild::PROJ;
                    }
                    return Ok(());
                }
                if !sc.eat(b'/') {
                    return Err(Error::Badfn);
                }
                match sc.ppn_field()? {
                    Some((prog, gwild)) => {
                        if !sc.eat(b'/') && !sc.at_end() {
                            return Err(Error::Badfn);
                        }
                        self.set_ppn(proj, pwild, prog, gwild);
                    }
                    None => {
                        // `/proj/` with nothing after the slash.
                        if !sc.at_end() {
                            return Err(Error::Badfn);
                        }
                        self.proj = Some(proj);
                        if pwild {
                            self.wild |= Wild::PROJ;
                        }
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn set_ppn(&mut self, proj: u8, pwild: bool, prog: u8, gwild: bool) {
        self.proj = Some(proj);
        self.prog = Some(prog);
        if pwild {
            self.wild |= Wild::PROJ;
        }
        if gwild {
            self.wild |= Wild::PROG;
        }
    }

    fn parse_switch(&mut self, sc: &mut Scanner) -> Result<()> {
        let mut sw = String::new();
        while let Some(c) = sc.peek() {
            if c.is_ascii_alphabetic() {
                sw.push(c as char);
                sc.pos += 1;
            } else {
                break;
            }
        }
        let arg = if sc.eat(b'=') || sc.eat(b':') {
            match sc.number() {
                Some(n) => Some(n),
                None => return Err(Error::Badsw),
            }
        } else {
            None
        };
        if sw.len() < 2 {
            return Err(Error::Badsw);
        }
        // Switch names may be abbreviated to no less than two characters.
        let (tail, attr) = match &sw[..2] {
            "cl" => ("ustersize", Attr::Clusiz),
            "fi" => ("lesize", Attr::Size),
            "si" => ("ze", Attr::Size),
            "mo" => ("de", Attr::Mode),
            "ro" => ("nly", Attr::Ronly),
            "po" => ("sition", Attr::Pos),
            "pr" => ("otect", Attr::Prot),
            _ => return Err(Error::Badsw),
        };
        if !tail.starts_with(&sw[2..]) {
            return Err(Error::Badsw);
        }
        if let Attr::Ronly = attr {
            // /ronly doesn't take an argument.
            if arg.is_some() {
                return Err(Error::Badsw);
            }
            self.mode = Some(self.mode.unwrap_or(0) | MODE_RONLY);
            return Ok(());
        }
        // All other switches require one.
        let Some(arg) = arg else {
            return Err(Error::Badsw);
        };
        match attr {
            Attr::Clusiz => self.clusiz = Some(arg),
            Attr::Size => self.size = Some(arg),
            Attr::Mode => self.mode = Some(arg),
            Attr::Pos => self.pos = Some(arg),
            Attr::Prot => {
                self.prot = Some(u8::try_from(arg).map_err(|_| Error::Badsw)?);
            }
            Attr::Ronly => unreachable!(),
        }
        Ok(())
    }

    /// Fill components absent here from `def`, carrying the matching
    /// wildcard flags along.
    pub fn apply_defaults(&mut self, def: &Firqb) {
        let mut used = Wild::empty();
        if self.proj.is_none() && def.proj.is_some() {
            self.proj = def.proj;
            used |= Wild::PROJ;
        }
        if self.prog.is_none() && def.prog.is_some() {
            self.prog = def.prog;
            used |= Wild::PROG;
        }
        if self.name.is_none() && def.name.is_some() {
            self.name = def.name;
            used |= Wild::NAME;
        }
        if self.ext.is_none() && def.ext.is_some() {
            self.ext = def.ext;
            used |= Wild::EXT;
        }
        self.wild |= def.wild & used;
    }
}

enum Attr {
    Clusiz,
    Size,
    Mode,
    Ronly,
    Pos,
    Prot,
}

impl fmt::Display for Firqb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.proj.is_some() || self.prog.is_some() {
            match self.proj {
                Some(255) => write!(f, "[*,")?,
                Some(p) => write!(f, "[{p},")?,
                None => write!(f, "[?,")?,
            }
            match self.prog {
                Some(255) => write!(f, "*]")?,
                Some(p) => write!(f, "{p}]")?,
                None => write!(f, "?]")?,
            }
        }
        if self.name.map_or(false, |n| n[0] != 0) || self.ext.map_or(false, |e| e != 0) {
            let name = ascname(self.name.unwrap_or([0; 2]), self.ext.unwrap_or(0));
            write!(f, "{}", name.replace(' ', ""))?;
        }
        if let Some(prot) = self.prot {
            if prot != 0 {
                write!(f, "<{prot}>")?;
            }
        }
        Ok(())
    }
}

/// Parse a filespec, then fill missing components from a default spec.
pub fn parse(spec: &str, defspec: &str) -> Result<Firqb> {
    let mut fq = Firqb::new(spec)?;
    fq.apply_defaults(&Firqb::new(defspec)?);
    Ok(fq)
}
