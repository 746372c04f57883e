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

//! File access: the metadata gathered for a directory entry, and byte
//! streams over file contents.
//!
//! Line translation happens in the raw stream.  RMS variable length
//! records have to be decoded in binary form with awareness of block
//! boundaries, so it works well here, and at the raw stage a shortened
//! read is not a problem for the buffered layer above.

use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};

use log::error;
use relic_ds::DataStorage;
use relic_err::{Error, Result};

use crate::{
    dir::Dir,
    disk::Disk,
    mcs,
    ondisk::{
        UfdAe, UfdNe, UfdRms1, UfdRms2, FA_ORG, FA_RAT, FA_RFM, FO_SEQ, RA_IMP, RA_SPN, RF_FIX,
        RF_STM, RF_UDF, RF_VFC,
    },
    rad50::{ascname, is_deftext, r50toasc},
    BLKSIZE,
};

/// Information about a file (or directory) found by a lookup.
#[derive(Clone, Debug)]
pub struct Filedata {
    pub dir: Dir,
    /// The file's name entry; `None` when this describes the directory
    /// itself.
    pub ne: Option<UfdNe>,
    /// The accounting entry, for files.
    pub ae: Option<UfdAe>,
    pub rms1: Option<UfdRms1>,
    pub rms2: Option<UfdRms2>,
    /// Starting DCNs of the file clusters, from the retrieval entries.
    pub rlist: Vec<u16>,
    /// File cluster size in blocks.
    pub clusiz: u16,
    /// Allocated size in blocks.
    pub size: u32,
    /// Logical EOF in bytes.
    pub bsize: u64,
}

impl Filedata {
    /// Describe a directory itself (for listing or dumping).
    pub fn dir(dir: Dir) -> Self {
        let clusiz = dir.clusiz;
        let blocks = dir.dcns.len() as u32 * clusiz as u32;
        Self {
            dir,
            ne: None,
            ae: None,
            rms1: None,
            rms2: None,
            rlist: Vec::new(),
            clusiz,
            size: blocks,
            bsize: blocks as u64 * BLKSIZE as u64,
        }
    }

    /// Gather the file information hanging off a name entry: the
    /// accounting entry, the retrieval list, RMS attributes when
    /// present, and the logical EOF.
    pub fn file<DS: DataStorage>(disk: &mut Disk<DS>, dir: Dir, ne: UfdNe) -> Result<Self> {
        let ae: UfdAe = dir.entry(disk, ne.uaa)?;
        let clusiz = ae.uclus.get();
        if clusiz == 0 {
            error!("file {} has cluster size 0", ascname_of(&ne));
            return Err(Error::Corrupt);
        }
        let rlist = dir.readlistnz(disk, ne.uar)?;
        let mut size = ae.usiz.get() as u32;
        if ae.urts[0].get() == 0 {
            // A large file; the RTS name field holds the high size bits.
            size += (ae.urts[1].get() as u32) << 16;
        }
        if size.div_ceil(clusiz as u32) > rlist.len() as u32 {
            error!("too few retrieval entries for {} blocks of {}", size, ascname_of(&ne));
            return Err(Error::Corrupt);
        }
        let mut rms1 = None;
        let mut rms2 = None;
        let bsize;
        if !ae.ulnk.is_null() {
            let r1: UfdRms1 = dir.entry(disk, ae.ulnk)?;
            bsize = r1.fa_eof.get().saturating_sub(1) as u64 * BLKSIZE as u64
                + r1.fa_eofb.get() as u64;
            if !r1.ulnk.is_null() {
                rms2 = Some(dir.entry(disk, r1.ulnk)?);
            }
            rms1 = Some(r1);
        } else if size != 0
            && !rlist.is_empty()
            && is_deftext(&r50toasc(ne.unam[2].get()))
        {
            // No attributes to give the EOF, but this looks like a text
            // file; trim the NUL padding of the last block.
            let lastclu = disk.read(rlist[rlist.len() - 1], clusiz)?;
            let lastblkoff = ((size - 1) % clusiz as u32) as usize * BLKSIZE;
            let block = &lastclu.bytes()[lastblkoff..lastblkoff + BLKSIZE];
            let pad = block.iter().rev().take_while(|&&b| b == 0).count();
            bsize = (size as u64 - 1) * BLKSIZE as u64 + (BLKSIZE - pad) as u64;
        } else {
            bsize = size as u64 * BLKSIZE as u64;
        }
        Ok(Self {
            dir,
            ne: Some(ne),
            ae: Some(ae),
            rms1,
            rms2,
            rlist,
            clusiz,
            size,
            bsize,
        })
    }

    pub fn is_dir(&self) -> bool {
        self.ne.is_none()
    }

    /// The file name and extension only, without padding.
    pub fn strname(&self) -> String {
        match &self.ne {
            None => String::new(),
            Some(ne) => ascname_of(ne).replace(' ', ""),
        }
    }

    /// Open a stream over the file contents.  The mode string follows
    /// the usual conventions (`r`, `rb`, ...); directories can only be
    /// opened `rb`, and the write modes are not implemented yet.
    pub fn open<'d, DS: DataStorage>(
        &self,
        disk: &'d mut Disk<DS>,
        mode: &str,
    ) -> Result<FileStream<'d, DS>> {
        let mode = OpenMode::parse(mode)?;
        if self.is_dir() && (mode.text || !mode.reading) {
            return Err(Error::Badmode);
        }
        if !mode.reading && (disk.ronly || disk.ronlypack) {
            return Err(Error::Ropack);
        }
        if !mode.reading || mode.updating {
            // TODO: write streams need the put-side of the record codec.
            return Err(Error::Unimplemented);
        }
        let raw = RawFile::new(disk, self.clone(), mode.text);
        Ok(if mode.text {
            FileStream::Text(TextFile {
                inner: BufReader::new(raw),
            })
        } else {
            FileStream::Binary(BufReader::new(raw))
        })
    }
}

fn ascname_of(ne: &UfdNe) -> String {
    ascname([ne.unam[0].get(), ne.unam[1].get()], ne.unam[2].get())
}

impl std::fmt::Display for Filedata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.dir, self.strname())
    }
}

struct OpenMode {
    reading: bool,
    updating: bool,
    text: bool,
}

impl OpenMode {
    fn parse(mode: &str) -> Result<Self> {
        let mut reading = false;
        let mut writing = false;
        let mut appending = false;
        let mut updating = false;
        let mut binary = false;
        let mut text = false;
        for c in mode.chars() {
            match c {
                'r' => reading = true,
                'w' => writing = true,
                'a' => appending = true,
                '+' => updating = true,
                'b' => binary = true,
                't' => text = true,
                _ => return Err(Error::Badmode),
            }
        }
        if text && binary {
            return Err(Error::Badmode);
        }
        if u8::from(reading) + u8::from(writing) + u8::from(appending) != 1 {
            return Err(Error::Badmode);
        }
        Ok(Self {
            reading,
            updating,
            text: text || !binary,
        })
    }
}

/// A stream over file contents, buffered; text mode decodes DEC-MCS.
pub enum FileStream<'d, DS: DataStorage> {
    Binary(BufReader<RawFile<'d, DS>>),
    Text(TextFile<'d, DS>),
}

impl<'d, DS: DataStorage> FileStream<'d, DS> {
    /// Read the remaining contents as raw bytes (binary mode only).
    pub fn read_to_end(&mut self) -> Result<Vec<u8>> {
        match self {
            FileStream::Binary(r) => {
                let mut buf = Vec::new();
                r.read_to_end(&mut buf).map_err(io_err)?;
                Ok(buf)
            }
            FileStream::Text(_) => Err(Error::Badmode),
        }
    }

    /// Read the remaining contents as text (text mode only).
    pub fn read_to_string(&mut self) -> Result<String> {
        match self {
            FileStream::Text(t) => t.read_to_string(),
            FileStream::Binary(_) => Err(Error::Badmode),
        }
    }

    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        match self {
            FileStream::Binary(r) => r.seek(pos).map_err(io_err),
            FileStream::Text(t) => t.inner.seek(pos).map_err(io_err),
        }
    }
}

fn io_err(err: io::Error) -> Error {
    match err.get_ref().and_then(|e| e.downcast_ref::<Error>()) {
        Some(&e) => e,
        None => Error::Diskio,
    }
}

/// The raw, record-aware byte stream.  Position is a byte offset in the
/// logical file; reads decode RMS record framing and normalize line
/// endings when the stream was opened for text.
pub struct RawFile<'d, DS: DataStorage> {
    disk: &'d mut Disk<DS>,
    fd: Filedata,
    pos: u64,
    /// Translate CRLF to LF on the way through.
    crlf: bool,
    /// RMS record format in effect, 0 for none.
    rms: u16,
    recsize: usize,
    attr: u16,
}

impl<'d, DS: DataStorage> RawFile<'d, DS> {
    fn new(disk: &'d mut Disk<DS>, fd: Filedata, text: bool) -> Self {
        let mut crlf = false;
        let mut rms = 0;
        let mut recsize = 0;
        let mut attr = 0;
        if text {
            match &fd.rms1 {
                // Native RSTS file, so CRLF line endings.
                None => crlf = true,
                Some(r1) if r1.fa_typ.get() & FA_ORG == FO_SEQ => {
                    let rfm = r1.fa_typ.get() & FA_RFM;
                    // Stream and undefined are stream formats; treat VFC
                    // the same way pending later implementation.
                    if rfm == RF_STM || rfm == RF_UDF || rfm == RF_VFC {
                        crlf = true;
                    } else {
                        rms = rfm;
                        recsize = r1.fa_rsz.get() as usize;
                        attr = r1.fa_typ.get() & FA_RAT;
                    }
                }
                // Relative and indexed organizations are served raw.
                Some(_) => {}
            }
        }
        Self {
            disk,
            fd,
            pos: 0,
            crlf,
            rms,
            recsize,
            attr,
        }
    }

    pub fn tell(&self) -> u64 {
        self.pos
    }

    /// Read up to `n` bytes from the current position: one slice of a
    /// cluster, or one decoded record.  Empty at EOF.
    fn read_rec(&mut self, n: usize) -> Result<Vec<u8>> {
        loop {
            let clusiz = self.fd.clusiz as u64 * BLKSIZE as u64;
            let cnum = (self.pos / clusiz) as usize;
            let coff = (self.pos % clusiz) as usize;
            let nclusters = if self.fd.is_dir() {
                self.fd.dir.dcns.len()
            } else {
                self.fd.rlist.len()
            };
            if cnum >= nclusters {
                return Ok(Vec::new());
            }
            let mut rlen = clusiz as usize - coff;
            rlen = rlen.min(n);
            if self.pos + rlen as u64 > self.fd.bsize {
                rlen = self.fd.bsize.saturating_sub(self.pos) as usize;
                if rlen == 0 {
                    return Ok(Vec::new());
                }
            }
            if self.fd.is_dir() {
                // Directory clusters were pre-read at construction.
                let clu = self.disk.read(self.fd.dir.dcns[cnum], self.fd.clusiz)?;
                let ret = clu.bytes()[coff..coff + rlen].to_vec();
                self.pos += rlen as u64;
                return Ok(ret);
            }
            let clu = self.disk.read(self.fd.rlist[cnum], self.fd.clusiz)?;
            if self.rms == 0 {
                let ret = clu.bytes()[coff..coff + rlen].to_vec();
                self.pos += rlen as u64;
                return Ok(if self.crlf { replace_crlf(&ret) } else { ret });
            }

            // Bytes left in the current block.
            let left = BLKSIZE - (coff & (BLKSIZE - 1));
            let mut ret;
            let reclen;
            if self.rms == RF_FIX {
                reclen = self.recsize;
                // No-span records never cross a block boundary; skip
                // over the unused remainder.
                if self.attr & RA_SPN != 0 && left < reclen {
                    self.pos += left as u64;
                    continue;
                }
                let bytes = clu.bytes();
                ret = bytes[coff..(coff + reclen).min(bytes.len())].to_vec();
                self.pos += reclen as u64;
            } else {
                // Variable length record: 2-byte length, 0xFFFF marking
                // "skip to the next block".
                let bytes = clu.bytes();
                let rl = bytes[coff] as usize + bytes[coff + 1] as usize * 256;
                if rl == 0xFFFF {
                    self.pos += left as u64;
                    continue;
                }
                reclen = rl;
                ret = bytes[(coff + 2).min(bytes.len())..(coff + 2 + rl).min(bytes.len())].to_vec();
                // Records start on even boundaries.
                self.pos += if rl & 1 == 1 { rl as u64 + 3 } else { rl as u64 + 2 };
            }
            if ret.len() < reclen {
                // The record runs into the next cluster.
                let Some(&next) = self.fd.rlist.get(cnum + 1) else {
                    error!("record at {} runs past the retrieval list", self.pos);
                    return Err(Error::Corrupt);
                };
                let need = reclen - ret.len();
                let clu2 = self.disk.read(next, self.fd.clusiz)?;
                ret.extend_from_slice(&clu2.bytes()[..need.min(clu2.bytes().len())]);
            }
            let effective = if self.attr & RA_IMP != 0 {
                reclen + 1
            } else {
                reclen
            };
            if self.attr & RA_IMP != 0 {
                // Implied carriage control: a bare LF after the record,
                // nothing embedded to translate.
                ret.push(b'\n');
            } else {
                ret = replace_crlf(&ret);
            }
            ret.truncate(rlen.min(effective));
            return Ok(ret);
        }
    }
}

impl<DS: DataStorage> Read for RawFile<'_, DS> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data = self
            .read_rec(buf.len())
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        buf[..data.len()].copy_from_slice(&data);
        Ok(data.len())
    }
}

impl<DS: DataStorage> Seek for RawFile<'_, DS> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let newpos = match pos {
            SeekFrom::Start(off) => Some(off),
            SeekFrom::Current(off) => self.pos.checked_add_signed(off),
            SeekFrom::End(off) => self.fd.bsize.checked_add_signed(off),
        };
        match newpos {
            Some(p) => {
                self.pos = p;
                Ok(p)
            }
            None => Err(io::Error::new(io::ErrorKind::InvalidInput, Error::Badmode)),
        }
    }
}

/// Buffered text access, decoding DEC-MCS.  The raw layer already
/// normalized line endings to LF.
pub struct TextFile<'d, DS: DataStorage> {
    inner: BufReader<RawFile<'d, DS>>,
}

impl<DS: DataStorage> TextFile<'_, DS> {
    pub fn read_to_string(&mut self) -> Result<String> {
        let mut buf = Vec::new();
        self.inner.read_to_end(&mut buf).map_err(io_err)?;
        mcs::decode(&buf)
    }

    /// The next line, without its terminator; `None` at EOF.
    pub fn read_line(&mut self) -> Result<Option<String>> {
        let mut buf = Vec::new();
        self.inner.read_until(b'\n', &mut buf).map_err(io_err)?;
        if buf.is_empty() {
            return Ok(None);
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
        }
        mcs::decode(&buf).map(Some)
    }
}

fn replace_crlf(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if data[i] == b'\r' && data.get(i + 1) == Some(&b'\n') {
            out.push(b'\n');
            i += 2;
        } else {
            out.push(data[i]);
            i += 1;
        }
    }
    out
}
