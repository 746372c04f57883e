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

//! The storage allocation table, `[0,1]satt.sys`: one bit per pack
//! cluster, packed little-endian within bytes, set meaning allocated.
//! Bit 0 is the pack label cluster; bits beyond the last real pack
//! cluster are forced to 1.
//!
//! The bitmap is mirrored in memory and written through to the cached
//! `satt.sys` clusters on every change, so the cache remains the single
//! flush path.

use log::error;
use relic_ds::DataStorage;
use relic_err::{Error, Result};

use crate::{disk::Disk, BLKSIZE};

pub struct Satt {
    /// Starting DCNs of the satt.sys clusters; empty while a new pack's
    /// table is still being placed.
    dcns: Vec<u16>,
    /// In-memory mirror, one buffer per satt.sys cluster.
    bufs: Vec<Vec<u8>>,
    /// Number of pack clusters on the pack (valid bits).
    sattsize: u32,
    /// Where the next allocation search starts, a PCN.
    sattpos: u32,
    pcs: u16,
    clurat: u16,
    /// Number of allocated pack clusters; kept exact.
    pub inuse: u32,
}

/// Number of pack clusters covered by the bitmap.
fn satt_bits(sz: u32, dcs: u16, pcs: u16) -> u32 {
    (sz - dcs as u32) / pcs as u32
}

/// Number of satt.sys clusters needed to hold the bitmap.
fn satt_clusters(sattsize: u32, pcs: u16) -> u32 {
    sattsize.div_ceil(pcs as u32 * BLKSIZE as u32 * 8)
}

impl Satt {
    /// Wrap the existing `[0,1]satt.sys` of a mounted pack, given its
    /// retrieval list and file cluster size.
    pub fn open<DS: DataStorage>(
        disk: &mut Disk<DS>,
        pcs: u16,
        clurat: u16,
        rlist: &[u16],
        uclus: u16,
    ) -> Result<Self> {
        let sattsize = satt_bits(disk.sz, disk.dcs, pcs);
        let sattrc = satt_clusters(sattsize, pcs);
        if uclus != pcs {
            error!("satt.sys cluster size {uclus} is not the pack cluster size {pcs}");
            return Err(Error::Corrupt);
        }
        if rlist.len() != sattrc as usize {
            error!("satt.sys cluster count is {}, expecting {sattrc}", rlist.len());
            return Err(Error::Corrupt);
        }
        let mut bufs = Vec::with_capacity(rlist.len());
        for &dcn in rlist {
            bufs.push(disk.read(dcn, uclus)?.bytes().to_vec());
        }
        let inuse = bufs.iter().flatten().map(|b| b.count_ones()).sum();
        Ok(Self {
            dcns: rlist.to_vec(),
            bufs,
            sattsize,
            sattpos: 0,
            pcs,
            clurat,
            inuse,
        })
    }

    /// Build the allocation table for a newly initialized file system:
    /// mark the label cluster and the tail bits beyond the end of the
    /// pack, start allocating from mid-disk as RSTS does for the initial
    /// file system items, and self-allocate the table's own clusters.
    pub fn format<DS: DataStorage>(disk: &mut Disk<DS>, pcs: u16, clurat: u16) -> Result<Self> {
        let sattsize = satt_bits(disk.sz, disk.dcs, pcs);
        let sattrc = satt_clusters(sattsize, pcs);
        let buflen = pcs as usize * BLKSIZE;
        let mut satt = Self {
            dcns: Vec::new(),
            bufs: vec![vec![0; buflen]; sattrc as usize],
            sattsize,
            sattpos: sattsize / 2,
            pcs,
            clurat,
            inuse: 0,
        };
        // Pack cluster 0 holds the pack label.
        satt.bufs[0][0] = 1;
        // Force the bits past the end of the pack.
        let last = satt.bufs.last_mut().unwrap();
        let mut byte = (sattsize as usize / 8) % buflen;
        let bitpos = sattsize % 8;
        if bitpos != 0 {
            last[byte] |= 0xFF << bitpos;
            byte += 1;
        }
        if sattsize as usize / 8 < sattrc as usize * buflen {
            for b in &mut last[byte..] {
                *b = 0xFF;
            }
        }
        let dcns = satt.getclu(disk, pcs, sattrc, None)?;
        for (&dcn, buf) in dcns.iter().zip(satt.bufs.iter()) {
            let clu = disk.read(dcn, pcs)?;
            clu.bytes_mut().copy_from_slice(buf);
            clu.touch();
        }
        satt.dcns = dcns;
        satt.inuse = satt.bufs.iter().flatten().map(|b| b.count_ones()).sum();
        Ok(satt)
    }

    pub fn pcntodcn(&self, pcn: u32) -> u16 {
        (pcn * self.clurat as u32 + 1) as u16
    }

    pub fn dcntopcn(&self, dcn: u16) -> u32 {
        (dcn as u32 - 1) / self.clurat as u32
    }

    fn dcntopcn_checked(&self, dcn: u16) -> Result<u32> {
        let off = (dcn as u32 - 1) % self.clurat as u32;
        if off != 0 {
            error!("misaligned pack cluster: dcn {dcn}");
            return Err(Error::Corrupt);
        }
        Ok(self.dcntopcn(dcn))
    }

    /// Bits per allocation unit for a cluster size, validating it.
    /// Cluster size 16 is legal on large cluster packs, for use by
    /// directories, and occupies a whole pack cluster there.
    fn checkclu(&self, clusiz: u16) -> Result<u32> {
        if !(clusiz == 16 && self.pcs > 16)
            && (clusiz == 0 || clusiz % self.pcs != 0 || clusiz > 256)
        {
            return Err(Error::Badclu);
        }
        Ok((clusiz as u32 / self.pcs as u32).max(1))
    }

    fn buf_at(&self, byte: usize) -> (usize, usize) {
        let buflen = self.pcs as usize * BLKSIZE;
        (byte / buflen, byte % buflen)
    }

    fn is_free(&self, pos: u32, bitcnt: u32) -> bool {
        if bitcnt < 8 {
            let (idx, off) = self.buf_at(pos as usize / 8);
            let mask = ((1u16 << bitcnt) - 1) << (pos % 8);
            self.bufs[idx][off] & mask as u8 == 0
        } else {
            let (idx, off) = self.buf_at(pos as usize / 8);
            let bytecnt = bitcnt as usize / 8;
            self.bufs[idx][off..off + bytecnt].iter().all(|&b| b == 0)
        }
    }

    /// Set (or clear) an aligned group of bits, writing the change
    /// through to the cached satt.sys cluster.  `Internal` if the group
    /// is not in the expected prior state.
    fn mark<DS: DataStorage>(
        &mut self,
        disk: &mut Disk<DS>,
        pos: u32,
        bitcnt: u32,
        set: bool,
    ) -> Result<()> {
        let (idx, off) = self.buf_at(pos as usize / 8);
        let range = if bitcnt < 8 {
            let mask = (((1u16 << bitcnt) - 1) << (pos % 8)) as u8;
            let b = &mut self.bufs[idx][off];
            match (set, *b & mask) {
                (true, 0) => *b |= mask,
                (false, have) if have == mask => *b &= !mask,
                _ => {
                    error!("allocation bits for pcn {pos} are not in the expected state");
                    return Err(Error::Internal);
                }
            }
            off..off + 1
        } else {
            let bytecnt = bitcnt as usize / 8;
            let bytes = &mut self.bufs[idx][off..off + bytecnt];
            let want = if set { 0 } else { 0xFF };
            if bytes.iter().any(|&b| b != want) {
                error!("allocation bits for pcn {pos} are not in the expected state");
                return Err(Error::Internal);
            }
            bytes.fill(if set { 0xFF } else { 0 });
            off..off + bytecnt
        };
        // Write through, unless the table is still being placed.
        if let Some(&dcn) = self.dcns.get(idx) {
            let clu = disk.read(dcn, self.pcs)?;
            clu.bytes_mut()[range.clone()].copy_from_slice(&self.bufs[idx][range]);
            clu.touch();
        }
        Ok(())
    }

    /// Allocate `count` consecutive free clusters of `clusiz` blocks
    /// (the pack cluster size if zero).  The search starts at the given
    /// DCN, or at the most recent allocation position.  Returns the
    /// starting DCNs; the clusters are entered into the cache zeroed
    /// and dirty.  Wraps to the start of the pack once; `Noroom` when
    /// the pack is full.
    pub fn getclu<DS: DataStorage>(
        &mut self,
        disk: &mut Disk<DS>,
        clusiz: u16,
        count: u32,
        startpos: Option<u16>,
    ) -> Result<Vec<u16>> {
        let clusiz = if clusiz == 0 { self.pcs } else { clusiz };
        let bitcnt = self.checkclu(clusiz)?;
        let mut pos = match startpos {
            Some(dcn) => self.dcntopcn(dcn),
            None => self.sattpos,
        };
        // Align the starting position to a cluster boundary.
        pos = pos / bitcnt * bitcnt;
        let span = count
            .checked_mul(bitcnt)
            .filter(|&s| s <= self.sattsize)
            .ok_or(Error::Noroom)?;
        let mut wrapped = false;
        loop {
            if pos + span > self.sattsize {
                if wrapped {
                    return Err(Error::Noroom);
                }
                wrapped = true;
                pos = 0;
                continue;
            }
            let free = (0..count).all(|i| self.is_free(pos + i * bitcnt, bitcnt));
            if free {
                for i in 0..count {
                    self.mark(disk, pos + i * bitcnt, bitcnt, true)?;
                }
                self.inuse += span;
                self.sattpos = pos;
                let mut ret = Vec::with_capacity(count as usize);
                for i in 0..count {
                    let dcn = self.pcntodcn(pos + i * bitcnt);
                    disk.newclu(dcn, clusiz)?;
                    ret.push(dcn);
                }
                return Ok(ret);
            }
            pos += bitcnt;
        }
    }

    /// Free the cluster starting at the given DCN.  Its cache entry is
    /// invalidated; `Internal` if the bits were not allocated,
    /// `Corrupt` if the DCN is not cluster aligned.
    pub fn retclu<DS: DataStorage>(
        &mut self,
        disk: &mut Disk<DS>,
        dcn: u16,
        clusiz: u16,
    ) -> Result<()> {
        let bitcnt = self.checkclu(clusiz)?;
        let pos = self.dcntopcn_checked(dcn)?;
        if pos % bitcnt != 0 {
            error!("misaligned file cluster: dcn {dcn}");
            return Err(Error::Corrupt);
        }
        if pos + bitcnt > self.sattsize {
            error!("file cluster past end of pack: dcn {dcn}");
            return Err(Error::Corrupt);
        }
        disk.invalidate(dcn)?;
        self.mark(disk, pos, bitcnt, false)?;
        self.inuse -= bitcnt;
        Ok(())
    }

    /// Number of pack clusters the bitmap covers.
    pub fn size(&self) -> u32 {
        self.sattsize
    }

    /// The satt.sys cluster DCNs.
    pub fn dcns(&self) -> &[u16] {
        &self.dcns
    }
}
