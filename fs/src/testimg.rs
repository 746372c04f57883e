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

//! Synthetic pack images for the test suites: a small RDS 1.2 pack and
//! a small RDS 0 pack, both on an 800 block (rx50) container with
//! device and pack cluster size 1.

use relic_ds::MemStorage;
use zerocopy::{little_endian::U16, FromZeros, Immutable, IntoBytes};

use crate::{
    ondisk::{
        Fdcm, GfdLabel, GfdNe, GfdTable, Link, MfdLabel, PackLabel, UfdAe, UfdLabel, UfdNe,
        UfdRe, UfdRms1, FDCM_OFF, FD_NEW, FO_SEQ, GFD, MFD, RA_SPN, RDS0, RDS12, RF_FIX, RF_VAR,
        UFD, UL_USE, US_UFD,
    },
    rad50::rad50,
    BLKSIZE,
};

pub const BLOCKS: usize = 800;

// RDS 1.2 image layout, all cluster sizes 1 except the 4 block MFD,
// GFDs, and directory clusters as noted.
pub const DCN_LABEL: u16 = 1;
pub const DCN_MFD: u16 = 2; // 4 blocks
pub const DCN_GFD0: u16 = 6; // 4 blocks
pub const DCN_GFD1: u16 = 10; // 4 blocks
pub const DCN_UFD01: u16 = 14;
pub const DCN_UFD12: u16 = 16;
pub const DCN_SATT: u16 = 20;
pub const DCN_HELLO: [u16; 3] = [30, 31, 32];
pub const DCN_RECS: [u16; 2] = [34, 35];
pub const DCN_FIX: [u16; 2] = [37, 38];

/// Offset in hello.txt's last block where the NUL padding begins.
pub const HELLO_PAD_AT: usize = 100;

/// Pack clusters allocated in the RDS 1.2 image (label, directories,
/// satt.sys, file clusters).
pub const RDS12_ALLOC: u32 = 23;

/// Set bits in the RDS 1.2 image's bitmap: the allocations plus the
/// forced tail of the single 512 byte table cluster.
pub const RDS12_INUSE: u32 = RDS12_ALLOC + (BLKSIZE as u32 * 8 - (BLOCKS as u32 - 1));

pub struct ImageBuilder {
    img: Vec<u8>,
}

impl ImageBuilder {
    fn new() -> Self {
        Self {
            img: vec![0; BLOCKS * BLKSIZE],
        }
    }

    fn put<T: IntoBytes + Immutable>(&mut self, blk: u16, off: usize, t: &T) {
        let o = blk as usize * BLKSIZE + off;
        self.img[o..o + t.as_bytes().len()].copy_from_slice(t.as_bytes());
    }

    fn put_bytes(&mut self, blk: u16, off: usize, bytes: &[u8]) {
        let o = blk as usize * BLKSIZE + off;
        self.img[o..o + bytes.len()].copy_from_slice(bytes);
    }

    fn fdcm(&mut self, blk: u16, uclus: u8, gfd: bool, dcns: &[u16]) {
        let mut map = Fdcm::new_zeroed();
        map.uclus = uclus;
        map.uflag = if gfd { FD_NEW } else { 0 };
        for (ent, &dcn) in map.uent.iter_mut().zip(dcns) {
            ent.set(dcn);
        }
        self.put(blk, FDCM_OFF, &map);
    }

    fn satt(&mut self, blk: u16, alloc: &[u16]) {
        let mut bits = vec![0u8; BLKSIZE];
        for &dcn in alloc {
            let pcn = (dcn - 1) as usize;
            bits[pcn / 8] |= 1 << (pcn % 8);
        }
        // Force the tail past the last pack cluster (799 of them here).
        let sattsize = BLOCKS - 1;
        bits[sattsize / 8] |= 0xFFu8 << (sattsize % 8);
        for b in &mut bits[sattsize / 8 + 1..] {
            *b = 0xFF;
        }
        self.put_bytes(blk, 0, &bits);
    }

    fn finish(self) -> MemStorage {
        MemStorage::from_vec(self.img)
    }
}

// Pointer to an entry in cluster 0 (no flags).
fn ptr(b: usize, off: usize) -> Link {
    Link::from_raw(((b << 12) | off) as u16)
}

fn r50(s: &str) -> U16 {
    U16::new(rad50(s).unwrap())
}

fn name3(a: &str, b: &str, e: &str) -> [U16; 3] {
    [r50(a), r50(b), r50(e)]
}

fn ufd_label(first: Option<Link>, ppn: [u8; 2]) -> UfdLabel {
    let mut l = UfdLabel::new_zeroed();
    l.ulnk = first.unwrap_or(Link::NULL);
    l.fill2 = U16::new(0xFFFF);
    l.lppn = ppn;
    l.lid = U16::new(UFD);
    l
}

fn name_entry(next: Option<Link>, nam: [U16; 3], uaa: Link, uar: Link) -> UfdNe {
    let mut ne = UfdNe::new_zeroed();
    ne.ulnk = Link::from_raw(next.map_or(0, |l| l.raw()) | UL_USE);
    ne.unam = nam;
    ne.uprot = 60;
    ne.uaa = uaa;
    ne.uar = uar;
    ne
}

fn acct_entry(rms: Option<Link>, usiz: u16, uclus: u16) -> UfdAe {
    let mut ae = UfdAe::new_zeroed();
    ae.ulnk = Link::from_raw(rms.map_or(0, |l| l.raw()) | UL_USE);
    ae.udla = U16::new(20_100); // 10-Apr-1990
    ae.usiz = U16::new(usiz);
    ae.udc = U16::new(20_100);
    ae.utc = U16::new(720);
    ae.urts = [r50("rst"), r50("s")];
    ae.uclus = U16::new(uclus);
    ae
}

fn ret_entry(dcns: &[u16]) -> UfdRe {
    let mut re = UfdRe::new_zeroed();
    re.ulnk = Link::from_raw(UL_USE);
    for (ent, &dcn) in re.uent.iter_mut().zip(dcns) {
        ent.set(dcn);
    }
    re
}

fn rms1_entry(typ: u16, rsz: u16, siz: u32, eof: u32, eofb: u16) -> UfdRms1 {
    let mut r = UfdRms1::new_zeroed();
    r.ulnk = Link::from_raw(UL_USE);
    r.fa_typ = U16::new(typ);
    r.fa_rsz = U16::new(rsz);
    r.fa_siz.set(siz);
    r.fa_eof.set(eof);
    r.fa_eofb = U16::new(eofb);
    r
}

/// The UFD [0,1] holding satt.sys, shared by both images.
fn build_ufd01(b: &mut ImageBuilder, blk: u16, satt_dcn: u16) {
    b.put(blk, 0, &ufd_label(Some(ptr(0, 16)), [1, 0]));
    b.put(
        blk,
        16,
        &name_entry(None, name3("sat", "t", "sys"), ptr(0, 32), ptr(0, 48)),
    );
    b.put(blk, 32, &acct_entry(None, 1, 1));
    b.put(blk, 48, &ret_entry(&[satt_dcn]));
    b.fdcm(blk, 1, false, &[blk]);
}

/// The UFD [1,2] with the three test files, shared by both images.
fn build_ufd12(b: &mut ImageBuilder, blk: u16) {
    b.put(blk, 0, &ufd_label(Some(ptr(0, 16)), [2, 1]));
    // hello.txt: 3 blocks of text, NUL padded after HELLO_PAD_AT.
    b.put(
        blk,
        16,
        &name_entry(
            Some(ptr(0, 64)),
            name3("hel", "lo", "txt"),
            ptr(0, 32),
            ptr(0, 48),
        ),
    );
    b.put(blk, 32, &acct_entry(None, 3, 1));
    b.put(blk, 48, &ret_entry(&DCN_HELLO));
    // recs.dat: RMS variable length records.
    b.put(
        blk,
        64,
        &name_entry(
            Some(ptr(0, 128)),
            name3("rec", "s", "dat"),
            ptr(0, 80),
            ptr(0, 96),
        ),
    );
    b.put(blk, 80, &acct_entry(Some(ptr(0, 112)), 2, 1));
    b.put(blk, 96, &ret_entry(&DCN_RECS));
    b.put(blk, 112, &rms1_entry(RF_VAR | FO_SEQ, 40, 2, 2, 8));
    // fix.dat: RMS fixed, no-span, 300 byte records.
    b.put(
        blk,
        128,
        &name_entry(None, name3("fix", "", "dat"), ptr(0, 144), ptr(0, 160)),
    );
    b.put(blk, 144, &acct_entry(Some(ptr(0, 176)), 2, 1));
    b.put(blk, 160, &ret_entry(&DCN_FIX));
    b.put(blk, 176, &rms1_entry(RF_FIX | FO_SEQ | RA_SPN, 300, 2, 2, 300));
    b.fdcm(blk, 1, false, &[blk]);
}

fn build_files(b: &mut ImageBuilder) {
    // hello.txt contents: 32 byte CRLF lines (so no CRLF straddles a
    // block boundary), block 3 padded with NULs.
    let mut text = Vec::new();
    let mut n = 0;
    while text.len() < 2 * BLKSIZE + HELLO_PAD_AT {
        n += 1;
        text.extend_from_slice(format!("line number {n:05} of the file.\r\n").as_bytes());
    }
    text.truncate(2 * BLKSIZE + HELLO_PAD_AT);
    b.put_bytes(DCN_HELLO[0], 0, &text[..BLKSIZE]);
    b.put_bytes(DCN_HELLO[1], 0, &text[BLKSIZE..2 * BLKSIZE]);
    b.put_bytes(DCN_HELLO[2], 0, &text[2 * BLKSIZE..]);

    // recs.dat: a 40 byte record, a skip-to-next-block marker, then a
    // 5 byte record in the next block (which is the next cluster).
    let mut rec = vec![40u8, 0];
    rec.extend_from_slice(&[b'A'; 40]);
    rec.extend_from_slice(&[0xFF, 0xFF]);
    b.put_bytes(DCN_RECS[0], 0, &rec);
    b.put_bytes(DCN_RECS[1], 0, &[5, 0]);
    b.put_bytes(DCN_RECS[1], 2, b"world");

    // fix.dat: 300 byte records; the block remainder is dead space the
    // no-span reader must skip.
    b.put_bytes(DCN_FIX[0], 0, &[b'F'; 300]);
    b.put_bytes(DCN_FIX[0], 300, &[b'x'; 212]);
    b.put_bytes(DCN_FIX[1], 0, &[b'G'; 300]);
}

/// An RDS 1.2 pack: MFD with groups 0 and 1, GFDs, [0,1]satt.sys, and
/// the test files in [1,2].
pub fn rds12() -> MemStorage {
    let mut b = ImageBuilder::new();

    let mut pl = PackLabel::new_zeroed();
    pl.ulnk = Link::from_raw(1);
    pl.fill1 = U16::new(0xFFFF);
    pl.mdcn = U16::new(DCN_MFD);
    pl.plvl = U16::new(RDS12);
    pl.ppcs = U16::new(1);
    pl.pckid = [r50("tst"), r50("pak")];
    b.put(DCN_LABEL, 0, &pl);

    // MFD: label, child DCN table, attribute table, plus the map in
    // blocks 0 and 3.
    let mut ml = MfdLabel::new_zeroed();
    ml.fill2 = U16::new(0xFFFF);
    ml.lppn = [255, 255];
    ml.lid = U16::new(MFD);
    b.put(DCN_MFD, 0, &ml);
    let mut t = GfdTable::new_zeroed();
    t.ent[0] = U16::new(DCN_GFD0);
    t.ent[1] = U16::new(DCN_GFD1);
    b.put(DCN_MFD + 1, 0, &t);
    b.fdcm(DCN_MFD, 4, true, &[DCN_MFD]);
    b.fdcm(DCN_MFD + 3, 4, true, &[DCN_MFD]);

    // GFD for group 0: programmer 1 is [0,1].
    let mut gl = GfdLabel::new_zeroed();
    gl.fill2 = U16::new(0xFFFF);
    gl.lppn = [255, 0];
    gl.lid = U16::new(GFD);
    b.put(DCN_GFD0, 0, &gl);
    let mut t = GfdTable::new_zeroed();
    t.ent[1] = U16::new(DCN_UFD01);
    b.put(DCN_GFD0 + 1, 0, &t);
    b.fdcm(DCN_GFD0, 4, true, &[DCN_GFD0]);
    b.fdcm(DCN_GFD0 + 3, 4, true, &[DCN_GFD0]);

    // GFD for group 1: programmer 2 is [1,2].
    let mut gl = GfdLabel::new_zeroed();
    gl.fill2 = U16::new(0xFFFF);
    gl.lppn = [255, 1];
    gl.lid = U16::new(GFD);
    b.put(DCN_GFD1, 0, &gl);
    let mut t = GfdTable::new_zeroed();
    t.ent[2] = U16::new(DCN_UFD12);
    b.put(DCN_GFD1 + 1, 0, &t);
    b.fdcm(DCN_GFD1, 4, true, &[DCN_GFD1]);
    b.fdcm(DCN_GFD1 + 3, 4, true, &[DCN_GFD1]);

    build_ufd01(&mut b, DCN_UFD01, DCN_SATT);
    build_ufd12(&mut b, DCN_UFD12);
    build_files(&mut b);

    let mut alloc: Vec<u16> = vec![DCN_LABEL, DCN_UFD01, DCN_UFD12, DCN_SATT];
    alloc.extend(DCN_MFD..DCN_MFD + 4);
    alloc.extend(DCN_GFD0..DCN_GFD0 + 4);
    alloc.extend(DCN_GFD1..DCN_GFD1 + 4);
    alloc.extend(DCN_HELLO);
    alloc.extend(DCN_RECS);
    alloc.extend(DCN_FIX);
    b.satt(DCN_SATT, &alloc);

    b.finish()
}

// RDS 0 image layout.
pub const R0_UFD01: u16 = 5;
pub const R0_UFD12: u16 = 7;
pub const R0_SATT: u16 = 9;
pub const R0_HI: u16 = 12;

/// An RDS 0 pack: the [1,1] MFD at DCN 1 lists the accounts (and one
/// plain file), [0,1] holds satt.sys, and [1,2] holds hi.txt.
pub fn rds0() -> MemStorage {
    let mut b = ImageBuilder::new();

    // The label block doubles as the MFD label; the name chain hangs
    // off the label link.
    let mut pl = PackLabel::new_zeroed();
    pl.ulnk = Link::from_raw(ptr(0, 48).raw() | UL_USE);
    pl.fill1 = U16::new(0xFFFF);
    pl.plvl = U16::new(RDS0);
    pl.ppcs = U16::new(1);
    pl.pckid = [r50("old"), r50("pak")];
    b.put(DCN_LABEL, 0, &pl);

    // A plain file in [1,1], first in the chain: boot.sys, zero length.
    b.put(
        DCN_LABEL,
        48,
        &name_entry(Some(ptr(0, 96)), name3("boo", "t", "sys"), ptr(0, 64), Link::NULL),
    );
    b.put(DCN_LABEL, 64, &acct_entry(None, 0, 1));

    // Account entries, flagged US_UFD: [1,1] (this directory), [0,1],
    // and [1,2].
    let mut ac = GfdNe::new_zeroed();
    ac.ulnk = Link::from_raw(ptr(0, 112).raw() | UL_USE);
    ac.uprog = 1;
    ac.uproj = 1;
    ac.ustat = US_UFD;
    ac.uar = U16::new(1);
    b.put(DCN_LABEL, 96, &ac);
    let mut ac = GfdNe::new_zeroed();
    ac.ulnk = Link::from_raw(ptr(0, 128).raw() | UL_USE);
    ac.uprog = 1;
    ac.uproj = 0;
    ac.ustat = US_UFD;
    ac.uar = U16::new(R0_UFD01);
    b.put(DCN_LABEL, 112, &ac);
    let mut ac = GfdNe::new_zeroed();
    ac.ulnk = Link::from_raw(UL_USE);
    ac.uprog = 2;
    ac.uproj = 1;
    ac.ustat = US_UFD;
    ac.uar = U16::new(R0_UFD12);
    b.put(DCN_LABEL, 128, &ac);
    b.fdcm(DCN_LABEL, 1, false, &[DCN_LABEL]);

    build_ufd01(&mut b, R0_UFD01, R0_SATT);

    // UFD [1,2] with one small text file.
    b.put(R0_UFD12, 0, &ufd_label(Some(ptr(0, 16)), [2, 1]));
    b.put(
        R0_UFD12,
        16,
        &name_entry(None, name3("hi", "", "txt"), ptr(0, 32), ptr(0, 48)),
    );
    b.put(R0_UFD12, 32, &acct_entry(None, 1, 1));
    b.put(R0_UFD12, 48, &ret_entry(&[R0_HI]));
    b.fdcm(R0_UFD12, 1, false, &[R0_UFD12]);
    b.put_bytes(R0_HI, 0, b"hi\r\n");

    b.satt(R0_SATT, &[DCN_LABEL, R0_UFD01, R0_UFD12, R0_SATT, R0_HI]);

    b.finish()
}
