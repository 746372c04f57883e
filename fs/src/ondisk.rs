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

//! RSTS file system on-disk layouts, derived from fldef.mac, RSTS V10.1.
//!
//! These records are overlaid on cluster buffers at 16-byte-aligned
//! offsets.  Except for the pack label and the MFD/GFD table block, every
//! record is 16 bytes.  Definitions that apply only for certain disk
//! structure levels are marked accordingly; they apply to the rev level
//! stated and those after it.

use core::fmt;

use zerocopy::{
    little_endian::U16, FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
};

use crate::BLKSIZE;

/// Size of a directory entry.
pub const ENT_SIZE: usize = 0o20;
/// Offset of the directory cluster map within a directory block.
pub const FDCM_OFF: usize = 0o760;

// RAD-50 constants we need.
pub const MFD: u16 = 0o051064; // rad50 "MFD"
pub const GFD: u16 = 0o026264; // rad50 "GFD"
pub const UFD: u16 = 0o102064; // rad50 "UFD"
pub const TMP: u16 = 0o077430; // rad50 "TMP"
pub const STAR: u16 = 0o134745; // rad50 "???"

/// A RSTS directory link word.
///
/// The low four bits are flags; the rest is a three-part address within
/// the owning directory's up-to-7-cluster space: bits 4-8 the entry
/// offset within the block (in 16-byte units), bits 9-11 the cluster
/// offset, bits 12-15 the block offset within the cluster.
#[repr(transparent)]
#[derive(
    Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned,
)]
pub struct Link(U16);

/// On to ensure entry is "in use".
pub const UL_USE: u16 = 0o1;
/// Some bad block exists in file.
pub const UL_BAD: u16 = 0o2;
/// Cache (NE) or sequential (AE).
pub const UL_CHE: u16 = 0o4;
/// Reserved for UU.CLN.
pub const UL_CLN: u16 = 0o10;

impl Link {
    pub const NULL: Link = Link(U16::ZERO);

    pub fn from_raw(raw: u16) -> Self {
        Self(U16::new(raw))
    }

    pub fn raw(&self) -> u16 {
        self.0.get()
    }

    pub fn set_raw(&mut self, raw: u16) {
        self.0.set(raw);
    }

    /// Whether the link is null, i.e. the address fields are all zero.
    /// The flag bits are not included in the test.
    pub fn is_null(&self) -> bool {
        self.0.get() & !0o17 == 0
    }

    /// Entry offset within the block, in 16-byte units.
    pub fn eno(&self) -> usize {
        (self.0.get() as usize >> 4) & 0o37
    }

    /// Cluster offset within the directory.
    pub fn clo(&self) -> usize {
        (self.0.get() as usize >> 9) & 0o7
    }

    /// Block offset within the cluster.
    pub fn blo(&self) -> usize {
        (self.0.get() as usize >> 12) & 0o17
    }

    pub fn flags(&self) -> u16 {
        self.0.get() & 0o17
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.clo(), self.blo(), self.eno())
    }
}

/// A "pdp-11 endian" long integer as used in RMS attributes: two
/// little-endian words, high-order word stored first.
#[repr(C)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct RmsLong([U16; 2]);

impl RmsLong {
    pub fn get(&self) -> u32 {
        (self.0[0].get() as u32) << 16 | self.0[1].get() as u32
    }

    pub fn set(&mut self, value: u32) {
        self.0[0].set((value >> 16) as u16);
        self.0[1].set(value as u16);
    }
}

impl fmt::Debug for RmsLong {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.get().fmt(f)
    }
}

/// Pack label, in the first block of DCN 1.  On RDS 0 this doubles as
/// the label of the [1,1] MFD, whose first cluster starts there; `ulnk`
/// is then the link to the first name entry.
#[repr(C)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct PackLabel {
    /// Link to first name entry if RDS0 structure, otherwise 1.
    pub ulnk: Link,
    /// Reserved (-1).
    pub fill1: U16,
    /// Starting DCN of MFD (RDS1.1).
    pub mdcn: U16,
    /// Pack revision level (two bytes, major << 8 + minor).
    pub plvl: U16,
    /// Pack cluster size.
    pub ppcs: U16,
    /// Pack status/flags.
    pub pstat: U16,
    /// Pack ID, 2 words, RAD50 encoding.
    pub pckid: [U16; 2],
    /// TAP generation-version number (RDS1.1).
    pub tapgvn: [U16; 2],
    /// Date of last TAP full backup (RDS1.1).
    pub bckdat: U16,
    /// Time of last TAP full backup (RDS1.1).
    pub bcktim: U16,
    /// Date of last mount/dismount (RDS1.2).
    pub mntdat: U16,
    /// Time of last mount/dismount (RDS1.2).
    pub mnttim: U16,
    /// Reserved.
    pub fill2: [u8; BLKSIZE - 14 * 2],
}

// Flag bits in the pack label pstat field.
pub const UC_TOP: u16 = 0o001000; // New files first
pub const UC_DLW: u16 = 0o004000; // Maintain date of last write
pub const UC_RO: u16 = 0o010000; // Read-only pack
pub const UC_NEW: u16 = 0o020000; // "New" pack (RDS1.1)
pub const UC_PRI: u16 = 0o040000; // Pack is private/system
pub const UC_MNT: u16 = 0o100000; // Pack is mounted (dirty)

// Rev levels.
pub const RDS0: u16 = 0; // RDS 0 -- V7.x and before
pub const RDS11: u16 = (1 << 8) + 1; // RDS 1.1 -- V8
pub const RDS12: u16 = (1 << 8) + 2; // RDS 1.2 -- V9.0 and beyond

/// MFD label entry.  RDS1.1 and later.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct MfdLabel {
    /// Reserved (0).
    pub fill1: U16,
    /// Reserved (-1).
    pub fill2: U16,
    /// Reserved (0).
    pub fill3: [U16; 3],
    /// Link to pack attributes.
    pub malnk: Link,
    /// PPN, [255,255] for the MFD.
    pub lppn: [u8; 2],
    /// Identification word, "MFD" in RAD50 encoding.
    pub lid: U16,
}

/// Directory cluster map.  Found at the last 8 words of every directory
/// block except for the table blocks in MFD and GFD.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct Fdcm {
    /// Directory clustersize.
    pub uclus: u8,
    /// Flags; high bit set for RDS1 GFD and MFD.
    pub uflag: u8,
    /// The DCNs of the 1-7 directory clusters, or 0 if not used.
    pub uent: [U16; 7],
}

/// Flag bit for GFD/MFD in `Fdcm::uflag` (RDS1.1).
pub const FD_NEW: u8 = 0o200;

/// MFD or GFD table block.  Found in the second and third blocks of MFD
/// and GFD, indexed by group number (for MFD) or user number (GFD).  The
/// second block holds the DCN of the next level directory; the third the
/// link to attributes for this group or user.
#[repr(C)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct GfdTable {
    /// Table entries.
    pub ent: [U16; 255],
    /// Filler.
    pub fill1: U16,
}

/// Block offset of the DCN pointer table in a GFD/MFD first cluster.
pub const GFD_DCN_TBL: usize = 1;
/// Block offset of the attribute link table in a GFD/MFD first cluster.
pub const GFD_ATR_TBL: usize = 2;

/// GFD label entry.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct GfdLabel {
    /// Reserved (0).
    pub fill1: U16,
    /// Reserved (-1).
    pub fill2: U16,
    /// Reserved (0).
    pub fill3: [U16; 4],
    /// PPN, [x,255] for the group x.
    pub lppn: [u8; 2],
    /// Identification word, "GFD" in RAD50 encoding.
    pub lid: U16,
}

/// GFD name entry.  For RDS0 these live in the MFD ([1,1] directory) in a
/// linked list, possibly mixed with files, in the usual UFD fashion.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct GfdNe {
    /// Link to attributes.
    pub ulnk: Link,
    /// Programmer number.
    pub uprog: u8,
    /// Project number.
    pub uproj: u8,
    /// Password.
    pub upass: [U16; 2],
    /// Status byte.
    pub ustat: u8,
    /// Protection code.
    pub uprot: u8,
    /// Access count.
    pub uacnt: U16,
    /// Link to accounting entry.
    pub uaa: Link,
    /// DCN of start of UFD.
    pub uar: U16,
}

/// GFD accounting entry (RDS0 account entries).
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct GfdAe {
    /// Flags.
    pub ulnk: Link,
    /// Accumulated cpu time (LSB).
    pub mcpu: U16,
    /// Accumulated connect time.
    pub mcon: U16,
    /// Accumulated kct's (LSB).
    pub mkct: U16,
    /// Accumulated device time.
    pub mdev: U16,
    /// Accumulated cpu time and kct's (MSB's).
    pub mmsb: U16,
    /// Disk quota.
    pub mdper: U16,
    /// UFD cluster size.
    pub uclus: U16,
}

/// UFD label entry, at offset 0 of the directory's first cluster.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct UfdLabel {
    /// Link to first name entry in the UFD.
    pub ulnk: Link,
    /// Reserved (-1).
    pub fill2: U16,
    /// Reserved (0).
    pub fill3: [U16; 4],
    /// PPN, [x,y] for the UFD [x,y].
    pub lppn: [u8; 2],
    /// Identification word, "UFD" in RAD50 encoding.
    pub lid: U16,
}

/// UFD name entry.  These form a linked list and name the files in a
/// directory.  On RDS0 the [1,1] directory doubles as MFD and also lists
/// accounts; those carry the UFD flag in `ustat` and their `uaa` points
/// to a [`GfdAe`] instead.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct UfdNe {
    /// Link to next name entry.
    pub ulnk: Link,
    /// File name and extension, 3 RAD50 words.  For accounts the first
    /// word is the PPN and the second and third the encoded password.
    pub unam: [U16; 3],
    /// Status byte.
    pub ustat: u8,
    /// Protection code.
    pub uprot: u8,
    /// Access count.
    pub uacnt: U16,
    /// Link to UFD accounting entry.
    pub uaa: Link,
    /// Link to retrieval entries, if the file is not zero length.
    pub uar: Link,
}

/// UFD accounting entry, with the remaining file information.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct UfdAe {
    /// Link to RMS attributes, if present.
    pub ulnk: Link,
    /// Date of last access (more often, date of last write).
    pub udla: U16,
    /// Low order 16 bits of file size.
    pub usiz: U16,
    /// Date of creation.
    pub udc: U16,
    /// Time of creation.
    pub utc: U16,
    /// File's run-time system name in RAD50.  For "large files" the
    /// first word is zero and the second holds the upper size bits.
    pub urts: [U16; 2],
    /// File cluster size.
    pub uclus: U16,
}

/// First RMS attributes blockette.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct UfdRms1 {
    /// Link to second attributes blockette, if needed.
    pub ulnk: Link,
    /// File type (rfm, org, rat).
    pub fa_typ: U16,
    /// Record size.
    pub fa_rsz: U16,
    /// File size in blocks (32 bits).
    pub fa_siz: RmsLong,
    /// EOF block number, 1-based (32 bits).
    pub fa_eof: RmsLong,
    /// EOF byte offset within the EOF block.
    pub fa_eofb: U16,
}

// Fields of fa_typ.
pub const FA_RFM: u16 = 0o000007; // record format field
pub const RF_UDF: u16 = 0; // undefined organization
pub const RF_FIX: u16 = 1; // fixed length records
pub const RF_VAR: u16 = 2; // variable length records
pub const RF_VFC: u16 = 3; // variable with fixed control header
pub const RF_STM: u16 = 4; // stream (cr/lf delimiter)
pub const FA_ORG: u16 = 0o000070; // file organization field
pub const FO_SEQ: u16 = 0o000; // sequential organization
pub const FO_REL: u16 = 0o020; // relative organization
pub const FO_IDX: u16 = 0o040; // indexed organization
pub const FA_RAT: u16 = 0o017400; // record attribute flags
pub const RA_FTN: u16 = 0o000400; // fortran carriage control
pub const RA_IMP: u16 = 0o001000; // implied carriage control
pub const RA_PRN: u16 = 0o002000; // print format
pub const RA_SPN: u16 = 0o004000; // no-span records
pub const RA_EMB: u16 = 0o010000; // embedded

/// Second RMS attributes blockette.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct UfdRms2 {
    /// Link (reserved).
    pub ulnk: Link,
    /// Bucket size.
    pub fa_bkt: u8,
    /// Header size.
    pub fa_hsz: u8,
    /// Max record size.
    pub fa_msz: U16,
    /// Default extension amount.
    pub fa_ext: U16,
    /// Reserved.
    pub filler: [U16; 4],
}

/// MFD/GFD attribute blockette, generic layout.  RDS1.1 and later.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct UAttr {
    /// Link to next, flags.
    pub ulnk: Link,
    /// Attribute type.
    pub uatyp: u8,
    /// Attribute data.
    pub uadat: [u8; 13],
}

// Time of creation flag bits.
pub const UTC_TM: u16 = 0o003777; // bits needed for the time field
pub const UTC_IG: u16 = 0o004000; // IGNORE flag (RDS1.2)
pub const UTC_BK: u16 = 0o010000; // NOBACKUP flag (RDS1.2)

/// UFD retrieval entry.  Points to where the file data lives.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct UfdRe {
    /// Link to next retrieval entry.
    pub ulnk: Link,
    /// The starting DCNs of the next 7 file clusters, zero if not used.
    pub uent: [U16; 7],
}

// Bit assignments in ustat.
pub const US_OUT: u8 = 0o001; // file is 'out of sat' (historical)
pub const US_PLC: u8 = 0o002; // file is "placed"
pub const US_WRT: u8 = 0o004; // write access given out (not on disk)
pub const US_UPD: u8 = 0o010; // open in update mode (not on disk)
pub const US_NOX: u8 = 0o020; // no extending allowed (contiguous)
pub const US_NOK: u8 = 0o040; // no delete and/or rename allowed
pub const US_UFD: u8 = 0o100; // entry is MFD type entry
pub const US_DEL: u8 = 0o200; // file marked for deletion

// Bit assignments in uprot.
pub const UP_RPO: u8 = 0o001; // read protect against owner
pub const UP_WPO: u8 = 0o002; // write protect against owner
pub const UP_RPG: u8 = 0o004; // read protect against group
pub const UP_WPG: u8 = 0o010; // write protect against group
pub const UP_RPW: u8 = 0o020; // read protect against world
pub const UP_WPW: u8 = 0o040; // write protect against world
pub const UP_RUN: u8 = 0o100; // executable file
pub const UP_PRV: u8 = 0o200; // clear on delete, privileged if executable

// Account attribute codes.
pub const AA_QUO: u8 = 1; // quotas
pub const AA_PRV: u8 = 2; // privilege masks
pub const AA_PAS: u8 = 3; // password
pub const AA_DAT: u8 = 4; // date/time recording
pub const AA_NAM: u8 = 5; // user name (RDS1.2)
pub const AA_QT2: u8 = 6; // quotas part 2 (RDS1.2)

/// Disk quota attribute blockette (type 1).
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct UaQuo {
    /// Link to next, flags.
    pub ulnk: Link,
    /// Type.
    pub uatyp: u8,
    /// Detached job quota.
    pub aq_djb: u8,
    /// Logged out quota (LSB).
    pub aq_lol: U16,
    /// Logged in quota (LSB).
    pub aq_lil: U16,
    /// Logged in quota (MSB).
    pub aq_lim: u8,
    /// Logged out quota (MSB).
    pub aq_lom: u8,
    /// Reserved.
    pub aq_rsm: u8,
    /// Current usage (MSB).
    pub aq_crm: u8,
    /// Reserved.
    pub aq_rsl: U16,
    /// Current usage (LSB).
    pub aq_crl: U16,
}

/// Number of privilege bytes.
pub const PRIVSZ: usize = 6;

/// Privilege mask attribute blockette (type 2).
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct UaPrv {
    /// Link to next, flags.
    pub ulnk: Link,
    /// Type.
    pub uatyp: u8,
    /// Filler.
    pub fill1: u8,
    /// Authorized privileges.
    pub ap_prv: [u8; PRIVSZ],
    /// Filler.
    pub fill2: [u8; 0o020 - PRIVSZ - 1 - 3],
}

/// Date/time attribute blockette (type 4).
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct UaDat {
    /// Link to next, flags.
    pub ulnk: Link,
    /// Type.
    pub uatyp: u8,
    /// Keyboard of last login.
    pub at_kb: u8,
    /// Date of last login.
    pub at_lda: U16,
    /// Time of last login.
    pub at_lti: U16,
    /// Date of last password change.
    pub at_pda: U16,
    /// Time of last password change.
    pub at_pti: U16,
    /// Date of creation.
    pub at_cda: U16,
    /// Expiration date (RDS1.2); account creation time on RDS1.1.
    pub at_exp: U16,
}

// Fields within at_lti.
pub const AT_MSK: u16 = 0o003777; // bits needed for the time field
pub const AT_NPW: u16 = 0o004000; // no password required

// Fields within at_pti.
pub const AT_NLK: u16 = 0o004000; // not readable password if set
pub const AT_NDL: u16 = 0o010000; // no-dialups flag
pub const AT_NNT: u16 = 0o020000; // no-network flag
pub const AT_NLG: u16 = 0o040000; // no-login account
pub const AT_CAP: u16 = 0o100000; // captive account

/// Second quota and date/time attribute blockette (type 6).
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct UaQt2 {
    /// Link to next, flags.
    pub ulnk: Link,
    /// Type.
    pub uatyp: u8,
    /// Total job quota.
    pub a2_job: u8,
    /// RIB quota.
    pub a2_rib: U16,
    /// Message limit quota.
    pub a2_msg: U16,
    /// Reserved.
    pub fill1: U16,
    /// Reserved.
    pub fill2: u8,
    /// Password failed count.
    pub a2_pwf: u8,
    /// Date of last non-interactive login.
    pub a2_ndt: U16,
    /// Time of last non-interactive login.
    pub a2_nti: U16,
}

/// Records that chain through a leading link word.
pub trait Chained: FromBytes + IntoBytes + KnownLayout + Immutable + Unaligned {
    fn next_link(&self) -> Link;
}

impl Chained for UfdNe {
    fn next_link(&self) -> Link {
        self.ulnk
    }
}

impl Chained for GfdNe {
    fn next_link(&self) -> Link {
        self.ulnk
    }
}

impl Chained for UfdRe {
    fn next_link(&self) -> Link {
        self.ulnk
    }
}

impl Chained for UAttr {
    fn next_link(&self) -> Link {
        self.ulnk
    }
}

const _: () = {
    assert!(core::mem::size_of::<PackLabel>() == BLKSIZE);
    assert!(core::mem::size_of::<GfdTable>() == BLKSIZE);
    assert!(core::mem::size_of::<MfdLabel>() == ENT_SIZE);
    assert!(core::mem::size_of::<GfdLabel>() == ENT_SIZE);
    assert!(core::mem::size_of::<UfdLabel>() == ENT_SIZE);
    assert!(core::mem::size_of::<Fdcm>() == ENT_SIZE);
    assert!(core::mem::size_of::<GfdNe>() == ENT_SIZE);
    assert!(core::mem::size_of::<GfdAe>() == ENT_SIZE);
    assert!(core::mem::size_of::<UfdNe>() == ENT_SIZE);
    assert!(core::mem::size_of::<UfdAe>() == ENT_SIZE);
    assert!(core::mem::size_of::<UfdRms1>() == ENT_SIZE);
    assert!(core::mem::size_of::<UfdRms2>() == ENT_SIZE);
    assert!(core::mem::size_of::<UAttr>() == ENT_SIZE);
    assert!(core::mem::size_of::<UaQuo>() == ENT_SIZE);
    assert!(core::mem::size_of::<UaPrv>() == ENT_SIZE);
    assert!(core::mem::size_of::<UaDat>() == ENT_SIZE);
    assert!(core::mem::size_of::<UaQt2>() == ENT_SIZE);
    assert!(core::mem::size_of::<UfdRe>() == ENT_SIZE);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_fields() {
        // cluster 3, block 5, entry offset 0o140 (eno 6), use bit set.
        let l = Link::from_raw(3 << 9 | 5 << 12 | 6 << 4 | UL_USE);
        assert_eq!(l.clo(), 3);
        assert_eq!(l.blo(), 5);
        assert_eq!(l.eno(), 6);
        assert_eq!(l.flags(), UL_USE);
        assert!(!l.is_null());
    }

    #[test]
    fn link_null_ignores_flags() {
        assert!(Link::NULL.is_null());
        assert!(Link::from_raw(UL_USE | UL_BAD).is_null());
        assert!(!Link::from_raw(1 << 4).is_null());
    }

    #[test]
    fn rms_long_word_order() {
        // 0x00010002 is stored as hi-word 0x0001 first, each word LE.
        let l = RmsLong::read_from_bytes(&[0x01, 0x00, 0x02, 0x00]).unwrap();
        assert_eq!(l.get(), 0x00010002);

        let mut l = l;
        l.set(0xDEADBEEF);
        assert_eq!(l.get(), 0xDEADBEEF);
        let mut buf = [0u8; 4];
        zerocopy::IntoBytes::write_to(&l, &mut buf[..]).unwrap();
        assert_eq!(buf, [0xAD, 0xDE, 0xEF, 0xBE]);
    }

    #[test]
    fn name_entry_layout() {
        let mut raw = [0u8; 16];
        raw[0] = 0x31; // ulnk
        raw[2] = 0x42; // unam[0] lo
        raw[8] = US_NOK; // ustat
        raw[9] = 60; // uprot
        let ne = UfdNe::read_from_bytes(&raw[..]).unwrap();
        assert_eq!(ne.ulnk.raw(), 0x31);
        assert_eq!(ne.unam[0].get(), 0x42);
        assert_eq!(ne.ustat, US_NOK);
        assert_eq!(ne.uprot, 60);
    }
}
