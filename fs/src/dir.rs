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

//! RSTS directories.
//!
//! A directory is 1-7 clusters, each block ending in a replicated
//! cluster map (FDCM).  Entries are 16 bytes and addressed by link
//! words.  UFDs (and the RDS0 MFD, which is the [1,1] UFD) chain all
//! their entries off the label; RDS1 GFDs and MFDs additionally carry
//! two index table blocks in their first cluster.
//!
//! A `Dir` here is a lightweight descriptor (DCN list plus geometry);
//! the cluster data stays in the pack's cache and every access goes
//! back through it, which keeps mutations made through one handle
//! visible to all others.

use core::fmt;

use log::error;
use relic_ds::DataStorage;
use relic_err::{Error, Result};
use zerocopy::{little_endian::U16, FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::{
    disk::Disk,
    file::Filedata,
    firqb::Firqb,
    ondisk::{
        Chained, Fdcm, GfdNe, GfdTable, Link, UAttr, UfdLabel, UfdNe, UfdRe, ENT_SIZE, FDCM_OFF,
        FD_NEW, GFD, MFD, UFD, UL_USE, US_UFD,
    },
    rad50::ascname,
    satt::Satt,
    BLKSIZE,
};

/// Structural flavour of a directory: plain linked entries throughout,
/// or the RDS1 GFD/MFD layout whose first cluster reserves blocks 1 and
/// 2 for the child DCN table and the attribute link table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirStyle {
    Ufd,
    Gfd,
}

/// A directory descriptor.
#[derive(Clone, Debug)]
pub struct Dir {
    pub style: DirStyle,
    /// Directory role as its RAD-50 identification word (MFD/GFD/UFD).
    pub kind: u16,
    /// PPN in storage order, `[prog, proj]`.
    pub ppn: [u8; 2],
    /// Starting DCNs of the directory clusters.
    pub dcns: Vec<u16>,
    /// Directory cluster size in blocks.
    pub clusiz: u16,
}

impl Dir {
    /// Construct a directory from its starting DCN: read the first
    /// cluster, discover the real directory cluster size from the FDCM
    /// (re-reading if the initial guess was wrong), then pull in the
    /// remaining clusters named by the map.
    pub fn open<DS: DataStorage>(
        disk: &mut Disk<DS>,
        pcs: u16,
        dcn: u16,
        style: DirStyle,
        kind: u16,
    ) -> Result<Self> {
        let c1 = disk.read(dcn, 0)?;
        let mut cmap: Fdcm = c1.read_obj(FDCM_OFF)?;
        let initial = c1.clusiz();
        let dclus = cmap.uclus as u16;
        // Directories are limited to clustersize 16, so on "large packs"
        // 16 is legal even though it is below the pack cluster size.
        let legal = if pcs > 16 {
            dclus == 16
        } else {
            dclus != 0 && dclus <= 16 && dclus % pcs == 0
        };
        if !legal {
            error!("directory at dcn {dcn} has cluster size {dclus} on a {pcs} block pack");
            return Err(Error::Badclu);
        }
        if dclus != initial {
            // Need to re-read the first cluster with the right size.
            disk.invalidate(dcn)?;
            let c1 = disk.read(dcn, dclus)?;
            cmap = c1.read_obj(FDCM_OFF)?;
        }
        let label: UfdLabel = disk.read(dcn, dclus)?.read_obj(0)?;
        let ppn = if dcn == 1 {
            // The RDS0 MFD's label block is the pack label.
            [1, 1]
        } else {
            label.lppn
        };
        let mut dcns = vec![dcn];
        for c in 1..7 {
            let next = cmap.uent[c].get();
            if next != 0 {
                disk.read(next, dclus)?;
                dcns.push(next);
            }
        }
        Ok(Self {
            style,
            kind,
            ppn,
            dcns,
            clusiz: dclus,
        })
    }

    /// The directory label, re-read from the cache.
    pub fn label<DS: DataStorage>(&self, disk: &mut Disk<DS>) -> Result<UfdLabel> {
        disk.read(self.dcns[0], self.clusiz)?.read_obj(0)
    }

    fn is_table_block(&self, c: usize, b: usize) -> bool {
        self.style == DirStyle::Gfd && c == 0 && (b == 1 || b == 2)
    }

    /// Pack an entry pointer (cluster number, block number, offset in
    /// block) into a link word.
    pub fn pack_link(&self, c: usize, b: usize, off: usize) -> Result<Link> {
        if off == FDCM_OFF
            || off % ENT_SIZE != 0
            || off >= BLKSIZE
            || b >= self.clusiz as usize
            || c >= self.dcns.len()
            || self.is_table_block(c, b)
        {
            return Err(Error::Badlnk);
        }
        Ok(Link::from_raw(((c << 9) | (b << 12) | off) as u16))
    }

    /// Unpack a directory link word into a cluster index and a byte
    /// offset within that cluster.
    pub fn unpack(&self, l: Link) -> Result<(usize, usize)> {
        let c = l.clo();
        let b = l.blo();
        let off = l.eno() << 4;
        if off == FDCM_OFF || b >= self.clusiz as usize || c >= self.dcns.len()
            || self.is_table_block(c, b)
        {
            return Err(Error::Badlnk);
        }
        Ok((c, b * BLKSIZE + off))
    }

    /// Copy the entry the link points at out of the directory.
    pub fn entry<T, DS>(&self, disk: &mut Disk<DS>, l: Link) -> Result<T>
    where
        T: FromBytes + Unaligned,
        DS: DataStorage,
    {
        let (c, off) = self.unpack(l)?;
        disk.read(self.dcns[c], self.clusiz)?.read_obj(off)
    }

    /// Modify the entry the link points at in place and mark its
    /// cluster dirty.
    pub fn with_entry<T, R, DS>(
        &self,
        disk: &mut Disk<DS>,
        l: Link,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R>
    where
        T: FromBytes + IntoBytes + KnownLayout + Immutable + Unaligned,
        DS: DataStorage,
    {
        let (c, off) = self.unpack(l)?;
        let clu = disk.read(self.dcns[c], self.clusiz)?;
        let ret = f(clu.get_mut(off)?);
        clu.touch();
        Ok(ret)
    }

    /// Mark the directory block the link points to as modified.
    pub fn touch_at<DS: DataStorage>(&self, disk: &mut Disk<DS>, l: Link) -> Result<()> {
        let (c, _) = self.unpack(l)?;
        disk.read(self.dcns[c], self.clusiz)?.touch();
        Ok(())
    }

    /// Flatten the retrieval list starting at the given link into DCNs,
    /// keeping zero (unused) slots.
    pub fn readlist<DS: DataStorage>(&self, disk: &mut Disk<DS>, head: Link) -> Result<Vec<u16>> {
        let mut ret = Vec::new();
        let mut walk = Walk::new(head);
        while let Some((_, re)) = walk.next::<UfdRe, DS>(self, disk)? {
            ret.extend(re.uent.iter().map(|e| e.get()));
        }
        Ok(ret)
    }

    /// Flatten the retrieval list starting at the given link into its
    /// non-zero DCNs.
    pub fn readlistnz<DS: DataStorage>(&self, disk: &mut Disk<DS>, head: Link) -> Result<Vec<u16>> {
        Ok(self
            .readlist(disk, head)?
            .into_iter()
            .filter(|&e| e != 0)
            .collect())
    }

    /// Add another cluster to this directory, rewriting the cluster map
    /// replica in every block of every cluster (except the GFD/MFD
    /// table blocks) so they stay in agreement.
    pub fn extend<DS: DataStorage>(&mut self, disk: &mut Disk<DS>, satt: &mut Satt) -> Result<()> {
        if self.dcns.len() == 7 {
            return Err(Error::Noroom);
        }
        let new = satt.getclu(disk, self.clusiz, 1, None)?;
        self.dcns.extend_from_slice(&new);

        let mut map = Fdcm {
            uclus: self.clusiz as u8,
            uflag: if self.style == DirStyle::Gfd { FD_NEW } else { 0 },
            uent: [U16::ZERO; 7],
        };
        for (ent, &dcn) in map.uent.iter_mut().zip(self.dcns.iter()) {
            ent.set(dcn);
        }
        let map = map.as_bytes();

        // First cluster: block 0 plus everything after the table blocks.
        let first = if self.style == DirStyle::Gfd { 3 } else { 1 };
        let clu = disk.read(self.dcns[0], self.clusiz)?;
        clu.bytes_mut()[FDCM_OFF..FDCM_OFF + ENT_SIZE].copy_from_slice(map);
        for b in first..self.clusiz as usize {
            let off = b * BLKSIZE + FDCM_OFF;
            clu.bytes_mut()[off..off + ENT_SIZE].copy_from_slice(map);
        }
        clu.touch();
        // Every block of the other clusters.
        for &dcn in &self.dcns[1..] {
            let clu = disk.read(dcn, self.clusiz)?;
            for b in 0..self.clusiz as usize {
                let off = b * BLKSIZE + FDCM_OFF;
                clu.bytes_mut()[off..off + ENT_SIZE].copy_from_slice(map);
            }
            clu.touch();
        }
        Ok(())
    }

    /// Get a free directory entry, extending the directory if
    /// necessary.  The entry's in-use bit is set so a subsequent call
    /// will not hand out the same slot; it is up to the caller to write
    /// the intended contents, or to free the entry if it turns out not
    /// to be needed after all.
    pub fn getent<DS: DataStorage>(&mut self, disk: &mut Disk<DS>, satt: &mut Satt) -> Result<Link> {
        for c in 0..self.dcns.len() {
            for b in 0..self.clusiz as usize {
                if self.is_table_block(c, b) {
                    continue;
                }
                for off in (0..FDCM_OFF).step_by(ENT_SIZE) {
                    let l = self.pack_link(c, b, off)?;
                    let r: UfdRe = self.entry(disk, l)?;
                    if r.ulnk.raw() == 0 && r.uent[0].get() == 0 {
                        self.with_entry::<UfdRe, _, DS>(disk, l, |r| r.ulnk.set_raw(UL_USE))?;
                        return Ok(l);
                    }
                }
            }
        }
        // No room, extend if possible; the first entry of the new
        // cluster is then available.
        self.extend(disk, satt)?;
        let l = self.pack_link(self.dcns.len() - 1, 0, 0)?;
        self.with_entry::<UfdRe, _, DS>(disk, l, |r| r.ulnk.set_raw(UL_USE))?;
        Ok(l)
    }

    /// Free a directory entry, given its link word.  Only the first two
    /// words are cleared, which is the minimum required; the rest of
    /// the old contents stays in place until the slot is reused.
    pub fn retent<DS: DataStorage>(&self, disk: &mut Disk<DS>, l: Link) -> Result<()> {
        let r: UfdRe = self.entry(disk, l)?;
        if r.ulnk.raw() == 0 && r.uent[0].get() == 0 {
            error!("freeing a directory entry that is already free: {l:?}");
            return Err(Error::Internal);
        }
        self.with_entry::<UfdRe, _, DS>(disk, l, |r| {
            r.ulnk.set_raw(0);
            r.uent[0].set(0);
        })
    }

    /// Number of entries: name entries for a UFD, occupied child table
    /// slots for a GFD/MFD.
    pub fn count<DS: DataStorage>(&self, disk: &mut Disk<DS>) -> Result<usize> {
        match self.style {
            DirStyle::Ufd => {
                let mut n = 0;
                let mut walk = Walk::new(self.label(disk)?.ulnk);
                while walk.next::<UfdNe, DS>(self, disk)?.is_some() {
                    n += 1;
                }
                Ok(n)
            }
            DirStyle::Gfd => {
                let t = self.maptable(disk, false)?;
                Ok(t.ent.iter().filter(|e| e.get() != 0).count())
            }
        }
    }

    /// Find file entries matching the parsed filespec.  Only meaningful
    /// for UFDs; RDS0 account entries in [1,1] are skipped.
    pub fn findfiles<DS: DataStorage>(
        &self,
        disk: &mut Disk<DS>,
        fq: &Firqb,
    ) -> Result<Vec<Filedata>> {
        let pat = ascname(fq.name.unwrap_or([0; 2]), fq.ext.unwrap_or(0));
        let mut found = Vec::new();
        let mut walk = Walk::new(self.label(disk)?.ulnk);
        while let Some((_, ne)) = walk.next::<UfdNe, DS>(self, disk)? {
            if ne.ustat & US_UFD != 0 {
                continue;
            }
            let name = ascname([ne.unam[0].get(), ne.unam[1].get()], ne.unam[2].get());
            if name_match(&pat, &name) {
                found.push(Filedata::file(disk, self.clone(), ne)?);
            }
        }
        Ok(found)
    }

    /// Find account entries matching the PPN in the filespec.  Only
    /// valid on the [1,1] directory of an RDS0 pack, which is the MFD.
    /// `Nosuch` if nothing matched and neither PPN element was wild.
    pub fn finddir_rds0<DS: DataStorage>(
        &self,
        disk: &mut Disk<DS>,
        pcs: u16,
        fq: &Firqb,
    ) -> Result<Vec<Filedata>> {
        if self.kind != MFD {
            return Err(Error::Nosuch);
        }
        let (proj, prog) = (fq.proj, fq.prog);
        let mut found = Vec::new();
        let mut walk = Walk::new(self.label(disk)?.ulnk);
        while let Some((_, ne)) = walk.next::<GfdNe, DS>(self, disk)? {
            if ne.ustat & US_UFD == 0 {
                continue;
            }
            if !(prog == Some(255) || prog == Some(ne.uprog))
                || !(proj == Some(255) || proj == Some(ne.uproj))
            {
                continue;
            }
            let mut dir = if ne.uproj == 1 && ne.uprog == 1 {
                // [1,1] is this directory; don't rebuild it.
                self.clone()
            } else {
                if ne.uar.get() == 0 {
                    // The PPN is defined but the directory was never
                    // allocated; for content purposes it is empty.
                    continue;
                }
                Dir::open(disk, pcs, ne.uar.get(), DirStyle::Ufd, UFD)?
            };
            // On RDS0 the UFD label doesn't necessarily hold the PPN,
            // so supply it from the MFD entry.
            dir.ppn = [ne.uprog, ne.uproj];
            found.push(Filedata::dir(dir));
        }
        if found.is_empty() && prog != Some(255) && proj != Some(255) {
            return Err(Error::Nosuch);
        }
        Ok(found)
    }

    /// Map the child DCN table (or, with `attr`, the attribute link
    /// table) of an RDS1 GFD/MFD.
    pub fn maptable<DS: DataStorage>(&self, disk: &mut Disk<DS>, attr: bool) -> Result<GfdTable> {
        if self.style != DirStyle::Gfd {
            return Err(Error::Badlnk);
        }
        let off = if attr { 2 * BLKSIZE } else { BLKSIZE };
        disk.read(self.dcns[0], self.clusiz)?.read_obj(off)
    }

    /// Find next-level directories matching the filespec: GFDs under an
    /// MFD by project number, UFDs under a GFD by programmer number.
    /// `None` or 255 matches every occupied slot.
    pub fn finddir<DS: DataStorage>(
        &self,
        disk: &mut Disk<DS>,
        pcs: u16,
        fq: &Firqb,
    ) -> Result<Vec<Filedata>> {
        let (p, kind) = if self.kind == MFD {
            (fq.proj, GFD)
        } else {
            (fq.prog, UFD)
        };
        let style = if kind == GFD { DirStyle::Gfd } else { DirStyle::Ufd };
        let t = self.maptable(disk, false)?;
        let mut found = Vec::new();
        match p {
            Some(p) if p != 255 => {
                let e = t.ent[p as usize].get();
                if e != 0 {
                    found.push(Filedata::dir(Dir::open(disk, pcs, e, style, kind)?));
                }
            }
            _ => {
                for ent in &t.ent {
                    let e = ent.get();
                    if e != 0 {
                        found.push(Filedata::dir(Dir::open(disk, pcs, e, style, kind)?));
                    }
                }
            }
        }
        Ok(found)
    }

    /// Look up the attribute blockette chain for the PPN element in the
    /// filespec.  `Nosuch` if the slot is empty.
    pub fn getattr<DS: DataStorage>(&self, disk: &mut Disk<DS>, fq: &Firqb) -> Result<Vec<UAttr>> {
        let p = if self.kind == MFD { fq.proj } else { fq.prog };
        let Some(p) = p.filter(|&p| p <= 254) else {
            return Err(Error::Badfn);
        };
        let t = self.maptable(disk, true)?;
        let e = t.ent[p as usize].get();
        if e == 0 {
            return Err(Error::Nosuch);
        }
        let mut ret = Vec::new();
        let mut walk = Walk::new(Link::from_raw(e));
        while let Some((_, at)) = walk.next::<UAttr, DS>(self, disk)? {
            ret.push(at);
        }
        Ok(ret)
    }
}

impl fmt::Display for Dir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [prog, proj] = self.ppn;
        match (self.style, self.kind) {
            (DirStyle::Gfd, MFD) => write!(f, "[*,*]"),
            (DirStyle::Gfd, _) => write!(f, "[{proj},*]"),
            _ => write!(f, "[{proj},{prog}]"),
        }
    }
}

/// Wildcard match of a decoded `nnnnnn.eee` name against a pattern of
/// the same shape, `?` matching any single character.
fn name_match(pat: &str, name: &str) -> bool {
    pat.len() == name.len()
        && pat
            .bytes()
            .zip(name.bytes())
            .all(|(p, c)| p == b'?' || p == c)
}

/// List walker: chases the leading link word of chained entries until
/// it goes null.  Finite and non-restartable.
pub struct Walk {
    lnk: Link,
    seen: usize,
}

impl Walk {
    pub fn new(head: Link) -> Self {
        Self { lnk: head, seen: 0 }
    }

    pub fn next<T: Chained, DS: DataStorage>(
        &mut self,
        dir: &Dir,
        disk: &mut Disk<DS>,
    ) -> Result<Option<(Link, T)>> {
        if self.lnk.is_null() {
            return Ok(None);
        }
        // A directory holds at most 7 * 16 * 31 entries; a longer chain
        // must be a cycle.
        self.seen += 1;
        if self.seen > 7 * 16 * 31 {
            error!("directory entry chain does not terminate");
            return Err(Error::Corrupt);
        }
        let l = self.lnk;
        let ent: T = dir.entry(disk, l)?;
        self.lnk = ent.next_link();
        Ok(Some((l, ent)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_dir(clusters: usize, clusiz: u16, style: DirStyle) -> Dir {
        Dir {
            style,
            kind: if style == DirStyle::Gfd { MFD } else { UFD },
            ppn: [2, 1],
            dcns: (1..=clusters as u16).collect(),
            clusiz,
        }
    }

    #[test]
    fn link_pack_unpack_round_trip() {
        let dir = test_dir(3, 4, DirStyle::Ufd);
        for c in 0..3 {
            for b in 0..4 {
                for off in (0..FDCM_OFF).step_by(ENT_SIZE) {
                    let l = dir.pack_link(c, b, off).unwrap();
                    assert_eq!(dir.unpack(l).unwrap(), (c, b * BLKSIZE + off));
                }
            }
        }
    }

    #[test]
    fn link_validation() {
        let dir = test_dir(2, 4, DirStyle::Ufd);
        assert_eq!(dir.pack_link(0, 0, FDCM_OFF), Err(Error::Badlnk));
        assert_eq!(dir.pack_link(0, 0, 8), Err(Error::Badlnk));
        assert_eq!(dir.pack_link(0, 4, 0), Err(Error::Badlnk));
        assert_eq!(dir.pack_link(2, 0, 0), Err(Error::Badlnk));

        // GFD/MFD table blocks are not addressable.
        let gfd = test_dir(1, 4, DirStyle::Gfd);
        assert_eq!(gfd.pack_link(0, 1, 0), Err(Error::Badlnk));
        assert_eq!(gfd.pack_link(0, 2, 0), Err(Error::Badlnk));
        assert!(gfd.pack_link(0, 3, 0).is_ok());
    }

    #[test]
    fn entries_never_overlap_fdcm() {
        let dir = test_dir(1, 16, DirStyle::Ufd);
        for b in 0..16 {
            for off in (0..FDCM_OFF).step_by(ENT_SIZE) {
                let l = dir.pack_link(0, b, off).unwrap();
                let (_, boff) = dir.unpack(l).unwrap();
                assert_ne!(boff % BLKSIZE, FDCM_OFF);
            }
        }
    }

    #[test]
    fn name_matching() {
        assert!(name_match("tst   .mac", "tst   .mac"));
        assert!(name_match("??????.mac", "tst   .mac"));
        assert!(name_match("t??   .m?c", "tst   .mac"));
        assert!(!name_match("tst   .mac", "tst   .bak"));
        assert!(!name_match("t     .mac", "tst   .mac"));
    }

    #[test]
    fn getent_retent_round_trip() {
        let ds = crate::testimg::rds12();
        let mut p = crate::pack::Pack::new(&ds, false).unwrap();
        p.mount(false, false).unwrap();
        let mut dir = p
            .lookup(&Firqb::new("[1,2]").unwrap(), true)
            .unwrap()
            .dir;

        let l = p.getent(&mut dir).unwrap();
        let r: UfdRe = dir.entry(p.disk(), l).unwrap();
        assert_eq!(r.ulnk.raw(), UL_USE);
        assert!(r.ulnk.is_null());

        p.retent(&dir, l).unwrap();
        let r: UfdRe = dir.entry(p.disk(), l).unwrap();
        assert_eq!(r.ulnk.raw(), 0);
        assert_eq!(r.uent[0].get(), 0);
        // Freeing twice is a double free.
        assert_eq!(p.retent(&dir, l).err(), Some(Error::Internal));
        // And the slot comes back on the next allocation.
        assert_eq!(p.getent(&mut dir).unwrap(), l);
    }

    #[test]
    fn getent_extends_a_full_directory() {
        let ds = crate::testimg::rds12();
        let mut p = crate::pack::Pack::new(&ds, false).unwrap();
        p.mount(false, false).unwrap();
        let mut dir = p
            .lookup(&Firqb::new("[1,2]").unwrap(), true)
            .unwrap()
            .dir;
        let inuse = p.satt().unwrap().inuse;

        // The single block holds 31 slots, 12 of them taken by the
        // label and the three files' entries.
        for _ in 0..19 {
            p.getent(&mut dir).unwrap();
        }
        assert_eq!(dir.dcns.len(), 1);
        let l = p.getent(&mut dir).unwrap();
        assert_eq!(dir.dcns.len(), 2);
        assert_eq!(l.clo(), 1);
        assert_eq!((l.blo(), l.eno()), (0, 0));
        assert_eq!(p.satt().unwrap().inuse, inuse + 1);

        // The map replicas agree in every block of every cluster.
        for ci in 0..dir.dcns.len() {
            let dcn = dir.dcns[ci];
            let clusiz = dir.clusiz;
            let clu = p.disk().read(dcn, clusiz).unwrap();
            for b in 0..clusiz as usize {
                let map: Fdcm = clu.read_obj(b * BLKSIZE + FDCM_OFF).unwrap();
                assert_eq!(map.uclus as u16, clusiz);
                assert_eq!(map.uent[0].get(), dir.dcns[0]);
                assert_eq!(map.uent[1].get(), dir.dcns[1]);
                assert_eq!(map.uent[2].get(), 0);
            }
        }

    }

    // Extending past 7 clusters fails without touching the satt.
    #[test]
    fn extend_past_seven_clusters() {
        let ds = crate::testimg::rds12();
        let mut p = crate::pack::Pack::new(&ds, false).unwrap();
        p.mount(false, false).unwrap();
        let mut dir = p
            .lookup(&Firqb::new("[1,2]").unwrap(), true)
            .unwrap()
            .dir;
        dir.dcns = vec![dir.dcns[0]; 7];
        assert_eq!(p.extend(&mut dir).err(), Some(Error::Noroom));
    }
}
