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

//! Block-level I/O: device sizing, the cluster buffer, and the
//! write-back cluster cache keyed by starting device cluster number.

use std::collections::HashMap;

use log::{error, warn};
use relic_ds::DataStorage;
use relic_err::{Error, Result};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::BLKSIZE;

/// Geometry of a historical disk type: total block count, the part of it
/// RSTS uses, and whether the last track holds a DEC-166 bad block list.
pub struct Geometry {
    pub name: &'static str,
    pub total: u32,
    pub usable: u32,
    pub dec166: bool,
}

pub const GEOMETRY: &[Geometry] = &[
    Geometry { name: "rx50", total: 800, usable: 800, dec166: false },
    Geometry { name: "rf11", total: 1024, usable: 1024, dec166: false },
    Geometry { name: "rs03", total: 1024, usable: 1024, dec166: false },
    Geometry { name: "rs04", total: 2048, usable: 2048, dec166: false },
    Geometry { name: "rk05", total: 4800, usable: 4800, dec166: false },
    Geometry { name: "rl01", total: 10240, usable: 10220, dec166: true },
    Geometry { name: "rl02", total: 20480, usable: 20460, dec166: true },
    Geometry { name: "rk06", total: 27126, usable: 27104, dec166: true },
    Geometry { name: "rk07", total: 53790, usable: 53768, dec166: true },
    Geometry { name: "rp04", total: 171798, usable: 171796, dec166: false },
    Geometry { name: "rp05", total: 171798, usable: 171796, dec166: false },
    Geometry { name: "rp06", total: 340670, usable: 340664, dec166: false },
    Geometry { name: "rp07", total: 1008000, usable: 1007950, dec166: true },
    Geometry { name: "rm02", total: 131680, usable: 131648, dec166: true },
    Geometry { name: "rm03", total: 131680, usable: 131648, dec166: true },
    Geometry { name: "rm05", total: 500384, usable: 500352, dec166: true },
    Geometry { name: "rm80", total: 251328, usable: 242575, dec166: true },
];

/// Look up a disk type by name, for container creation.
pub fn device_type(name: &str) -> Option<&'static Geometry> {
    GEOMETRY.iter().find(|g| g.name.eq_ignore_ascii_case(name))
}

/// Size in bytes for a new container, given either a block count or a
/// disk type name ("rl02").  `Badfn` for anything else.
pub fn container_size(size_or_type: &str) -> Result<u64> {
    let blocks = match size_or_type.parse::<u32>() {
        Ok(blocks) => blocks,
        Err(_) => match device_type(size_or_type) {
            Some(g) => g.total,
            None => {
                error!("invalid disk size {size_or_type:?}");
                return Err(Error::Badfn);
            }
        },
    };
    Ok(blocks as u64 * BLKSIZE as u64)
}

/// Derive the device cluster size for a usable size in blocks: the
/// smallest power of two that keeps the DCN count within 16 bits.
pub fn getdcs(usable: u32) -> Result<u16> {
    let mut s = usable.saturating_sub(1) >> 16;
    let mut dcs = 1u16;
    while s != 0 {
        s >>= 1;
        dcs <<= 1;
    }
    if dcs > 64 {
        error!("device of {usable} blocks needs cluster size {dcs}");
        return Err(Error::Badclu);
    }
    Ok(dcs)
}

/// Map a container's total block count to its RSTS-usable size, DEC-166
/// flag, and device cluster size.  Sizes not in the geometry table are
/// used as-is.
pub fn rstssize(total: u32) -> Result<(u32, bool, u16)> {
    for g in GEOMETRY {
        if g.total == total {
            return Ok((g.usable, g.dec166, getdcs(g.usable)?));
        }
    }
    Ok((total, false, getdcs(total)?))
}

/// A buffer holding some disk cluster.
pub struct Cluster {
    dcn: u16,
    clusiz: u16,
    data: Vec<u8>,
    dirty: bool,
}

impl Cluster {
    fn new(dcn: u16, clusiz: u16) -> Self {
        Self {
            dcn,
            clusiz,
            data: vec![0; clusiz as usize * BLKSIZE],
            dirty: false,
        }
    }

    pub fn dcn(&self) -> u16 {
        self.dcn
    }

    /// Buffer size in blocks.
    pub fn clusiz(&self) -> u16 {
        self.clusiz
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Mark the buffer as modified, so `flush` writes it back.
    pub fn touch(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Overlay a typed record at the given byte offset.
    pub fn get<T>(&self, off: usize) -> Result<&T>
    where
        T: FromBytes + KnownLayout + Immutable + Unaligned,
    {
        let Some(bytes) = self.data.get(off..off + size_of::<T>()) else {
            error!("record at {off} runs off cluster {}", self.dcn);
            return Err(Error::Internal);
        };
        Ok(T::ref_from_bytes(bytes).unwrap())
    }

    /// Overlay a mutable typed record at the given byte offset.  The
    /// caller still has to `touch` the cluster once it modifies it.
    pub fn get_mut<T>(&mut self, off: usize) -> Result<&mut T>
    where
        T: FromBytes + IntoBytes + KnownLayout + Immutable + Unaligned,
    {
        let dcn = self.dcn;
        let Some(bytes) = self.data.get_mut(off..off + size_of::<T>()) else {
            error!("record at {off} runs off cluster {dcn}");
            return Err(Error::Internal);
        };
        Ok(T::mut_from_bytes(bytes).unwrap())
    }

    /// Copy a typed record out of the buffer.
    pub fn read_obj<T>(&self, off: usize) -> Result<T>
    where
        T: FromBytes + Unaligned,
    {
        let Some(bytes) = self.data.get(off..off + size_of::<T>()) else {
            error!("record at {off} runs off cluster {}", self.dcn);
            return Err(Error::Internal);
        };
        Ok(T::read_from_bytes(bytes).unwrap())
    }
}

/// Block-level access to a container, with a write-back cluster cache.
///
/// The cache is keyed by starting DCN.  Callers that want to re-read a
/// DCN with a different buffer size must `invalidate` first; caching two
/// overlapping extents is an internal error.
pub struct Disk<DS: DataStorage> {
    storage: DS,
    /// The container itself was opened read-only.
    pub ronly: bool,
    /// The mounted pack is read-only (always set when `ronly` is).
    pub ronlypack: bool,
    cache: HashMap<u16, Cluster>,
    /// Total container size in blocks.
    pub tsz: u32,
    /// RSTS-usable size in blocks.
    pub sz: u32,
    /// Device cluster size in blocks.
    pub dcs: u16,
    /// Device reserves a DEC-166 bad block list.
    pub dec166: bool,
}

impl<DS: DataStorage> Disk<DS> {
    pub fn new(storage: DS, ronly: bool) -> Result<Self> {
        let tsz = (storage.len()? / BLKSIZE as u64) as u32;
        let (sz, dec166, dcs) = rstssize(tsz)?;
        Ok(Self {
            storage,
            ronly,
            ronlypack: ronly,
            cache: HashMap::new(),
            tsz,
            sz,
            dec166,
            dcs,
        })
    }

    fn blkoff(&self, dcn: u16) -> Result<u64> {
        let blk = dcn as u32 * self.dcs as u32;
        if blk >= self.tsz {
            error!("dcn {dcn} is beyond the {} block device", self.tsz);
            return Err(Error::Badblk);
        }
        Ok(blk as u64 * BLKSIZE as u64)
    }

    fn check_overlap(&self, dcn: u16, clusiz: u16) -> Result<()> {
        let dcns = (clusiz / self.dcs).max(1);
        for clu in self.cache.values() {
            let cdcns = (clu.clusiz / self.dcs).max(1);
            if dcn < clu.dcn + cdcns && clu.dcn < dcn + dcns {
                error!("block cache conflict: dcn {dcn} overlaps cached dcn {}", clu.dcn);
                return Err(Error::Internal);
            }
        }
        Ok(())
    }

    /// Return the cluster starting at the given DCN, reading it in if it
    /// is not cached.  The buffer covers `clusiz` blocks (the device
    /// cluster size if zero).
    pub fn read(&mut self, dcn: u16, clusiz: u16) -> Result<&mut Cluster> {
        let clusiz = if clusiz == 0 { self.dcs } else { clusiz };
        if clusiz < self.dcs || clusiz > 256 {
            return Err(Error::Badbuf);
        }
        if !self.cache.contains_key(&dcn) {
            self.check_overlap(dcn, clusiz)?;
            let off = self.blkoff(dcn)?;
            let mut clu = Cluster::new(dcn, clusiz);
            // A cluster at the very end of the container may extend past
            // it; the unread tail stays zero.
            let avail = (self.tsz as u64 * BLKSIZE as u64 - off).min(clu.data.len() as u64);
            self.storage.read(off, &mut clu.data[..avail as usize])?;
            self.cache.insert(dcn, clu);
        }
        Ok(self.cache.get_mut(&dcn).unwrap())
    }

    /// Return a zeroed, dirty cluster for the given DCN, avoiding the
    /// read when the contents are about to be overwritten.  Typically
    /// used on newly allocated clusters.
    pub fn newclu(&mut self, dcn: u16, clusiz: u16) -> Result<&mut Cluster> {
        let clusiz = if clusiz == 0 { self.dcs } else { clusiz };
        if clusiz % self.dcs != 0 || clusiz > 256 {
            return Err(Error::Badclu);
        }
        self.blkoff(dcn)?;
        self.invalidate(dcn)?;
        self.check_overlap(dcn, clusiz)?;
        let mut clu = Cluster::new(dcn, clusiz);
        clu.dirty = true;
        self.cache.insert(dcn, clu);
        Ok(self.cache.get_mut(&dcn).unwrap())
    }

    fn flush_clu(
        storage: &DS,
        ronly: bool,
        ronlypack: bool,
        dcs: u16,
        tsz: u32,
        clu: &mut Cluster,
    ) -> Result<()> {
        if !clu.dirty {
            return Ok(());
        }
        if ronly {
            return Err(Error::Ropack);
        }
        if ronlypack {
            warn!("ignoring write on read-only pack, dcn {}", clu.dcn);
            return Ok(());
        }
        let off = clu.dcn as u64 * dcs as u64 * BLKSIZE as u64;
        let avail = (tsz as u64 * BLKSIZE as u64 - off).min(clu.data.len() as u64);
        storage.write(off, &clu.data[..avail as usize])?;
        clu.dirty = false;
        Ok(())
    }

    /// Write back every dirty cluster in the cache.
    pub fn flush(&mut self) -> Result<()> {
        for clu in self.cache.values_mut() {
            Self::flush_clu(&self.storage, self.ronly, self.ronlypack, self.dcs, self.tsz, clu)?;
        }
        Ok(())
    }

    /// Write back a single cluster, if cached and dirty.
    pub fn flush_one(&mut self, dcn: u16) -> Result<()> {
        if let Some(clu) = self.cache.get_mut(&dcn) {
            Self::flush_clu(&self.storage, self.ronly, self.ronlypack, self.dcs, self.tsz, clu)?;
        }
        Ok(())
    }

    /// Flush and drop a single cache entry.
    pub fn invalidate(&mut self, dcn: u16) -> Result<()> {
        if let Some(mut clu) = self.cache.remove(&dcn) {
            Self::flush_clu(&self.storage, self.ronly, self.ronlypack, self.dcs, self.tsz, &mut clu)?;
        }
        Ok(())
    }

    /// Drop the whole cache without writing anything back.
    pub fn invalidate_all(&mut self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relic_ds::MemStorage;

    #[test]
    fn geometry_lookup() {
        let g = device_type("RL02").unwrap();
        assert_eq!(g.usable, 20460);
        assert!(g.dec166);
        assert!(device_type("rz99").is_none());
    }

    #[test]
    fn container_sizing() {
        assert_eq!(container_size("800").unwrap(), 800 * BLKSIZE as u64);
        assert_eq!(container_size("rk05").unwrap(), 4800 * BLKSIZE as u64);
        assert_eq!(container_size("floppy"), Err(Error::Badfn));
    }

    #[test]
    fn dcs_derivation() {
        assert_eq!(getdcs(800).unwrap(), 1);
        assert_eq!(getdcs(65536).unwrap(), 1);
        assert_eq!(getdcs(65537).unwrap(), 2);
        assert_eq!(getdcs(20460).unwrap(), 1);
        assert_eq!(getdcs(500352).unwrap(), 8);
        assert!(getdcs(65536 * 128 + 1).is_err());
    }

    #[test]
    fn cache_read_and_flush() {
        let ds = MemStorage::new(800 * BLKSIZE);
        ds.write(512, b"label here").unwrap();
        let mut disk = Disk::new(ds, false).unwrap();
        assert_eq!(disk.dcs, 1);

        let clu = disk.read(1, 0).unwrap();
        assert_eq!(&clu.bytes()[..10], b"label here");
        clu.bytes_mut()[0] = b'L';
        clu.touch();
        disk.flush().unwrap();

        disk.invalidate(1).unwrap();
        let clu = disk.read(1, 0).unwrap();
        assert_eq!(&clu.bytes()[..10], b"Label here");
    }

    #[test]
    fn bad_dcn_and_bad_sizes() {
        let ds = MemStorage::new(800 * BLKSIZE);
        let mut disk = Disk::new(ds, true).unwrap();
        assert_eq!(disk.read(900, 0).err(), Some(Error::Badblk));
        assert_eq!(disk.read(1, 512).err(), Some(Error::Badbuf));
        assert_eq!(disk.newclu(1, 3).err(), Some(Error::Badclu));
    }

    #[test]
    fn overlap_is_internal() {
        let ds = MemStorage::new(4096 * BLKSIZE);
        let mut disk = Disk::new(ds, true).unwrap();
        disk.read(4, 4).unwrap();
        assert_eq!(disk.read(6, 4).err(), Some(Error::Internal));
        // Same start is a cache hit, not a conflict.
        disk.read(4, 4).unwrap();
    }

    #[test]
    fn ro_container_write_is_ropack() {
        let ds = MemStorage::new(800 * BLKSIZE);
        let mut disk = Disk::new(ds, true).unwrap();
        disk.read(1, 0).unwrap().touch();
        assert_eq!(disk.flush().err(), Some(Error::Ropack));
    }

    #[test]
    fn ro_pack_write_is_skipped() {
        let ds = MemStorage::new(800 * BLKSIZE);
        let mut disk = Disk::new(ds, false).unwrap();
        disk.ronlypack = true;
        let clu = disk.read(1, 0).unwrap();
        clu.bytes_mut()[0] = 0xFF;
        clu.touch();
        disk.flush().unwrap();
        disk.invalidate_all();
        assert_eq!(disk.read(1, 0).unwrap().bytes()[0], 0);
    }
}
