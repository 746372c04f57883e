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

//! The pack: a container holding a RSTS file structure, and the
//! operations on it.

use log::error;
use relic_ds::DataStorage;
use relic_err::{Error, Result};

use crate::{
    dir::{Dir, DirStyle},
    disk::Disk,
    file::{Filedata, FileStream},
    firqb::Firqb,
    ondisk::{Link, PackLabel, MFD, RDS0, RDS11, RDS12, UC_RO},
    rad50::rad50,
    satt::Satt,
};

pub struct Pack<DS: DataStorage> {
    disk: Disk<DS>,
    mounted: bool,
    label: Option<PackLabel>,
    pcs: u16,
    clurat: u16,
    mfd: Option<Dir>,
    satt: Option<Satt>,
}

impl<DS: DataStorage> Pack<DS> {
    /// Open a container for use as a RSTS pack.  Nothing is read until
    /// `mount`.
    pub fn new(storage: DS, ronly: bool) -> Result<Self> {
        Ok(Self {
            disk: Disk::new(storage, ronly)?,
            mounted: false,
            label: None,
            pcs: 0,
            clurat: 0,
            mfd: None,
            satt: None,
        })
    }

    pub fn disk(&mut self) -> &mut Disk<DS> {
        &mut self.disk
    }

    pub fn label(&self) -> Option<&PackLabel> {
        self.label.as_ref()
    }

    pub fn pcs(&self) -> u16 {
        self.pcs
    }

    pub fn mfd(&self) -> Option<&Dir> {
        self.mfd.as_ref()
    }

    pub fn satt(&self) -> Option<&Satt> {
        self.satt.as_ref()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Mount the pack: read and validate the label, build the MFD for
    /// the pack's revision level, and open the allocation table.
    ///
    /// The pack is mounted read-only unless `ronly` is false; the
    /// read-only flag in the pack label then refuses the mount unless
    /// `override_ro` is set.  A read/write mount is flagged mounted and
    /// should be dismounted with `umount` when done.
    pub fn mount(&mut self, ronly: bool, override_ro: bool) -> Result<()> {
        if self.disk.ronly && !ronly {
            error!("attempt to mount read/write on a read-only container");
            return Err(Error::Internal);
        }
        if self.mounted {
            return Ok(());
        }
        let mut pl: PackLabel = self.disk.read(1, 0)?.read_obj(0)?;
        let ppcs = pl.ppcs.get();
        if ppcs < self.disk.dcs || !ppcs.is_power_of_two() || ppcs > 64 {
            error!("pack cluster size {ppcs} is not valid here");
            return Err(Error::Corrupt);
        }
        if pl.pstat.get() & UC_RO != 0 && !ronly && !override_ro {
            return Err(Error::Ropack);
        }
        self.disk.ronlypack = ronly;
        self.clurat = ppcs / self.disk.dcs;
        self.pcs = ppcs;
        let mfd = match pl.plvl.get() {
            RDS0 => {
                let mfd = Dir::open(&mut self.disk, ppcs, 1, DirStyle::Ufd, MFD)?;
                // Opening the MFD re-read its first cluster, which is
                // also the label block; refresh our copy.
                pl = self.disk.read(1, mfd.clusiz)?.read_obj(0)?;
                mfd
            }
            RDS11 | RDS12 => {
                Dir::open(&mut self.disk, ppcs, pl.mdcn.get(), DirStyle::Gfd, MFD)?
            }
            plvl => {
                error!("unknown pack revision level {plvl:#o}");
                return Err(Error::Corrupt);
            }
        };
        self.label = Some(pl);
        self.mfd = Some(mfd);
        let sattfd = self.lookup(&Firqb::new("[0,1]satt.sys")?, false)?;
        let uclus = sattfd.ae.map(|ae| ae.uclus.get()).unwrap_or(0);
        self.satt = Some(Satt::open(
            &mut self.disk,
            self.pcs,
            self.clurat,
            &sattfd.rlist,
            uclus,
        )?);
        if !ronly {
            self.mounted = true;
        }
        Ok(())
    }

    /// Dismount the pack, flushing everything the cache still holds.
    pub fn umount(&mut self) -> Result<()> {
        if self.mounted {
            self.disk.flush()?;
            self.mounted = false;
            self.label = None;
            self.mfd = None;
            self.satt = None;
            self.pcs = 0;
            self.clurat = 0;
        }
        Ok(())
    }

    /// (Re)initialize the pack: validate the parameters, establish the
    /// pack geometry, and build a fresh allocation table.  If the
    /// container already holds something mountable, `force` must be
    /// set.
    ///
    /// TODO: write the pack label and the root directories, so the
    /// result mounts; only the allocation table is laid down so far.
    pub fn initialize(&mut self, packid: &str, force: bool, pcs: u16, plevel: u16) -> Result<()> {
        if self.mounted {
            error!("attempt to initialize a mounted disk");
            return Err(Error::Internal);
        }
        if self.disk.ronly {
            return Err(Error::Ropack);
        }
        let mut force = force;
        match self.mount(true, false) {
            Ok(()) => {
                self.umount()?;
            }
            Err(_) => force = true,
        }
        if !force {
            error!("attempt to reinitialize a pack without force");
            return Err(Error::Internal);
        }
        if pcs < self.disk.dcs || !pcs.is_power_of_two() || pcs > 64 {
            return Err(Error::Badclu);
        }
        if packid.contains('?') || !packid.is_ascii() {
            error!("invalid pack label {packid:?}");
            return Err(Error::Badfn);
        }
        let _id = [
            rad50(&packid[..packid.len().min(3)])?,
            rad50(&packid[packid.len().min(3)..packid.len().min(6)])?,
        ];
        if !matches!(plevel, RDS0 | RDS11 | RDS12) {
            error!("invalid pack revision level {plevel:#o}");
            return Err(Error::Badpak);
        }
        self.pcs = pcs;
        self.clurat = pcs / self.disk.dcs;
        self.label = None;
        self.mfd = None;
        self.satt = None;
        self.disk.invalidate_all();
        self.disk.ronlypack = false;
        self.satt = Some(Satt::format(&mut self.disk, pcs, self.clurat)?);
        self.disk.flush()
    }

    pub fn pcntodcn(&self, pcn: u32) -> u16 {
        (pcn * self.clurat as u32 + 1) as u16
    }

    pub fn dcntopcn(&self, dcn: u16) -> u32 {
        (dcn as u32 - 1) / self.clurat as u32
    }

    /// Allocate clusters through the allocation table; see
    /// [`Satt::getclu`].
    pub fn getclu(&mut self, clusiz: u16, count: u32, startpos: Option<u16>) -> Result<Vec<u16>> {
        let satt = self.satt.as_mut().ok_or(Error::Internal)?;
        satt.getclu(&mut self.disk, clusiz, count, startpos)
    }

    /// Free a cluster; see [`Satt::retclu`].
    pub fn retclu(&mut self, dcn: u16, clusiz: u16) -> Result<()> {
        let satt = self.satt.as_mut().ok_or(Error::Internal)?;
        satt.retclu(&mut self.disk, dcn, clusiz)
    }

    /// Allocate a directory entry; see [`Dir::getent`].
    pub fn getent(&mut self, dir: &mut Dir) -> Result<Link> {
        let satt = self.satt.as_mut().ok_or(Error::Internal)?;
        dir.getent(&mut self.disk, satt)
    }

    /// Free a directory entry; see [`Dir::retent`].
    pub fn retent(&mut self, dir: &Dir, l: Link) -> Result<()> {
        dir.retent(&mut self.disk, l)
    }

    /// Grow a directory by one cluster; see [`Dir::extend`].
    pub fn extend(&mut self, dir: &mut Dir) -> Result<()> {
        let satt = self.satt.as_mut().ok_or(Error::Internal)?;
        dir.extend(&mut self.disk, satt)
    }

    fn plvl(&self) -> u16 {
        self.label.as_ref().map(|l| l.plvl.get()).unwrap_or(RDS12)
    }

    /// Look up a single entry by filespec.  The spec must not be wild.
    /// With `dirok`, a null name resolves to the MFD, a GFD, or a UFD
    /// depending on which PPN elements are present; otherwise only
    /// files are found.
    pub fn lookup(&mut self, f: &Firqb, dirok: bool) -> Result<Filedata> {
        if !f.wild.is_empty() {
            return Err(Error::Badfn);
        }
        let mfd = self.mfd.clone().ok_or(Error::Internal)?;
        if f.name.is_none() {
            // Looking for a directory; find out what kind.
            if !dirok {
                return Err(Error::Nosuch);
            }
            if f.proj.is_none() {
                return Ok(Filedata::dir(mfd));
            }
            if f.prog.is_none() {
                // A GFD.  On RDS0 there is no such thing; return the
                // MFD, but only if there is a matching project number.
                if self.plvl() == RDS0 {
                    let mut f = f.clone();
                    f.prog = Some(255);
                    let found = mfd.finddir_rds0(&mut self.disk, self.pcs, &f)?;
                    if found.is_empty() {
                        return Err(Error::Nosuch);
                    }
                    return Ok(Filedata::dir(mfd));
                }
                return mfd
                    .finddir(&mut self.disk, self.pcs, f)?
                    .into_iter()
                    .next()
                    .ok_or(Error::Nosuch);
            }
            return self.findufd(f);
        }
        // A file: find the UFD first, then look inside it.
        let ufd = self.findufd(f)?;
        ufd.dir
            .findfiles(&mut self.disk, f)?
            .into_iter()
            .next()
            .ok_or(Error::Nosuch)
    }

    /// All UFDs matched by the filespec's PPN, which must have both
    /// elements present (literal or wildcard).  No match is an empty
    /// result, not an error, when the PPN is wild.
    pub fn findufds(&mut self, f: &Firqb) -> Result<Vec<Filedata>> {
        if f.proj.is_none() || f.prog.is_none() {
            return Err(Error::Badfn);
        }
        let mfd = self.mfd.clone().ok_or(Error::Internal)?;
        if self.plvl() == RDS0 {
            // The MFD doubles as the account list.
            return mfd.finddir_rds0(&mut self.disk, self.pcs, f);
        }
        let mut found = Vec::new();
        for gfd in mfd.finddir(&mut self.disk, self.pcs, f)? {
            found.extend(gfd.dir.finddir(&mut self.disk, self.pcs, f)?);
        }
        Ok(found)
    }

    /// The single UFD named by the filespec.  `Nosuch` if absent,
    /// `Badfn` if the spec is wild.
    pub fn findufd(&mut self, f: &Firqb) -> Result<Filedata> {
        if !f.wild.is_empty() {
            return Err(Error::Badfn);
        }
        self.findufds(f)?.into_iter().next().ok_or(Error::Nosuch)
    }

    /// Look up a file and open a stream over it.  Mode as in
    /// [`Filedata::open`].
    pub fn open(&mut self, spec: &str, mode: &str) -> Result<FileStream<'_, DS>> {
        let f = Firqb::new(spec)?;
        let fd = self.lookup(&f, false)?;
        fd.open(&mut self.disk, mode)
    }
}

impl<DS: DataStorage> Drop for Pack<DS> {
    fn drop(&mut self) {
        // Scope exit flushes like an explicit umount would.
        if self.mounted {
            if let Err(err) = self.disk.flush() {
                error!("flush while dropping pack: {err}");
            }
        }
    }
}
