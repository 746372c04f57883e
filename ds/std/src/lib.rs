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

use std::{fs::File, io::ErrorKind, os::unix::fs::FileExt, path::Path};

use log::error;
use relic_ds::{DataStorage, Error, Result};

/// A container file (or raw block device) on the host file system.
pub struct FileStorage {
    file: File,
    ronly: bool,
}

impl FileStorage {
    /// Open an existing container.  `Nosuch` if the path does not exist.
    pub fn open(path: impl AsRef<Path>, ronly: bool) -> Result<Self> {
        let path = path.as_ref();
        let file = File::options()
            .read(true)
            .write(!ronly)
            .open(path)
            .map_err(|err| {
                error!("open {}: {err}", path.display());
                match err.kind() {
                    ErrorKind::NotFound => Error::Nosuch,
                    _ => Error::Diskio,
                }
            })?;
        Ok(Self { file, ronly })
    }

    /// Create a new container of the given size, in bytes.  Fails if the
    /// path already exists.
    pub fn create(path: impl AsRef<Path>, size: u64) -> Result<Self> {
        let path = path.as_ref();
        let file = File::options()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|err| {
                error!("create {}: {err}", path.display());
                Error::Diskio
            })?;
        file.set_len(size).map_err(|err| {
            error!("extend {}: {err}", path.display());
            Error::Diskio
        })?;
        Ok(Self { file, ronly: false })
    }

    pub fn exists(path: impl AsRef<Path>) -> bool {
        path.as_ref().exists()
    }
}

impl DataStorage for FileStorage {
    fn read(&self, offset: u64, buffer: &mut [u8]) -> Result<()> {
        self.file.read_exact_at(buffer, offset).map_err(|err| {
            error!("read {} bytes at {offset}: {err}", buffer.len());
            match err.kind() {
                ErrorKind::UnexpectedEof => Error::Badblk,
                _ => Error::Diskio,
            }
        })
    }

    fn write(&self, offset: u64, buffer: &[u8]) -> Result<()> {
        if self.ronly {
            return Err(Error::Ropack);
        }
        self.file.write_all_at(buffer, offset).map_err(|err| {
            error!("write {} bytes at {offset}: {err}", buffer.len());
            Error::Diskio
        })
    }

    fn len(&self) -> Result<u64> {
        Ok(self
            .file
            .metadata()
            .map_err(|err| {
                error!("stat: {err}");
                Error::Diskio
            })?
            .len())
    }
}
