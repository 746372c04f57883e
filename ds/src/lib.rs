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

pub use relic_err::*;

use std::cell::RefCell;

use log::error;

/// Byte-addressed storage underneath a pack: a container file, a raw
/// device, or a memory buffer.  Offsets and lengths are in bytes; the
/// block/cluster arithmetic lives above this trait.
pub trait DataStorage {
    fn read(&self, offset: u64, buffer: &mut [u8]) -> Result<()>;

    fn write(&self, offset: u64, buffer: &[u8]) -> Result<()>;

    /// Total size of the container in bytes.
    fn len(&self) -> Result<u64>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl<T: DataStorage> DataStorage for &T {
    fn read(&self, offset: u64, buffer: &mut [u8]) -> Result<()> {
        (**self).read(offset, buffer)
    }

    fn write(&self, offset: u64, buffer: &[u8]) -> Result<()> {
        (**self).write(offset, buffer)
    }

    fn len(&self) -> Result<u64> {
        (**self).len()
    }
}

/// In-memory storage, used by the test suites and for scratch images.
pub struct MemStorage(RefCell<Vec<u8>>);

impl MemStorage {
    pub fn new(size: usize) -> Self {
        Self(RefCell::new(vec![0; size]))
    }

    pub fn from_vec(data: Vec<u8>) -> Self {
        Self(RefCell::new(data))
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0.into_inner()
    }
}

impl DataStorage for MemStorage {
    fn read(&self, offset: u64, buffer: &mut [u8]) -> Result<()> {
        let data = self.0.borrow();
        let offset = offset as usize;
        let Some(source) = data.get(offset..offset + buffer.len()) else {
            error!("read of {} bytes at {offset} runs off the image", buffer.len());
            return Err(Error::Badblk);
        };
        buffer.copy_from_slice(source);
        Ok(())
    }

    fn write(&self, offset: u64, buffer: &[u8]) -> Result<()> {
        let mut data = self.0.borrow_mut();
        let offset = offset as usize;
        let Some(target) = data.get_mut(offset..offset + buffer.len()) else {
            error!("write of {} bytes at {offset} runs off the image", buffer.len());
            return Err(Error::Badblk);
        };
        target.copy_from_slice(buffer);
        Ok(())
    }

    fn len(&self) -> Result<u64> {
        Ok(self.0.borrow().len() as u64)
    }
}
