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

//! Read/write access to RSTS/E disk images.
//!
//! A [`pack::Pack`] wraps a [`relic_ds::DataStorage`] container holding a
//! RSTS disk image and exposes its directory hierarchy (MFD/GFD/UFD),
//! file contents and on-disk metadata.  File names are given as RSTS
//! filespecs (`[proj,prog]name.ext/switches`), parsed by [`firqb`].

pub use relic_err::*;

pub mod dir;
pub mod disk;
pub mod file;
pub mod firqb;
pub mod mcs;
pub mod ondisk;
pub mod pack;
pub mod rad50;
pub mod satt;
pub mod time;

#[cfg(test)]
pub(crate) mod testimg;

/// RSTS disk block size in bytes.  All on-disk sizes and addresses are in
/// units of blocks or clusters (power-of-two multiples of a block).
pub const BLKSIZE: usize = 512;

pub use file::Filedata;
pub use firqb::{parse, Firqb};
pub use pack::Pack;
