/*
 * Copyright 2024 Luc Lenôtre
 *
 * This file is part of TinyFS.
 *
 * TinyFS is free software: you can redistribute it and/or modify it under the
 * terms of the GNU General Public License as published by the Free Software
 * Foundation, either version 3 of the License, or (at your option) any later
 * version.
 *
 * TinyFS is distributed in the hope that it will be useful, but WITHOUT ANY
 * WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR
 * A PARTICULAR PURPOSE. See the GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License along with
 * TinyFS. If not, see <https://www.gnu.org/licenses/>.
 */

//! Block device gateway.
//!
//! A virtual disk is a regular file whose size is a whole number of blocks.
//! The rest of the filesystem accesses it exclusively through whole-block
//! transfers addressed by block index, so this module is the only place that
//! touches byte offsets on the image.

use crate::errno::{self, EResult};
use log::error;
use std::{
	fs::{File, OpenOptions},
	io::{Read, Seek, SeekFrom, Write},
	path::Path,
};

/// The size of a block on the device, in bytes.
pub const BLOCK_SIZE: usize = 4096;

/// A virtual disk, backed by a regular file.
#[derive(Debug)]
pub struct BlockDevice {
	/// The backing image.
	file: File,
	/// The number of blocks on the device.
	block_count: u16,
}

impl BlockDevice {
	/// Opens the disk image at `path`.
	///
	/// The image's size must be a non-zero multiple of [`BLOCK_SIZE`] and must
	/// not exceed `u16::MAX` blocks.
	pub fn open(path: &Path) -> EResult<Self> {
		let file = OpenOptions::new()
			.read(true)
			.write(true)
			.open(path)
			.map_err(|e| {
				error!("cannot open disk image `{}`: {e}", path.display());
				match e.kind() {
					std::io::ErrorKind::NotFound => errno::ENOENT,
					_ => errno::EIO,
				}
			})?;
		let len = file.metadata().map_err(|_| errno::EIO)?.len();
		if len == 0 || len % BLOCK_SIZE as u64 != 0 {
			error!(
				"disk image `{}`: size {len} is not a multiple of the block size",
				path.display()
			);
			return Err(errno::EINVAL);
		}
		let block_count = len / BLOCK_SIZE as u64;
		if block_count > u16::MAX as u64 {
			error!("disk image `{}`: too many blocks ({block_count})", path.display());
			return Err(errno::EINVAL);
		}
		Ok(Self {
			file,
			block_count: block_count as u16,
		})
	}

	/// Returns the number of blocks on the device.
	pub fn block_count(&self) -> u16 {
		self.block_count
	}

	/// Checks that `index` addresses a block of the device and that `len` is a
	/// whole block.
	fn check_access(&self, index: u16, len: usize) -> EResult<()> {
		if len != BLOCK_SIZE {
			return Err(errno::EINVAL);
		}
		if index >= self.block_count {
			error!("block {index} is out of range for a {} blocks device", self.block_count);
			return Err(errno::EINVAL);
		}
		Ok(())
	}

	/// Reads the block at `index` into `buf`.
	///
	/// `buf` must be exactly [`BLOCK_SIZE`] bytes long.
	pub fn read_block(&mut self, index: u16, buf: &mut [u8]) -> EResult<()> {
		self.check_access(index, buf.len())?;
		let off = index as u64 * BLOCK_SIZE as u64;
		self.file.seek(SeekFrom::Start(off)).map_err(|_| errno::EIO)?;
		self.file.read_exact(buf).map_err(|e| {
			error!("read of block {index} failed: {e}");
			errno::EIO
		})
	}

	/// Writes `buf` to the block at `index`.
	///
	/// `buf` must be exactly [`BLOCK_SIZE`] bytes long.
	pub fn write_block(&mut self, index: u16, buf: &[u8]) -> EResult<()> {
		self.check_access(index, buf.len())?;
		let off = index as u64 * BLOCK_SIZE as u64;
		self.file.seek(SeekFrom::Start(off)).map_err(|_| errno::EIO)?;
		self.file.write_all(buf).map_err(|e| {
			error!("write of block {index} failed: {e}");
			errno::EIO
		})
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn image(blocks: usize) -> tempfile::NamedTempFile {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		file.write_all(&vec![0; blocks * BLOCK_SIZE]).unwrap();
		file
	}

	#[test]
	fn device_open0() {
		let img = image(4);
		let dev = BlockDevice::open(img.path()).unwrap();
		assert_eq!(dev.block_count(), 4);
	}

	#[test]
	fn device_open_truncated() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		file.write_all(&[0; 123]).unwrap();
		assert_eq!(BlockDevice::open(file.path()).unwrap_err(), errno::EINVAL);
	}

	#[test]
	fn device_rw0() {
		let img = image(4);
		let mut dev = BlockDevice::open(img.path()).unwrap();
		let mut blk = [0u8; BLOCK_SIZE];
		blk[0] = 0xab;
		blk[BLOCK_SIZE - 1] = 0xcd;
		dev.write_block(2, &blk).unwrap();
		let mut out = [0u8; BLOCK_SIZE];
		dev.read_block(2, &mut out).unwrap();
		assert_eq!(blk, out);
	}

	#[test]
	fn device_bounds0() {
		let img = image(4);
		let mut dev = BlockDevice::open(img.path()).unwrap();
		let mut blk = [0u8; BLOCK_SIZE];
		assert_eq!(dev.read_block(4, &mut blk), Err(errno::EINVAL));
		assert_eq!(dev.write_block(4, &blk), Err(errno::EINVAL));
		// a partial buffer is not a block
		assert_eq!(dev.read_block(0, &mut blk[..8]), Err(errno::EINVAL));
	}
}
