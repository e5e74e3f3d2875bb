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

//! A mounted volume and the operations on it.
//!
//! Mounting loads the volume's metadata in memory: the superblock (read-only
//! geometry), the FAT and the root directory. File content is never cached:
//! reads and writes translate directly into block transfers, using a
//! block-sized bounce buffer for the partial blocks at both ends of a
//! transfer and moving full interior blocks straight between the caller's
//! buffer and the device.
//!
//! Metadata mutations (FAT and root directory) live in memory until unmount
//! writes them back. Data blocks are written inline, so a crash before
//! unmount loses the metadata that makes them reachable but never corrupts
//! previously flushed state.

pub mod dirent;
pub mod fat;
pub mod fd;
pub mod superblock;

use crate::{
	device::{BlockDevice, BLOCK_SIZE},
	errno::{self, EResult},
	fs::{
		dirent::{validate_name, RootDirectory},
		fat::{Fat, FAT_EOC},
		fd::OpenFileTable,
		superblock::Superblock,
	},
	limits::FS_FILE_MAX_COUNT,
};
use log::debug;
use std::{cmp::min, path::Path};

/// A mounted volume.
///
/// The structure owns the underlying device together with every piece of
/// in-memory metadata. Open file handles are indexes into the structure's own
/// open file table, so they cannot outlive the mount.
#[derive(Debug)]
pub struct FileSystem {
	/// The underlying block device.
	dev: BlockDevice,
	/// The volume's geometry.
	superblock: Superblock,
	/// The block allocator.
	fat: Fat,
	/// The root directory.
	root: RootDirectory,
	/// The open file table.
	fds: OpenFileTable,
}

impl FileSystem {
	/// Mounts the volume stored in the disk image at `path`.
	pub fn mount(path: &Path) -> EResult<Self> {
		let mut dev = BlockDevice::open(path)?;
		let mut blk = [0u8; BLOCK_SIZE];
		dev.read_block(0, &mut blk)?;
		let superblock = Superblock::parse(&blk, dev.block_count())?;
		let fat = Fat::load(&mut dev, &superblock)?;
		let root = RootDirectory::load(&mut dev, &superblock)?;
		Ok(Self {
			dev,
			superblock,
			fat,
			root,
			fds: OpenFileTable::default(),
		})
	}

	/// Returns the number of open files on the volume.
	pub fn open_files(&self) -> usize {
		self.fds.count()
	}

	/// Writes the FAT and the root directory back to the device.
	pub fn flush(&mut self) -> EResult<()> {
		self.fat.flush(&mut self.dev, &self.superblock)?;
		self.root.flush(&mut self.dev, &self.superblock)
	}

	/// Creates the empty file `name` in the root directory.
	pub fn create(&mut self, name: &str) -> EResult<()> {
		let filename = validate_name(name)?;
		if self.root.find(name.as_bytes()).is_some() {
			return Err(errno::EEXIST);
		}
		let slot = self.root.first_empty().ok_or(errno::ENOSPC)?;
		let ent = &mut self.root.entries[slot];
		ent.filename = filename;
		ent.size = 0;
		ent.first_index = FAT_EOC;
		Ok(())
	}

	/// Removes the file `name` from the root directory and releases its data
	/// blocks.
	///
	/// The operation is refused while any handle is open on the file.
	pub fn delete(&mut self, name: &str) -> EResult<()> {
		validate_name(name)?;
		let slot = self.root.find(name.as_bytes()).ok_or(errno::ENOENT)?;
		if self.fds.targets(slot) {
			return Err(errno::EBUSY);
		}
		let first_index = self.root.entries[slot].first_index;
		self.fat.free_chain(first_index);
		self.root.entries[slot].clear();
		Ok(())
	}

	/// Opens the file `name` and returns a descriptor on it.
	pub fn open(&mut self, name: &str) -> EResult<usize> {
		validate_name(name)?;
		let slot = self.root.find(name.as_bytes()).ok_or(errno::ENOENT)?;
		self.fds.open(slot)
	}

	/// Closes the descriptor `fd`.
	pub fn close(&mut self, fd: i32) -> EResult<()> {
		self.fds.close(fd)
	}

	/// Returns the size of the file open at `fd`.
	pub fn stat(&self, fd: i32) -> EResult<u32> {
		let file = self.fds.get(fd)?;
		Ok(self.root.entries[file.slot].size)
	}

	/// Moves the offset of the descriptor `fd` to `offset`.
	///
	/// Seeking exactly to the end of the file is allowed (this is how appends
	/// start); seeking past it is not.
	pub fn lseek(&mut self, fd: i32, offset: u32) -> EResult<()> {
		if offset > self.stat(fd)? {
			return Err(errno::EINVAL);
		}
		self.fds.get_mut(fd)?.offset = offset;
		Ok(())
	}

	/// Prints general information about the mounted volume.
	pub fn info(&self) {
		let sb = &self.superblock;
		println!("FS Info:");
		println!("total_blk_count={}", sb.num_blocks);
		println!("fat_blk_count={}", sb.num_fat_blocks);
		println!("rdir_blk={}", sb.root_index);
		println!("data_blk={}", sb.data_start_index);
		println!("data_blk_count={}", sb.num_data_blocks);
		println!("fat_free_ratio={}/{}", self.fat.count_free(), sb.num_data_blocks);
		println!("rdir_free_ratio={}/{}", self.root.count_free(), FS_FILE_MAX_COUNT);
	}

	/// Prints the list of files on the volume.
	pub fn ls(&self) {
		println!("FS Ls:");
		for ent in self.root.entries.iter().filter(|e| !e.is_empty()) {
			println!(
				"file: {}, size: {}, data_blk: {}",
				String::from_utf8_lossy(ent.name()),
				ent.size,
				ent.first_index
			);
		}
	}

	/// Reads from the file open at `fd` into `buf`, starting at the handle's
	/// current offset.
	///
	/// The function returns the number of bytes read, which is short of
	/// `buf.len()` when the end of the file is reached, and advances the
	/// offset by that amount.
	pub fn read(&mut self, fd: i32, buf: &mut [u8]) -> EResult<usize> {
		let file = *self.fds.get(fd)?;
		let ent = self.root.entries[file.slot];
		// the transfer stops at the end of the file
		let max = min(buf.len(), (ent.size - file.offset) as usize);
		let mut i = 0;
		while i < max {
			let pos = file.offset as usize + i;
			let inner = pos % BLOCK_SIZE;
			let len = min(max - i, BLOCK_SIZE - inner);
			let Some(blk) = self.fat.walk(ent.first_index, (pos / BLOCK_SIZE) as u32) else {
				// the chain ended early: truncate the transfer
				break;
			};
			let index = self.superblock.data_start_index + blk;
			if len == BLOCK_SIZE {
				self.dev.read_block(index, &mut buf[i..i + BLOCK_SIZE])?;
			} else {
				let mut bounce = [0u8; BLOCK_SIZE];
				self.dev.read_block(index, &mut bounce)?;
				buf[i..i + len].copy_from_slice(&bounce[inner..inner + len]);
			}
			i += len;
		}
		self.fds.get_mut(fd)?.offset += i as u32;
		Ok(i)
	}

	/// Writes `buf` to the file open at `fd`, starting at the handle's
	/// current offset.
	///
	/// Missing data blocks are allocated first. When the FAT runs out of free
	/// entries, the write fills exactly the blocks that could be allocated
	/// and returns the resulting short count; running out of space is not an
	/// error. The offset advances by the number of bytes written and the
	/// file's size grows to cover them, but a short write never shrinks it.
	pub fn write(&mut self, fd: i32, buf: &[u8]) -> EResult<usize> {
		let file = *self.fds.get(fd)?;
		if buf.is_empty() {
			return Ok(0);
		}
		let ent = self.root.entries[file.slot];
		let end = file.offset as usize + buf.len();
		// a chain can never count more than `u16::MAX` blocks
		let target_blocks = (end as u64).div_ceil(BLOCK_SIZE as u64).min(u16::MAX as u64) as u32;
		let (first_index, _) = self.fat.extend(ent.first_index, target_blocks);
		// the chain is attached to the entry before any transfer takes place
		self.root.entries[file.slot].first_index = first_index;
		let mut i = 0;
		while i < buf.len() {
			let pos = file.offset as usize + i;
			let inner = pos % BLOCK_SIZE;
			let len = min(buf.len() - i, BLOCK_SIZE - inner);
			let Some(blk) = self.fat.walk(first_index, (pos / BLOCK_SIZE) as u32) else {
				// out of allocated blocks: report the partial transfer
				debug!("write: short write of {i} bytes, no space left on the volume");
				break;
			};
			let index = self.superblock.data_start_index + blk;
			if len == BLOCK_SIZE {
				self.dev.write_block(index, &buf[i..i + BLOCK_SIZE])?;
			} else {
				// read-modify-write of a partial block
				let mut bounce = [0u8; BLOCK_SIZE];
				self.dev.read_block(index, &mut bounce)?;
				bounce[inner..inner + len].copy_from_slice(&buf[i..i + len]);
				self.dev.write_block(index, &bounce)?;
			}
			i += len;
		}
		let ent = &mut self.root.entries[file.slot];
		ent.size = ent.size.max(file.offset + i as u32);
		self.fds.get_mut(fd)?.offset += i as u32;
		Ok(i)
	}
}
