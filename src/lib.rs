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

//! TinyFS is a minimal FAT-like filesystem living in a virtual disk: a
//! regular file accessed as an array of 4096-byte blocks.
//!
//! A volume is divided into consecutive areas:
//! - the superblock, in block `0`, describing the volume's geometry
//! - the File Allocation Table (FAT), starting at block `1`, with one 16-bit
//!   entry per data block
//! - the root directory, a single block of 128 entries of 32 bytes each
//! - the data blocks
//!
//! A file's content is a chain of data blocks linked through the FAT, starting
//! at the block recorded in the file's directory entry. The filesystem is
//! flat: there is no directory other than the root, and no metadata beyond a
//! name and a size.
//!
//! This crate exposes a POSIX-flavored, in-process API as free functions
//! operating on a process-wide mounted volume; at most one volume is mounted
//! at a time. Every function returns an integer status where `-1` reports a
//! failure; diagnostics are emitted through the `log` facade. Hosts that
//! prefer typed errors can use [`fs::FileSystem`] directly.
//!
//! Access to the mounted volume is serialized by a mutex, but no operation
//! suspends and the library offers no further concurrency guarantee.
//!
//! Writes reach data blocks immediately; the FAT and the root directory are
//! only written back by [`unmount`]. A caller that needs its metadata durable
//! must unmount.

pub mod device;
pub mod errno;
pub mod fs;
pub mod limits;

pub use device::BLOCK_SIZE;
pub use limits::{FS_FILENAME_LEN, FS_FILE_MAX_COUNT, FS_OPEN_MAX_COUNT};

use crate::{errno::EResult, fs::FileSystem};
use log::error;
use std::{
	path::Path,
	sync::{Mutex, MutexGuard, PoisonError},
};

/// The currently mounted volume, if any.
static MOUNTED: Mutex<Option<FileSystem>> = Mutex::new(None);

/// Locks and returns the mounted volume state.
fn state() -> MutexGuard<'static, Option<FileSystem>> {
	MOUNTED.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs `op` on the mounted volume, failing if none is mounted.
fn with_fs<T>(op: impl FnOnce(&mut FileSystem) -> EResult<T>) -> EResult<T> {
	let mut state = state();
	let fs = state.as_mut().ok_or(errno::ENODEV)?;
	op(fs)
}

/// Collapses a result into the API's integer status.
fn status(res: EResult<()>) -> i32 {
	match res {
		Ok(()) => 0,
		Err(_) => -1,
	}
}

/// Mounts the volume stored in the disk image at `path`.
///
/// Returns `0` on success, or `-1` if the image cannot be opened, is not a
/// valid volume, or a volume is already mounted.
pub fn mount<P: AsRef<Path>>(path: P) -> i32 {
	let mut state = state();
	if state.is_some() {
		error!("mount: a volume is already mounted");
		return -1;
	}
	match FileSystem::mount(path.as_ref()) {
		Ok(fs) => {
			*state = Some(fs);
			0
		}
		Err(_) => -1,
	}
}

/// Unmounts the mounted volume, writing the FAT and the root directory back
/// to the disk image.
///
/// Returns `0` on success, or `-1` if no volume is mounted, files are still
/// open, or writing the metadata back fails.
pub fn unmount() -> i32 {
	let mut state = state();
	let Some(fs) = state.as_mut() else {
		error!("unmount: no volume is mounted");
		return -1;
	};
	if fs.open_files() > 0 {
		error!("unmount: {} file(s) still open", fs.open_files());
		return -1;
	}
	if fs.flush().is_err() {
		return -1;
	}
	// drops the volume, closing the device
	*state = None;
	0
}

/// Prints general information about the mounted volume.
pub fn info() -> i32 {
	status(with_fs(|fs| {
		fs.info();
		Ok(())
	}))
}

/// Creates the empty file `name`.
pub fn create(name: &str) -> i32 {
	status(with_fs(|fs| fs.create(name)))
}

/// Deletes the file `name`, releasing its data blocks.
///
/// Fails if any descriptor is open on the file.
pub fn delete(name: &str) -> i32 {
	status(with_fs(|fs| fs.delete(name)))
}

/// Prints the list of files on the mounted volume.
pub fn ls() -> i32 {
	status(with_fs(|fs| {
		fs.ls();
		Ok(())
	}))
}

/// Opens the file `name` and returns a descriptor on it, or `-1` on failure.
///
/// Each descriptor carries its own offset, initially `0`.
pub fn open(name: &str) -> i32 {
	match with_fs(|fs| fs.open(name)) {
		Ok(fd) => fd as i32,
		Err(_) => -1,
	}
}

/// Closes the descriptor `fd`.
pub fn close(fd: i32) -> i32 {
	status(with_fs(|fs| fs.close(fd)))
}

/// Returns the size of the file open at `fd`, or `-1` on failure.
pub fn stat(fd: i32) -> i32 {
	match with_fs(|fs| fs.stat(fd)) {
		Ok(size) => size as i32,
		Err(_) => -1,
	}
}

/// Moves the offset of the descriptor `fd` to `offset`.
///
/// Fails if `offset` exceeds the file's size.
pub fn lseek(fd: i32, offset: u32) -> i32 {
	status(with_fs(|fs| fs.lseek(fd, offset)))
}

/// Reads from the file open at `fd` into `buf`, starting at the descriptor's
/// offset.
///
/// Returns the number of bytes read, which is less than `buf.len()` when the
/// end of the file is reached, or `-1` on failure.
pub fn read(fd: i32, buf: &mut [u8]) -> i32 {
	match with_fs(|fs| fs.read(fd, buf)) {
		Ok(n) => n as i32,
		Err(_) => -1,
	}
}

/// Writes `buf` to the file open at `fd`, starting at the descriptor's
/// offset.
///
/// Returns the number of bytes written, which may be less than `buf.len()`
/// when the volume runs out of free blocks, or `-1` on failure.
pub fn write(fd: i32, buf: &[u8]) -> i32 {
	match with_fs(|fs| fs.write(fd, buf)) {
		Ok(n) => n as i32,
		Err(_) => -1,
	}
}
