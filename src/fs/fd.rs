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

//! The open file table.
//!
//! A file descriptor is the index of a handle in the table. A handle pairs a
//! root directory slot with a byte offset into the file's content. The same
//! file may be open several times, each handle keeping its own offset.

use crate::{
	errno::{self, EResult},
	limits::FS_OPEN_MAX_COUNT,
};

/// A handle on an open file.
#[derive(Clone, Copy, Debug)]
pub struct OpenFile {
	/// The slot of the file's directory entry in the root directory.
	pub slot: usize,
	/// The offset at which the next read or write takes place.
	///
	/// The offset never exceeds the file's size.
	pub offset: u32,
}

/// The table of open files, with one slot per file descriptor.
#[derive(Debug, Default)]
pub struct OpenFileTable {
	/// The handles, indexed by file descriptor.
	files: [Option<OpenFile>; FS_OPEN_MAX_COUNT],
}

impl OpenFileTable {
	/// Opens the file whose directory entry lives at root slot `slot`.
	///
	/// The handle takes the lowest free descriptor, with an offset of zero.
	pub fn open(&mut self, slot: usize) -> EResult<usize> {
		let fd = self
			.files
			.iter()
			.position(Option::is_none)
			.ok_or(errno::EMFILE)?;
		self.files[fd] = Some(OpenFile {
			slot,
			offset: 0,
		});
		Ok(fd)
	}

	/// Returns the handle associated with the descriptor `fd`.
	pub fn get(&self, fd: i32) -> EResult<&OpenFile> {
		let fd = usize::try_from(fd).map_err(|_| errno::EBADF)?;
		self.files.get(fd).and_then(Option::as_ref).ok_or(errno::EBADF)
	}

	/// Returns the handle associated with the descriptor `fd`, mutably.
	pub fn get_mut(&mut self, fd: i32) -> EResult<&mut OpenFile> {
		let fd = usize::try_from(fd).map_err(|_| errno::EBADF)?;
		self.files
			.get_mut(fd)
			.and_then(Option::as_mut)
			.ok_or(errno::EBADF)
	}

	/// Releases the descriptor `fd`.
	pub fn close(&mut self, fd: i32) -> EResult<()> {
		self.get(fd)?;
		self.files[fd as usize] = None;
		Ok(())
	}

	/// Tells whether any handle refers to the root slot `slot`.
	pub fn targets(&self, slot: usize) -> bool {
		self.files.iter().flatten().any(|f| f.slot == slot)
	}

	/// Returns the number of open files.
	pub fn count(&self) -> usize {
		self.files.iter().flatten().count()
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn fd_open0() {
		let mut fds = OpenFileTable::default();
		assert_eq!(fds.open(5).unwrap(), 0);
		assert_eq!(fds.open(5).unwrap(), 1);
		assert_eq!(fds.count(), 2);
		let f = fds.get(0).unwrap();
		assert_eq!(f.slot, 5);
		assert_eq!(f.offset, 0);
	}

	#[test]
	fn fd_close_reuse() {
		let mut fds = OpenFileTable::default();
		fds.open(0).unwrap();
		fds.open(1).unwrap();
		fds.open(2).unwrap();
		fds.close(1).unwrap();
		// the lowest free descriptor is handed out again
		assert_eq!(fds.open(3).unwrap(), 1);
	}

	#[test]
	fn fd_exhaust0() {
		let mut fds = OpenFileTable::default();
		for _ in 0..FS_OPEN_MAX_COUNT {
			fds.open(0).unwrap();
		}
		assert_eq!(fds.open(0).unwrap_err(), errno::EMFILE);
	}

	#[test]
	fn fd_invalid0() {
		let mut fds = OpenFileTable::default();
		assert_eq!(fds.get(-1).unwrap_err(), errno::EBADF);
		assert_eq!(fds.get(0).unwrap_err(), errno::EBADF);
		assert_eq!(fds.get(FS_OPEN_MAX_COUNT as i32).unwrap_err(), errno::EBADF);
		assert_eq!(fds.close(0).unwrap_err(), errno::EBADF);
		let fd = fds.open(0).unwrap() as i32;
		fds.close(fd).unwrap();
		assert_eq!(fds.close(fd).unwrap_err(), errno::EBADF);
	}

	#[test]
	fn fd_targets0() {
		let mut fds = OpenFileTable::default();
		let fd = fds.open(7).unwrap() as i32;
		assert!(fds.targets(7));
		assert!(!fds.targets(8));
		fds.close(fd).unwrap();
		assert!(!fds.targets(7));
	}
}
