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

//! Unix errno values used by the filesystem.
//!
//! Internal functions propagate an [`Errno`] through [`EResult`]. The public
//! entry points of the crate collapse it into the `-1` sentinel; the precise
//! value is reported through the log sink only.

/// Type representing an Unix errno.
pub type Errno = i32;

/// Result type returning an [`Errno`] on failure.
pub type EResult<T> = Result<T, Errno>;

/// Bad file descriptor.
pub const EBADF: Errno = 9;
/// Device or resource busy.
pub const EBUSY: Errno = 16;
/// File exists.
pub const EEXIST: Errno = 17;
/// Invalid argument.
pub const EINVAL: Errno = 22;
/// I/O error.
pub const EIO: Errno = 5;
/// File descriptor value too large.
pub const EMFILE: Errno = 24;
/// Filename too long.
pub const ENAMETOOLONG: Errno = 36;
/// No such device.
pub const ENODEV: Errno = 19;
/// No such file or directory.
pub const ENOENT: Errno = 2;
/// No space left on device.
pub const ENOSPC: Errno = 28;
