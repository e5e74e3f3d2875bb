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

//! The superblock is the first block of the volume. It describes the volume's
//! geometry:
//! - the FAT spans blocks `1..=num_fat_blocks`
//! - the root directory occupies the block at `root_index`
//! - data blocks span `data_start_index..data_start_index + num_data_blocks`
//!
//! Every multi-byte field is stored little-endian. The block is padded with
//! zeros up to the block size.

use crate::{
	device::BLOCK_SIZE,
	errno::{self, EResult},
};
use log::error;

/// The volume's signature, located at the beginning of the superblock.
pub const SIGNATURE: [u8; 8] = *b"TINYFS01";

/// The offset of the first padding byte in the superblock.
const PADDING_OFFSET: usize = 17;

/// The volume's geometry, parsed from block `0` at mount time.
///
/// The geometry of a volume never changes, so the structure is read-only once
/// mounted and is not written back on unmount.
#[derive(Clone, Debug)]
pub struct Superblock {
	/// The total number of blocks on the volume.
	pub num_blocks: u16,
	/// The index of the block containing the root directory.
	pub root_index: u16,
	/// The index of the first data block.
	pub data_start_index: u16,
	/// The number of data blocks.
	pub num_data_blocks: u16,
	/// The number of blocks occupied by the FAT.
	pub num_fat_blocks: u8,
}

impl Superblock {
	/// Parses and validates the superblock from the raw block `blk`.
	///
	/// `device_blocks` is the number of blocks reported by the underlying
	/// device, which the superblock must agree with.
	pub fn parse(blk: &[u8; BLOCK_SIZE], device_blocks: u16) -> EResult<Self> {
		if blk[..8] != SIGNATURE {
			error!("superblock: invalid signature");
			return Err(errno::EINVAL);
		}
		let sb = Self {
			num_blocks: u16::from_le_bytes([blk[8], blk[9]]),
			root_index: u16::from_le_bytes([blk[10], blk[11]]),
			data_start_index: u16::from_le_bytes([blk[12], blk[13]]),
			num_data_blocks: u16::from_le_bytes([blk[14], blk[15]]),
			num_fat_blocks: blk[16],
		};
		if sb.num_blocks != device_blocks {
			error!(
				"superblock: block count mismatch (superblock: {}, device: {device_blocks})",
				sb.num_blocks
			);
			return Err(errno::EINVAL);
		}
		if sb.root_index == 0 || sb.data_start_index == 0 {
			error!("superblock: root or data area overlaps the superblock");
			return Err(errno::EINVAL);
		}
		if sb.root_index == sb.data_start_index {
			error!("superblock: root directory and data area overlap");
			return Err(errno::EINVAL);
		}
		if sb.num_data_blocks >= sb.num_blocks || sb.num_fat_blocks as u16 >= sb.num_blocks {
			error!("superblock: FAT or data area larger than the volume");
			return Err(errno::EINVAL);
		}
		if sb.root_index >= sb.num_blocks
			|| sb.data_start_index as u32 + sb.num_data_blocks as u32 > sb.num_blocks as u32
		{
			error!("superblock: root or data area out of the volume's bounds");
			return Err(errno::EINVAL);
		}
		// The FAT must have room for one entry per data block
		if (sb.num_fat_blocks as usize) * BLOCK_SIZE < sb.num_data_blocks as usize * 2 {
			error!("superblock: FAT too small for {} data blocks", sb.num_data_blocks);
			return Err(errno::EINVAL);
		}
		if blk[PADDING_OFFSET..].iter().any(|b| *b != 0) {
			error!("superblock: non-zero padding");
			return Err(errno::EINVAL);
		}
		Ok(sb)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	/// Returns the raw superblock of a volume with 8 data blocks.
	fn raw() -> [u8; BLOCK_SIZE] {
		let mut blk = [0u8; BLOCK_SIZE];
		blk[..8].copy_from_slice(&SIGNATURE);
		blk[8..10].copy_from_slice(&11u16.to_le_bytes()); // num_blocks
		blk[10..12].copy_from_slice(&2u16.to_le_bytes()); // root_index
		blk[12..14].copy_from_slice(&3u16.to_le_bytes()); // data_start_index
		blk[14..16].copy_from_slice(&8u16.to_le_bytes()); // num_data_blocks
		blk[16] = 1; // num_fat_blocks
		blk
	}

	#[test]
	fn superblock_parse0() {
		let sb = Superblock::parse(&raw(), 11).unwrap();
		assert_eq!(sb.num_blocks, 11);
		assert_eq!(sb.root_index, 2);
		assert_eq!(sb.data_start_index, 3);
		assert_eq!(sb.num_data_blocks, 8);
		assert_eq!(sb.num_fat_blocks, 1);
	}

	#[test]
	fn superblock_bad_signature() {
		let mut blk = raw();
		blk[0] = b'x';
		assert_eq!(Superblock::parse(&blk, 11).unwrap_err(), errno::EINVAL);
	}

	#[test]
	fn superblock_count_mismatch() {
		assert_eq!(Superblock::parse(&raw(), 12).unwrap_err(), errno::EINVAL);
	}

	#[test]
	fn superblock_zero_indexes() {
		let mut blk = raw();
		blk[10..12].copy_from_slice(&0u16.to_le_bytes());
		assert_eq!(Superblock::parse(&blk, 11).unwrap_err(), errno::EINVAL);
		let mut blk = raw();
		blk[12..14].copy_from_slice(&0u16.to_le_bytes());
		assert_eq!(Superblock::parse(&blk, 11).unwrap_err(), errno::EINVAL);
	}

	#[test]
	fn superblock_overlapping_areas() {
		let mut blk = raw();
		blk[12..14].copy_from_slice(&2u16.to_le_bytes());
		assert_eq!(Superblock::parse(&blk, 11).unwrap_err(), errno::EINVAL);
	}

	#[test]
	fn superblock_out_of_bounds() {
		// more data blocks than the volume holds
		let mut blk = raw();
		blk[14..16].copy_from_slice(&9u16.to_le_bytes());
		assert_eq!(Superblock::parse(&blk, 11).unwrap_err(), errno::EINVAL);
	}

	#[test]
	fn superblock_fat_too_small() {
		// 4096 data blocks need two FAT blocks
		let mut blk = raw();
		blk[8..10].copy_from_slice(&5000u16.to_le_bytes());
		blk[14..16].copy_from_slice(&4096u16.to_le_bytes());
		assert_eq!(Superblock::parse(&blk, 5000).unwrap_err(), errno::EINVAL);
	}

	#[test]
	fn superblock_dirty_padding() {
		let mut blk = raw();
		blk[BLOCK_SIZE - 1] = 1;
		assert_eq!(Superblock::parse(&blk, 11).unwrap_err(), errno::EINVAL);
	}
}
