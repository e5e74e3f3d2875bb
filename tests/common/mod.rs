//! Test support.
//!
//! The library operates on a process-wide mounted volume, so tests of one
//! binary drive it one at a time through [`lock`]. Scratch volumes are built
//! by [`mkfs`], which lays out the on-disk format directly into a temporary
//! file.

use std::{
	io::Write,
	sync::{Mutex, MutexGuard, PoisonError},
};
use tempfile::NamedTempFile;
use tinyfs::{
	fs::{fat::FAT_EOC, superblock::SIGNATURE},
	BLOCK_SIZE,
};

/// Serializes the tests driving the process-wide mounted volume.
///
/// Also installs the logger, so a failing test shows the library's
/// diagnostics (run with `RUST_LOG=debug` to see them).
pub fn lock() -> MutexGuard<'static, ()> {
	let _ = env_logger::builder().is_test(true).try_init();
	static LOCK: Mutex<()> = Mutex::new(());
	LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Builds a formatted volume with `num_data_blocks` data blocks and returns
/// the temporary file holding its image.
pub fn mkfs(num_data_blocks: u16) -> NamedTempFile {
	let num_fat_blocks = (num_data_blocks as usize * 2).div_ceil(BLOCK_SIZE).max(1) as u8;
	let root_index = 1 + num_fat_blocks as u16;
	let data_start_index = root_index + 1;
	let num_blocks = data_start_index + num_data_blocks;
	let mut image = vec![0u8; num_blocks as usize * BLOCK_SIZE];
	// superblock
	image[..8].copy_from_slice(&SIGNATURE);
	image[8..10].copy_from_slice(&num_blocks.to_le_bytes());
	image[10..12].copy_from_slice(&root_index.to_le_bytes());
	image[12..14].copy_from_slice(&data_start_index.to_le_bytes());
	image[14..16].copy_from_slice(&num_data_blocks.to_le_bytes());
	image[16] = num_fat_blocks;
	// FAT entry 0 is reserved
	if num_data_blocks > 0 {
		image[BLOCK_SIZE..BLOCK_SIZE + 2].copy_from_slice(&FAT_EOC.to_le_bytes());
	}
	let mut file = NamedTempFile::new().unwrap();
	file.write_all(&image).unwrap();
	file.flush().unwrap();
	file
}

/// Returns `len` bytes of a non-repeating-per-block pattern.
pub fn pattern(len: usize) -> Vec<u8> {
	(0..len).map(|i| (i % 251) as u8).collect()
}
