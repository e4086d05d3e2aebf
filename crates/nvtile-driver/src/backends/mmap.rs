// SPDX-License-Identifier: AGPL-3.0-only

//! Memory-mapped BAR region
//!
//! Maps a sysfs `resourceN` file and exposes bounds-checked volatile 32-bit
//! accesses. All unsafe code of the driver lives here.

use crate::error::{Result, Space, TileError};
use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use std::fs::{File, OpenOptions};
use std::os::unix::io::AsFd;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

/// Memory-mapped PCI BAR region
///
/// Provides bounds-checked access to memory-mapped hardware. The mapping is
/// released on drop.
#[derive(Debug)]
pub struct MmapRegion {
    ptr: NonNull<u8>,
    size: usize,
    _file: File,
    path: PathBuf,
    space: Space,
}

impl MmapRegion {
    /// Map the resource file at `path`
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Resource file doesn't exist
    /// - Cannot open file
    /// - The file is empty
    /// - mmap fails
    pub fn new(path: &Path, space: Space) -> Result<Self> {
        tracing::debug!("Mapping {space} BAR: {}", path.display());

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    TileError::device_not_found(path)
                } else {
                    TileError::map_failed(format!(
                        "Cannot open {}: {e}. Are you root?",
                        path.display()
                    ))
                }
            })?;

        let len = file
            .metadata()
            .map_err(|e| TileError::map_failed(format!("Cannot stat {}: {e}", path.display())))?
            .len();
        let size = usize::try_from(len)
            .map_err(|_| TileError::map_failed(format!("BAR of {len:#x} bytes does not fit")))?;

        if size == 0 {
            return Err(TileError::map_failed(format!(
                "{} has size 0 (device not enabled?)",
                path.display()
            )));
        }

        // SAFETY: the file descriptor was just opened read/write and stays
        // open in `_file` for the lifetime of the mapping. `size` is the
        // non-zero length of the resource file and the offset is 0, so the
        // kernel maps exactly the BAR. MAP_SHARED is required for device
        // memory. The mapping is unmapped once, in Drop.
        let ptr = unsafe {
            mmap(
                std::ptr::null_mut(),
                size,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                file.as_fd(),
                0,
            )
        }
        .map_err(|e| TileError::map_failed(format!("mmap of {} failed: {e}", path.display())))?;

        let ptr = NonNull::new(ptr.cast::<u8>())
            .ok_or_else(|| TileError::map_failed("mmap returned a null pointer"))?;

        tracing::info!(
            "Mapped {space} BAR {} ({} KB at {ptr:p})",
            path.display(),
            size / 1024,
        );

        Ok(Self {
            ptr,
            size,
            _file: file,
            path: path.to_path_buf(),
            space,
        })
    }

    fn check(&self, offset: u32) -> Result<usize> {
        let offset = offset as usize;
        if offset % 4 != 0 || offset + 4 > self.size {
            return Err(TileError::out_of_bounds(
                self.space,
                offset as u64,
                self.size as u64,
            ));
        }
        Ok(offset)
    }

    /// Read 32-bit word at offset
    ///
    /// # Errors
    ///
    /// Returns error if offset is unaligned or out of bounds
    pub fn read_u32(&self, offset: u32) -> Result<u32> {
        let offset = self.check(offset)?;

        // SAFETY: `check` guarantees offset + 4 <= size and 4-byte alignment
        // relative to the page-aligned mapping base. The pointer comes from a
        // successful mmap and stays valid until Drop. Volatile because the
        // hardware may change the value between reads.
        #[allow(clippy::cast_ptr_alignment)]
        let value = unsafe {
            self.ptr
                .as_ptr()
                .add(offset)
                .cast::<u32>()
                .read_volatile()
        };

        tracing::trace!("Read {} @ {offset:#x} = {value:#010x}", self.space);
        Ok(value)
    }

    /// Write 32-bit word at offset
    ///
    /// # Errors
    ///
    /// Returns error if offset is unaligned or out of bounds
    pub fn write_u32(&mut self, offset: u32, value: u32) -> Result<()> {
        let offset = self.check(offset)?;

        tracing::trace!("Write {} @ {offset:#x} = {value:#010x}", self.space);

        // SAFETY: as in `read_u32`; `&mut self` gives exclusive access to the
        // mapping from this process. Volatile because the write has hardware
        // side effects and must not be elided or reordered.
        #[allow(clippy::cast_ptr_alignment)]
        unsafe {
            self.ptr
                .as_ptr()
                .add(offset)
                .cast::<u32>()
                .write_volatile(value);
        }

        Ok(())
    }

    /// Get region size
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Get the resource file path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for MmapRegion {
    fn drop(&mut self) {
        tracing::debug!("Unmapping {}", self.path.display());

        // SAFETY: ptr and size are exactly what mmap returned and was given
        // in `new`; Drop runs at most once and no references outlive self.
        unsafe {
            if let Err(e) = munmap(self.ptr.as_ptr().cast(), self.size) {
                tracing::error!("munmap failed during drop: {e}");
            }
        }
    }
}
