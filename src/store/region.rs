//! POSIX shared memory mappings
//!
//! Thin wrapper around `shm_open`/`ftruncate`/`mmap`. A `Region` owns one mapping and
//! unmaps it on drop; unlinking the underlying object is opt-in.

use std::ffi::CString;
use std::io;
use std::ptr::NonNull;

use super::StoreError;

pub(crate) struct Region {
    ptr: NonNull<u8>,
    len: usize,
    writable: bool,
    name: Option<String>,
    unlink_on_drop: bool,
}

// The mapping is plain memory; concurrent access is coordinated by the store.
unsafe impl Send for Region {}
unsafe impl Sync for Region {}

impl Region {
    /// Create a fresh named object of `len` bytes, mapped read-write.
    ///
    /// A stale object with the same name is unlinked first so a new run never
    /// inherits records from an old one.
    pub fn create_named(name: &str, len: usize) -> Result<Self, StoreError> {
        let c_name = shm_name(name)?;
        let os_err = |op: &'static str| StoreError::Os {
            op,
            name: name.to_string(),
            source: io::Error::last_os_error(),
        };

        unsafe {
            libc::shm_unlink(c_name.as_ptr());
        }

        let fd = unsafe {
            libc::shm_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
                0o600 as libc::mode_t,
            )
        };
        if fd < 0 {
            return Err(os_err("create"));
        }

        let size = match libc::off_t::try_from(len) {
            Ok(size) => size,
            Err(_) => {
                unsafe {
                    libc::close(fd);
                    libc::shm_unlink(c_name.as_ptr());
                }
                return Err(StoreError::TooLarge { bytes: len });
            }
        };
        if unsafe { libc::ftruncate(fd, size) } < 0 {
            let err = os_err("size");
            unsafe {
                libc::close(fd);
                libc::shm_unlink(c_name.as_ptr());
            }
            return Err(err);
        }

        let mapped = map(fd, len, true);
        unsafe {
            libc::close(fd);
        }
        let ptr = match mapped {
            Ok(ptr) => ptr,
            Err(source) => {
                unsafe {
                    libc::shm_unlink(c_name.as_ptr());
                }
                return Err(StoreError::Os {
                    op: "map",
                    name: name.to_string(),
                    source,
                });
            }
        };

        Ok(Self {
            ptr,
            len,
            writable: true,
            name: Some(name.to_string()),
            unlink_on_drop: false,
        })
    }

    /// Open an existing named object and map all of it read-only
    pub fn open_named_readonly(name: &str) -> Result<Self, StoreError> {
        let c_name = shm_name(name)?;
        let os_err = |op: &'static str, source: io::Error| StoreError::Os {
            op,
            name: name.to_string(),
            source,
        };

        let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDONLY, 0 as libc::mode_t) };
        if fd < 0 {
            return Err(os_err("open", io::Error::last_os_error()));
        }

        let mut stat: libc::stat = unsafe { std::mem::zeroed() };
        if unsafe { libc::fstat(fd, &mut stat) } < 0 {
            let err = os_err("stat", io::Error::last_os_error());
            unsafe {
                libc::close(fd);
            }
            return Err(err);
        }
        let len = usize::try_from(stat.st_size).unwrap_or(0);
        if len == 0 {
            unsafe {
                libc::close(fd);
            }
            return Err(StoreError::Uninitialized(name.to_string()));
        }

        let mapped = map(fd, len, false);
        unsafe {
            libc::close(fd);
        }
        let ptr = mapped.map_err(|source| os_err("map", source))?;

        Ok(Self {
            ptr,
            len,
            writable: false,
            name: Some(name.to_string()),
            unlink_on_drop: false,
        })
    }

    /// Anonymous shared mapping, private to this process and its threads
    pub fn anonymous(len: usize) -> Result<Self, StoreError> {
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(StoreError::Os {
                op: "map",
                name: "<anonymous>".to_string(),
                source: io::Error::last_os_error(),
            });
        }
        let ptr = NonNull::new(ptr.cast::<u8>()).ok_or_else(|| StoreError::Os {
            op: "map",
            name: "<anonymous>".to_string(),
            source: io::Error::from(io::ErrorKind::AddrNotAvailable),
        })?;

        Ok(Self {
            ptr,
            len,
            writable: true,
            name: None,
            unlink_on_drop: false,
        })
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_unlink_on_drop(&mut self, unlink: bool) {
        self.unlink_on_drop = unlink;
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        unsafe {
            if libc::munmap(self.ptr.as_ptr().cast(), self.len) != 0 {
                tracing::warn!(
                    error = %io::Error::last_os_error(),
                    "failed to unmap shared region"
                );
            }
        }
        if self.unlink_on_drop {
            if let Some(name) = self.name.as_deref() {
                if let Err(e) = unlink(name) {
                    tracing::warn!(name, error = %e, "failed to unlink shared region");
                }
            }
        }
    }
}

/// Remove a named object. Returns `false` if it did not exist.
pub(crate) fn unlink(name: &str) -> Result<bool, StoreError> {
    let c_name = shm_name(name)?;
    if unsafe { libc::shm_unlink(c_name.as_ptr()) } == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if err.kind() == io::ErrorKind::NotFound {
        Ok(false)
    } else {
        Err(StoreError::Os {
            op: "unlink",
            name: name.to_string(),
            source: err,
        })
    }
}

fn map(fd: libc::c_int, len: usize, writable: bool) -> io::Result<NonNull<u8>> {
    let prot = if writable {
        libc::PROT_READ | libc::PROT_WRITE
    } else {
        libc::PROT_READ
    };
    let ptr = unsafe { libc::mmap(std::ptr::null_mut(), len, prot, libc::MAP_SHARED, fd, 0) };
    if ptr == libc::MAP_FAILED {
        return Err(io::Error::last_os_error());
    }
    NonNull::new(ptr.cast::<u8>()).ok_or_else(|| io::Error::from(io::ErrorKind::AddrNotAvailable))
}

/// POSIX object names are a single path component with a leading slash
fn shm_name(name: &str) -> Result<CString, StoreError> {
    let trimmed = name.strip_prefix('/').unwrap_or(name);
    if trimmed.is_empty() || trimmed.contains('/') {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    CString::new(format!("/{}", trimmed)).map_err(|_| StoreError::InvalidName(name.to_string()))
}
