use std::{
    ffi::{
        CStr,
        CString,
        c_char,
        c_int
    },
    slice
};

use crate::{
    datasource::{DataSource, Whence},
    filesource::FileSource,
    memsource::MemorySource
};

#[repr(C)]
pub struct DsError {
    message: *mut c_char
}

impl Drop for DsError {
    fn drop(&mut self) {
        unsafe {
            if !self.message.is_null() {
                drop(CString::from_raw(self.message));
            }
        }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn ds_free_error(err: *mut DsError) {
    if !err.is_null() {
        unsafe { drop(Box::from_raw(err)); }
    }
}

fn fill_error<E: ToString>(e: E, err: *mut *mut DsError) {
    if !err.is_null() {
        // CString::new doesn't like internal nulls
        let message = CString::new(e.to_string().replace('\0', "\u{FFFD}"))
            .unwrap_or_default()
            .into_raw();

        unsafe { *err = Box::into_raw(Box::new(DsError { message })); }
    }
}

/// An open source. Memory sources borrow the caller's buffer, which must stay
/// alive and unchanged until `ds_close`.
pub struct DsHandle {
    source: Box<dyn DataSource>
}

fn into_handle<S: DataSource + 'static>(source: S) -> *mut DsHandle {
    Box::into_raw(Box::new(DsHandle { source: Box::new(source) }))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn ds_open(
    path: *const c_char,
    err: *mut *mut DsError
) -> *mut DsHandle
{
    if path.is_null() {
        fill_error("path is null", err);
        return std::ptr::null_mut();
    }

    let p = unsafe { CStr::from_ptr(path) };

    let Ok(path) = p.to_str() else {
        fill_error("path is not UTF-8", err);
        return std::ptr::null_mut();
    };

    match FileSource::open(path) {
        Ok(src) => into_handle(src),
        Err(e) => {
            fill_error(e, err);
            std::ptr::null_mut()
        }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn ds_wrap(
    buf: *const u8,
    buflen: usize,
    err: *mut *mut DsError
) -> *mut DsHandle
{
    let data: &'static [u8] = if buflen == 0 {
        &[]
    }
    else if buf.is_null() {
        fill_error("buf is null", err);
        return std::ptr::null_mut();
    }
    else {
        // the caller guarantees buf outlives the handle
        unsafe { slice::from_raw_parts(buf, buflen) }
    };

    into_handle(MemorySource::new(data))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn ds_close(handle: *mut DsHandle) {
    if !handle.is_null() {
        drop(unsafe { Box::from_raw(handle) });
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn ds_read(
    handle: *mut DsHandle,
    buf: *mut u8,
    buflen: usize
) -> usize
{
    if handle.is_null() || buflen == 0 || buf.is_null() {
        return 0;
    }

    let buf = unsafe { slice::from_raw_parts_mut(buf, buflen) };
    unsafe { &mut *handle }.source.read(buf)
}

/// `whence` takes the SEEK_SET, SEEK_CUR, SEEK_END values; others are ignored.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ds_seek(
    handle: *mut DsHandle,
    offset: u64,
    whence: c_int
)
{
    if handle.is_null() {
        return;
    }

    if let Ok(whence) = Whence::try_from(whence) {
        unsafe { &mut *handle }.source.seek(offset, whence);
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn ds_tell(handle: *const DsHandle) -> u64 {
    if handle.is_null() {
        return 0;
    }
    unsafe { &*handle }.source.tell()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn ds_size(handle: *const DsHandle) -> u64 {
    if handle.is_null() {
        return 0;
    }
    unsafe { &*handle }.source.size()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn ds_eof(handle: *const DsHandle) -> bool {
    if handle.is_null() {
        return true;
    }
    unsafe { &*handle }.source.eof()
}
