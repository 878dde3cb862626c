use crate::Core::io::{Readable, Writeable};
use crate::MPMC::{MultiBuffer, MultiBufferBuilder, MultiReader, MultiWriter, QueueKind};
use std::ptr;

// Error codes
pub const DMXP_SUCCESS: i32 = 0;
pub const DMXP_ERROR_NULL_POINTER: i32 = -1;
pub const DMXP_ERROR_INVALID_ARG: i32 = -2;
/// The packet being written was dropped (too long, or the pool ran dry).
pub const DMXP_ERROR_ALLOCATION_FAILED: i32 = -3;
/// Fewer bytes are ready than were requested.
pub const DMXP_ERROR_EMPTY: i32 = -5;

/// Handle to a buffer instance (opaque pointer)
pub struct BufferHandle {
    inner: MultiBuffer,
}

/// Handle to a writer port (opaque pointer)
pub struct WriterHandle {
    inner: MultiWriter,
}

/// Handle to a reader port (opaque pointer)
pub struct ReaderHandle {
    inner: MultiReader,
}

// -----------------------------------------------------------------------------
// Buffer API
// -----------------------------------------------------------------------------

/// Create a new buffer, reporting why construction failed.
///
/// # Arguments
/// * `capacity` - Arena size in bytes.
/// * `chunk_size` - Chunk size in bytes, 0 for the default.
/// * `out` - Receives the new `BufferHandle`, or NULL on failure.
///
/// # Returns
/// * 0 on success.
/// * DMXP_ERROR_INVALID_ARG if the configuration is rejected, e.g. a
///   capacity too small for one chunk.
#[no_mangle]
pub extern "C" fn dmxp_mbuff_create(
    capacity: usize,
    chunk_size: usize,
    out: *mut *mut BufferHandle,
) -> i32 {
    if out.is_null() {
        return DMXP_ERROR_NULL_POINTER;
    }
    unsafe { *out = ptr::null_mut() };

    let mut builder = MultiBufferBuilder::new().with_capacity(capacity);
    if chunk_size != 0 {
        builder = builder.with_chunk_size(chunk_size);
    }
    match builder.build() {
        Ok(buffer) => {
            unsafe { *out = Box::into_raw(Box::new(BufferHandle { inner: buffer })) };
            DMXP_SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "ffi: failed to build buffer");
            DMXP_ERROR_INVALID_ARG
        }
    }
}

/// Create a new buffer.
///
/// # Returns
/// * Pointer to `BufferHandle`, or NULL on failure. Use `dmxp_mbuff_create`
///   to learn why.
#[no_mangle]
pub extern "C" fn dmxp_mbuff_new(capacity: usize, chunk_size: usize) -> *mut BufferHandle {
    let mut handle: *mut BufferHandle = ptr::null_mut();
    dmxp_mbuff_create(capacity, chunk_size, &mut handle);
    handle
}

/// Run one scheduling pass: watchdogs, then delivery.
#[no_mangle]
pub extern "C" fn dmxp_mbuff_service(handle: *mut BufferHandle) -> i32 {
    if handle.is_null() {
        return DMXP_ERROR_NULL_POINTER;
    }
    let buffer = unsafe { &(*handle).inner };
    buffer.service();
    DMXP_SUCCESS
}

/// Free bytes left in the arena, 0 for a NULL handle.
#[no_mangle]
pub extern "C" fn dmxp_mbuff_free_bytes(handle: *const BufferHandle) -> usize {
    if handle.is_null() {
        return 0;
    }
    let buffer = unsafe { &(*handle).inner };
    buffer.get_free_bytes()
}

/// Free a buffer handle. Ports created from it stay valid until freed.
#[no_mangle]
pub extern "C" fn dmxp_mbuff_free(handle: *mut BufferHandle) {
    if !handle.is_null() {
        unsafe {
            let _ = Box::from_raw(handle);
        }
    }
}

// -----------------------------------------------------------------------------
// Writer API
// -----------------------------------------------------------------------------

/// Create a writer port on a buffer.
///
/// # Returns
/// * Pointer to `WriterHandle`, or NULL if `buffer` is NULL.
#[no_mangle]
pub extern "C" fn dmxp_writer_new(buffer: *const BufferHandle) -> *mut WriterHandle {
    if buffer.is_null() {
        return ptr::null_mut();
    }
    let buffer = unsafe { &(*buffer).inner };
    Box::into_raw(Box::new(WriterHandle {
        inner: MultiWriter::new(buffer),
    }))
}

/// Append bytes to the open packet.
///
/// # Returns
/// * 0 on success.
/// * DMXP_ERROR_ALLOCATION_FAILED if the packet has been dropped; it stays
///   dropped until finalize or abort.
#[no_mangle]
pub extern "C" fn dmxp_writer_write(handle: *mut WriterHandle, data: *const u8, len: usize) -> i32 {
    if handle.is_null() || (data.is_null() && len > 0) {
        return DMXP_ERROR_NULL_POINTER;
    }
    let writer = unsafe { &mut (*handle).inner };
    if len > 0 {
        let slice = unsafe { std::slice::from_raw_parts(data, len) };
        writer.write_bytes(slice);
    }
    if writer.is_failed() {
        DMXP_ERROR_ALLOCATION_FAILED
    } else {
        DMXP_SUCCESS
    }
}

/// Commit the open packet.
///
/// # Returns
/// * 0 if the packet was committed.
/// * DMXP_ERROR_ALLOCATION_FAILED if it was dropped or empty.
#[no_mangle]
pub extern "C" fn dmxp_writer_finalize(handle: *mut WriterHandle) -> i32 {
    if handle.is_null() {
        return DMXP_ERROR_NULL_POINTER;
    }
    let writer = unsafe { &mut (*handle).inner };
    if writer.write_finalize() {
        DMXP_SUCCESS
    } else {
        DMXP_ERROR_ALLOCATION_FAILED
    }
}

/// Discard the open packet.
#[no_mangle]
pub extern "C" fn dmxp_writer_abort(handle: *mut WriterHandle) -> i32 {
    if handle.is_null() {
        return DMXP_ERROR_NULL_POINTER;
    }
    let writer = unsafe { &mut (*handle).inner };
    writer.write_abort();
    DMXP_SUCCESS
}

/// Free a writer handle, aborting any open packet.
#[no_mangle]
pub extern "C" fn dmxp_writer_free(handle: *mut WriterHandle) {
    if !handle.is_null() {
        unsafe {
            let _ = Box::from_raw(handle);
        }
    }
}

// -----------------------------------------------------------------------------
// Reader API
// -----------------------------------------------------------------------------

/// Create a reader port on a buffer.
///
/// # Arguments
/// * `buffer` - Pointer to `BufferHandle`.
/// * `priority` - If true, highest priority first. Otherwise commit order.
///
/// # Returns
/// * Pointer to `ReaderHandle`, or NULL if `buffer` is NULL.
#[no_mangle]
pub extern "C" fn dmxp_reader_new(buffer: *const BufferHandle, priority: bool) -> *mut ReaderHandle {
    if buffer.is_null() {
        return ptr::null_mut();
    }
    let buffer = unsafe { &(*buffer).inner };
    let kind = if priority {
        QueueKind::Priority
    } else {
        QueueKind::Fifo
    };
    Box::into_raw(Box::new(ReaderHandle {
        inner: MultiReader::new(buffer, kind),
    }))
}

/// Bytes left in the current packet, 0 when idle or for a NULL handle.
#[no_mangle]
pub extern "C" fn dmxp_reader_ready(handle: *const ReaderHandle) -> usize {
    if handle.is_null() {
        return 0;
    }
    let reader = unsafe { &(*handle).inner };
    reader.get_read_ready()
}

/// Read exactly `len` bytes from the current packet.
///
/// # Returns
/// * 0 on success.
/// * DMXP_ERROR_EMPTY if fewer than `len` bytes are ready; nothing is consumed.
#[no_mangle]
pub extern "C" fn dmxp_reader_read(handle: *mut ReaderHandle, out_buf: *mut u8, len: usize) -> i32 {
    if handle.is_null() || (out_buf.is_null() && len > 0) {
        return DMXP_ERROR_NULL_POINTER;
    }
    let reader = unsafe { &mut (*handle).inner };
    if len == 0 {
        return DMXP_SUCCESS;
    }
    let dst = unsafe { std::slice::from_raw_parts_mut(out_buf, len) };
    if reader.read_bytes(dst) {
        DMXP_SUCCESS
    } else {
        DMXP_ERROR_EMPTY
    }
}

/// Release the current packet and move to the next.
#[no_mangle]
pub extern "C" fn dmxp_reader_finalize(handle: *mut ReaderHandle) -> i32 {
    if handle.is_null() {
        return DMXP_ERROR_NULL_POINTER;
    }
    let reader = unsafe { &mut (*handle).inner };
    reader.read_finalize();
    DMXP_SUCCESS
}

/// Enable or disable a reader port.
#[no_mangle]
pub extern "C" fn dmxp_reader_set_enable(handle: *mut ReaderHandle, enable: bool) -> i32 {
    if handle.is_null() {
        return DMXP_ERROR_NULL_POINTER;
    }
    let reader = unsafe { &mut (*handle).inner };
    reader.set_port_enable(enable);
    DMXP_SUCCESS
}

/// Free a reader handle, releasing everything it still holds.
#[no_mangle]
pub extern "C" fn dmxp_reader_free(handle: *mut ReaderHandle) {
    if !handle.is_null() {
        unsafe {
            let _ = Box::from_raw(handle);
        }
    }
}
