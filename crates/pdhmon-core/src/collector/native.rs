//! PDH bindings for Windows.

use std::mem::size_of;

use windows_sys::Win32::System::Performance::{
    PDH_COUNTER_INFO_W, PDH_HCOUNTER, PDH_HQUERY, PDH_RAW_COUNTER_ITEM_W, PdhAddEnglishCounterW,
    PdhCloseQuery, PdhCollectQueryData, PdhGetCounterInfoW, PdhGetCounterTimeBase,
    PdhGetRawCounterArrayW, PdhOpenQueryW, PdhRemoveCounter,
};

use crate::collector::probe::ProbeBuffer;
use crate::collector::status::PdhStatus;
use crate::collector::traits::{CounterHandle, CounterInfo, PdhApi, QueryHandle, RawCounterItem};

/// PDH implementation backed by `pdh.dll`.
///
/// Stateless: every handle it hands out is owned by the caller.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealPdh;

impl RealPdh {
    pub fn new() -> Self {
        Self
    }
}

/// Encodes a string as a NUL-terminated UTF-16 buffer.
pub(crate) fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Reads a NUL-terminated UTF-16 string.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated UTF-16 string.
pub(crate) unsafe fn from_wide_ptr(ptr: *const u16) -> String {
    if ptr.is_null() {
        return String::new();
    }
    let mut len = 0;
    // SAFETY: caller guarantees NUL termination.
    unsafe {
        while *ptr.add(len) != 0 {
            len += 1;
        }
        String::from_utf16_lossy(std::slice::from_raw_parts(ptr, len))
    }
}

fn query_ptr(query: QueryHandle) -> PDH_HQUERY {
    query.0 as PDH_HQUERY
}

fn counter_ptr(counter: CounterHandle) -> PDH_HCOUNTER {
    counter.0 as PDH_HCOUNTER
}

impl PdhApi for RealPdh {
    fn open_query(&mut self) -> Result<QueryHandle, PdhStatus> {
        // SAFETY: all-zero is a valid "no handle" value for PDH_HQUERY.
        let mut handle: PDH_HQUERY = unsafe { std::mem::zeroed() };
        // SAFETY: null data source selects real-time data; `handle` is a valid out pointer.
        let status = unsafe { PdhOpenQueryW(std::ptr::null(), 0, &mut handle) };
        PdhStatus(status).ok()?;
        Ok(QueryHandle(handle as usize))
    }

    fn add_counter(&mut self, query: QueryHandle, path: &str) -> Result<CounterHandle, PdhStatus> {
        let wide = to_wide(path);
        // SAFETY: all-zero is a valid "no handle" value for PDH_HCOUNTER.
        let mut handle: PDH_HCOUNTER = unsafe { std::mem::zeroed() };
        // SAFETY: `wide` is NUL-terminated and outlives the call.
        let status =
            unsafe { PdhAddEnglishCounterW(query_ptr(query), wide.as_ptr(), 0, &mut handle) };
        PdhStatus(status).ok()?;
        Ok(CounterHandle(handle as usize))
    }

    fn remove_counter(&mut self, counter: CounterHandle) -> PdhStatus {
        // SAFETY: the handle came from `add_counter` and is released once.
        PdhStatus(unsafe { PdhRemoveCounter(counter_ptr(counter)) })
    }

    fn close_query(&mut self, query: QueryHandle) -> PdhStatus {
        // SAFETY: the handle came from `open_query` and is released once.
        PdhStatus(unsafe { PdhCloseQuery(query_ptr(query)) })
    }

    fn collect_query_data(&mut self, query: QueryHandle) -> PdhStatus {
        // SAFETY: the query handle is live for the duration of the call.
        PdhStatus(unsafe { PdhCollectQueryData(query_ptr(query)) })
    }

    fn counter_info(&mut self, counter: CounterHandle, buffer: &mut ProbeBuffer) -> PdhStatus {
        let data = buffer.as_mut_ptr().cast::<PDH_COUNTER_INFO_W>();
        // SAFETY: `data` is null (size probe) or points to `buffer.size()` writable,
        // 8-byte aligned bytes.
        PdhStatus(unsafe { PdhGetCounterInfoW(counter_ptr(counter), 1, buffer.size_mut(), data) })
    }

    fn counter_time_base(&mut self, counter: CounterHandle) -> Result<i64, PdhStatus> {
        let mut time_base = 0i64;
        // SAFETY: `time_base` is a valid out pointer.
        let status = unsafe { PdhGetCounterTimeBase(counter_ptr(counter), &mut time_base) };
        PdhStatus(status).ok()?;
        Ok(time_base)
    }

    fn raw_counter_array(
        &mut self,
        counter: CounterHandle,
        buffer: &mut ProbeBuffer,
        item_count: &mut u32,
    ) -> PdhStatus {
        let data = buffer.as_mut_ptr().cast::<PDH_RAW_COUNTER_ITEM_W>();
        // SAFETY: `data` is null (size probe) or points to `buffer.size()` writable,
        // 8-byte aligned bytes.
        PdhStatus(unsafe {
            PdhGetRawCounterArrayW(counter_ptr(counter), buffer.size_mut(), item_count, data)
        })
    }

    fn decode_counter_info(&self, buffer: &ProbeBuffer) -> Option<CounterInfo> {
        if buffer.capacity() < size_of::<PDH_COUNTER_INFO_W>() {
            return None;
        }
        // SAFETY: the buffer is aligned, large enough, and was filled by
        // PdhGetCounterInfoW; embedded string pointers point into it.
        unsafe {
            let info = &*buffer.as_ptr().cast::<PDH_COUNTER_INFO_W>();
            Some(CounterInfo {
                type_code: info.dwType,
                description: from_wide_ptr(info.szExplainText),
            })
        }
    }

    fn decode_raw_items(&self, buffer: &ProbeBuffer, count: u32) -> Vec<RawCounterItem> {
        let count = count as usize;
        if count == 0 || buffer.capacity() < count * size_of::<PDH_RAW_COUNTER_ITEM_W>() {
            return Vec::new();
        }
        // SAFETY: the buffer holds `count` items written by PdhGetRawCounterArrayW;
        // instance names point into the same buffer.
        unsafe {
            let items =
                std::slice::from_raw_parts(buffer.as_ptr().cast::<PDH_RAW_COUNTER_ITEM_W>(), count);
            items
                .iter()
                .map(|item| RawCounterItem {
                    name: from_wide_ptr(item.szName),
                    status: PdhStatus(item.RawValue.CStatus),
                    first: item.RawValue.FirstValue,
                    second: item.RawValue.SecondValue,
                })
                .collect()
        }
    }
}
