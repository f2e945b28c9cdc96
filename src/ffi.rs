//! FFI bindings for Synheart Stress
//!
//! C-compatible functions for driving the stress engine from other languages.
//! All functions use C strings (null-terminated) and return allocated memory that
//! must be freed by the caller using `stress_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::error::StressError;
use crate::pipeline::StressEngine;
use crate::trainer::TrainConfig;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Convert a Rust string to a C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Join already-serialized JSON documents into one JSON array
fn vec_to_json_array(vec: Vec<String>) -> String {
    format!("[{}]", vec.join(","))
}

/// Negative seeds ask for a time-derived seed
fn seed_from_ffi(seed: i64) -> Option<u64> {
    u64::try_from(seed).ok()
}

fn finish_string(result: Result<String, StressError>) -> *mut c_char {
    match result {
        Ok(s) => string_to_cstr(&s),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Opaque handle to a StressEngine
pub struct StressEngineHandle {
    engine: StressEngine,
}

/// Train a new engine.
///
/// `config_json` is an optional `TrainConfig` document (NULL for defaults); `seed`
/// overrides its seed, and a negative `seed` requests a time-derived one.
///
/// # Safety
/// - `config_json` must be NULL or a valid null-terminated C string.
/// - Returns a pointer that must be freed with `stress_engine_free`.
/// - Returns NULL on error; call `stress_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn stress_engine_new(
    seed: i64,
    config_json: *const c_char,
) -> *mut StressEngineHandle {
    clear_last_error();

    let mut config = if config_json.is_null() {
        TrainConfig::default()
    } else {
        let json = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match serde_json::from_str::<TrainConfig>(&json) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&StressError::from(e).to_string());
                return ptr::null_mut();
            }
        }
    };
    config.seed = seed_from_ffi(seed);

    match StressEngine::train(&config) {
        Ok(engine) => Box::into_raw(Box::new(StressEngineHandle { engine })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free an engine.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `stress_engine_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn stress_engine_free(engine: *mut StressEngineHandle) {
    if !engine.is_null() {
        drop(Box::from_raw(engine));
    }
}

/// Score one request or an array of requests and return a JSON array of payloads.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `stress_engine_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `stress_free_string`.
/// - Returns NULL on error; call `stress_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn stress_engine_predict(
    engine: *const StressEngineHandle,
    json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }
    let handle = &*engine;

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    finish_string(handle.engine.predict_json(&json_str).map(vec_to_json_array))
}

/// Retrain and publish a new artifact. A negative `seed` requests a time-derived one.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `stress_engine_new`.
/// - Returns 0 on success, -1 on error (the previous artifact stays live).
#[no_mangle]
pub unsafe extern "C" fn stress_engine_retrain(engine: *const StressEngineHandle, seed: i64) -> i32 {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return -1;
    }
    let handle = &*engine;

    match handle.engine.retrain(seed_from_ffi(seed)) {
        Ok(_) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Evaluate the current artifact on a generated test set and return the report as JSON.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `stress_engine_new`.
/// - Returns a newly allocated string that must be freed with `stress_free_string`.
/// - Returns NULL on error; call `stress_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn stress_engine_evaluate(engine: *const StressEngineHandle) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }
    let handle = &*engine;

    finish_string(handle.engine.evaluate(None).and_then(|report| {
        serde_json::to_string(&report).map_err(StressError::JsonError)
    }))
}

/// Serialize the current artifact.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `stress_engine_new`.
/// - Returns a newly allocated string that must be freed with `stress_free_string`.
/// - Returns NULL on error; call `stress_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn stress_engine_save_artifact(
    engine: *const StressEngineHandle,
) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }
    let handle = &*engine;

    finish_string(handle.engine.save_artifact())
}

/// Replace the current artifact with a serialized one.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `stress_engine_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn stress_engine_load_artifact(
    engine: *const StressEngineHandle,
    json: *const c_char,
) -> i32 {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return -1;
    }
    let handle = &*engine;

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return -1;
        }
    };

    match handle.engine.load_artifact(&json_str) {
        Ok(_) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Stress functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Stress function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn stress_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Stress function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn stress_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn stress_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
