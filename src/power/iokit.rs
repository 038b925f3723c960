//! IOKit power assertions, resolved with `dlopen` at startup.
//!
//! Resolving the symbols at runtime lets a missing or broken framework
//! surface as [`VigiloError::ResourceUnavailable`] instead of a loader crash.

use std::ffi::{c_void, CStr};

use core_foundation::base::TCFType;
use core_foundation::string::{CFString, CFStringRef};

use super::{AssertionId, AssertionKind, PowerApi};
use crate::error::{Result, VigiloError};

const IOKIT_PATH: &CStr = c"/System/Library/Frameworks/IOKit.framework/IOKit";

/// `kIOPMAssertionLevelOn`
const ASSERTION_LEVEL_ON: u32 = 255;
/// `kIOReturnSuccess`
const IO_RETURN_SUCCESS: i32 = 0;

type AssertionCreateWithNameFn =
    unsafe extern "C" fn(CFStringRef, u32, CFStringRef, *mut u32) -> i32;
type AssertionReleaseFn = unsafe extern "C" fn(u32) -> i32;

/// Handle on the IOKit framework and the two symbols Vigilo calls.
pub struct IoKitPower {
    library: *mut c_void,
    create: AssertionCreateWithNameFn,
    release: AssertionReleaseFn,
}

impl IoKitPower {
    /// Open IOKit and resolve `IOPMAssertionCreateWithName` / `IOPMAssertionRelease`.
    pub fn load() -> Result<Self> {
        // SAFETY: IOKIT_PATH is a valid NUL-terminated string.
        let library = unsafe { libc::dlopen(IOKIT_PATH.as_ptr(), libc::RTLD_NOW) };
        if library.is_null() {
            return Err(VigiloError::ResourceUnavailable(format!(
                "dlopen {}: {}",
                IOKIT_PATH.to_string_lossy(),
                last_dl_error()
            )));
        }

        let resolved = unsafe {
            resolve(library, c"IOPMAssertionCreateWithName").and_then(|create| {
                resolve(library, c"IOPMAssertionRelease").map(|release| (create, release))
            })
        };

        let (create, release) = match resolved {
            Ok(symbols) => symbols,
            Err(e) => {
                unsafe { libc::dlclose(library) };
                return Err(e);
            }
        };

        tracing::debug!("IOKit power assertion symbols resolved");

        // SAFETY: both symbols have these C signatures in IOPMLib.h.
        let (create, release) = unsafe {
            (
                std::mem::transmute::<*mut c_void, AssertionCreateWithNameFn>(create),
                std::mem::transmute::<*mut c_void, AssertionReleaseFn>(release),
            )
        };

        Ok(Self {
            library,
            create,
            release,
        })
    }
}

impl PowerApi for IoKitPower {
    fn create_assertion(&mut self, kind: AssertionKind, label: &str) -> Result<AssertionId> {
        // Both strings are released when they go out of scope, whatever IOKit returns.
        let assertion_type = CFString::new(kind.type_name());
        let name = CFString::new(label);
        let mut raw_id: u32 = 0;

        let code = unsafe {
            (self.create)(
                assertion_type.as_concrete_TypeRef(),
                ASSERTION_LEVEL_ON,
                name.as_concrete_TypeRef(),
                &mut raw_id,
            )
        };

        if code != IO_RETURN_SUCCESS {
            return Err(VigiloError::Power { kind, code });
        }
        AssertionId::new(raw_id).ok_or(VigiloError::Power { kind, code })
    }

    fn release_assertion(&mut self, id: AssertionId) -> Result<()> {
        let code = unsafe { (self.release)(id.get()) };
        if code != IO_RETURN_SUCCESS {
            return Err(VigiloError::Release { id, code });
        }
        Ok(())
    }
}

impl Drop for IoKitPower {
    fn drop(&mut self) {
        unsafe { libc::dlclose(self.library) };
    }
}

unsafe fn resolve(library: *mut c_void, name: &CStr) -> Result<*mut c_void> {
    let symbol = libc::dlsym(library, name.as_ptr());
    if symbol.is_null() {
        return Err(VigiloError::ResourceUnavailable(format!(
            "dlsym {}: {}",
            name.to_string_lossy(),
            last_dl_error()
        )));
    }
    Ok(symbol)
}

fn last_dl_error() -> String {
    let message = unsafe { libc::dlerror() };
    if message.is_null() {
        return "unknown error".to_string();
    }
    unsafe { CStr::from_ptr(message) }
        .to_string_lossy()
        .into_owned()
}
