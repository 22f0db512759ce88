//! Per-thread COM initialisation.
//!
//! Callers may arrive on a thread with no COM apartment, an MTA, or an STA
//! owned by a GUI framework. [`ComScope`] joins whatever is there and only
//! balances the initialisation it performed itself.

use windows::core::HRESULT;
use windows::Win32::Foundation::{RPC_E_CHANGED_MODE, S_FALSE, S_OK};
use windows::Win32::System::Com::{CoInitializeEx, CoUninitialize, COINIT_MULTITHREADED};

use audio_session_core::models::error::SessionError;

/// COM usage for the current thread. Uninitialises on drop when it initialised.
pub(crate) struct ComScope {
    owns_init: bool,
}

impl ComScope {
    /// Enter the multithreaded apartment, or reuse the thread's existing one.
    pub(crate) fn enter() -> Result<Self, SessionError> {
        let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
        let owns_init = owns_initialization(hr).map_err(|e| {
            SessionError::Unknown(format!("CoInitializeEx failed: {}", e.message()))
        })?;
        if !owns_init {
            log::debug!("thread already in a different COM apartment, reusing it");
        }
        Ok(Self { owns_init })
    }
}

impl Drop for ComScope {
    fn drop(&mut self) {
        if self.owns_init {
            unsafe {
                CoUninitialize();
            }
        }
    }
}

/// Whether a `CoInitializeEx` result must be balanced by `CoUninitialize`.
///
/// `S_OK` and `S_FALSE` both count as an initialisation. `RPC_E_CHANGED_MODE`
/// means the thread already lives in another apartment, which COM objects
/// created here can still use.
fn owns_initialization(hr: HRESULT) -> Result<bool, HRESULT> {
    if hr == S_OK || hr == S_FALSE {
        Ok(true)
    } else if hr == RPC_E_CHANGED_MODE {
        Ok(false)
    } else {
        Err(hr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use windows::Win32::Foundation::E_OUTOFMEMORY;
    use windows::Win32::System::Com::COINIT_APARTMENTTHREADED;

    #[test]
    fn initialisation_results() {
        assert_eq!(owns_initialization(S_OK), Ok(true));
        assert_eq!(owns_initialization(S_FALSE), Ok(true));
        assert_eq!(owns_initialization(RPC_E_CHANGED_MODE), Ok(false));
        assert_eq!(owns_initialization(E_OUTOFMEMORY), Err(E_OUTOFMEMORY));
    }

    #[test]
    fn scope_can_be_entered_twice_on_one_thread() {
        let outer = ComScope::enter().unwrap();
        let inner = ComScope::enter().unwrap();
        assert!(outer.owns_init);
        assert!(inner.owns_init);
    }

    #[test]
    fn scope_reuses_a_single_threaded_apartment() {
        std::thread::spawn(|| {
            let hr = unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) };
            assert_eq!(hr, S_OK);
            let scope = ComScope::enter().unwrap();
            assert!(!scope.owns_init);
            drop(scope);
            unsafe { CoUninitialize() };
        })
        .join()
        .unwrap();
    }
}
