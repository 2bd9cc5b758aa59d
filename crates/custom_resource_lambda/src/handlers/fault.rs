use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

/// A panic intercepted while running handler code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFault {
    pub message: String,
    pub location: Option<String>,
    pub backtrace: String,
}

impl fmt::Display for HandlerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} at {}\n{}", self.message, location, self.backtrace),
            None => write!(f, "{}\n{}", self.message, self.backtrace),
        }
    }
}

struct PanicSite {
    location: Option<String>,
    backtrace: String,
}

thread_local! {
    static ARMED: Cell<usize> = const { Cell::new(0) };
    static LAST_PANIC: RefCell<Option<PanicSite>> = const { RefCell::new(None) };
}

static INSTALL_HOOK: Once = Once::new();

/// Chains a hook in front of the current one. Panics on a thread with an armed
/// boundary are recorded with a backtrace taken at the panic site; all other
/// panics go to the previous hook untouched.
fn install_hook() {
    INSTALL_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let armed = ARMED.try_with(|armed| armed.get() > 0).unwrap_or(false);
            if !armed {
                previous(info);
                return;
            }
            let site = PanicSite {
                location: info.location().map(|location| location.to_string()),
                backtrace: Backtrace::force_capture().to_string(),
            };
            let _ = LAST_PANIC.try_with(|slot| *slot.borrow_mut() = Some(site));
        }));
    });
}

struct ArmGuard;

impl ArmGuard {
    fn arm() -> Self {
        ARMED.with(|armed| armed.set(armed.get() + 1));
        Self
    }
}

impl Drop for ArmGuard {
    fn drop(&mut self) {
        ARMED.with(|armed| armed.set(armed.get().saturating_sub(1)));
    }
}

/// Runs `call`, converting a panic into a [`HandlerFault`] instead of letting
/// it unwind further. Runs synchronously on the calling thread.
pub fn run_contained<T>(call: impl FnOnce() -> T) -> Result<T, HandlerFault> {
    install_hook();
    LAST_PANIC.with(|slot| slot.borrow_mut().take());

    let result = {
        let _guard = ArmGuard::arm();
        panic::catch_unwind(AssertUnwindSafe(call))
    };

    result.map_err(|payload| {
        let site = LAST_PANIC.with(|slot| slot.borrow_mut().take());
        let (location, backtrace) = match site {
            Some(site) => (site.location, site.backtrace),
            None => (None, Backtrace::force_capture().to_string()),
        };
        HandlerFault {
            message: panic_message(payload.as_ref()),
            location,
            backtrace,
        }
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
