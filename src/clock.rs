//! Wall clock and timers for native and `wasm32` targets.
//!
//! `std::time::SystemTime::now` panics on `wasm32-unknown-unknown`, and tokio
//! timers are not available there, so the browser build goes through
//! `Date.now()` and `setTimeout`.

use std::time::Duration;

/// Milliseconds since the Unix epoch.
#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Milliseconds since the Unix epoch.
#[cfg(target_arch = "wasm32")]
pub(crate) fn now_millis() -> u64 {
    js_sys::Date::now() as u64
}

#[cfg(not(target_arch = "wasm32"))]
pub(crate) async fn sleep(delay: Duration) {
    tokio::time::sleep(delay).await;
}

/// Resolves after `delay` using the host's `setTimeout`.
#[cfg(target_arch = "wasm32")]
pub(crate) async fn sleep(delay: Duration) {
    use wasm_bindgen::{JsCast, JsValue};

    let millis = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
    let promise = js_sys::Promise::new(&mut |resolve: js_sys::Function, _reject: js_sys::Function| {
        let scheduled = js_sys::Reflect::get(&js_sys::global(), &JsValue::from_str("setTimeout"))
            .ok()
            .and_then(|value| value.dyn_into::<js_sys::Function>().ok())
            .map(|set_timeout| set_timeout.call2(&JsValue::NULL, &resolve, &JsValue::from(millis)))
            .is_some_and(|result| result.is_ok());
        // No timer in this host: resolve right away rather than hang.
        if !scheduled {
            let _ = resolve.call0(&JsValue::NULL);
        }
    });
    let _ = wasm_bindgen_futures::JsFuture::from(promise).await;
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use std::time::Duration;

    use super::{now_millis, sleep};

    #[test]
    fn now_is_after_2020() {
        assert!(now_millis() > 1_577_836_800_000);
    }

    #[tokio::test]
    async fn sleep_waits_at_least_the_delay() {
        let start = now_millis();
        sleep(Duration::from_millis(20)).await;
        assert!(now_millis() - start >= 15);
    }
}
