//! Asynchronous timer abstraction providing the timing primitives required
//! by the periodic status schedule and the service poll loop.

/// Timer trait abstraction; must remain thread-safe when applicable.
pub trait KorriTimer {
    /// Asynchronously wait for `millis` milliseconds.
    fn delay_ms<'a>(
        &'a mut self,
        millis: u32,
    ) -> impl core::future::Future<Output = ()> + 'a;

    /// Monotonic milliseconds since an arbitrary, fixed origin.
    fn now_ms(&self) -> u64;
}
