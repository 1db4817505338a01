use dnsreplay_domain::Timespec;

/// Monotonic time source used to pace the intake path.
pub trait Clock: Send {
    fn now(&self) -> Timespec;

    /// Blocks the calling thread until `deadline`. Implementations may return
    /// early when the replay is being interrupted.
    fn sleep_until(&self, deadline: Timespec);
}
