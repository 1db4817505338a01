use dnsreplay_application::ports::Clock;
use dnsreplay_domain::Timespec;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Longest single sleep while a cancellation token is being watched.
const CANCEL_SLICE: Duration = Duration::from_millis(50);

/// `CLOCK_MONOTONIC` with absolute-deadline sleeps.
#[derive(Debug, Clone, Default)]
pub struct MonotonicClock {
    cancel: Option<CancellationToken>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps return early once `token` is cancelled.
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            cancel: Some(token),
        }
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Timespec {
        monotonic_now()
    }

    fn sleep_until(&self, deadline: Timespec) {
        let Some(token) = self.cancel.as_ref() else {
            sleep_abs(deadline);
            return;
        };

        let slice = Timespec::from_duration(CANCEL_SLICE);
        while !token.is_cancelled() {
            let now = monotonic_now();
            if now >= deadline {
                break;
            }
            sleep_abs((now + slice).min(deadline));
        }
    }
}

fn monotonic_now() -> Timespec {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    unsafe {
        libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
    }
    Timespec::new(ts.tv_sec as i64, ts.tv_nsec as i64)
}

fn sleep_abs(deadline: Timespec) {
    if deadline.is_negative() {
        return;
    }
    let ts = libc::timespec {
        tv_sec: deadline.secs() as libc::time_t,
        tv_nsec: deadline.subsec_nanos() as libc::c_long,
    };
    loop {
        // returns the error number instead of setting errno
        let rc = unsafe {
            libc::clock_nanosleep(
                libc::CLOCK_MONOTONIC,
                libc::TIMER_ABSTIME,
                &ts,
                std::ptr::null_mut(),
            )
        };
        if rc != libc::EINTR {
            break;
        }
    }
}
