use std::{
    io,
    os::fd::{AsRawFd, FromRawFd, OwnedFd},
    ptr,
    time::Duration,
};

use super::PreemptionSource;

/// Periodic timer backed by a non-blocking `timerfd`.
///
/// The kernel counts expirations on the descriptor; reading it returns the count and resets it.
#[derive(Debug)]
pub struct Timer {
    fd: OwnedFd,
    armed: bool,
}

fn timespec(duration: Duration) -> libc::timespec {
    libc::timespec {
        tv_sec: duration.as_secs() as libc::time_t,
        tv_nsec: duration.subsec_nanos() as libc::c_long,
    }
}

impl Timer {
    pub fn new() -> io::Result<Self> {
        let fd = unsafe {
            libc::timerfd_create(libc::CLOCK_MONOTONIC, libc::TFD_NONBLOCK | libc::TFD_CLOEXEC)
        };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Self {
            // Safety: fd was just created and is owned by nobody else
            fd: unsafe { OwnedFd::from_raw_fd(fd) },
            armed: false,
        })
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    fn settime(&self, value: Duration, interval: Duration) -> io::Result<()> {
        let spec = libc::itimerspec {
            it_interval: timespec(interval),
            it_value: timespec(value),
        };
        let ret =
            unsafe { libc::timerfd_settime(self.fd.as_raw_fd(), 0, &spec, ptr::null_mut()) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl PreemptionSource for Timer {
    fn arm(&mut self, interval: Duration) -> io::Result<()> {
        if interval.is_zero() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "timer interval cannot be zero",
            ));
        }
        self.settime(interval, interval)?;
        self.armed = true;
        Ok(())
    }

    fn disarm(&mut self) -> io::Result<()> {
        // A zero it_value stops the timer
        self.settime(Duration::ZERO, Duration::ZERO)?;
        self.armed = false;
        // Throw away anything that fired before disarming
        self.drain().map(drop)
    }

    fn drain(&mut self) -> io::Result<u64> {
        let mut expirations: u64 = 0;
        let ret = unsafe {
            libc::read(
                self.fd.as_raw_fd(),
                &mut expirations as *mut u64 as *mut libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        if ret < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::WouldBlock {
                return Ok(0);
            }
            return Err(err);
        }
        Ok(expirations)
    }
}

#[cfg(test)]
mod test {
    use std::{thread, time::Duration};

    use super::*;

    #[test]
    fn fires_while_armed() {
        let mut timer = Timer::new().unwrap();
        assert_eq!(timer.drain().unwrap(), 0);

        timer.arm(Duration::from_millis(5)).unwrap();
        assert!(timer.is_armed());
        thread::sleep(Duration::from_millis(30));
        assert!(timer.drain().unwrap() >= 1);

        timer.disarm().unwrap();
        assert!(!timer.is_armed());
        thread::sleep(Duration::from_millis(20));
        assert_eq!(timer.drain().unwrap(), 0);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut timer = Timer::new().unwrap();
        let err = timer.arm(Duration::ZERO).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
