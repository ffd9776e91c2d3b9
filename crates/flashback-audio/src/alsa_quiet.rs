//! ALSA prints plugin warnings straight to stderr while hosts and devices are
//! probed. This RAII guard parks stderr on /dev/null for the duration of the
//! probe and restores it on drop.

use std::fs::File;
use std::io;
use std::os::unix::io::{AsRawFd, FromRawFd};

pub struct StderrQuiet {
    original_stderr: Option<File>,
}

impl StderrQuiet {
    pub fn new() -> Option<Self> {
        // SAFETY: raw fd juggling via libc. STDERR_FILENO is always valid in a
        // Unix process; dup gives us a fresh fd that `original_stderr` owns and
        // closes on drop; dup2 atomically swaps stderr for /dev/null.
        unsafe {
            let saved_fd = libc::dup(libc::STDERR_FILENO);
            if saved_fd < 0 {
                return None;
            }
            let original_stderr = File::from_raw_fd(saved_fd);

            let devnull = match std::fs::OpenOptions::new().write(true).open("/dev/null") {
                Ok(f) => f,
                Err(_) => return None,
            };
            if libc::dup2(devnull.as_raw_fd(), libc::STDERR_FILENO) < 0 {
                return None;
            }

            Some(Self {
                original_stderr: Some(original_stderr),
            })
        }
    }
}

impl Drop for StderrQuiet {
    fn drop(&mut self) {
        if let Some(original) = self.original_stderr.take() {
            // SAFETY: restoring the fd we saved in new(); both fds are valid.
            unsafe {
                if libc::dup2(original.as_raw_fd(), libc::STDERR_FILENO) < 0 {
                    // Nothing sane to do; stderr stays on /dev/null.
                    let _ = io::Error::last_os_error();
                }
            }
        }
    }
}
