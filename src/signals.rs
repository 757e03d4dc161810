//! Shutdown signal handling
//!
//! Termination signals are turned into a readable byte on a pipe so the
//! dispatcher can watch them next to the LED handles. Only the first signal
//! is remembered. While the hardware is being torn down the signals are held
//! off; afterwards their default dispositions are restored and the first
//! signal is raised again so the process terminates the way it was asked to.

use log::debug;
use std::io;
use std::mem;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd};
use std::ptr;
use std::sync::atomic::{AtomicI32, Ordering};

use crate::leds::Cancel;

/// Signals that end the daemon
pub const SHUTDOWN_SIGNALS: [libc::c_int; 4] =
    [libc::SIGINT, libc::SIGTERM, libc::SIGHUP, libc::SIGQUIT];

static WAKE_FD: AtomicI32 = AtomicI32::new(-1);
static RECEIVED: AtomicI32 = AtomicI32::new(0);

extern "C" fn on_signal(signo: libc::c_int) {
    // SAFETY: errno is thread-local, only saved and restored here
    let errno = unsafe { *libc::__errno_location() };

    let _ = RECEIVED.compare_exchange(0, signo, Ordering::SeqCst, Ordering::SeqCst);
    let fd = WAKE_FD.load(Ordering::SeqCst);
    if fd >= 0 {
        let byte = signo as u8;
        // SAFETY: write(2) is async-signal-safe; a full pipe just drops the byte
        unsafe {
            libc::write(fd, &byte as *const u8 as *const libc::c_void, 1);
        }
    }

    unsafe {
        *libc::__errno_location() = errno;
    }
}

/// Self-pipe fed by the shutdown signal handler
#[derive(Debug)]
pub struct SignalPipe {
    read: OwnedFd,
    write: OwnedFd,
    signals: Vec<libc::c_int>,
}

impl SignalPipe {
    /// Route `signals` to a new pipe
    pub fn install(signals: &[libc::c_int]) -> io::Result<Self> {
        let mut fds = [0 as libc::c_int; 2];
        // SAFETY: fds has room for the two descriptors
        if unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC | libc::O_NONBLOCK) } < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: pipe2 succeeded, both fds are fresh and ours
        let (read, write) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };

        RECEIVED.store(0, Ordering::SeqCst);
        WAKE_FD.store(write.as_raw_fd(), Ordering::SeqCst);

        for &signo in signals {
            // SAFETY: a zeroed sigaction is valid once the handler is filled in
            let mut action: libc::sigaction = unsafe { mem::zeroed() };
            action.sa_sigaction = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
            action.sa_flags = libc::SA_RESTART;
            unsafe { libc::sigemptyset(&mut action.sa_mask) };

            if unsafe { libc::sigaction(signo, &action, ptr::null_mut()) } < 0 {
                return Err(io::Error::last_os_error());
            }
        }
        debug!("Installed handlers for signals {:?}", signals);

        Ok(Self {
            read,
            write,
            signals: signals.to_vec(),
        })
    }

    /// First signal received since installation, if any
    pub fn received(&self) -> Option<libc::c_int> {
        match RECEIVED.load(Ordering::SeqCst) {
            0 => None,
            signo => Some(signo),
        }
    }

    /// Restore default dispositions, re-raise `signo` and unblock
    ///
    /// Returns only if the re-raised signal does not end the process.
    pub fn resume_default(&self, signo: Option<libc::c_int>) -> io::Result<()> {
        WAKE_FD.store(-1, Ordering::SeqCst);
        for &sig in &self.signals {
            // SAFETY: SIG_DFL is always a valid disposition
            if unsafe { libc::signal(sig, libc::SIG_DFL) } == libc::SIG_ERR {
                return Err(io::Error::last_os_error());
            }
        }

        if let Some(signo) = signo {
            debug!("Re-raising signal {}", signo);
            // SAFETY: raise only queues the signal, it is still blocked
            unsafe { libc::raise(signo) };
        }
        self.set_mask(libc::SIG_UNBLOCK)
    }

    fn drain(&self) {
        let mut buf = [0u8; 16];
        loop {
            // SAFETY: buf is valid for its length; the pipe is non-blocking
            let n = unsafe {
                libc::read(
                    self.read.as_raw_fd(),
                    buf.as_mut_ptr() as *mut libc::c_void,
                    buf.len(),
                )
            };
            if n <= 0 {
                break;
            }
        }
    }

    fn set_mask(&self, how: libc::c_int) -> io::Result<()> {
        // SAFETY: set is initialised by sigemptyset before use
        unsafe {
            let mut set: libc::sigset_t = mem::zeroed();
            libc::sigemptyset(&mut set);
            for &sig in &self.signals {
                libc::sigaddset(&mut set, sig);
            }
            let ret = libc::pthread_sigmask(how, &set, ptr::null_mut());
            if ret != 0 {
                return Err(io::Error::from_raw_os_error(ret));
            }
        }
        Ok(())
    }
}

impl AsFd for SignalPipe {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.read.as_fd()
    }
}

impl Cancel for SignalPipe {
    fn take_signal(&self) -> Option<i32> {
        self.drain();
        self.received()
    }

    /// Block the handled signals for the calling thread
    fn hold(&self) -> io::Result<()> {
        self.set_mask(libc::SIG_BLOCK)
    }
}

impl Drop for SignalPipe {
    fn drop(&mut self) {
        let _ = WAKE_FD.compare_exchange(
            self.write.as_raw_fd(),
            -1,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }
}
