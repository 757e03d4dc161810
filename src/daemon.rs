//! Process plumbing for running as a system daemon
//!
//! Detaching from the terminal, the pidfile and dropping root once the
//! privileged devices are open.

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use std::ffi::CString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::ptr;

/// Default pidfile location
pub const DEFAULT_PIDFILE: &str = "/var/run/nu801.pid";

/// Detach from the controlling terminal
///
/// Changes directory to `/` and points stdio at `/dev/null`.
pub fn daemonize() -> Result<()> {
    // SAFETY: called before any threads are started
    if unsafe { libc::daemon(0, 0) } < 0 {
        return Err(io::Error::last_os_error()).context("Failed to daemonize");
    }
    debug!("Running in background as pid {}", std::process::id());
    Ok(())
}

/// Pidfile that is removed again when dropped
#[derive(Debug)]
pub struct Pidfile {
    path: PathBuf,
}

impl Pidfile {
    /// Write the current pid to `path`
    pub fn create(path: &Path) -> Result<Self> {
        fs::write(path, format!("{}\n", std::process::id()))
            .with_context(|| format!("Failed to write pidfile: {}", path.display()))?;
        debug!("Wrote pidfile {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for Pidfile {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            warn!("Failed to remove pidfile {}: {}", self.path.display(), err);
        }
    }
}

/// Switch to `user` and `group`
///
/// An empty `user` keeps the current identity, as does running without root.
/// An empty `group` falls back to the user's primary group.
pub fn drop_privileges(user: &str, group: &str) -> Result<()> {
    if user.is_empty() {
        debug!("No user given, keeping current identity");
        return Ok(());
    }

    // SAFETY: geteuid cannot fail
    if unsafe { libc::geteuid() } != 0 {
        warn!("Not running as root, cannot switch to user '{}'", user);
        return Ok(());
    }

    let (uid, primary_gid) = lookup_user(user)?;
    let gid = if group.is_empty() {
        primary_gid
    } else {
        lookup_group(group)?
    };

    // SAFETY: plain syscalls on integer ids
    unsafe {
        if libc::setgroups(0, ptr::null()) < 0 {
            return Err(io::Error::last_os_error()).context("Failed to clear supplementary groups");
        }
        if libc::setgid(gid) < 0 {
            return Err(io::Error::last_os_error())
                .with_context(|| format!("Failed to switch to gid {}", gid));
        }
        if libc::setuid(uid) < 0 {
            return Err(io::Error::last_os_error())
                .with_context(|| format!("Failed to switch to uid {}", uid));
        }
    }

    info!("Dropped privileges to {} ({}:{})", user, uid, gid);
    Ok(())
}

fn lookup_user(name: &str) -> Result<(libc::uid_t, libc::gid_t)> {
    let cname = CString::new(name).with_context(|| format!("Invalid user name: {:?}", name))?;
    // SAFETY: the result points into static libc storage, copied out at once
    let pw = unsafe { libc::getpwnam(cname.as_ptr()) };
    if pw.is_null() {
        bail!("Unknown user: {}", name);
    }
    Ok(unsafe { ((*pw).pw_uid, (*pw).pw_gid) })
}

fn lookup_group(name: &str) -> Result<libc::gid_t> {
    let cname = CString::new(name).with_context(|| format!("Invalid group name: {:?}", name))?;
    // SAFETY: as for getpwnam
    let gr = unsafe { libc::getgrnam(cname.as_ptr()) };
    if gr.is_null() {
        bail!("Unknown group: {}", name);
    }
    Ok(unsafe { (*gr).gr_gid })
}
