//! Peer process id lookup via socket credentials
//!
//! Best-effort: any failure yields 0 and a debug log, never an error.

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

/// Process id of the peer on a connected Unix socket
#[cfg(any(target_os = "linux", target_os = "android"))]
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn peer_pid<S: AsRawFd>(socket: &S) -> u32 {
    let fd = socket.as_raw_fd();
    let mut cred: libc::ucred = unsafe { std::mem::zeroed() };
    let mut len = std::mem::size_of::<libc::ucred>() as libc::socklen_t;

    let result = unsafe {
        libc::getsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_PEERCRED,
            std::ptr::addr_of_mut!(cred).cast::<libc::c_void>(),
            &mut len,
        )
    };

    if result != 0 {
        tracing::debug!(
            error = %std::io::Error::last_os_error(),
            "SO_PEERCRED lookup failed"
        );
        return 0;
    }
    u32::try_from(cred.pid).unwrap_or(0)
}

/// Process id of the peer on a connected Unix socket
#[cfg(any(target_os = "macos", target_os = "ios"))]
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn peer_pid<S: AsRawFd>(socket: &S) -> u32 {
    let fd = socket.as_raw_fd();
    let mut pid: libc::pid_t = 0;
    let mut len = std::mem::size_of::<libc::pid_t>() as libc::socklen_t;

    let result = unsafe {
        libc::getsockopt(
            fd,
            libc::SOL_LOCAL,
            libc::LOCAL_PEERPID,
            std::ptr::addr_of_mut!(pid).cast::<libc::c_void>(),
            &mut len,
        )
    };

    if result != 0 {
        tracing::debug!(
            error = %std::io::Error::last_os_error(),
            "LOCAL_PEERPID lookup failed"
        );
        return 0;
    }
    u32::try_from(pid).unwrap_or(0)
}

/// Process id of the peer (unsupported platform)
#[cfg(all(
    unix,
    not(any(
        target_os = "linux",
        target_os = "android",
        target_os = "macos",
        target_os = "ios"
    ))
))]
pub(crate) fn peer_pid<S: AsRawFd>(_socket: &S) -> u32 {
    tracing::debug!("Peer pid lookup not supported on this platform");
    0
}
