//! Calling identity tracking.
//!
//! Each thread carries the identity of the caller whose request it is
//! currently serving. Transports install it with [`CallingScope::enter`]
//! for the duration of one synchronous call; the engine drops it with
//! [`Binder::clear_calling_identity`] around privileged app-op access so the
//! access is attributed to this process instead of the caller.
//!
//! ```rust
//! use ecm_core::identity::{Binder, CallingScope, ClearedIdentity, Identity};
//! use ecm_core::platform::Uid;
//!
//! let _scope = CallingScope::enter(Identity::new(Uid(10_123), 42));
//! assert_eq!(Binder::calling_uid(), Uid(10_123));
//! {
//!     let _cleared = ClearedIdentity::new();
//!     assert_eq!(Binder::calling_uid(), Uid::SYSTEM);
//! }
//! assert_eq!(Binder::calling_uid(), Uid(10_123));
//! ```

use std::cell::Cell;

use crate::platform::Uid;

/// A caller identity: uid plus pid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    /// Caller uid.
    pub uid: Uid,
    /// Caller pid (0 when unknown).
    pub pid: u32,
}

impl Identity {
    /// Creates an identity.
    #[must_use]
    pub const fn new(uid: Uid, pid: u32) -> Self {
        Self { uid, pid }
    }

    /// The identity of this service process.
    #[must_use]
    pub fn own() -> Self {
        Self::new(Uid::SYSTEM, std::process::id())
    }
}

thread_local! {
    static CALLING: Cell<Option<Identity>> = const { Cell::new(None) };
}

fn current() -> Identity {
    CALLING.with(Cell::get).unwrap_or_else(Identity::own)
}

fn replace(identity: Option<Identity>) -> Option<Identity> {
    CALLING.with(|cell| cell.replace(identity))
}

/// Opaque token returned by [`Binder::clear_calling_identity`].
#[derive(Debug)]
#[must_use = "the token must be passed back to restore_calling_identity"]
pub struct IdentityToken(Option<Identity>);

/// Static accessors mirroring the platform's Binder identity calls.
pub struct Binder;

impl Binder {
    /// Uid of the caller currently being served on this thread, or this
    /// process's uid when no call is in flight or the identity was cleared.
    #[must_use]
    pub fn calling_uid() -> Uid {
        current().uid
    }

    /// Pid of the caller currently being served on this thread.
    #[must_use]
    pub fn calling_pid() -> u32 {
        current().pid
    }

    /// Resets the calling identity to this process and returns a token that
    /// restores the previous one.
    pub fn clear_calling_identity() -> IdentityToken {
        IdentityToken(replace(None))
    }

    /// Restores an identity saved by [`Self::clear_calling_identity`].
    pub fn restore_calling_identity(token: IdentityToken) {
        replace(token.0);
    }
}

/// Clears the calling identity until dropped.
#[derive(Debug)]
pub struct ClearedIdentity {
    token: Option<IdentityToken>,
}

impl ClearedIdentity {
    /// Clears the calling identity of the current thread.
    #[must_use]
    pub fn new() -> Self {
        Self {
            token: Some(Binder::clear_calling_identity()),
        }
    }
}

impl Default for ClearedIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ClearedIdentity {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            Binder::restore_calling_identity(token);
        }
    }
}

/// Runs `f` with the calling identity cleared.
pub fn with_cleared_identity<T>(f: impl FnOnce() -> T) -> T {
    let _cleared = ClearedIdentity::new();
    f()
}

/// Installs a caller identity on the current thread until dropped.
///
/// Not `Send`: the identity is thread-local, so the scope must end on the
/// thread that entered it.
#[derive(Debug)]
pub struct CallingScope {
    previous: Option<Identity>,
    _not_send: std::marker::PhantomData<*const ()>,
}

impl CallingScope {
    /// Makes `identity` the calling identity of this thread.
    #[must_use]
    pub fn enter(identity: Identity) -> Self {
        Self {
            previous: replace(Some(identity)),
            _not_send: std::marker::PhantomData,
        }
    }
}

impl Drop for CallingScope {
    fn drop(&mut self) {
        replace(self.previous.take());
    }
}
