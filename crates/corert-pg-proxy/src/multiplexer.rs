use std::net::SocketAddr;
use std::sync::Mutex;

use corert_errors::{Code, Error};

use crate::backend::{send_cancel_request, BackendConnection, BackendKeyData};

#[derive(Clone, Copy)]
struct Routed {
    addr: SocketAddr,
    key_data: BackendKeyData,
}

/// The multiplexer's one backend slot. `Claiming` is a placeholder a
/// caller reserves before it ever dials out, so a second caller racing
/// `try_claim()` against the first's still-in-flight `dialer.dial()`
/// (spec.md §4.13's `BACKEND_CONNECT`, a full async TCP connect plus
/// optional TLS and auth) sees the slot already taken instead of `Free`.
#[derive(Clone, Copy)]
enum Slot {
    Free,
    Claiming,
    Routed(Routed),
}

/// A single-backend multiplexer (spec.md §4.13): the first client through
/// performs `BACKEND_CONNECT`; later clients with a non-cancel startup are
/// rejected; later clients with a cancel startup are routed to the stored
/// backend's `Cancel` method.
pub struct SingleBackendMultiplexer {
    slot: Mutex<Slot>,
}

impl Default for SingleBackendMultiplexer {
    fn default() -> Self {
        SingleBackendMultiplexer { slot: Mutex::new(Slot::Free) }
    }
}

impl SingleBackendMultiplexer {
    pub fn new() -> Self {
        SingleBackendMultiplexer::default()
    }

    /// Call before attempting `BACKEND_CONNECT`: `Ok(())` atomically
    /// reserves the slot (flipping it from `Free` to `Claiming`) and means
    /// this caller is first and should proceed; an error means the slot is
    /// already claimed or routed and this (non-cancel) client must be
    /// rejected. Reserving the slot here, rather than only recording it
    /// once the backend dial finishes, is what makes two concurrent
    /// non-cancel startups mutually exclusive.
    pub fn try_claim(&self) -> Result<(), Error> {
        let mut slot = self.slot.lock().unwrap();
        match *slot {
            Slot::Free => {
                *slot = Slot::Claiming;
                Ok(())
            }
            Slot::Claiming | Slot::Routed(_) => {
                Err(Error::new(Code::Unavailable, "a backend connection is already established; this proxy serves a single backend at a time"))
            }
        }
    }

    /// Records the backend connection the claiming client established, so
    /// later `CancelRequest`s can be routed to it. A connection with no
    /// `BackendKeyData` leaves the slot `Claiming` — still reserved for
    /// the life of the connection, just not cancel-routable.
    pub fn record(&self, conn: &BackendConnection) {
        if let Some(key_data) = conn.key_data {
            *self.slot.lock().unwrap() = Slot::Routed(Routed { addr: conn.backend_addr(), key_data });
        }
    }

    /// Frees the slot — called on a failed dial (never claimed past
    /// `Claiming`) and once the claiming connection's steady-state copy
    /// tears down.
    pub fn release(&self) {
        *self.slot.lock().unwrap() = Slot::Free;
    }

    pub async fn route_cancel(&self) -> Result<(), Error> {
        let routed = match *self.slot.lock().unwrap() {
            Slot::Routed(r) => Some(r),
            Slot::Free | Slot::Claiming => None,
        };
        match routed {
            Some(Routed { addr, key_data }) => send_cancel_request(addr, key_data).await,
            None => Err(Error::new(Code::FailedPrecondition, "no backend connection to route a cancel request to")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_is_rejected_until_release() {
        let mux = SingleBackendMultiplexer::new();
        assert!(mux.try_claim().is_ok());
        // Simulate a connected backend without a real socket: directly set state.
        *mux.slot.lock().unwrap() = Slot::Routed(Routed { addr: "127.0.0.1:5432".parse().unwrap(), key_data: BackendKeyData { pid: 1, secret: 2 } });
        assert!(mux.try_claim().is_err());
        mux.release();
        assert!(mux.try_claim().is_ok());
    }

    #[test]
    fn a_claim_still_in_flight_rejects_a_concurrent_second_claim() {
        let mux = SingleBackendMultiplexer::new();
        assert!(mux.try_claim().is_ok());
        // No `record()` yet — the dial is still in flight. The reserved
        // slot alone must be enough to reject a second claimant.
        assert!(mux.try_claim().is_err());
        mux.release();
        assert!(mux.try_claim().is_ok());
    }
}
