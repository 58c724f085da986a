use {
    crate::worker::Phase,
    ax_packet::Packet,
    core::cell::Cell,
    embassy_sync::{
        blocking_mutex::{self, raw::RawMutex},
        channel::Channel,
        mutex::Mutex,
        signal::Signal,
    },
};

/// Which half of a transfer just finished.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Completion {
    Write,
    Read,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IoError {
    /// The line refused to start transmitting.
    UartWrite,
    /// The line refused to start receiving.
    UartRead,
    WriteTimeout,
    ReadTimeout,
    /// A completion arrived for the other direction.
    WrongNotification,
    WrongChecksum,
    /// A valid frame, but not the size that was asked for.
    WrongLength,
}

impl core::fmt::Display for IoError {
    #[inline]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match *self {
            Self::UartWrite => write!(f, "Couldn't start transmitting"),
            Self::UartRead => write!(f, "Couldn't start receiving"),
            Self::WriteTimeout => write!(f, "Timed out while transmitting"),
            Self::ReadTimeout => write!(f, "Timed out waiting for a status packet"),
            Self::WrongNotification => {
                write!(f, "Transfer completed in the wrong direction")
            }
            Self::WrongChecksum => write!(f, "Status packet failed its checksum"),
            Self::WrongLength => write!(f, "Status packet had an unexpected length"),
        }
    }
}

/// `Ok(None)`: done, nothing to read back.
/// `Ok(Some(_))`: the status packet, whose parameters are the data.
pub type Response = Result<Option<Packet>, IoError>;

pub(crate) struct Request {
    pub(crate) packet: Packet,
    pub(crate) response_size: usize,
    /// `None` if nobody is waiting for the response.
    pub(crate) ticket: Option<u32>,
}

/// Everything shared between one line's [`Worker`](crate::worker::Worker),
/// its clients, and its transfer-complete interrupt.
pub struct Bus<M: RawMutex> {
    pub(crate) requests: Channel<M, Request, 1>,
    pub(crate) responses: Channel<M, (u32, Response), 1>,
    pub(crate) completion: Signal<M, Completion>,
    /// Held from sending a request until its response is back.
    session: Mutex<M, u32>,
    phase: blocking_mutex::Mutex<M, Cell<Phase>>,
}

impl<M: RawMutex> Default for Bus<M> {
    #[inline(always)]
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex> Bus<M> {
    #[inline]
    pub const fn new() -> Self {
        Self {
            requests: Channel::new(),
            responses: Channel::new(),
            completion: Signal::new(),
            session: Mutex::new(0),
            phase: blocking_mutex::Mutex::new(Cell::new(Phase::Idle)),
        }
    }

    /// Send `packet` and wait for whatever comes back.
    ///
    /// `response_size` is the full size of the expected status packet, or
    /// zero if none is expected (as returned by the `ax_packet::send` builders).
    #[inline]
    pub async fn transfer(&self, packet: &Packet, response_size: usize) -> Response {
        let mut session = self.session.lock().await;
        *session = session.wrapping_add(1);
        let ticket = *session;
        self.requests
            .send(Request {
                packet: *packet,
                response_size,
                ticket: Some(ticket),
            })
            .await;
        loop {
            let (answered, response) = self.responses.receive().await;
            if answered == ticket {
                return response;
            }
            // Left behind by a caller that was cancelled mid-transfer.
            debug!("Discarding a response to ticket {}", answered);
        }
    }

    /// Queue `packet` without waiting for (or ever seeing) its outcome.
    #[inline]
    pub async fn submit(&self, packet: &Packet, response_size: usize) {
        self.requests
            .send(Request {
                packet: *packet,
                response_size,
                ticket: None,
            })
            .await
    }

    /// Transfer-complete signal. Safe to call from an interrupt handler.
    #[inline]
    pub fn notify(&self, completion: Completion) {
        self.completion.signal(completion)
    }

    /// Where the worker is in its current exchange.
    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase.lock(Cell::get)
    }

    #[inline]
    pub(crate) fn set_phase(&self, phase: Phase) {
        self.phase.lock(|cell| cell.set(phase))
    }
}
