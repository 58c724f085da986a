//! The only code that touches the line.

use {
    crate::{
        bus::{Bus, Completion, IoError, Request, Response},
        comm::Comm,
    },
    ax_packet::{Packet, constants::MAX_SIZE, control_table::Baud},
    embassy_sync::blocking_mutex::raw::RawMutex,
    embassy_time::{Duration, TICK_HZ, with_timeout},
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    Idle,
    WritePending,
    WriteDone,
    ReadPending,
    ReadDone,
    ChecksumCheck,
}

/// Timeout configuration for one line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timing {
    /// Longest a single byte may take on the wire.
    pub max_wait_per_byte_us: u32,
    /// Extra allowance before a device starts replying.
    pub return_delay_us: u32,
}

impl Timing {
    /// Factory-default return delay of an AX servo.
    pub const DEFAULT_RETURN_DELAY_US: u32 = 500;

    /// Ten bit times per byte (start, eight data, stop), rounded up.
    #[inline]
    pub const fn for_baud(baud: Baud, return_delay_us: u32) -> Self {
        Self {
            max_wait_per_byte_us: 10_000_000_u32.div_ceil(baud.bps()),
            return_delay_us,
        }
    }

    #[inline]
    pub const fn write_budget(&self, bytes: usize) -> Duration {
        ceil_ticks(bytes as u64 * self.max_wait_per_byte_us as u64)
    }

    #[inline]
    pub const fn read_budget(&self, bytes: usize) -> Duration {
        ceil_ticks(bytes as u64 * self.max_wait_per_byte_us as u64 + self.return_delay_us as u64)
    }
}

/// Round up to whole ticks, never below one.
#[inline]
const fn ceil_ticks(us: u64) -> Duration {
    let ticks = (us * TICK_HZ).div_ceil(1_000_000);
    Duration::from_ticks(if ticks == 0 { 1 } else { ticks })
}

pub struct Worker<'bus, M: RawMutex, C: Comm> {
    bus: &'bus Bus<M>,
    comm: C,
    timing: Timing,
}

impl<'bus, M: RawMutex, C: Comm> Worker<'bus, M, C> {
    #[inline]
    pub const fn new(bus: &'bus Bus<M>, comm: C, timing: Timing) -> Self {
        Self { bus, comm, timing }
    }

    #[inline(always)]
    pub fn phase(&self) -> Phase {
        self.bus.phase()
    }

    #[inline(always)]
    pub const fn timing(&self) -> Timing {
        self.timing
    }

    /// Serve requests forever, one at a time.
    pub async fn run(&mut self) -> ! {
        loop {
            let Request {
                packet,
                response_size,
                ticket,
            } = self.bus.requests.receive().await;
            let response = self.exchange(packet, response_size).await;
            self.bus.set_phase(Phase::Idle);
            if let Some(ticket) = ticket {
                // Only the session holder is waiting, on this ticket. Anything
                // still queued was left by a transfer that was dropped.
                while let Ok((stale, _)) = self.bus.responses.try_receive() {
                    debug!("Dropping the unclaimed response to ticket {}", stale);
                }
                self.bus.responses.send((ticket, response)).await;
            }
        }
    }

    async fn exchange(&mut self, mut packet: Packet, response_size: usize) -> Response {
        trace!("Sending {} bytes to ID {}", packet.size(), packet.id());

        self.bus.set_phase(Phase::WritePending);
        self.bus.completion.reset();
        if let Err(e) = self.comm.start_send(packet.as_bytes()) {
            warn!("Couldn't start sending to ID {}: {}", packet.id(), e);
            return Err(self.fail(IoError::UartWrite));
        }
        let () = self
            .complete(
                Completion::Write,
                self.timing.write_budget(packet.size()),
                IoError::WriteTimeout,
            )
            .await?;
        self.bus.set_phase(Phase::WriteDone);

        if response_size == 0 {
            return Ok(None);
        }

        packet.poison();
        self.bus.set_phase(Phase::ReadPending);
        self.bus.completion.reset();
        if let Err(e) = self.comm.start_recv(response_size) {
            warn!("Couldn't start receiving {} bytes: {}", response_size, e);
            return Err(self.fail(IoError::UartRead));
        }
        let () = self
            .complete(
                Completion::Read,
                self.timing.read_budget(response_size),
                IoError::ReadTimeout,
            )
            .await?;
        self.bus.set_phase(Phase::ReadDone);

        let buffer = packet.buffer_mut();
        let received = self.comm.collect(&mut buffer[..response_size.min(MAX_SIZE)]);

        self.bus.set_phase(Phase::ChecksumCheck);
        if !packet.checksum_is_ok() {
            warn!(
                "Checksum mismatch: computed {=u8:X} but received {=u8:X} ({} bytes)",
                packet.compute_checksum(),
                packet.checksum(),
                received,
            );
            return Err(IoError::WrongChecksum);
        }
        if packet.size() != response_size {
            warn!(
                "Expected a {}-byte status packet but got {} bytes",
                response_size,
                packet.size(),
            );
            return Err(IoError::WrongLength);
        }
        Ok(Some(packet))
    }

    /// Wait (bounded) for the transfer in flight to report back.
    async fn complete(
        &mut self,
        expected: Completion,
        budget: Duration,
        timeout: IoError,
    ) -> Result<(), IoError> {
        let bus = self.bus;
        match with_timeout(budget, bus.completion.wait()).await {
            Ok(actual) if actual == expected => Ok(()),
            Ok(actual) => {
                warn!("Expected {} completion but got {}", expected, actual);
                Err(self.fail(IoError::WrongNotification))
            }
            Err(_) => {
                warn!("No {} completion within {} us", expected, budget.as_micros());
                Err(self.fail(timeout))
            }
        }
    }

    /// Reset the line after a transport failure.
    fn fail(&mut self, error: IoError) -> IoError {
        debug!("Resetting the line after {}", error);
        if let Err(e) = self.comm.reset() {
            warn!("Couldn't reset the line: {}", e);
        }
        error
    }
}
