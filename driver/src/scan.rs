//! Find out who is on the line.

use {
    crate::bus::Bus,
    ax_packet::{
        Packet,
        constants::MAX_ID,
        control_table::{self, Item},
        send,
    },
    core::fmt::Write,
    embassy_sync::blocking_mutex::raw::RawMutex,
};

pub const PING_ATTEMPTS: usize = 3;

const SEPARATOR: &str = "----------------------------------------------";

async fn ping<M: RawMutex>(bus: &Bus<M>, packet: &mut Packet, id: u8) -> bool {
    for _ in 0..PING_ATTEMPTS {
        let Ok(size) = send::ping(packet, id) else {
            return false;
        };
        if let Ok(Some(_)) = bus.transfer(packet, size).await {
            return true;
        }
    }
    false
}

/// One- or two-byte register, little-endian.
async fn read<M: RawMutex, I: Item>(bus: &Bus<M>, packet: &mut Packet, id: u8) -> Option<u16> {
    let size = send::read(packet, id, I::ADDRESS, I::BYTES).ok()?;
    let reply = bus.transfer(packet, size).await.ok()??;
    match *reply.parameters() {
        [lo] => Some(u16::from(lo)),
        [lo, hi] => Some(u16::from_le_bytes([lo, hi])),
        _ => None,
    }
}

fn field(sink: &mut impl Write, name: &str, value: Option<u16>, digits: usize) -> core::fmt::Result {
    match value {
        Some(value) => writeln!(sink, "-> {name:<14} = {value:#0width$X}", width = digits + 2),
        None => writeln!(sink, "-> {name:<14} = ERROR"),
    }
}

/// Ping every ID and report what each responder says about itself.
///
/// Returns how many servos answered. Uses nothing but [`Bus::transfer`],
/// so it can run alongside other clients of the same bus.
pub async fn discover<M: RawMutex>(bus: &Bus<M>, sink: &mut impl Write) -> Result<usize, core::fmt::Error> {
    let mut packet = Packet::new();
    let mut found = 0;
    writeln!(sink, "{SEPARATOR}")?;
    for id in 0..=MAX_ID {
        debug!("Pinging {}...", id);
        if !ping(bus, &mut packet, id).await {
            continue;
        }
        found += 1;
        let model = read::<M, control_table::ModelNumber>(bus, &mut packet, id).await;
        let firmware = read::<M, control_table::FirmwareVersion>(bus, &mut packet, id).await;
        let baud = read::<M, control_table::BaudRate>(bus, &mut packet, id).await;
        let delay = read::<M, control_table::ReturnDelayTime>(bus, &mut packet, id).await;
        writeln!(sink, "Found servo with ID {id}")?;
        field(sink, "model number", model, 4)?;
        field(sink, "firmware ver", firmware, 2)?;
        field(sink, "baud rate", baud, 2)?;
        field(sink, "return delay", delay, 2)?;
    }
    writeln!(sink, "{SEPARATOR}")?;
    Ok(found)
}
