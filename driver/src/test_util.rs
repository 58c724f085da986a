//! A simulated AX line for driving a [`Worker`] on the host.

use {
    crate::{
        bus::{Bus, Completion},
        comm::Comm,
        worker::Worker,
    },
    ax_packet::{
        Alarm, Packet,
        constants::{AX12_MODEL, BROADCAST_ID},
        control_table::{self, Item as _},
        send::Instruction,
    },
    embassy_futures::{
        block_on,
        select::{Either, select},
    },
    embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, RawMutex},
    std::{cell::RefCell, rc::Rc},
};

pub(crate) type TestBus = Bus<CriticalSectionRawMutex>;

/// Run `future` to completion while `worker` serves the line.
pub(crate) fn drive<M: RawMutex, C: Comm, F: Future>(
    worker: &mut Worker<'_, M, C>,
    future: F,
) -> F::Output {
    match block_on(select(worker.run(), future)) {
        Either::First(never) => never,
        Either::Second(output) => output,
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Fault {
    /// Transmissions never report completion.
    NoWriteCompletion,
    /// Transmissions report a finished read instead.
    SwappedCompletion,
    /// Receptions report a finished write instead.
    SwappedReadCompletion,
    RefuseSend,
    RefuseRecv,
    /// Every status packet arrives with its last byte flipped.
    CorruptChecksum,
    /// Only the first this-many bytes of each status packet arrive.
    ShortReply(usize),
    /// This ID executes instructions but never replies.
    Silent(u8),
    /// This ID answers pings but not reads.
    SilentReads(u8),
}

struct Device {
    id: u8,
    registers: [u8; control_table::END as usize + 1],
    alarm: Alarm,
}

impl Device {
    fn new(id: u8) -> Self {
        let mut registers = [0; control_table::END as usize + 1];
        registers[..2].copy_from_slice(&AX12_MODEL.to_le_bytes());
        registers[control_table::FirmwareVersion::ADDRESS as usize] = 0x18;
        registers[control_table::Id::ADDRESS as usize] = id;
        registers[control_table::BaudRate::ADDRESS as usize] = 0x01;
        registers[control_table::ReturnDelayTime::ADDRESS as usize] = 0xFA;
        registers[control_table::AlarmLed::ADDRESS as usize] = 0x24;
        registers[control_table::AlarmShutdown::ADDRESS as usize] = 0x24;
        registers[control_table::TorqueEnable::ADDRESS as usize] = 1;
        Self {
            id,
            registers,
            alarm: Alarm::NONE,
        }
    }

    fn write(&mut self, address: u8, data: &[u8]) {
        let start = address as usize;
        let end = (start + data.len()).min(self.registers.len());
        if start < end {
            self.registers[start..end].copy_from_slice(&data[..end - start]);
        }
    }
}

#[derive(Default)]
struct State {
    devices: Vec<Device>,
    faults: Vec<Fault>,
    reply: Option<Vec<u8>>,
    received: Vec<Packet>,
    resets: usize,
}

impl State {
    fn has(&self, fault: Fault) -> bool {
        self.faults.contains(&fault)
    }

    fn device(&mut self, id: u8) -> &mut Device {
        match self.devices.iter_mut().find(|device| device.id == id) {
            Some(device) => device,
            None => panic!("No simulated servo with ID {id}"),
        }
    }

    /// Apply an instruction packet; returns the status packet, if any.
    fn execute(&mut self, packet: &Packet) -> Option<Vec<u8>> {
        let parameters = packet.parameters();
        let instruction = Instruction::from_repr(packet.instruction())?;
        if instruction == Instruction::SyncWrite {
            let (&address, rest) = parameters.split_first()?;
            let (&width, rest) = rest.split_first()?;
            for chunk in rest.chunks_exact(width as usize + 1) {
                if let Some(device) = self.devices.iter_mut().find(|d| d.id == chunk[0]) {
                    device.write(address, &chunk[1..]);
                }
            }
            return None;
        }
        let is_read = instruction == Instruction::Read;
        let targets = self
            .devices
            .iter_mut()
            .filter(|device| packet.id() == BROADCAST_ID || device.id == packet.id());
        let mut reply = None;
        for device in targets {
            let data: Vec<u8> = match instruction {
                Instruction::Write => {
                    device.write(parameters[0], &parameters[1..]);
                    vec![]
                }
                Instruction::Read => {
                    let start = parameters[0] as usize;
                    let end = (start + parameters[1] as usize).min(device.registers.len());
                    device.registers[start..end].to_vec()
                }
                _ => vec![],
            };
            let mut status = Packet::new();
            status.init(device.id, device.alarm.bits());
            status.add_parameters(&data).unwrap();
            status.add_checksum().unwrap();
            reply = Some((device.id, status.as_bytes().to_vec()));
        }
        let (id, bytes) = reply?;
        if packet.id() == BROADCAST_ID
            || self.has(Fault::Silent(id))
            || (is_read && self.has(Fault::SilentReads(id)))
        {
            return None;
        }
        Some(bytes)
    }
}

/// Clones share one line.
#[derive(Clone)]
pub(crate) struct Line<'bus> {
    bus: &'bus TestBus,
    state: Rc<RefCell<State>>,
}

impl<'bus> Line<'bus> {
    pub(crate) fn with_servos(bus: &'bus TestBus, ids: &[u8]) -> Self {
        let state = State {
            devices: ids.iter().map(|&id| Device::new(id)).collect(),
            ..State::default()
        };
        Self {
            bus,
            state: Rc::new(RefCell::new(state)),
        }
    }

    pub(crate) fn inject(&self, fault: Fault) {
        self.state.borrow_mut().faults.push(fault);
    }

    pub(crate) fn set_register(&self, id: u8, address: u8, data: &[u8]) {
        self.state.borrow_mut().device(id).write(address, data);
    }

    pub(crate) fn register(&self, id: u8, address: u8) -> u8 {
        self.state.borrow_mut().device(id).registers[address as usize]
    }

    pub(crate) fn register_u16(&self, id: u8, address: u8) -> u16 {
        u16::from_le_bytes([self.register(id, address), self.register(id, address + 1)])
    }

    pub(crate) fn set_alarm(&self, id: u8, alarm: Alarm) {
        self.state.borrow_mut().device(id).alarm = alarm;
    }

    pub(crate) fn resets(&self) -> usize {
        self.state.borrow().resets
    }

    /// Every instruction packet that made it onto the line.
    pub(crate) fn received(&self) -> Vec<Packet> {
        self.state.borrow().received.clone()
    }
}

impl Comm for Line<'_> {
    type Error = &'static str;

    fn start_send(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();
        if state.has(Fault::RefuseSend) {
            return Err("refused to send");
        }
        let packet = Packet::from_bytes(bytes).map_err(|_| "undecodable instruction packet")?;
        state.received.push(packet);
        let reply = state.execute(&packet);
        state.reply = reply;
        if state.has(Fault::SwappedCompletion) {
            self.bus.notify(Completion::Read);
        } else if !state.has(Fault::NoWriteCompletion) {
            self.bus.notify(Completion::Write);
        }
        Ok(())
    }

    fn start_recv(&mut self, _len: usize) -> Result<(), Self::Error> {
        let state = self.state.borrow();
        if state.has(Fault::RefuseRecv) {
            return Err("refused to receive");
        }
        if state.reply.is_some() {
            self.bus.notify(if state.has(Fault::SwappedReadCompletion) {
                Completion::Write
            } else {
                Completion::Read
            });
        }
        Ok(())
    }

    fn collect(&mut self, buffer: &mut [u8]) -> usize {
        let mut state = self.state.borrow_mut();
        let Some(mut reply) = state.reply.take() else {
            return 0;
        };
        if state.has(Fault::CorruptChecksum) {
            if let Some(last) = reply.last_mut() {
                *last ^= 0xFF;
            }
        }
        let short = state.faults.iter().find_map(|fault| match *fault {
            Fault::ShortReply(n) => Some(n),
            _ => None,
        });
        let n = reply.len().min(buffer.len()).min(short.unwrap_or(usize::MAX));
        buffer[..n].copy_from_slice(&reply[..n]);
        n
    }

    fn reset(&mut self) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();
        state.reply = None;
        state.resets += 1;
        Ok(())
    }
}
