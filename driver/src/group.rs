//! Servos sharing one line, staged and committed as batches.
//!
//! Stage an access on each servo (`prepare_*`), then commit all selected
//! servos at once (`sync_selected` to write, `read_selected` to read).
//! A [`Batch`] holds the group's lock, so everything done through one batch
//! is atomic with respect to other tasks.

use {
    crate::{
        bus::{Bus, IoError, Response},
        servo::Servo,
    },
    ax_packet::{
        Alarm, Packet,
        alarm::Flag,
        constants::{AX12_MODEL, AX18_MODEL, MAX_PARAMETERS},
        control_table::{self, Item as _},
        send::{self, SyncWrite},
    },
    core::{cell::RefCell, future::poll_fn, task::Poll},
    embassy_sync::{
        blocking_mutex::{self, raw::RawMutex},
        mutex::{Mutex, MutexGuard},
        waitqueue::MultiWakerRegistration,
    },
};

pub const PING_ATTEMPTS: usize = 3;
pub const SUPPORTED_MODELS: [u16; 2] = [AX12_MODEL, AX18_MODEL];
pub const ALARM_LED: Alarm = Alarm::ALL;
pub const ALARM_SHUTDOWN: Alarm = Alarm::NONE
    .with(Flag::Overheating)
    .with(Flag::InputVoltage);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// [`ServoGroup::initialize`] hasn't succeeded yet.
    Uninitialized,
    InvalidIndex { index: usize, len: usize },
    NothingSelected,
    /// Selected servos disagree on address or width.
    MixedBatch,
    Build(send::Error),
    Io(IoError),
}

impl From<send::Error> for Error {
    #[inline(always)]
    fn from(e: send::Error) -> Self {
        Self::Build(e)
    }
}

impl From<IoError> for Error {
    #[inline(always)]
    fn from(e: IoError) -> Self {
        Self::Io(e)
    }
}

impl core::fmt::Display for Error {
    #[inline]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match *self {
            Self::Uninitialized => write!(f, "Servo group hasn't been initialized"),
            Self::InvalidIndex { index, len } => {
                write!(f, "Servo index {index} out of range for a group of {len}")
            }
            Self::NothingSelected => write!(f, "No servos selected"),
            Self::MixedBatch => write!(
                f,
                "Selected servos must share one address and width to be written together"
            ),
            Self::Build(ref e) => core::fmt::Display::fmt(e, f),
            Self::Io(ref e) => core::fmt::Display::fmt(e, f),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitError {
    /// No answer to any of [`PING_ATTEMPTS`] pings.
    Missing { id: u8 },
    ModelNumber { id: u8, error: Error },
    UnsupportedModel { id: u8, model: u16 },
    /// Couldn't write a default to register `address`.
    Defaults { address: u8, error: Error },
}

impl core::fmt::Display for InitError {
    #[inline]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match *self {
            Self::Missing { id } => write!(
                f,
                "Servo ID {id} didn't answer {PING_ATTEMPTS} pings while initializing"
            ),
            Self::ModelNumber { id, ref error } => write!(
                f,
                "Error reading the model number of servo ID {id} while initializing: {error}"
            ),
            Self::UnsupportedModel { id, model } => write!(
                f,
                "Servo ID {id} has unsupported model number {model:#06X}"
            ),
            Self::Defaults { address, ref error } => write!(
                f,
                "Error writing a default to register {address:#04X} while initializing: {error}"
            ),
        }
    }
}

#[inline]
fn status(response: Response) -> Result<Packet, Error> {
    match response {
        Ok(Some(packet)) => Ok(packet),
        // Every unicast read or ping expects a reply.
        Ok(None) => Err(Error::Io(IoError::WrongLength)),
        Err(e) => Err(Error::Io(e)),
    }
}

struct State<const N: usize> {
    servos: [Servo; N],
    packet: Packet,
}

impl<const N: usize> State<N> {
    #[inline]
    fn index(&self, index: usize) -> Result<usize, Error> {
        if index < N {
            Ok(index)
        } else {
            Err(Error::InvalidIndex { index, len: N })
        }
    }

    async fn sync_selected<M: RawMutex>(&mut self, bus: &Bus<M>, unselect: bool) -> Result<(), Error> {
        let Some(first) = self.servos.iter().find(|servo| servo.is_selected()) else {
            return Err(Error::NothingSelected);
        };
        let (address, width) = (first.address(), first.width());
        if self
            .servos
            .iter()
            .any(|servo| servo.is_selected() && (servo.address() != address || servo.width() != width))
        {
            return Err(Error::MixedBatch);
        }
        let mut sync = SyncWrite::init(&mut self.packet, address, width.bytes())?;
        for servo in self.servos.iter().filter(|servo| servo.is_selected()) {
            let () = sync.add_next(servo.id(), servo.data())?;
        }
        let size = sync.end()?;
        let _: Option<Packet> = bus.transfer(&self.packet, size).await?;
        if unselect {
            self.select_all(false);
        }
        Ok(())
    }

    async fn read_selected<M: RawMutex>(&mut self, bus: &Bus<M>, unselect: bool) -> Result<(), Error> {
        for servo in self.servos.iter_mut().filter(|servo| servo.is_selected()) {
            let size = send::read(
                &mut self.packet,
                servo.id(),
                servo.address(),
                servo.width() as u8,
            )?;
            let reply = status(bus.transfer(&self.packet, size).await)?;
            servo.store(reply.parameters(), reply.error());
        }
        if unselect {
            self.select_all(false);
        }
        Ok(())
    }

    async fn read_one<M: RawMutex>(
        &mut self,
        bus: &Bus<M>,
        index: usize,
        start_address: u8,
        into: &mut [u8],
    ) -> Result<(), Error> {
        let index = self.index(index)?;
        let Ok(len) = u8::try_from(into.len()) else {
            return Err(Error::Build(send::Error::ReplyTooLong {
                requested: into.len(),
            }));
        };
        let size = send::read(&mut self.packet, self.servos[index].id(), start_address, len)?;
        let reply = status(bus.transfer(&self.packet, size).await)?;
        let Some(data) = reply.parameters().get(..into.len()) else {
            return Err(Error::Io(IoError::WrongLength));
        };
        into.copy_from_slice(data);
        self.servos[index].set_last_error(reply.error());
        Ok(())
    }

    async fn ping_servo<M: RawMutex>(&mut self, bus: &Bus<M>, index: usize) -> Result<(), Error> {
        let index = self.index(index)?;
        let size = send::ping(&mut self.packet, self.servos[index].id())?;
        let reply = status(bus.transfer(&self.packet, size).await)?;
        self.servos[index].set_last_error(reply.error());
        Ok(())
    }

    #[inline]
    fn select_all(&mut self, selected: bool) {
        for servo in &mut self.servos {
            servo.select(selected);
        }
    }

    #[inline]
    fn prepare_all_u8(&mut self, address: u8, value: u8) {
        for servo in &mut self.servos {
            servo.prepare_u8(address, value);
        }
    }

    #[inline]
    fn prepare_all_u16(&mut self, address: u8, value: u16) {
        for servo in &mut self.servos {
            servo.prepare_u16(address, value);
        }
    }

    #[inline]
    fn prepare_selected_u8(&mut self, address: u8, value: u8) {
        for servo in self.servos.iter_mut().filter(|servo| servo.is_selected()) {
            servo.prepare_u8(address, value);
        }
    }

    #[inline]
    fn prepare_selected_u16(&mut self, address: u8, value: u16) {
        for servo in self.servos.iter_mut().filter(|servo| servo.is_selected()) {
            servo.prepare_u16(address, value);
        }
    }

    async fn initialize<M: RawMutex>(&mut self, bus: &Bus<M>) -> Result<(), InitError> {
        info!("Initializing a group of {} servos", N);

        for index in 0..N {
            let id = self.servos[index].id();
            let mut alive = false;
            for attempt in 1..=PING_ATTEMPTS {
                match self.ping_servo(bus, index).await {
                    Ok(()) => {
                        alive = true;
                        break;
                    }
                    Err(e) => debug!("Ping {} of ID {} failed: {}", attempt, id, e),
                }
            }
            if !alive {
                return Err(InitError::Missing { id });
            }
        }

        for index in 0..N {
            let id = self.servos[index].id();
            let mut bytes = [0; control_table::ModelNumber::BYTES as usize];
            let () = self
                .read_one(bus, index, control_table::ModelNumber::ADDRESS, &mut bytes)
                .await
                .map_err(|error| InitError::ModelNumber { id, error })?;
            let model = u16::from_le_bytes(bytes);
            if !SUPPORTED_MODELS.contains(&model) {
                return Err(InitError::UnsupportedModel { id, model });
            }
            debug!("ID {} is model {=u16:X}", id, model);
        }

        for (address, value) in [
            (control_table::TorqueEnable::ADDRESS, 0),
            (control_table::AlarmLed::ADDRESS, ALARM_LED.bits()),
            (control_table::AlarmShutdown::ADDRESS, ALARM_SHUTDOWN.bits()),
        ] {
            self.prepare_all_u8(address, value);
            let () = self
                .sync_selected(bus, true)
                .await
                .map_err(|error| InitError::Defaults { address, error })?;
        }

        Ok(())
    }
}

/// Tasks that can park in [`ServoGroup::lock`] at once before the rest get
/// woken early (they re-register on their next poll).
const READY_WAKERS: usize = 4;

struct ReadyState {
    open: bool,
    waiters: MultiWakerRegistration<READY_WAKERS>,
}

/// Closed until the group has been initialized, then open for good.
struct Ready<M: RawMutex> {
    inner: blocking_mutex::Mutex<M, RefCell<ReadyState>>,
}

impl<M: RawMutex> Ready<M> {
    #[inline]
    const fn new() -> Self {
        Self {
            inner: blocking_mutex::Mutex::new(RefCell::new(ReadyState {
                open: false,
                waiters: MultiWakerRegistration::new(),
            })),
        }
    }

    #[inline]
    fn is_open(&self) -> bool {
        self.inner.lock(|state| state.borrow().open)
    }

    fn open(&self) {
        self.inner.lock(|state| {
            let mut state = state.borrow_mut();
            state.open = true;
            state.waiters.wake();
        })
    }

    async fn wait(&self) {
        poll_fn(|cx| {
            self.inner.lock(|state| {
                let mut state = state.borrow_mut();
                if state.open {
                    Poll::Ready(())
                } else {
                    state.waiters.register(cx.waker());
                    Poll::Pending
                }
            })
        })
        .await
    }
}

pub struct ServoGroup<'bus, M: RawMutex, const N: usize> {
    bus: &'bus Bus<M>,
    state: Mutex<M, State<N>>,
    ready: Ready<M>,
}

impl<'bus, M: RawMutex, const N: usize> ServoGroup<'bus, M, N> {
    /// A 16-bit sync-write to the whole group has to fit in one packet.
    const FITS_ONE_PACKET: () = assert!(
        N > 0 && 2 + N * 3 <= MAX_PARAMETERS,
        "A servo group must hold between 1 and 7 servos"
    );

    /// No communication happens until [`Self::initialize`].
    #[inline]
    pub const fn new(bus: &'bus Bus<M>, servos: [Servo; N]) -> Self {
        let () = Self::FITS_ONE_PACKET;
        Self {
            bus,
            state: Mutex::new(State {
                servos,
                packet: Packet::new(),
            }),
            ready: Ready::new(),
        }
    }

    /// Check every servo is there and supported, then write defaults:
    /// torque off, every alarm on the LED, and shutdown on overheating or bad voltage.
    ///
    /// Does nothing once it has succeeded. Until then, [`Self::lock`] waits.
    pub async fn initialize(&self) -> Result<(), InitError> {
        let mut state = self.state.lock().await;
        if self.ready.is_open() {
            return Ok(());
        }
        match state.initialize(self.bus).await {
            Ok(()) => {
                info!("Servo group initialized");
                self.ready.open();
                Ok(())
            }
            Err(e) => {
                warn!("Couldn't initialize servo group: {}", e);
                Err(e)
            }
        }
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.ready.is_open()
    }

    /// Exclusive access until the returned batch is dropped.
    /// Waits for [`Self::initialize`] to succeed first.
    #[inline]
    pub async fn lock(&self) -> Batch<'_, 'bus, M, N> {
        self.ready.wait().await;
        Batch {
            bus: self.bus,
            state: self.state.lock().await,
        }
    }

    /// Like [`Self::lock`], but refuses instead of waiting for initialization.
    #[inline]
    pub async fn try_lock(&self) -> Result<Batch<'_, 'bus, M, N>, Error> {
        if !self.ready.is_open() {
            return Err(Error::Uninitialized);
        }
        Ok(Batch {
            bus: self.bus,
            state: self.state.lock().await,
        })
    }
}

/// Exclusive access to an initialized [`ServoGroup`].
pub struct Batch<'group, 'bus, M: RawMutex, const N: usize> {
    bus: &'bus Bus<M>,
    state: MutexGuard<'group, M, State<N>>,
}

impl<M: RawMutex, const N: usize> Batch<'_, '_, M, N> {
    /// Write every selected servo's staged data in one broadcast sync-write.
    #[inline]
    pub async fn sync_selected(&mut self, unselect: bool) -> Result<(), Error> {
        self.state.sync_selected(self.bus, unselect).await
    }

    /// Read every selected servo's staged address, one servo at a time,
    /// stopping at the first failure.
    #[inline]
    pub async fn read_selected(&mut self, unselect: bool) -> Result<(), Error> {
        self.state.read_selected(self.bus, unselect).await
    }

    /// Read `into.len()` bytes starting at `start_address` from one servo.
    #[inline]
    pub async fn read_one(
        &mut self,
        index: usize,
        start_address: u8,
        into: &mut [u8],
    ) -> Result<(), Error> {
        self.state
            .read_one(self.bus, index, start_address, into)
            .await
    }

    #[inline]
    pub async fn ping_servo(&mut self, index: usize) -> Result<(), Error> {
        self.state.ping_servo(self.bus, index).await
    }

    #[inline]
    pub fn select_all(&mut self, selected: bool) {
        self.state.select_all(selected)
    }

    #[inline]
    pub fn prepare_all_u8(&mut self, address: u8, value: u8) {
        self.state.prepare_all_u8(address, value)
    }

    #[inline]
    pub fn prepare_all_u16(&mut self, address: u8, value: u16) {
        self.state.prepare_all_u16(address, value)
    }

    #[inline]
    pub fn prepare_selected_u8(&mut self, address: u8, value: u8) {
        self.state.prepare_selected_u8(address, value)
    }

    #[inline]
    pub fn prepare_selected_u16(&mut self, address: u8, value: u16) {
        self.state.prepare_selected_u16(address, value)
    }

    #[inline]
    pub fn servo(&self, index: usize) -> Result<&Servo, Error> {
        let index = self.state.index(index)?;
        Ok(&self.state.servos[index])
    }

    #[inline]
    pub fn servo_mut(&mut self, index: usize) -> Result<&mut Servo, Error> {
        let index = self.state.index(index)?;
        Ok(&mut self.state.servos[index])
    }

    #[inline(always)]
    pub const fn len(&self) -> usize {
        N
    }

    #[inline(always)]
    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    #[inline]
    pub fn servos(&self) -> &[Servo; N] {
        &self.state.servos
    }
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::{
            test_util::{Fault, Line, TestBus, drive},
            worker::{Timing, Worker},
        },
        ax_packet::{constants::BROADCAST_ID, send::Instruction},
        embassy_futures::{
            join::{join, join_array},
            poll_once,
        },
        embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex,
    };

    const TIMING: Timing = Timing {
        max_wait_per_byte_us: 100,
        return_delay_us: 500,
    };

    const SERVOS: [Servo; 3] = [Servo::new(1), Servo::new(2), Servo::new(3)];

    fn sync_writes(line: &Line<'_>) -> usize {
        line.received()
            .iter()
            .filter(|packet| packet.instruction() == Instruction::SyncWrite.repr())
            .count()
    }

    #[test]
    fn locked_out_until_initialized() {
        let bus = TestBus::new();
        let line = Line::with_servos(&bus, &[1, 2, 3]);
        let mut worker = Worker::new(&bus, line.clone(), TIMING);
        let group = ServoGroup::new(&bus, SERVOS);
        drive(&mut worker, async {
            assert!(matches!(group.try_lock().await, Err(Error::Uninitialized)));
            assert!(!group.is_initialized());
            assert_eq!(group.initialize().await, Ok(()));
            assert!(group.is_initialized());
            assert!(group.try_lock().await.is_ok());
        });
        assert!(!line.received().is_empty());
    }

    #[test]
    fn initialize_writes_defaults() {
        let bus = TestBus::new();
        let line = Line::with_servos(&bus, &[1, 2, 3]);
        line.set_register(3, control_table::ModelNumber::ADDRESS, &AX18_MODEL.to_le_bytes());
        let mut worker = Worker::new(&bus, line.clone(), TIMING);
        let group = ServoGroup::new(&bus, SERVOS);
        assert_eq!(drive(&mut worker, group.initialize()), Ok(()));
        for id in 1..=3 {
            assert_eq!(line.register(id, control_table::TorqueEnable::ADDRESS), 0);
            assert_eq!(line.register(id, control_table::AlarmLed::ADDRESS), 0x7F);
            assert_eq!(line.register(id, control_table::AlarmShutdown::ADDRESS), 0x05);
        }
        assert_eq!(sync_writes(&line), 3);
        assert!(
            line.received()
                .iter()
                .filter(|packet| packet.instruction() == Instruction::SyncWrite.repr())
                .all(|packet| packet.id() == BROADCAST_ID)
        );
    }

    #[test]
    fn initialize_is_idempotent() {
        let bus = TestBus::new();
        let line = Line::with_servos(&bus, &[1, 2, 3]);
        let mut worker = Worker::new(&bus, line.clone(), TIMING);
        let group = ServoGroup::new(&bus, SERVOS);
        assert_eq!(drive(&mut worker, group.initialize()), Ok(()));
        let sent = line.received().len();
        assert_eq!(drive(&mut worker, group.initialize()), Ok(()));
        assert_eq!(line.received().len(), sent);
    }

    #[test]
    fn missing_servo_gets_three_pings() {
        let bus = TestBus::new();
        let line = Line::with_servos(&bus, &[1, 3]);
        let mut worker = Worker::new(&bus, line.clone(), TIMING);
        let group = ServoGroup::new(&bus, SERVOS);
        assert_eq!(
            drive(&mut worker, group.initialize()),
            Err(InitError::Missing { id: 2 }),
        );
        let pings_to_2 = line
            .received()
            .iter()
            .filter(|packet| packet.id() == 2 && packet.instruction() == Instruction::Ping.repr())
            .count();
        assert_eq!(pings_to_2, PING_ATTEMPTS);
        assert_eq!(sync_writes(&line), 0);
        assert!(matches!(
            drive(&mut worker, group.try_lock()),
            Err(Error::Uninitialized),
        ));
        let mut lock = core::pin::pin!(group.lock());
        assert!(poll_once(lock.as_mut()).is_pending());
    }

    #[test]
    fn unsupported_model_is_refused() {
        let bus = TestBus::new();
        let line = Line::with_servos(&bus, &[1, 2, 3]);
        line.set_register(2, control_table::ModelNumber::ADDRESS, &[0x1D, 0x00]);
        let mut worker = Worker::new(&bus, line.clone(), TIMING);
        let group = ServoGroup::new(&bus, SERVOS);
        assert_eq!(
            drive(&mut worker, group.initialize()),
            Err(InitError::UnsupportedModel { id: 2, model: 0x1D }),
        );
        assert_eq!(line.register(1, control_table::TorqueEnable::ADDRESS), 1);
    }

    #[test]
    fn unreadable_model_number() {
        let bus = TestBus::new();
        let line = Line::with_servos(&bus, &[1, 2, 3]);
        line.inject(Fault::SilentReads(3));
        let mut worker = Worker::new(&bus, line.clone(), TIMING);
        let group = ServoGroup::new(&bus, SERVOS);
        assert_eq!(
            drive(&mut worker, group.initialize()),
            Err(InitError::ModelNumber {
                id: 3,
                error: Error::Io(IoError::ReadTimeout)
            }),
        );
    }

    #[test]
    fn lock_waits_for_initialize() {
        let bus = TestBus::new();
        let line = Line::with_servos(&bus, &[1, 2, 3]);
        let mut worker = Worker::new(&bus, line.clone(), TIMING);
        let group = ServoGroup::new(&bus, SERVOS);
        let (initialized, locked) = drive(
            &mut worker,
            join(group.initialize(), async { group.lock().await.len() }),
        );
        assert_eq!(initialized, Ok(()));
        assert_eq!(locked, 3);
    }

    #[test]
    fn lock_before_initialize_waits_instead_of_refusing() {
        let bus = TestBus::new();
        let line = Line::with_servos(&bus, &[1, 2, 3]);
        let mut worker = Worker::new(&bus, line.clone(), TIMING);
        let group = ServoGroup::new(&bus, SERVOS);
        let (locked, initialized) = drive(
            &mut worker,
            join(
                async {
                    let batch = group.lock().await;
                    (batch.len(), line.received().len())
                },
                group.initialize(),
            ),
        );
        assert_eq!(initialized, Ok(()));
        // Nothing was sent after the lock was granted: setup had already finished.
        assert_eq!(locked, (3, line.received().len()));
    }

    #[test]
    fn several_early_lockers_are_released() {
        let bus = TestBus::new();
        let line = Line::with_servos(&bus, &[1, 2, 3]);
        let mut worker = Worker::new(&bus, line.clone(), TIMING);
        let group = ServoGroup::new(&bus, SERVOS);
        let shared = &group;
        let lockers: [_; READY_WAKERS + 2] =
            core::array::from_fn(|_| async move { shared.lock().await.len() });
        let (lens, initialized) = drive(&mut worker, join(join_array(lockers), group.initialize()));
        assert_eq!(initialized, Ok(()));
        assert_eq!(lens, [3; READY_WAKERS + 2]);
    }

    fn line_and_worker<'bus>(
        bus: &'bus TestBus,
        ids: &[u8],
    ) -> (Line<'bus>, Worker<'bus, CriticalSectionRawMutex, Line<'bus>>) {
        let line = Line::with_servos(bus, ids);
        let worker = Worker::new(bus, line.clone(), TIMING);
        (line, worker)
    }

    #[test]
    fn sync_selected_writes_each_servo() {
        let bus = TestBus::new();
        let (line, mut worker) = line_and_worker(&bus, &[1, 2, 3]);
        let group = ServoGroup::new(&bus, SERVOS);
        let before = drive(&mut worker, async {
            group.initialize().await.unwrap();
            let mut batch = group.lock().await;
            for (index, position) in [(0, 0x0100), (2, 0x03FF)] {
                batch
                    .servo_mut(index)
                    .unwrap()
                    .prepare_u16(control_table::GoalPosition::ADDRESS, position);
            }
            let before = line.received().len();
            batch.sync_selected(true).await.unwrap();
            assert!(batch.servos().iter().all(|servo| !servo.is_selected()));
            before
        });
        assert_eq!(line.received().len(), before + 1);
        let goal = control_table::GoalPosition::ADDRESS;
        assert_eq!(line.register_u16(1, goal), 0x0100);
        assert_eq!(line.register_u16(2, goal), 0x0000);
        assert_eq!(line.register_u16(3, goal), 0x03FF);
    }

    #[test]
    fn sync_selected_can_keep_the_selection() {
        let bus = TestBus::new();
        let (line, mut worker) = line_and_worker(&bus, &[1, 2, 3]);
        let group = ServoGroup::new(&bus, SERVOS);
        drive(&mut worker, async {
            group.initialize().await.unwrap();
            let mut batch = group.lock().await;
            batch.prepare_all_u8(control_table::Led::ADDRESS, 1);
            batch.sync_selected(false).await.unwrap();
            assert!(batch.servos().iter().all(Servo::is_selected));
            batch.prepare_selected_u8(control_table::Led::ADDRESS, 0);
            batch.sync_selected(true).await.unwrap();
        });
        for id in 1..=3 {
            assert_eq!(line.register(id, control_table::Led::ADDRESS), 0);
        }
    }

    #[test]
    fn sync_selected_preconditions() {
        let bus = TestBus::new();
        let (line, mut worker) = line_and_worker(&bus, &[1, 2, 3]);
        let group = ServoGroup::new(&bus, SERVOS);
        drive(&mut worker, async {
            group.initialize().await.unwrap();
            let sent = line.received().len();
            let mut batch = group.lock().await;
            assert_eq!(batch.sync_selected(true).await, Err(Error::NothingSelected));

            batch.servo_mut(0).unwrap().prepare_u8(control_table::Led::ADDRESS, 1);
            batch
                .servo_mut(1)
                .unwrap()
                .prepare_u16(control_table::GoalPosition::ADDRESS, 512);
            assert_eq!(batch.sync_selected(true).await, Err(Error::MixedBatch));

            batch.servo_mut(1).unwrap().prepare_u16(control_table::Led::ADDRESS, 1);
            assert_eq!(batch.sync_selected(true).await, Err(Error::MixedBatch));

            assert_eq!(line.received().len(), sent);
        });
    }

    #[test]
    fn read_selected_stores_data_and_errors() {
        let bus = TestBus::new();
        let (line, mut worker) = line_and_worker(&bus, &[1, 2, 3]);
        let position = control_table::PresentPosition::ADDRESS;
        line.set_register(1, position, &0x0123_u16.to_le_bytes());
        line.set_register(3, position, &0x0321_u16.to_le_bytes());
        line.set_alarm(3, Alarm::from(Flag::Overload));
        let group = ServoGroup::new(&bus, SERVOS);
        drive(&mut worker, async {
            group.initialize().await.unwrap();
            let mut batch = group.lock().await;
            batch.servo_mut(0).unwrap().prepare_u16(position, 0);
            batch.servo_mut(2).unwrap().prepare_u16(position, 0);
            batch.read_selected(true).await.unwrap();
            assert_eq!(batch.servo(0).unwrap().data_u16(), 0x0123);
            assert_eq!(batch.servo(2).unwrap().data_u16(), 0x0321);
            assert!(batch.servo(0).unwrap().last_error().is_ok());
            assert!(batch.servo(2).unwrap().last_error().contains(Flag::Overload));
            assert!(!batch.servo(1).unwrap().is_selected());
        });
    }

    #[test]
    fn read_selected_stops_at_the_first_failure() {
        let bus = TestBus::new();
        let (line, mut worker) = line_and_worker(&bus, &[1, 2, 3]);
        let group = ServoGroup::new(&bus, SERVOS);
        drive(&mut worker, group.initialize()).unwrap();
        line.inject(Fault::SilentReads(2));
        let temperature = control_table::PresentTemperature::ADDRESS;
        line.set_register(1, temperature, &[31]);
        line.set_register(3, temperature, &[33]);
        drive(&mut worker, async {
            let mut batch = group.lock().await;
            batch.prepare_all_u8(temperature, 0);
            assert_eq!(
                batch.read_selected(true).await,
                Err(Error::Io(IoError::ReadTimeout)),
            );
            assert_eq!(batch.servo(0).unwrap().data_u8(), 31);
            assert_eq!(batch.servo(2).unwrap().data_u8(), 0);
            // Still selected: the batch didn't complete.
            assert!(batch.servo(2).unwrap().is_selected());
        });
        let read_3 = line.received().into_iter().any(|packet| {
            packet.id() == 3
                && packet.instruction() == Instruction::Read.repr()
                && packet.parameters()[0] == temperature
        });
        assert!(!read_3);
    }

    #[test]
    fn read_one_and_ping() {
        let bus = TestBus::new();
        let (line, mut worker) = line_and_worker(&bus, &[1, 2, 3]);
        line.set_register(2, control_table::PresentPosition::ADDRESS, &[1, 2, 3, 4, 5, 6]);
        let group = ServoGroup::new(&bus, SERVOS);
        drive(&mut worker, async {
            group.initialize().await.unwrap();
            let mut batch = group.lock().await;
            let mut into = [0; 6];
            batch
                .read_one(1, control_table::PresentPosition::ADDRESS, &mut into)
                .await
                .unwrap();
            assert_eq!(into, [1, 2, 3, 4, 5, 6]);
            assert_eq!(batch.ping_servo(2).await, Ok(()));
            assert_eq!(
                batch.ping_servo(3).await,
                Err(Error::InvalidIndex { index: 3, len: 3 }),
            );
            assert_eq!(
                batch.read_one(7, 0, &mut into).await,
                Err(Error::InvalidIndex { index: 7, len: 3 }),
            );
            assert!(batch.servo(3).is_err());
            assert_eq!(batch.len(), 3);
        });
    }
}
