/// Non-blocking access to one half-duplex serial line.
///
/// `start_send` and `start_recv` only kick off a transfer. Whoever finishes it
/// (usually an interrupt or DMA handler) reports back through
/// [`Bus::notify`](crate::bus::Bus::notify).
pub trait Comm {
    type Error: crate::fmt::Format;

    fn start_send(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Start receiving exactly `len` bytes.
    fn start_recv(&mut self, len: usize) -> Result<(), Self::Error>;

    /// Copy whatever has arrived since `start_recv` into `buffer`; returns how many bytes.
    fn collect(&mut self, buffer: &mut [u8]) -> usize;

    /// Abort any transfer in flight and return the line to a known state.
    fn reset(&mut self) -> Result<(), Self::Error>;
}
