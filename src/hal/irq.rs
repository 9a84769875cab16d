//! Interrupt attachment collaborator.

use crate::driver::error::Result;

/// Opaque attachment token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IrqHandle(pub u32);

/// Attach the engine's handler to numbered interrupt lines.
///
/// When a line fires, the host calls [`Engine::handle_interrupt`] with the
/// line number and delivers the returned notification, if any.
///
/// [`Engine::handle_interrupt`]: crate::Engine::handle_interrupt
pub trait InterruptAttach {
    /// Route interrupt line `irq` to the engine
    fn attach(&self, irq: u32) -> Result<IrqHandle>;

    /// Undo an [`attach`](Self::attach)
    fn detach(&self, handle: IrqHandle);
}
