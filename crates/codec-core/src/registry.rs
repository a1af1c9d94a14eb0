//! Macro registry and the composite codec identity.
//!
//! Macros attach in any order. Once the expected number is present the
//! registry concatenates their DAI descriptors in identity order and makes
//! the one external registration call. The list is rebuilt the same way on
//! every completion, so DAI indices stay stable across detach/re-attach and
//! subsystem restarts.

use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::bus::RegisterBus;
use crate::codec::Codec;
use crate::config::MAX_COMPOSITE_DAIS;
use crate::error::CodecError;
use crate::ids::{DeviceId, MacroId, MacroOrigin, PerMacro, MACRO_COUNT};
use crate::ops::{
    DaiDescriptor, MacroEventHandler, MacroLifecycle, MacroOps, MacroPortMap, WakeIrq,
};
use crate::state::Detached;

/// External registration of the composite codec.
pub trait ComponentRegistrar: Sync {
    /// Publish the composite with `dais` as its interface list.
    fn register(&self, dais: &[DaiDescriptor]) -> Result<(), CodecError>;

    /// Withdraw the published composite.
    fn unregister(&self);
}

impl<T: ComponentRegistrar + ?Sized> ComponentRegistrar for &T {
    fn register(&self, dais: &[DaiDescriptor]) -> Result<(), CodecError> {
        (**self).register(dais)
    }

    fn unregister(&self) {
        (**self).unregister();
    }
}

/// Composite interface list, in identity order.
pub type CompositeDais = heapless::Vec<DaiDescriptor, MAX_COMPOSITE_DAIS>;

/// A freshly built composite, tagged so a late publication can tell whether
/// it is still current.
pub(crate) struct BuiltComposite {
    pub(crate) dais: CompositeDais,
    pub(crate) generation: u32,
}

/// One attached macro.
#[derive(Clone, Copy)]
pub(crate) struct MacroSlot<'a> {
    pub(crate) device: DeviceId,
    pub(crate) ops: MacroOps<'a>,
}

/// Attached macros and the composite built from them.
pub(crate) struct RegistryState<'a> {
    slots: PerMacro<Option<MacroSlot<'a>>>,
    attached: u8,
    expected: u8,
    composite: Option<CompositeDais>,
    generation: u32,
    published: bool,
}

impl<'a> RegistryState<'a> {
    pub(crate) fn new(expected: u8) -> Self {
        Self {
            slots: PerMacro::splat(None),
            attached: 0,
            expected,
            composite: None,
            generation: 0,
            published: false,
        }
    }

    pub(crate) fn slot(&self, id: MacroId) -> Option<&MacroSlot<'a>> {
        self.slots.get(id).as_ref()
    }

    pub(crate) fn is_attached(&self, id: MacroId) -> bool {
        self.slots.get(id).is_some()
    }

    pub(crate) fn attached_count(&self) -> u8 {
        self.attached
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.attached == self.expected
    }

    pub(crate) fn is_published(&self) -> bool {
        self.published
    }

    pub(crate) fn composite(&self) -> Option<&CompositeDais> {
        self.composite.as_ref()
    }

    /// Install `slot` under `id`. Re-attaching without a detach is rejected.
    pub(crate) fn admit(&mut self, id: MacroId, slot: MacroSlot<'a>) -> Result<(), CodecError> {
        if self.is_attached(id) || self.attached >= self.expected {
            return Err(CodecError::InvalidArgument);
        }
        let mut slot = slot;
        if id != MacroId::WAKE_OWNER {
            slot.ops.wake_irq = None;
        }
        *self.slots.get_mut(id) = Some(slot);
        self.attached = self.attached.saturating_add(1);
        Ok(())
    }

    /// Remove the slot under `id` if `device` owns it.
    ///
    /// Returns `None` when nothing matching was attached, otherwise whether a
    /// published composite must now be withdrawn.
    pub(crate) fn evict(&mut self, id: MacroId, device: DeviceId) -> Option<bool> {
        match self.slots.get(id) {
            Some(slot) if slot.device == device => {}
            _ => return None,
        }
        *self.slots.get_mut(id) = None;
        let was_complete = self.is_complete();
        self.attached = self.attached.saturating_sub(1);
        if !was_complete {
            return Some(false);
        }
        self.composite = None;
        Some(core::mem::take(&mut self.published))
    }

    /// Concatenate the attached macros' DAIs in identity order and keep the
    /// result as the unpublished composite.
    pub(crate) fn build_composite(&mut self) -> Result<BuiltComposite, CodecError> {
        let mut dais = CompositeDais::new();
        for (_, slot) in self.slots.iter() {
            let Some(slot) = slot else { continue };
            dais.extend_from_slice(slot.ops.dais)
                .map_err(|_| CodecError::ResourceExhausted)?;
        }
        self.composite = Some(dais.clone());
        self.generation = self.generation.wrapping_add(1);
        self.published = false;
        Ok(BuiltComposite {
            dais,
            generation: self.generation,
        })
    }

    /// Record that the composite of `generation` was registered. Returns
    /// `false` if a detach withdrew or replaced it in the meantime.
    pub(crate) fn mark_published(&mut self, generation: u32) -> bool {
        self.published = self.composite.is_some() && self.generation == generation;
        self.published
    }

    pub(crate) fn lifecycles(&self) -> heapless::Vec<(MacroId, &'a dyn MacroLifecycle), MACRO_COUNT> {
        self.collect(|ops| ops.lifecycle)
    }

    pub(crate) fn event_handlers(
        &self,
    ) -> heapless::Vec<(MacroId, &'a dyn MacroEventHandler), MACRO_COUNT> {
        self.collect(|ops| ops.events)
    }

    pub(crate) fn event_handler(&self, id: MacroId) -> Option<&'a dyn MacroEventHandler> {
        self.slot(id).and_then(|slot| slot.ops.events)
    }

    pub(crate) fn port_map(&self, id: MacroId) -> Option<&'a dyn MacroPortMap> {
        self.slot(id).and_then(|slot| slot.ops.port_map)
    }

    pub(crate) fn wake_irq(&self) -> Option<&'a dyn WakeIrq> {
        self.slot(MacroId::WAKE_OWNER).and_then(|slot| slot.ops.wake_irq)
    }

    fn collect<T>(
        &self,
        pick: impl Fn(&MacroOps<'a>) -> Option<T>,
    ) -> heapless::Vec<(MacroId, T), MACRO_COUNT> {
        let mut out = heapless::Vec::new();
        for (id, slot) in self.slots.iter() {
            if let Some(item) = slot.as_ref().and_then(|slot| pick(&slot.ops)) {
                // One entry per identity; capacity is MACRO_COUNT.
                let _ = out.push((id, item));
            }
        }
        out
    }
}

impl<'a, M, B, R> Codec<'a, M, B, R>
where
    M: RawMutex,
    B: RegisterBus,
    R: ComponentRegistrar,
{
    /// Attach macro `id`.
    ///
    /// The attach that completes the expected set builds the composite and
    /// publishes it. A failed publication is returned; the composite then
    /// stays built but unpublished until one macro detaches and attaches
    /// again.
    pub fn attach(&self, origin: MacroOrigin, id: MacroId, ops: MacroOps<'a>) -> Result<(), CodecError> {
        if origin.parent != self.config.device {
            error!("attach {}: {} is not a child of {}", id, origin.device, self.config.device);
            return Err(CodecError::InvalidArgument);
        }
        let slot = MacroSlot {
            device: origin.device,
            ops,
        };
        let composite = self.shared.with(|s| s.attach(id, slot)).map_err(|err| {
            error!("attach {} from {} rejected: {}", id, origin.device, err);
            err
        })?;
        debug!("{} attached from {}", id, origin.device);

        let Some(built) = composite else {
            return Ok(());
        };
        if let Err(err) = self.registrar.register(&built.dais) {
            error!("composite registration failed: {}", err);
            return Err(err);
        }
        if !self.shared.with(|s| s.registry.mark_published(built.generation)) {
            warn!("composite torn down during registration, withdrawing it");
            self.registrar.unregister();
            return Ok(());
        }
        debug!("composite published with {} DAIs", built.dais.len());
        Ok(())
    }

    /// Detach macro `id`. Unknown or foreign macros are logged and ignored.
    pub fn detach(&self, origin: MacroOrigin, id: MacroId) {
        if origin.parent != self.config.device {
            error!("detach {}: {} is not a child of {}", id, origin.device, self.config.device);
            return;
        }
        match self.shared.with(|s| s.detach(id, origin.device)) {
            Detached::Unknown => {
                error!("detach {}: not attached from {}", id, origin.device);
            }
            Detached::Cleared => debug!("{} detached", id),
            Detached::Unpublish => {
                debug!("{} detached, withdrawing composite", id);
                self.registrar.unregister();
            }
        }
    }

    /// Device that attached macro `id`, if any.
    pub fn lookup_device(&self, id: MacroId) -> Option<DeviceId> {
        self.shared.with(|s| s.registry.slot(id).map(|slot| slot.device))
    }

    /// Number of attached macros.
    pub fn attached_count(&self) -> u8 {
        self.shared.with(|s| s.registry.attached_count())
    }

    /// The built composite, published or not.
    pub fn composite_dais(&self) -> Option<CompositeDais> {
        self.shared.with(|s| s.registry.composite().cloned())
    }

    /// Whether the composite is currently registered externally.
    pub fn is_published(&self) -> bool {
        self.shared.with(|s| s.registry.is_published())
    }
}
