//! Runtime power-management glue for the always-on auxiliary clock.

use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::bus::RegisterBus;
use crate::codec::Codec;
use crate::registry::ComponentRegistrar;

impl<'a, M, B, R> Codec<'a, M, B, R>
where
    M: RawMutex,
    B: RegisterBus,
    R: ComponentRegistrar,
{
    /// Enable the auxiliary clock. A failure is logged, never returned.
    pub fn runtime_resume(&self) {
        let Some(clock) = self.aux_clock else {
            debug!("runtime resume: no auxiliary clock");
            return;
        };
        if let Err(err) = clock.set_clock(true) {
            error!("runtime resume: auxiliary clock enable failed: {}", err);
        }
    }

    /// Disable the auxiliary clock under the shared lock.
    pub fn runtime_suspend(&self) {
        let Some(clock) = self.aux_clock else {
            debug!("runtime suspend: no auxiliary clock");
            return;
        };
        self.shared.critical(|_| {
            if let Err(err) = clock.set_clock(false) {
                error!("runtime suspend: auxiliary clock disable failed: {}", err);
            }
        });
    }
}
