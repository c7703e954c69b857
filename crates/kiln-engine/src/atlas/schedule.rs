use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::time::{FrameClock, ListenerToken, TickControl, TickEvent, TickListener};

use super::builder::{AtlasBuilder, BuildStatus};
use super::error::AtlasError;

impl AtlasBuilder {
    /// Starts a build and registers it as a continuation on `clock`.
    ///
    /// Each tick draws for `time_slice * interval` and yields. The listener
    /// removes itself once the build completes, fails, is stopped, or the
    /// builder is dropped. A frame whose source is busy during a tick is
    /// retried on the next one.
    pub fn build_async(
        builder: &Rc<RefCell<AtlasBuilder>>,
        clock: &mut FrameClock,
    ) -> Result<ListenerToken, AtlasError> {
        let (build_id, orphaned) = {
            let mut b = builder.borrow_mut();
            (b.begin_build()?, b.orphan_flag())
        };
        let token = clock.add_listener(AsyncBuild {
            builder: Rc::downgrade(builder),
            build_id,
            orphaned,
        });
        log::debug!("AtlasBuilder: build {build_id} scheduled on clock ({token:?})");
        Ok(token)
    }
}

/// Tick listener that advances one build by one step per tick.
struct AsyncBuild {
    builder: Weak<RefCell<AtlasBuilder>>,
    build_id: u64,
    orphaned: Rc<Cell<Option<u64>>>,
}

impl TickListener for AsyncBuild {
    fn on_tick(&mut self, event: &TickEvent) -> TickControl {
        let Some(shared) = self.builder.upgrade() else {
            return TickControl::Remove;
        };
        let Ok(mut builder) = shared.try_borrow_mut() else {
            log::debug!("AtlasBuilder: busy during tick, retrying build {} next tick", self.build_id);
            return TickControl::Continue;
        };

        if builder.active_build() != Some(self.build_id) {
            return TickControl::Remove;
        }

        let budget = builder.step_budget(event.interval_ms);
        match builder.step(budget) {
            Ok(BuildStatus::InProgress(_)) => TickControl::Continue,
            Ok(BuildStatus::Complete) => TickControl::Remove,
            Err(AtlasError::SourceBusy { frame }) => {
                log::debug!("AtlasBuilder: build {} waiting on frame {frame}", self.build_id);
                TickControl::Continue
            }
            Err(err) => {
                log::warn!("AtlasBuilder: build {} step failed: {err}", self.build_id);
                TickControl::Remove
            }
        }
    }
}

/// A continuation dropped mid-build (e.g. by `FrameClock::stop`) aborts its
/// build, right away or on the builder's next mutable call if it is borrowed.
impl Drop for AsyncBuild {
    fn drop(&mut self) {
        let Some(shared) = self.builder.upgrade() else {
            return;
        };
        match shared.try_borrow_mut() {
            Ok(mut builder) => {
                if builder.active_build() == Some(self.build_id) {
                    log::debug!("AtlasBuilder: continuation for build {} dropped", self.build_id);
                    builder.stop();
                }
            }
            // Build ids only grow, so the newest orphan is the only one that can still be live.
            Err(_) => self.orphaned.set(self.orphaned.get().max(Some(self.build_id))),
        };
    }
}
