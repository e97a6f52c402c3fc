//! Fixed-period control loop.
//!
//! One tick, in order:
//! 1. honour a pending stop request (safe hold, then `Stopped`)
//! 2. commit a pending cross-thread mode switch
//! 3. `read`
//! 4. external compute through [`CommandHook`]
//! 5. `write`
//! 6. broadcaster update (never blocks)
//!
//! `run` paces ticks on absolute deadlines so a late tick does not shift the
//! ones after it.

use crate::broadcaster::ExternalTcpWrenchBroadcaster;
use crate::buffers::JointCommandBuffer;
use crate::cycle::{HardwareCycle, LifecycleState};
use manip_common::hal::config::HardwareConfig;
use manip_common::hal::error::HalError;
use manip_common::hal::types::{ControlMode, StateSnapshot};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// External compute step between `read` and `write`.
pub trait CommandHook {
    /// Fill `commands` for `mode` from the freshly read `state`.
    fn compute(&mut self, state: &StateSnapshot, mode: ControlMode, commands: &mut JointCommandBuffer);
}

impl<F> CommandHook for F
where
    F: FnMut(&StateSnapshot, ControlMode, &mut JointCommandBuffer),
{
    #[inline]
    fn compute(&mut self, state: &StateSnapshot, mode: ControlMode, commands: &mut JointCommandBuffer) {
        self(state, mode, commands);
    }
}

/// Result of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Keep ticking.
    Continue,
    /// The cycle left `Active` through a stop request.
    Stopped,
}

/// Timing statistics for RT loop monitoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimingStats {
    /// Number of ticks executed.
    pub cycle_count: u64,
    /// Ticks whose work exceeded the period.
    pub overruns: u64,
    /// Current run of back-to-back overruns.
    pub consecutive_overruns: u32,
    /// Maximum observed tick time [µs].
    pub max_cycle_time_us: u64,
    /// Sum of tick times for the average [µs].
    pub total_cycle_time_us: u64,
    /// Link faults that did not escalate.
    pub link_faults: u64,
    /// Ticks whose write was refused for a non-finite command.
    pub rejected_writes: u64,
    /// Ticks whose publication was skipped on a busy buffer.
    pub skipped_publishes: u64,
}

impl TimingStats {
    /// Mean tick time [µs].
    pub fn avg_cycle_time_us(&self) -> u64 {
        self.total_cycle_time_us.checked_div(self.cycle_count).unwrap_or(0)
    }
}

/// Drives a `HardwareCycle` and an optional wrench broadcaster at a fixed period.
pub struct ControlLoop {
    cycle: HardwareCycle,
    broadcaster: Option<ExternalTcpWrenchBroadcaster>,
    period: Duration,
    overrun_limit: u32,
    epoch: Instant,
    last_stamp_ns: u64,
    stats: TimingStats,
}

impl ControlLoop {
    /// Wrap an active cycle. Period and overrun limit come from `config`.
    pub fn new(
        cycle: HardwareCycle,
        broadcaster: Option<ExternalTcpWrenchBroadcaster>,
        config: &HardwareConfig,
    ) -> Self {
        Self {
            cycle,
            broadcaster,
            period: config.cycle_time(),
            overrun_limit: config.overrun_limit,
            epoch: Instant::now(),
            last_stamp_ns: 0,
            stats: TimingStats::default(),
        }
    }

    /// Execute one tick without sleeping.
    ///
    /// # Errors
    /// - `LinkFault` once faults escalate the cycle to `Faulted`
    /// - `DeadlineOverrun` after `overrun_limit` consecutive overruns (the
    ///   safe hold has been sent by then)
    /// - `InvalidState` if the cycle is not active
    pub fn tick<H: CommandHook + ?Sized>(&mut self, hook: &mut H) -> Result<TickOutcome, HalError> {
        let tick_start = Instant::now();

        if self.cycle.poll_stop_request()? {
            self.deactivate_broadcaster();
            return Ok(TickOutcome::Stopped);
        }
        self.cycle.apply_pending_mode_switch()?;

        match self.cycle.read() {
            Ok(snapshot) => {
                let mode = self.cycle.active_mode();
                hook.compute(&snapshot, mode, self.cycle.commands_mut());
                match self.cycle.write() {
                    Ok(()) => {}
                    Err(HalError::InvalidCommand { joint }) => {
                        self.stats.rejected_writes += 1;
                        debug!("Write refused: non-finite command on joint {}", joint);
                    }
                    Err(e) => self.on_link_error(e)?,
                }
                let stamp = self.next_stamp_ns();
                if let Some(broadcaster) = &self.broadcaster {
                    if !broadcaster.update(stamp, &snapshot) && broadcaster.is_active() {
                        self.stats.skipped_publishes += 1;
                    }
                }
            }
            // Last-known-good snapshot stays in place; skip compute and write.
            Err(e) => self.on_link_error(e)?,
        }

        self.record_timing(tick_start.elapsed())?;
        Ok(TickOutcome::Continue)
    }

    /// Tick at the configured period until stopped, faulted or `max_cycles`
    /// ticks have run. On reaching `max_cycles` the cycle is stopped with a
    /// safe hold.
    pub fn run<H: CommandHook + ?Sized>(
        &mut self,
        hook: &mut H,
        max_cycles: Option<u64>,
    ) -> Result<TimingStats, HalError> {
        info!(
            "Starting control loop (cycle_time={}us, overrun_limit={})",
            self.period.as_micros(),
            self.overrun_limit
        );

        let mut next = Instant::now();
        loop {
            if max_cycles.is_some_and(|max| self.stats.cycle_count >= max) {
                info!("Cycle budget reached, stopping");
                self.deactivate_broadcaster();
                self.cycle.stop()?;
                break;
            }
            if self.tick(hook)? == TickOutcome::Stopped {
                break;
            }

            next += self.period;
            let now = Instant::now();
            if now < next {
                std::thread::sleep(next - now);
            } else {
                // Behind schedule: restart pacing from now.
                next = now;
            }
        }

        info!(
            "Control loop stopped after {} cycles (overruns: {}, max={}us, avg={}us)",
            self.stats.cycle_count,
            self.stats.overruns,
            self.stats.max_cycle_time_us,
            self.stats.avg_cycle_time_us()
        );
        Ok(self.stats)
    }

    /// Timing statistics.
    pub fn stats(&self) -> &TimingStats {
        &self.stats
    }

    /// The driven cycle.
    pub fn cycle(&self) -> &HardwareCycle {
        &self.cycle
    }

    /// The driven cycle, mutably (between ticks only).
    pub fn cycle_mut(&mut self) -> &mut HardwareCycle {
        &mut self.cycle
    }

    /// The broadcaster, if any.
    pub fn broadcaster(&self) -> Option<&ExternalTcpWrenchBroadcaster> {
        self.broadcaster.as_ref()
    }

    /// Hand back the cycle and broadcaster.
    pub fn into_parts(self) -> (HardwareCycle, Option<ExternalTcpWrenchBroadcaster>) {
        (self.cycle, self.broadcaster)
    }

    /// Strictly increasing stamp since loop construction.
    fn next_stamp_ns(&mut self) -> u64 {
        let now = u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.last_stamp_ns = now.max(self.last_stamp_ns.saturating_add(1));
        self.last_stamp_ns
    }

    fn on_link_error(&mut self, e: HalError) -> Result<(), HalError> {
        if self.cycle.state() == LifecycleState::Faulted {
            error!("Control loop aborted: {}", e);
            self.deactivate_broadcaster();
            return Err(e);
        }
        if e.is_link_fault() {
            self.stats.link_faults += 1;
            return Ok(());
        }
        Err(e)
    }

    fn record_timing(&mut self, elapsed: Duration) -> Result<(), HalError> {
        let cycle_time_us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        let stats = &mut self.stats;
        stats.cycle_count += 1;
        stats.total_cycle_time_us = stats.total_cycle_time_us.saturating_add(cycle_time_us);
        stats.max_cycle_time_us = stats.max_cycle_time_us.max(cycle_time_us);

        if elapsed > self.period {
            stats.overruns += 1;
            stats.consecutive_overruns += 1;
            if stats.overruns <= 10 || stats.overruns % 1000 == 0 {
                warn!(
                    "Timing violation #{}: cycle took {}us (target {}us)",
                    stats.overruns,
                    cycle_time_us,
                    self.period.as_micros()
                );
            }
        } else {
            stats.consecutive_overruns = 0;
        }

        if stats.cycle_count % 1000 == 0 {
            debug!(
                "Control loop: {} cycles, avg={}us, max={}us, overruns={}",
                stats.cycle_count,
                stats.avg_cycle_time_us(),
                stats.max_cycle_time_us,
                stats.overruns
            );
        }

        let consecutive = stats.consecutive_overruns;
        if self.overrun_limit > 0 && consecutive >= self.overrun_limit {
            error!("{} consecutive overruns, stopping with safe hold", consecutive);
            self.deactivate_broadcaster();
            if let Err(e) = self.cycle.stop() {
                error!("Safe hold after overruns failed: {}", e);
            }
            return Err(HalError::DeadlineOverrun { consecutive });
        }
        Ok(())
    }

    fn deactivate_broadcaster(&mut self) {
        if let Some(broadcaster) = self.broadcaster.as_mut() {
            broadcaster.deactivate();
        }
    }
}
