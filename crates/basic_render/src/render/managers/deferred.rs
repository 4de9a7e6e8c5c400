//! Deferred destruction bookkeeping shared by the resource managers
//!
//! Every record carries a defer counter. While its tracker is alive the
//! counter is reset to the pass' defer count; once the tracker expires each
//! pass decrements it until it falls to the release threshold, at which
//! point the native resource is destroyed.

/// Parameters of one garbage collection pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectPass {
    /// Value alive records are reset to; zero collects expired records at once
    pub defer_count: u32,
    /// Ignore defer counters entirely
    pub force: bool,
}

impl CollectPass {
    /// Regular per-frame pass
    ///
    /// Without valid dependent resources no frame can be in flight, so the
    /// defer window collapses to zero.
    pub const fn deferred(max_frames_in_flight: u32, dependent_resources_valid: bool) -> Self {
        Self {
            defer_count: if dependent_resources_valid { max_frames_in_flight } else { 0 },
            force: false,
        }
    }

    /// Pass used when the device is known to be idle
    pub const fn forced() -> Self {
        Self {
            defer_count: 0,
            force: true,
        }
    }
}

/// What a collection pass decided for one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectAction {
    /// Record stays
    Keep,
    /// Destroy the native resource and free the record
    Destroy,
}

/// Advance one record's defer counter and decide its fate
pub fn collect_step(alive: bool, defer_count: &mut u32, release_threshold: u32, pass: CollectPass) -> CollectAction {
    if alive {
        *defer_count = pass.defer_count;
        CollectAction::Keep
    } else if !pass.force && pass.defer_count > 0 && *defer_count > release_threshold {
        *defer_count -= 1;
        CollectAction::Keep
    } else {
        CollectAction::Destroy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DeferPolicy;

    /// Passes needed to destroy a record that expired right after creation
    fn passes_until_destroyed(max_frames_in_flight: u32, threshold: u32) -> u32 {
        let pass = CollectPass::deferred(max_frames_in_flight, true);
        let mut defer_count = max_frames_in_flight;
        let mut passes = 0;
        loop {
            passes += 1;
            if collect_step(false, &mut defer_count, threshold, pass) == CollectAction::Destroy {
                return passes;
            }
            assert!(passes < 100);
        }
    }

    #[test]
    fn test_static_release_after_n_passes() {
        let policy = DeferPolicy::default();
        for frames in 1..=4 {
            assert_eq!(passes_until_destroyed(frames, policy.threshold(false)), frames);
        }
    }

    #[test]
    fn test_dynamic_release_after_n_minus_one_passes() {
        let policy = DeferPolicy::default();
        for frames in 2..=4 {
            assert_eq!(passes_until_destroyed(frames, policy.threshold(true)), frames - 1);
        }
        // never fewer than one pass
        assert_eq!(passes_until_destroyed(1, policy.threshold(true)), 1);
    }

    #[test]
    fn test_alive_record_resets_counter() {
        let pass = CollectPass::deferred(3, true);
        let mut defer_count = 1;
        assert_eq!(collect_step(true, &mut defer_count, 1, pass), CollectAction::Keep);
        assert_eq!(defer_count, 3);
    }

    #[test]
    fn test_invalid_dependent_resources_collect_at_once() {
        let pass = CollectPass::deferred(3, false);
        let mut defer_count = 3;
        assert_eq!(collect_step(false, &mut defer_count, 1, pass), CollectAction::Destroy);
    }

    #[test]
    fn test_forced_pass_ignores_counter() {
        let mut defer_count = 3;
        assert_eq!(collect_step(false, &mut defer_count, 1, CollectPass::forced()), CollectAction::Destroy);

        let mut defer_count = 3;
        assert_eq!(collect_step(true, &mut defer_count, 1, CollectPass::forced()), CollectAction::Keep);
    }
}
