//! The ordered pipeline table and per-phase scheduling policy.
//!
//! Policy lives on the phase definition itself so the engine never
//! special-cases a phase by name when deciding how to schedule it.

use crate::models::PublicationPhase;

/// How chapters are moved through a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingPolicy {
    /// One task per chapter, spawned together and joined. A chapter's
    /// failure never aborts its siblings.
    ConcurrentFanOut,
    /// Chapters processed one at a time, in spec order.
    Serial,
}

/// One pipeline stage plus how chapters are scheduled through it.
#[derive(Debug, Clone, Copy)]
pub struct PhaseDef {
    pub phase: PublicationPhase,
    pub policy: SchedulingPolicy,
}

/// The pipeline, in execution order. Terminal states are outcomes, not
/// stages, and do not appear here.
///
/// Research is the only fan-out stage: source fetches are independent
/// per chapter. Every generation-backed stage downstream is serial on
/// purpose. The generation provider is a shared, rate-limited resource,
/// and serial order caps it at one in-flight call.
pub fn schedule() -> Vec<PhaseDef> {
    vec![
        PhaseDef {
            phase: PublicationPhase::Research,
            policy: SchedulingPolicy::ConcurrentFanOut,
        },
        PhaseDef {
            phase: PublicationPhase::Drafting,
            policy: SchedulingPolicy::Serial,
        },
        PhaseDef {
            phase: PublicationPhase::Spinning,
            policy: SchedulingPolicy::Serial,
        },
        PhaseDef {
            phase: PublicationPhase::Review,
            policy: SchedulingPolicy::Serial,
        },
        PhaseDef {
            phase: PublicationPhase::HumanReview,
            policy: SchedulingPolicy::Serial,
        },
        PhaseDef {
            phase: PublicationPhase::Finalization,
            policy: SchedulingPolicy::Serial,
        },
        PhaseDef {
            phase: PublicationPhase::Publication,
            policy: SchedulingPolicy::Serial,
        },
    ]
}
