//! Deterministic composition planning for photo reels.
//!
//! Turns a set of still photos into a shot plan in five stages:
//!
//! 1. **Saliency**: crop each photo to the target aspect around its energy peak
//! 2. **Story lock**: validate the candidate ordering, assign beats, pick heroes,
//!    down-select, choose the hinge shot
//! 3. **Motion**: seeded Ken-Burns curves with hard safety clamps
//! 4. **Transitions**: an editorial rule table with continuity guards and budgets
//! 5. **Timeline**: holds, frame-quantized durations and overlap offsets
//!
//! # Architecture
//!
//! ```text
//! Input: photos + vision attributes + untrusted ordering
//!     │
//!     ▼
//! SaliencyPlanner (cached per image and aspect) → SaliencyPlan per photo
//!     │
//!     ▼
//! lock_story → StoryLock (ordered, down-selected shots)
//!     │
//!     ▼
//! MotionGenerator (seeded) → MotionSpec per shot
//!     │
//!     ▼
//! TransitionSelector → Transition per boundary
//!     │
//!     ▼
//! TimelineAssembler → Timeline (encoder contract)
//! ```
//!
//! Every stage is a pure function of its inputs and the seed; the only
//! mutable state is the saliency cache held by [`CompositionPlanner`].

pub mod config;
pub mod context;
pub mod motion;
pub mod rng;
pub mod saliency;
pub mod saliency_cache;
pub mod story_lock;
pub mod timeline;
pub mod transitions;


pub use config::{MotionConfig, PlannerConfig, SaliencyConfig, TimelineConfig, TransitionConfig};
pub use context::{
    output_frame_size, CompositionPlan, CompositionPlanner, ImageSource, PlanRequest, PlannerImage,
};
pub use motion::{validate_motion, MotionGenerator, MotionSample, MotionSampler, PackProfile};
pub use rng::SeededRng;
pub use saliency::{plan_saliency, EnergyMap, SaliencyPlanner};
pub use saliency_cache::{SaliencyCache, SaliencyKey};
pub use story_lock::{lock_story, target_shot_count, validate_ordering, StoryRequest};
pub use timeline::{validate_timeline, TimelineAssembler};
pub use transitions::{TransitionSelector, TransitionShot};
