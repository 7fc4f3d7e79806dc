mod alarm;
mod coordinator;
mod format;
mod registry;
mod sequencer;

pub use alarm::{
    AlarmPresenter, AlarmProfile, AlarmRequest, AlarmTone, SubtaskSummary, VIBRATION_PATTERN_MS,
};
pub use coordinator::TaskCoordinator;
pub use format::format_hms;
pub use registry::{NotificationView, TimerRegistry};
pub use sequencer::{SequencerState, SubtaskSequencer, TimerProgress};
