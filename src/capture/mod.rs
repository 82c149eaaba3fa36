/// Frame driver state machine and capture/encode hand-off.
pub mod driver;
/// Substitute frames for failed captures.
pub mod placeholder;
/// Frame schedule of a job.
pub mod timetable;
