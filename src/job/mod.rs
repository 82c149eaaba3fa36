/// Progress stages, sinks and cancellation.
pub mod progress;
/// Job registry and subscriptions.
pub mod registry;
/// Job execution and handles.
pub mod render;
