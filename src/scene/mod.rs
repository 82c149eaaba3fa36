/// Full-page assembly around the scene's markup, style and script.
pub mod document;
/// Render requests and their validation.
pub mod request;
