//! Collaborators that sit outside the engine: the document renderer and the notification dispatcher.
pub mod json_renderer;
pub mod notifications;
