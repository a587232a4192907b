pub mod background;
pub mod collaborators;
pub mod orchestrator;
pub mod panel;
pub mod remote_classifier;
pub mod static_page;
