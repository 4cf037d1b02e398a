pub mod clustering;
pub mod console;
pub mod dedupe;
pub mod environment;
pub mod event;
pub mod feed;
pub mod geo;
pub mod logging;
pub mod orchestrator;
pub mod region;

pub const TARGET_WEB_REQUEST: &str = "web_request";
pub const TARGET_PIPELINE: &str = "pipeline";
