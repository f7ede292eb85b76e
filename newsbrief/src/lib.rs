// Library interface for newsbrief modules
// This allows tests and other binaries to import modules

pub mod briefing;
pub mod fetcher;
pub mod model;
pub mod orchestrator;
pub mod settings;
pub mod storage;
pub mod worker;
