pub mod archive;
pub mod audit;
pub mod chunk;
pub mod compress;
pub mod config;
pub mod orchestrator;
pub mod paths;
pub mod session;
pub mod util;
pub mod warn;
pub mod workarea;
