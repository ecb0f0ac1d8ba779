mod common;
mod config_loading;
mod safety_stop;
mod session;
