pub mod cronjobmanager;

pub use cronjobmanager::*;
