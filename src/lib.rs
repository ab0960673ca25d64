pub mod axis;
pub mod config;
pub mod hal;
pub mod host_link;
pub mod machine;
pub mod protocol;
