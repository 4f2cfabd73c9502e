//! Port traits: the seams between the stitching core and its collaborators.

pub mod broker_port;
pub mod config_port;
pub mod status_port;
