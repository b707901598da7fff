//! Integration tests for the VM

pub mod helpers;

pub mod dispatch;
pub mod tco;
pub mod unpack;
