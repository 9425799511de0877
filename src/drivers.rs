//! Management controller drivers.

pub mod ipmitool;
