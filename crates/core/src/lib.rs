#![deny(warnings)]

pub mod analysis;
pub mod capture;
pub mod config;
pub mod decode;
pub mod emotion;
pub mod fusion;
pub mod pipeline;
pub mod synth;
