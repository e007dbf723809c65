#![allow(clippy::new_without_default)]

#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;

pub mod geo_utils;
pub mod gps_filter;
pub mod location_service;
pub mod logs;
pub mod route_api;
pub mod track_recorder;
pub mod uploader;
