//! Core library for the `tappy` weather client.
//!
//! This crate defines:
//! - The OpenWeather current-weather client and decoder
//! - Domain models for coordinates and decoded responses
//! - Display projection (unit conversions) and the display state it feeds
//! - Credential configuration
//!
//! It is used by `tappy-cli`, but can also be reused by other front ends.

pub mod client;
pub mod config;
pub mod display;
pub mod error;
pub mod model;

pub use client::{WeatherClient, decode_weather};
pub use config::Config;
pub use display::{DisplayState, WeatherDisplay, kelvin_to_celsius, kelvin_to_fahrenheit};
pub use error::FetchError;
pub use model::{AtmosphericInfo, Coordinate, Coordinates, WeatherCondition, WeatherInfo};
