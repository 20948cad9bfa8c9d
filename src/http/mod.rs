//! Transport layer: the mockable HTTP client trait over reqwest and the
//! gateway that attaches credentials and drives the refresh-and-retry
//! protocol.

pub mod client;
pub mod gateway;

pub use client::{ApiResponse, Body, HttpClient, Method, MultipartForm, ReqwestHttpClient};
pub use gateway::{ApiRequest, HttpGateway};
