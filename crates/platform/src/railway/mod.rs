//! Railway platform client.
//!
//! Every remote operation is one GraphQL document POSTed to the public API
//! (`RAILWAY_API_URL`, default `https://backboard.railway.com/graphql/v2`).

mod client;
mod graphql;

#[cfg(test)]
mod tests;

pub use client::RailwayClient;
