pub mod reconciler;
pub mod seed;
pub mod service;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;
