pub mod artifacts;
pub mod deletion;
pub mod detail;
pub mod registry;
pub mod upload;

#[cfg(test)]
pub(crate) mod testing;
