pub mod error;
pub mod net;
pub mod nix;
pub mod topo;

#[cfg(test)]
mod test;
