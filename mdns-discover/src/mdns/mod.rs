pub mod browser;
#[cfg(test)]
pub mod scripted;

pub use browser::{EntryStream, MdnsResolver, RawEntry, Resolver};
