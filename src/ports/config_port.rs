//! Configuration access port trait.
//!
//! Numbers are read as strings and parsed by `domain::config`, so a malformed
//! value surfaces as an error instead of a silent default.

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;
}
