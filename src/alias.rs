//! # Class Alias Registry
//!
//! Type tags on the wire are opaque strings. The alias registry shortens
//! them: a producer configured with `Outer.Inner.OrderEvent -> OrderEvent`
//! writes the short form, and a consumer resolves it back before consulting
//! the strategy table. The engine never interprets tags beyond this
//! substitution; initialization is the caller's responsibility.
//!
//! The registry is process-wide, read-mostly, and bidirectional. Lookups
//! that miss return the input unchanged, so an unconfigured process is
//! transparent.

use std::sync::OnceLock;

use hashbrown::HashMap;
use parking_lot::RwLock;

#[derive(Debug, Default)]
struct AliasMaps {
    alias_by_name: HashMap<String, String>,
    name_by_alias: HashMap<String, String>,
}

fn maps() -> &'static RwLock<AliasMaps> {
    static MAPS: OnceLock<RwLock<AliasMaps>> = OnceLock::new();
    MAPS.get_or_init(|| RwLock::new(AliasMaps::default()))
}

/// Registers `alias` as the wire form of `name`. Later registrations for
/// the same name win.
pub fn add_alias(name: &str, alias: &str) {
    let mut m = maps().write();
    m.alias_by_name.insert(name.to_string(), alias.to_string());
    m.name_by_alias.insert(alias.to_string(), name.to_string());
}

/// The tag to write for `name`: its alias if one is registered, else
/// `name` itself.
pub fn wire_tag(name: &str) -> String {
    let m = maps().read();
    m.alias_by_name.get(name).cloned().unwrap_or_else(|| name.to_string())
}

/// The full name for a tag read off the wire.
pub fn resolve(tag: &str) -> String {
    let m = maps().read();
    m.name_by_alias.get(tag).cloned().unwrap_or_else(|| tag.to_string())
}
