//! Layer set
//!
//! Named, boolean-gated musical voices. Toggling takes effect on the next
//! scheduled step; unknown keys are ignored.

use std::collections::BTreeMap;

use serde::Serialize;

/// Static description of one layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerSpec {
    pub name: &'static str,
    pub default_on: bool,
}

impl LayerSpec {
    pub const fn on(name: &'static str) -> Self {
        Self {
            name,
            default_on: true,
        }
    }

    pub const fn off(name: &'static str) -> Self {
        Self {
            name,
            default_on: false,
        }
    }
}

/// Enabled flags for an engine's layers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSet {
    layers: Vec<(&'static str, bool)>,
}

impl LayerSet {
    /// Layer set with every layer at its default state
    pub fn new(specs: &[LayerSpec]) -> Self {
        Self {
            layers: specs.iter().map(|s| (s.name, s.default_on)).collect(),
        }
    }

    fn find(&self, key: &str) -> Option<usize> {
        let key = key.trim();
        self.layers
            .iter()
            .position(|(name, _)| name.eq_ignore_ascii_case(key))
    }

    /// Flip one layer
    ///
    /// # Returns
    /// The new state, or `None` if the key names no layer
    pub fn toggle(&mut self, key: &str) -> Option<bool> {
        let index = self.find(key)?;
        let state = &mut self.layers[index].1;
        *state = !*state;
        Some(*state)
    }

    /// Force one layer on or off; returns false for unknown keys
    pub fn set(&mut self, key: &str, enabled: bool) -> bool {
        match self.find(key) {
            Some(index) => {
                self.layers[index].1 = enabled;
                true
            }
            None => false,
        }
    }

    pub fn is_enabled(&self, key: &str) -> bool {
        self.find(key).map(|i| self.layers[i].1).unwrap_or(false)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    /// Names of the enabled layers, in declaration order
    pub fn enabled(&self) -> Vec<&'static str> {
        self.layers
            .iter()
            .filter(|(_, on)| *on)
            .map(|(name, _)| *name)
            .collect()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.layers.iter().map(|(name, _)| *name).collect()
    }
}

/// Per-layer emission counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmissionStats {
    per_layer: BTreeMap<&'static str, u64>,
    total: u64,
}

impl EmissionStats {
    pub fn record(&mut self, layer: &'static str) {
        *self.per_layer.entry(layer).or_insert(0) += 1;
        self.total += 1;
    }

    /// Events emitted by `layer`
    pub fn count(&self, layer: &str) -> u64 {
        self.per_layer
            .iter()
            .find(|(name, _)| **name == layer)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn reset(&mut self) {
        self.per_layer.clear();
        self.total = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPECS: [LayerSpec; 3] = [
        LayerSpec::on("pulse"),
        LayerSpec::on("bass"),
        LayerSpec::off("arp"),
    ];

    #[test]
    fn test_defaults() {
        let layers = LayerSet::new(&SPECS);
        assert_eq!(layers.enabled(), vec!["pulse", "bass"]);
        assert_eq!(layers.names().len(), 3);
    }

    #[test]
    fn test_toggle_twice_is_identity() {
        let mut layers = LayerSet::new(&SPECS);
        let before = layers.clone();
        assert_eq!(layers.toggle("arp"), Some(true));
        assert_eq!(layers.toggle("arp"), Some(false));
        assert_eq!(layers, before);
    }

    #[test]
    fn test_unknown_key_is_ignored() {
        let mut layers = LayerSet::new(&SPECS);
        assert_eq!(layers.toggle("cowbell"), None);
        assert!(!layers.set("cowbell", true));
        assert!(!layers.is_enabled("cowbell"));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut layers = LayerSet::new(&SPECS);
        assert!(layers.set("BASS", false));
        assert!(!layers.is_enabled("bass"));
    }

    #[test]
    fn test_emission_stats() {
        let mut stats = EmissionStats::default();
        stats.record("pulse");
        stats.record("pulse");
        stats.record("bass");
        assert_eq!(stats.count("pulse"), 2);
        assert_eq!(stats.count("arp"), 0);
        assert_eq!(stats.total(), 3);
        stats.reset();
        assert_eq!(stats.total(), 0);
    }
}
