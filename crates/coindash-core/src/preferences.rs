//! User interface preferences persisted beside the credentials.

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::auth::KeyValueStore;

pub const THEME_KEY: &str = "theme";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl Theme {
    /// light -> dark -> system -> light
    pub fn toggle(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::System,
            Theme::System => Theme::Light,
        }
    }

    /// The effective theme; `System` follows `system_dark`.
    pub fn resolve(self, system_dark: bool) -> Theme {
        match self {
            Theme::System if system_dark => Theme::Dark,
            Theme::System => Theme::Light,
            other => other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::System => "system",
        }
    }

    /// Stored theme, or the default if none or unreadable.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        match store.get(THEME_KEY) {
            Ok(Some(value)) => value.parse().unwrap_or_else(|_| {
                warn!(value = %value, "Ignoring unknown stored theme");
                Theme::default()
            }),
            Ok(None) => Theme::default(),
            Err(e) => {
                warn!(error = %e, "Failed to read theme preference");
                Theme::default()
            }
        }
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> Result<()> {
        store.set(THEME_KEY, self.as_str())
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            "system" => Ok(Theme::System),
            other => Err(format!("unknown theme: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryStore;

    #[test]
    fn test_toggle_cycles() {
        assert_eq!(Theme::Light.toggle(), Theme::Dark);
        assert_eq!(Theme::Dark.toggle(), Theme::System);
        assert_eq!(Theme::System.toggle(), Theme::Light);
    }

    #[test]
    fn test_resolve() {
        assert_eq!(Theme::System.resolve(true), Theme::Dark);
        assert_eq!(Theme::System.resolve(false), Theme::Light);
        assert_eq!(Theme::Light.resolve(true), Theme::Light);
    }

    #[test]
    fn test_persisted() {
        let store = MemoryStore::new();
        assert_eq!(Theme::load(&store), Theme::System);

        Theme::Dark.save(&store).unwrap();
        assert_eq!(Theme::load(&store), Theme::Dark);

        store.set(THEME_KEY, "neon").unwrap();
        assert_eq!(Theme::load(&store), Theme::System);
    }
}
