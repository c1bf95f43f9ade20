//! Persisted language preference

use std::{fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::{
    error::{Error, Result},
    storage::{ClientStorage, LANGUAGE_KEY},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Pt,
    En,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::Pt => "pt",
            Language::En => "en",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            Language::Pt => Language::En,
            Language::En => Language::Pt,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pt" => Ok(Language::Pt),
            "en" => Ok(Language::En),
            other => Err(Error::Validation(format!("Unknown language: {other}"))),
        }
    }
}

pub struct LocaleStore {
    storage: Arc<dyn ClientStorage>,
    state: watch::Sender<Language>,
}

impl LocaleStore {
    /// Load the stored preference; unknown values fall back to the default
    pub fn restore(storage: Arc<dyn ClientStorage>) -> Self {
        let language = storage
            .get(LANGUAGE_KEY)
            .and_then(|code| code.parse().ok())
            .unwrap_or_default();
        let (state, _) = watch::channel(language);
        Self { storage, state }
    }

    pub fn language(&self) -> Language {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Language> {
        self.state.subscribe()
    }

    pub fn set_language(&self, language: Language) -> Result<()> {
        self.storage.set(LANGUAGE_KEY, language.code())?;
        self.state.send_replace(language);
        Ok(())
    }

    pub fn toggle(&self) -> Result<Language> {
        let next = self.language().toggled();
        self.set_language(next)?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn test_default_is_portuguese() {
        let store = LocaleStore::restore(Arc::new(MemoryStorage::new()));
        assert_eq!(store.language(), Language::Pt);

        let garbage = MemoryStorage::with_entries([(LANGUAGE_KEY, "fr")]);
        assert_eq!(LocaleStore::restore(Arc::new(garbage)).language(), Language::Pt);
    }

    #[test]
    fn test_toggle_persists() {
        let storage = Arc::new(MemoryStorage::new());
        let store = LocaleStore::restore(storage.clone());
        let rx = store.subscribe();

        assert_eq!(store.toggle().unwrap(), Language::En);
        assert_eq!(storage.get(LANGUAGE_KEY).as_deref(), Some("en"));
        assert_eq!(*rx.borrow(), Language::En);

        let reloaded = LocaleStore::restore(storage);
        assert_eq!(reloaded.language(), Language::En);
    }

    #[test]
    fn test_parse_language() {
        assert_eq!(" EN ".parse::<Language>().unwrap(), Language::En);
        assert!("de".parse::<Language>().is_err());
    }
}
