// src/fallback.rs
//! Static, hand-curated notices served whenever live data is unusable.

use crate::model::{Category, ClassifiedItem};

#[derive(Debug, Clone)]
pub struct FallbackProvider {
    items: Vec<ClassifiedItem>,
}

impl FallbackProvider {
    /// The three notices the site shows when the monitor has nothing live.
    pub fn builtin() -> Self {
        let item = |title: &str, category, link: &str, snippet: &str| ClassifiedItem {
            title: title.to_string(),
            category,
            link: link.to_string(),
            published_at: None,
            snippet: Some(snippet.to_string()),
        };
        Self {
            items: vec![
                item(
                    "Lei Paulo Gustavo - Edital 2024",
                    Category::Culture,
                    "https://www.gov.br/cultura/pt-br/assuntos/lei-paulo-gustavo",
                    "Ministério da Cultura · Prazo: 15/12/2024 · Até R$ 200.000",
                ),
                item(
                    "FazCultura Bahia",
                    Category::Culture,
                    "http://www.fazcultura.ba.gov.br/",
                    "SECULT-BA · Prazo: 30/11/2024 · Até R$ 150.000",
                ),
                item(
                    "Edital de Fomento às Escolas",
                    Category::Education,
                    "https://www.educacao.ba.gov.br/",
                    "Secretaria de Educação · Prazo: 20/12/2024 · Até R$ 100.000",
                ),
            ],
        }
    }

    /// Configured list; an empty one falls back to [`FallbackProvider::builtin`].
    pub fn from_items(items: Vec<ClassifiedItem>) -> Self {
        if items.is_empty() {
            Self::builtin()
        } else {
            Self { items }
        }
    }

    pub fn items(&self) -> Vec<ClassifiedItem> {
        self.items.clone()
    }
}

impl Default for FallbackProvider {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::is_absolute_http_url;

    #[test]
    fn builtin_is_small_nonempty_and_well_formed() {
        let items = FallbackProvider::builtin().items();
        assert!(!items.is_empty() && items.len() <= 6);
        for it in &items {
            assert!(!it.title.is_empty());
            assert!(is_absolute_http_url(&it.link), "{}", it.link);
        }
    }

    #[test]
    fn empty_configured_list_keeps_builtin() {
        let p = FallbackProvider::from_items(vec![]);
        assert_eq!(p.items(), FallbackProvider::builtin().items());
    }
}
