// tests/providers_fixtures.rs
//
// Each backend against a stored payload, then through the default rules.

use editais_monitor::ingest::fixture_adapter;
use editais_monitor::ingest::providers::{
    custom_search::CustomSearchProvider, google_news::GoogleNewsProvider,
    rss2json::Rss2JsonProvider,
};
use editais_monitor::pipeline::{classify, PipelineSettings};
use editais_monitor::rules::{RuleEngine, RuleSet};
use editais_monitor::{Category, SourceUnavailable};

const RSS2JSON: &str = include_str!("fixtures/rss2json_ok.json");
const GOOGLE_NEWS: &str = include_str!("fixtures/google_news.xml");
const CUSTOM_SEARCH: &str = include_str!("fixtures/custom_search.json");

fn default_engine() -> RuleEngine {
    RuleEngine::new(&RuleSet::default())
}

#[test]
fn rss2json_fixture_parses_and_skips_untitled() {
    let items = Rss2JsonProvider::parse_payload(RSS2JSON).expect("parse rss2json");
    // 8 entries, one without a title
    assert_eq!(items.len(), 7);
    assert_eq!(
        items[0].description.as_deref(),
        Some("Edital Paulo Gustavo abre inscrições para audiovisual Secult BA")
    );
    assert!(items[0].published_at.is_some());
    // empty description becomes None
    assert_eq!(items[3].description, None);
}

#[test]
fn rss2json_fixture_through_default_rules() {
    let items = Rss2JsonProvider::parse_payload(RSS2JSON).unwrap();
    let out = classify(&items, &default_engine(), &PipelineSettings::default());

    let got: Vec<(&str, Category)> = out.iter().map(|i| (i.title.as_str(), i.category)).collect();
    assert_eq!(
        got,
        vec![
            ("Edital Paulo Gustavo abre inscrições para audiovisual", Category::Culture),
            ("SEC divulga seleção de professores para o ensino médio", Category::Education),
            ("Museu de Arte da Bahia recebe propostas", Category::Culture),
        ]
    );
    assert_eq!(out[1].published_label().as_deref(), Some("18/11/2024"));
}

#[test]
fn rss2json_error_envelope_is_upstream() {
    let body = r#"{"status":"error","message":"rss_url parameter is required.","items":[]}"#;
    assert!(matches!(
        Rss2JsonProvider::parse_payload(body),
        Err(SourceUnavailable::Upstream(m)) if m.contains("rss_url")
    ));
}

#[test]
fn google_news_fixture_decodes_escaped_html() {
    let items = GoogleNewsProvider::parse_feed(GOOGLE_NEWS).expect("parse rss");
    // the item without a link is skipped
    assert_eq!(items.len(), 3);
    assert_eq!(
        items[2].description.as_deref(),
        Some("Programa de leitura nas escolas SEC BA")
    );
}

#[test]
fn google_news_fixture_through_default_rules() {
    let items = GoogleNewsProvider::parse_feed(GOOGLE_NEWS).unwrap();
    let out = classify(&items, &default_engine(), &PipelineSettings::default());

    assert_eq!(out.len(), 2);
    assert_eq!(out[0].title, "Inscrições abertas para o Edital de Dança 2025");
    assert_eq!(out[0].category, Category::Culture);
    let snippet = out[0].snippet.as_deref().unwrap();
    assert!(snippet.chars().count() <= 100);
    assert!(snippet.ends_with("..."));

    assert_eq!(out[1].title, "Programa de leitura nas escolas estaduais");
    assert_eq!(out[1].category, Category::Education);
}

#[test]
fn custom_search_fixture_through_default_rules() {
    let items = CustomSearchProvider::parse_payload(CUSTOM_SEARCH).expect("parse cse");
    assert_eq!(items.len(), 3);

    let out = classify(&items, &default_engine(), &PipelineSettings::default());
    let titles: Vec<&str> = out.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(
        titles,
        vec!["Edital Aldir Blanc 2024: inscrições abertas", "Seleção pública de pedagogos"]
    );
    assert_eq!(out[0].category, Category::Culture);
    assert_eq!(out[1].category, Category::Education);
}

#[tokio::test]
async fn fixture_adapter_replays_payload() {
    let adapter = fixture_adapter("google_news", GOOGLE_NEWS).unwrap();
    assert_eq!(adapter.fetch().await.unwrap().len(), 3);

    let broken = fixture_adapter("rss2json", "<html>502 Bad Gateway</html>").unwrap();
    assert!(matches!(
        broken.fetch().await,
        Err(SourceUnavailable::Payload(_))
    ));
}
