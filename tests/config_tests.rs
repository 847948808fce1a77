#[cfg(test)]
mod tests {
    use std::io::Write;
    use tempfile::NamedTempFile;
    use ScrapeBlaster::config::market::*;
    use ScrapeBlaster::config::{FetchConfig, OutputFormat};
    use ScrapeBlaster::error::ScraperError;

    // Helper to create a temporary config file with given content
    fn create_temp_config_file(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
        writeln!(temp_file, "{}", content).expect("Failed to write to temp file");
        temp_file
    }

    #[test]
    fn test_load_valid_config() {
        let yaml_content = r#"
markets: [bim, sok]
aggregator:
  name: example-aggregator
  url_pattern: "https://deals.example/{market}/"
  parser:
    type: CardPattern
    card_pattern: "product|card"
    title_pattern: "title"
direct:
  - market: bim
    url: "https://www.bim.com.tr/Categories/100/aktuel-urunler.aspx"
    parser:
      type: Bim
  - market: sok
    url: "https://sok.example/firsatlar"
    parser:
      type: CardPattern
      card_pattern: "urun"
      title_pattern: "baslik"
      price_pattern: "tutar"
      max_cards: 10
        "#;
        let temp_file = create_temp_config_file(yaml_content);
        let config_result = load_market_config(temp_file.path());

        assert!(
            config_result.is_ok(),
            "Should load valid config: {:?}",
            config_result.err()
        );
        let config = config_result.unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.markets, vec!["bim", "sok"]);
        assert_eq!(config.aggregator.url_for("bim"), "https://deals.example/bim/");
        match &config.aggregator.parser {
            ParserConfig::CardPattern(params) => {
                assert_eq!(params.price_pattern, "price|fiyat");
                assert_eq!(params.max_cards, 50);
            }
            _ => panic!("Expected CardPattern"),
        }
        match &config.direct[0].parser {
            ParserConfig::Bim(params) => assert_eq!(params.max_cards, 100),
            _ => panic!("Expected Bim"),
        }
        assert_eq!(config.direct[1].parser.name(), "CardPattern");
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_market_config("non_existent_market_config.yaml");
        assert!(result.is_err());
        match result.err().unwrap() {
            ScraperError::ConfigError(msg) => {
                assert!(msg.contains("Failed to read market config file"));
            }
            e => panic!("Expected ConfigError, got {:?}", e),
        }
    }

    #[test]
    fn test_load_config_invalid_yaml() {
        let temp_file = create_temp_config_file("markets: [bim\naggregator: {");
        match load_market_config(temp_file.path()).err().unwrap() {
            ScraperError::ConfigError(msg) => {
                assert!(msg.contains("Failed to parse market config YAML"));
            }
            e => panic!("Expected ConfigError, got {:?}", e),
        }
    }

    #[test]
    fn test_unknown_parser_type_is_rejected() {
        let yaml_content = r#"
markets: [bim]
aggregator:
  name: x
  url_pattern: "https://x/{market}"
  parser:
    type: Magic
direct: []
        "#;
        let temp_file = create_temp_config_file(yaml_content);
        assert!(load_market_config(temp_file.path()).is_err());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = MarketConfig::default();
        assert!(config.validate().is_ok());

        config.aggregator.url_pattern = "https://x/static".to_string();
        assert!(matches!(
            config.validate(),
            Err(ScraperError::ConfigValidationError(_))
        ));

        let mut config = MarketConfig::default();
        config.direct[0].parser = ParserConfig::CardPattern(CardPatternParams {
            card_pattern: "(unclosed".to_string(),
            title_pattern: "title".to_string(),
            price_pattern: "price".to_string(),
            max_cards: 5,
        });
        match config.validate() {
            Err(ScraperError::ConfigValidationError(msg)) => assert!(msg.contains("card_pattern")),
            other => panic!("Expected ConfigValidationError, got {:?}", other),
        }

        let mut config = MarketConfig::default();
        config.markets.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fetch_config_from_yaml_uses_defaults() {
        let config: FetchConfig = serde_yaml::from_str("max_retries: 5\nproxy: http://proxy:8080").unwrap();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.delay_min_secs, 2.0);
        assert_eq!(config.proxy.as_deref(), Some("http://proxy:8080"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_market_args_defaults() {
        use clap::Parser;
        let args = Args::try_parse_from(["market"]).unwrap();
        assert_eq!(args.output.to_str(), Some("market_deals.json"));
        assert_eq!(args.format, OutputFormat::Json);
        assert!(args.market_config().unwrap().validate().is_ok());
        let config = args.scrape_config(chrono::Utc::now());
        assert!(config.validate().is_ok());
        assert!(config.range.contains(chrono::Utc::now()));
    }
}
