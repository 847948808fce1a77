mod common;

#[cfg(test)]
mod tests {
    use crate::common::*;
    use chrono::Utc;
    use clap::Parser;
    use std::sync::Arc;
    use tempfile::tempdir;
    use ScrapeBlaster::config::market::{BimParams, CardPatternParams, MarketConfig, ParserConfig};
    use ScrapeBlaster::config::market::Args;
    use ScrapeBlaster::config::{JsonLayout, OutputFormat, ScrapeConfig};
    use ScrapeBlaster::data_model::DateRange;
    use ScrapeBlaster::drivers::strategy::{ChainMode, Strategy, StrategyChain};
    use ScrapeBlaster::fetch::{HeaderProfile, ResilientFetcher};
    use ScrapeBlaster::run_logic::run_scrape;
    use ScrapeBlaster::sources::market::{
        AggregatorStrategy, CardParser, Deal, DirectStrategy, PageContext,
    };
    use ScrapeBlaster::utils::shutdown::Shutdown;

    const AGGREGATOR_PAGE: &str = r#"
        <html><body>
          <div class="Product-Card">
            <h3 class="product-title">Çay 1kg</h3>
            <span class="fiyat">89,90 TL</span>
            <img src="/img/cay.jpg">
          </div>
          <article class="aktuel item">
            <h4 class="name">Kahve</h4>
            <div class="price"> 120,00 TL </div>
          </article>
          <div class="card">
            <h3 class="title">No price here</h3>
          </div>
          <div class="footer"><span class="price">not a card</span></div>
        </body></html>"#;

    const BIM_PAGE: &str = r##"
        <div class="product big">
          <div class="imageArea"><a href="#"><div class="image"><img src="https://bim/1.jpg"></div></a></div>
          <h2 class="title">Elektrikli Süpürge</h2>
          <div class="buttonArea">
            <a class="gButton triangle">
              <div class="text quantify">1.499,</div>
              <div class="kusurArea">00</div>
              <span class="curr">₺</span>
            </a>
          </div>
        </div>
        <div class="product">
          <h2 class="title">Missing price</h2>
        </div>"##;

    fn context(market: &'static str) -> PageContext<'static> {
        PageContext {
            market,
            source: "test-source",
            url: "https://example.com/page",
            scraped_at: Utc::now(),
        }
    }

    fn generic_parser(max_cards: usize) -> CardParser {
        CardParser::from_config(&ParserConfig::CardPattern(CardPatternParams {
            card_pattern: "product|item|card|aktuel".to_string(),
            title_pattern: "title|name|product".to_string(),
            price_pattern: "price|fiyat".to_string(),
            max_cards,
        }))
        .unwrap()
    }

    #[test]
    fn test_card_pattern_parser_extracts_deals() {
        let items = generic_parser(50).parse_cards(AGGREGATOR_PAGE, &context("a101"));

        assert_eq!(items.len(), 3);
        let deals: Vec<Deal> = items.into_iter().filter_map(|r| r.ok()).collect();
        assert_eq!(deals.len(), 2);
        assert_eq!(deals[0].market, "A101");
        assert_eq!(deals[0].title, "Çay 1kg");
        assert_eq!(deals[0].price, "89,90 TL");
        assert_eq!(deals[0].image.as_deref(), Some("/img/cay.jpg"));
        assert_eq!(deals[1].title, "Kahve");
        assert_eq!(deals[1].price, "120,00 TL");
        assert_eq!(deals[1].image, None);
    }

    #[test]
    fn test_card_pattern_parser_respects_max_cards() {
        let items = generic_parser(1).parse_cards(AGGREGATOR_PAGE, &context("a101"));
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_bim_parser_joins_price_parts() {
        let parser =
            CardParser::from_config(&ParserConfig::Bim(BimParams { max_cards: 100 })).unwrap();

        let items = parser.parse_cards(BIM_PAGE, &context("bim"));

        assert_eq!(items.len(), 2);
        let deal = items[0].as_ref().unwrap();
        assert_eq!(deal.market, "BIM");
        assert_eq!(deal.title, "Elektrikli Süpürge");
        assert_eq!(deal.price, "1.499,00₺");
        assert_eq!(deal.image.as_deref(), Some("https://bim/1.jpg"));
        assert!(items[1].is_err());
    }

    fn scrape_config(dir: &std::path::Path) -> ScrapeConfig {
        let now = Utc::now();
        ScrapeConfig {
            range: DateRange::new(now - chrono::Duration::hours(1), now + chrono::Duration::days(1)),
            output_format: OutputFormat::Json,
            json_layout: JsonLayout::WithMetadata {
                records_key: "deals".to_string(),
                total_key: "total_deals".to_string(),
                category_key: "by_market".to_string(),
            },
            output_path: dir.join("market_deals.json"),
            checkpoint_path: dir.join("market_checkpoint.json"),
            chunk_width_days: 1,
            checkpoint_every: 50,
            inter_chunk_delay_min_secs: 0.0,
            inter_chunk_delay_max_secs: 0.0,
            resume: false,
        }
    }

    fn read_document(config: &ScrapeConfig) -> serde_json::Value {
        serde_json::from_str(&std::fs::read_to_string(&config.output_path).unwrap()).unwrap()
    }

    fn chain_for(transport: Arc<ScriptedTransport>) -> StrategyChain<Deal> {
        let config = MarketConfig::default();
        let fetcher = Arc::new(ResilientFetcher::new(
            transport,
            ScrapeBlaster::config::FetchConfig::immediate(),
            HeaderProfile::Html,
        ));
        let strategies: Vec<Box<dyn Strategy<Deal>>> = vec![
            Box::new(
                AggregatorStrategy::new(fetcher.clone(), config.aggregator.clone(), config.markets.clone())
                    .unwrap(),
            ),
            Box::new(DirectStrategy::new(fetcher, config.direct.clone()).unwrap()),
        ];
        StrategyChain::new(ChainMode::FirstNonEmpty, strategies)
    }

    #[tokio::test(start_paused = true)]
    async fn test_falls_back_to_direct_sites_when_aggregator_is_empty() {
        let transport = ScriptedTransport::new();
        transport.route("https://aktuel-urunler.com/", ok("<html><body>nothing</body></html>"));
        transport.route("https://www.bim.com.tr/", ok(BIM_PAGE));
        transport.route("https://kurumsal.sokmarket.com.tr/", status(403));
        transport.route("https://www.a101.com.tr/", status(403));
        let dir = tempdir().unwrap();
        let config = scrape_config(dir.path());

        let summary = run_scrape(&chain_for(transport.clone()), &config, &Shutdown::never(), None)
            .await
            .unwrap();

        assert_eq!(summary.total_records, 1);
        assert_eq!(summary.by_strategy.len(), 2);
        assert_eq!(summary.by_strategy[1], ("direct".to_string(), 1));
        assert_eq!(summary.by_category.get("BIM"), Some(&1));
        // 3 aggregator pages, then sok, bim, a101.
        assert_eq!(transport.calls(), 6);

        let written = read_document(&config);
        let deals = written["deals"].as_array().unwrap();
        assert_eq!(deals.len(), 1);
        assert_eq!(deals[0]["source"], "bim.com.tr");
        assert!(deals[0].get("id").is_none());
        assert!(config.checkpoint_path.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_aggregator_success_skips_direct_sites() {
        let transport = ScriptedTransport::new();
        transport.route("https://aktuel-urunler.com/bim-", ok(AGGREGATOR_PAGE));
        transport.route("https://aktuel-urunler.com/", status(404));
        let dir = tempdir().unwrap();
        let config = scrape_config(dir.path());

        let summary = run_scrape(&chain_for(transport.clone()), &config, &Shutdown::never(), None)
            .await
            .unwrap();

        assert_eq!(summary.by_strategy.len(), 1);
        assert_eq!(summary.total_records, 2);
        assert_eq!(summary.by_category.get("BIM"), Some(&2));
        assert_eq!(transport.calls(), 3);

        let written = read_document(&config);
        assert_eq!(written["metadata"]["total_deals"], 2);
        assert_eq!(written["metadata"]["by_market"]["BIM"], 2);
        assert!(written["metadata"]["scraped_at"].is_string());
        assert!(written["metadata"]["duration_seconds"].is_number());
        assert_eq!(written["deals"].as_array().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_run_with_same_checkpoint_keeps_full_result_set() {
        let transport = ScriptedTransport::new();
        transport.route("https://aktuel-urunler.com/bim-", ok(AGGREGATOR_PAGE));
        transport.route("https://aktuel-urunler.com/", status(404));
        let dir = tempdir().unwrap();
        let config = scrape_config(dir.path());
        let chain = chain_for(transport.clone());

        for run in 0..2 {
            let summary = run_scrape(&chain, &config, &Shutdown::never(), None)
                .await
                .unwrap();

            assert_eq!(summary.total_records, 2, "run {}", run);
            assert_eq!(
                summary.by_strategy,
                vec![("aggregator:aktuel-urunler.com".to_string(), 2)],
                "run {}",
                run
            );
            let written = read_document(&config);
            assert_eq!(written["deals"].as_array().unwrap().len(), 2, "run {}", run);
        }
        // The direct sites were never needed.
        assert_eq!(transport.calls(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_skips_known_deals_without_triggering_fallback() {
        let transport = ScriptedTransport::new();
        transport.route("https://aktuel-urunler.com/bim-", ok(AGGREGATOR_PAGE));
        transport.route("https://aktuel-urunler.com/", status(404));
        let dir = tempdir().unwrap();
        let first = scrape_config(dir.path());
        let chain = chain_for(transport.clone());
        run_scrape(&chain, &first, &Shutdown::never(), None)
            .await
            .unwrap();

        let resumed = ScrapeConfig {
            resume: true,
            ..first
        };
        let summary = run_scrape(&chain, &resumed, &Shutdown::never(), None)
            .await
            .unwrap();

        assert_eq!(summary.total_records, 0);
        assert_eq!(
            summary.by_strategy,
            vec![("aggregator:aktuel-urunler.com".to_string(), 0)]
        );
        assert_eq!(transport.calls(), 6);
    }

    #[test]
    fn test_market_args_do_not_resume_by_default() {
        let args = Args::try_parse_from(["market"]).unwrap();
        let config = args.scrape_config(Utc::now());
        assert!(!config.resume);
        assert!(matches!(config.json_layout, JsonLayout::WithMetadata { .. }));

        let args = Args::try_parse_from(["market", "--resume"]).unwrap();
        assert!(args.scrape_config(Utc::now()).resume);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_found_still_writes_empty_output() {
        let transport = ScriptedTransport::new();
        let dir = tempdir().unwrap();
        let config = scrape_config(dir.path());

        let summary = run_scrape(&chain_for(transport.clone()), &config, &Shutdown::never(), None)
            .await
            .unwrap();

        assert_eq!(summary.total_records, 0);
        let written = read_document(&config);
        assert_eq!(written["deals"], serde_json::json!([]));
        assert_eq!(written["metadata"]["total_deals"], 0);
    }
}
