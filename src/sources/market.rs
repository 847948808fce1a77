//! Weekly discount catalogues: an aggregator listing every market, with the
//! markets' own sites as fallback.

use crate::config::market::{AggregatorConfig, DirectSiteConfig, ParserConfig};
use crate::data_model::{Acceptance, Record};
use crate::drivers::strategy::{Strategy, StrategyYield};
use crate::error::{Result, ScraperError};
use crate::fetch::{FetchOutcome, ResilientFetcher};
use crate::storage::Collector;
use crate::utils::prometheus_metrics::{PAGES_FETCHED_TOTAL, PARSE_FAILURES_TOTAL};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A product on a discount catalogue page.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Deal {
    #[serde(skip)]
    id: String,
    pub market: String,
    pub title: String,
    pub price: String,
    pub image: Option<String>,
    pub scraped_at: DateTime<Utc>,
    pub source: String,
    pub url: String,
}

impl Deal {
    pub fn new(
        market: &str,
        title: String,
        price: String,
        image: Option<String>,
        scraped_at: DateTime<Utc>,
        source: &str,
        url: &str,
    ) -> Self {
        let market = market.to_uppercase();
        Deal {
            id: format!("{}|{}|{}|{}", source, market, title, price),
            market,
            title,
            price,
            image,
            scraped_at,
            source: source.to_string(),
            url: url.to_string(),
        }
    }
}

impl Record for Deal {
    fn id(&self) -> &str {
        &self.id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.scraped_at
    }

    fn category(&self) -> Option<&str> {
        Some(&self.market)
    }
}

/// Where a page came from, stamped onto each deal.
#[derive(Debug, Clone, Copy)]
pub struct PageContext<'a> {
    pub market: &'a str,
    pub source: &'a str,
    pub url: &'a str,
    pub scraped_at: DateTime<Utc>,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| {
        ScraperError::ConfigValidationError(format!("Invalid CSS selector '{}': {}", css, e))
    })
}

fn class_regex(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| {
            ScraperError::ConfigValidationError(format!("Invalid class pattern '{}': {}", pattern, e))
        })
}

fn has_class_matching(element: &ElementRef<'_>, pattern: &Regex) -> bool {
    element.value().classes().any(|class| pattern.is_match(class))
}

fn clean_text(element: &ElementRef<'_>) -> String {
    element.text().map(str::trim).collect::<String>()
}

// First strict descendant matching `selector` (and `pattern`, when given).
fn find_descendant<'a>(
    root: &ElementRef<'a>,
    selector: &Selector,
    pattern: Option<&Regex>,
) -> Option<ElementRef<'a>> {
    root.select(selector)
        .filter(|e| e.id() != root.id())
        .find(|e| pattern.map_or(true, |p| has_class_matching(e, p)))
}

struct CardPatternSelectors {
    cards: Selector,
    titles: Selector,
    prices: Selector,
    card_pattern: Regex,
    title_pattern: Regex,
    price_pattern: Regex,
}

struct BimSelectors {
    cards: Selector,
    title: Selector,
    button: Selector,
    whole: Selector,
    fraction: Selector,
    currency: Selector,
    image: Selector,
}

enum CardLayout {
    Pattern(CardPatternSelectors),
    Bim(BimSelectors),
}

/// Extracts deals from a catalogue page, compiled from a [`ParserConfig`].
pub struct CardParser {
    layout: CardLayout,
    images: Selector,
    max_cards: usize,
}

impl CardParser {
    pub fn from_config(config: &ParserConfig) -> Result<Self> {
        let (layout, max_cards) = match config {
            ParserConfig::CardPattern(params) => (
                CardLayout::Pattern(CardPatternSelectors {
                    cards: selector("div, article")?,
                    titles: selector("h2, h3, h4, span")?,
                    prices: selector("span, div")?,
                    card_pattern: class_regex(&params.card_pattern)?,
                    title_pattern: class_regex(&params.title_pattern)?,
                    price_pattern: class_regex(&params.price_pattern)?,
                }),
                params.max_cards,
            ),
            ParserConfig::Bim(params) => (
                CardLayout::Bim(BimSelectors {
                    cards: selector("div.product")?,
                    title: selector("h2.title")?,
                    button: selector("div.buttonArea a.gButton")?,
                    whole: selector("div.text")?,
                    fraction: selector("div.kusurArea")?,
                    currency: selector("span.curr")?,
                    image: selector("div.imageArea img")?,
                }),
                params.max_cards,
            ),
        };
        Ok(CardParser {
            layout,
            images: selector("img")?,
            max_cards,
        })
    }

    /// One entry per card considered; cards lacking a title or price are `Err`.
    pub fn parse_cards(&self, html: &str, context: &PageContext<'_>) -> Vec<Result<Deal>> {
        let document = Html::parse_document(html);
        let cards: Vec<ElementRef<'_>> = match &self.layout {
            CardLayout::Pattern(s) => document
                .select(&s.cards)
                .filter(|card| has_class_matching(card, &s.card_pattern))
                .take(self.max_cards)
                .collect(),
            CardLayout::Bim(s) => document.select(&s.cards).take(self.max_cards).collect(),
        };
        debug!(market = context.market, cards = cards.len(), "Product cards found");

        cards
            .iter()
            .map(|card| {
                let (title, price, image) = match &self.layout {
                    CardLayout::Pattern(s) => (
                        find_descendant(card, &s.titles, Some(&s.title_pattern)).map(|e| clean_text(&e)),
                        find_descendant(card, &s.prices, Some(&s.price_pattern)).map(|e| clean_text(&e)),
                        find_descendant(card, &self.images, None),
                    ),
                    CardLayout::Bim(s) => (
                        find_descendant(card, &s.title, None).map(|e| clean_text(&e)),
                        bim_price(card, s),
                        find_descendant(card, &s.image, None),
                    ),
                };
                let image = image.and_then(|img| img.value().attr("src").map(str::to_string));
                match (title, price) {
                    (Some(title), Some(price)) if !title.is_empty() && !price.is_empty() => Ok(Deal::new(
                        context.market,
                        title,
                        price,
                        image,
                        context.scraped_at,
                        context.source,
                        context.url,
                    )),
                    _ => Err(ScraperError::parse_failure(
                        "product card",
                        "missing title or price",
                    )),
                }
            })
            .collect()
    }
}

// "14.900," + "00" + "₺"
fn bim_price(card: &ElementRef<'_>, s: &BimSelectors) -> Option<String> {
    let button = find_descendant(card, &s.button, None)?;
    let price: String = [&s.whole, &s.fraction, &s.currency]
        .into_iter()
        .filter_map(|part| find_descendant(&button, part, None))
        .map(|e| clean_text(&e))
        .collect();
    (!price.is_empty()).then_some(price)
}

fn source_name(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .unwrap_or_else(|| url.to_string())
}

/// Fetches one catalogue page and offers its deals. Failures count as zero.
pub async fn scrape_page(
    fetcher: &ResilientFetcher,
    parser: &CardParser,
    market: &str,
    source: &str,
    url: &str,
    collector: &mut Collector<Deal>,
) -> StrategyYield {
    let parsed_url = match ResilientFetcher::parse_url(url) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(market, error = %e, "Skipping market with invalid URL");
            return StrategyYield::default();
        }
    };
    let body = match fetcher.fetch(&parsed_url).await {
        FetchOutcome::Success(body) => body,
        other => {
            warn!(market, url, outcome = other.label(), "Failed to fetch catalogue page");
            return StrategyYield::default();
        }
    };
    PAGES_FETCHED_TOTAL.inc();

    let context = PageContext {
        market,
        source,
        url,
        scraped_at: Utc::now(),
    };
    let items = parser.parse_cards(&body, &context);

    let mut produced = StrategyYield::default();
    for item in items {
        match item {
            Ok(deal) => {
                produced.found += 1;
                if collector.offer(deal, None).await == Acceptance::Accepted {
                    produced.accepted += 1;
                }
            }
            Err(e) => {
                PARSE_FAILURES_TOTAL.inc();
                debug!(market, error = %e, "Failed to parse product card");
            }
        }
    }
    info!(
        market = %market.to_uppercase(),
        source,
        found = produced.found,
        accepted = produced.accepted,
        "Deals found"
    );
    produced
}

/// Every configured market through the aggregator site.
pub struct AggregatorStrategy {
    fetcher: Arc<ResilientFetcher>,
    aggregator: AggregatorConfig,
    markets: Vec<String>,
    parser: CardParser,
}

impl AggregatorStrategy {
    pub fn new(
        fetcher: Arc<ResilientFetcher>,
        aggregator: AggregatorConfig,
        markets: Vec<String>,
    ) -> Result<Self> {
        let parser = CardParser::from_config(&aggregator.parser)?;
        Ok(AggregatorStrategy {
            fetcher,
            aggregator,
            markets,
            parser,
        })
    }
}

#[async_trait]
impl Strategy<Deal> for AggregatorStrategy {
    fn name(&self) -> String {
        format!("aggregator:{}", self.aggregator.name)
    }

    async fn run(&self, collector: &mut Collector<Deal>) -> Result<StrategyYield> {
        let mut produced = StrategyYield::default();
        for market in &self.markets {
            if self.fetcher.shutdown().is_triggered() {
                break;
            }
            let url = self.aggregator.url_for(market);
            info!(market = %market.to_uppercase(), source = %self.aggregator.name, "Scraping market from aggregator");
            produced += scrape_page(
                &self.fetcher,
                &self.parser,
                market,
                &self.aggregator.name,
                &url,
                collector,
            )
            .await;
        }
        Ok(produced)
    }
}

/// Each market's own site, in configured order.
pub struct DirectStrategy {
    fetcher: Arc<ResilientFetcher>,
    sites: Vec<(DirectSiteConfig, CardParser)>,
}

impl DirectStrategy {
    pub fn new(fetcher: Arc<ResilientFetcher>, sites: Vec<DirectSiteConfig>) -> Result<Self> {
        let sites = sites
            .into_iter()
            .map(|site| CardParser::from_config(&site.parser).map(|parser| (site, parser)))
            .collect::<Result<Vec<_>>>()?;
        Ok(DirectStrategy { fetcher, sites })
    }
}

#[async_trait]
impl Strategy<Deal> for DirectStrategy {
    fn name(&self) -> String {
        "direct".to_string()
    }

    async fn run(&self, collector: &mut Collector<Deal>) -> Result<StrategyYield> {
        let mut produced = StrategyYield::default();
        for (site, parser) in &self.sites {
            if self.fetcher.shutdown().is_triggered() {
                break;
            }
            let source = source_name(&site.url);
            info!(market = %site.market.to_uppercase(), url = %site.url, "Scraping market directly");
            produced += scrape_page(&self.fetcher, parser, &site.market, &source, &site.url, collector)
                .await;
        }
        Ok(produced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_name_strips_www() {
        assert_eq!(source_name("https://www.bim.com.tr/Categories/100/aktuel-urunler.aspx"), "bim.com.tr");
        assert_eq!(source_name("https://kurumsal.sokmarket.com.tr/x"), "kurumsal.sokmarket.com.tr");
    }

    #[test]
    fn deal_id_combines_source_market_title_price() {
        let deal = Deal::new("bim", "Çay".into(), "49,90₺".into(), None, Utc::now(), "bim.com.tr", "u");
        assert_eq!(deal.id(), "bim.com.tr|BIM|Çay|49,90₺");
        assert_eq!(deal.category(), Some("BIM"));
    }
}
